//! The fetch and ingest halves of a polling cycle.
//!
//! - [`parser`] - RSS 2.0 decoding with `quick-xml`, plus entity unescaping
//! - [`fetcher`] - the [`FetchFeed`] capability and its HTTP implementation
//! - [`ingest`] - turning feed items into stored posts, one item at a time
//!
//! # Example
//!
//! ```ignore
//! use gator::feed::{ingest, FetchFeed, HttpFetcher};
//!
//! let fetcher = HttpFetcher::new("gator", Duration::from_secs(30))?;
//! let parsed = fetcher.fetch(&feed.url).await?;
//! let report = ingest(&db, feed.id, &parsed.items).await?;
//! ```

mod fetcher;
mod ingest;
mod parser;

pub use fetcher::{FetchError, FetchFeed, HttpFetcher, MAX_FEED_SIZE};
pub use ingest::{ingest, parse_pub_date, IngestReport, PUB_DATE_LAYOUT};
pub use parser::{parse_feed, FeedItem, ParseError, ParsedFeed};
