//! Utility functions shared by the pipeline and the CLI.
//!
//! - **Entity decoding**: lenient HTML entity unescaping for feed text
//! - **Intervals**: parsing `30s` / `1h30m` style polling intervals
//! - **Text**: making feed-supplied text safe for terminal output
//! - **URL validation**: refusing non-HTTP and internal feed URLs

mod duration;
mod html;
mod text;
mod url_validator;

pub use duration::{parse_interval, IntervalError};
pub use html::unescape_entities;
pub use text::{strip_control_chars, terminal_line, truncate_to_width};
pub use url_validator::{validate_feed_url, UrlValidationError};
