//! gator: a command-line RSS aggregator.
//!
//! Registered feeds are polled one at a time on a fixed interval. Each cycle
//! picks the least recently fetched feed, downloads and decodes its RSS
//! document, and stores every new item as a post that followers can browse.
//!
//! - [`aggregator`] - the polling loop (select, mark, fetch, ingest)
//! - [`feed`] - HTTP fetching, RSS decoding and post ingestion
//! - [`storage`] - SQLite persistence for users, feeds, follows and posts
//! - [`commands`] - the CLI surface built on top of the above

pub mod aggregator;
pub mod commands;
pub mod config;
pub mod error;
pub mod feed;
pub mod storage;
pub mod util;

pub use error::Error;
