use thiserror::Error;

use crate::config::ConfigError;
use crate::feed::FetchError;
use crate::storage::DatabaseError;
use crate::util::{IntervalError, UrlValidationError};

/// Every failure the aggregator can report, grouped by how callers react to it.
///
/// `ItemValidation` and `DuplicatePost` are recovered inside a cycle (the item
/// is skipped). All other variants end the current command or polling loop.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid polling interval or unusable configuration, reported before any work starts
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No feed could be selected for the next cycle
    #[error("Feed selection failed: {0}")]
    Selection(String),

    /// HTTP request failed, timed out, or returned an unusable response
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response body was not a decodable RSS document
    #[error("Decode error: {0}")]
    Decode(String),

    /// A single feed item could not be turned into a post
    #[error("Invalid feed item: {0}")]
    ItemValidation(String),

    /// A unique key is already taken: a post URL during ingestion, or a user
    /// name, feed URL or follow when a command creates one
    #[error("Already exists: {0}")]
    DuplicatePost(String),

    /// The command needs a logged-in user
    #[error("Not logged in: {0}")]
    Unauthenticated(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other database failure
    #[error(transparent)]
    Storage(DatabaseError),
}

impl From<DatabaseError> for Error {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Duplicate(what) => Error::DuplicatePost(what),
            DatabaseError::NotFound(what) => Error::NotFound(what),
            other => Error::Storage(other),
        }
    }
}

impl From<FetchError> for Error {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Parse(msg) => Error::Decode(msg),
            other => Error::Transport(other.to_string()),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Configuration(err.to_string())
    }
}

impl From<IntervalError> for Error {
    fn from(err: IntervalError) -> Self {
        Error::Configuration(err.to_string())
    }
}

/// A feed URL refused at registration is a configuration mistake by the caller
impl From<UrlValidationError> for Error {
    fn from(err: UrlValidationError) -> Self {
        Error::Configuration(err.to_string())
    }
}
