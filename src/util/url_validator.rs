use thiserror::Error;
use url::Url;

/// Reasons a feed URL is refused at registration time.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("URL has no host")]
    MissingHost,
}

/// Validates a URL before it is registered as a feed.
///
/// Only `http`/`https` URLs with a host are accepted. Any host is allowed,
/// including `localhost` and private addresses.
///
/// # Examples
///
/// ```
/// use gator::util::validate_feed_url;
///
/// assert!(validate_feed_url("https://blog.example.com/index.xml").is_ok());
/// assert!(validate_feed_url("http://localhost:8080/feed").is_ok());
/// assert!(validate_feed_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_feed_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.host_str().is_none() {
        return Err(UrlValidationError::MissingHost);
    }

    Ok(url)
}
