use chrono::{DateTime, FixedOffset, NaiveDateTime, Timelike, Utc, Weekday};
use uuid::Uuid;

use crate::error::Error;
use crate::feed::parser::FeedItem;
use crate::storage::{Database, Post};

/// The one publish-date layout accepted, RFC 1123 with a zone abbreviation
pub const PUB_DATE_LAYOUT: &str = "Mon, 02 Jan 2006 15:04:05 MST";

/// Outcome of ingesting one batch of feed items
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// New posts written
    pub created: usize,
    /// Items whose URL was already stored
    pub duplicates: usize,
    /// Items skipped for a bad publish date or missing link
    pub invalid: usize,
}

/// Converts feed items into posts, in feed order.
///
/// Each item stands alone: an unparseable `pubDate` or an empty link skips
/// that item with a warning, and a URL that is already stored is skipped
/// quietly. Only a storage failure other than a duplicate aborts the batch.
pub async fn ingest(
    db: &Database,
    feed_id: Uuid,
    items: &[FeedItem],
) -> Result<IngestReport, Error> {
    let mut report = IngestReport::default();

    for item in items {
        let post = match build_post(feed_id, item, Utc::now()) {
            Ok(post) => post,
            Err(e) => {
                tracing::warn!(feed_id = %feed_id, link = %item.link, error = %e, "Skipping feed item");
                report.invalid += 1;
                continue;
            }
        };

        match db.create_post(&post).await.map_err(Error::from) {
            Ok(()) => report.created += 1,
            Err(Error::DuplicatePost(_)) => {
                tracing::debug!(feed_id = %feed_id, url = %post.url, "Post already stored");
                report.duplicates += 1;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}

fn build_post(feed_id: Uuid, item: &FeedItem, now: DateTime<Utc>) -> Result<Post, Error> {
    let published_at = parse_pub_date(&item.pub_date)?;

    let url = item.link.trim();
    if url.is_empty() {
        return Err(Error::ItemValidation("item has no link".to_string()));
    }

    Ok(Post {
        id: Uuid::new_v4(),
        created_at: now,
        updated_at: now,
        title: non_empty(&item.title),
        url: url.to_string(),
        description: non_empty(&item.description),
        published_at: Some(published_at),
        feed_id,
    })
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Parses a `pubDate` written as [`PUB_DATE_LAYOUT`].
///
/// The zone must be an uppercase abbreviation of 3 to 5 letters. `UTC`,
/// `GMT` and the North American zones of RFC 822 get their real offsets;
/// any other abbreviation is read as UTC. Numeric offsets such as `+0000`
/// are rejected, as are single-digit days. The weekday is required but not
/// checked against the date.
///
/// # Examples
///
/// ```
/// use gator::feed::parse_pub_date;
///
/// let t = parse_pub_date("Mon, 01 Jan 2024 10:00:00 EST").unwrap();
/// assert_eq!(t.to_rfc3339(), "2024-01-01T15:00:00+00:00");
/// assert!(parse_pub_date("2024-01-01T10:00:00Z").is_err());
/// ```
pub fn parse_pub_date(raw: &str) -> Result<DateTime<Utc>, Error> {
    let raw = raw.trim();
    let invalid = |reason: &str| {
        Error::ItemValidation(format!(
            "pubDate {raw:?} does not match {PUB_DATE_LAYOUT:?}: {reason}"
        ))
    };

    let (weekday, rest) = raw
        .split_once(", ")
        .ok_or_else(|| invalid("missing weekday"))?;
    if weekday.len() != 3 || weekday.parse::<Weekday>().is_err() {
        return Err(invalid("bad weekday"));
    }

    let (stamp, zone) = rest.rsplit_once(' ').ok_or_else(|| invalid("missing zone"))?;
    let offset = zone_offset(zone).ok_or_else(|| invalid("bad zone"))?;

    let widths: Vec<usize> = stamp.split(' ').map(str::len).collect();
    if widths != [2, 3, 4, 8] {
        return Err(invalid("bad date or time"));
    }
    let naive = NaiveDateTime::parse_from_str(stamp, "%d %b %Y %H:%M:%S")
        .map_err(|e| invalid(&e.to_string()))?;
    // chrono reads second 60 as a leap second
    if naive.nanosecond() >= 1_000_000_000 {
        return Err(invalid("second out of range"));
    }

    naive
        .and_local_timezone(offset)
        .single()
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| invalid("time does not exist in zone"))
}

fn zone_offset(zone: &str) -> Option<FixedOffset> {
    if !(3..=5).contains(&zone.len()) || !zone.bytes().all(|b| b.is_ascii_uppercase()) {
        return None;
    }

    let hours = match zone {
        "EST" => -5,
        "EDT" => -4,
        "CST" => -6,
        "CDT" => -5,
        "MST" => -7,
        "MDT" => -6,
        "PST" => -8,
        "PDT" => -7,
        // UTC, GMT and unknown abbreviations
        _ => 0,
    };
    FixedOffset::east_opt(hours * 3600)
}
