use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::schema::Database;
use super::types::{DatabaseError, Feed, FeedWithOwner};

const FEED_COLUMNS: &str = "id, created_at, updated_at, name, url, user_id, last_fetched_at";

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Register a feed owned by `user_id`.
    ///
    /// The URL is unique across all feeds; a second registration of the same
    /// URL fails with `DatabaseError::Duplicate` instead of updating the row.
    pub async fn create_feed(
        &self,
        name: &str,
        url: &str,
        user_id: Uuid,
    ) -> Result<Feed, DatabaseError> {
        let now = Utc::now();
        let feed = sqlx::query_as::<_, Feed>(&format!(
            r#"
            INSERT INTO feeds (id, created_at, updated_at, name, url, user_id)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING {FEED_COLUMNS}
        "#
        ))
        .bind(Uuid::new_v4())
        .bind(now)
        .bind(now)
        .bind(name)
        .bind(url)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(feed)
    }

    /// All feeds with the name of the user who added them, in registration order
    pub async fn list_feeds(&self) -> Result<Vec<FeedWithOwner>, DatabaseError> {
        let feeds = sqlx::query_as::<_, FeedWithOwner>(
            r#"
            SELECT f.id, f.created_at, f.updated_at, f.name, f.url, f.user_id,
                   f.last_fetched_at, u.name AS owner_name
            FROM feeds f
            JOIN users u ON u.id = f.user_id
            ORDER BY f.created_at, f.rowid
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(feeds)
    }

    pub async fn find_feed_by_url(&self, url: &str) -> Result<Option<Feed>, DatabaseError> {
        let feed = sqlx::query_as::<_, Feed>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE url = ?"
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(feed)
    }

    pub async fn get_feed(&self, feed_id: Uuid) -> Result<Option<Feed>, DatabaseError> {
        let feed = sqlx::query_as::<_, Feed>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE id = ?"
        ))
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(feed)
    }

    // ========================================================================
    // Fetch Scheduling
    // ========================================================================

    /// The feed the aggregator should fetch next.
    ///
    /// Never-fetched feeds come first, then the feed with the oldest
    /// `last_fetched_at`. Ties fall back to registration order, so repeated
    /// select-then-mark calls rotate through every feed before revisiting one.
    ///
    /// # Errors
    ///
    /// `DatabaseError::NotFound` when no feeds are registered.
    pub async fn next_feed_to_fetch(&self) -> Result<Feed, DatabaseError> {
        let feed = sqlx::query_as::<_, Feed>(&format!(
            r#"
            SELECT {FEED_COLUMNS}
            FROM feeds
            ORDER BY last_fetched_at ASC NULLS FIRST, created_at ASC, rowid ASC
            LIMIT 1
        "#
        ))
        .fetch_optional(&self.pool)
        .await?;

        feed.ok_or_else(|| DatabaseError::NotFound("no feeds registered".to_string()))
    }

    /// Record a fetch attempt at `now`.
    ///
    /// The aggregator calls this before the HTTP request, so a feed whose
    /// fetch fails still moves to the back of the queue.
    pub async fn mark_fetched(
        &self,
        feed_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let result =
            sqlx::query("UPDATE feeds SET last_fetched_at = ?, updated_at = ? WHERE id = ?")
                .bind(now)
                .bind(now)
                .bind(feed_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("feed {feed_id}")));
        }
        Ok(())
    }
}
