use uuid::Uuid;

use super::schema::Database;
use super::types::{DatabaseError, Post};

/// Maximum number of posts to return from any single query (OOM protection)
const MAX_POSTS: i64 = 2000;

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Insert a post exactly as given.
    ///
    /// Posts are never updated: if another post already has this URL the
    /// insert fails with `DatabaseError::Duplicate` and the stored row is left
    /// untouched. The feed must exist (foreign key).
    pub async fn create_post(&self, post: &Post) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, created_at, updated_at, title, url, description, published_at, feed_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(post.id)
        .bind(post.created_at)
        .bind(post.updated_at)
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(post.published_at)
        .bind(post.feed_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Newest posts from the feeds `user_id` follows.
    ///
    /// Ordered by publish date (posts without one last), capped at
    /// MAX_POSTS regardless of `limit`.
    pub async fn list_posts_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Post>, DatabaseError> {
        let limit = limit.clamp(0, MAX_POSTS);
        tracing::debug!(user_id = %user_id, limit = limit, "list_posts_for_user");

        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT p.id, p.created_at, p.updated_at, p.title, p.url, p.description,
                   p.published_at, p.feed_id
            FROM posts p
            JOIN feed_follows ff ON ff.feed_id = p.feed_id
            WHERE ff.user_id = ?
            ORDER BY p.published_at IS NULL, p.published_at DESC, p.created_at DESC
            LIMIT ?
        "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    /// All posts stored for one feed, newest first
    pub async fn get_posts_for_feed(&self, feed_id: Uuid) -> Result<Vec<Post>, DatabaseError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, created_at, updated_at, title, url, description, published_at, feed_id
            FROM posts
            WHERE feed_id = ?
            ORDER BY published_at IS NULL, published_at DESC, created_at DESC
            LIMIT ?
        "#,
        )
        .bind(feed_id)
        .bind(MAX_POSTS)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    pub async fn count_posts(&self) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
