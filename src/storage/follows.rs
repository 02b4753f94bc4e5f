use chrono::Utc;
use uuid::Uuid;

use super::schema::Database;
use super::types::{DatabaseError, FeedFollow};

impl Database {
    // ========================================================================
    // Follow Operations
    // ========================================================================

    /// Subscribe `user_id` to `feed_id`, returning the follow with both names.
    ///
    /// Following the same feed twice fails with `DatabaseError::Duplicate`.
    pub async fn create_feed_follow(
        &self,
        user_id: Uuid,
        feed_id: Uuid,
    ) -> Result<FeedFollow, DatabaseError> {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO feed_follows (id, created_at, updated_at, user_id, feed_id)
            VALUES (?, ?, ?, ?, ?)
        "#,
        )
        .bind(id)
        .bind(now)
        .bind(now)
        .bind(user_id)
        .bind(feed_id)
        .execute(&mut *tx)
        .await?;

        let follow = sqlx::query_as::<_, FeedFollow>(
            r#"
            SELECT ff.id, ff.created_at, ff.updated_at, ff.user_id, ff.feed_id,
                   f.name AS feed_name, u.name AS user_name
            FROM feed_follows ff
            JOIN feeds f ON f.id = ff.feed_id
            JOIN users u ON u.id = ff.user_id
            WHERE ff.id = ?
        "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(follow)
    }

    /// Feeds followed by `user_id`, oldest follow first
    pub async fn feed_follows_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<FeedFollow>, DatabaseError> {
        let follows = sqlx::query_as::<_, FeedFollow>(
            r#"
            SELECT ff.id, ff.created_at, ff.updated_at, ff.user_id, ff.feed_id,
                   f.name AS feed_name, u.name AS user_name
            FROM feed_follows ff
            JOIN feeds f ON f.id = ff.feed_id
            JOIN users u ON u.id = ff.user_id
            WHERE ff.user_id = ?
            ORDER BY ff.created_at, ff.rowid
        "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(follows)
    }

    /// Remove a follow, returns whether one existed
    pub async fn delete_feed_follow(
        &self,
        user_id: Uuid,
        feed_id: Uuid,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM feed_follows WHERE user_id = ? AND feed_id = ?")
            .bind(user_id)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
