use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{GuestbookRepo, RepoError},
    domain::guestbook::{GuestbookEntry, NewGuestbookEntry},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct GuestbookRow {
    id: i64,
    message: String,
    user_id: String,
    user_name: String,
    user_email: Option<String>,
    user_image: Option<String>,
    created_at: OffsetDateTime,
}

impl From<GuestbookRow> for GuestbookEntry {
    fn from(row: GuestbookRow) -> Self {
        Self {
            id: row.id,
            message: row.message,
            user_id: row.user_id,
            user_name: row.user_name,
            user_email: row.user_email,
            user_image: row.user_image,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl GuestbookRepo for PostgresRepositories {
    async fn list_recent(&self, limit: u32) -> Result<Vec<GuestbookEntry>, RepoError> {
        let rows = sqlx::query_as::<_, GuestbookRow>(
            r#"
            SELECT id, message, user_id, user_name, user_email, user_image, created_at
            FROM guestbook_entries
            ORDER BY created_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(GuestbookEntry::from).collect())
    }

    async fn insert(&self, entry: NewGuestbookEntry) -> Result<GuestbookEntry, RepoError> {
        let row = sqlx::query_as::<_, GuestbookRow>(
            r#"
            INSERT INTO guestbook_entries (message, user_id, user_name, user_email, user_image)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, message, user_id, user_name, user_email, user_image, created_at
            "#,
        )
        .bind(entry.message.as_str())
        .bind(&entry.user_id)
        .bind(&entry.user_name)
        .bind(&entry.user_email)
        .bind(&entry.user_image)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }
}
