//! The remote message collection: append-only writes and a windowed read.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::{Message, MessageRow, NewMessage};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid message record: {0}")]
    InvalidRecord(String),
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Appends a message, returning it with its storage-assigned id and timestamp.
    async fn add(&self, message: NewMessage) -> Result<Message, StoreError>;

    /// The most recent `limit` messages, oldest first.
    async fn latest(&self, limit: usize) -> Result<Vec<Message>, StoreError>;
}

#[derive(Clone)]
pub struct SqliteMessageStore {
    db_pool: SqlitePool,
}

impl SqliteMessageStore {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn add(&self, NewMessage { uid, text, photo_url }: NewMessage) -> Result<Message, StoreError> {
        let row: MessageRow = sqlx::query_as(
            "INSERT INTO messages (id,uid,text,photo_url) VALUES (?,?,?,?) \
             RETURNING id,uid,text,photo_url,created_at",
        )
        .bind(Uuid::now_v7().to_string())
        .bind(uid)
        .bind(text)
        .bind(photo_url)
        .fetch_one(&self.db_pool)
        .await?;

        Message::try_from(row).map_err(StoreError::InvalidRecord)
    }

    async fn latest(&self, limit: usize) -> Result<Vec<Message>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id,uid,text,photo_url,created_at FROM ( \
                 SELECT seq,id,uid,text,photo_url,created_at FROM messages \
                 ORDER BY created_at DESC, seq DESC LIMIT ? \
             ) ORDER BY created_at ASC, seq ASC",
        )
        .bind(limit)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match Message::try_from(row) {
                Ok(message) => Some(message),
                Err(reason) => {
                    tracing::warn!(%reason, "skipping invalid message record");
                    None
                }
            })
            .collect())
    }
}
