use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use time::OffsetDateTime;
use uuid::Uuid;

/// A stored chat message. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Uuid,
    pub uid: String,
    pub text: String,
    pub created_at: OffsetDateTime,
    pub photo_url: Option<String>,
}

/// A message on its way to the store; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub uid: String,
    pub text: String,
    pub photo_url: String,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct MessageRow {
    pub(crate) id: String,
    pub(crate) uid: String,
    pub(crate) text: String,
    pub(crate) photo_url: String,
    pub(crate) created_at: i64,
}

impl TryFrom<MessageRow> for Message {
    type Error = String;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id).map_err(|e| format!("bad id {:?}: {e}", row.id))?;
        let created_at = OffsetDateTime::from_unix_timestamp_nanos(i128::from(row.created_at) * 1_000_000)
            .map_err(|e| format!("bad created_at {} on {id}: {e}", row.created_at))?;

        Ok(Message {
            id,
            uid: row.uid,
            text: row.text,
            created_at,
            photo_url: Some(row.photo_url).filter(|url| !url.is_empty()),
        })
    }
}

pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&db_pool).await?;
    Ok(db_pool)
}
