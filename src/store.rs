//! Persistence seams consumed by the core.
//!
//! `Store` covers the participant and message tables the ingestion
//! pipeline and the reconciliation engine touch; handlers that only
//! render rooms or content pages keep using the pool directly.
//! `BlobStore` backs the document-sharing feature.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::{Message, MessageStatus, Participant, ProfilePatch};
use crate::error::StoreError;
use crate::ingest::dedup::DedupKey;

#[async_trait]
pub trait Store: Send + Sync {
    /// Existence check for the room-scoped unique key. Fast path only:
    /// the unique indexes still decide under concurrency.
    async fn participant_exists(&self, room_id: Uuid, key: &DedupKey) -> Result<bool, StoreError>;

    async fn insert_participant(&self, participant: &Participant) -> Result<(), StoreError>;

    /// Inserts one batch atomically. Callers sequence batches themselves
    /// and stop at the first failure; committed batches stay committed.
    async fn insert_participants(&self, batch: &[Participant]) -> Result<(), StoreError>;

    async fn update_participant(
        &self,
        room_id: Uuid,
        key: &DedupKey,
        patch: &ProfilePatch,
    ) -> Result<(), StoreError>;

    async fn list_participants(&self, room_id: Uuid) -> Result<Vec<Participant>, StoreError>;

    /// Messages in room insertion order, author names resolved.
    async fn list_messages(&self, room_id: Uuid) -> Result<Vec<Message>, StoreError>;

    async fn insert_message(&self, message: &Message) -> Result<(), StoreError>;

    async fn set_message_status(
        &self,
        message_id: Uuid,
        status: MessageStatus,
    ) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn map_insert_err(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            let field = if db.message().contains("email") { "email" } else { "name" };
            return StoreError::Duplicate { field };
        }
    }
    StoreError::Database(err)
}

async fn insert_participant_tx<'e, E>(executor: E, p: &Participant) -> Result<(), StoreError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        "INSERT INTO participants \
         (uuid,room_id,name,email,phone,org,photo_url,description,created_at) \
         VALUES (?,?,?,?,?,?,?,?,?)",
    )
    .bind(p.uuid.to_string())
    .bind(p.room_id.to_string())
    .bind(&p.name)
    .bind(&p.email)
    .bind(&p.phone)
    .bind(&p.org)
    .bind(&p.photo_url)
    .bind(&p.description)
    .bind(p.created_at)
    .execute(executor)
    .await
    .map_err(map_insert_err)?;
    Ok(())
}

type ParticipantRow = (
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    DateTime<Utc>,
);

fn participant_from_row(row: ParticipantRow) -> Result<Participant, StoreError> {
    let (uuid, room_id, name, email, phone, org, photo_url, description, created_at) = row;
    Ok(Participant {
        uuid: parse_uuid(&uuid)?,
        room_id: parse_uuid(&room_id)?,
        name,
        email,
        phone,
        org,
        photo_url,
        description,
        created_at,
    })
}

pub fn trimmed_or_null(value: &str) -> Option<&str> {
    let value = value.trim();
    if value.is_empty() { None } else { Some(value) }
}

fn parse_uuid(value: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(value).map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(e))))
}

#[async_trait]
impl Store for SqliteStore {
    async fn participant_exists(&self, room_id: Uuid, key: &DedupKey) -> Result<bool, StoreError> {
        let query = match key {
            DedupKey::Name(_) => "SELECT 1 FROM participants WHERE room_id=? AND name=?",
            DedupKey::Email(_) => "SELECT 1 FROM participants WHERE room_id=? AND email=?",
        };
        let found = sqlx::query_as::<_, (i64,)>(query)
            .bind(room_id.to_string())
            .bind(key.value())
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    async fn insert_participant(&self, participant: &Participant) -> Result<(), StoreError> {
        insert_participant_tx(&self.pool, participant).await
    }

    async fn insert_participants(&self, batch: &[Participant]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for participant in batch {
            insert_participant_tx(&mut *tx, participant).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn update_participant(
        &self,
        room_id: Uuid,
        key: &DedupKey,
        patch: &ProfilePatch,
    ) -> Result<(), StoreError> {
        let query = match key {
            DedupKey::Name(_) => {
                "UPDATE participants SET org=?,phone=?,description=?,photo_url=? \
                 WHERE room_id=? AND name=?"
            }
            DedupKey::Email(_) => {
                "UPDATE participants SET org=?,phone=?,description=?,photo_url=? \
                 WHERE room_id=? AND email=?"
            }
        };
        // blanked fields go back to NULL, same as on ingestion
        let result = sqlx::query(query)
            .bind(trimmed_or_null(&patch.org))
            .bind(trimmed_or_null(&patch.phone))
            .bind(trimmed_or_null(&patch.description))
            .bind(trimmed_or_null(&patch.photo_url))
            .bind(room_id.to_string())
            .bind(key.value())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("participant"));
        }
        Ok(())
    }

    async fn list_participants(&self, room_id: Uuid) -> Result<Vec<Participant>, StoreError> {
        let rows: Vec<ParticipantRow> = sqlx::query_as(
            "SELECT uuid,room_id,name,email,phone,org,photo_url,description,created_at \
             FROM participants WHERE room_id=? ORDER BY created_at",
        )
        .bind(room_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(participant_from_row).collect()
    }

    async fn list_messages(&self, room_id: Uuid) -> Result<Vec<Message>, StoreError> {
        type Row = (
            String,
            String,
            String,
            String,
            Option<String>,
            Option<String>,
            DateTime<Utc>,
        );
        let rows: Vec<Row> = sqlx::query_as(
            "SELECT m.uuid,m.participant_id,COALESCE(p.name,'Unknown'),m.content,\
             m.status,m.replies_to,m.created_at \
             FROM messages m LEFT JOIN participants p ON p.uuid=m.participant_id \
             WHERE m.room_id=? ORDER BY m.created_at",
        )
        .bind(room_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(uuid, participant_id, author_name, content, status, replies_to, created_at)| {
                Ok(Message {
                    uuid: parse_uuid(&uuid)?,
                    room_id,
                    participant_id: parse_uuid(&participant_id)?,
                    author_name,
                    content,
                    status: status.as_deref().and_then(MessageStatus::from_db),
                    replies_to: replies_to.as_deref().map(parse_uuid).transpose()?,
                    created_at,
                })
            })
            .collect()
    }

    async fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO messages (uuid,room_id,participant_id,content,status,replies_to,created_at) \
             VALUES (?,?,?,?,?,?,?)",
        )
        .bind(message.uuid.to_string())
        .bind(message.room_id.to_string())
        .bind(message.participant_id.to_string())
        .bind(&message.content)
        .bind(message.status.map(MessageStatus::as_str))
        .bind(message.replies_to.as_ref().map(Uuid::to_string))
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_message_status(
        &self,
        message_id: Uuid,
        status: MessageStatus,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE messages SET status=? WHERE uuid=?")
            .bind(status.as_str())
            .bind(message_id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("message"));
        }
        Ok(())
    }
}

/// Blob seam for the surrounding document feature. Out of scope for the
/// ingestion/reconciliation core.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn list(&self, prefix: &str) -> std::io::Result<Vec<String>>;
    async fn upload(&self, path: &str, bytes: &[u8]) -> std::io::Result<()>;
    async fn delete(&self, paths: &[String]) -> std::io::Result<()>;
    async fn read(&self, path: &str) -> std::io::Result<Vec<u8>>;
    fn public_url(&self, path: &str) -> String;
}

pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> std::io::Result<PathBuf> {
        let rel = Path::new(path);
        if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "path escapes blob root",
            ));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn list(&self, prefix: &str) -> std::io::Result<Vec<String>> {
        let dir = self.resolve(prefix)?;
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(format!("{prefix}/{}", entry.file_name().to_string_lossy()));
            }
        }
        names.sort();
        Ok(names)
    }

    async fn upload(&self, path: &str, bytes: &[u8]) -> std::io::Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(full, bytes).await
    }

    async fn delete(&self, paths: &[String]) -> std::io::Result<()> {
        for path in paths {
            tokio::fs::remove_file(self.resolve(path)?).await?;
        }
        Ok(())
    }

    async fn read(&self, path: &str) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(self.resolve(path)?).await
    }

    fn public_url(&self, path: &str) -> String {
        format!("/d/file/{path}")
    }
}
