//! Row models and schema migration.
//!
//! Uuids are stored as TEXT, timestamps as RFC 3339 TEXT. The unique
//! indexes on `(room_id, name)` and `(room_id, email)` are the last line
//! of defense against concurrent imports racing past the pre-insert
//! existence check; the store maps violations to `StoreError::Duplicate`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS rooms (
    uuid TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    kind TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS participants (
    uuid TEXT PRIMARY KEY,
    room_id TEXT NOT NULL REFERENCES rooms(uuid),
    name TEXT NOT NULL,
    email TEXT,
    phone TEXT,
    org TEXT,
    photo_url TEXT,
    description TEXT,
    created_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS participants_room_name
    ON participants(room_id, name);
CREATE UNIQUE INDEX IF NOT EXISTS participants_room_email
    ON participants(room_id, email) WHERE email IS NOT NULL;

CREATE TABLE IF NOT EXISTS messages (
    uuid TEXT PRIMARY KEY,
    room_id TEXT NOT NULL REFERENCES rooms(uuid),
    participant_id TEXT NOT NULL REFERENCES participants(uuid),
    content TEXT NOT NULL,
    status TEXT,
    replies_to TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS content (
    uuid TEXT PRIMARY KEY,
    room_id TEXT NOT NULL REFERENCES rooms(uuid),
    title TEXT NOT NULL,
    body TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}

/// Which identity field is authoritative for participant matching:
/// public rooms key by name, normal rooms by email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    Normal,
    Public,
}

impl RoomKind {
    pub fn is_public(self) -> bool {
        self == Self::Public
    }

    // stored as 'public' or NULL in the kind column
    pub fn from_db(value: Option<&str>) -> Self {
        match value {
            Some("public") => Self::Public,
            _ => Self::Normal,
        }
    }

    pub fn as_db(self) -> Option<&'static str> {
        match self {
            Self::Public => Some("public"),
            Self::Normal => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Room {
    pub uuid: Uuid,
    pub name: String,
    pub kind: RoomKind,
    pub created_at: DateTime<Utc>,
}

/// A person permitted to chat in a room. Never hard-deleted by the core.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Participant {
    pub uuid: Uuid,
    pub room_id: Uuid,
    pub name: String,
    /// NULL in public rooms; lowercased and unique per room otherwise.
    pub email: Option<String>,
    pub phone: Option<String>,
    pub org: Option<String>,
    pub photo_url: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The self-editable subset of a participant profile.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProfilePatch {
    pub org: String,
    pub phone: String,
    pub description: String,
    pub photo_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Carries at least one @mention and no reply yet.
    Mentioned,
    /// Terminal: exactly one `Reply` message points back at it.
    Replied,
    /// The reply itself, with `replies_to` set.
    Reply,
}

impl MessageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mentioned => "mentioned",
            Self::Replied => "replied",
            Self::Reply => "reply",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "mentioned" => Some(Self::Mentioned),
            "replied" => Some(Self::Replied),
            "reply" => Some(Self::Reply),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub uuid: Uuid,
    pub room_id: Uuid,
    pub participant_id: Uuid,
    /// Resolved from the participants table on read; ignored on insert.
    pub author_name: String,
    pub content: String,
    pub status: Option<MessageStatus>,
    pub replies_to: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
