//! Mention extraction and reconciliation.
//!
//! A message whose text carries at least one `@name` token enters the
//! `mentioned` state when sent. Answering it inserts a parallel `reply`
//! message carrying a back-reference and moves the original to `replied`
//! (terminal). The unanswered queue is exactly the set of messages still
//! in `mentioned`, recomputed from the full message list so duplicate or
//! late realtime events cannot corrupt it.

use std::sync::LazyLock;

use axum::{
    Form, Json, Router, debug_handler,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tower_sessions::Session;
use tracing::info;
use uuid::Uuid;

use crate::db::{Message, MessageStatus};
use crate::error::StoreError;
use crate::rooms;
use crate::session::Identity;
use crate::store::{SqliteStore, Store};
use crate::{AppResult, AppState, MessageEvent};

static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([A-Za-z0-9_-]+)").expect("mention pattern"));

/// All `@name` tokens in order of appearance, duplicates included.
/// Extraction is permissive: names are not resolved against the
/// participant list here.
pub fn extract_mentions(text: &str) -> Vec<String> {
    MENTION_RE
        .captures_iter(text)
        .map(|c| c[1].to_owned())
        .collect()
}

/// A mention-bearing message, derived on read and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MentionRecord {
    pub source_message_id: Uuid,
    pub mentioned_names: Vec<String>,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
    pub answered: bool,
}

impl MentionRecord {
    fn from_message(message: &Message) -> Self {
        Self {
            source_message_id: message.uuid,
            mentioned_names: extract_mentions(&message.content),
            author_name: message.author_name.clone(),
            created_at: message.created_at,
            answered: message.status == Some(MessageStatus::Replied),
        }
    }
}

/// The unanswered queue, preserving room insertion order.
pub fn compute_unanswered(messages: &[Message]) -> Vec<MentionRecord> {
    messages
        .iter()
        .filter(|m| m.status == Some(MessageStatus::Mentioned))
        .map(MentionRecord::from_message)
        .collect()
}

/// Every message mentioning `@<name>`, matched case-insensitively, input
/// order preserved. Used for a participant's mention feed.
pub fn messages_for_participant<'a>(messages: &'a [Message], name: &str) -> Vec<&'a Message> {
    let Ok(pattern) = Regex::new(&format!("(?i)@{}", regex::escape(name))) else {
        return Vec::new();
    };
    messages
        .iter()
        .filter(|m| pattern.is_match(&m.content))
        .collect()
}

/// The single reply pointing back at `original_id`, if one exists.
pub fn find_reply<'a>(messages: &'a [Message], original_id: Uuid) -> Option<&'a Message> {
    messages
        .iter()
        .find(|m| m.status == Some(MessageStatus::Reply) && m.replies_to == Some(original_id))
}

/// Persists a reply and marks its target answered. `mentioned -> replied`
/// is the only transition out of `mentioned` and is never reversed.
pub async fn mark_answered(
    store: &dyn Store,
    original_id: Uuid,
    reply: &Message,
) -> Result<(), StoreError> {
    debug_assert_eq!(reply.status, Some(MessageStatus::Reply));
    debug_assert_eq!(reply.replies_to, Some(original_id));
    store.insert_message(reply).await?;
    store.set_message_status(original_id, MessageStatus::Replied).await?;
    info!(message = %original_id, "mention answered");
    Ok(())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{room_id}/unanswered", get(unanswered))
        .route("/{room_id}/for/{name}", get(participant_feed))
        .route("/{room_id}/reply", post(reply))
}

#[debug_handler(state = AppState)]
async fn unanswered(
    Path(room_id): Path<Uuid>,
    State(store): State<SqliteStore>,
) -> AppResult<Json<Vec<MentionRecord>>> {
    let messages = store.list_messages(room_id).await?;
    Ok(Json(compute_unanswered(&messages)))
}

#[debug_handler(state = AppState)]
async fn participant_feed(
    Path((room_id, name)): Path<(Uuid, String)>,
    State(store): State<SqliteStore>,
) -> AppResult<Json<Vec<Message>>> {
    let messages = store.list_messages(room_id).await?;
    let feed = messages_for_participant(&messages, &name)
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(feed))
}

#[derive(Deserialize)]
struct ReplyForm {
    message_id: Uuid,
    content: String,
}

#[debug_handler(state = AppState)]
async fn reply(
    Path(room_id): Path<Uuid>,
    State(db_pool): State<sqlx::SqlitePool>,
    State(store): State<SqliteStore>,
    State(tx): State<broadcast::Sender<MessageEvent>>,
    session: Session,
    Form(ReplyForm { message_id, content }): Form<ReplyForm>,
) -> AppResult<Response> {
    if content.trim().is_empty() {
        return Err("reply content is empty".into());
    }

    let Some(room) = rooms::fetch(&db_pool, room_id).await? else {
        return Err("no such room".into());
    };
    let identity = Identity::from_session(&session).await?;
    let participants = store.list_participants(room_id).await?;
    let Some(me) = identity.find_own(room.kind, &participants) else {
        return Err("not a participant of this room".into());
    };

    let messages = store.list_messages(room_id).await?;
    let Some(original) = messages.iter().find(|m| m.uuid == message_id) else {
        return Err("no such message".into());
    };
    if original.status != Some(MessageStatus::Mentioned) {
        return Err("message is not awaiting a reply".into());
    }

    let reply = Message {
        uuid: Uuid::now_v7(),
        room_id,
        participant_id: me.uuid,
        author_name: me.name.clone(),
        content,
        status: Some(MessageStatus::Reply),
        replies_to: Some(message_id),
        created_at: Utc::now(),
    };
    mark_answered(&store, message_id, &reply).await?;

    let _ = tx.send((room_id, rooms::msg::render(&reply)));
    Ok(Redirect::to(&format!("/p/{room_id}")).into_response())
}
