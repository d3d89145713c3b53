use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::db::{Message, MessageStatus, Participant};
use crate::error::StoreError;
use crate::mentions::extract_mentions;
use crate::res::escape;
use crate::store::Store;
use crate::{MessageEvent, include_res};

/// Incoming websocket frame payload.
#[derive(serde::Deserialize)]
pub struct SendMessageQuery {
    pub content: String,
}

/// Stores one chat message and fans the rendered fragment out to the
/// room's websockets. A message carrying at least one @mention enters
/// the `mentioned` state immediately.
pub async fn send_msg(
    store: &dyn Store,
    tx: &broadcast::Sender<MessageEvent>,
    author: &Participant,
    room_id: Uuid,
    content: String,
) -> Result<Option<Message>, StoreError> {
    let content = content.trim().to_owned();
    if content.is_empty() {
        return Ok(None);
    }

    let status = if extract_mentions(&content).is_empty() {
        None
    } else {
        Some(MessageStatus::Mentioned)
    };
    let message = Message {
        uuid: Uuid::now_v7(),
        room_id,
        participant_id: author.uuid,
        author_name: author.name.clone(),
        content,
        status,
        replies_to: None,
        created_at: chrono::Utc::now(),
    };
    store.insert_message(&message).await?;
    debug!(room = %room_id, message = %message.uuid, "message stored");

    let _ = tx.send((room_id, render(&message)));
    Ok(Some(message))
}

/// Renders one message as the HTML fragment both the room page and the
/// websocket stream use.
pub fn render(message: &Message) -> String {
    let status_badge = match message.status {
        Some(MessageStatus::Mentioned) => "Pending",
        Some(MessageStatus::Replied) => "Replied",
        Some(MessageStatus::Reply) => "Reply",
        None => "",
    };
    include_res!(str, "/pages/rooms/message.html")
        .replace("{id}", &message.uuid.to_string())
        .replace("{author}", &escape(&message.author_name))
        .replace("{content}", &escape(&message.content))
        .replace("{status}", status_badge)
        .replace(
            "{created_at}",
            &message.created_at.format("%b %e, %Y, %I:%M %p").to_string(),
        )
}
