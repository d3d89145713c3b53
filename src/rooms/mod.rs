mod index;
pub mod msg;
mod new;
mod room;
mod ws;

use axum::{
    Router,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::{Room, RoomKind};
use crate::{AppResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index::rooms_index))
        .route("/new", get(new::new_room_page).post(new::new_room))
        .route("/{uuid}", get(room::room))
        .route("/{uuid}/ws", get(ws::room_ws))
        .route("/{uuid}/msg/{msg_id}/delete", post(room::delete_message))
}

pub async fn fetch(db_pool: &SqlitePool, uuid: Uuid) -> AppResult<Option<Room>> {
    let row: Option<(String, String, Option<String>, DateTime<Utc>)> =
        sqlx::query_as("SELECT uuid,name,kind,created_at FROM rooms WHERE uuid=?")
            .bind(uuid.to_string())
            .fetch_optional(db_pool)
            .await?;

    let Some((uuid, name, kind, created_at)) = row else {
        return Ok(None);
    };
    Ok(Some(Room {
        uuid: Uuid::parse_str(&uuid)?,
        name,
        kind: RoomKind::from_db(kind.as_deref()),
        created_at,
    }))
}
