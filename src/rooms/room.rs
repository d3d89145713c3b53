use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use sqlx::SqlitePool;
use tower_sessions::Session;
use tracing::info;
use uuid::Uuid;

use crate::res::escape;
use crate::session::Identity;
use crate::store::{SqliteStore, Store};
use crate::{AppResult, AppState, include_res};

use super::{fetch, msg};

fn sorry() -> Response {
    (StatusCode::NOT_FOUND, Html(include_res!(str, "/pages/sorry.html"))).into_response()
}

#[debug_handler(state = AppState)]
pub(crate) async fn room(
    State(db_pool): State<SqlitePool>,
    State(store): State<SqliteStore>,
    session: Session,
    Path(room_id): Path<Uuid>,
) -> AppResult<Response> {
    let Some(room) = fetch(&db_pool, room_id).await? else {
        return Ok(sorry());
    };

    let identity = Identity::from_session(&session).await?;
    let participants = store.list_participants(room_id).await?;
    let me = identity.find_own(room.kind, &participants);

    // private rooms are only visible to their participants
    if !room.kind.is_public() && me.is_none() && !identity.admin {
        return Ok(sorry());
    }

    let messages = store.list_messages(room_id).await?;
    let mut rendered = String::new();
    for message in &messages {
        rendered += &msg::render(message);
    }

    let chat = match me {
        Some(me) => include_res!(str, "/pages/rooms/chat.html")
            .replace("{chat_name}", &escape(&me.name)),
        None => {
            if room.kind.is_public() {
                "<p class=\"muted\">Your name is not in the participants list</p>".to_owned()
            } else {
                "<p class=\"muted\">Not Added in the Parties</p>".to_owned()
            }
        }
    };

    let body = include_res!(str, "/pages/rooms/room.html")
        .replace("{room_id}", &room_id.to_string())
        .replace("{room_name}", &escape(&room.name))
        .replace("{messages}", &rendered)
        .replace("{chat}", &chat);
    Ok(Html(body).into_response())
}

#[debug_handler]
pub(crate) async fn delete_message(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path((room_id, msg_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Response> {
    let identity = Identity::from_session(&session).await?;
    if !identity.admin {
        return Err("only the case administrator can delete messages".into());
    }

    sqlx::query("DELETE FROM messages WHERE uuid=? AND room_id=?")
        .bind(msg_id.to_string())
        .bind(room_id.to_string())
        .execute(&db_pool)
        .await?;
    info!(room = %room_id, message = %msg_id, "message deleted");

    Ok(Redirect::to(&format!("/r/{room_id}")).into_response())
}
