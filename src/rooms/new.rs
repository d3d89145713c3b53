use axum::{
    Form, debug_handler,
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::RoomKind;
use crate::ingest::{self, normalize::RawRow};
use crate::session::Identity;
use crate::store::SqliteStore;
use crate::{AppResult, AppState, include_res};

#[derive(Debug, Deserialize)]
pub(crate) struct NewRoomQuery {
    name: String,
    kind: RoomKind,
}

#[debug_handler]
pub(crate) async fn new_room_page(session: Session) -> AppResult<Response> {
    let identity = Identity::from_session(&session).await?;
    if !identity.admin {
        return Ok(Redirect::to("/login?return_url=/r/new").into_response());
    }
    Ok(Html(include_res!(str, "/pages/new_room.html")).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn new_room(
    State(db_pool): State<SqlitePool>,
    State(store): State<SqliteStore>,
    session: Session,
    Form(NewRoomQuery { name, kind }): Form<NewRoomQuery>,
) -> AppResult<Response> {
    let identity = Identity::from_session(&session).await?;
    if !identity.admin {
        return Err("only the case administrator can create rooms".into());
    }
    if name.trim().is_empty() {
        return Err("room name is empty".into());
    }

    let uuid = Uuid::now_v7();
    sqlx::query("INSERT INTO rooms (uuid,name,kind,created_at) VALUES (?,?,?,?)")
        .bind(uuid.to_string())
        .bind(name.trim())
        .bind(kind.as_db())
        .bind(chrono::Utc::now())
        .execute(&db_pool)
        .await?;
    info!(room = %uuid, ?kind, "room created");

    // seed the creating identity as the room's first participant; the
    // room is still usable if their details do not pass validation
    let seed = RawRow {
        name: identity.name.clone().unwrap_or_default(),
        email: identity.email.clone().unwrap_or_default(),
        ..RawRow::default()
    };
    if let Err(e) = ingest::add_single(&store, uuid, kind, seed).await {
        warn!(room = %uuid, error = %e, "could not seed creator participant");
    }

    Ok(Redirect::to(&format!("/r/{uuid}")).into_response())
}
