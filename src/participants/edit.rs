use axum::{
    Form, debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::db::ProfilePatch;
use crate::ingest::dedup::DedupKey;
use crate::ingest::validate::validate_patch;
use crate::rooms;
use crate::session::Identity;
use crate::store::{SqliteStore, Store};
use crate::{AppResult, AppState};

/// Profile self-edit: only the owning participant may change the
/// org/phone/desc/photo fields; name and email stay fixed.
#[debug_handler(state = AppState)]
pub(crate) async fn edit_profile(
    State(db_pool): State<SqlitePool>,
    State(store): State<SqliteStore>,
    session: Session,
    Path(room_id): Path<Uuid>,
    Form(patch): Form<ProfilePatch>,
) -> AppResult<Response> {
    let Some(room) = rooms::fetch(&db_pool, room_id).await? else {
        return Ok((StatusCode::NOT_FOUND, "no such room").into_response());
    };

    let identity = Identity::from_session(&session).await?;
    let participants = store.list_participants(room_id).await?;
    let Some(me) = identity.find_own(room.kind, &participants) else {
        return Err("not a participant of this room".into());
    };

    if let Err(reasons) = validate_patch(&patch) {
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, reasons).into_response());
    }

    let key = if room.kind.is_public() {
        DedupKey::Name(me.name.clone())
    } else {
        DedupKey::Email(me.email.clone().unwrap_or_default())
    };
    store.update_participant(room_id, &key, &patch).await?;

    Ok(Redirect::to(&format!("/p/{room_id}")).into_response())
}
