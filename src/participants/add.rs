use axum::{
    Form, debug_handler,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::error::{AddError, ImportError};
use crate::ingest::{self, normalize::RawRow};
use crate::rooms;
use crate::session::Identity;
use crate::store::SqliteStore;
use crate::{AppResult, AppState};

#[derive(Debug, Deserialize)]
pub(crate) struct AddParticipantForm {
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    phone: String,
    #[serde(default)]
    org: String,
    #[serde(default)]
    photourl: String,
    #[serde(default)]
    desc: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn add_single(
    State(db_pool): State<SqlitePool>,
    State(store): State<SqliteStore>,
    session: Session,
    Path(room_id): Path<Uuid>,
    Form(form): Form<AddParticipantForm>,
) -> AppResult<Response> {
    let Some(room) = rooms::fetch(&db_pool, room_id).await? else {
        return Ok((StatusCode::NOT_FOUND, "no such room").into_response());
    };
    let identity = Identity::from_session(&session).await?;
    if !identity.admin {
        return Err("only the case administrator can add participants".into());
    }

    let row = RawRow {
        name: form.name,
        email: form.email,
        phone: form.phone,
        org: form.org,
        photo_url: form.photourl,
        desc: form.desc,
    };
    match ingest::add_single(&store, room_id, room.kind, row).await {
        Ok(_) => Ok(Redirect::to(&format!("/p/{room_id}")).into_response()),
        Err(e @ (AddError::Invalid(_) | AddError::Duplicate(_))) => {
            Ok((StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response())
        }
        Err(AddError::Store(e)) => Err(e.into()),
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn add_bulk(
    State(db_pool): State<SqlitePool>,
    State(store): State<SqliteStore>,
    session: Session,
    Path(room_id): Path<Uuid>,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let Some(room) = rooms::fetch(&db_pool, room_id).await? else {
        return Ok((StatusCode::NOT_FOUND, "no such room").into_response());
    };
    let identity = Identity::from_session(&session).await?;
    if !identity.admin {
        return Err("only the case administrator can add participants".into());
    }

    let mut csv_text = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| anyhow::anyhow!("upload failed: {e}"))?
    {
        if field.name() == Some("file") {
            let name = field.file_name().unwrap_or_default();
            if !name.is_empty() && !name.to_lowercase().ends_with(".csv") {
                return Ok((
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "Please upload a CSV file",
                )
                    .into_response());
            }
            csv_text = Some(
                field
                    .text()
                    .await
                    .map_err(|e| anyhow::anyhow!("upload failed: {e}"))?,
            );
        }
    }
    let Some(csv_text) = csv_text else {
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, "Please select a file first").into_response());
    };

    match ingest::add_bulk(&store, room_id, room.kind, &csv_text).await {
        Ok(summary) => Ok(summary.to_string().into_response()),
        Err(e @ ImportError::Parse(_)) => {
            Ok((StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response())
        }
        Err(ImportError::Store(e)) => Err(e.into()),
    }
}
