//! Per-room document sharing over the blob seam. Files live under a
//! per-room prefix; the core ingestion/reconciliation logic never touches
//! this module.

use std::sync::Arc;

use axum::{
    Form, Router, debug_handler,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use tracing::info;
use uuid::Uuid;

use crate::res::escape;
use crate::rooms;
use crate::session::Identity;
use crate::store::BlobStore;
use crate::{AppResult, AppState, include_res};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{room_id}", get(docs_page))
        .route("/{room_id}/upload", post(upload))
        .route("/{room_id}/delete", post(delete))
        .route("/file/{room_id}/{name}", get(serve))
}

#[debug_handler(state = AppState)]
async fn docs_page(
    State(db_pool): State<SqlitePool>,
    State(blobs): State<Arc<dyn BlobStore>>,
    session: Session,
    Path(room_id): Path<Uuid>,
) -> AppResult<Response> {
    let Some(room) = rooms::fetch(&db_pool, room_id).await? else {
        return Ok((StatusCode::NOT_FOUND, "no such room").into_response());
    };
    let identity = Identity::from_session(&session).await?;
    if !identity.is_known() {
        return Ok(Redirect::to("/login").into_response());
    }

    let mut items = String::new();
    for path in blobs.list(&room_id.to_string()).await? {
        let name = path.rsplit('/').next().unwrap_or(&path).to_owned();
        items += &format!(
            "<li><a href=\"{}\">{}</a>",
            blobs.public_url(&path),
            escape(&name)
        );
        if identity.admin {
            items += &format!(
                "<form method=\"post\" action=\"/d/{room_id}/delete\">\
                 <input type=\"hidden\" name=\"name\" value=\"{}\"><button>x</button></form>",
                escape(&name)
            );
        }
        items += "</li>\n";
    }

    let body = include_res!(str, "/pages/docs.html")
        .replace("{room_id}", &room_id.to_string())
        .replace("{room_name}", &escape(&room.name))
        .replace("{files}", &items);
    Ok(Html(body).into_response())
}

#[debug_handler(state = AppState)]
async fn upload(
    State(blobs): State<Arc<dyn BlobStore>>,
    session: Session,
    Path(room_id): Path<Uuid>,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let identity = Identity::from_session(&session).await?;
    if !identity.is_known() {
        return Err("log in before uploading documents".into());
    }

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| anyhow::anyhow!("upload failed: {e}"))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let Some(name) = field.file_name().map(sanitize_file_name) else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| anyhow::anyhow!("upload failed: {e}"))?;
        blobs.upload(&format!("{room_id}/{name}"), &bytes).await?;
        info!(room = %room_id, file = %name, size = bytes.len(), "document uploaded");
    }

    Ok(Redirect::to(&format!("/d/{room_id}")).into_response())
}

#[derive(Deserialize)]
struct DeleteForm {
    name: String,
}

#[debug_handler(state = AppState)]
async fn delete(
    State(blobs): State<Arc<dyn BlobStore>>,
    session: Session,
    Path(room_id): Path<Uuid>,
    Form(DeleteForm { name }): Form<DeleteForm>,
) -> AppResult<Response> {
    let identity = Identity::from_session(&session).await?;
    if !identity.admin {
        return Err("only the case administrator can delete documents".into());
    }

    let name = sanitize_file_name(&name);
    blobs.delete(&[format!("{room_id}/{name}")]).await?;
    info!(room = %room_id, file = %name, "document deleted");
    Ok(Redirect::to(&format!("/d/{room_id}")).into_response())
}

#[debug_handler(state = AppState)]
async fn serve(
    State(blobs): State<Arc<dyn BlobStore>>,
    Path((room_id, name)): Path<(Uuid, String)>,
) -> AppResult<Response> {
    let name = sanitize_file_name(&name);
    match blobs.read(&format!("{room_id}/{name}")).await {
        Ok(bytes) => Ok((
            [(header::CONTENT_TYPE, "application/octet-stream")],
            bytes,
        )
            .into_response()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Ok((StatusCode::NOT_FOUND, "no such document").into_response())
        }
        Err(e) => Err(e.into()),
    }
}

fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_lose_separators_and_leading_dots() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_file_name("report.pdf"), "report.pdf");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
    }
}
