//! Per-room rich-text content pages: titled markdown sections, newest
//! first, rendered server-side.

use axum::{
    Form, Router, debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use tracing::info;
use uuid::Uuid;

use crate::res::escape;
use crate::rooms;
use crate::session::Identity;
use crate::{AppResult, AppState, include_res, render_markdown};

pub fn router() -> Router<AppState> {
    Router::new().route("/{room_id}", get(content_page).post(add_content))
}

#[debug_handler]
async fn content_page(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(room_id): Path<Uuid>,
) -> AppResult<Response> {
    let Some(room) = rooms::fetch(&db_pool, room_id).await? else {
        return Ok((StatusCode::NOT_FOUND, "no such room").into_response());
    };
    let identity = Identity::from_session(&session).await?;

    let items: Vec<(String, String, DateTime<Utc>)> = sqlx::query_as(
        "SELECT title,body,created_at FROM content WHERE room_id=? ORDER BY created_at DESC",
    )
    .bind(room_id.to_string())
    .fetch_all(&db_pool)
    .await?;

    let mut sections = String::new();
    for (title, body, created_at) in items {
        sections += &format!(
            "<details open><summary>{} <span class=\"muted\">{}</span></summary>{}</details>\n",
            escape(&title),
            created_at.format("%b %e, %Y"),
            render_markdown(&body),
        );
    }

    let form = if identity.admin {
        include_res!(str, "/pages/content_form.html")
    } else {
        ""
    };

    let body = include_res!(str, "/pages/content.html")
        .replace("{room_id}", &room_id.to_string())
        .replace("{room_name}", &escape(&room.name))
        .replace("{sections}", &sections)
        .replace("{form}", form);
    Ok(Html(body).into_response())
}

#[derive(Deserialize)]
struct NewContent {
    title: String,
    body: String,
}

#[debug_handler]
async fn add_content(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(room_id): Path<Uuid>,
    Form(NewContent { title, body }): Form<NewContent>,
) -> AppResult<Response> {
    let identity = Identity::from_session(&session).await?;
    if !identity.admin {
        return Err("only the case administrator can publish content".into());
    }
    if title.trim().is_empty() || body.trim().is_empty() {
        return Err("title and content are both required".into());
    }

    let uuid = Uuid::now_v7();
    sqlx::query("INSERT INTO content (uuid,room_id,title,body,created_at) VALUES (?,?,?,?,?)")
        .bind(uuid.to_string())
        .bind(room_id.to_string())
        .bind(title.trim())
        .bind(body.trim())
        .bind(Utc::now())
        .execute(&db_pool)
        .await?;
    info!(room = %room_id, content = %uuid, "content published");

    Ok(Redirect::to(&format!("/c/{room_id}")).into_response())
}
