use axum::{
    debug_handler,
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::res::escape;
use crate::session::Identity;
use crate::{AppResult, include_res};

#[debug_handler]
pub(crate) async fn rooms_index(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Response> {
    let identity = Identity::from_session(&session).await?;
    if !identity.is_known() {
        return Ok(Redirect::to("/login?return_url=/r").into_response());
    }

    let rooms: Vec<(String, String, Option<String>, DateTime<Utc>)> =
        sqlx::query_as("SELECT uuid,name,kind,created_at FROM rooms ORDER BY created_at DESC")
            .fetch_all(&db_pool)
            .await?;

    let mut items = String::new();
    for (uuid, name, kind, created_at) in rooms {
        let badge = match kind.as_deref() {
            Some("public") => " <span class=\"badge\">public</span>",
            _ => "",
        };
        items += &format!(
            "<li><a href=\"/r/{uuid}\">{}</a>{badge} <span class=\"muted\">{}</span></li>\n",
            escape(&name),
            created_at.format("%b %e, %Y"),
        );
    }

    let body = include_res!(str, "/pages/rooms/index.html").replace("{rooms}", &items);
    Ok(Html(body).into_response())
}
