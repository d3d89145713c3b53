pub mod auth;
pub mod content;
pub mod db;
pub mod docs;
pub mod error;
pub mod ingest;
pub mod mentions;
pub mod participants;
pub mod res;
pub mod rooms;
pub mod session;
pub mod store;

use std::sync::Arc;

use axum::{
    extract::FromRef,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use uuid::Uuid;

use store::{BlobStore, SqliteStore};

/// One broadcast event per stored message: room id plus the rendered
/// message fragment, fanned out to that room's open websockets.
pub type MessageEvent = (Uuid, String);

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub store: SqliteStore,
    pub blobs: Arc<dyn BlobStore>,
    pub tx: broadcast::Sender<MessageEvent>,
}

pub type AppResult<T> = Result<T, AppError>;
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = ?self.0, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()).into_response()
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        Self(anyhow::Error::msg(err))
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self(anyhow::Error::msg(err.to_owned()))
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(anyhow::Error);
apperr_impl!(std::io::Error);
apperr_impl!(serde_json::Error);
apperr_impl!(sqlx::Error);
apperr_impl!(tower_sessions::session::Error);
apperr_impl!(axum::Error);
apperr_impl!(uuid::Error);
apperr_impl!(error::StoreError);
apperr_impl!(error::AddError);
apperr_impl!(error::ImportError);

/// Renders untrusted markdown to HTML with the GFM extensions the
/// content pages rely on.
pub fn render_markdown(text: &str) -> String {
    use pulldown_cmark::{Options, Parser};

    let options =
        Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let mut html_output = String::new();
    pulldown_cmark::html::push_html(&mut html_output, Parser::new_ext(text, options));
    html_output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_errors_convert_from_every_plumbing_type() {
        // multipart handlers map field failures through anyhow before `?`
        let err: AppError = anyhow::anyhow!("field read failed").into();
        assert_eq!(err.0.to_string(), "field read failed");

        let err: AppError = "plain message".into();
        assert_eq!(err.0.to_string(), "plain message");
    }
}
