use std::sync::Arc;

use axum::{
    Router, debug_handler,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use caseroom::{
    AppResult, AppState, auth, content, db, docs, include_res, mentions, participants, rooms,
    session::Identity, store,
};
use sqlx::sqlite::SqlitePoolOptions;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, Session, SessionManagerLayer, cookie::SameSite};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("caseroom=debug,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:caseroom.db?mode=rwc".to_owned());
    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect(&database_url)
        .await?;
    db::migrate(&db_pool).await?;

    let docs_dir =
        std::env::var("CASEROOM_DOCS_DIR").unwrap_or_else(|_| "caseroom_docs".to_owned());
    let app_state = AppState {
        store: store::SqliteStore::new(db_pool.clone()),
        db_pool,
        blobs: Arc::new(store::FsBlobStore::new(docs_dir)),
        tx: broadcast::channel(256).0,
    };

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::hours(8)));

    let app = Router::new()
        .route("/", get(index))
        .merge(auth::router())
        .nest("/r", rooms::router())
        .nest("/p", participants::router())
        .nest("/m", mentions::router())
        .nest("/c", content::router())
        .nest("/d", docs::router())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
        .layer(session_layer);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(%bind_addr, "caseroom listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[debug_handler]
async fn index(session: Session) -> AppResult<Response> {
    let identity = Identity::from_session(&session).await?;
    if identity.is_known() {
        Ok(Html(include_res!(str, "/pages/index.html")).into_response())
    } else {
        Ok(Redirect::to("/login").into_response())
    }
}
