mod add;
mod edit;
mod page;

pub use page::group_by_org;

use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{room_id}", get(page::directory))
        .route("/{room_id}/add", post(add::add_single))
        .route("/{room_id}/bulk", post(add::add_bulk))
        .route("/{room_id}/edit", post(edit::edit_profile))
}
