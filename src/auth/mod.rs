//! Cookie-session login. Participants identify with the email (private
//! rooms) or name (public rooms) their profile was imported under; the
//! case administrator unlocks room creation, participant management and
//! message deletion with a shared secret from the environment.

mod login;
mod logout;

use axum::{Router, routing::get};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login::login_page).post(login::login))
        .route("/logout", get(logout::logout))
}

pub(crate) fn admin_secret() -> Option<String> {
    std::env::var("CASEROOM_ADMIN_SECRET").ok().filter(|s| !s.is_empty())
}
