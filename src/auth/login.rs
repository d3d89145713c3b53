use axum::{
    Form, debug_handler,
    extract::Query,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::info;

use crate::session::{IS_ADMIN, PARTY_EMAIL, PARTY_NAME, RETURN_URL};
use crate::{AppResult, include_res};

#[derive(Deserialize)]
pub(crate) struct LoginQuery {
    pub(crate) return_url: Option<String>,
}

#[debug_handler]
pub(crate) async fn login_page(
    Query(LoginQuery { return_url }): Query<LoginQuery>,
    session: Session,
) -> AppResult<Response> {
    if let Some(return_url) = return_url {
        session.insert(RETURN_URL, return_url).await?;
    }
    Ok(Html(include_res!(str, "/pages/login.html")).into_response())
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    secret: String,
}

#[debug_handler]
pub(crate) async fn login(
    session: Session,
    Form(LoginForm { name, email, secret }): Form<LoginForm>,
) -> AppResult<Response> {
    let name = name.trim();
    let email = email.trim().to_lowercase();
    if name.is_empty() && email.is_empty() {
        return Err("enter the name or email you participate under".into());
    }

    if !name.is_empty() {
        session.insert(PARTY_NAME, name).await?;
    }
    if !email.is_empty() {
        session.insert(PARTY_EMAIL, email.clone()).await?;
    }

    let admin = super::admin_secret().is_some_and(|expected| !secret.is_empty() && secret == expected);
    session.insert(IS_ADMIN, admin).await?;
    info!(name, email, admin, "login");

    let return_url: Option<String> = session.get(RETURN_URL).await?;
    Ok(Redirect::to(return_url.as_deref().unwrap_or("/")).into_response())
}
