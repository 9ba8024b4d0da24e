//! Account routes: login, registration, logout.
//!
//! Credential failures are rendered back into the form pages; a store
//! outage degrades to a retry message rather than an error page, and the
//! two cases are logged differently.

use std::sync::Arc;

use axum::extract::State;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, warn};

use crate::db::{CredentialStore, RegisterError};
use crate::error::ServerError;
use crate::session;
use crate::state::AppState;

/// Register account routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", get(login_page).post(login_submit))
        .route("/register", get(register_page).post(register_submit))
        .route("/logout", get(logout))
}

/// Username/password form shared by login and registration.
#[derive(Debug, Deserialize)]
pub struct CredentialsForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

async fn login_page(State(state): State<Arc<AppState>>) -> Result<Html<String>, ServerError> {
    state.pages.login(None)
}

async fn login_submit(
    State(state): State<Arc<AppState>>,
    session: Session,
    Form(form): Form<CredentialsForm>,
) -> Result<Response, ServerError> {
    let username = form.username.trim();
    let password = form.password.trim();
    match state.store.verify_login(username, password).await {
        Ok(Some(user_id)) => {
            session::sign_in(&session, user_id).await?;
            info!(user_id, username, "user logged in");
            Ok(Redirect::to("/").into_response())
        }
        Ok(None) => Ok(state
            .pages
            .login(Some("Invalid username or password"))?
            .into_response()),
        Err(e) => {
            warn!(error = %e, "login lookup failed");
            Ok(state
                .pages
                .login(Some("Login failed; please try again."))?
                .into_response())
        }
    }
}

async fn register_page(State(state): State<Arc<AppState>>) -> Result<Html<String>, ServerError> {
    state.pages.register(None)
}

async fn register_submit(
    State(state): State<Arc<AppState>>,
    Form(form): Form<CredentialsForm>,
) -> Result<Response, ServerError> {
    let username = form.username.trim();
    let password = form.password.trim();
    match state.store.register(username, password).await {
        Ok(user_id) => {
            info!(user_id, username, "user registered");
            Ok(Redirect::to("/login").into_response())
        }
        Err(RegisterError::AlreadyExists) => Ok(state
            .pages
            .register(Some("Username already exists"))?
            .into_response()),
        Err(RegisterError::Store(e)) => {
            warn!(error = %e, "registration failed");
            Ok(state
                .pages
                .register(Some("Registration failed; please try again."))?
                .into_response())
        }
    }
}

async fn logout(session: Session) -> Result<Redirect, ServerError> {
    session::sign_out(&session).await?;
    Ok(Redirect::to("/login"))
}
