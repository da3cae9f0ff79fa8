//! Authentication endpoints
//!
//! - POST /login - check credentials, start the admin session
//! - GET /logout - end the session

use axum::{
    extract::State,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use crate::api::common::FormOrJson;
use crate::api::middleware::{ApiError, AppState, SessionContext, LOGIN_PAGE};
use crate::api::responses::found_with_cookie;

/// Landing page after a successful login
pub const ADMIN_HOME: &str = "/admin/reportes";

/// Body of a rejected login. Rendered with 200, not as an HTTP error.
pub const LOGIN_FAILED_HTML: &str =
    r#"<h2>Usuario o contraseña incorrectos</h2><a href="/login.html">Volver al login</a>"#;

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", get(logout))
}

/// POST /login
async fn login(
    State(state): State<AppState>,
    session: SessionContext,
    FormOrJson(body): FormOrJson<LoginRequest>,
) -> Result<Response, ApiError> {
    let username = body.username.unwrap_or_default();
    let password = body.password.unwrap_or_default();

    if !state.identity.verify(&username, &password).await {
        tracing::info!("Rejected login for '{}'", username);
        return Ok(Html(LOGIN_FAILED_HTML).into_response());
    }

    let cookie = session.establish(&username).await.map_err(|e| {
        tracing::error!("Failed to establish session: {:#}", e);
        ApiError::internal_error("Error al iniciar sesión")
    })?;

    tracing::info!("'{}' logged in", username);
    Ok(found_with_cookie(ADMIN_HOME, &cookie))
}

/// GET /logout
///
/// Always clears the cookie and redirects, even if the store fails to forget
/// the session.
async fn logout(State(state): State<AppState>, session: SessionContext) -> Response {
    let cookie = match session.destroy().await {
        Ok(cookie) => cookie,
        Err(e) => {
            tracing::error!("Failed to destroy session: {:#}", e);
            state.sessions.clearing_cookie()
        }
    };
    found_with_cookie(LOGIN_PAGE, &cookie)
}
