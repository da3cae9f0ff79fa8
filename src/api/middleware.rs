//! API middleware and shared request state
//!
//! - `AppState`: services shared by every handler
//! - `ApiError`: `{"error": ...}` responses
//! - `SessionContext`: the caller's session, passed explicitly to handlers
//! - `require_root`: the admin gate

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::api::responses::found;
use crate::config::Config;
use crate::db::repositories::SqlxReportRepository;
use crate::db::ConnectionManager;
use crate::models::Session;
use crate::services::{
    create_session_store, IdentityVerifier, ReportService, SessionService, StaticCredentials,
};

/// Where unauthenticated navigational requests are sent
pub const LOGIN_PAGE: &str = "/login.html";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<ConnectionManager>,
    pub report_service: Arc<ReportService>,
    pub sessions: Arc<SessionService>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub static_dir: Arc<PathBuf>,
}

impl AppState {
    /// Wire every service from configuration over an established connection
    pub fn new(config: &Config, db: Arc<ConnectionManager>) -> anyhow::Result<Self> {
        let store = create_session_store(&config.session, db.clone());
        let sessions = SessionService::from_config(&config.session, store)?;

        Ok(Self {
            report_service: Arc::new(ReportService::new(SqlxReportRepository::boxed(
                db.clone(),
            ))),
            sessions: Arc::new(sessions),
            identity: Arc::new(StaticCredentials::from_config(&config.auth)),
            static_dir: Arc::new(config.static_files.dir.clone()),
            db,
        })
    }
}

/// Error response for API errors
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    pub error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            error: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "No autorizado")
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// The caller's session, resolved from the signed session cookie
#[derive(Clone)]
pub struct SessionContext {
    sessions: Arc<SessionService>,
    current: Option<Session>,
}

impl SessionContext {
    /// Resolve the session named by the request's cookie, if any
    pub async fn load(sessions: Arc<SessionService>, headers: &HeaderMap) -> anyhow::Result<Self> {
        let cookie = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|value| sessions.find_cookie(value));

        let current = match cookie {
            Some(value) => sessions.load(value).await?,
            None => None,
        };

        Ok(Self { sessions, current })
    }

    /// Whether the current session carries exactly `identity`
    pub fn is_user(&self, identity: &str) -> bool {
        self.current
            .as_ref()
            .is_some_and(|session| session.is_user(identity))
    }

    /// Replace any existing session with a fresh one for `user`.
    /// Returns the `Set-Cookie` value.
    pub async fn establish(self, user: &str) -> anyhow::Result<String> {
        if let Some(previous) = &self.current {
            self.sessions.destroy(&previous.id).await?;
        }
        let session = self.sessions.establish(user).await?;
        Ok(self.sessions.session_cookie(&session))
    }

    /// End the session. Returns the `Set-Cookie` value that clears it.
    pub async fn destroy(self) -> anyhow::Result<String> {
        if let Some(session) = &self.current {
            self.sessions.destroy(&session.id).await?;
        }
        Ok(self.sessions.clearing_cookie())
    }
}

impl FromRequestParts<AppState> for SessionContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(ctx) = parts.extensions.get::<SessionContext>() {
            return Ok(ctx.clone());
        }

        SessionContext::load(state.sessions.clone(), &parts.headers)
            .await
            .map_err(|e| {
                tracing::error!("Failed to load session: {:#}", e);
                ApiError::internal_error("Error al cargar la sesión")
            })
    }
}

/// Whether a request expects data rather than a page: its `Accept` header
/// mentions JSON, or it was issued by script (`X-Requested-With`)
pub fn is_data_request(headers: &HeaderMap) -> bool {
    let accepts_json = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.to_ascii_lowercase().contains("json"));

    let is_xhr = headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"));

    accepts_json || is_xhr
}

/// Admin gate: admits only sessions carrying the admin identity.
///
/// Data requests are refused with 401; everything else is redirected to the
/// login page. Never touches the session or the store.
pub async fn require_root(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let headers = request.headers().clone();
    let ctx = match SessionContext::load(state.sessions.clone(), &headers).await {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::error!("Failed to load session: {:#}", e);
            return ApiError::internal_error("Error al cargar la sesión").into_response();
        }
    };

    if ctx.is_user(state.identity.admin_identity()) {
        request.extensions_mut().insert(ctx);
        return next.run(request).await;
    }

    if is_data_request(&headers) {
        ApiError::unauthorized().into_response()
    } else {
        found(LOGIN_PAGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use proptest::prelude::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_json_accept_is_data_request() {
        assert!(is_data_request(&headers(&[("accept", "application/json")])));
        assert!(is_data_request(&headers(&[(
            "accept",
            "application/json, text/plain, */*"
        )])));
    }

    #[test]
    fn test_xhr_is_data_request() {
        assert!(is_data_request(&headers(&[(
            "x-requested-with",
            "XMLHttpRequest"
        )])));
    }

    #[test]
    fn test_browser_navigation_is_not_data_request() {
        assert!(!is_data_request(&headers(&[(
            "accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
        )])));
        assert!(!is_data_request(&HeaderMap::new()));
    }

    #[test]
    fn test_api_error_body() {
        let err = ApiError::unauthorized();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            serde_json::json!({ "error": "No autorizado" })
        );
    }

    proptest! {
        #[test]
        fn prop_accept_with_json_is_data(prefix in "[a-z/+;=. ,*]{0,20}", suffix in "[a-z/+;=. ,*]{0,20}") {
            let accept = format!("{}json{}", prefix, suffix);
            let mut map = HeaderMap::new();
            map.insert(header::ACCEPT, HeaderValue::from_str(&accept).unwrap());
            prop_assert!(is_data_request(&map));
        }

        #[test]
        fn prop_accept_without_json_is_navigational(accept in "[a-ik-z/+;=. ,*]{0,40}") {
            let mut map = HeaderMap::new();
            map.insert(header::ACCEPT, HeaderValue::from_str(&accept).unwrap());
            prop_assert!(!is_data_request(&map));
        }
    }
}
