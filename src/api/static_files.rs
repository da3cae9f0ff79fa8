//! HTML documents served from the public document directory
//!
//! The directory as a whole is also mounted as the router fallback; the
//! handlers here pin the documents that have fixed routes.

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::Response,
};
use std::path::Path;
use tokio::fs;

use crate::api::middleware::{AppState, LOGIN_PAGE};
use crate::api::responses::found;

pub const INDEX_DOCUMENT: &str = "index.html";
pub const LOGIN_DOCUMENT: &str = "login.html";
pub const ADMIN_DOCUMENT: &str = "reportes.html";

/// GET /
pub async fn index(State(state): State<AppState>) -> Response {
    serve_document(&state.static_dir, INDEX_DOCUMENT).await
}

/// GET /login.html
pub async fn login_page(State(state): State<AppState>) -> Response {
    serve_document(&state.static_dir, LOGIN_DOCUMENT).await
}

/// GET /pagina_principal/reportes.html
///
/// Old direct link to the admin page; always bounced to the login page.
pub async fn legacy_admin_document() -> Response {
    found(LOGIN_PAGE)
}

/// Read `name` from `dir` and send it with a type derived from its extension
pub async fn serve_document(dir: &Path, name: &str) -> Response {
    let path = dir.join(name);
    match fs::read(&path).await {
        Ok(contents) => build_response(name, contents),
        Err(e) => {
            tracing::warn!("Failed to read {:?}: {}", path, e);
            not_found()
        }
    }
}

fn build_response(name: &str, data: Vec<u8>) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, get_content_type(name))
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from(data))
        .unwrap_or_else(|_| not_found())
}

fn not_found() -> Response {
    let mut response = Response::new(Body::from("Not Found"));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

fn get_content_type(name: &str) -> &'static str {
    match name.rsplit('.').next().unwrap_or("") {
        "html" => "text/html; charset=utf-8",
        "css" => "text/css",
        "js" => "application/javascript",
        _ => "application/octet-stream",
    }
}
