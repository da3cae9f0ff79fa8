//! Shared response builders

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// `{"mensaje": ...}` success body of the admin mutations
#[derive(Debug, Serialize)]
pub struct Message {
    pub mensaje: &'static str,
}

impl Message {
    pub fn new(mensaje: &'static str) -> Self {
        Self { mensaje }
    }
}

/// 302 redirect to `location`
pub fn found(location: &'static str) -> Response {
    let mut response = StatusCode::FOUND.into_response();
    response
        .headers_mut()
        .insert(header::LOCATION, HeaderValue::from_static(location));
    response
}

/// 302 redirect that also sets (or clears) a cookie
pub fn found_with_cookie(location: &'static str, cookie: &str) -> Response {
    let mut response = found(location);
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
        Err(e) => tracing::error!("Refusing to send malformed cookie: {}", e),
    }
    response
}

/// Plain-text response
pub fn plain_text(status: StatusCode, body: &'static str) -> Response {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from(body))
        .unwrap_or_else(|_| status.into_response())
}
