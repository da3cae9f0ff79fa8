//! API layer - HTTP handlers and routing
//!
//! - `auth`: login / logout
//! - `reports`: public submission and listing
//! - `admin`: gated report management
//! - `static_files`: fixed HTML documents
//!
//! Anything no route claims is looked up in the public document directory.

pub mod admin;
pub mod auth;
pub mod common;
pub mod middleware;
pub mod reports;
pub mod responses;
pub mod static_files;

use axum::{middleware as axum_middleware, routing::get, Router};
use tower_http::{services::ServeDir, trace::TraceLayer};

pub use middleware::{is_data_request, ApiError, AppState, SessionContext};

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let admin_routes = admin::router().route_layer(axum_middleware::from_fn_with_state(
        state.clone(),
        middleware::require_root,
    ));

    Router::new()
        .route("/", get(static_files::index))
        .route("/login.html", get(static_files::login_page))
        .route(
            "/pagina_principal/reportes.html",
            get(static_files::legacy_admin_document),
        )
        .merge(auth::router())
        .merge(reports::router())
        .merge(admin_routes)
        .fallback_service(ServeDir::new(state.static_dir.as_path()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::create_test_manager;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    async fn app() -> Router {
        let mut config = Config::default();
        config.static_files.dir = std::env::temp_dir().join("reportes-missing-docs");
        let db = create_test_manager().await.unwrap();
        build_router(AppState::new(&config, db).unwrap())
    }

    #[tokio::test]
    async fn test_gate_without_accept_header_redirects() {
        let response = app()
            .await
            .oneshot(
                Request::builder()
                    .uri("/admin/reportes/json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/login.html");
    }

    #[tokio::test]
    async fn test_public_listing_is_open() {
        let response = app()
            .await
            .oneshot(
                Request::builder()
                    .uri("/reportes/json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
