//! Admin endpoints, all behind `require_root`
//!
//! - GET /admin/reportes - admin page
//! - GET /admin/reportes/json - full listing
//! - POST /admin/reportes/editar - replace a description
//! - DELETE /admin/reportes/eliminar - delete a report
//! - POST /admin/reportes/resuelto - mark a report resolved
//!
//! Mutations answer with the success message whether or not a row matched.

use axum::{
    extract::State,
    http::StatusCode,
    response::Response,
    routing::{any, delete, get, post},
    Json, Router,
};

use crate::api::common::FormOrJson;
use crate::api::middleware::{ApiError, AppState};
use crate::api::reports::list_reports;
use crate::api::responses::{plain_text, Message};
use crate::api::static_files::{serve_document, ADMIN_DOCUMENT};
use crate::models::{EditReportInput, ReportIdInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/reportes", get(admin_page))
        .route("/admin/reportes/json", get(list_reports))
        .route("/admin/reportes/editar", post(edit_report))
        .route("/admin/reportes/eliminar", delete(delete_report))
        .route("/admin/reportes/resuelto", post(resolve_report))
        // Keep unknown admin paths behind the gate too
        .route("/admin", any(unknown))
        .route("/admin/{*path}", any(unknown))
}

/// GET /admin/reportes
async fn admin_page(State(state): State<AppState>) -> Response {
    serve_document(&state.static_dir, ADMIN_DOCUMENT).await
}

/// POST /admin/reportes/editar
async fn edit_report(
    State(state): State<AppState>,
    FormOrJson(input): FormOrJson<EditReportInput>,
) -> Result<Json<Message>, ApiError> {
    state.report_service.edit(&input).await.map_err(|e| {
        tracing::error!("Error al actualizar reporte: {:#}", e);
        ApiError::internal_error("Error al actualizar reporte")
    })?;
    Ok(Json(Message::new("Reporte actualizado")))
}

/// DELETE /admin/reportes/eliminar
async fn delete_report(
    State(state): State<AppState>,
    FormOrJson(input): FormOrJson<ReportIdInput>,
) -> Result<Json<Message>, ApiError> {
    state.report_service.delete(&input.id).await.map_err(|e| {
        tracing::error!("Error al eliminar reporte: {:#}", e);
        ApiError::internal_error("Error al eliminar reporte")
    })?;
    Ok(Json(Message::new("Reporte eliminado")))
}

/// POST /admin/reportes/resuelto
async fn resolve_report(
    State(state): State<AppState>,
    FormOrJson(input): FormOrJson<ReportIdInput>,
) -> Result<Json<Message>, ApiError> {
    state.report_service.resolve(&input.id).await.map_err(|e| {
        tracing::error!("Error al marcar como resuelto: {:#}", e);
        ApiError::internal_error("Error al marcar como resuelto")
    })?;
    Ok(Json(Message::new("Reporte marcado como resuelto")))
}

async fn unknown() -> Response {
    plain_text(StatusCode::NOT_FOUND, "Not Found")
}
