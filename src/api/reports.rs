//! Public report endpoints
//!
//! - POST /guardar_reporte - citizen submission
//! - GET /reportes/json - full listing, no session required

use axum::{
    extract::State,
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};

use crate::api::common::FormOrJson;
use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::{found, plain_text};
use crate::models::{NewReport, Report};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/guardar_reporte", post(guardar_reporte))
        .route("/reportes/json", get(list_reports))
}

/// POST /guardar_reporte
async fn guardar_reporte(
    State(state): State<AppState>,
    FormOrJson(input): FormOrJson<NewReport>,
) -> Response {
    match state.report_service.submit(&input).await {
        Ok(_) => found("/"),
        Err(e) => {
            tracing::error!("Error al guardar reporte: {:#}", e);
            plain_text(StatusCode::INTERNAL_SERVER_ERROR, "Error al guardar el reporte")
        }
    }
}

/// GET /reportes/json and GET /admin/reportes/json
pub async fn list_reports(State(state): State<AppState>) -> Result<Json<Vec<Report>>, ApiError> {
    let reports = state.report_service.list().await.map_err(|e| {
        tracing::error!("Error al obtener reportes: {:#}", e);
        ApiError::internal_error("Error al obtener reportes")
    })?;
    Ok(Json(reports))
}
