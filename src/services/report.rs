//! Report service
//!
//! Thin business layer over `ReportRepository`. No validation happens here:
//! submissions reach the store as received and the schema is the only judge.
//! Mutations never check that the target row exists.

use anyhow::Result;
use std::sync::Arc;

use crate::db::repositories::ReportRepository;
use crate::models::{EditReportInput, NewReport, Report, ReportId};

pub struct ReportService {
    repo: Arc<dyn ReportRepository>,
}

impl ReportService {
    pub fn new(repo: Arc<dyn ReportRepository>) -> Self {
        Self { repo }
    }

    /// Store a new report with `estado` left at its default
    pub async fn submit(&self, input: &NewReport) -> Result<i64> {
        let id = self.repo.create(input).await?;
        tracing::info!("Reporte guardado en la base de datos (id {})", id);
        Ok(id)
    }

    pub async fn list(&self) -> Result<Vec<Report>> {
        self.repo.list().await
    }

    /// Replace the description of a report
    pub async fn edit(&self, input: &EditReportInput) -> Result<u64> {
        let affected = self
            .repo
            .update_description(input.id.as_deref(), input.descripcion.as_deref())
            .await?;
        tracing::debug!("Edited report {}: {} row(s)", input.id, affected);
        Ok(affected)
    }

    pub async fn delete(&self, id: &ReportId) -> Result<u64> {
        let affected = self.repo.delete(id.as_deref()).await?;
        tracing::debug!("Deleted report {}: {} row(s)", id, affected);
        Ok(affected)
    }

    /// Mark a report as resolved
    pub async fn resolve(&self, id: &ReportId) -> Result<u64> {
        let affected = self.repo.mark_resolved(id.as_deref()).await?;
        tracing::debug!("Resolved report {}: {} row(s)", id, affected);
        Ok(affected)
    }
}
