//! Report repository
//!
//! Parameterized access to the `REPORTES` table. Row selectors are bound
//! exactly as received; an unmatched selector is not an error, it simply
//! affects zero rows.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

use super::{mysql, sqlite};
use crate::config::DatabaseDriver;
use crate::db::ConnectionManager;
use crate::models::{NewReport, Report, RESOLVED_STATUS};

#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// Insert a report, returning its generated id
    async fn create(&self, input: &NewReport) -> Result<i64>;

    /// Every report in the table
    async fn list(&self) -> Result<Vec<Report>>;

    /// Replace `descripcion` of the selected row; returns rows affected
    async fn update_description(&self, id: Option<&str>, descripcion: Option<&str>)
        -> Result<u64>;

    /// Returns rows affected
    async fn delete(&self, id: Option<&str>) -> Result<u64>;

    /// Set `estado` to the resolved marker; returns rows affected
    async fn mark_resolved(&self, id: Option<&str>) -> Result<u64>;
}

pub struct SqlxReportRepository {
    db: Arc<ConnectionManager>,
}

impl SqlxReportRepository {
    pub fn new(db: Arc<ConnectionManager>) -> Self {
        Self { db }
    }

    pub fn boxed(db: Arc<ConnectionManager>) -> Arc<dyn ReportRepository> {
        Arc::new(Self::new(db))
    }
}

#[async_trait]
impl ReportRepository for SqlxReportRepository {
    async fn create(&self, input: &NewReport) -> Result<i64> {
        let pool = self.db.pool().await;
        let result = match pool.driver() {
            DatabaseDriver::Sqlite => create_report_sqlite(sqlite(&pool)?, input).await,
            DatabaseDriver::Mysql => create_report_mysql(mysql(&pool)?, input).await,
        };
        self.db.observe(result)
    }

    async fn list(&self) -> Result<Vec<Report>> {
        let pool = self.db.pool().await;
        let result = match pool.driver() {
            DatabaseDriver::Sqlite => list_reports_sqlite(sqlite(&pool)?).await,
            DatabaseDriver::Mysql => list_reports_mysql(mysql(&pool)?).await,
        };
        self.db.observe(result)
    }

    async fn update_description(
        &self,
        id: Option<&str>,
        descripcion: Option<&str>,
    ) -> Result<u64> {
        const SQL: &str = "UPDATE REPORTES SET descripcion = ? WHERE id = ?";

        let pool = self.db.pool().await;
        let result = match pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(descripcion)
                .bind(id)
                .execute(sqlite(&pool)?)
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(descripcion)
                .bind(id)
                .execute(mysql(&pool)?)
                .await
                .map(|r| r.rows_affected()),
        };
        self.db
            .observe(result.context("Failed to update report description"))
    }

    async fn delete(&self, id: Option<&str>) -> Result<u64> {
        const SQL: &str = "DELETE FROM REPORTES WHERE id = ?";

        let pool = self.db.pool().await;
        let result = match pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(id)
                .execute(sqlite(&pool)?)
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(id)
                .execute(mysql(&pool)?)
                .await
                .map(|r| r.rows_affected()),
        };
        self.db.observe(result.context("Failed to delete report"))
    }

    async fn mark_resolved(&self, id: Option<&str>) -> Result<u64> {
        const SQL: &str = "UPDATE REPORTES SET estado = ? WHERE id = ?";

        let pool = self.db.pool().await;
        let result = match pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(RESOLVED_STATUS)
                .bind(id)
                .execute(sqlite(&pool)?)
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(RESOLVED_STATUS)
                .bind(id)
                .execute(mysql(&pool)?)
                .await
                .map(|r| r.rows_affected()),
        };
        self.db.observe(result.context("Failed to mark report as resolved"))
    }
}

const INSERT_SQL: &str = r#"
    INSERT INTO REPORTES (tipo, ubicacion, descripcion, urgencia, nombre, correo)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

const LIST_SQL: &str = r#"
    SELECT id, tipo, ubicacion, descripcion, urgencia, nombre, correo, estado
    FROM REPORTES
    ORDER BY id
"#;

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_report_sqlite(pool: &SqlitePool, input: &NewReport) -> Result<i64> {
    let result = sqlx::query(INSERT_SQL)
        .bind(&input.tipo)
        .bind(&input.ubicacion)
        .bind(&input.descripcion)
        .bind(&input.urgencia)
        .bind(&input.nombre)
        .bind(&input.correo)
        .execute(pool)
        .await
        .context("Failed to create report")?;

    Ok(result.last_insert_rowid())
}

async fn list_reports_sqlite(pool: &SqlitePool) -> Result<Vec<Report>> {
    let rows = sqlx::query(LIST_SQL)
        .fetch_all(pool)
        .await
        .context("Failed to list reports")?;

    rows.iter().map(row_to_report_sqlite).collect()
}

fn row_to_report_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Report> {
    Ok(Report {
        id: row.try_get("id")?,
        tipo: row.try_get("tipo")?,
        ubicacion: row.try_get("ubicacion")?,
        descripcion: row.try_get("descripcion")?,
        urgencia: row.try_get("urgencia")?,
        nombre: row.try_get("nombre")?,
        correo: row.try_get("correo")?,
        estado: row.try_get("estado")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_report_mysql(pool: &MySqlPool, input: &NewReport) -> Result<i64> {
    let result = sqlx::query(INSERT_SQL)
        .bind(&input.tipo)
        .bind(&input.ubicacion)
        .bind(&input.descripcion)
        .bind(&input.urgencia)
        .bind(&input.nombre)
        .bind(&input.correo)
        .execute(pool)
        .await
        .context("Failed to create report")?;

    Ok(result.last_insert_id() as i64)
}

async fn list_reports_mysql(pool: &MySqlPool) -> Result<Vec<Report>> {
    let rows = sqlx::query(LIST_SQL)
        .fetch_all(pool)
        .await
        .context("Failed to list reports")?;

    rows.iter().map(row_to_report_mysql).collect()
}

fn row_to_report_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Report> {
    Ok(Report {
        id: row.try_get("id")?,
        tipo: row.try_get("tipo")?,
        ubicacion: row.try_get("ubicacion")?,
        descripcion: row.try_get("descripcion")?,
        urgencia: row.try_get("urgencia")?,
        nombre: row.try_get("nombre")?,
        correo: row.try_get("correo")?,
        estado: row.try_get("estado")?,
    })
}
