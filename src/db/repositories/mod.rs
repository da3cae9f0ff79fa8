//! Database repositories
//!
//! One repository per entity. Each resolves the live pool from the
//! `ConnectionManager` per call and reports failures back through
//! `ConnectionManager::observe` so lost connections get rebuilt.

pub mod report;
pub mod session;

pub use report::{ReportRepository, SqlxReportRepository};
pub use session::{SessionRepository, SqlxSessionRepository};

use anyhow::Result;
use sqlx::{MySqlPool, SqlitePool};

use crate::db::DynDatabasePool;

pub(crate) fn sqlite(pool: &DynDatabasePool) -> Result<&SqlitePool> {
    pool.as_sqlite()
        .ok_or_else(|| anyhow::anyhow!("Pool reports SQLite but exposes no SQLite handle"))
}

pub(crate) fn mysql(pool: &DynDatabasePool) -> Result<&MySqlPool> {
    pool.as_mysql()
        .ok_or_else(|| anyhow::anyhow!("Pool reports MySQL but exposes no MySQL handle"))
}
