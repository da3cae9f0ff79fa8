//! Session repository
//!
//! Persistence for server-side sessions when the database session driver is
//! selected. Sessions are written with an upsert so that establishing or
//! refreshing a session is a single call.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

use super::{mysql, sqlite};
use crate::config::DatabaseDriver;
use crate::db::ConnectionManager;
use crate::models::Session;

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert or replace a session
    async fn save(&self, session: &Session) -> Result<()>;

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Remove sessions past their expiry, returning how many were removed
    async fn delete_expired(&self) -> Result<u64>;
}

pub struct SqlxSessionRepository {
    db: Arc<ConnectionManager>,
}

impl SqlxSessionRepository {
    pub fn new(db: Arc<ConnectionManager>) -> Self {
        Self { db }
    }

    pub fn boxed(db: Arc<ConnectionManager>) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(db))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn save(&self, session: &Session) -> Result<()> {
        let pool = self.db.pool().await;
        let result = match pool.driver() {
            DatabaseDriver::Sqlite => save_session_sqlite(sqlite(&pool)?, session).await,
            DatabaseDriver::Mysql => save_session_mysql(mysql(&pool)?, session).await,
        };
        self.db.observe(result)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        let pool = self.db.pool().await;
        let result = match pool.driver() {
            DatabaseDriver::Sqlite => get_session_by_id_sqlite(sqlite(&pool)?, id).await,
            DatabaseDriver::Mysql => get_session_by_id_mysql(mysql(&pool)?, id).await,
        };
        self.db.observe(result)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        const SQL: &str = "DELETE FROM sessions WHERE id = ?";

        let pool = self.db.pool().await;
        let result = match pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(id)
                .execute(sqlite(&pool)?)
                .await
                .map(|_| ()),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(id)
                .execute(mysql(&pool)?)
                .await
                .map(|_| ()),
        };
        self.db.observe(result.context("Failed to delete session"))
    }

    async fn delete_expired(&self) -> Result<u64> {
        const SQL: &str = "DELETE FROM sessions WHERE expires_at < ?";

        let now = Utc::now();
        let pool = self.db.pool().await;
        let result = match pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(now)
                .execute(sqlite(&pool)?)
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(now)
                .execute(mysql(&pool)?)
                .await
                .map(|r| r.rows_affected()),
        };
        self.db
            .observe(result.context("Failed to delete expired sessions"))
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn save_session_sqlite(pool: &SqlitePool, session: &Session) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sessions (id, username, expires_at, created_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            username = excluded.username,
            expires_at = excluded.expires_at
        "#,
    )
    .bind(&session.id)
    .bind(&session.user)
    .bind(session.expires_at)
    .bind(session.created_at)
    .execute(pool)
    .await
    .context("Failed to save session")?;

    Ok(())
}

async fn get_session_by_id_sqlite(pool: &SqlitePool, id: &str) -> Result<Option<Session>> {
    let row = sqlx::query(
        r#"
        SELECT id, username, expires_at, created_at
        FROM sessions
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get session by ID")?;

    row.as_ref().map(row_to_session_sqlite).transpose()
}

fn row_to_session_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Session> {
    Ok(Session {
        id: row.try_get("id")?,
        user: row.try_get("username")?,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn save_session_mysql(pool: &MySqlPool, session: &Session) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sessions (id, username, expires_at, created_at)
        VALUES (?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            username = VALUES(username),
            expires_at = VALUES(expires_at)
        "#,
    )
    .bind(&session.id)
    .bind(&session.user)
    .bind(session.expires_at)
    .bind(session.created_at)
    .execute(pool)
    .await
    .context("Failed to save session")?;

    Ok(())
}

async fn get_session_by_id_mysql(pool: &MySqlPool, id: &str) -> Result<Option<Session>> {
    let row = sqlx::query(
        r#"
        SELECT id, username, expires_at, created_at
        FROM sessions
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get session by ID")?;

    row.as_ref().map(row_to_session_mysql).transpose()
}

fn row_to_session_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Session> {
    let expires_at: DateTime<Utc> = row.try_get("expires_at")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    Ok(Session {
        id: row.try_get("id")?,
        user: row.try_get("username")?,
        expires_at,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_manager;
    use chrono::Duration;

    async fn setup_test_repo() -> SqlxSessionRepository {
        let db = create_test_manager()
            .await
            .expect("Failed to create test database");
        SqlxSessionRepository::new(db)
    }

    #[tokio::test]
    async fn test_save_and_get() {
        let repo = setup_test_repo().await;
        let mut session = Session::new(Duration::hours(1));
        session.user = Some("root".to_string());

        repo.save(&session).await.unwrap();

        let found = repo.get_by_id(&session.id).await.unwrap().unwrap();
        assert_eq!(found.id, session.id);
        assert_eq!(found.user.as_deref(), Some("root"));
        assert!(!found.is_expired());
    }

    #[tokio::test]
    async fn test_get_missing_session() {
        let repo = setup_test_repo().await;
        assert!(repo.get_by_id("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_replaces_existing() {
        let repo = setup_test_repo().await;
        let mut session = Session::new(Duration::hours(1));
        repo.save(&session).await.unwrap();

        session.user = Some("root".to_string());
        repo.save(&session).await.unwrap();

        let found = repo.get_by_id(&session.id).await.unwrap().unwrap();
        assert_eq!(found.user.as_deref(), Some("root"));
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = setup_test_repo().await;
        let session = Session::new(Duration::hours(1));
        repo.save(&session).await.unwrap();

        repo.delete(&session.id).await.unwrap();
        assert!(repo.get_by_id(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_expired() {
        let repo = setup_test_repo().await;
        let live = Session::new(Duration::hours(1));
        let stale = Session::new(Duration::seconds(-10));
        repo.save(&live).await.unwrap();
        repo.save(&stale).await.unwrap();

        assert_eq!(repo.delete_expired().await.unwrap(), 1);
        assert!(repo.get_by_id(&live.id).await.unwrap().is_some());
        assert!(repo.get_by_id(&stale.id).await.unwrap().is_none());
    }
}
