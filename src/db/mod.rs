//! Database layer
//!
//! - `pool`: the `DatabasePool` abstraction over SQLite and MySQL
//! - `connection`: the connection manager (retry policy, health checks,
//!   reconnects)
//! - `migrations`: embedded schema for `REPORTES` and `sessions`
//! - `repositories`: parameterized queries per entity
//!
//! ```ignore
//! use reportes::db::{ConfigConnector, ConnectionManager, ReconnectPolicy};
//!
//! let connector = Arc::new(ConfigConnector::new(config.database.clone()));
//! let db = ConnectionManager::establish(connector, ReconnectPolicy::default()).await?;
//! db.pool().await.ping().await?;
//! ```

pub mod connection;
pub mod migrations;
pub mod pool;
pub mod repositories;

pub use connection::{
    classify, ConfigConnector, ConnectionManager, Connector, HealthStatus, ReconnectPolicy,
    StoreFailure,
};
pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};

use anyhow::Result;
use std::sync::Arc;

/// Connection manager over a migrated in-memory SQLite database
pub async fn create_test_manager() -> Result<Arc<ConnectionManager>> {
    let connector: Arc<dyn Connector> =
        Arc::new(ConfigConnector::new(pool::test_database_config()));
    ConnectionManager::establish(connector, ReconnectPolicy::default()).await
}
