//! Connection manager
//!
//! Owns the live database pool, (re)establishes it under a `ReconnectPolicy`
//! and supervises it with a periodic health check. Store failures are split
//! into two classes:
//! - `ConnectionLost`: transport went away; the pool is rebuilt transparently
//! - `Fatal`: anything else; supervision stops and the caller is expected to
//!   terminate the process

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};

use super::{create_pool, migrations, DynDatabasePool};
use crate::config::{DatabaseConfig, ReconnectConfig};

/// How a store error should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFailure {
    ConnectionLost,
    Fatal,
}

/// Classify an error chain produced by the db layer
pub fn classify(err: &anyhow::Error) -> StoreFailure {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<sqlx::Error>() {
            return match e {
                sqlx::Error::Io(_)
                | sqlx::Error::PoolClosed
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::WorkerCrashed => StoreFailure::ConnectionLost,
                _ => StoreFailure::Fatal,
            };
        }
        if cause.downcast_ref::<std::io::Error>().is_some() {
            return StoreFailure::ConnectionLost;
        }
    }
    StoreFailure::Fatal
}

/// Retry schedule for establishing a connection
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    /// Failed attempts tolerated before giving up; `None` never gives up
    pub max_retries: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&ReconnectConfig::default())
    }
}

impl ReconnectPolicy {
    pub fn from_config(config: &ReconnectConfig) -> Self {
        Self {
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            multiplier: config.multiplier,
            max_retries: config.max_retries,
        }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.min(64) as i32);
        let millis = self.initial_backoff.as_millis() as f64 * factor;
        let capped = millis.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Whether another attempt is allowed after `failures` failed ones
    pub fn allows_retry(&self, failures: u32) -> bool {
        match self.max_retries {
            Some(max) => failures <= max,
            None => true,
        }
    }
}

/// Produces a ready-to-use pool
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<DynDatabasePool>;
}

/// Connects with the configured driver and brings the schema up to date
pub struct ConfigConnector {
    config: DatabaseConfig,
}

impl ConfigConnector {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for ConfigConnector {
    async fn connect(&self) -> Result<DynDatabasePool> {
        let pool = create_pool(&self.config).await?;
        migrations::run_migrations(&pool).await?;
        Ok(pool)
    }
}

/// Result of a single health check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Reconnected,
}

pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    current: RwLock<DynDatabasePool>,
    wake: Notify,
}

impl ConnectionManager {
    /// Establish the first connection, retrying per `policy`
    pub async fn establish(
        connector: Arc<dyn Connector>,
        policy: ReconnectPolicy,
    ) -> Result<Arc<Self>> {
        let pool = connect_with_retry(connector.as_ref(), &policy).await?;
        Ok(Arc::new(Self {
            connector,
            policy,
            current: RwLock::new(pool),
            wake: Notify::new(),
        }))
    }

    /// The live pool
    pub async fn pool(&self) -> DynDatabasePool {
        self.current.read().await.clone()
    }

    /// Pass a query result through, waking the supervisor when the
    /// connection looks lost
    pub fn observe<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if classify(e) == StoreFailure::ConnectionLost {
                tracing::warn!("Database connection lost: {:#}", e);
                self.wake.notify_one();
            }
        }
        result
    }

    /// Replace the live pool with a fresh one
    pub async fn reconnect(&self) -> Result<()> {
        let pool = connect_with_retry(self.connector.as_ref(), &self.policy).await?;
        let old = {
            let mut current = self.current.write().await;
            std::mem::replace(&mut *current, pool)
        };
        old.close().await;
        Ok(())
    }

    /// Ping the store; rebuild on a lost connection, fail on anything else
    pub async fn check_health(&self) -> Result<HealthStatus> {
        let pool = self.pool().await;
        match pool.ping().await {
            Ok(()) => Ok(HealthStatus::Healthy),
            Err(e) => match classify(&e) {
                StoreFailure::ConnectionLost => {
                    tracing::warn!("DB error, reconnecting: {:#}", e);
                    self.reconnect().await?;
                    Ok(HealthStatus::Reconnected)
                }
                StoreFailure::Fatal => {
                    tracing::error!("DB error: {:#}", e);
                    Err(e.context("Unrecoverable database error"))
                }
            },
        }
    }

    /// Run health checks until a fatal error occurs
    pub async fn supervise(self: Arc<Self>, interval: Duration) -> Result<()> {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.wake.notified() => {}
            }
            self.check_health().await?;
        }
    }
}

async fn connect_with_retry(
    connector: &dyn Connector,
    policy: &ReconnectPolicy,
) -> Result<DynDatabasePool> {
    let mut failures: u32 = 0;
    loop {
        match connector.connect().await {
            Ok(pool) => {
                tracing::info!("Connected to the database");
                return Ok(pool);
            }
            Err(e) => {
                failures += 1;
                if !policy.allows_retry(failures) {
                    return Err(e).context(format!(
                        "Giving up on database connection after {} attempts",
                        failures
                    ));
                }
                let delay = policy.backoff_for(failures - 1);
                tracing::error!(
                    "Error connecting to the database (attempt {}), retrying in {:?}: {:#}",
                    failures,
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool::test_database_config;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyConnector {
        failures_left: AtomicU32,
        attempts: AtomicU32,
    }

    impl FlakyConnector {
        fn new(failures: u32) -> Self {
            Self {
                failures_left: AtomicU32::new(failures),
                attempts: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Connector for FlakyConnector {
        async fn connect(&self) -> Result<DynDatabasePool> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                anyhow::bail!("connection refused");
            }
            ConfigConnector::new(test_database_config()).connect().await
        }
    }

    fn fast_policy(max_retries: Option<u32>) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            multiplier: 2.0,
            max_retries,
        }
    }

    #[test]
    fn test_default_policy_is_fixed_two_seconds() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.backoff_for(0), Duration::from_secs(2));
        assert_eq!(policy.backoff_for(10), Duration::from_secs(2));
        assert!(policy.allows_retry(u32::MAX));
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let policy = ReconnectPolicy {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(1000),
            multiplier: 2.0,
            max_retries: Some(3),
        };
        assert_eq!(policy.backoff_for(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(400));
        assert_eq!(policy.backoff_for(8), Duration::from_millis(1000));
        assert!(policy.allows_retry(3));
        assert!(!policy.allows_retry(4));
    }

    #[test]
    fn test_classify_errors() {
        let lost = anyhow::Error::new(sqlx::Error::PoolClosed).context("Failed to list reports");
        assert_eq!(classify(&lost), StoreFailure::ConnectionLost);

        let io = anyhow::Error::new(sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        )));
        assert_eq!(classify(&io), StoreFailure::ConnectionLost);

        let fatal = anyhow::Error::new(sqlx::Error::RowNotFound);
        assert_eq!(classify(&fatal), StoreFailure::Fatal);

        assert_eq!(classify(&anyhow::anyhow!("boom")), StoreFailure::Fatal);
    }

    #[tokio::test]
    async fn test_establish_retries_until_success() {
        let connector = Arc::new(FlakyConnector::new(2));
        let manager = ConnectionManager::establish(connector.clone(), fast_policy(None))
            .await
            .expect("Should eventually connect");

        assert_eq!(connector.attempts.load(Ordering::SeqCst), 3);
        manager.pool().await.ping().await.expect("Ping should succeed");
    }

    #[tokio::test]
    async fn test_establish_gives_up_when_bounded() {
        let connector = Arc::new(FlakyConnector::new(10));
        let result = ConnectionManager::establish(connector.clone(), fast_policy(Some(2))).await;

        assert!(result.is_err());
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_health_check_reconnects_lost_connection() {
        let connector = Arc::new(FlakyConnector::new(0));
        let manager = ConnectionManager::establish(connector.clone(), fast_policy(None))
            .await
            .unwrap();

        assert_eq!(manager.check_health().await.unwrap(), HealthStatus::Healthy);

        manager.pool().await.close().await;
        assert_eq!(
            manager.check_health().await.unwrap(),
            HealthStatus::Reconnected
        );
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 2);
        manager.pool().await.ping().await.expect("New pool should be live");
    }
}
