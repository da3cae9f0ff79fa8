//! Session store and signed session cookies
//!
//! Sessions live behind the `SessionStore` trait (get/set/destroy) with two
//! backends:
//! - `MemorySessionStore`: process-held, backed by a moka cache (default)
//! - `SqlSessionStore`: rows in the `sessions` table
//!
//! The cookie carries `<session id>.<hex hmac-sha256(id)>`. A cookie whose
//! signature does not verify is treated exactly like a missing cookie.

use anyhow::Result;
use async_trait::async_trait;
use data_encoding::HEXLOWER;
use hmac::{Hmac, Mac};
use moka::future::Cache;
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{SessionConfig, SessionDriver};
use crate::db::repositories::{SessionRepository, SqlxSessionRepository};
use crate::db::ConnectionManager;
use crate::models::Session;

type HmacSha256 = Hmac<Sha256>;

/// Upper bound on concurrently held in-memory sessions
const MEMORY_MAX_SESSIONS: u64 = 10_000;

/// Longest session lifetime honoured, whatever the configuration says
const MAX_SESSION_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Interval of the background expiry sweep
pub const PURGE_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Session>>;

    async fn set(&self, session: &Session) -> Result<()>;

    async fn destroy(&self, id: &str) -> Result<()>;

    /// Drop expired sessions, returning how many were removed
    async fn purge_expired(&self) -> Result<u64>;
}

/// Process-held sessions
pub struct MemorySessionStore {
    cache: Cache<String, Session>,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(MEMORY_MAX_SESSIONS)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.cache.get(id).await)
    }

    async fn set(&self, session: &Session) -> Result<()> {
        self.cache
            .insert(session.id.clone(), session.clone())
            .await;
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<()> {
        self.cache.invalidate(id).await;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let expired: Vec<Arc<String>> = self
            .cache
            .iter()
            .filter(|(_, session)| session.is_expired())
            .map(|(id, _)| id)
            .collect();

        for id in &expired {
            self.cache.invalidate(id.as_str()).await;
        }
        self.cache.run_pending_tasks().await;
        Ok(expired.len() as u64)
    }
}

/// Sessions persisted through `SessionRepository`
pub struct SqlSessionStore {
    repo: Arc<dyn SessionRepository>,
}

impl SqlSessionStore {
    pub fn new(repo: Arc<dyn SessionRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl SessionStore for SqlSessionStore {
    async fn get(&self, id: &str) -> Result<Option<Session>> {
        self.repo.get_by_id(id).await
    }

    async fn set(&self, session: &Session) -> Result<()> {
        self.repo.save(session).await
    }

    async fn destroy(&self, id: &str) -> Result<()> {
        self.repo.delete(id).await
    }

    async fn purge_expired(&self) -> Result<u64> {
        self.repo.delete_expired().await
    }
}

fn session_ttl_secs(config: &SessionConfig) -> u64 {
    config.ttl_seconds.clamp(1, MAX_SESSION_TTL_SECS)
}

/// Build the store selected by `session.driver`
pub fn create_session_store(
    config: &SessionConfig,
    db: Arc<ConnectionManager>,
) -> Arc<dyn SessionStore> {
    match config.driver {
        SessionDriver::Memory => {
            tracing::info!("Using in-memory session store");
            Arc::new(MemorySessionStore::new(Duration::from_secs(
                session_ttl_secs(config),
            )))
        }
        SessionDriver::Database => {
            tracing::info!("Using database session store");
            Arc::new(SqlSessionStore::new(SqlxSessionRepository::boxed(db)))
        }
    }
}

/// HMAC signer for session cookie values
#[derive(Clone)]
pub struct CookieSigner {
    mac: HmacSha256,
}

impl CookieSigner {
    pub fn new(key: &[u8]) -> Result<Self> {
        let mac = HmacSha256::new_from_slice(key)
            .map_err(|e| anyhow::anyhow!("Invalid session signing key: {}", e))?;
        Ok(Self { mac })
    }

    /// Signer over a throwaway per-process key
    pub fn random() -> Result<Self> {
        let mut key = Vec::with_capacity(32);
        key.extend_from_slice(uuid::Uuid::new_v4().as_bytes());
        key.extend_from_slice(uuid::Uuid::new_v4().as_bytes());
        Self::new(&key)
    }

    /// `<id>.<signature>`
    pub fn sign(&self, id: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        let tag = mac.finalize().into_bytes();
        format!("{}.{}", id, HEXLOWER.encode(&tag))
    }

    /// The session id carried by `value`, if its signature verifies
    pub fn verify<'a>(&self, value: &'a str) -> Option<&'a str> {
        let (id, signature) = value.rsplit_once('.')?;
        let tag = HEXLOWER.decode(signature.as_bytes()).ok()?;

        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        mac.verify_slice(&tag).ok()?;
        Some(id)
    }
}

/// Session lifecycle on top of a `SessionStore`, plus cookie handling
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    signer: CookieSigner,
    ttl: chrono::Duration,
    cookie_name: String,
}

impl SessionService {
    pub fn new(
        store: Arc<dyn SessionStore>,
        signer: CookieSigner,
        ttl: chrono::Duration,
        cookie_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            signer,
            ttl,
            cookie_name: cookie_name.into(),
        }
    }

    pub fn from_config(config: &SessionConfig, store: Arc<dyn SessionStore>) -> Result<Self> {
        let signer = if config.secret.is_empty() {
            tracing::warn!(
                "SESSION_SECRET is not set; signing cookies with a random key, sessions will not survive a restart"
            );
            CookieSigner::random()?
        } else {
            CookieSigner::new(config.secret.as_bytes())?
        };

        let ttl = chrono::Duration::seconds(session_ttl_secs(config) as i64);
        Ok(Self::new(store, signer, ttl, config.cookie_name.clone()))
    }

    /// Find this service's cookie in a `Cookie` request header
    pub fn find_cookie<'a>(&self, cookie_header: &'a str) -> Option<&'a str> {
        cookie_header.split(';').find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == self.cookie_name).then_some(value)
        })
    }

    /// Resolve a cookie value to a live session
    pub async fn load(&self, cookie_value: &str) -> Result<Option<Session>> {
        let Some(id) = self.signer.verify(cookie_value) else {
            tracing::debug!("Ignoring session cookie with bad signature");
            return Ok(None);
        };

        match self.store.get(id).await? {
            Some(session) if session.is_expired() => {
                self.store.destroy(id).await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Start a fresh session carrying `user`
    pub async fn establish(&self, user: &str) -> Result<Session> {
        let mut session = Session::new(self.ttl);
        session.user = Some(user.to_string());
        self.store.set(&session).await?;
        Ok(session)
    }

    pub async fn destroy(&self, id: &str) -> Result<()> {
        self.store.destroy(id).await
    }

    pub async fn purge_expired(&self) -> Result<u64> {
        self.store.purge_expired().await
    }

    /// `Set-Cookie` value for `session`
    pub fn session_cookie(&self, session: &Session) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.cookie_name,
            self.signer.sign(&session.id),
            self.ttl.num_seconds()
        )
    }

    /// `Set-Cookie` value that removes the session cookie
    pub fn clearing_cookie(&self) -> String {
        format!(
            "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
            self.cookie_name
        )
    }
}

/// Sweep expired sessions every `interval` for the life of the process
pub fn spawn_purge_task(
    sessions: Arc<SessionService>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match sessions.purge_expired().await {
                Ok(0) => {}
                Ok(n) => tracing::debug!("Purged {} expired session(s)", n),
                Err(e) => tracing::warn!("Failed to purge expired sessions: {:#}", e),
            }
        }
    })
}
