//! Services layer
//!
//! - `report`: report submission and admin mutations
//! - `identity`: credential verification behind `IdentityVerifier`
//! - `session`: session store backends and signed session cookies

pub mod identity;
pub mod report;
pub mod session;

pub use identity::{IdentityVerifier, StaticCredentials};
pub use report::ReportService;
pub use session::{
    create_session_store, spawn_purge_task, CookieSigner, MemorySessionStore, SessionService,
    SessionStore, SqlSessionStore, PURGE_INTERVAL,
};
