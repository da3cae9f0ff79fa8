//! Identity verification
//!
//! Login goes through an `IdentityVerifier` so the credential source can be
//! swapped without touching routing. The only shipped verifier compares
//! against a single configured username/password pair.

use async_trait::async_trait;

use crate::config::AuthConfig;

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Whether `password` is the credential for `username`
    async fn verify(&self, username: &str, password: &str) -> bool;

    /// The identity the admin gate admits
    fn admin_identity(&self) -> &str;
}

/// Fixed credential pair, compared literally
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    username: String,
    password: String,
}

impl StaticCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.username.clone(), config.password.clone())
    }
}

#[async_trait]
impl IdentityVerifier for StaticCredentials {
    async fn verify(&self, username: &str, password: &str) -> bool {
        username == self.username && password == self.password
    }

    fn admin_identity(&self) -> &str {
        &self.username
    }
}
