//! Credential retrieval.
//!
//! A run needs four secrets to obtain an access token. They come from a
//! [`CredentialProvider`]: Google Secret Manager in production, or plain
//! environment variables for local runs.

pub mod gcp;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use tracing::debug;

use crate::error::{InvestError, Result};
use crate::types::Credentials;

pub const USER: &str = "PROSPER_USER";
pub const PASSWORD: &str = "PROSPER_PASSWORD";
pub const CLIENT_ID: &str = "PROSPER_CLIENT_ID";
pub const CLIENT_SECRET: &str = "PROSPER_CLIENT_SECRET";

/// Source of named secret values.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Fetch the latest value of the secret called `name`.
    async fn fetch(&self, name: &str) -> Result<SecretString>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

/// Fetch and validate all four credentials.
///
/// A missing or blank secret is a configuration error.
pub async fn load_credentials(provider: &dyn CredentialProvider) -> Result<Credentials> {
    debug!(provider = provider.name(), "Loading credentials");

    Ok(Credentials {
        user: fetch_required(provider, USER).await?,
        password: fetch_required(provider, PASSWORD).await?,
        client_id: fetch_required(provider, CLIENT_ID).await?,
        client_secret: fetch_required(provider, CLIENT_SECRET).await?,
    })
}

async fn fetch_required(provider: &dyn CredentialProvider, name: &str) -> Result<SecretString> {
    let value = provider.fetch(name).await?;
    if value.expose_secret().trim().is_empty() {
        return Err(InvestError::Config(format!(
            "{name} value is not set in {}.",
            provider.name()
        )));
    }
    Ok(value)
}

/// Reads each secret from the environment variable of the same name.
#[derive(Debug, Default)]
pub struct EnvCredentialProvider;

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn fetch(&self, name: &str) -> Result<SecretString> {
        std::env::var(name)
            .map(SecretString::new)
            .map_err(|_| InvestError::Config(format!("{name} environment variable is not set.")))
    }

    fn name(&self) -> &str {
        "environment"
    }
}

/// Fixed in-memory secrets. Injected by tests and sandbox harnesses that
/// drive a [`Runner`](crate::engine::runner::Runner) directly.
#[derive(Debug, Default)]
pub struct StaticCredentialProvider {
    values: HashMap<String, String>,
}

impl StaticCredentialProvider {
    pub fn new<K, V>(values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn fetch(&self, name: &str) -> Result<SecretString> {
        self.values
            .get(name)
            .cloned()
            .map(SecretString::new)
            .ok_or_else(|| InvestError::Config(format!("{name} is not set.")))
    }

    fn name(&self) -> &str {
        "static secrets"
    }
}
