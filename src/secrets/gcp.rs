//! Google Secret Manager provider.
//!
//! Reads the latest version of each secret through the Secret Manager
//! REST API. The OAuth token comes from the GCE/Cloud Functions metadata
//! server, which is reachable from inside any Google-managed runtime.
//!
//! Access URL: `{api}/v1/projects/{project}/secrets/{name}/versions/latest:access`
//! Payloads are returned base64-encoded.

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, StatusCode};
use secrecy::SecretString;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::CredentialProvider;
use crate::error::{InvestError, Result};

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const SECRET_MANAGER_URL: &str = "https://secretmanager.googleapis.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct AccessSecretVersionResponse {
    payload: SecretPayload,
}

#[derive(Debug, Deserialize)]
struct SecretPayload {
    #[serde(default)]
    data: String,
}

/// Secret Manager client scoped to one project.
pub struct SecretManagerProvider {
    http: Client,
    project: String,
    metadata_token_url: String,
    api_base: String,
    token: OnceCell<String>,
}

impl SecretManagerProvider {
    pub fn new(project: impl Into<String>) -> Result<Self> {
        Self::with_endpoints(project, METADATA_TOKEN_URL, SECRET_MANAGER_URL)
    }

    /// Point the provider at alternative metadata and API hosts.
    pub fn with_endpoints(
        project: impl Into<String>,
        metadata_token_url: &str,
        api_base: &str,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| InvestError::Config(format!("Failed to build HTTP client for Secret Manager: {e}")))?;

        Ok(Self {
            http,
            project: project.into(),
            metadata_token_url: metadata_token_url.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            token: OnceCell::new(),
        })
    }

    fn secret_url(&self, name: &str) -> String {
        format!(
            "{}/v1/projects/{}/secrets/{}/versions/latest:access",
            self.api_base,
            urlencoding::encode(&self.project),
            urlencoding::encode(name),
        )
    }

    /// Service-account token from the metadata server, fetched once.
    async fn access_token(&self) -> Result<&str> {
        let token = self
            .token
            .get_or_try_init(|| async {
                debug!("Requesting service account token from metadata server");
                let resp = self
                    .http
                    .get(&self.metadata_token_url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await
                    .map_err(|e| InvestError::from_transport("metadata", REQUEST_TIMEOUT, e))?;

                if !resp.status().is_success() {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    return Err(InvestError::SecretStore(format!(
                        "metadata server returned {status}: {body}"
                    )));
                }

                let token: MetadataToken = resp.json().await.map_err(|e| {
                    InvestError::SecretStore(format!("malformed metadata token response: {e}"))
                })?;
                Ok::<_, InvestError>(token.access_token)
            })
            .await?;
        Ok(token.as_str())
    }
}

#[async_trait]
impl CredentialProvider for SecretManagerProvider {
    async fn fetch(&self, name: &str) -> Result<SecretString> {
        let token = self.access_token().await?;
        let url = self.secret_url(name);

        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| InvestError::from_transport("secretmanager", REQUEST_TIMEOUT, e))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(InvestError::Config(format!(
                "{name} does not exist in Secret Manager project {}.",
                self.project
            )));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(InvestError::SecretStore(format!(
                "access to {name} failed {status}: {body}"
            )));
        }

        let version: AccessSecretVersionResponse = resp.json().await.map_err(|e| {
            InvestError::SecretStore(format!("malformed response for {name}: {e}"))
        })?;

        let value = decode_payload(&version.payload.data)
            .map_err(|e| InvestError::SecretStore(format!("{name}: {e}")))?;

        info!(secret = name, "Secret retrieved");
        Ok(SecretString::new(value))
    }

    fn name(&self) -> &str {
        "Secret Manager"
    }
}

fn decode_payload(data: &str) -> std::result::Result<String, String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| format!("payload is not valid base64: {e}"))?;
    String::from_utf8(bytes).map_err(|_| "payload is not valid UTF-8".to_string())
}
