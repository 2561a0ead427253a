//! In-process fake of the GCE metadata server and Secret Manager.
//!
//! `/token` plays the metadata server; secret versions are served under
//! `/v1/projects/{project}/secrets/{name}/versions/latest:access`.

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use base64::Engine;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use prosper_autoinvest::secrets::gcp::SecretManagerProvider;

pub const METADATA_TOKEN: &str = "meta-tok";

/// What the fake server received.
#[derive(Debug, Default, Clone)]
pub struct SecretCalls {
    pub token_requests: usize,
    pub metadata_flavor: Vec<String>,
    /// `(project, secret name)` per access, in arrival order.
    pub accessed: Vec<(String, String)>,
    pub authorization: Vec<String>,
}

#[derive(Default)]
struct Shared {
    token_status: Mutex<u16>,
    /// Secret name to (status, base64 payload).
    secrets: Mutex<HashMap<String, (u16, String)>>,
    calls: Mutex<SecretCalls>,
}

pub struct FakeSecretManager {
    shared: Arc<Shared>,
    base_url: String,
}

impl FakeSecretManager {
    pub async fn start<'a>(secrets: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let encoded = secrets
            .into_iter()
            .map(|(name, value)| {
                let data = base64::engine::general_purpose::STANDARD.encode(value);
                (name.to_string(), (200, data))
            })
            .collect();
        let shared = Arc::new(Shared {
            token_status: Mutex::new(200),
            secrets: Mutex::new(encoded),
            calls: Mutex::new(SecretCalls::default()),
        });

        let app = Router::new()
            .route("/token", get(token))
            .route("/v1/projects/:project/secrets/*rest", get(access))
            .with_state(shared.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            shared,
            base_url: format!("http://{addr}"),
        }
    }

    /// Answer every access to `name` with `status`.
    pub fn fail_secret(&self, name: &str, status: u16) {
        self.shared
            .secrets
            .lock()
            .unwrap()
            .insert(name.to_string(), (status, String::new()));
    }

    pub fn fail_token(&self, status: u16) {
        *self.shared.token_status.lock().unwrap() = status;
    }

    pub fn provider(&self, project: &str) -> SecretManagerProvider {
        SecretManagerProvider::with_endpoints(
            project,
            &format!("{}/token", self.base_url),
            &self.base_url,
        )
        .unwrap()
    }

    pub fn calls(&self) -> SecretCalls {
        self.shared.calls.lock().unwrap().clone()
    }
}

async fn token(State(shared): State<Arc<Shared>>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    {
        let mut calls = shared.calls.lock().unwrap();
        calls.token_requests += 1;
        if let Some(flavor) = headers.get("metadata-flavor") {
            calls
                .metadata_flavor
                .push(flavor.to_str().unwrap_or_default().to_string());
        }
    }
    let status = *shared.token_status.lock().unwrap();
    let body = if status == 200 {
        json!({"access_token": METADATA_TOKEN, "expires_in": 3599, "token_type": "Bearer"})
    } else {
        json!({"error": "unavailable"})
    };
    (StatusCode::from_u16(status).unwrap(), Json(body))
}

async fn access(
    State(shared): State<Arc<Shared>>,
    Path((project, rest)): Path<(String, String)>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let rest = rest.trim_start_matches('/');
    let (name, version) = rest.split_once('/').unwrap_or((rest, ""));
    assert_eq!(version, "versions/latest:access");

    {
        let mut calls = shared.calls.lock().unwrap();
        calls.accessed.push((project.clone(), name.to_string()));
        if let Some(auth) = headers.get(AUTHORIZATION) {
            calls
                .authorization
                .push(auth.to_str().unwrap_or_default().to_string());
        }
    }

    let entry = shared.secrets.lock().unwrap().get(name).cloned();
    match entry {
        Some((200, data)) => (
            StatusCode::OK,
            Json(json!({
                "name": format!("projects/{project}/secrets/{name}/versions/1"),
                "payload": {"data": data}
            })),
        ),
        Some((status, _)) => (
            StatusCode::from_u16(status).unwrap(),
            Json(json!({"error": {"code": status, "message": "forced failure"}})),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": {"code": 404, "status": "NOT_FOUND"}})),
        ),
    }
}
