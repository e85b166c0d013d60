//! Secret port with selectable backends. The environment backend is always
//! available and is the fallback when a configured backend cannot start.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, name: &str) -> Option<String>;
}

/// Plain environment variables.
pub struct EnvSecrets;

#[async_trait]
impl SecretStore for EnvSecrets {
    async fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }
}

/// HashiCorp Vault KV v2 over HTTP. Secrets live under
/// `secret/data/{app}/{name}` keyed by the secret name.
pub struct VaultSecrets {
    addr: String,
    token: String,
    app_name: String,
    http: reqwest::Client,
}

impl VaultSecrets {
    pub fn new(addr: String, token: String, app_name: String) -> Self {
        Self {
            addr,
            token,
            app_name,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SecretStore for VaultSecrets {
    async fn get(&self, name: &str) -> Option<String> {
        let url = format!(
            "{}/v1/secret/data/{}/{}",
            self.addr.trim_end_matches('/'),
            self.app_name,
            name
        );
        let response = self
            .http
            .get(&url)
            .header("X-Vault-Token", &self.token)
            .send()
            .await
            .ok()?
            .error_for_status()
            .ok()?;
        let body: serde_json::Value = response.json().await.ok()?;
        body.get("data")?
            .get("data")?
            .get(name)?
            .as_str()
            .map(String::from)
    }
}

/// Env backend first for the lookup chain, so deployments can override a
/// single secret without touching the backend.
pub struct ChainedSecrets {
    stores: Vec<Arc<dyn SecretStore>>,
}

#[async_trait]
impl SecretStore for ChainedSecrets {
    async fn get(&self, name: &str) -> Option<String> {
        for store in &self.stores {
            if let Some(value) = store.get(name).await {
                return Some(value);
            }
        }
        None
    }
}

/// Build the secret store selected by `SECRET_BACKEND` (env, aws, vault).
/// The AWS adapter is an external collaborator behind this same port; when
/// selected here it degrades to the env backend with a warning.
pub fn from_env() -> Arc<dyn SecretStore> {
    let backend = std::env::var("SECRET_BACKEND").unwrap_or_else(|_| "env".to_string());
    match backend.to_lowercase().as_str() {
        "vault" => {
            let addr = std::env::var("VAULT_ADDR")
                .unwrap_or_else(|_| "http://localhost:8200".to_string());
            match std::env::var("VAULT_TOKEN") {
                Ok(token) if !token.is_empty() => {
                    let app_name =
                        std::env::var("APP_NAME").unwrap_or_else(|_| "fiscal-ops".to_string());
                    info!(addr = %addr, "using vault secret backend");
                    Arc::new(ChainedSecrets {
                        stores: vec![
                            Arc::new(EnvSecrets),
                            Arc::new(VaultSecrets::new(addr, token, app_name)),
                        ],
                    })
                }
                _ => {
                    warn!("VAULT_TOKEN not set, falling back to env secrets");
                    Arc::new(EnvSecrets)
                }
            }
        }
        "aws" => {
            warn!("aws secret backend requires the external adapter, falling back to env");
            Arc::new(EnvSecrets)
        }
        _ => Arc::new(EnvSecrets),
    }
}
