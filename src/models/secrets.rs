//! Helpdesk API credentials, read from a Kubernetes secret.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Certificate, Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::SecretsConfig;

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";
const API_KEY_FIELD: &str = "apiKey";
const PASSWORD_FIELD: &str = "password";

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("not running inside a cluster: {0}")]
    NotInCluster(String),

    #[error("secret {namespace}/{name} not found")]
    SecretNotFound { namespace: String, name: String },

    #[error("secret store rejected the lookup with status {0}")]
    Rejected(StatusCode),

    #[error("secret store request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("secret field {0} is not valid base64 encoded text")]
    InvalidData(&'static str),

    #[error("Missing API Key")]
    MissingApiKey,

    #[error("Missing API Password")]
    MissingApiPassword,
}

/// Basic auth pair for the helpdesk API.
#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub api_key: String,
    pub api_password: String,
}

impl Credentials {
    /// Both halves must be present before the helpdesk is called.
    pub fn validate(self) -> Result<Self, CredentialError> {
        if self.api_key.is_empty() {
            return Err(CredentialError::MissingApiKey);
        }
        if self.api_password.is_empty() {
            return Err(CredentialError::MissingApiPassword);
        }
        Ok(self)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("api_password", &"<redacted>")
            .finish()
    }
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn get_credentials(&self) -> Result<Credentials, CredentialError>;
}

/// Where the Kubernetes API lives and how to authenticate against it.
enum ApiServer {
    InCluster { base_url: String, token_path: PathBuf },
    Explicit { base_url: String },
}

pub struct KubernetesSecretProvider {
    client: Client,
    api: ApiServer,
    namespace: String,
    name: String,
}

impl KubernetesSecretProvider {
    pub fn new(config: &SecretsConfig) -> Result<Self, CredentialError> {
        let builder = Client::builder().timeout(Duration::from_secs(config.timeout_secs));

        let (client, api) = match &config.api_server {
            Some(url) => (
                builder.build()?,
                ApiServer::Explicit {
                    base_url: url.as_str().trim_end_matches('/').to_string(),
                },
            ),
            None => {
                let host = std::env::var("KUBERNETES_SERVICE_HOST")
                    .map_err(|_| CredentialError::NotInCluster("KUBERNETES_SERVICE_HOST is not set".into()))?;
                let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".into());
                let service_account = PathBuf::from(SERVICE_ACCOUNT_DIR);
                let ca = std::fs::read(service_account.join("ca.crt"))
                    .map_err(|e| CredentialError::NotInCluster(format!("cannot read cluster CA: {e}")))?;

                let client = builder
                    .use_rustls_tls()
                    .add_root_certificate(Certificate::from_pem(&ca)?)
                    .build()?;
                (
                    client,
                    ApiServer::InCluster {
                        base_url: format!("https://{}", join_host_port(&host, &port)),
                        token_path: service_account.join("token"),
                    },
                )
            }
        };

        Ok(Self {
            client,
            api,
            namespace: config.namespace.clone(),
            name: config.name.clone(),
        })
    }

    fn secret_url(&self) -> String {
        let base_url = match &self.api {
            ApiServer::InCluster { base_url, .. } | ApiServer::Explicit { base_url } => base_url,
        };
        format!(
            "{}/api/v1/namespaces/{}/secrets/{}",
            base_url, self.namespace, self.name
        )
    }
}

fn join_host_port(host: &str, port: &str) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

#[derive(Deserialize)]
struct SecretObject {
    #[serde(default)]
    data: HashMap<String, String>,
}

impl SecretObject {
    fn field(&self, field: &'static str) -> Result<String, CredentialError> {
        let Some(encoded) = self.data.get(field) else {
            return Ok(String::new());
        };
        let raw = STANDARD
            .decode(encoded)
            .map_err(|_| CredentialError::InvalidData(field))?;
        String::from_utf8(raw).map_err(|_| CredentialError::InvalidData(field))
    }
}

#[async_trait]
impl CredentialProvider for KubernetesSecretProvider {
    #[tracing::instrument(skip_all, fields(namespace = %self.namespace, secret = %self.name))]
    async fn get_credentials(&self) -> Result<Credentials, CredentialError> {
        let url = self.secret_url();
        debug!("Secret Request URL: {}", url);

        let mut request = self.client.get(&url);
        if let ApiServer::InCluster { token_path, .. } = &self.api {
            // Service account tokens are rotated on disk, read it every time.
            let token = tokio::fs::read_to_string(token_path)
                .await
                .map_err(|e| CredentialError::NotInCluster(format!("cannot read service account token: {e}")))?;
            request = request.bearer_auth(token.trim());
        }

        let resp = request.send().await?;
        match resp.status() {
            StatusCode::NOT_FOUND => {
                return Err(CredentialError::SecretNotFound {
                    namespace: self.namespace.clone(),
                    name: self.name.clone(),
                });
            }
            status if !status.is_success() => return Err(CredentialError::Rejected(status)),
            _ => {}
        }

        let secret: SecretObject = resp.json().await?;
        Credentials {
            api_key: secret.field(API_KEY_FIELD)?,
            api_password: secret.field(PASSWORD_FIELD)?,
        }
        .validate()
    }
}

/// Keeps the last complete credentials for a short while to spare the secret store.
/// Incomplete credentials and lookup failures are never cached.
pub struct CachedCredentialProvider<P> {
    inner: P,
    ttl: Duration,
    cached: RwLock<Option<(Instant, Credentials)>>,
}

impl<P: CredentialProvider> CachedCredentialProvider<P> {
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cached: RwLock::new(None),
        }
    }
}

#[async_trait]
impl<P: CredentialProvider> CredentialProvider for CachedCredentialProvider<P> {
    async fn get_credentials(&self) -> Result<Credentials, CredentialError> {
        if self.ttl.is_zero() {
            return self.inner.get_credentials().await;
        }

        {
            let cached = self.cached.read().await;
            if let Some((fetched_at, credentials)) = cached.as_ref() {
                if fetched_at.elapsed() < self.ttl {
                    return Ok(credentials.clone());
                }
            }
        }

        let credentials = self.inner.get_credentials().await?;
        info!("helpdesk credentials refreshed");
        *self.cached.write().await = Some((Instant::now(), credentials.clone()));
        Ok(credentials)
    }
}
