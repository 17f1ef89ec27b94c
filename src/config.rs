use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;
use url::Url;

const DEFAULT_ENDPOINT: &str = "https://landg.zendesk.com/api/v2/tickets.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid helpdesk endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Dedup set key cannot be empty")]
    EmptySetKey,

    #[error("Secret name and namespace cannot be empty")]
    EmptySecretName,
}

/// Service configuration. Built once at startup and shared read-only.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub listen_port: u16,
    pub helpdesk: HelpdeskConfig,
    pub secrets: SecretsConfig,
    pub dedup: DedupConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct HelpdeskConfig {
    /// Zendesk "create ticket" endpoint
    pub endpoint: Url,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SecretsConfig {
    pub namespace: String,
    pub name: String,
    /// How long fetched credentials are reused. 0 fetches on every request.
    pub cache_ttl_secs: u64,
    /// Bound on one Kubernetes API round trip.
    pub timeout_secs: u64,
    /// Talk to this API server instead of the in-cluster one (local runs).
    pub api_server: Option<Url>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DedupConfig {
    /// `host:port` for tcp, socket path for unix
    pub address: String,
    pub protocol: DedupProtocol,
    pub set_key: String,
    pub timeout_secs: u64,
    pub on_store_error: StoreErrorPolicy,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DedupProtocol {
    Tcp,
    Unix,
}

/// What to do with a submission when the dedup store cannot be asked.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StoreErrorPolicy {
    /// Forward anyway, accepting a possible duplicate ticket.
    FailOpen,
    /// Reject the submission with 503.
    FailClosed,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: 8085,
            helpdesk: HelpdeskConfig::default(),
            secrets: SecretsConfig::default(),
            dedup: DedupConfig::default(),
        }
    }
}

impl Default for HelpdeskConfig {
    fn default() -> Self {
        Self {
            endpoint: Url::parse(DEFAULT_ENDPOINT).expect("default endpoint is a valid URL"),
            timeout_secs: 10,
        }
    }
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            name: "zendesk-secret".to_string(),
            cache_ttl_secs: 60,
            timeout_secs: 10,
            api_server: None,
        }
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            address: "redis-redis.redis.svc.cluster.local:6379".to_string(),
            protocol: DedupProtocol::Tcp,
            set_key: "submissionID".to_string(),
            timeout_secs: 2,
            on_store_error: StoreErrorPolicy::FailOpen,
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config_str = fs::read_to_string(path)?;
        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        let scheme = self.helpdesk.endpoint.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(ConfigError::InvalidEndpoint(format!(
                "unsupported scheme {scheme}"
            )));
        }

        if self.dedup.set_key.is_empty() {
            return Err(ConfigError::EmptySetKey);
        }

        if self.secrets.name.is_empty() || self.secrets.namespace.is_empty() {
            return Err(ConfigError::EmptySecretName);
        }

        Ok(())
    }
}

impl DedupConfig {
    pub fn connection_url(&self) -> String {
        match self.protocol {
            DedupProtocol::Tcp => format!("redis://{}/", self.address),
            DedupProtocol::Unix => format!("redis+unix://{}", self.address),
        }
    }
}
