mod config;
mod error;
mod handler;
mod models;
#[cfg(test)]
mod testutils;

use anyhow::Context;
use clap::Parser;
use config::{Config, DedupProtocol, StoreErrorPolicy};
use handler::AppState;
use models::{
    dedup::{DedupGuard, RedisDedupStore},
    helpdesk_api::HelpdeskClient,
    secrets::{CachedCredentialProvider, KubernetesSecretProvider},
};
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

// ----------------------------------------------------------------------
// 1  Command line
// ----------------------------------------------------------------------
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// YAML config file; every value has a default
    #[arg(long, env = "REGISTER_TICKET_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Helpdesk "create ticket" endpoint
    #[arg(long, env = "HELPDESK_ENDPOINT")]
    endpoint: Option<Url>,

    /// Namespace of the credentials secret
    #[arg(long, env = "SECRET_NAMESPACE")]
    namespace: Option<String>,

    /// Name of the credentials secret
    #[arg(long, env = "SECRET_NAME")]
    secret_name: Option<String>,

    /// Dedup store address
    #[arg(long, env = "REDIS_SERVER")]
    redis_server: Option<String>,

    #[arg(long, env = "REDIS_PROTOCOL", value_enum)]
    redis_protocol: Option<DedupProtocol>,

    /// What to do when the dedup store is unreachable
    #[arg(long, env = "DEDUP_ON_STORE_ERROR", value_enum)]
    on_store_error: Option<StoreErrorPolicy>,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(port) = self.port {
            config.listen_port = port;
        }
        if let Some(endpoint) = &self.endpoint {
            config.helpdesk.endpoint = endpoint.clone();
        }
        if let Some(namespace) = &self.namespace {
            config.secrets.namespace = namespace.clone();
        }
        if let Some(secret_name) = &self.secret_name {
            config.secrets.name = secret_name.clone();
        }
        if let Some(redis_server) = &self.redis_server {
            config.dedup.address = redis_server.clone();
        }
        if let Some(protocol) = self.redis_protocol {
            config.dedup.protocol = protocol;
        }
        if let Some(policy) = self.on_store_error {
            config.dedup.on_store_error = policy;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

// ----------------------------------------------------------------------
// 2  Startup
// ----------------------------------------------------------------------
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // a) Logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // b) Config
    let config = Cli::parse().load_config()?;
    info!(
        endpoint = %config.helpdesk.endpoint,
        dedup = %config.dedup.address,
        on_store_error = ?config.dedup.on_store_error,
        "configuration loaded"
    );

    // c) Collaborators
    let store = RedisDedupStore::new(&config.dedup).context("invalid dedup store address")?;
    let secrets = KubernetesSecretProvider::new(&config.secrets)
        .context("cannot set up secret store access")?;
    let credentials = CachedCredentialProvider::new(
        secrets,
        Duration::from_secs(config.secrets.cache_ttl_secs),
    );
    let helpdesk = HelpdeskClient::new(&config.helpdesk).context("cannot build HTTP client")?;

    let state = Arc::new(AppState {
        dedup: DedupGuard::new(Box::new(store), config.dedup.set_key.clone()),
        on_store_error: config.dedup.on_store_error,
        credentials: Arc::new(credentials),
        helpdesk,
    });

    // d) Server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    info!("Listening on http://{addr}/");
    axum::serve(listener, handler::router(state))
        .await
        .context("server error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_defaults() {
        let cli = Cli::parse_from([
            "register-ticket",
            "--port",
            "9090",
            "--endpoint",
            "https://example.zendesk.com/api/v2/tickets.json",
            "--secret-name",
            "helpdesk",
            "--redis-server",
            "localhost:6379",
            "--on-store-error",
            "fail-closed",
        ]);
        let config = cli.load_config().unwrap();

        assert_eq!(config.listen_port, 9090);
        assert_eq!(
            config.helpdesk.endpoint.as_str(),
            "https://example.zendesk.com/api/v2/tickets.json"
        );
        assert_eq!(config.secrets.name, "helpdesk");
        assert_eq!(config.secrets.namespace, "default");
        assert_eq!(config.dedup.address, "localhost:6379");
        assert_eq!(config.dedup.protocol, DedupProtocol::Tcp);
        assert_eq!(config.dedup.on_store_error, StoreErrorPolicy::FailClosed);
    }

    #[test]
    fn test_cli_rejects_invalid_config() {
        let cli = Cli::parse_from(["register-ticket", "--port", "0"]);
        assert!(cli.load_config().is_err());
    }
}
