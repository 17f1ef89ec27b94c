use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::DedupConfig;

#[derive(Error, Debug)]
pub enum DedupError {
    #[error("{0}")]
    Redis(#[from] redis::RedisError),

    #[error("dedup store did not answer within {0:?}")]
    Timeout(Duration),
}

/// A set-membership service: `add` inserts a member and reports how many
/// members were newly inserted (0 or 1). Must be atomic at the store.
#[async_trait]
pub trait DedupStore: Send + Sync {
    async fn add(&self, set_key: &str, member: &str) -> Result<u64, DedupError>;
}

#[derive(Debug)]
pub enum Submission {
    New,
    Duplicate,
    /// The store could not be asked; the caller decides what that means.
    Unknown(DedupError),
}

/// Answers "was this submission already forwarded?" by marking it in a shared set.
pub struct DedupGuard {
    store: Box<dyn DedupStore>,
    set_key: String,
}

impl DedupGuard {
    pub fn new(store: Box<dyn DedupStore>, set_key: impl Into<String>) -> Self {
        Self {
            store,
            set_key: set_key.into(),
        }
    }

    pub async fn check_and_mark(&self, submission_id: &str) -> Submission {
        if submission_id.is_empty() {
            debug!("no submission id, skipping duplicate check");
            return Submission::New;
        }

        match self.store.add(&self.set_key, submission_id).await {
            Ok(0) => {
                info!(submission_id, "submission already registered");
                Submission::Duplicate
            }
            Ok(added) => {
                debug!(submission_id, added, "submission recorded");
                Submission::New
            }
            Err(error) => {
                warn!(%error, submission_id, "unable to validate submission");
                Submission::Unknown(error)
            }
        }
    }
}

/// Redis backed store. A connection is opened per check, so an outage only
/// affects the requests that arrive while it lasts.
pub struct RedisDedupStore {
    client: redis::Client,
    timeout: Duration,
}

impl RedisDedupStore {
    pub fn new(config: &DedupConfig) -> Result<Self, DedupError> {
        let client = redis::Client::open(config.connection_url())?;
        Ok(Self {
            client,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    async fn sadd(&self, set_key: &str, member: &str) -> Result<u64, DedupError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let added: u64 = redis::cmd("SADD")
            .arg(set_key)
            .arg(member)
            .query_async(&mut conn)
            .await?;
        Ok(added)
    }
}

#[async_trait]
impl DedupStore for RedisDedupStore {
    async fn add(&self, set_key: &str, member: &str) -> Result<u64, DedupError> {
        tokio::time::timeout(self.timeout, self.sadd(set_key, member))
            .await
            .map_err(|_| DedupError::Timeout(self.timeout))?
    }
}
