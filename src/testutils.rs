use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::Bytes,
    http::{HeaderMap, StatusCode, header},
};
use tokio::net::TcpListener;

use crate::models::dedup::{DedupError, DedupStore};
use crate::models::secrets::{CredentialError, CredentialProvider, Credentials};

/// Serves `app` on an ephemeral local port and returns its base URL.
pub async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// In-process stand-in for the Redis set.
#[derive(Clone, Default)]
pub struct MemoryDedupStore {
    sets: Arc<Mutex<HashMap<String, HashSet<String>>>>,
    calls: Arc<AtomicUsize>,
}

impl MemoryDedupStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn contains(&self, set_key: &str, member: &str) -> bool {
        self.sets
            .lock()
            .unwrap()
            .get(set_key)
            .is_some_and(|set| set.contains(member))
    }
}

#[async_trait]
impl DedupStore for MemoryDedupStore {
    async fn add(&self, set_key: &str, member: &str) -> Result<u64, DedupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut sets = self.sets.lock().unwrap();
        let inserted = sets
            .entry(set_key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(u64::from(inserted))
    }
}

/// A store that is never reachable.
pub struct FailingDedupStore;

#[async_trait]
impl DedupStore for FailingDedupStore {
    async fn add(&self, _set_key: &str, _member: &str) -> Result<u64, DedupError> {
        Err(DedupError::Timeout(std::time::Duration::from_secs(2)))
    }
}

pub struct StaticCredentials(pub Credentials);

impl StaticCredentials {
    pub fn valid() -> Self {
        Self(Credentials {
            api_key: "api-key".to_string(),
            api_password: "api-password".to_string(),
        })
    }

    pub fn without_key() -> Self {
        Self(Credentials {
            api_key: String::new(),
            api_password: "api-password".to_string(),
        })
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn get_credentials(&self) -> Result<Credentials, CredentialError> {
        self.0.clone().validate()
    }
}

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub body: Bytes,
    pub content_type: Option<String>,
    pub authorization: Option<String>,
}

/// Fake helpdesk answering every request with a fixed status and body.
pub struct MockHelpdesk {
    pub base_url: String,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockHelpdesk {
    pub async fn start(status: u16, body: &'static str) -> Self {
        let recorded = Arc::new(Mutex::new(Vec::new()));
        let requests = recorded.clone();
        let status = StatusCode::from_u16(status).unwrap();

        let app = Router::new().fallback(move |headers: HeaderMap, request_body: Bytes| {
            let requests = requests.clone();
            async move {
                let header_value = |name: header::HeaderName| {
                    headers
                        .get(name)
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_string)
                };
                requests.lock().unwrap().push(RecordedRequest {
                    body: request_body,
                    content_type: header_value(header::CONTENT_TYPE),
                    authorization: header_value(header::AUTHORIZATION),
                });
                (status, [(header::CONTENT_TYPE, "application/json")], body)
            }
        });

        Self {
            base_url: serve(app).await,
            recorded,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.recorded.lock().unwrap().clone()
    }
}
