//! Hint store backed by a remote document service speaking JSON over HTTP.
//!
//! Protocol:
//! - `POST {base}/resolve` with `{"identifiers": [...]}` answers `{"urls": [...]}`
//! - `PUT {base}/hints` with the identifier to URL-list mapping answers any 2xx

use std::time::Duration;

use async_trait::async_trait;
use repocache_core::HintMap;
use repocache_util::errors::{RepoCacheError, RepoCacheResult};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::store::HintStore;

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(500);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct ResolveRequest<'a> {
    identifiers: &'a [String],
}

#[derive(Debug, Deserialize)]
struct ResolveResponse {
    #[serde(default)]
    urls: Vec<String>,
}

/// HTTP/JSON hint store client.
#[derive(Debug, Clone)]
pub struct HttpHintStore {
    client: Client,
    base: String,
}

impl HttpHintStore {
    /// Create a client for the service rooted at `base` (trailing `/` ignored).
    pub fn new(base: &str) -> RepoCacheResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("repocache/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RepoCacheError::Network {
                message: format!("Failed to create HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn resolve_url(&self) -> String {
        format!("{}/resolve", self.base)
    }

    fn hints_url(&self) -> String {
        format!("{}/hints", self.base)
    }

    /// Send a request, retrying connect/timeout failures and 5xx responses.
    ///
    /// Returns the successful response, or a message describing the last failure.
    async fn send_with_retries(
        &self,
        ctx: &CancellationToken,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<reqwest::Response, SendError> {
        let mut last_err = String::new();

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                tokio::select! {
                    biased;
                    _ = ctx.cancelled() => return Err(SendError::Cancelled),
                    _ = tokio::time::sleep(RETRY_DELAY * attempt) => {}
                }
            }

            let sent = tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(SendError::Cancelled),
                sent = build().send() => sent,
            };

            match sent {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_server_error() {
                        last_err = format!("HTTP {status}");
                        tracing::debug!("hint store returned {status}, attempt {}", attempt + 1);
                        continue;
                    }
                    if !status.is_success() {
                        return Err(SendError::Failed(format!("HTTP {status}")));
                    }
                    return Ok(resp);
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    last_err = e.to_string();
                    tracing::debug!("hint store unreachable ({e}), attempt {}", attempt + 1);
                    continue;
                }
                Err(e) => return Err(SendError::Failed(e.to_string())),
            }
        }

        Err(SendError::Failed(format!(
            "failed after {MAX_RETRIES} attempts: {last_err}"
        )))
    }
}

enum SendError {
    Cancelled,
    Failed(String),
}

#[async_trait]
impl HintStore for HttpHintStore {
    async fn resolve(
        &self,
        ctx: &CancellationToken,
        identifiers: &[String],
    ) -> RepoCacheResult<Vec<String>> {
        let url = self.resolve_url();
        let body = ResolveRequest { identifiers };
        let resp = self
            .send_with_retries(ctx, || self.client.post(&url).json(&body))
            .await
            .map_err(|e| match e {
                SendError::Cancelled => RepoCacheError::Cancelled,
                SendError::Failed(message) => RepoCacheError::HintResolve {
                    message: format!("{url}: {message}"),
                },
            })?;

        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        let parsed: ResolveResponse =
            resp.json()
                .await
                .map_err(|e| RepoCacheError::HintResolve {
                    message: format!("{url}: invalid response body: {e}"),
                })?;
        Ok(parsed.urls)
    }

    async fn save(&self, ctx: &CancellationToken, hints: &HintMap) -> RepoCacheResult<()> {
        let url = self.hints_url();
        self.send_with_retries(ctx, || self.client.put(&url).json(hints))
            .await
            .map_err(|e| match e {
                SendError::Cancelled => RepoCacheError::Cancelled,
                SendError::Failed(message) => RepoCacheError::HintSave {
                    message: format!("{url}: {message}"),
                },
            })?;
        tracing::debug!("saved {} hint entries to {url}", hints.len());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "http"
    }
}
