//! HTTP transport with a hard per-request timeout

use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::error::CallError;
use crate::retry::{retry_with_backoff, RetryPolicy};

/// Hard timeout applied to every request unless configured otherwise
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Check that an endpoint is an absolute http(s) URL with a host
pub fn validate_endpoint(endpoint: &str) -> Result<Url, CallError> {
    let invalid = |reason: String| CallError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let trimmed = endpoint.trim();
    if trimmed.is_empty() {
        return Err(invalid("endpoint is empty".to_string()));
    }
    let url = Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

/// Resolve `path` below `base`, keeping any path prefix `base` carries
///
/// `https://host/quai` + `/api/v2/stats` gives `https://host/quai/api/v2/stats`.
pub fn join_path(base: &Url, path: &str) -> Result<Url, CallError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let prefixed = format!("{}/", base.path());
        base.set_path(&prefixed);
    }
    base.join(path.trim_start_matches('/'))
        .map_err(|e| CallError::InvalidEndpoint {
            endpoint: format!("{}{}", base, path),
            reason: e.to_string(),
        })
}

/// Thin wrapper over `reqwest::Client` returning JSON bodies
///
/// Transport failures are retried per the client's [`RetryPolicy`]; the
/// timeout applies to each attempt.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    timeout: Duration,
    policy: RetryPolicy,
}

impl HttpClient {
    /// Client that never retries
    pub fn new(timeout: Duration) -> Self {
        Self::with_retries(timeout, RetryPolicy::none())
    }

    pub fn with_retries(timeout: Duration, policy: RetryPolicy) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            timeout,
            policy,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// `GET` a URL and parse the body as JSON
    pub async fn get_json(&self, url: Url) -> Result<Value, CallError> {
        retry_with_backoff(&self.policy, url.path(), || {
            self.send(self.client.get(url.clone()))
        })
        .await
    }

    /// `POST` a JSON body and parse the response as JSON
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<Value, CallError> {
        retry_with_backoff(&self.policy, url.path(), || {
            self.send(self.client.post(url.clone()).json(body))
        })
        .await
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, CallError> {
        let response = request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| CallError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CallError::HttpError {
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CallError::from_reqwest(e, self.timeout))?;
        serde_json::from_slice(&bytes).map_err(|e| CallError::Malformed(e.to_string()))
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}
