//! JSON-RPC client

use log::trace;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use url::Url;

use crate::error::CallError;
use crate::http::{validate_endpoint, HttpClient};
use crate::message::{Request, Response};
use crate::retry::{retry_with_backoff, RetryPolicy};

/// JSON-RPC client bound to a single node endpoint
///
/// The endpoint is fixed at construction; pointing at a different node means
/// building a new client, so an in-flight call never switches endpoints.
#[derive(Debug)]
pub struct RpcClient {
    endpoint: Url,
    http: HttpClient,
    policy: RetryPolicy,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(endpoint: &str, timeout: Duration, policy: RetryPolicy) -> Result<Self, CallError> {
        Ok(Self {
            endpoint: validate_endpoint(endpoint)?,
            http: HttpClient::new(timeout),
            policy,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Call a method with the client's default retry budget
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, CallError> {
        self.call_with_retries(method, params, self.policy.retries)
            .await
    }

    /// Call a method, retrying transport failures up to `retries` times
    ///
    /// An `error` member in the response is returned straight away.
    pub async fn call_with_retries(
        &self,
        method: &str,
        params: Value,
        retries: u32,
    ) -> Result<Value, CallError> {
        let policy = RetryPolicy::new(retries, self.policy.base_delay);
        retry_with_backoff(&policy, method, || self.send_once(method, &params)).await
    }

    /// Call and deserialize the result
    pub async fn call_as<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<R, CallError> {
        let value = self.call(method, params).await?;
        serde_json::from_value(value).map_err(|e| CallError::Malformed(e.to_string()))
    }

    /// Try several method names in order until one is accepted
    ///
    /// Protocol errors move on to the next name; a transport error means the
    /// node is unreachable and ends the search. Returns the method that
    /// answered together with its result.
    pub async fn call_first(
        &self,
        methods: &[String],
        params: Value,
    ) -> Result<(String, Value), CallError> {
        let mut last_err = CallError::RpcError {
            code: crate::error::METHOD_NOT_FOUND,
            message: "no method names to try".to_string(),
        };
        for method in methods {
            match self.call(method, params.clone()).await {
                Ok(value) => return Ok((method.clone(), value)),
                Err(err) if err.is_retryable() => return Err(err),
                Err(err) => {
                    trace!("{} rejected by {}: {}", method, self.endpoint, err);
                    last_err = err;
                }
            }
        }
        Err(last_err)
    }

    async fn send_once(&self, method: &str, params: &Value) -> Result<Value, CallError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = Request::new(method, params, id);
        trace!("-> {} #{} {}", self.endpoint, id, method);
        let body = self.http.post_json(self.endpoint.clone(), &request).await?;
        Response::from_value(body)?.into_result()
    }
}
