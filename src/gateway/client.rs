//! Retrying gateway client
//!
//! Every call is retried with exponential backoff until it succeeds, returns
//! one of the caller's allowed statuses, or runs out of attempts. An allowed
//! status (400 on authorize) is a result, not an error: the caller decides
//! what the payload means.

use backoff::backoff::Backoff;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::catalog::Credentials;
use crate::clock::Clock;
use crate::config::GatewayConfig;
use crate::error::{Error, Result};

/// Gateway transaction endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Start a CIT transaction and obtain a checkout URL
    Initialize,
    /// Server-to-server authorization
    Authorize,
    Settle(String),
    Cancel(String),
    Credit(String),
    Increase(String),
}

impl Endpoint {
    /// Path below the transactions base URL
    pub fn path(&self) -> String {
        match self {
            Endpoint::Initialize => String::new(),
            Endpoint::Authorize => "authorize".to_string(),
            Endpoint::Settle(id) => format!("{}/settle", id),
            Endpoint::Cancel(id) => format!("{}/cancel", id),
            Endpoint::Credit(id) => format!("{}/credit", id),
            Endpoint::Increase(id) => format!("{}/increase", id),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Initialize => f.write_str("init"),
            other => f.write_str(&other.path()),
        }
    }
}

/// Attempt budget and first backoff delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn backoff(&self) -> DoublingBackoff {
        DoublingBackoff::new(self.base_delay, self.max_attempts.saturating_sub(1))
    }
}

impl From<&GatewayConfig> for RetryPolicy {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.retry_base_delay(),
        }
    }
}

/// Deterministic exponential backoff: `base`, `2 * base`, `4 * base`, ...
/// for at most `max_retries` delays.
#[derive(Debug, Clone)]
pub struct DoublingBackoff {
    base: Duration,
    max_retries: u32,
    current: Duration,
    retries: u32,
}

impl DoublingBackoff {
    pub fn new(base: Duration, max_retries: u32) -> Self {
        Self {
            base,
            max_retries,
            current: base,
            retries: 0,
        }
    }
}

impl Backoff for DoublingBackoff {
    fn reset(&mut self) {
        self.current = self.base;
        self.retries = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        if self.retries >= self.max_retries {
            return None;
        }
        let delay = self.current;
        self.current = self.current.saturating_mul(2);
        self.retries += 1;
        Some(delay)
    }
}

/// Response accepted by the client (2xx or an allowed status)
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: Value,
    pub location: Option<String>,
}

/// Gateway client shared by every task of a run
pub struct GatewayClient {
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
    base_url: String,
    policy: RetryPolicy,
}

impl GatewayClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
        base_url: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            transport,
            clock,
            base_url,
            policy,
        }
    }

    fn url(&self, endpoint: &Endpoint) -> String {
        let path = endpoint.path();
        if path.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Call an endpoint, retrying until success, an allowed status, or
    /// exhaustion of the attempt budget (the last failure is returned).
    pub async fn call<P: Serialize + ?Sized>(
        &self,
        credentials: &Credentials,
        endpoint: &Endpoint,
        payload: &P,
        method: Method,
        allowed_statuses: &[u16],
        correlation_id: &str,
    ) -> Result<GatewayResponse> {
        let request = HttpRequest {
            method,
            url: self.url(endpoint),
            authorization: credentials.authorization_header(),
            body: serde_json::to_value(payload)?,
        };
        let verb = request.method.as_str().to_uppercase();

        let mut backoff = self.policy.backoff();
        let mut attempt = 1u32;

        loop {
            let failure = match self.transport.send(request.clone()).await {
                Ok(response) if response.is_success() && response.body.is_string() => {
                    Error::Deserialization(format!("HTTP {} body is not JSON", response.status))
                }
                Ok(response) if response.is_success() || allowed_statuses.contains(&response.status) => {
                    info!(
                        "[{}] API {} {} success (HTTP {})",
                        correlation_id, verb, endpoint, response.status
                    );
                    return Ok(GatewayResponse {
                        status: response.status,
                        body: response.body,
                        location: response.location,
                    });
                }
                Ok(response) => status_error(response),
                Err(e) => e,
            };

            if !failure.is_retryable() {
                error!("[{}] API {} {} failed: {}", correlation_id, verb, endpoint, failure);
                return Err(failure);
            }

            match backoff.next_backoff() {
                Some(delay) => {
                    warn!(
                        "[{}] API {} {} failed (attempt {}/{}), retrying in {}ms: {}",
                        correlation_id,
                        verb,
                        endpoint,
                        attempt,
                        self.policy.max_attempts,
                        delay.as_millis(),
                        failure
                    );
                    self.clock.sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    error!(
                        "[{}] API {} {} failed after {} attempts: {}",
                        correlation_id, verb, endpoint, attempt, failure
                    );
                    return Err(failure);
                }
            }
        }
    }
}

/// Turn a rejected response into an error, keeping the gateway's message
fn status_error(response: HttpResponse) -> Error {
    let message = error_message(&response.body).unwrap_or_else(|| format!("HTTP {}", response.status));
    let transaction_id = response
        .body
        .get("transactionId")
        .and_then(Value::as_str)
        .map(str::to_string);

    Error::Status {
        status: response.status,
        message,
        transaction_id,
    }
}

/// Gateway error text: `error.message`, `message`, or a plain-text body
pub fn error_message(body: &Value) -> Option<String> {
    body.pointer("/error/message")
        .or_else(|| body.get("message"))
        .or_else(|| body.pointer("/error/code"))
        .and_then(Value::as_str)
        .or_else(|| body.as_str())
        .map(str::to_string)
}
