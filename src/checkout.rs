//! Interactive checkout completion
//!
//! CIT transactions are finished on the gateway's hosted payment page. The
//! page automation itself lives behind [`CheckoutDriver`]; this module only
//! bounds the attempts and checks where the payer ended up.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::catalog::{PaymentInstrument, RedirectUrls};
use crate::error::{Error, Result};
use crate::flow::kind::FlowType;

/// Everything a driver needs to complete one hosted checkout
#[derive(Debug, Clone, Copy)]
pub struct CheckoutRequest<'a> {
    pub checkout_url: &'a str,
    pub instrument: &'a PaymentInstrument,
    pub flow_type: FlowType,
    pub correlation_id: &'a str,
    pub redirects: &'a RedirectUrls,
    /// One-time code to enter if a step-up challenge appears
    pub challenge_code: Option<&'a str>,
}

/// Completes a hosted checkout and returns the final URL the browser landed on
#[async_trait]
pub trait CheckoutDriver: Send + Sync {
    async fn complete(&self, request: &CheckoutRequest<'_>) -> Result<String>;
}

/// Driver for builds without page automation; every CIT task fails
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableCheckoutDriver;

#[async_trait]
impl CheckoutDriver for UnavailableCheckoutDriver {
    async fn complete(&self, request: &CheckoutRequest<'_>) -> Result<String> {
        Err(Error::Checkout(format!(
            "no checkout driver available to complete {}",
            request.checkout_url
        )))
    }
}

/// Which merchant redirect the checkout ended on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectOutcome {
    Success,
    Error,
    Cancel,
}

impl RedirectOutcome {
    /// Match the final URL against the query-less redirect URLs
    pub fn classify(final_url: &str, redirects: &RedirectUrls) -> Option<Self> {
        [
            (RedirectOutcome::Success, &redirects.success_url),
            (RedirectOutcome::Error, &redirects.error_url),
            (RedirectOutcome::Cancel, &redirects.cancel_url),
        ]
        .into_iter()
        .find(|(_, pattern)| final_url.contains(without_query(pattern)))
        .map(|(outcome, _)| outcome)
    }

    /// Whether a flow of this type is supposed to end here
    pub fn is_expected_for(self, flow_type: FlowType) -> bool {
        if flow_type.is_decline() {
            self != RedirectOutcome::Success
        } else {
            self == RedirectOutcome::Success
        }
    }
}

impl fmt::Display for RedirectOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedirectOutcome::Success => write!(f, "success"),
            RedirectOutcome::Error => write!(f, "error"),
            RedirectOutcome::Cancel => write!(f, "cancel"),
        }
    }
}

fn without_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}

/// Bounded-attempt wrapper around a [`CheckoutDriver`]
pub struct CheckoutSession {
    driver: Arc<dyn CheckoutDriver>,
    default_max_attempts: u32,
}

impl CheckoutSession {
    pub fn new(driver: Arc<dyn CheckoutDriver>, default_max_attempts: u32) -> Self {
        Self {
            driver,
            default_max_attempts,
        }
    }

    /// Drive the checkout until it lands on a known redirect.
    ///
    /// Driver failures and unknown final URLs are retried up to the
    /// instrument's `maxAttempts`. Landing on a known redirect that the flow
    /// should not reach fails immediately.
    pub async fn complete(&self, request: &CheckoutRequest<'_>) -> Result<RedirectOutcome> {
        let attempts = request
            .instrument
            .max_attempts
            .unwrap_or(self.default_max_attempts)
            .max(1);
        let cid = request.correlation_id;

        let mut last_error = None;
        for attempt in 1..=attempts {
            let result = self.driver.complete(request).await.and_then(|final_url| {
                RedirectOutcome::classify(&final_url, request.redirects)
                    .ok_or(Error::RedirectMismatch { url: final_url })
            });

            match result {
                Ok(outcome) if outcome.is_expected_for(request.flow_type) => {
                    info!("[{}] Payment completed on {} redirect", cid, outcome);
                    return Ok(outcome);
                }
                Ok(outcome) => {
                    return Err(Error::Checkout(format!(
                        "{} flow ended on {} redirect",
                        request.flow_type, outcome
                    )));
                }
                Err(e) => {
                    warn!("[{}] Checkout attempt {}/{} failed: {}", cid, attempt, attempts, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Checkout("no checkout attempt made".to_string())))
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Driver that lands on the success redirect unless told otherwise
    pub struct ScriptedDriver {
        results: Mutex<VecDeque<Result<String>>>,
        calls: Mutex<Vec<(String, Option<String>)>>,
    }

    impl ScriptedDriver {
        pub fn new() -> Self {
            Self {
                results: Mutex::new(VecDeque::new()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn push(&self, result: Result<String>) -> &Self {
            self.results.lock().unwrap().push_back(result);
            self
        }

        /// `(checkout_url, challenge_code)` per call
        pub fn calls(&self) -> Vec<(String, Option<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CheckoutDriver for ScriptedDriver {
        async fn complete(&self, request: &CheckoutRequest<'_>) -> Result<String> {
            self.calls.lock().unwrap().push((
                request.checkout_url.to_string(),
                request.challenge_code.map(str::to_string),
            ));
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(format!("{}?datatransTrxId=1", request.redirects.success_url)))
        }
    }
}
