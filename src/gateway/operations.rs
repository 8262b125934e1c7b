//! Transaction operations on top of the retrying client

use reqwest::Method;
use tracing::info;

use super::client::{error_message, Endpoint, GatewayClient};
use super::payloads::{AmountRequest, AuthorizeRequest, CancelRequest, InitializeRequest, TransactionResponse};
use crate::catalog::Credentials;
use crate::error::{Error, Result};

/// Status the gateway uses on authorize to report a decline
pub const DECLINE_STATUS: u16 = 400;

/// Result of a server-to-server authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizeOutcome {
    Authorized { transaction_id: String },
    Declined {
        transaction_id: Option<String>,
        message: String,
    },
}

/// Initialized CIT transaction waiting for checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializedTransaction {
    pub transaction_id: String,
    pub checkout_url: String,
}

/// Gateway transaction API
pub struct TransactionOperations {
    client: GatewayClient,
}

impl TransactionOperations {
    pub fn new(client: GatewayClient) -> Self {
        Self { client }
    }

    /// Authorize; a 400 comes back as [`AuthorizeOutcome::Declined`]
    pub async fn authorize(
        &self,
        credentials: &Credentials,
        request: &AuthorizeRequest,
        correlation_id: &str,
    ) -> Result<AuthorizeOutcome> {
        let response = self
            .client
            .call(
                credentials,
                &Endpoint::Authorize,
                request,
                Method::POST,
                &[DECLINE_STATUS],
                correlation_id,
            )
            .await?;

        let transaction_id = TransactionResponse::from_body(&response.body).transaction_id;

        if response.status == DECLINE_STATUS {
            let message = error_message(&response.body).unwrap_or_else(|| "declined".to_string());
            info!(
                "[{}] Authorization declined: {} ({})",
                correlation_id,
                transaction_id.as_deref().unwrap_or("N/A"),
                message
            );
            return Ok(AuthorizeOutcome::Declined {
                transaction_id,
                message,
            });
        }

        let transaction_id =
            transaction_id.ok_or_else(|| Error::MissingTransactionId("authorize".to_string()))?;
        info!("[{}] Authorization successful: {}", correlation_id, transaction_id);
        Ok(AuthorizeOutcome::Authorized { transaction_id })
    }

    /// Initialize a CIT transaction and return its checkout URL
    pub async fn initialize(
        &self,
        credentials: &Credentials,
        request: &InitializeRequest,
        correlation_id: &str,
    ) -> Result<InitializedTransaction> {
        let response = self
            .client
            .call(
                credentials,
                &Endpoint::Initialize,
                request,
                Method::POST,
                &[],
                correlation_id,
            )
            .await?;

        let transaction_id = TransactionResponse::from_body(&response.body)
            .transaction_id
            .ok_or_else(|| Error::MissingTransactionId("initialize".to_string()))?;
        let checkout_url = response
            .location
            .ok_or_else(|| Error::MissingCheckoutUrl(transaction_id.clone()))?;

        info!("[{}] CIT init successful: {}", correlation_id, transaction_id);
        Ok(InitializedTransaction {
            transaction_id,
            checkout_url,
        })
    }

    /// Capture (part of) the authorized amount
    pub async fn settle(
        &self,
        credentials: &Credentials,
        transaction_id: &str,
        request: &AmountRequest,
        correlation_id: &str,
    ) -> Result<()> {
        self.amount_call(credentials, Endpoint::Settle(transaction_id.to_string()), request, correlation_id)
            .await
    }

    /// Refund (part of) the captured amount
    pub async fn credit(
        &self,
        credentials: &Credentials,
        transaction_id: &str,
        request: &AmountRequest,
        correlation_id: &str,
    ) -> Result<()> {
        self.amount_call(credentials, Endpoint::Credit(transaction_id.to_string()), request, correlation_id)
            .await
    }

    /// Raise the authorized amount by `request.amount`
    pub async fn increase(
        &self,
        credentials: &Credentials,
        transaction_id: &str,
        request: &AmountRequest,
        correlation_id: &str,
    ) -> Result<()> {
        self.amount_call(credentials, Endpoint::Increase(transaction_id.to_string()), request, correlation_id)
            .await
    }

    /// Release the authorization
    pub async fn cancel(&self, credentials: &Credentials, transaction_id: &str, correlation_id: &str) -> Result<()> {
        self.client
            .call(
                credentials,
                &Endpoint::Cancel(transaction_id.to_string()),
                &CancelRequest::default(),
                Method::POST,
                &[],
                correlation_id,
            )
            .await?;
        Ok(())
    }

    async fn amount_call(
        &self,
        credentials: &Credentials,
        endpoint: Endpoint,
        request: &AmountRequest,
        correlation_id: &str,
    ) -> Result<()> {
        self.client
            .call(credentials, &endpoint, request, Method::POST, &[], correlation_id)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures;
    use crate::clock::testing::ManualClock;
    use crate::flow::kind::FlowType;
    use crate::gateway::client::RetryPolicy;
    use crate::gateway::transport::testing::ScriptedTransport;
    use crate::gateway::transport::HttpResponse;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    const BASE: &str = "https://gateway.test/v1/transactions";

    fn operations(transport: &Arc<ScriptedTransport>) -> TransactionOperations {
        TransactionOperations::new(GatewayClient::new(
            transport.clone(),
            Arc::new(ManualClock::new()),
            BASE,
            RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(10),
            },
        ))
    }

    fn authorize_request() -> AuthorizeRequest {
        AuthorizeRequest::new(
            "r1",
            1000,
            "CHF",
            &fixtures::card("visa", "VIS"),
            FlowType::Decline,
        )
    }

    #[tokio::test]
    async fn test_authorize_decline_is_an_outcome() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(
            400,
            json!({ "transactionId": "d1", "error": { "code": "DECLINED", "message": "card declined" } }),
        );
        let merchant = fixtures::merchant("m", &[]);

        let outcome = operations(&transport)
            .authorize(&merchant.credentials, &authorize_request(), "cid")
            .await
            .unwrap();

        assert_eq!(
            outcome,
            AuthorizeOutcome::Declined {
                transaction_id: Some("d1".to_string()),
                message: "card declined".to_string()
            }
        );
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_authorize_success_requires_transaction_id() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(200, json!({ "acquirerAuthorizationCode": "x" }));
        let merchant = fixtures::merchant("m", &[]);

        let result = operations(&transport)
            .authorize(&merchant.credentials, &authorize_request(), "cid")
            .await;

        assert!(matches!(result, Err(Error::MissingTransactionId(_))));
    }

    #[tokio::test]
    async fn test_initialize_reads_location() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_response(HttpResponse {
            status: 201,
            body: json!({ "transactionId": "c1" }),
            location: Some("https://pay.sandbox.example/v1/start/c1".to_string()),
        });
        transport.push(201, json!({ "transactionId": "c2" }));
        let merchant = fixtures::merchant("m", &[]);
        let card = fixtures::card("visa", "VIS");
        let request = InitializeRequest::new(
            "r1",
            100,
            "CHF",
            &card,
            FlowType::AuthorizeCapture,
            merchant.urls.as_ref().unwrap().redirects("r1"),
            "https://shop.example/webhook/r1".to_string(),
        );
        let ops = operations(&transport);

        let initialized = ops.initialize(&merchant.credentials, &request, "cid").await.unwrap();
        assert_eq!(initialized.transaction_id, "c1");
        assert_eq!(initialized.checkout_url, "https://pay.sandbox.example/v1/start/c1");

        let missing = ops.initialize(&merchant.credentials, &request, "cid").await;
        assert!(matches!(missing, Err(Error::MissingCheckoutUrl(ref id)) if id == "c2"));
    }

    #[tokio::test]
    async fn test_dependent_operations_route_to_endpoints() {
        let transport = Arc::new(ScriptedTransport::new());
        let merchant = fixtures::merchant("m", &[]);
        let ops = operations(&transport);
        let body = AmountRequest::new(700, "CHF", "r1-ref");
        let credentials = &merchant.credentials;

        ops.settle(credentials, "t9", &body, "cid").await.unwrap();
        ops.credit(credentials, "t9", &body, "cid").await.unwrap();
        ops.increase(credentials, "t9", &body, "cid").await.unwrap();
        ops.cancel(credentials, "t9", "cid").await.unwrap();

        assert_eq!(
            transport.paths(BASE),
            vec!["t9/settle", "t9/credit", "t9/increase", "t9/cancel"]
        );
        let requests = transport.requests();
        assert_eq!(requests[0].body, json!({ "amount": 700, "currency": "CHF", "refno": "r1-ref" }));
        assert_eq!(requests[3].body, json!({}));
    }
}
