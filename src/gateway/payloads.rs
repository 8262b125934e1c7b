//! Typed request and response bodies
//!
//! One builder per request kind; every field the gateway sees is spelled
//! out here rather than merged from loose JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::catalog::{PaymentInstrument, RedirectUrls};
use crate::flow::kind::FlowType;

/// Fields of the initialize request that instrument payloads may not override
const RESERVED_INIT_FIELDS: [&str; 7] = [
    "currency",
    "refno",
    "amount",
    "paymentMethods",
    "redirect",
    "webhook",
    "autoSettle",
];

/// Saved-instrument reference inside an authorize request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentReference {
    pub alias: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_month: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Map<String, Value>>,
}

/// `POST /authorize` (MIT)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeRequest {
    pub refno: String,
    pub amount: u64,
    pub currency: String,
    pub auto_settle: bool,
    /// Keyed by instrument type tag (`card`, `PAP`, ...)
    #[serde(flatten)]
    pub instrument: BTreeMap<String, InstrumentReference>,
}

impl AuthorizeRequest {
    pub fn new(
        refno: &str,
        amount: u64,
        currency: &str,
        instrument: &PaymentInstrument,
        flow_type: FlowType,
    ) -> Self {
        let is_card = instrument.kind.is_card();
        let reference = InstrumentReference {
            alias: instrument.alias.clone(),
            expiry_month: instrument.expiry_month.clone().filter(|_| is_card),
            expiry_year: instrument.expiry_year.clone().filter(|_| is_card),
            payload: instrument.payload.clone(),
        };

        Self {
            refno: refno.to_string(),
            amount,
            currency: currency.to_string(),
            auto_settle: flow_type.auto_settles() && is_card,
            instrument: BTreeMap::from([(instrument.kind.tag().to_string(), reference)]),
        }
    }
}

/// `POST /` (CIT initialize)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    pub currency: String,
    pub refno: String,
    pub amount: u64,
    pub payment_methods: Vec<String>,
    pub redirect: RedirectUrls,
    pub webhook: String,
    pub auto_settle: bool,
    /// Method-specific fields from the instrument payload
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InitializeRequest {
    pub fn new(
        refno: &str,
        amount: u64,
        currency: &str,
        instrument: &PaymentInstrument,
        flow_type: FlowType,
        redirect: RedirectUrls,
        webhook: String,
    ) -> Self {
        let mut extra = instrument.payload.clone().unwrap_or_default();
        for field in RESERVED_INIT_FIELDS {
            extra.remove(field);
        }
        price_order_articles(&mut extra, amount);

        Self {
            currency: currency.to_string(),
            refno: refno.to_string(),
            amount,
            payment_methods: vec![instrument.method_code().to_string()],
            redirect,
            webhook,
            auto_settle: flow_type.auto_settles(),
            extra,
        }
    }
}

/// Invoice-style methods need each order article priced at the amount
fn price_order_articles(extra: &mut Map<String, Value>, amount: u64) {
    if let Some(articles) = extra
        .get_mut("order")
        .and_then(|order| order.get_mut("articles"))
        .and_then(Value::as_array_mut)
    {
        for article in articles.iter_mut().filter_map(Value::as_object_mut) {
            article.insert("price".to_string(), Value::from(amount));
        }
    }
}

/// Settle, credit and increase bodies
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmountRequest {
    pub amount: u64,
    pub currency: String,
    pub refno: String,
}

impl AmountRequest {
    pub fn new(amount: u64, currency: &str, refno: &str) -> Self {
        Self {
            amount,
            currency: currency.to_string(),
            refno: refno.to_string(),
        }
    }
}

/// Cancel takes an empty object
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CancelRequest {}

/// Transaction-bearing response (authorize, initialize, declines)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    #[serde(default)]
    pub transaction_id: Option<String>,
}

impl TransactionResponse {
    pub fn from_body(body: &Value) -> Self {
        serde_json::from_value(body.clone()).unwrap_or_default()
    }
}
