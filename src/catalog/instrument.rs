//! Payment instruments from payment_methods.json

use rand::Rng;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

use crate::flow::kind::FlowType;

/// Card or an alternative payment method tag (`PAP`, `KLN`, `TWI`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum InstrumentKind {
    Card,
    Alternative(String),
}

impl From<String> for InstrumentKind {
    fn from(tag: String) -> Self {
        if tag.eq_ignore_ascii_case("card") {
            InstrumentKind::Card
        } else {
            InstrumentKind::Alternative(tag)
        }
    }
}

impl InstrumentKind {
    /// Tag used as the instrument key in authorize payloads
    pub fn tag(&self) -> &str {
        match self {
            InstrumentKind::Card => "card",
            InstrumentKind::Alternative(tag) => tag,
        }
    }

    pub fn is_card(&self) -> bool {
        matches!(self, InstrumentKind::Card)
    }
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Inclusive `[min, max]` amount range in minor units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Vec<u64>")]
pub struct AmountRange {
    pub min: u64,
    pub max: u64,
}

impl AmountRange {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        rng.gen_range(self.min..=self.max)
    }
}

impl TryFrom<Vec<u64>> for AmountRange {
    type Error = String;

    fn try_from(bounds: Vec<u64>) -> std::result::Result<Self, Self::Error> {
        match bounds.as_slice() {
            [min, max] if *min >= 1 && min <= max => Ok(AmountRange {
                min: *min,
                max: *max,
            }),
            other => Err(format!("Invalid amount range {:?}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AmountRanges {
    /// Amounts the acquirer simulator approves
    #[serde(default)]
    pub success: Option<AmountRange>,
    /// Amounts the acquirer simulator declines
    #[serde(default)]
    pub decline: Option<AmountRange>,
}

/// One-time codes for the 3DS challenge page
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeCredentials {
    pub success_code: String,
    pub error_code: String,
}

impl fmt::Debug for ChallengeCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChallengeCredentials(***)")
    }
}

/// A saved test instrument; read-only for the whole run
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInstrument {
    #[serde(rename = "type")]
    pub kind: InstrumentKind,

    pub alias: String,

    /// Card brand code (`VIS`, `ECA`, ...); cards only
    #[serde(default)]
    pub payment_method: Option<String>,

    #[serde(default)]
    pub expiry_month: Option<String>,

    #[serde(default)]
    pub expiry_year: Option<String>,

    /// Plain card number for the checkout page
    #[serde(default)]
    pub number: Option<String>,

    #[serde(default)]
    pub cvv: Option<String>,

    /// Supported currencies (absent = all)
    #[serde(default)]
    pub currencies: Option<Vec<String>>,

    #[serde(default)]
    pub ranges: AmountRanges,

    #[serde(default, rename = "3DS")]
    pub challenge: Option<ChallengeCredentials>,

    /// Checkout driver attempts for this instrument
    #[serde(default)]
    pub max_attempts: Option<u32>,

    /// Method-specific request fields merged into payloads
    #[serde(default)]
    pub payload: Option<Map<String, Value>>,

    /// Wallet login used by the checkout driver
    #[serde(default)]
    pub account: Option<Value>,
}

impl PaymentInstrument {
    pub fn supports_currency(&self, currency: &str) -> bool {
        self.currencies
            .as_ref()
            .map_or(true, |currencies| currencies.iter().any(|c| c == currency))
    }

    /// Brand for cards, type tag otherwise
    pub fn method_code(&self) -> &str {
        match &self.kind {
            InstrumentKind::Card => self.payment_method.as_deref().unwrap_or("card"),
            InstrumentKind::Alternative(tag) => tag,
        }
    }

    /// Challenge code matching the expected outcome of the flow
    pub fn challenge_code(&self, flow_type: FlowType) -> Option<&str> {
        self.challenge.as_ref().map(|challenge| {
            if flow_type.is_decline() {
                challenge.error_code.as_str()
            } else {
                challenge.success_code.as_str()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visa() -> PaymentInstrument {
        serde_json::from_str(
            r#"{
                "type": "card",
                "alias": "AAABcH0Bq92s3kgAESIAAbGj5NIsAHWC",
                "paymentMethod": "VIS",
                "expiryMonth": "06",
                "expiryYear": "30",
                "currencies": ["CHF", "EUR"],
                "ranges": { "success": [100, 9000], "decline": [9001, 9999] },
                "3DS": { "successCode": "4000", "errorCode": "4001" },
                "maxAttempts": 2
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_deserialize_card() {
        let card = visa();
        assert!(card.kind.is_card());
        assert_eq!(card.method_code(), "VIS");
        assert_eq!(card.ranges.decline, Some(AmountRange { min: 9001, max: 9999 }));
        assert_eq!(card.max_attempts, Some(2));
        assert!(card.supports_currency("CHF"));
        assert!(!card.supports_currency("USD"));
    }

    #[test]
    fn test_alternative_method() {
        let paypal: PaymentInstrument = serde_json::from_str(
            r#"{ "type": "PAP", "alias": "pap-alias", "payload": { "PAP": { "orderId": "x" } } }"#,
        )
        .unwrap();
        assert_eq!(paypal.kind, InstrumentKind::Alternative("PAP".to_string()));
        assert_eq!(paypal.method_code(), "PAP");
        assert!(paypal.supports_currency("USD"));
        assert!(paypal.payload.is_some());
    }

    #[test]
    fn test_challenge_code_follows_flow() {
        let card = visa();
        assert_eq!(card.challenge_code(FlowType::Decline), Some("4001"));
        assert_eq!(card.challenge_code(FlowType::AuthorizeCapture), Some("4000"));
        assert!(!format!("{:?}", card).contains("4001"));
    }

    #[test]
    fn test_range_validation() {
        assert!(serde_json::from_str::<AmountRange>("[10, 5]").is_err());
        assert!(serde_json::from_str::<AmountRange>("[0, 5]").is_err());
        assert!(serde_json::from_str::<AmountRange>("[1, 2, 3]").is_err());
        let range: AmountRange = serde_json::from_str("[3, 3]").unwrap();
        assert_eq!(range, AmountRange { min: 3, max: 3 });
    }
}
