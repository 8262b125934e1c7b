//! Flow identifiers
//!
//! A flow id is `{category}-{type}`, e.g. `MIT-authorizeCaptureRefund`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Who initiates the transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FlowCategory {
    /// Customer-initiated: payer completes a hosted checkout page
    #[serde(rename = "CIT")]
    Cit,
    /// Merchant-initiated: server-to-server authorization
    #[serde(rename = "MIT")]
    Mit,
}

impl FlowCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowCategory::Cit => "CIT",
            FlowCategory::Mit => "MIT",
        }
    }
}

impl fmt::Display for FlowCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "CIT" => Ok(FlowCategory::Cit),
            "MIT" => Ok(FlowCategory::Mit),
            other => Err(Error::Config(format!("Unknown flow category: {}", other))),
        }
    }
}

/// What happens to the transaction after initiation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlowType {
    Decline,
    AuthorizeNoCapture,
    AuthorizeAutoCapture,
    AuthorizeCancel,
    AuthorizeCapture,
    AuthorizeCaptureRefund,
    AuthorizeCapturePartialRefund,
    AuthorizeCaptureRefundPartial,
    AuthorizeAutoCaptureRefundMany,
    AuthorizeTopUp,
    AuthorizeTopUpCapture,
    AuthorizeTopUpCaptureRefund,
    AuthorizeTopUpManyCapture,
}

impl FlowType {
    pub const ALL: [FlowType; 13] = [
        FlowType::Decline,
        FlowType::AuthorizeNoCapture,
        FlowType::AuthorizeAutoCapture,
        FlowType::AuthorizeCancel,
        FlowType::AuthorizeCapture,
        FlowType::AuthorizeCaptureRefund,
        FlowType::AuthorizeCapturePartialRefund,
        FlowType::AuthorizeCaptureRefundPartial,
        FlowType::AuthorizeAutoCaptureRefundMany,
        FlowType::AuthorizeTopUp,
        FlowType::AuthorizeTopUpCapture,
        FlowType::AuthorizeTopUpCaptureRefund,
        FlowType::AuthorizeTopUpManyCapture,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowType::Decline => "decline",
            FlowType::AuthorizeNoCapture => "authorizeNoCapture",
            FlowType::AuthorizeAutoCapture => "authorizeAutoCapture",
            FlowType::AuthorizeCancel => "authorizeCancel",
            FlowType::AuthorizeCapture => "authorizeCapture",
            FlowType::AuthorizeCaptureRefund => "authorizeCaptureRefund",
            FlowType::AuthorizeCapturePartialRefund => "authorizeCapturePartialRefund",
            FlowType::AuthorizeCaptureRefundPartial => "authorizeCaptureRefundPartial",
            FlowType::AuthorizeAutoCaptureRefundMany => "authorizeAutoCaptureRefundMany",
            FlowType::AuthorizeTopUp => "authorizeTopUp",
            FlowType::AuthorizeTopUpCapture => "authorizeTopUpCapture",
            FlowType::AuthorizeTopUpCaptureRefund => "authorizeTopUpCaptureRefund",
            FlowType::AuthorizeTopUpManyCapture => "authorizeTopUpManyCapture",
        }
    }

    /// Initiation is expected to be rejected by the gateway
    pub fn is_decline(&self) -> bool {
        matches!(self, FlowType::Decline)
    }

    /// Capture happens at authorization time
    pub fn auto_settles(&self) -> bool {
        matches!(
            self,
            FlowType::AuthorizeAutoCapture | FlowType::AuthorizeAutoCaptureRefundMany
        )
    }

    /// The sequence contains at least one credit
    pub fn has_refund(&self) -> bool {
        matches!(
            self,
            FlowType::AuthorizeCaptureRefund
                | FlowType::AuthorizeCapturePartialRefund
                | FlowType::AuthorizeCaptureRefundPartial
                | FlowType::AuthorizeAutoCaptureRefundMany
                | FlowType::AuthorizeTopUpCaptureRefund
        )
    }

    /// The sequence contains at least one increase
    pub fn is_top_up(&self) -> bool {
        matches!(
            self,
            FlowType::AuthorizeTopUp
                | FlowType::AuthorizeTopUpCapture
                | FlowType::AuthorizeTopUpCaptureRefund
                | FlowType::AuthorizeTopUpManyCapture
        )
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        FlowType::ALL
            .iter()
            .find(|flow| flow.as_str() == s)
            .copied()
            .ok_or_else(|| Error::Config(format!("Unknown flow type: {}", s)))
    }
}

/// Fully-qualified flow identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowId {
    pub category: FlowCategory,
    pub flow_type: FlowType,
}

impl FlowId {
    pub fn new(category: FlowCategory, flow_type: FlowType) -> Self {
        Self {
            category,
            flow_type,
        }
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.category, self.flow_type)
    }
}

impl FromStr for FlowId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (category, flow_type) = s
            .split_once('-')
            .ok_or_else(|| Error::Config(format!("Malformed flow id: {}", s)))?;
        Ok(FlowId::new(category.parse()?, flow_type.parse()?))
    }
}
