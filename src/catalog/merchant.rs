//! Merchant configuration entries from merchants.json

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::flow::kind::{FlowCategory, FlowType};

/// Placeholder substituted with the reference number in URL templates
pub const REF_NO_PLACEHOLDER: &str = ":refNo";

/// One merchant setup to generate traffic for
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantConfiguration {
    /// Unique configuration id (several configurations may share credentials)
    pub id: String,

    #[serde(flatten)]
    pub credentials: Credentials,

    pub currencies: Vec<String>,

    pub amounts: AmountPolicy,

    /// Category -> flow type -> requested count
    pub transaction_flows: BTreeMap<FlowCategory, BTreeMap<FlowType, u32>>,

    #[serde(default)]
    pub allowed_methods: AllowedMethods,

    /// Minimum spacing between two tasks of this configuration, in seconds
    #[serde(default)]
    pub delay: Cooldown,

    pub reference_number: ReferencePolicy,

    /// Required when any CIT flow is configured
    #[serde(default)]
    pub urls: Option<UrlTemplates>,

    #[serde(default)]
    pub limits: FlowLimits,
}

impl MerchantConfiguration {
    pub fn cooldown(&self, category: FlowCategory) -> Duration {
        self.delay.for_category(category)
    }

    pub fn has_category(&self, category: FlowCategory) -> bool {
        self.transaction_flows
            .get(&category)
            .is_some_and(|flows| flows.values().any(|count| *count > 0))
    }

    pub fn has_flow(&self, predicate: impl Fn(FlowType) -> bool) -> bool {
        self.transaction_flows
            .values()
            .flat_map(|flows| flows.iter())
            .any(|(flow_type, count)| *count > 0 && predicate(*flow_type))
    }
}

/// Gateway merchant credentials
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub merchant_id: String,
    pub password: String,
}

impl Credentials {
    /// Basic authorization header value
    pub fn authorization_header(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.merchant_id, self.password));
        format!("Basic {}", token)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("merchant_id", &self.merchant_id)
            .field("password", &"***")
            .finish()
    }
}

/// How transaction amounts are drawn (minor currency units)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawAmounts")]
pub enum AmountPolicy {
    Specific(Vec<u64>),
    Range { min: u64, max: u64 },
}

impl AmountPolicy {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        match self {
            AmountPolicy::Specific(amounts) => amounts.choose(rng).copied().unwrap_or_default(),
            AmountPolicy::Range { min, max } => rng.gen_range(*min..=*max),
        }
    }
}

#[derive(Deserialize)]
struct RawAmounts {
    #[serde(default)]
    specific: Option<Vec<u64>>,
    #[serde(default)]
    range: Option<Vec<u64>>,
}

impl TryFrom<RawAmounts> for AmountPolicy {
    type Error = String;

    fn try_from(raw: RawAmounts) -> std::result::Result<Self, Self::Error> {
        if let Some(specific) = raw.specific.filter(|amounts| !amounts.is_empty()) {
            if specific.contains(&0) {
                return Err("amounts.specific must not contain 0".to_string());
            }
            return Ok(AmountPolicy::Specific(specific));
        }

        match raw.range.as_deref() {
            Some([min, max]) if *min >= 1 && min <= max => Ok(AmountPolicy::Range {
                min: *min,
                max: *max,
            }),
            Some(range) => Err(format!("Invalid amounts.range {:?}", range)),
            None => Err("Invalid or missing amounts configuration".to_string()),
        }
    }
}

/// Which instruments a merchant accepts
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AllowedMethods {
    #[serde(default)]
    pub cards: Option<MethodFilter>,
    #[serde(default)]
    pub apms: Option<MethodFilter>,
}

impl AllowedMethods {
    pub fn is_unrestricted(&self) -> bool {
        self.cards.is_none() && self.apms.is_none()
    }
}

/// `"all"` or an explicit list of brands / type tags
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawFilter")]
pub enum MethodFilter {
    All,
    Only(Vec<String>),
}

impl MethodFilter {
    pub fn allows(&self, code: &str) -> bool {
        match self {
            MethodFilter::All => true,
            MethodFilter::Only(codes) => codes.iter().any(|c| c.eq_ignore_ascii_case(code)),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFilter {
    Keyword(String),
    List(Vec<String>),
}

impl TryFrom<RawFilter> for MethodFilter {
    type Error = String;

    fn try_from(raw: RawFilter) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawFilter::Keyword(keyword) if keyword.eq_ignore_ascii_case("all") => Ok(MethodFilter::All),
            RawFilter::Keyword(keyword) => Err(format!(
                "Expected \"all\" or a list of method codes, got \"{}\"",
                keyword
            )),
            RawFilter::List(codes) => Ok(MethodFilter::Only(codes)),
        }
    }
}

/// Spacing between tasks, one value for every category or one per category
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Cooldown {
    Uniform(u64),
    PerCategory(BTreeMap<FlowCategory, u64>),
}

impl Default for Cooldown {
    fn default() -> Self {
        Cooldown::Uniform(0)
    }
}

impl Cooldown {
    pub fn for_category(&self, category: FlowCategory) -> Duration {
        let secs = match self {
            Cooldown::Uniform(secs) => *secs,
            Cooldown::PerCategory(map) => map.get(&category).copied().unwrap_or(0),
        };
        Duration::from_secs(secs)
    }
}

/// How reference numbers are produced
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReferencePolicy {
    /// Truncated uuid, length drawn from the candidate lengths
    Random {
        length: Vec<usize>,
        #[serde(default)]
        prefix: Option<String>,
    },
    Fixed { refno: String },
}

/// Redirect and webhook URL templates containing `:refNo`
#[derive(Debug, Clone, Deserialize)]
pub struct UrlTemplates {
    pub success: String,
    pub error: String,
    pub cancel: String,
    pub webhook: String,
}

impl UrlTemplates {
    pub fn redirects(&self, refno: &str) -> RedirectUrls {
        RedirectUrls {
            success_url: self.success.replace(REF_NO_PLACEHOLDER, refno),
            error_url: self.error.replace(REF_NO_PLACEHOLDER, refno),
            cancel_url: self.cancel.replace(REF_NO_PLACEHOLDER, refno),
        }
    }

    pub fn webhook(&self, refno: &str) -> String {
        self.webhook.replace(REF_NO_PLACEHOLDER, refno)
    }
}

/// Concrete redirect URLs for one transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectUrls {
    pub success_url: String,
    pub error_url: String,
    pub cancel_url: String,
}

/// Percentages driving derived amounts
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowLimits {
    /// Maximum top-up, percent of the authorized amount
    #[serde(default = "default_top_up_percent")]
    pub top_up: u64,
    /// Share used by partial capture / partial refund flows
    #[serde(default = "default_partial_percent")]
    pub partial_percent: u64,
}

impl Default for FlowLimits {
    fn default() -> Self {
        Self {
            top_up: default_top_up_percent(),
            partial_percent: default_partial_percent(),
        }
    }
}

fn default_top_up_percent() -> u64 {
    20
}

fn default_partial_percent() -> u64 {
    70
}
