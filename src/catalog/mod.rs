//! Merchant and instrument catalog
//!
//! Loaded once from JSON before a run starts. Anything structurally wrong
//! here is fatal; the flow engine assumes a validated catalog.

pub mod instrument;
pub mod merchant;

pub use instrument::{AmountRange, InstrumentKind, PaymentInstrument};
pub use merchant::{
    AllowedMethods, AmountPolicy, Cooldown, Credentials, FlowLimits, MerchantConfiguration,
    MethodFilter, RedirectUrls, ReferencePolicy, UrlTemplates,
};

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::error::{Error, Result};
use crate::flow::kind::FlowCategory;

/// Longest random reference number a uuid can provide
const MAX_RANDOM_REFNO_LEN: usize = 32;

/// merchants.json layout
#[derive(Debug, Deserialize)]
struct MerchantFile {
    configurations: Vec<MerchantConfiguration>,
}

/// Validated merchants and instruments shared by every task of a run
#[derive(Debug, Clone)]
pub struct Catalog {
    pub merchants: Vec<Arc<MerchantConfiguration>>,
    pub instruments: Arc<[PaymentInstrument]>,
}

impl Catalog {
    /// Load and validate both catalog files
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(merchants_path: P, instruments_path: Q) -> Result<Self> {
        let merchants_path = merchants_path.as_ref();
        let instruments_path = instruments_path.as_ref();

        let merchants = std::fs::read_to_string(merchants_path).map_err(|e| {
            Error::Catalog(format!("Cannot read {}: {}", merchants_path.display(), e))
        })?;
        let instruments = std::fs::read_to_string(instruments_path).map_err(|e| {
            Error::Catalog(format!("Cannot read {}: {}", instruments_path.display(), e))
        })?;

        let catalog = Self::from_json(&merchants, &instruments)?;
        info!(
            "Loaded {} merchant configurations and {} payment instruments",
            catalog.merchants.len(),
            catalog.instruments.len()
        );
        Ok(catalog)
    }

    /// Parse and validate catalog documents
    pub fn from_json(merchants: &str, instruments: &str) -> Result<Self> {
        let merchant_file: MerchantFile = serde_json::from_str(merchants)
            .map_err(|e| Error::Catalog(format!("Invalid merchant configuration: {}", e)))?;
        let instruments: Vec<PaymentInstrument> = serde_json::from_str(instruments)
            .map_err(|e| Error::Catalog(format!("Invalid payment methods: {}", e)))?;

        Self::new(merchant_file.configurations, instruments)
    }

    pub fn new(merchants: Vec<MerchantConfiguration>, instruments: Vec<PaymentInstrument>) -> Result<Self> {
        let mut ids = HashSet::new();
        for merchant in &merchants {
            if !ids.insert(merchant.id.as_str()) {
                return Err(Error::Catalog(format!(
                    "Duplicate configuration id: {}",
                    merchant.id
                )));
            }
            validate_merchant(merchant)?;
        }

        for instrument in &instruments {
            validate_instrument(instrument)?;
        }

        Ok(Self {
            merchants: merchants.into_iter().map(Arc::new).collect(),
            instruments: instruments.into(),
        })
    }
}

fn validate_merchant(merchant: &MerchantConfiguration) -> Result<()> {
    let fail = |reason: String| Error::Catalog(format!("Configuration {}: {}", merchant.id, reason));

    if merchant.credentials.merchant_id.is_empty() || merchant.credentials.password.is_empty() {
        return Err(fail("merchantId and password are required".to_string()));
    }

    if merchant.currencies.is_empty() {
        return Err(fail("at least one currency is required".to_string()));
    }

    match &merchant.reference_number {
        ReferencePolicy::Random { length, .. } => {
            if length.is_empty() || length.iter().any(|l| *l == 0 || *l > MAX_RANDOM_REFNO_LEN) {
                return Err(fail(format!(
                    "referenceNumber.length must list lengths between 1 and {}",
                    MAX_RANDOM_REFNO_LEN
                )));
            }
        }
        ReferencePolicy::Fixed { refno } => {
            if refno.is_empty() {
                return Err(fail("referenceNumber.refno must not be empty".to_string()));
            }
        }
    }

    if merchant.has_category(FlowCategory::Cit) {
        let urls = merchant
            .urls
            .as_ref()
            .ok_or_else(|| fail("urls are required for CIT flows".to_string()))?;
        for template in [&urls.success, &urls.error, &urls.cancel, &urls.webhook] {
            let sample = template.replace(merchant::REF_NO_PLACEHOLDER, "ref");
            url::Url::parse(&sample).map_err(|e| fail(format!("invalid URL {}: {}", template, e)))?;
        }
    }

    if merchant.limits.partial_percent == 0 || merchant.limits.partial_percent > 100 {
        return Err(fail("limits.partialPercent must be between 1 and 100".to_string()));
    }

    if merchant.has_flow(|flow| flow.is_top_up()) && merchant.limits.top_up == 0 {
        return Err(fail("limits.topUp must be positive for top-up flows".to_string()));
    }

    Ok(())
}

fn validate_instrument(instrument: &PaymentInstrument) -> Result<()> {
    if instrument.alias.is_empty() {
        return Err(Error::Catalog(format!(
            "Payment method of type {} has no alias",
            instrument.kind
        )));
    }

    if instrument.kind.is_card() && instrument.payment_method.is_none() {
        return Err(Error::Catalog(format!(
            "Card {} has no paymentMethod brand",
            instrument.alias
        )));
    }

    if instrument.max_attempts == Some(0) {
        return Err(Error::Catalog(format!(
            "Payment method {} has maxAttempts 0",
            instrument.alias
        )));
    }

    Ok(())
}
