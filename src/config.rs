//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub checkout: CheckoutConfig,
    #[serde(default)]
    pub run: RunConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Total attempts per call, first try included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

/// Think-time and idle polling
#[derive(Debug, Clone, Deserialize)]
pub struct PacingConfig {
    #[serde(default = "default_think_time_min_ms")]
    pub think_time_min_ms: u64,
    #[serde(default = "default_think_time_max_ms")]
    pub think_time_max_ms: u64,
    #[serde(default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,
}

impl PacingConfig {
    /// Pacing with every delay set to zero
    pub fn immediate() -> Self {
        Self {
            think_time_min_ms: 0,
            think_time_max_ms: 0,
            idle_poll_ms: 0,
        }
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }
}

/// Instrument exclusion policy applied on top of merchant allow-lists.
///
/// The gateway's product rules for which instrument families may take part
/// in which flows have changed over time, so they live here rather than in
/// the selector.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectionConfig {
    /// Instrument type tags treated as wallets
    #[serde(default = "default_wallet_types")]
    pub wallet_types: Vec<String>,
    #[serde(default = "default_true")]
    pub exclude_wallets_from_cit: bool,
    #[serde(default = "default_true")]
    pub exclude_wallets_from_refunds: bool,
    /// Card brands allowed in top-up flows (empty = any card)
    #[serde(default = "default_top_up_card_brands")]
    pub top_up_card_brands: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutConfig {
    /// Driver attempts when the instrument does not declare its own limit
    #[serde(default = "default_checkout_attempts")]
    pub default_max_attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Repeat passes until the process is stopped
    #[serde(default)]
    pub repeat: bool,
    #[serde(default = "default_merchants_path")]
    pub merchants_path: PathBuf,
    #[serde(default = "default_instruments_path")]
    pub instruments_path: PathBuf,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            think_time_min_ms: default_think_time_min_ms(),
            think_time_max_ms: default_think_time_max_ms(),
            idle_poll_ms: default_idle_poll_ms(),
        }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            wallet_types: default_wallet_types(),
            exclude_wallets_from_cit: true,
            exclude_wallets_from_refunds: true,
            top_up_card_brands: default_top_up_card_brands(),
        }
    }
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            default_max_attempts: default_checkout_attempts(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            repeat: false,
            merchants_path: default_merchants_path(),
            instruments_path: default_instruments_path(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.sandbox.datatrans.com/v1/transactions".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    6
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_think_time_min_ms() -> u64 {
    2000
}

fn default_think_time_max_ms() -> u64 {
    5000
}

fn default_idle_poll_ms() -> u64 {
    1000
}

fn default_wallet_types() -> Vec<String> {
    vec!["APL".to_string(), "GPA".to_string(), "SAM".to_string()]
}

fn default_top_up_card_brands() -> Vec<String> {
    vec!["VIS".to_string(), "ECA".to_string(), "AMX".to_string()]
}

fn default_checkout_attempts() -> u32 {
    1
}

fn default_merchants_path() -> PathBuf {
    PathBuf::from("config/merchants.json")
}

fn default_instruments_path() -> PathBuf {
    PathBuf::from("config/payment_methods.json")
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("gateway.base_url", default_base_url())?
            .set_default("gateway.timeout_ms", default_timeout_ms() as i64)?
            .set_default("gateway.max_attempts", default_max_attempts() as i64)?
            .set_default("gateway.retry_base_delay_ms", default_retry_base_delay_ms() as i64)?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables, e.g. FLOWGEN_GATEWAY__MAX_ATTEMPTS
            .add_source(
                config::Environment::with_prefix("FLOWGEN")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.gateway.base_url)
            .with_context(|| format!("Invalid gateway base_url: {}", self.gateway.base_url))?;

        if self.gateway.max_attempts == 0 {
            anyhow::bail!("gateway.max_attempts must be at least 1");
        }

        if self.pacing.think_time_min_ms > self.pacing.think_time_max_ms {
            anyhow::bail!(
                "pacing.think_time_min_ms ({}) exceeds think_time_max_ms ({})",
                self.pacing.think_time_min_ms,
                self.pacing.think_time_max_ms
            );
        }

        if self.checkout.default_max_attempts == 0 {
            anyhow::bail!("checkout.default_max_attempts must be at least 1");
        }

        if self.run.repeat {
            tracing::warn!("run.repeat is set - passes will repeat until the process is stopped");
        }

        Ok(())
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  Gateway:
    base_url: {}
    timeout: {}ms
    max_attempts: {}
    retry_base_delay: {}ms
  Pacing:
    think_time: {}-{}ms
    idle_poll: {}ms
  Selection:
    wallet_types: {:?}
    exclude_wallets_from_cit: {}
    exclude_wallets_from_refunds: {}
    top_up_card_brands: {:?}
  Checkout:
    default_max_attempts: {}
  Run:
    repeat: {}
    merchants: {}
    instruments: {}
"#,
            mask_url(&self.gateway.base_url),
            self.gateway.timeout_ms,
            self.gateway.max_attempts,
            self.gateway.retry_base_delay_ms,
            self.pacing.think_time_min_ms,
            self.pacing.think_time_max_ms,
            self.pacing.idle_poll_ms,
            self.selection.wallet_types,
            self.selection.exclude_wallets_from_cit,
            self.selection.exclude_wallets_from_refunds,
            self.selection.top_up_card_brands,
            self.checkout.default_max_attempts,
            self.run.repeat,
            self.run.merchants_path.display(),
            self.run.instruments_path.display(),
        )
    }
}

/// Mask URL for display (hide credentials in query params)
pub fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            pacing: PacingConfig::default(),
            selection: SelectionConfig::default(),
            checkout: CheckoutConfig::default(),
            run: RunConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.gateway.max_attempts, 6);
        assert_eq!(config.gateway.retry_base_delay(), Duration::from_secs(1));
        assert!(config.selection.exclude_wallets_from_cit);
        assert!(!config.run.repeat);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[gateway]
max_attempts = 3
retry_base_delay_ms = 250

[pacing]
think_time_min_ms = 10
think_time_max_ms = 20

[run]
repeat = false
merchants_path = "fixtures/merchants.json"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.gateway.max_attempts, 3);
        assert_eq!(config.gateway.retry_base_delay_ms, 250);
        assert_eq!(config.gateway.timeout_ms, 30_000);
        assert_eq!(config.pacing.think_time_max_ms, 20);
        assert_eq!(config.run.merchants_path, PathBuf::from("fixtures/merchants.json"));
        assert_eq!(config.run.instruments_path, default_instruments_path());
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[pacing]\nidle_poll_ms = 500").unwrap();

        std::env::set_var("FLOWGEN_PACING__IDLE_POLL_MS", "250");
        let loaded = Config::load(file.path());
        std::env::remove_var("FLOWGEN_PACING__IDLE_POLL_MS");

        let config = loaded.unwrap();
        assert_eq!(config.pacing.idle_poll_ms, 250);
        assert_eq!(config.pacing.think_time_min_ms, 2000);
    }

    #[test]
    fn test_validate_rejects_inverted_think_time() {
        let mut config = Config::default();
        config.pacing.think_time_min_ms = 10;
        config.pacing.think_time_max_ms = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = Config::default();
        config.gateway.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mask_url() {
        assert_eq!(
            mask_url("https://api.example.com?key=secret"),
            "https://api.example.com?***"
        );
        assert_eq!(mask_url("https://api.example.com"), "https://api.example.com");
    }
}
