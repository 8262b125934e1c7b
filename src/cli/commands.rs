//! CLI command implementations

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::checkout::UnavailableCheckoutDriver;
use crate::clock::SystemClock;
use crate::config::Config;
use crate::flow::FlowCategory;
use crate::gateway::ReqwestTransport;
use crate::runner::Runner;
use crate::scheduler::build_pool;
use crate::stats::ExecutionStatistics;

fn load_catalog(config: &Config) -> Result<Catalog> {
    Catalog::load(&config.run.merchants_path, &config.run.instruments_path).with_context(|| {
        format!(
            "Failed to load catalog from {} and {}",
            config.run.merchants_path.display(),
            config.run.instruments_path.display()
        )
    })
}

/// Generate transactions against the gateway
pub async fn run(config: &Config, repeat: bool) -> Result<()> {
    let catalog = load_catalog(config)?;
    let repeat = repeat || config.run.repeat;

    if catalog
        .merchants
        .iter()
        .any(|merchant| merchant.has_category(FlowCategory::Cit))
    {
        warn!("No checkout driver in this build - CIT flows will be recorded as failures");
    }

    info!("Gateway: {}", crate::config::mask_url(&config.gateway.base_url));
    info!(
        "Retry: {} attempts, {}ms base delay",
        config.gateway.max_attempts, config.gateway.retry_base_delay_ms
    );
    if repeat {
        info!("Repeat mode: passes run until the process is stopped");
    }

    let transport = ReqwestTransport::new(config.gateway.timeout()).context("Failed to build HTTP client")?;
    let runner = Runner::from_config(
        config,
        catalog,
        Arc::new(transport),
        Arc::new(UnavailableCheckoutDriver),
        Arc::new(SystemClock),
    );

    runner.run(repeat).await;
    Ok(())
}

/// Show the flow pool a pass would execute, without calling the gateway
pub fn plan(config: &Config) -> Result<()> {
    let catalog = load_catalog(config)?;
    let pool = build_pool(&catalog.merchants, &mut rand::thread_rng());
    let stats = ExecutionStatistics::from_pool(&pool);

    println!("\n=== FLOW PLAN ===\n");
    for (flow, counters) in stats.flows() {
        println!("  {}: {}", flow, counters.planned);
    }
    println!("\nTotal tasks: {}", stats.total_planned());

    println!("\n=== MERCHANT COOLDOWNS ===\n");
    for merchant in &catalog.merchants {
        println!(
            "  {}: CIT {}s, MIT {}s",
            merchant.id,
            merchant.cooldown(FlowCategory::Cit).as_secs(),
            merchant.cooldown(FlowCategory::Mit).as_secs()
        );
    }
    println!("\nPayment methods: {}", catalog.instruments.len());

    Ok(())
}

/// Show current configuration (gateway URL masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}
