//! Run orchestration
//!
//! One pass builds a fresh shuffled pool from the catalog, drains it through
//! the cooldown scheduler and returns the statistics for the report. Repeat
//! mode runs passes back to back until the process is stopped.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::catalog::{Catalog, MerchantConfiguration};
use crate::checkout::{CheckoutDriver, CheckoutSession};
use crate::clock::Clock;
use crate::config::Config;
use crate::flow::{FlowExecutor, InstrumentSelector};
use crate::gateway::{GatewayClient, HttpTransport, RetryPolicy, TransactionOperations};
use crate::scheduler::{build_pool, CooldownScheduler, FlowTask, TaskDispatcher};
use crate::stats::ExecutionStatistics;

/// Shortest wait between repeated passes that executed nothing
const IDLE_PASS_PAUSE: Duration = Duration::from_secs(1);

/// State owned by exactly one pass
pub struct RunContext<'a> {
    executor: &'a FlowExecutor,
    stats: ExecutionStatistics,
}

impl<'a> RunContext<'a> {
    pub fn new(executor: &'a FlowExecutor, stats: ExecutionStatistics) -> Self {
        Self { executor, stats }
    }

    pub fn into_statistics(self) -> ExecutionStatistics {
        self.stats
    }
}

#[async_trait]
impl TaskDispatcher for RunContext<'_> {
    async fn dispatch(&mut self, task: &FlowTask) {
        self.executor.execute(task, &mut self.stats).await;
    }
}

pub struct Runner {
    executor: FlowExecutor,
    merchants: Vec<Arc<MerchantConfiguration>>,
    clock: Arc<dyn Clock>,
    idle_poll: Duration,
}

impl Runner {
    pub fn new(
        executor: FlowExecutor,
        merchants: Vec<Arc<MerchantConfiguration>>,
        clock: Arc<dyn Clock>,
        idle_poll: Duration,
    ) -> Self {
        Self {
            executor,
            merchants,
            clock,
            idle_poll,
        }
    }

    /// Wire the engine from runtime settings and a loaded catalog
    pub fn from_config(
        config: &Config,
        catalog: Catalog,
        transport: Arc<dyn HttpTransport>,
        driver: Arc<dyn CheckoutDriver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let client = GatewayClient::new(
            transport,
            clock.clone(),
            config.gateway.base_url.clone(),
            RetryPolicy::from(&config.gateway),
        );
        let executor = FlowExecutor::new(
            Arc::new(TransactionOperations::new(client)),
            CheckoutSession::new(driver, config.checkout.default_max_attempts),
            InstrumentSelector::new(config.selection.clone()),
            catalog.instruments,
            clock.clone(),
            config.pacing.clone(),
        );

        Self::new(executor, catalog.merchants, clock, config.pacing.idle_poll())
    }

    /// Execute every planned task once
    pub async fn run_once(&self) -> ExecutionStatistics {
        let pool = {
            let mut rng = rand::thread_rng();
            build_pool(&self.merchants, &mut rng)
        };
        info!(
            "Flow pool built: {} tasks across {} merchant configurations",
            pool.len(),
            self.merchants.len()
        );

        let mut context = RunContext::new(&self.executor, ExecutionStatistics::from_pool(&pool));
        let mut scheduler = CooldownScheduler::new(pool, self.idle_poll);
        scheduler.run(self.clock.as_ref(), &mut context).await;

        context.into_statistics()
    }

    /// Run one pass, or keep running passes when `repeat` is set.
    ///
    /// Returns the statistics of the only pass; in repeat mode it never
    /// returns and each pass's report is logged as it completes.
    pub async fn run(&self, repeat: bool) -> ExecutionStatistics {
        let mut pass = 1u64;
        loop {
            info!("Starting pass {}", pass);
            let stats = self.run_once().await;
            info!("\n{}", stats);

            if !repeat {
                return stats;
            }
            self.rest_after(&stats).await;
            pass += 1;
        }
    }

    /// Back off before the next pass when this one executed no task
    async fn rest_after(&self, stats: &ExecutionStatistics) {
        if stats.total_executed() > 0 {
            return;
        }
        let pause = self.idle_poll.max(IDLE_PASS_PAUSE);
        warn!(
            "Pass executed no tasks ({} planned, {} skipped), waiting {:?} before the next pass",
            stats.total_planned(),
            stats.skipped(),
            pause
        );
        self.clock.sleep(pause).await;
    }
}
