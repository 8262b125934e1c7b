//! Flow executor
//!
//! Runs one task end to end: pick currency, instrument, amount and
//! reference, initiate (MIT authorize or CIT initialize + checkout), then the
//! planned dependent steps. Every failure is caught here and recorded; the
//! scheduler never sees an error.

use chrono::{SecondsFormat, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::plan::{self, Step};
use super::reference;
use super::selector::{select_amount, InstrumentSelector};
use crate::catalog::{MerchantConfiguration, PaymentInstrument};
use crate::checkout::{CheckoutRequest, CheckoutSession, RedirectOutcome};
use crate::clock::Clock;
use crate::config::PacingConfig;
use crate::error::{Error, Result};
use crate::gateway::payloads::{AmountRequest, AuthorizeRequest, InitializeRequest};
use crate::gateway::{AuthorizeOutcome, TransactionOperations};
use crate::scheduler::FlowTask;
use crate::stats::{ExecutionStatistics, FailureRecord};

/// Per-task runtime state, dropped when the task ends
#[derive(Debug)]
struct TransactionContext<'a> {
    correlation_id: String,
    refno: String,
    instrument: &'a PaymentInstrument,
    currency: String,
    amount: u64,
    steps: Vec<Step>,
    transaction_id: Option<String>,
    checkout_url: Option<String>,
}

pub struct FlowExecutor {
    operations: Arc<TransactionOperations>,
    checkout: CheckoutSession,
    selector: InstrumentSelector,
    instruments: Arc<[PaymentInstrument]>,
    clock: Arc<dyn Clock>,
    pacing: PacingConfig,
}

impl FlowExecutor {
    pub fn new(
        operations: Arc<TransactionOperations>,
        checkout: CheckoutSession,
        selector: InstrumentSelector,
        instruments: Arc<[PaymentInstrument]>,
        clock: Arc<dyn Clock>,
        pacing: PacingConfig,
    ) -> Self {
        Self {
            operations,
            checkout,
            selector,
            instruments,
            clock,
            pacing,
        }
    }

    /// Execute one task and record its disposition
    pub async fn execute(&self, task: &FlowTask, stats: &mut ExecutionStatistics) {
        let prepared = {
            let mut rng = rand::thread_rng();
            self.prepare(task, &mut rng)
        };
        let Some(mut ctx) = prepared else {
            stats.record_skipped();
            return;
        };

        let instance = stats.record_executed(task.flow);
        self.log_banner(task, &ctx, instance, stats.counters(task.flow).planned);

        match self.run(task, &mut ctx).await {
            Ok(()) => info!("[{}] Flow {} finished", ctx.correlation_id, task.flow),
            Err(e) => {
                error!("[{}] Flow execution failed: {}", ctx.correlation_id, e);
                stats.record_failure(FailureRecord {
                    correlation_id: ctx.correlation_id.clone(),
                    flow: task.flow,
                    merchant_id: task.merchant_id().to_string(),
                    refno: Some(ctx.refno.clone()),
                    transaction_id: e.transaction_id().map(str::to_string).or(ctx.transaction_id.take()),
                    message: e.to_string(),
                });
            }
        }

        self.pause().await;
    }

    /// Random draws for the task; `None` when no instrument is eligible
    fn prepare<R: Rng + ?Sized>(&self, task: &FlowTask, rng: &mut R) -> Option<TransactionContext<'_>> {
        let merchant = &task.merchant;
        let flow_type = task.flow.flow_type;

        let currency = merchant.currencies.choose(rng)?.clone();
        let Some(instrument) = self
            .selector
            .select(&self.instruments, merchant, &currency, task.flow, rng)
        else {
            info!(
                "No valid payment method for {}/{} on {}, skipping",
                currency,
                task.flow,
                merchant.id
            );
            return None;
        };

        let amount = select_amount(merchant, instrument, flow_type, rng);
        let refno = reference::generate(&merchant.reference_number, rng);
        let steps = plan::plan(flow_type, amount, &refno, &merchant.limits, rng);
        debug!("{} {} planned steps: {}", merchant.id, refno, describe_steps(&steps));

        Some(TransactionContext {
            correlation_id: Uuid::new_v4().to_string(),
            refno,
            instrument,
            currency,
            amount,
            steps,
            transaction_id: None,
            checkout_url: None,
        })
    }

    fn log_banner(&self, task: &FlowTask, ctx: &TransactionContext<'_>, instance: u32, planned: u32) {
        info!(
            "[{}]\n================== Flow Execution ==================\n\
             Date (UTC): {}\n\
             Config ID: {}\n\
             Flow: {}\n\
             Flow Instance: {} of {}\n\
             Amount: {} {}\n\
             Payment Method: {}\n\
             Reference Number: {}\n\
             ====================================================",
            ctx.correlation_id,
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            task.merchant_id(),
            task.flow,
            instance,
            planned,
            ctx.amount,
            ctx.currency,
            ctx.instrument.alias,
            ctx.refno
        );
    }

    async fn run(&self, task: &FlowTask, ctx: &mut TransactionContext<'_>) -> Result<()> {
        let proceed = if task.is_interactive() {
            self.initialize_and_checkout(task, ctx).await?
        } else {
            self.authorize(task, ctx).await?
        };
        if !proceed {
            return Ok(());
        }

        let transaction_id = ctx
            .transaction_id
            .clone()
            .ok_or_else(|| Error::Internal("initiation finished without a transaction id".to_string()))?;

        for step in &ctx.steps {
            self.pause().await;
            self.run_step(&task.merchant, &transaction_id, &ctx.currency, step, &ctx.correlation_id)
                .await
                .map_err(|e| Error::Step {
                    step: step.name().to_string(),
                    transaction_id: transaction_id.clone(),
                    source: Box::new(e),
                })?;
        }
        Ok(())
    }

    /// MIT initiation; `false` means the flow ends here as expected
    async fn authorize(&self, task: &FlowTask, ctx: &mut TransactionContext<'_>) -> Result<bool> {
        let flow_type = task.flow.flow_type;
        let request = AuthorizeRequest::new(&ctx.refno, ctx.amount, &ctx.currency, ctx.instrument, flow_type);
        let outcome = self
            .operations
            .authorize(&task.merchant.credentials, &request, &ctx.correlation_id)
            .await?;

        match outcome {
            AuthorizeOutcome::Declined { transaction_id, .. } if flow_type.is_decline() => {
                ctx.transaction_id = transaction_id;
                info!("[{}] Transaction declined as expected", ctx.correlation_id);
                Ok(false)
            }
            AuthorizeOutcome::Declined {
                transaction_id,
                message,
            } => Err(Error::UnexpectedDecline {
                transaction_id,
                message,
            }),
            AuthorizeOutcome::Authorized { transaction_id } if flow_type.is_decline() => {
                Err(Error::UnexpectedAuthorization { transaction_id })
            }
            AuthorizeOutcome::Authorized { transaction_id } => {
                ctx.transaction_id = Some(transaction_id);
                Ok(true)
            }
        }
    }

    /// CIT initiation; `false` means the flow ends here as expected
    async fn initialize_and_checkout(&self, task: &FlowTask, ctx: &mut TransactionContext<'_>) -> Result<bool> {
        let merchant: &MerchantConfiguration = &task.merchant;
        let flow_type = task.flow.flow_type;
        let urls = merchant
            .urls
            .as_ref()
            .ok_or_else(|| Error::Config(format!("Merchant {} has no redirect URLs", merchant.id)))?;
        let redirects = urls.redirects(&ctx.refno);

        let request = InitializeRequest::new(
            &ctx.refno,
            ctx.amount,
            &ctx.currency,
            ctx.instrument,
            flow_type,
            redirects.clone(),
            urls.webhook(&ctx.refno),
        );
        let initialized = self
            .operations
            .initialize(&merchant.credentials, &request, &ctx.correlation_id)
            .await?;
        ctx.transaction_id = Some(initialized.transaction_id);
        let checkout_url: &str = ctx.checkout_url.insert(initialized.checkout_url);

        info!("[{}] Processing payment at: {}", ctx.correlation_id, checkout_url);
        let outcome = self
            .checkout
            .complete(&CheckoutRequest {
                checkout_url,
                instrument: ctx.instrument,
                flow_type,
                correlation_id: &ctx.correlation_id,
                redirects: &redirects,
                challenge_code: ctx.instrument.challenge_code(flow_type),
            })
            .await?;

        Ok(outcome == RedirectOutcome::Success)
    }

    async fn run_step(
        &self,
        merchant: &MerchantConfiguration,
        transaction_id: &str,
        currency: &str,
        step: &Step,
        cid: &str,
    ) -> Result<()> {
        let credentials = &merchant.credentials;
        let ops = &self.operations;
        match step {
            Step::Settle { amount, refno } => {
                ops.settle(credentials, transaction_id, &AmountRequest::new(*amount, currency, refno), cid)
                    .await?;
                info!("[{}] Capture successful: {} {} ({})", cid, amount, currency, refno);
            }
            Step::Cancel => {
                ops.cancel(credentials, transaction_id, cid).await?;
                info!("[{}] Cancel successful", cid);
            }
            Step::Credit { amount, refno } => {
                ops.credit(credentials, transaction_id, &AmountRequest::new(*amount, currency, refno), cid)
                    .await?;
                info!("[{}] Refund successful: {} {} ({})", cid, amount, currency, refno);
            }
            Step::Increase { amount, refno } => {
                ops.increase(credentials, transaction_id, &AmountRequest::new(*amount, currency, refno), cid)
                    .await?;
                info!("[{}] Increase successful: {} {} ({})", cid, amount, currency, refno);
            }
        }
        Ok(())
    }

    fn think_time(&self) -> Duration {
        let (min, max) = (self.pacing.think_time_min_ms, self.pacing.think_time_max_ms);
        Duration::from_millis(rand::thread_rng().gen_range(min..=max.max(min)))
    }

    async fn pause(&self) {
        self.clock.sleep(self.think_time()).await;
    }
}

/// `settle 1000, credit 700` style summary for the debug log
fn describe_steps(steps: &[Step]) -> String {
    if steps.is_empty() {
        return "none".to_string();
    }
    steps
        .iter()
        .map(|step| match step.amount() {
            Some(amount) => format!("{} {}", step.name(), amount),
            None => step.name().to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
