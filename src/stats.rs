//! Run statistics and the end-of-run report

use std::collections::BTreeMap;
use std::fmt;

use crate::flow::kind::FlowId;
use crate::scheduler::FlowTask;

/// Planned vs. executed tasks for one flow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowCounters {
    pub planned: u32,
    pub executed: u32,
}

/// One task that failed after it was dispatched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub correlation_id: String,
    pub flow: FlowId,
    pub merchant_id: String,
    pub refno: Option<String>,
    pub transaction_id: Option<String>,
    pub message: String,
}

/// Counters and failures for one pass over the flow pool
#[derive(Debug, Clone, Default)]
pub struct ExecutionStatistics {
    flows: BTreeMap<FlowId, FlowCounters>,
    failures: Vec<FailureRecord>,
    skipped: u32,
}

impl ExecutionStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Planned counts taken from the tasks actually in the pool
    pub fn from_pool(pool: &[FlowTask]) -> Self {
        let mut stats = Self::new();
        for task in pool {
            stats.flows.entry(task.flow).or_default().planned += 1;
        }
        stats
    }

    /// Count a dispatched task; returns its instance number for the flow
    pub fn record_executed(&mut self, flow: FlowId) -> u32 {
        let counters = self.flows.entry(flow).or_default();
        counters.executed += 1;
        counters.executed
    }

    /// Count a task dropped for lack of an eligible instrument
    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    pub fn record_failure(&mut self, failure: FailureRecord) {
        self.failures.push(failure);
    }

    pub fn counters(&self, flow: FlowId) -> FlowCounters {
        self.flows.get(&flow).copied().unwrap_or_default()
    }

    pub fn flows(&self) -> impl Iterator<Item = (&FlowId, &FlowCounters)> {
        self.flows.iter()
    }

    pub fn total_planned(&self) -> u32 {
        self.flows.values().map(|c| c.planned).sum()
    }

    pub fn total_executed(&self) -> u32 {
        self.flows.values().map(|c| c.executed).sum()
    }

    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    pub fn skipped(&self) -> u32 {
        self.skipped
    }

    pub fn successful(&self) -> u32 {
        self.total_executed().saturating_sub(self.failures.len() as u32)
    }
}

impl fmt::Display for ExecutionStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "#################### Execution Summary ####################")?;
        writeln!(f)?;
        writeln!(f, "Total Tests Executed: {}", self.total_executed())?;
        writeln!(f, "Successful: {}", self.successful())?;
        writeln!(f, "Failed: {}", self.failures.len())?;
        writeln!(f, "Skipped: {}", self.skipped)?;
        writeln!(f)?;
        writeln!(f, "Flow Breakdown:")?;
        for (flow, counters) in &self.flows {
            writeln!(f, "• {}: {}/{} executed", flow, counters.executed, counters.planned)?;
        }

        if !self.failures.is_empty() {
            writeln!(f)?;
            writeln!(f, "Failed Flows:")?;
            for failure in &self.failures {
                writeln!(
                    f,
                    "• {} [{}] (Ref: {}, Transaction ID: {}, Correlation: {}): {}",
                    failure.flow,
                    failure.merchant_id,
                    failure.refno.as_deref().unwrap_or("N/A"),
                    failure.transaction_id.as_deref().unwrap_or("N/A"),
                    failure.correlation_id,
                    failure.message
                )?;
            }
        }

        write!(f, "###########################################################")
    }
}
