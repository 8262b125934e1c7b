//! Per-merchant cooldown scheduler
//!
//! Tasks run strictly one at a time. Each scan picks the first pooled task
//! whose merchant is past its next-eligible time; after the task finishes the
//! merchant's next-eligible time becomes `finish + cooldown`. When nothing is
//! eligible the scheduler sleeps until the earliest cooldown expires, capped
//! at the idle poll interval.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use super::pool::FlowTask;
use crate::clock::Clock;

/// Runs one dispatched task to completion
#[async_trait]
pub trait TaskDispatcher: Send {
    async fn dispatch(&mut self, task: &FlowTask);
}

pub struct CooldownScheduler {
    pool: Vec<FlowTask>,
    next_eligible: HashMap<String, Instant>,
    idle_poll: Duration,
}

impl CooldownScheduler {
    pub fn new(pool: Vec<FlowTask>, idle_poll: Duration) -> Self {
        Self {
            pool,
            next_eligible: HashMap::new(),
            idle_poll,
        }
    }

    pub fn remaining(&self) -> usize {
        self.pool.len()
    }

    fn is_eligible(&self, merchant_id: &str, now: Instant) -> bool {
        self.next_eligible
            .get(merchant_id)
            .map_or(true, |eligible_at| now >= *eligible_at)
    }

    /// Remove and return the first task whose merchant may run at `now`
    pub fn take_next(&mut self, now: Instant) -> Option<FlowTask> {
        let index = self
            .pool
            .iter()
            .position(|task| self.is_eligible(task.merchant_id(), now))?;
        Some(self.pool.remove(index))
    }

    /// Start the merchant's cooldown for the category of the finished task
    pub fn mark_dispatched(&mut self, task: &FlowTask, finished_at: Instant) {
        let cooldown = task.merchant.cooldown(task.flow.category);
        self.next_eligible
            .insert(task.merchant_id().to_string(), finished_at + cooldown);
    }

    /// How long to wait when no pooled task is eligible at `now`
    pub fn idle_wait(&self, now: Instant) -> Duration {
        let until_earliest = self
            .pool
            .iter()
            .filter_map(|task| self.next_eligible.get(task.merchant_id()))
            .map(|eligible_at| eligible_at.saturating_duration_since(now))
            .min()
            .unwrap_or(self.idle_poll);

        if self.idle_poll.is_zero() {
            until_earliest
        } else {
            until_earliest.min(self.idle_poll)
        }
    }

    /// Dispatch every pooled task; returns how many were dispatched
    pub async fn run<D>(&mut self, clock: &dyn Clock, dispatcher: &mut D) -> usize
    where
        D: TaskDispatcher + ?Sized,
    {
        let mut dispatched = 0;
        while self.remaining() > 0 {
            let now = clock.now();
            match self.take_next(now) {
                Some(task) => {
                    dispatcher.dispatch(&task).await;
                    self.mark_dispatched(&task, clock.now());
                    dispatched += 1;
                }
                None => {
                    let wait = self.idle_wait(now);
                    debug!(
                        "No merchant out of cooldown ({} tasks pending), waiting {:?}",
                        self.remaining(),
                        wait
                    );
                    clock.sleep(wait).await;
                }
            }
        }
        dispatched
    }
}
