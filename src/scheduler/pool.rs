//! Flow pool construction

use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;

use crate::catalog::MerchantConfiguration;
use crate::flow::kind::{FlowCategory, FlowId};

/// One scheduled unit of work
#[derive(Debug, Clone)]
pub struct FlowTask {
    pub merchant: Arc<MerchantConfiguration>,
    pub flow: FlowId,
}

impl FlowTask {
    pub fn new(merchant: Arc<MerchantConfiguration>, flow: FlowId) -> Self {
        Self { merchant, flow }
    }

    /// CIT tasks go through the hosted checkout
    pub fn is_interactive(&self) -> bool {
        self.flow.category == FlowCategory::Cit
    }

    pub fn merchant_id(&self) -> &str {
        &self.merchant.id
    }
}

/// One task per requested flow instance across all merchants, shuffled once
pub fn build_pool<R: Rng + ?Sized>(merchants: &[Arc<MerchantConfiguration>], rng: &mut R) -> Vec<FlowTask> {
    let mut pool = Vec::new();
    for merchant in merchants {
        for (category, flows) in &merchant.transaction_flows {
            for (flow_type, count) in flows {
                let flow = FlowId::new(*category, *flow_type);
                pool.extend((0..*count).map(|_| FlowTask::new(merchant.clone(), flow)));
            }
        }
    }
    pool.shuffle(rng);
    pool
}
