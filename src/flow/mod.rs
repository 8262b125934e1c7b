//! Flow engine
//!
//! - kind: flow categories, flow types and `CATEGORY-type` identifiers
//! - selector: instrument and amount choice
//! - reference: reference numbers for the parent and its dependent steps
//! - plan: flow type to ordered dependent steps with derived amounts
//! - executor: runs one task and records the outcome

pub mod executor;
pub mod kind;
pub mod plan;
pub mod reference;
pub mod selector;

pub use executor::FlowExecutor;
pub use kind::{FlowCategory, FlowId, FlowType};
pub use plan::Step;
pub use selector::InstrumentSelector;
