//! Task scheduling
//!
//! - pool: expands merchant flow counts into a shuffled task list
//! - cooldown: dispatches tasks one at a time, spacing each merchant's tasks

pub mod cooldown;
pub mod pool;

pub use cooldown::{CooldownScheduler, TaskDispatcher};
pub use pool::{build_pool, FlowTask};
