//! Merchant reference numbers
//!
//! Dependent steps reuse the parent reference with a suffix so gateway
//! records stay traceable: `-ref` / `-refN` for credits, `-inc` / `-incN`
//! for increases. Settle keeps the parent reference.

use rand::seq::SliceRandom;
use rand::Rng;
use uuid::Uuid;

use crate::catalog::ReferencePolicy;

/// Fresh reference number for a task
pub fn generate<R: Rng + ?Sized>(policy: &ReferencePolicy, rng: &mut R) -> String {
    match policy {
        ReferencePolicy::Random { length, prefix } => {
            let simple = Uuid::new_v4().simple().to_string();
            let len = length.choose(rng).copied().unwrap_or(simple.len()).min(simple.len());
            format!("{}{}", prefix.as_deref().unwrap_or(""), &simple[..len])
        }
        ReferencePolicy::Fixed { refno } => refno.clone(),
    }
}

/// Reference for the only credit of a flow
pub fn credit(parent: &str) -> String {
    format!("{}-ref", parent)
}

/// Reference for the n-th credit (1-based) of a multi-credit flow
pub fn nth_credit(parent: &str, n: usize) -> String {
    format!("{}-ref{}", parent, n)
}

/// Reference for the only increase of a flow
pub fn increase(parent: &str) -> String {
    format!("{}-inc", parent)
}

/// Reference for the n-th increase (1-based) of a multi-increase flow
pub fn nth_increase(parent: &str, n: usize) -> String {
    format!("{}-inc{}", parent, n)
}
