//! Flow state machine
//!
//! Expands a flow type into the ordered operations that follow a successful
//! initiation, deriving every step's amount and reference number. Planning
//! is pure apart from the random draws, so a plan can be checked before any
//! call is made.

use rand::Rng;

use super::kind::FlowType;
use super::reference;
use crate::catalog::FlowLimits;

/// Range for the number of parts in refund-many / top-up-many flows
const MIN_PARTS: usize = 2;
const MAX_PARTS: usize = 4;

/// Largest share of the remaining balance one non-final refund may take
const SPLIT_SHARE_PERCENT: u64 = 30;

/// One dependent call on an authorized transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Settle { amount: u64, refno: String },
    Cancel,
    Credit { amount: u64, refno: String },
    Increase { amount: u64, refno: String },
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Settle { .. } => "settle",
            Step::Cancel => "cancel",
            Step::Credit { .. } => "credit",
            Step::Increase { .. } => "increase",
        }
    }

    pub fn amount(&self) -> Option<u64> {
        match self {
            Step::Settle { amount, .. } | Step::Credit { amount, .. } | Step::Increase { amount, .. } => {
                Some(*amount)
            }
            Step::Cancel => None,
        }
    }
}

/// Steps to run after initiation, in order.
///
/// `amount` is the authorized amount in minor units and `refno` the parent
/// reference number. Decline flows never produce steps.
pub fn plan<R: Rng + ?Sized>(
    flow_type: FlowType,
    amount: u64,
    refno: &str,
    limits: &FlowLimits,
    rng: &mut R,
) -> Vec<Step> {
    let settle = |amount: u64| Step::Settle {
        amount,
        refno: refno.to_string(),
    };
    let credit = |amount: u64| Step::Credit {
        amount,
        refno: reference::credit(refno),
    };
    let increase = |amount: u64| Step::Increase {
        amount,
        refno: reference::increase(refno),
    };

    match flow_type {
        FlowType::Decline
        | FlowType::AuthorizeNoCapture
        | FlowType::AuthorizeAutoCapture => Vec::new(),

        FlowType::AuthorizeCancel => vec![Step::Cancel],

        FlowType::AuthorizeCapture => vec![settle(amount)],

        FlowType::AuthorizeCaptureRefund => vec![settle(amount), credit(amount)],

        FlowType::AuthorizeCapturePartialRefund => {
            let captured = percent_of(amount, limits.partial_percent);
            vec![settle(captured), credit(captured)]
        }

        FlowType::AuthorizeCaptureRefundPartial => {
            vec![settle(amount), credit(percent_of(amount, limits.partial_percent))]
        }

        FlowType::AuthorizeAutoCaptureRefundMany => {
            let parts = part_count(amount, rng);
            split_amount(amount, parts, rng)
                .into_iter()
                .enumerate()
                .map(|(i, part)| Step::Credit {
                    amount: part,
                    refno: reference::nth_credit(refno, i + 1),
                })
                .collect()
        }

        FlowType::AuthorizeTopUp => vec![increase(top_up_delta(amount, limits.top_up))],

        FlowType::AuthorizeTopUpCapture => {
            let delta = top_up_delta(amount, limits.top_up);
            vec![increase(delta), settle(amount.saturating_add(delta))]
        }

        FlowType::AuthorizeTopUpCaptureRefund => {
            let delta = top_up_delta(amount, limits.top_up);
            let captured = amount.saturating_add(delta);
            vec![increase(delta), settle(captured), credit(captured)]
        }

        FlowType::AuthorizeTopUpManyCapture => {
            let bound = percent_of(amount, limits.top_up);
            let count = rng.gen_range(MIN_PARTS..=MAX_PARTS);
            let mut steps = Vec::with_capacity(count + 1);
            let mut total = amount;
            for n in 1..=count {
                let top_up = rng.gen_range(1..=bound);
                total = total.saturating_add(top_up);
                steps.push(Step::Increase {
                    amount: top_up,
                    refno: reference::nth_increase(refno, n),
                });
            }
            steps.push(settle(total));
            steps
        }
    }
}

/// `floor(amount * percent / 100)`, never below one minor unit
pub fn percent_of(amount: u64, percent: u64) -> u64 {
    (amount.saturating_mul(percent) / 100).max(1)
}

/// Single top-up: the percentage bound, capped at the amount itself
pub fn top_up_delta(amount: u64, percent: u64) -> u64 {
    percent_of(amount, percent).min(amount.max(1))
}

/// Number of parts for a split, never more than there are minor units.
///
/// An amount of one minor unit cannot be split, so it yields a single part
/// below `MIN_PARTS`.
fn part_count<R: Rng + ?Sized>(amount: u64, rng: &mut R) -> usize {
    let wanted = rng.gen_range(MIN_PARTS..=MAX_PARTS);
    wanted.min(amount.max(1) as usize)
}

/// Split `total` into `parts` strictly positive amounts summing to `total`.
///
/// Each non-final part is a random share (at most 30%) of what is left,
/// capped so every later part can still get at least one unit; the final
/// part takes the exact remainder. Requires `1 <= parts <= total`.
pub fn split_amount<R: Rng + ?Sized>(total: u64, parts: usize, rng: &mut R) -> Vec<u64> {
    debug_assert!(parts >= 1 && parts as u64 <= total);

    let mut amounts = Vec::with_capacity(parts);
    let mut remaining = total;
    for i in 1..parts {
        let still_needed = (parts - i) as u64;
        let cap = (remaining.saturating_mul(SPLIT_SHARE_PERCENT) / 100)
            .max(1)
            .min(remaining - still_needed);
        let part = rng.gen_range(1..=cap);
        amounts.push(part);
        remaining -= part;
    }
    amounts.push(remaining);
    amounts
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn limits() -> FlowLimits {
        FlowLimits {
            top_up: 20,
            partial_percent: 70,
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    fn settle(amount: u64, refno: &str) -> Step {
        Step::Settle {
            amount,
            refno: refno.to_string(),
        }
    }

    fn credit(amount: u64, refno: &str) -> Step {
        Step::Credit {
            amount,
            refno: refno.to_string(),
        }
    }

    fn increase(amount: u64, refno: &str) -> Step {
        Step::Increase {
            amount,
            refno: refno.to_string(),
        }
    }

    #[test]
    fn test_single_step_flows() {
        let mut rng = rng();
        assert!(plan(FlowType::Decline, 1000, "r", &limits(), &mut rng).is_empty());
        assert!(plan(FlowType::AuthorizeNoCapture, 1000, "r", &limits(), &mut rng).is_empty());
        assert!(plan(FlowType::AuthorizeAutoCapture, 1000, "r", &limits(), &mut rng).is_empty());
        assert_eq!(
            plan(FlowType::AuthorizeCancel, 1000, "r", &limits(), &mut rng),
            vec![Step::Cancel]
        );
        assert_eq!(
            plan(FlowType::AuthorizeCapture, 1000, "r", &limits(), &mut rng),
            vec![settle(1000, "r")]
        );
        assert_eq!(
            plan(FlowType::AuthorizeCaptureRefund, 1000, "r", &limits(), &mut rng),
            vec![settle(1000, "r"), credit(1000, "r-ref")]
        );
    }

    #[test]
    fn test_partial_flows_use_seventy_percent() {
        let mut rng = rng();
        assert_eq!(
            plan(FlowType::AuthorizeCaptureRefundPartial, 1000, "r", &limits(), &mut rng),
            vec![settle(1000, "r"), credit(700, "r-ref")]
        );
        assert_eq!(
            plan(FlowType::AuthorizeCapturePartialRefund, 1000, "r", &limits(), &mut rng),
            vec![settle(700, "r"), credit(700, "r-ref")]
        );
        assert_eq!(
            plan(FlowType::AuthorizeCaptureRefundPartial, 999, "r", &limits(), &mut rng),
            vec![settle(999, "r"), credit(699, "r-ref")]
        );
    }

    #[test]
    fn test_partial_percent_override() {
        let custom = FlowLimits {
            partial_percent: 25,
            ..limits()
        };
        assert_eq!(
            plan(FlowType::AuthorizeCaptureRefundPartial, 1000, "r", &custom, &mut rng()),
            vec![settle(1000, "r"), credit(250, "r-ref")]
        );
    }

    #[test]
    fn test_top_up_flows() {
        let mut rng = rng();
        assert_eq!(
            plan(FlowType::AuthorizeTopUp, 1000, "r", &limits(), &mut rng),
            vec![increase(200, "r-inc")]
        );
        assert_eq!(
            plan(FlowType::AuthorizeTopUpCapture, 1000, "r", &limits(), &mut rng),
            vec![increase(200, "r-inc"), settle(1200, "r")]
        );
        assert_eq!(
            plan(FlowType::AuthorizeTopUpCaptureRefund, 1000, "r", &limits(), &mut rng),
            vec![increase(200, "r-inc"), settle(1200, "r"), credit(1200, "r-ref")]
        );
    }

    #[test]
    fn test_top_up_capped_at_amount() {
        let generous = FlowLimits {
            top_up: 250,
            ..limits()
        };
        assert_eq!(top_up_delta(1000, generous.top_up), 1000);
        assert_eq!(
            plan(FlowType::AuthorizeTopUp, 1000, "r", &generous, &mut rng()),
            vec![increase(1000, "r-inc")]
        );
        assert_eq!(top_up_delta(3, 20), 1);
    }

    #[test]
    fn test_refund_many_references_and_sum() {
        let steps = plan(FlowType::AuthorizeAutoCaptureRefundMany, 1000, "r", &limits(), &mut rng());
        assert!((2..=4).contains(&steps.len()));

        let mut total = 0;
        for (i, step) in steps.iter().enumerate() {
            match step {
                Step::Credit { amount, refno } => {
                    assert_eq!(refno, &format!("r-ref{}", i + 1));
                    total += amount;
                }
                other => panic!("unexpected step {:?}", other),
            }
        }
        assert_eq!(total, 1000);
    }

    #[test]
    fn test_top_up_many_capture_total() {
        let steps = plan(FlowType::AuthorizeTopUpManyCapture, 1000, "r", &limits(), &mut rng());
        let (last, increases) = steps.split_last().unwrap();
        assert!((2..=4).contains(&increases.len()));

        let mut total = 1000;
        for (i, step) in increases.iter().enumerate() {
            match step {
                Step::Increase { amount, refno } => {
                    assert!((1..=200).contains(amount));
                    assert_eq!(refno, &format!("r-inc{}", i + 1));
                    total += amount;
                }
                other => panic!("unexpected step {:?}", other),
            }
        }
        assert_eq!(last, &settle(total, "r"));
    }

    #[test]
    fn test_refund_many_on_tiny_amount() {
        let steps = plan(FlowType::AuthorizeAutoCaptureRefundMany, 1, "r", &limits(), &mut rng());
        assert_eq!(steps, vec![credit(1, "r-ref1")]);
    }

    #[test]
    fn test_extreme_amounts_do_not_overflow() {
        let mut rng = rng();
        let parts = split_amount(u64::MAX, 3, &mut rng);
        assert_eq!(parts.iter().map(|p| *p as u128).sum::<u128>(), u64::MAX as u128);

        let steps = plan(FlowType::AuthorizeTopUpCaptureRefund, u64::MAX, "r", &limits(), &mut rng);
        assert_eq!(steps[1], settle(u64::MAX, "r"));
        assert_eq!(steps[2], credit(u64::MAX, "r-ref"));

        let steps = plan(FlowType::AuthorizeTopUpManyCapture, u64::MAX, "r", &limits(), &mut rng);
        assert_eq!(steps.last(), Some(&settle(u64::MAX, "r")));
    }

    #[test]
    fn test_decline_never_plans_money_movement() {
        let mut rng = rng();
        for amount in [1, 50, 1000, 99_999] {
            assert!(plan(FlowType::Decline, amount, "r", &limits(), &mut rng).is_empty());
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// Split parts are positive and sum to the total exactly.
        #[test]
        fn split_parts_sum_to_total(total in 1u64..10_000_000, parts in 1usize..=4, seed in any::<u64>()) {
            let parts = parts.min(total as usize);
            let mut rng = StdRng::seed_from_u64(seed);
            let amounts = split_amount(total, parts, &mut rng);

            prop_assert_eq!(amounts.len(), parts);
            prop_assert!(amounts.iter().all(|a| *a >= 1));
            prop_assert_eq!(amounts.iter().sum::<u64>(), total);
        }

        /// Refund-many credits always return the full authorized amount.
        #[test]
        fn refund_many_returns_full_amount(amount in 1u64..5_000_000, seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let steps = plan(FlowType::AuthorizeAutoCaptureRefundMany, amount, "r", &limits(), &mut rng);

            prop_assert!(steps.iter().all(|s| matches!(s, Step::Credit { amount, .. } if *amount >= 1)), "every step must be a credit of at least 1");
            prop_assert_eq!(steps.iter().filter_map(Step::amount).sum::<u64>(), amount);
        }

        /// Top-up-many captures the authorized amount plus every top-up.
        #[test]
        fn top_up_many_captures_sum(amount in 1u64..5_000_000, top_up in 1u64..=100, seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let limits = FlowLimits { top_up, partial_percent: 70 };
            let steps = plan(FlowType::AuthorizeTopUpManyCapture, amount, "r", &limits, &mut rng);
            let (last, increases) = steps.split_last().unwrap();

            let top_ups: Vec<u64> = increases.iter().filter_map(Step::amount).collect();
            prop_assert!(top_ups.iter().all(|t| *t >= 1 && *t <= percent_of(amount, top_up)));
            prop_assert_eq!(last.amount(), Some(amount + top_ups.iter().sum::<u64>()));
        }

        /// Partial amounts never exceed the authorized amount.
        #[test]
        fn partial_amounts_within_authorized(amount in 1u64..5_000_000, seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            for flow in [FlowType::AuthorizeCapturePartialRefund, FlowType::AuthorizeCaptureRefundPartial] {
                let steps = plan(flow, amount, "r", &limits(), &mut rng);
                prop_assert!(steps.iter().filter_map(Step::amount).all(|a| a >= 1 && a <= amount));
            }
        }
    }
}
