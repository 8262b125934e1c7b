//! Payment instrument and amount selection

use rand::seq::SliceRandom;
use rand::Rng;

use super::kind::{FlowCategory, FlowId, FlowType};
use crate::catalog::{MerchantConfiguration, PaymentInstrument};
use crate::config::SelectionConfig;

/// Picks an instrument satisfying currency, flow and merchant constraints
#[derive(Debug, Clone, Default)]
pub struct InstrumentSelector {
    policy: SelectionConfig,
}

impl InstrumentSelector {
    pub fn new(policy: SelectionConfig) -> Self {
        Self { policy }
    }

    /// Every instrument usable for this merchant, currency and flow
    pub fn eligible<'a>(
        &self,
        instruments: &'a [PaymentInstrument],
        merchant: &MerchantConfiguration,
        currency: &str,
        flow: FlowId,
    ) -> Vec<&'a PaymentInstrument> {
        instruments
            .iter()
            .filter(|instrument| instrument.supports_currency(currency))
            .filter(|instrument| !self.is_excluded_wallet(instrument, flow))
            .filter(|instrument| !flow.flow_type.is_decline() || instrument.ranges.decline.is_some())
            .filter(|instrument| !flow.flow_type.is_top_up() || self.can_top_up(instrument))
            .filter(|instrument| merchant_allows(merchant, instrument))
            .collect()
    }

    /// Uniform choice among eligible instruments; `None` means skip the task
    pub fn select<'a, R: Rng + ?Sized>(
        &self,
        instruments: &'a [PaymentInstrument],
        merchant: &MerchantConfiguration,
        currency: &str,
        flow: FlowId,
        rng: &mut R,
    ) -> Option<&'a PaymentInstrument> {
        self.eligible(instruments, merchant, currency, flow)
            .choose(rng)
            .copied()
    }

    fn is_excluded_wallet(&self, instrument: &PaymentInstrument, flow: FlowId) -> bool {
        let is_wallet = self
            .policy
            .wallet_types
            .iter()
            .any(|tag| tag.eq_ignore_ascii_case(instrument.kind.tag()));
        if !is_wallet {
            return false;
        }

        (self.policy.exclude_wallets_from_cit && flow.category == FlowCategory::Cit)
            || (self.policy.exclude_wallets_from_refunds && flow.flow_type.has_refund())
    }

    fn can_top_up(&self, instrument: &PaymentInstrument) -> bool {
        if !instrument.kind.is_card() {
            return false;
        }
        self.policy.top_up_card_brands.is_empty()
            || self
                .policy
                .top_up_card_brands
                .iter()
                .any(|brand| brand.eq_ignore_ascii_case(instrument.method_code()))
    }
}

/// Merchant allow-list: no list at all admits everything, otherwise each
/// instrument family needs its own list.
fn merchant_allows(merchant: &MerchantConfiguration, instrument: &PaymentInstrument) -> bool {
    let allowed = &merchant.allowed_methods;
    if allowed.is_unrestricted() {
        return true;
    }

    let filter = if instrument.kind.is_card() {
        allowed.cards.as_ref()
    } else {
        allowed.apms.as_ref()
    };
    filter.is_some_and(|filter| filter.allows(instrument.method_code()))
}

/// Draw the transaction amount in minor units.
///
/// Decline flows use the instrument's decline range. Everything else uses
/// the merchant policy, then the instrument's success range when it has one.
pub fn select_amount<R: Rng + ?Sized>(
    merchant: &MerchantConfiguration,
    instrument: &PaymentInstrument,
    flow_type: FlowType,
    rng: &mut R,
) -> u64 {
    if flow_type.is_decline() {
        if let Some(range) = instrument.ranges.decline {
            return range.sample(rng);
        }
    }

    let amount = merchant.amounts.sample(rng);

    match instrument.ranges.success {
        Some(range) if !flow_type.is_decline() => range.sample(rng),
        _ => amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{fixtures, AmountPolicy, AmountRange, MethodFilter};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn mit(flow_type: FlowType) -> FlowId {
        FlowId::new(FlowCategory::Mit, flow_type)
    }

    fn aliases(instruments: Vec<&PaymentInstrument>) -> Vec<String> {
        instruments.iter().map(|i| i.alias.clone()).collect()
    }

    fn catalog() -> Vec<PaymentInstrument> {
        let mut visa = fixtures::card("visa", "VIS");
        visa.ranges.decline = Some(AmountRange { min: 9000, max: 9999 });
        let mut diners = fixtures::card("diners", "DIN");
        diners.currencies = Some(vec!["USD".to_string()]);
        let apple = fixtures::alternative("apple", "APL");
        let paypal = fixtures::alternative("paypal", "PAP");
        vec![visa, diners, apple, paypal]
    }

    #[test]
    fn test_unrestricted_merchant_sees_all_currency_matches() {
        let selector = InstrumentSelector::default();
        let merchant = fixtures::merchant("m", &[]);
        let instruments = catalog();

        let eligible = selector.eligible(&instruments, &merchant, "CHF", mit(FlowType::AuthorizeCapture));
        assert_eq!(aliases(eligible), vec!["visa", "apple", "paypal"]);

        let eligible = selector.eligible(&instruments, &merchant, "USD", mit(FlowType::AuthorizeCapture));
        assert_eq!(aliases(eligible), vec!["visa", "diners", "apple", "paypal"]);
    }

    #[test]
    fn test_wallets_excluded_from_cit_and_refunds() {
        let selector = InstrumentSelector::default();
        let merchant = fixtures::merchant("m", &[]);
        let instruments = catalog();

        let cit = FlowId::new(FlowCategory::Cit, FlowType::AuthorizeCapture);
        assert!(!aliases(selector.eligible(&instruments, &merchant, "CHF", cit)).contains(&"apple".to_string()));

        let refund = mit(FlowType::AuthorizeCaptureRefund);
        assert!(!aliases(selector.eligible(&instruments, &merchant, "CHF", refund)).contains(&"apple".to_string()));

        let relaxed = InstrumentSelector::new(SelectionConfig {
            exclude_wallets_from_cit: false,
            exclude_wallets_from_refunds: false,
            ..SelectionConfig::default()
        });
        assert!(aliases(relaxed.eligible(&instruments, &merchant, "CHF", cit)).contains(&"apple".to_string()));
    }

    #[test]
    fn test_decline_requires_decline_range() {
        let selector = InstrumentSelector::default();
        let merchant = fixtures::merchant("m", &[]);
        let instruments = catalog();

        let eligible = selector.eligible(&instruments, &merchant, "USD", mit(FlowType::Decline));
        assert_eq!(aliases(eligible), vec!["visa"]);
    }

    #[test]
    fn test_top_up_requires_allowed_card_brand() {
        let selector = InstrumentSelector::default();
        let merchant = fixtures::merchant("m", &[]);
        let instruments = catalog();

        let eligible = selector.eligible(&instruments, &merchant, "USD", mit(FlowType::AuthorizeTopUp));
        assert_eq!(aliases(eligible), vec!["visa"]);

        let any_card = InstrumentSelector::new(SelectionConfig {
            top_up_card_brands: vec![],
            ..SelectionConfig::default()
        });
        let eligible = any_card.eligible(&instruments, &merchant, "USD", mit(FlowType::AuthorizeTopUp));
        assert_eq!(aliases(eligible), vec!["visa", "diners"]);
    }

    #[test]
    fn test_merchant_allow_lists() {
        let selector = InstrumentSelector::default();
        let instruments = catalog();
        let flow = mit(FlowType::AuthorizeNoCapture);

        let mut cards_only = fixtures::merchant("m", &[]);
        cards_only.allowed_methods.cards = Some(MethodFilter::All);
        assert_eq!(
            aliases(selector.eligible(&instruments, &cards_only, "USD", flow)),
            vec!["visa", "diners"]
        );

        let mut mixed = fixtures::merchant("m", &[]);
        mixed.allowed_methods.cards = Some(MethodFilter::Only(vec!["DIN".to_string()]));
        mixed.allowed_methods.apms = Some(MethodFilter::Only(vec!["PAP".to_string()]));
        assert_eq!(
            aliases(selector.eligible(&instruments, &mixed, "USD", flow)),
            vec!["diners", "paypal"]
        );
    }

    #[test]
    fn test_no_match_returns_none() {
        let selector = InstrumentSelector::default();
        let merchant = fixtures::merchant("m", &[]);
        let instruments = catalog();
        let mut rng = StdRng::seed_from_u64(3);

        assert!(selector
            .select(&instruments, &merchant, "CHF", mit(FlowType::Decline), &mut rng)
            .is_some());
        assert!(selector
            .select(&[], &merchant, "CHF", mit(FlowType::AuthorizeCapture), &mut rng)
            .is_none());
    }

    #[test]
    fn test_select_amount_sources() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut merchant = fixtures::merchant("m", &[]);
        merchant.amounts = AmountPolicy::Range { min: 100, max: 200 };

        let mut card = fixtures::card("visa", "VIS");
        for _ in 0..50 {
            let amount = select_amount(&merchant, &card, FlowType::AuthorizeCapture, &mut rng);
            assert!((100..=200).contains(&amount));
        }

        card.ranges.decline = Some(AmountRange { min: 9000, max: 9100 });
        card.ranges.success = Some(AmountRange { min: 10, max: 20 });
        for _ in 0..50 {
            let declined = select_amount(&merchant, &card, FlowType::Decline, &mut rng);
            assert!((9000..=9100).contains(&declined));
            let approved = select_amount(&merchant, &card, FlowType::AuthorizeCapture, &mut rng);
            assert!((10..=20).contains(&approved));
        }
    }
}
