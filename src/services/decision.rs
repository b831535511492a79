//! Pure pricing decisions.
//!
//! Nothing in this module touches storage or the network. The sweep hands
//! in an item snapshot plus its config, and gets back a value describing
//! what to do; fetching revenue and looking up revert targets stay with the
//! orchestrator so these functions remain trivially testable.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::entities::priced_item;
use crate::entities::pricing_config;
use crate::entities::AutomationState;
use crate::services::revenue::RevenueComparison;

/// Why the sweep left an item untouched this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    /// A revert happened and `revert_wait_until` has not elapsed.
    WaitingAfterRevert,
    /// The ceiling was reached; only a human disable + re-enable resumes.
    AtMaxCap,
    /// `next_eligible_change_at` is still in the future.
    NotYetEligible,
}

/// A computed increase, ready for the applier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncreaseStep {
    pub new_price: Decimal,
    /// True when the step landed on the ceiling; the resulting state is
    /// `AtMaxCap` instead of `Increasing`.
    pub capped: bool,
    pub reason: String,
}

/// First-pass verdict from the config state alone, before any revenue fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Hold(HoldReason),
    Increase(IncreaseStep),
    /// The caller must fetch a revenue comparison and call [`settle`].
    NeedsComparison,
}

/// Final decision once a revenue comparison is on hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled {
    Increase(IncreaseStep),
    Revert { reason: String },
}

/// Evaluates the hold rules and the first-increase shortcut, in order:
/// waiting-after-revert, at-max-cap, not-yet-eligible, first increase.
/// Anything that falls through needs a revenue comparison.
pub fn triage(
    item: &priced_item::Model,
    config: &pricing_config::Model,
    now: DateTime<Utc>,
) -> Verdict {
    if config.current_state == AutomationState::WaitingAfterRevert {
        if let Some(wait_until) = config.revert_wait_until {
            if now < wait_until {
                return Verdict::Hold(HoldReason::WaitingAfterRevert);
            }
        }
    }

    if config.current_state == AutomationState::AtMaxCap {
        return Verdict::Hold(HoldReason::AtMaxCap);
    }

    if let Some(next_eligible) = config.next_eligible_change_at {
        if now < next_eligible {
            return Verdict::Hold(HoldReason::NotYetEligible);
        }
    }

    if config.is_first_increase {
        // The first automated move never consults revenue; there is no
        // automated baseline to compare against yet.
        return Verdict::Increase(price_step(item, config, "first automated increase"));
    }

    Verdict::NeedsComparison
}

/// Decides between increase and revert once revenue numbers exist.
/// Insufficient data is treated as "no evidence of harm", not as a block.
pub fn settle(
    item: &priced_item::Model,
    config: &pricing_config::Model,
    comparison: &RevenueComparison,
) -> Settled {
    if !comparison.has_sufficient_data {
        return Settled::Increase(price_step(
            item,
            config,
            "insufficient sales data; increasing optimistically",
        ));
    }

    if comparison.change_percent < -config.revenue_drop_threshold_percent {
        return Settled::Revert {
            reason: format!(
                "revenue dropped {}% over the last {}h (threshold {}%)",
                comparison.change_percent.round_dp(2),
                config.period_hours,
                config.revenue_drop_threshold_percent
            ),
        };
    }

    Settled::Increase(price_step(
        item,
        config,
        &format!(
            "revenue change {}% within threshold",
            comparison.change_percent.round_dp(2)
        ),
    ))
}

/// Highest price automation may ever set for this item.
pub fn price_ceiling(item: &priced_item::Model, config: &pricing_config::Model) -> Decimal {
    (item.starting_price * (Decimal::ONE + config.max_increase_percentage / dec!(100))).round_dp(2)
}

/// Computes the next increase. Prices are rounded to cents before the
/// ceiling comparison, so the result can never land above the ceiling, and
/// landing exactly on it counts as capped.
pub fn price_step(
    item: &priced_item::Model,
    config: &pricing_config::Model,
    base_reason: &str,
) -> IncreaseStep {
    let raw = (item.current_price * (Decimal::ONE + config.increment_percentage / dec!(100)))
        .round_dp(2);
    let ceiling = price_ceiling(item, config);

    if raw >= ceiling {
        IncreaseStep {
            new_price: ceiling,
            capped: true,
            reason: format!("{} (capped at the maximum increase)", base_reason),
        }
    } else {
        IncreaseStep {
            new_price: raw,
            capped: false,
            reason: base_reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use uuid::Uuid;

    fn item(starting: Decimal, current: Decimal) -> priced_item::Model {
        priced_item::Model {
            id: Uuid::new_v4(),
            store_id: Uuid::new_v4(),
            group_id: None,
            external_id: "ext-1".to_string(),
            name: "Widget".to_string(),
            starting_price: starting,
            current_price: current,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn config(item_id: Uuid) -> pricing_config::Model {
        pricing_config::Model {
            id: Uuid::new_v4(),
            item_id,
            auto_pricing_enabled: true,
            current_state: AutomationState::Increasing,
            increment_percentage: dec!(5),
            period_hours: 24,
            revenue_drop_threshold_percent: dec!(10),
            wait_hours_after_revert: 72,
            max_increase_percentage: dec!(30),
            last_price_change_at: None,
            next_eligible_change_at: None,
            revert_wait_until: None,
            pre_automation_price: None,
            last_automation_price: None,
            is_first_increase: false,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn comparison(change_percent: Decimal, sufficient: bool) -> RevenueComparison {
        RevenueComparison {
            current_period_revenue: dec!(100),
            previous_period_revenue: dec!(100),
            current_units: 3,
            previous_units: 3,
            change_percent,
            has_sufficient_data: sufficient,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn waiting_item_holds_before_the_wait_elapses() {
        let item = item(dec!(100), dec!(95));
        let mut cfg = config(item.id);
        cfg.current_state = AutomationState::WaitingAfterRevert;
        cfg.revert_wait_until = Some(now() + Duration::hours(1));
        cfg.next_eligible_change_at = Some(now() + Duration::hours(1));

        assert_eq!(
            triage(&item, &cfg, now()),
            Verdict::Hold(HoldReason::WaitingAfterRevert)
        );
    }

    #[test]
    fn waiting_item_becomes_eligible_at_exactly_the_deadline() {
        let item = item(dec!(100), dec!(95));
        let mut cfg = config(item.id);
        cfg.current_state = AutomationState::WaitingAfterRevert;
        cfg.revert_wait_until = Some(now());
        cfg.next_eligible_change_at = Some(now());

        // At the instant the wait elapses the item falls through to the
        // revenue comparison.
        assert_eq!(triage(&item, &cfg, now()), Verdict::NeedsComparison);
    }

    #[test]
    fn capped_item_holds_even_when_otherwise_eligible() {
        let item = item(dec!(100), dec!(130));
        let mut cfg = config(item.id);
        cfg.current_state = AutomationState::AtMaxCap;
        cfg.next_eligible_change_at = Some(now() - Duration::hours(1));

        assert_eq!(triage(&item, &cfg, now()), Verdict::Hold(HoldReason::AtMaxCap));
    }

    #[test]
    fn item_holds_until_next_eligible_change() {
        let item = item(dec!(100), dec!(105));
        let mut cfg = config(item.id);
        cfg.next_eligible_change_at = Some(now() + Duration::minutes(30));

        assert_eq!(
            triage(&item, &cfg, now()),
            Verdict::Hold(HoldReason::NotYetEligible)
        );
    }

    #[test]
    fn first_increase_never_needs_revenue() {
        let item = item(dec!(100), dec!(100));
        let mut cfg = config(item.id);
        cfg.is_first_increase = true;

        match triage(&item, &cfg, now()) {
            Verdict::Increase(step) => {
                assert_eq!(step.new_price, dec!(105));
                assert!(!step.capped);
            }
            other => panic!("expected increase, got {:?}", other),
        }
    }

    #[test]
    fn eligibility_gate_applies_even_to_the_first_increase() {
        let item = item(dec!(100), dec!(100));
        let mut cfg = config(item.id);
        cfg.is_first_increase = true;
        cfg.next_eligible_change_at = Some(now() + Duration::hours(2));

        assert_eq!(
            triage(&item, &cfg, now()),
            Verdict::Hold(HoldReason::NotYetEligible)
        );
    }

    #[test]
    fn steady_revenue_settles_to_an_increase() {
        let item = item(dec!(100), dec!(105));
        let cfg = config(item.id);

        match settle(&item, &cfg, &comparison(dec!(2.5), true)) {
            Settled::Increase(step) => assert_eq!(step.new_price, dec!(110.25)),
            other => panic!("expected increase, got {:?}", other),
        }
    }

    #[test]
    fn drop_beyond_threshold_settles_to_a_revert() {
        let item = item(dec!(100), dec!(110.25));
        let cfg = config(item.id);

        match settle(&item, &cfg, &comparison(dec!(-25), true)) {
            Settled::Revert { reason } => {
                assert!(reason.contains("-25"));
                assert!(reason.contains("threshold"));
            }
            other => panic!("expected revert, got {:?}", other),
        }
    }

    #[test]
    fn drop_exactly_at_threshold_still_increases() {
        let item = item(dec!(100), dec!(105));
        let cfg = config(item.id);

        // Threshold is 10; only a change strictly below -10 reverts.
        assert!(matches!(
            settle(&item, &cfg, &comparison(dec!(-10), true)),
            Settled::Increase(_)
        ));
    }

    #[test]
    fn insufficient_data_increases_optimistically() {
        let item = item(dec!(100), dec!(105));
        let cfg = config(item.id);

        match settle(&item, &cfg, &comparison(dec!(-90), false)) {
            Settled::Increase(step) => assert!(step.reason.contains("insufficient")),
            other => panic!("expected increase, got {:?}", other),
        }
    }

    #[test]
    fn step_beyond_the_ceiling_is_clamped_and_capped() {
        let item = item(dec!(100), dec!(125));
        let cfg = config(item.id);

        let step = price_step(&item, &cfg, "test");
        // 125 * 1.05 = 131.25 exceeds the 130.00 ceiling.
        assert_eq!(step.new_price, dec!(130.00));
        assert!(step.capped);
        assert!(step.reason.contains("capped"));
    }

    #[test]
    fn step_landing_exactly_on_the_ceiling_is_capped() {
        let item = item(dec!(100), dec!(125));
        let mut cfg = config(item.id);
        cfg.increment_percentage = dec!(4);

        let step = price_step(&item, &cfg, "test");
        // 125 * 1.04 = 130.00 == ceiling.
        assert_eq!(step.new_price, dec!(130.00));
        assert!(step.capped);
    }

    #[test]
    fn step_below_the_ceiling_keeps_the_raw_price() {
        let item = item(dec!(100), dec!(100));
        let cfg = config(item.id);

        let step = price_step(&item, &cfg, "test");
        assert_eq!(step.new_price, dec!(105.00));
        assert!(!step.capped);
    }

    proptest! {
        #[test]
        fn increase_never_exceeds_the_ceiling(
            starting_cents in 100i64..1_000_000,
            current_cents in 100i64..1_000_000,
            increment in 1i64..=50,
            max_pct in 1i64..=200,
        ) {
            let item = item(
                Decimal::new(starting_cents, 2),
                Decimal::new(current_cents, 2),
            );
            let mut cfg = config(item.id);
            cfg.increment_percentage = Decimal::from(increment);
            cfg.max_increase_percentage = Decimal::from(max_pct);

            let step = price_step(&item, &cfg, "prop");
            let ceiling = price_ceiling(&item, &cfg);

            prop_assert!(step.new_price <= ceiling);
            prop_assert_eq!(step.capped, step.new_price == ceiling);
        }

        #[test]
        fn uncapped_increase_strictly_raises_the_price(
            current_cents in 100i64..1_000_000,
            increment in 1i64..=50,
        ) {
            let current = Decimal::new(current_cents, 2);
            let item = item(current, current);
            let mut cfg = config(item.id);
            cfg.increment_percentage = Decimal::from(increment);
            cfg.max_increase_percentage = dec!(1000);

            let step = price_step(&item, &cfg, "prop");
            if !step.capped {
                prop_assert!(step.new_price > current);
            }
        }
    }
}
