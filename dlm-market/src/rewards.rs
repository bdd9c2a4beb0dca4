//! Reward arithmetic
//!
//! Earnings are derived on demand from persisted counts; nothing here reads
//! or writes storage. `ledger` feeds these functions from the database.

use rust_decimal::{Decimal, RoundingStrategy};

/// Quorum size and verification weighting used by the earnings formula
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardRates {
    pub required_votes: u32,
    /// Share of the labeler multiplier applied to verification work
    pub verification_reward_factor: Decimal,
}

impl Default for RewardRates {
    fn default() -> Self {
        Self {
            required_votes: 3,
            verification_reward_factor: Decimal::new(5, 1),
        }
    }
}

/// Per-(labeler, dataset) inputs to the earnings formula
#[derive(Debug, Clone, PartialEq)]
pub struct EarningsInputs {
    pub labeling_pool: Decimal,
    pub verification_pool: Decimal,
    pub total_items: i64,
    pub verified_labels: i64,
    pub verifications: i64,
    pub multiplier: Decimal,
}

pub fn base_per_label(labeling_pool: Decimal, total_items: i64) -> Option<Decimal> {
    if total_items <= 0 {
        return Some(Decimal::ZERO);
    }
    labeling_pool.checked_div(Decimal::from(total_items))
}

pub fn base_per_verification(verification_pool: Decimal, total_items: i64, required_votes: u32) -> Option<Decimal> {
    if total_items <= 0 || required_votes == 0 {
        return Some(Decimal::ZERO);
    }
    let slots = Decimal::from(total_items).checked_mul(Decimal::from(required_votes))?;
    verification_pool.checked_div(slots)
}

/// Earnings for one labeler on one dataset. `None` on overflow.
pub fn calculate_earnings(inputs: &EarningsInputs, rates: &RewardRates) -> Option<Decimal> {
    let per_label = base_per_label(inputs.labeling_pool, inputs.total_items)?;
    let per_verification =
        base_per_verification(inputs.verification_pool, inputs.total_items, rates.required_votes)?;

    let labeling = Decimal::from(inputs.verified_labels)
        .checked_mul(per_label)?
        .checked_mul(inputs.multiplier)?;
    let verification_weight = inputs.multiplier.checked_mul(rates.verification_reward_factor)?;
    let verification = Decimal::from(inputs.verifications)
        .checked_mul(per_verification)?
        .checked_mul(verification_weight)?;

    labeling.checked_add(verification)
}

/// Claimable amount: earned minus withdrawn, never negative, truncated to the
/// external ledger's precision
pub fn pending_amount(earned: Decimal, withdrawn: Decimal, base_unit_decimals: u32) -> Decimal {
    let pending = earned.checked_sub(withdrawn).unwrap_or(Decimal::ZERO).max(Decimal::ZERO);
    pending
        .round_dp_with_strategy(base_unit_decimals, RoundingStrategy::ToZero)
        .normalize()
}

/// Split a locked amount into (labeling pool, verification pool).
/// The two always sum exactly to `amount`; `None` when the amount is too
/// large to split.
pub fn split_pool(amount: Decimal, labeling_pool_percent: u32) -> Option<(Decimal, Decimal)> {
    let labeling = amount
        .checked_mul(Decimal::from(labeling_pool_percent))?
        .checked_div(Decimal::ONE_HUNDRED)?
        .normalize();
    let verification = amount.checked_sub(labeling)?;
    Some((labeling, verification.normalize()))
}

pub fn per_item_reward(labeling_pool: Decimal, item_count: usize) -> Option<Decimal> {
    if item_count == 0 {
        return Some(Decimal::ZERO);
    }
    Some(labeling_pool.checked_div(Decimal::from(item_count))?.normalize())
}

/// Convert to an integer count of base units (10^-decimals), truncating.
/// `None` for negative amounts or on overflow.
pub fn to_base_units(amount: Decimal, base_unit_decimals: u32) -> Option<u128> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return None;
    }
    let truncated = amount.round_dp_with_strategy(base_unit_decimals, RoundingStrategy::ToZero);
    let mantissa = u128::try_from(truncated.mantissa()).ok()?;
    let shift = base_unit_decimals.checked_sub(truncated.scale())?;
    10u128.checked_pow(shift)?.checked_mul(mantissa)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_advanced_labeler_two_verified_labels() {
        // basePerLabel = 5 with 1.5x multiplier
        let inputs = EarningsInputs {
            labeling_pool: dec("50"),
            verification_pool: dec("30"),
            total_items: 10,
            verified_labels: 2,
            verifications: 0,
            multiplier: dec("1.5"),
        };
        assert_eq!(calculate_earnings(&inputs, &RewardRates::default()), Some(dec("15")));
    }

    #[test]
    fn test_verification_earns_half_multiplier() {
        // per verification = 30 / (10 * 3) = 1, weighted 1.0 * 0.5
        let inputs = EarningsInputs {
            labeling_pool: dec("70"),
            verification_pool: dec("30"),
            total_items: 10,
            verified_labels: 0,
            verifications: 4,
            multiplier: Decimal::ONE,
        };
        assert_eq!(calculate_earnings(&inputs, &RewardRates::default()), Some(dec("2")));
    }

    #[test]
    fn test_empty_dataset_earns_nothing() {
        let inputs = EarningsInputs {
            labeling_pool: dec("70"),
            verification_pool: dec("30"),
            total_items: 0,
            verified_labels: 0,
            verifications: 0,
            multiplier: Decimal::ONE,
        };
        assert_eq!(calculate_earnings(&inputs, &RewardRates::default()), Some(Decimal::ZERO));
    }

    #[test]
    fn test_pending_amount_clamps_and_truncates() {
        assert_eq!(pending_amount(dec("15"), dec("0"), 18), dec("15"));
        assert_eq!(pending_amount(dec("15"), dec("15"), 18), Decimal::ZERO);
        assert_eq!(pending_amount(dec("10"), dec("15"), 18), Decimal::ZERO);
        assert_eq!(pending_amount(dec("1.23456"), dec("0"), 2), dec("1.23"));
        assert_eq!(pending_amount(dec("0.009"), dec("0"), 2), Decimal::ZERO);
    }

    #[test]
    fn test_split_pool() {
        assert_eq!(split_pool(dec("10"), 70), Some((dec("7"), dec("3"))));
        let (l, v) = split_pool(dec("0.000000000000000001"), 70).unwrap();
        assert_eq!(l + v, dec("0.000000000000000001"));
    }

    #[test]
    fn test_split_pool_overflow_is_none() {
        assert_eq!(split_pool(Decimal::MAX, 70), None);
        assert!(split_pool(Decimal::MAX, 0).is_some());
    }

    #[test]
    fn test_earnings_overflow_is_none() {
        let inputs = EarningsInputs {
            labeling_pool: Decimal::MAX,
            verification_pool: Decimal::ZERO,
            total_items: 1,
            verified_labels: 2,
            verifications: 0,
            multiplier: Decimal::ONE,
        };
        assert_eq!(calculate_earnings(&inputs, &RewardRates::default()), None);
    }

    #[test]
    fn test_per_item_reward() {
        assert_eq!(per_item_reward(dec("7"), 2), Some(dec("3.5")));
        assert_eq!(per_item_reward(dec("7"), 0), Some(Decimal::ZERO));
    }

    #[test]
    fn test_to_base_units() {
        assert_eq!(to_base_units(dec("3.5"), 18), Some(3_500_000_000_000_000_000));
        assert_eq!(to_base_units(dec("15"), 18), Some(15_000_000_000_000_000_000));
        assert_eq!(to_base_units(dec("1.239"), 2), Some(123));
        assert_eq!(to_base_units(Decimal::ZERO, 18), Some(0));
        assert_eq!(to_base_units(dec("-1"), 18), None);
    }

    proptest! {
        /// Property: the pool split is exact and never negative
        #[test]
        fn prop_split_sums_to_amount(cents in 1i64..1_000_000_000_000, percent in 1u32..100) {
            let amount = Decimal::new(cents, 2);
            let (labeling, verification) = split_pool(amount, percent).unwrap();
            prop_assert_eq!(labeling + verification, amount);
            prop_assert!(labeling >= Decimal::ZERO);
            prop_assert!(verification >= Decimal::ZERO);
        }

        /// Property: pending is never negative
        #[test]
        fn prop_pending_never_negative(earned in 0i64..1_000_000, withdrawn in 0i64..1_000_000) {
            let pending = pending_amount(Decimal::new(earned, 3), Decimal::new(withdrawn, 3), 18);
            prop_assert!(pending >= Decimal::ZERO);
        }

        /// Property: earnings grow with verified labels
        #[test]
        fn prop_earnings_monotonic_in_labels(total in 1i64..500, verified in 0i64..500, extra in 1i64..10) {
            let verified = verified.min(total);
            let base = EarningsInputs {
                labeling_pool: Decimal::from(700),
                verification_pool: Decimal::from(300),
                total_items: total,
                verified_labels: verified,
                verifications: 0,
                multiplier: Decimal::ONE,
            };
            let more = EarningsInputs { verified_labels: verified + extra, ..base.clone() };
            let rates = RewardRates::default();
            prop_assert!(calculate_earnings(&more, &rates).unwrap() > calculate_earnings(&base, &rates).unwrap());
        }
    }
}
