//! Rule-based risk advisor for insurance quoting.
//!
//! A thin consumer of the investment ledger: prices coverage from the size of
//! a proposed investment relative to the user's active principal and from the
//! user's overall performance history. Rules only, no statistics.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Risk factor floor and ceiling.
const MIN_RISK: Decimal = dec!(0.1);
const MAX_RISK: Decimal = dec!(10.0);

/// Inputs summarizing a user's ledger state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerSnapshot {
    /// Sum of principal over the user's ACTIVE investments.
    pub active_principal: Decimal,
    /// Sum of principal over all of the user's investments.
    pub total_principal: Decimal,
    /// Sum of current value over all of the user's investments.
    pub total_current_value: Decimal,
}

/// Size risk: how large the proposed investment is relative to the user's
/// active principal. New investors (no active principal) get the 2.0 baseline.
pub fn investment_size_risk(amount: Decimal, active_principal: Decimal) -> Decimal {
    if active_principal <= Decimal::ZERO {
        return dec!(2.0);
    }
    let ratio = amount / active_principal;
    if ratio <= dec!(0.05) {
        dec!(0.5)
    } else if ratio <= dec!(0.15) {
        dec!(0.8)
    } else if ratio <= dec!(0.30) {
        dec!(1.2)
    } else if ratio <= dec!(0.50) {
        dec!(1.8)
    } else {
        dec!(2.5)
    }
}

/// History risk: overall performance ratio across the user's investments.
/// Users with no history get the 1.8 baseline.
pub fn user_history_risk(total_principal: Decimal, total_current_value: Decimal) -> Decimal {
    if total_principal <= Decimal::ZERO {
        return dec!(1.8);
    }
    let performance = total_current_value / total_principal - Decimal::ONE;
    if performance >= dec!(0.30) {
        dec!(0.5)
    } else if performance >= dec!(0.15) {
        dec!(0.8)
    } else if performance >= Decimal::ZERO {
        dec!(1.0)
    } else if performance >= dec!(-0.10) {
        dec!(1.5)
    } else if performance >= dec!(-0.20) {
        dec!(2.0)
    } else {
        dec!(2.5)
    }
}

/// Combined risk factor: 60% size, 40% history, clamped to [0.10, 10.00].
pub fn risk_factor(amount: Decimal, ledger: &LedgerSnapshot) -> Decimal {
    let size = investment_size_risk(amount, ledger.active_principal);
    let history = user_history_risk(ledger.total_principal, ledger.total_current_value);
    let combined = size * dec!(0.6) + history * dec!(0.4);
    combined.clamp(MIN_RISK, MAX_RISK).round_dp(2)
}

/// Monthly premium for a policy: base premium scaled by the risk factor.
pub fn monthly_premium(base_premium: Decimal, risk: Decimal) -> Decimal {
    (base_premium * risk).round_dp(2)
}

/// Insurance payout: the lesser of the coverage cap and the shortfall below
/// the trigger value. Zero when the investment is at or above its trigger.
pub fn payout_amount(
    initial_amount: Decimal,
    trigger_pct: Decimal,
    coverage_cap: Decimal,
    current_value: Decimal,
) -> Decimal {
    let trigger_value = initial_amount * trigger_pct / Decimal::ONE_HUNDRED;
    if current_value >= trigger_value {
        return Decimal::ZERO;
    }
    (trigger_value - current_value).min(coverage_cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(active: Decimal, total: Decimal, value: Decimal) -> LedgerSnapshot {
        LedgerSnapshot {
            active_principal: active,
            total_principal: total,
            total_current_value: value,
        }
    }

    #[test]
    fn size_risk_ladder() {
        let portfolio = dec!(10000);
        assert_eq!(investment_size_risk(dec!(500), portfolio), dec!(0.5));
        assert_eq!(investment_size_risk(dec!(1500), portfolio), dec!(0.8));
        assert_eq!(investment_size_risk(dec!(3000), portfolio), dec!(1.2));
        assert_eq!(investment_size_risk(dec!(5000), portfolio), dec!(1.8));
        assert_eq!(investment_size_risk(dec!(5001), portfolio), dec!(2.5));
    }

    #[test]
    fn new_investor_baseline_size_risk() {
        assert_eq!(investment_size_risk(dec!(1000), Decimal::ZERO), dec!(2.0));
    }

    #[test]
    fn history_risk_ladder() {
        assert_eq!(user_history_risk(dec!(1000), dec!(1300)), dec!(0.5));
        assert_eq!(user_history_risk(dec!(1000), dec!(1150)), dec!(0.8));
        assert_eq!(user_history_risk(dec!(1000), dec!(1000)), dec!(1.0));
        assert_eq!(user_history_risk(dec!(1000), dec!(950)), dec!(1.5));
        assert_eq!(user_history_risk(dec!(1000), dec!(850)), dec!(2.0));
        assert_eq!(user_history_risk(dec!(1000), dec!(700)), dec!(2.5));
    }

    #[test]
    fn no_history_baseline() {
        assert_eq!(user_history_risk(Decimal::ZERO, Decimal::ZERO), dec!(1.8));
    }

    #[test]
    fn combined_factor_is_weighted_and_rounded() {
        // size 0.5 (5% of portfolio), history 1.0 (flat performance):
        // 0.5*0.6 + 1.0*0.4 = 0.70
        let snapshot = ledger(dec!(10000), dec!(10000), dec!(10000));
        assert_eq!(risk_factor(dec!(500), &snapshot), dec!(0.70));
    }

    #[test]
    fn premium_scales_with_risk() {
        assert_eq!(monthly_premium(dec!(500), dec!(0.70)), dec!(350.00));
        assert_eq!(monthly_premium(dec!(500), dec!(2.5)), dec!(1250.00));
    }

    #[test]
    fn payout_is_zero_at_or_above_trigger() {
        assert_eq!(payout_amount(dec!(10000), dec!(50), dec!(5000), dec!(5000)), dec!(0));
        assert_eq!(payout_amount(dec!(10000), dec!(50), dec!(5000), dec!(9000)), dec!(0));
    }

    #[test]
    fn payout_is_shortfall_capped_by_coverage() {
        // Trigger value 5000, current 4000: shortfall 1000.
        assert_eq!(payout_amount(dec!(10000), dec!(50), dec!(5000), dec!(4000)), dec!(1000));
        // Deep loss: capped at coverage.
        assert_eq!(payout_amount(dec!(20000), dec!(50), dec!(5000), dec!(1000)), dec!(5000));
    }
}
