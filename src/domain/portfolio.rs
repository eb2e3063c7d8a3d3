//! Portfolio aggregation over a user's investments (read-only consumer).

use rust_decimal::Decimal;

use super::investment::{Investment, InvestmentStatus, MONEY_DP};
use super::risk::LedgerSnapshot;

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSummary {
    pub user_id: String,
    pub total_invested: Decimal,
    pub total_value: Decimal,
    pub total_profit_loss: Decimal,
    pub investment_count: usize,
}

/// Statuses that represent in-flight capital. VOTED investments still count:
/// their capital is committed even though plain investment actions are
/// blocked during the vote.
fn counts_toward_portfolio(status: InvestmentStatus) -> bool {
    matches!(
        status,
        InvestmentStatus::Active | InvestmentStatus::Voted | InvestmentStatus::Locked
    )
}

pub fn summarize(user_id: &str, investments: &[Investment]) -> PortfolioSummary {
    let mut total_invested = Decimal::ZERO;
    let mut total_value = Decimal::ZERO;
    let mut count = 0;
    for inv in investments {
        if inv.user_id == user_id && counts_toward_portfolio(inv.status) {
            total_invested += inv.amount;
            total_value += inv.current_value;
            count += 1;
        }
    }
    PortfolioSummary {
        user_id: user_id.to_string(),
        total_invested,
        total_value: total_value.round_dp(MONEY_DP),
        total_profit_loss: (total_value - total_invested).round_dp(MONEY_DP),
        investment_count: count,
    }
}

/// Snapshot for the risk advisor: active principal plus all-time totals.
pub fn ledger_snapshot(user_id: &str, investments: &[Investment]) -> LedgerSnapshot {
    let mut active_principal = Decimal::ZERO;
    let mut total_principal = Decimal::ZERO;
    let mut total_current_value = Decimal::ZERO;
    for inv in investments {
        if inv.user_id != user_id {
            continue;
        }
        if inv.status == InvestmentStatus::Active {
            active_principal += inv.amount;
        }
        total_principal += inv.amount;
        total_current_value += inv.current_value;
    }
    LedgerSnapshot {
        active_principal,
        total_principal,
        total_current_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn investment(user: &str, amount: Decimal, value: Decimal, status: InvestmentStatus) -> Investment {
        let mut inv = Investment::sample(user, 1, amount);
        inv.current_value = value;
        inv.status = status;
        inv
    }

    #[test]
    fn summary_includes_active_and_voted_capital() {
        let investments = vec![
            investment("alice", dec!(1000), dec!(1100), InvestmentStatus::Active),
            investment("alice", dec!(500), dec!(450), InvestmentStatus::Voted),
            investment("alice", dec!(200), dec!(200), InvestmentStatus::Withdrawn),
            investment("bob", dec!(900), dec!(900), InvestmentStatus::Active),
        ];
        let summary = summarize("alice", &investments);
        assert_eq!(summary.investment_count, 2);
        assert_eq!(summary.total_invested, dec!(1500));
        assert_eq!(summary.total_value, dec!(1550));
        assert_eq!(summary.total_profit_loss, dec!(50));
    }

    #[test]
    fn ledger_snapshot_separates_active_from_all_time() {
        let investments = vec![
            investment("alice", dec!(1000), dec!(1100), InvestmentStatus::Active),
            investment("alice", dec!(500), dec!(400), InvestmentStatus::Withdrawn),
        ];
        let snapshot = ledger_snapshot("alice", &investments);
        assert_eq!(snapshot.active_principal, dec!(1000));
        assert_eq!(snapshot.total_principal, dec!(1500));
        assert_eq!(snapshot.total_current_value, dec!(1500));
    }
}
