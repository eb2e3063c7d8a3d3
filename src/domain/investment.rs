//! Investments and their decomposition into per-company positions.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use super::company::Company;
use super::error::IndexpoolError;

/// Decimal places for monetary amounts.
pub const MONEY_DP: u32 = 2;
/// Decimal places for share quantities (fractional shares allowed).
pub const QUANTITY_DP: u32 = 8;
/// Decimal places for percentage weights.
pub const WEIGHT_DP: u32 = 2;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvestmentStatus {
    Pending,
    Active,
    /// The backing ballot window has opened (or the ballot was cast). Tracked
    /// separately from `has_voted`: status is the lifecycle dimension,
    /// `has_voted` is ballot usage.
    Voted,
    Locked,
    Completed,
    Withdrawn,
    Failed,
}

impl InvestmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvestmentStatus::Pending => "PENDING",
            InvestmentStatus::Active => "ACTIVE",
            InvestmentStatus::Voted => "VOTED",
            InvestmentStatus::Locked => "LOCKED",
            InvestmentStatus::Completed => "COMPLETED",
            InvestmentStatus::Withdrawn => "WITHDRAWN",
            InvestmentStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Result<InvestmentStatus, IndexpoolError> {
        match s {
            "PENDING" => Ok(InvestmentStatus::Pending),
            "ACTIVE" => Ok(InvestmentStatus::Active),
            "VOTED" => Ok(InvestmentStatus::Voted),
            "LOCKED" => Ok(InvestmentStatus::Locked),
            "COMPLETED" => Ok(InvestmentStatus::Completed),
            "WITHDRAWN" => Ok(InvestmentStatus::Withdrawn),
            "FAILED" => Ok(InvestmentStatus::Failed),
            other => Err(IndexpoolError::validation(format!(
                "unknown investment status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Investment {
    pub id: i64,
    pub user_id: String,
    pub index_id: i64,
    /// Principal. Immutable once set, always > 0.
    pub amount: Decimal,
    /// Derived from positions; equals `amount` while no positions exist.
    pub current_value: Decimal,
    pub profit_loss: Decimal,
    pub profit_loss_pct: Decimal,
    pub status: InvestmentStatus,
    pub has_voted: bool,
    pub transaction_id: String,
    pub lock_period_end: DateTime<Utc>,
    pub invested_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub id: i64,
    pub investment_id: i64,
    pub company_id: i64,
    /// This company's slice of the investment principal.
    pub amount: Decimal,
    pub quantity: Decimal,
    pub purchase_price: Decimal,
    pub current_price: Decimal,
    /// Percentage of the investment allocated to this company.
    pub weight: Decimal,
}

/// A position computed by an allocation pass, before it has an id.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionDraft {
    pub company_id: i64,
    pub amount: Decimal,
    pub quantity: Decimal,
    pub purchase_price: Decimal,
    pub current_price: Decimal,
    pub weight: Decimal,
}

impl PositionDraft {
    /// Build the position for one company given its percentage slice of the
    /// principal. A missing or non-positive price yields zero quantity and a
    /// zero sentinel price: a degraded allocation, not a failure.
    pub fn for_company(principal: Decimal, weight: Decimal, company: &Company) -> PositionDraft {
        let amount = (principal * weight / HUNDRED).round_dp(MONEY_DP);
        let (quantity, price) = match company.tradable_price() {
            Some(price) => ((amount / price).round_dp(QUANTITY_DP), price),
            None => (Decimal::ZERO, Decimal::ZERO),
        };
        PositionDraft {
            company_id: company.id,
            amount,
            quantity,
            purchase_price: price,
            current_price: price,
            weight,
        }
    }
}

impl Position {
    pub fn current_value(&self) -> Decimal {
        self.quantity * self.current_price
    }
}

impl Investment {
    pub fn validate_amount(amount: Decimal) -> Result<(), IndexpoolError> {
        if amount <= Decimal::ZERO {
            return Err(IndexpoolError::validation(
                "investment amount must be positive",
            ));
        }
        Ok(())
    }

    pub fn lock_period_end(now: DateTime<Utc>, lock_period_months: u32) -> DateTime<Utc> {
        // Calendar months are approximated as 30 days for the lock gate.
        now + Duration::days(30 * i64::from(lock_period_months))
    }

    /// Recompute `current_value` and the derived profit/loss figures from the
    /// current position set. With no positions (or an all-zero valuation) the
    /// value falls back to the principal.
    pub fn revalue(&mut self, positions: &[Position]) {
        let total: Decimal = positions.iter().map(Position::current_value).sum();
        self.current_value = if total > Decimal::ZERO {
            total.round_dp(MONEY_DP)
        } else {
            self.amount
        };
        self.profit_loss = self.current_value - self.amount;
        self.profit_loss_pct = if self.amount > Decimal::ZERO {
            (self.profit_loss / self.amount * HUNDRED).round_dp(MONEY_DP)
        } else {
            Decimal::ZERO
        };
    }

    pub fn is_withdrawal_eligible(&self, now: DateTime<Utc>) -> bool {
        self.status == InvestmentStatus::Active && now >= self.lock_period_end
    }

    pub fn check_withdrawal(&self, now: DateTime<Utc>) -> Result<(), IndexpoolError> {
        if self.status != InvestmentStatus::Active {
            return Err(IndexpoolError::validation(format!(
                "only active investments can be withdrawn (status: {})",
                self.status.as_str()
            )));
        }
        if now < self.lock_period_end {
            return Err(IndexpoolError::validation(
                "investment is still within its lock period",
            ));
        }
        Ok(())
    }
}

/// Equal weights across `n` companies where the LAST slot absorbs the
/// rounding error, so the weights sum to exactly 100.00. This is the policy
/// of the one-time default-position initializer; the execute path
/// deliberately uses a plain `100/n` split instead.
pub fn default_position_weights(n: usize) -> Vec<Decimal> {
    if n == 0 {
        return Vec::new();
    }
    let even = (HUNDRED / Decimal::from(n as u64)).round_dp(WEIGHT_DP);
    let mut weights = vec![even; n];
    weights[n - 1] = HUNDRED - even * Decimal::from(n as u64 - 1);
    weights
}

/// One-time equal-weight allocation across every current index member.
pub fn default_positions(principal: Decimal, companies: &[Company]) -> Vec<PositionDraft> {
    let weights = default_position_weights(companies.len());
    companies
        .iter()
        .zip(weights)
        .map(|(company, weight)| PositionDraft::for_company(principal, weight, company))
        .collect()
}

#[cfg(test)]
impl Investment {
    /// Minimal eligible investment for unit tests.
    pub fn sample(user_id: &str, index_id: i64, amount: Decimal) -> Investment {
        use chrono::TimeZone;
        let t0 = Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap();
        Investment {
            id: 1,
            user_id: user_id.into(),
            index_id,
            amount,
            current_value: amount,
            profit_loss: Decimal::ZERO,
            profit_loss_pct: Decimal::ZERO,
            status: InvestmentStatus::Active,
            has_voted: false,
            transaction_id: "test-tx".into(),
            lock_period_end: t0 + Duration::days(360),
            invested_at: t0,
            updated_at: t0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::company::Sector;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn company(id: i64, price: Option<Decimal>) -> Company {
        Company {
            id,
            name: format!("Company {id}"),
            symbol: format!("C{id}"),
            sector: Sector::Other,
            current_price: price,
            market_cap: None,
            is_active: true,
        }
    }

    fn position(quantity: Decimal, price: Decimal) -> Position {
        Position {
            id: 0,
            investment_id: 1,
            company_id: 1,
            amount: dec!(100),
            quantity,
            purchase_price: price,
            current_price: price,
            weight: dec!(100),
        }
    }

    #[test]
    fn default_weights_sum_to_exactly_one_hundred() {
        for n in 1..=40 {
            let weights = default_position_weights(n);
            let total: Decimal = weights.iter().sum();
            assert_eq!(total, dec!(100), "n = {n}");
        }
    }

    #[test]
    fn last_weight_absorbs_rounding_error() {
        let weights = default_position_weights(3);
        assert_eq!(weights, vec![dec!(33.33), dec!(33.33), dec!(33.34)]);
    }

    #[test]
    fn default_positions_split_principal() {
        let companies = vec![
            company(1, Some(dec!(50))),
            company(2, Some(dec!(25))),
            company(3, Some(dec!(10))),
            company(4, Some(dec!(5))),
        ];
        let drafts = default_positions(dec!(1000), &companies);
        assert_eq!(drafts.len(), 4);
        for draft in &drafts {
            assert_eq!(draft.amount, dec!(250.00));
            assert_eq!(draft.weight, dec!(25));
        }
        assert_eq!(drafts[0].quantity, dec!(5));
        assert_eq!(drafts[3].quantity, dec!(50));
        let total: Decimal = drafts.iter().map(|d| d.amount).sum();
        assert_eq!(total, dec!(1000));
    }

    #[test]
    fn draft_with_missing_price_degrades_to_zero_quantity() {
        let draft = PositionDraft::for_company(dec!(1000), dec!(25), &company(1, None));
        assert_eq!(draft.amount, dec!(250.00));
        assert_eq!(draft.weight, dec!(25));
        assert_eq!(draft.quantity, Decimal::ZERO);
        assert_eq!(draft.purchase_price, Decimal::ZERO);
    }

    #[test]
    fn revalue_sums_position_values() {
        let mut inv = Investment::sample("alice", 1, dec!(1000));
        let positions = vec![position(dec!(10), dec!(60)), position(dec!(5), dec!(100))];
        inv.revalue(&positions);
        assert_eq!(inv.current_value, dec!(1100));
        assert_eq!(inv.profit_loss, dec!(100));
        assert_eq!(inv.profit_loss_pct, dec!(10.00));
    }

    #[test]
    fn revalue_with_no_positions_falls_back_to_principal() {
        let mut inv = Investment::sample("alice", 1, dec!(1000));
        inv.current_value = dec!(0);
        inv.revalue(&[]);
        assert_eq!(inv.current_value, dec!(1000));
        assert_eq!(inv.profit_loss, dec!(0));
    }

    #[test]
    fn revalue_with_zero_valuation_falls_back_to_principal() {
        let mut inv = Investment::sample("alice", 1, dec!(1000));
        // All quantities zero, e.g. every company was missing a price.
        let positions = vec![position(dec!(0), dec!(0))];
        inv.revalue(&positions);
        assert_eq!(inv.current_value, dec!(1000));
    }

    #[test]
    fn withdrawal_gate() {
        let now = Utc.with_ymd_and_hms(2027, 6, 1, 0, 0, 0).unwrap();
        let early = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();

        let inv = Investment::sample("alice", 1, dec!(1000));
        assert!(inv.check_withdrawal(now).is_ok());
        assert!(inv.check_withdrawal(early).is_err());

        let mut withdrawn = Investment::sample("alice", 1, dec!(1000));
        withdrawn.status = InvestmentStatus::Withdrawn;
        assert!(withdrawn.check_withdrawal(now).is_err());
    }

    #[test]
    fn lock_period_is_thirty_day_months() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let end = Investment::lock_period_end(now, 12);
        assert_eq!(end - now, Duration::days(360));
    }

    #[test]
    fn amount_must_be_positive() {
        assert!(Investment::validate_amount(dec!(0)).is_err());
        assert!(Investment::validate_amount(dec!(-5)).is_err());
        assert!(Investment::validate_amount(dec!(0.01)).is_ok());
    }

    #[test]
    fn status_round_trip() {
        for status in [
            InvestmentStatus::Pending,
            InvestmentStatus::Active,
            InvestmentStatus::Voted,
            InvestmentStatus::Locked,
            InvestmentStatus::Completed,
            InvestmentStatus::Withdrawn,
            InvestmentStatus::Failed,
        ] {
            assert_eq!(InvestmentStatus::parse(status.as_str()).unwrap(), status);
        }
    }
}
