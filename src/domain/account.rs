//! User credit balances: the thin ledger collaborator the core calls.

use rust_decimal::Decimal;

use super::error::IndexpoolError;

#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub user_id: String,
    pub credits: Decimal,
}

impl Account {
    pub fn new(user_id: impl Into<String>) -> Account {
        Account {
            user_id: user_id.into(),
            credits: Decimal::ZERO,
        }
    }

    pub fn add_credits(&mut self, amount: Decimal) {
        self.credits += amount;
    }

    /// Deduct `amount` or fail without touching the balance. The store runs
    /// this inside the same transaction as the investment write, so balances
    /// never go negative even under racing requests.
    pub fn deduct_credits(&mut self, amount: Decimal) -> Result<(), IndexpoolError> {
        if self.credits < amount {
            return Err(IndexpoolError::validation(format!(
                "insufficient credits: balance {} is less than {amount}",
                self.credits
            )));
        }
        self.credits -= amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn deduct_within_balance() {
        let mut account = Account::new("alice");
        account.add_credits(dec!(100));
        account.deduct_credits(dec!(40)).unwrap();
        assert_eq!(account.credits, dec!(60));
    }

    #[test]
    fn deduct_beyond_balance_fails_and_preserves_balance() {
        let mut account = Account::new("alice");
        account.add_credits(dec!(10));
        let err = account.deduct_credits(dec!(10.01)).unwrap_err();
        assert!(err.to_string().contains("insufficient credits"));
        assert_eq!(account.credits, dec!(10));
    }

    #[test]
    fn exact_balance_can_be_spent() {
        let mut account = Account::new("alice");
        account.add_credits(dec!(25.50));
        account.deduct_credits(dec!(25.50)).unwrap();
        assert_eq!(account.credits, dec!(0));
    }
}
