//! Persistence port: the operations the core exposes to its callers.
//!
//! Every mutating operation is atomic: it either fully succeeds with all
//! derived aggregates consistent, or fails with no observable side effect.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::company::{Company, NewCompany, PriceUpdate};
use crate::domain::error::IndexpoolError;
use crate::domain::index::{Index, IndexStatus, NewIndex};
use crate::domain::investment::{Investment, Position};
use crate::domain::portfolio::PortfolioSummary;
use crate::domain::rebalance::RebalanceDecision;
use crate::domain::risk::LedgerSnapshot;
use crate::domain::voting::{Ballot, Vote, VoteTally};

/// Result of an `execute`: the decision plus how much ledger it touched.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub index: Index,
    pub decision: RebalanceDecision,
    pub investments_rebalanced: usize,
}

/// Receipt for a completed withdrawal.
#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawalReceipt {
    pub investment_id: i64,
    pub credits_returned: Decimal,
    pub new_balance: Decimal,
}

/// A ranked vote-weight row joined with its company.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCompany {
    pub company: Company,
    pub tally: VoteTally,
}

pub trait StorePort {
    // Company directory
    fn upsert_companies(&self, companies: &[NewCompany]) -> Result<usize, IndexpoolError>;
    fn list_companies(&self) -> Result<Vec<Company>, IndexpoolError>;
    fn update_prices(&self, updates: &[PriceUpdate]) -> Result<usize, IndexpoolError>;

    // Credit ledger
    fn deposit(&self, user_id: &str, amount: Decimal) -> Result<Decimal, IndexpoolError>;
    fn balance(&self, user_id: &str) -> Result<Decimal, IndexpoolError>;

    // Index registry and lifecycle
    fn create_index(&self, new_index: &NewIndex, now: DateTime<Utc>) -> Result<Index, IndexpoolError>;
    fn get_index(&self, index_id: i64) -> Result<Index, IndexpoolError>;
    fn list_indexes(&self, status: Option<IndexStatus>) -> Result<Vec<Index>, IndexpoolError>;
    fn set_index_companies(
        &self,
        index_id: i64,
        company_ids: &[i64],
        now: DateTime<Utc>,
    ) -> Result<(), IndexpoolError>;
    fn index_company_ids(&self, index_id: i64) -> Result<Vec<i64>, IndexpoolError>;
    fn activate_index(&self, index_id: i64, now: DateTime<Utc>) -> Result<Index, IndexpoolError>;
    fn start_voting(&self, index_id: i64, now: DateTime<Utc>) -> Result<Index, IndexpoolError>;
    fn execute_index(
        &self,
        index_id: i64,
        now: DateTime<Utc>,
    ) -> Result<ExecutionReport, IndexpoolError>;
    fn archive_index(&self, index_id: i64, now: DateTime<Utc>) -> Result<Index, IndexpoolError>;
    fn set_draft(&self, index_id: i64, now: DateTime<Utc>) -> Result<Index, IndexpoolError>;

    // Voting
    fn submit_ballot(
        &self,
        ballot: &Ballot,
        now: DateTime<Utc>,
    ) -> Result<Vec<Vote>, IndexpoolError>;
    fn company_vote_weights(&self, index_id: i64) -> Result<Vec<RankedCompany>, IndexpoolError>;

    // Investment ledger
    fn create_investment(
        &self,
        user_id: &str,
        index_id: i64,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Investment, IndexpoolError>;
    fn withdraw(
        &self,
        investment_id: i64,
        now: DateTime<Utc>,
    ) -> Result<WithdrawalReceipt, IndexpoolError>;
    fn generate_positions(
        &self,
        investment_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Position>, IndexpoolError>;
    fn get_investment(&self, investment_id: i64) -> Result<Investment, IndexpoolError>;
    fn list_investments(&self, user_id: &str) -> Result<Vec<Investment>, IndexpoolError>;
    fn list_positions(&self, investment_id: i64) -> Result<Vec<Position>, IndexpoolError>;
    fn revalue_investments(&self, now: DateTime<Utc>) -> Result<usize, IndexpoolError>;

    // Downstream consumers
    fn portfolio_summary(&self, user_id: &str) -> Result<PortfolioSummary, IndexpoolError>;
    fn ledger_snapshot(&self, user_id: &str) -> Result<LedgerSnapshot, IndexpoolError>;
}
