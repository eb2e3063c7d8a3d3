//! Ballot validation and vote-weight aggregation.
//!
//! A ballot is backed by a specific investment. Its weight is spread evenly
//! over the chosen companies in exact decimal arithmetic, and the per-company
//! totals (`VoteTally`) are always recomputed from the vote rows rather than
//! incremented, so concurrent ballots cannot drift the aggregate.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::error::IndexpoolError;
use super::index::{Index, IndexStatus};
use super::investment::{Investment, InvestmentStatus};

/// One stored vote: a slice of an investment's weight assigned to a company.
#[derive(Debug, Clone, PartialEq)]
pub struct Vote {
    pub id: i64,
    pub user_id: String,
    pub index_id: i64,
    pub investment_id: i64,
    pub company_id: i64,
    pub weight: Decimal,
    pub created_at: DateTime<Utc>,
}

/// A ballot submission before any votes exist.
#[derive(Debug, Clone)]
pub struct Ballot {
    pub user_id: String,
    pub index_id: i64,
    pub investment_id: i64,
    pub company_ids: Vec<i64>,
}

/// Denormalized per-(index, company) aggregate over vote rows. The `id` is
/// the aggregate row's primary key and provides the stable tie-break order.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteTally {
    pub id: i64,
    pub index_id: i64,
    pub company_id: i64,
    pub total_weight: Decimal,
    pub vote_count: u32,
}

/// Each chosen company receives `amount / k` of the backing investment,
/// divided exactly (no binary floating point anywhere in this path).
pub fn weight_per_company(amount: Decimal, company_count: usize) -> Decimal {
    amount / Decimal::from(company_count as u64)
}

/// Validate a ballot against the index and its backing investment. Checks run
/// in a fixed order so each failure mode reports a distinct reason.
pub fn validate_ballot(
    ballot: &Ballot,
    index: &Index,
    member_ids: &HashSet<i64>,
    investment: &Investment,
) -> Result<(), IndexpoolError> {
    if index.status != IndexStatus::Voting {
        return Err(IndexpoolError::validation(format!(
            "voting is not open for this index (status: {})",
            index.status.as_str()
        )));
    }

    let count = ballot.company_ids.len();
    if !index.ballot_bounds.contains(count) {
        return Err(IndexpoolError::validation(format!(
            "ballot must name between {} and {} companies, got {count}",
            index.ballot_bounds.min, index.ballot_bounds.max
        )));
    }
    let distinct: HashSet<i64> = ballot.company_ids.iter().copied().collect();
    if distinct.len() != count {
        return Err(IndexpoolError::validation(
            "ballot must not name the same company twice",
        ));
    }

    for company_id in &ballot.company_ids {
        if !member_ids.contains(company_id) {
            return Err(IndexpoolError::validation(format!(
                "company {company_id} is not part of this index"
            )));
        }
    }

    if investment.user_id != ballot.user_id {
        return Err(IndexpoolError::validation(
            "investment does not belong to this user",
        ));
    }
    if investment.index_id != index.id {
        return Err(IndexpoolError::validation(
            "investment is not for this index",
        ));
    }
    if !matches!(
        investment.status,
        InvestmentStatus::Active | InvestmentStatus::Voted
    ) {
        return Err(IndexpoolError::validation(format!(
            "investment is not eligible to vote (status: {})",
            investment.status.as_str()
        )));
    }
    if investment.has_voted {
        return Err(IndexpoolError::validation(
            "this investment has already been used for voting",
        ));
    }

    Ok(())
}

/// Re-aggregate the current vote rows for one (index, company) pair.
/// Returns `(total_weight, vote_count)`.
pub fn recompute_tally(votes: &[Vote], index_id: i64, company_id: i64) -> (Decimal, u32) {
    let mut total = Decimal::ZERO;
    let mut count = 0u32;
    for vote in votes {
        if vote.index_id == index_id && vote.company_id == company_id {
            total += vote.weight;
            count += 1;
        }
    }
    (total, count)
}

/// Order tallies for winner selection: total weight descending, ties broken
/// by aggregate row id ascending. Deterministic but arbitrary at a weight
/// boundary, which decides which company makes the cut.
pub fn rank_tallies(mut tallies: Vec<VoteTally>) -> Vec<VoteTally> {
    tallies.sort_by(|a, b| {
        b.total_weight
            .cmp(&a.total_weight)
            .then_with(|| a.id.cmp(&b.id))
    });
    tallies
}
