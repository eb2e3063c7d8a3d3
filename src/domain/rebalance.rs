//! The vote-weighted rebalancing engine.
//!
//! Converts aggregated vote tallies into the executed index's company set and
//! an equal-weight allocation plan for every voted investment. Everything
//! here is pure; the store adapter supplies the data and applies the plan
//! inside one transaction.

use std::collections::{BTreeMap, HashSet};

use rust_decimal::Decimal;

use super::company::Company;
use super::error::IndexpoolError;
use super::index::SizeBounds;
use super::investment::{PositionDraft, WEIGHT_DP};
use super::voting::{Vote, VoteTally, rank_tallies};

/// Number of distinct companies each voter's ballot named.
pub fn ballot_sizes_per_user(votes: &[Vote]) -> Vec<usize> {
    let mut per_user: BTreeMap<&str, HashSet<i64>> = BTreeMap::new();
    for vote in votes {
        per_user
            .entry(vote.user_id.as_str())
            .or_default()
            .insert(vote.company_id);
    }
    per_user.into_values().map(|set| set.len()).collect()
}

/// Most frequent ballot size. Frequency ties resolve toward the smaller
/// ballot, keeping the selection conservative and deterministic.
fn mode(sizes: &[usize]) -> Option<usize> {
    let mut histogram: BTreeMap<usize, usize> = BTreeMap::new();
    for &size in sizes {
        *histogram.entry(size).or_insert(0) += 1;
    }
    histogram
        .into_iter()
        .max_by(|(size_a, count_a), (size_b, count_b)| {
            count_a.cmp(count_b).then(size_b.cmp(size_a))
        })
        .map(|(size, _)| size)
}

/// Determine the target company count N.
///
/// N tracks how many choices a typical voter actually made (the mode of
/// per-user ballot sizes), clamped to the index's final-size bounds and
/// capped by the number of distinct companies that received votes.
pub fn target_company_count(
    ballot_sizes: &[usize],
    bounds: SizeBounds,
    distinct_voted_companies: usize,
) -> Result<usize, IndexpoolError> {
    if distinct_voted_companies < bounds.min as usize {
        return Err(IndexpoolError::validation(format!(
            "only {distinct_voted_companies} companies received votes, need at least {}",
            bounds.min
        )));
    }
    let mode_votes = mode(ballot_sizes).unwrap_or(bounds.min as usize);
    Ok(bounds.clamp(mode_votes).min(distinct_voted_companies))
}

/// The top-N companies by total vote weight (stable tie-break by aggregate
/// row id).
pub fn select_winners(tallies: Vec<VoteTally>, n: usize) -> Vec<i64> {
    rank_tallies(tallies)
        .into_iter()
        .take(n)
        .map(|t| t.company_id)
        .collect()
}

/// Equal-weight allocation of one investment across the winning companies.
///
/// The execute path uses a plain `100/n` split quantized to 2 dp with no
/// last-slot correction, unlike `default_positions`. Both policies are kept
/// as found, per call site.
pub fn allocate_equal_weight(principal: Decimal, winners: &[Company]) -> Vec<PositionDraft> {
    if winners.is_empty() {
        return Vec::new();
    }
    let weight =
        (Decimal::ONE_HUNDRED / Decimal::from(winners.len() as u64)).round_dp(WEIGHT_DP);
    winners
        .iter()
        .map(|company| PositionDraft::for_company(principal, weight, company))
        .collect()
}

/// What an `execute` decided, for callers and the audit log.
#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceDecision {
    pub target_count: usize,
    pub winners: Vec<i64>,
}

/// Steps 1-3 of the execute contract: rank the tallies, determine N, pick
/// winners. Fails on an empty tally set or too few voted companies, leaving
/// the caller's transaction to abort.
pub fn decide(
    tallies: Vec<VoteTally>,
    votes: &[Vote],
    final_size_bounds: SizeBounds,
) -> Result<RebalanceDecision, IndexpoolError> {
    if tallies.is_empty() {
        return Err(IndexpoolError::validation(
            "no votes have been cast for this index",
        ));
    }
    let distinct = tallies.len();
    let sizes = ballot_sizes_per_user(votes);
    let target_count = target_company_count(&sizes, final_size_bounds, distinct)?;
    let winners = select_winners(tallies, target_count);
    Ok(RebalanceDecision {
        target_count,
        winners,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::company::Sector;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn bounds(min: u32, max: u32) -> SizeBounds {
        SizeBounds::new(min, max).unwrap()
    }

    fn vote(user: &str, company_id: i64) -> Vote {
        Vote {
            id: 0,
            user_id: user.into(),
            index_id: 1,
            investment_id: 1,
            company_id,
            weight: dec!(100),
            created_at: Utc.with_ymd_and_hms(2026, 1, 12, 0, 0, 0).unwrap(),
        }
    }

    fn tally(id: i64, company_id: i64, weight: Decimal) -> VoteTally {
        VoteTally {
            id,
            index_id: 1,
            company_id,
            total_weight: weight,
            vote_count: 1,
        }
    }

    fn company(id: i64, price: Decimal) -> Company {
        Company {
            id,
            name: format!("Company {id}"),
            symbol: format!("C{id}"),
            sector: Sector::Other,
            current_price: Some(price),
            market_cap: None,
            is_active: true,
        }
    }

    #[test]
    fn ballot_sizes_count_distinct_companies_per_user() {
        let votes = vec![
            vote("alice", 1),
            vote("alice", 2),
            vote("alice", 2),
            vote("bob", 3),
        ];
        let mut sizes = ballot_sizes_per_user(&votes);
        sizes.sort();
        assert_eq!(sizes, vec![1, 2]);
    }

    #[test]
    fn n_follows_the_mode_of_ballot_sizes() {
        // 3 users voted for 5 companies, 1 user voted for 3.
        let sizes = vec![5, 5, 5, 3];
        assert_eq!(target_company_count(&sizes, bounds(3, 10), 8).unwrap(), 5);
    }

    #[test]
    fn n_is_clamped_to_final_size_bounds() {
        assert_eq!(target_company_count(&[2, 2, 2], bounds(3, 10), 8).unwrap(), 3);
        assert_eq!(
            target_company_count(&[15, 15], bounds(3, 10), 20).unwrap(),
            10
        );
    }

    #[test]
    fn n_is_capped_by_distinct_voted_companies() {
        assert_eq!(target_company_count(&[8, 8], bounds(3, 10), 5).unwrap(), 5);
    }

    #[test]
    fn fails_when_too_few_companies_received_votes() {
        let err = target_company_count(&[3, 3], bounds(5, 10), 4).unwrap_err();
        assert!(err.to_string().contains("need at least 5"));
    }

    #[test]
    fn mode_tie_resolves_to_smaller_ballot() {
        // Two users voted 4, two voted 6: conservative pick is 4.
        assert_eq!(target_company_count(&[4, 6, 4, 6], bounds(3, 10), 9).unwrap(), 4);
    }

    #[test]
    fn winners_are_top_n_by_weight_with_stable_ties() {
        let tallies = vec![
            tally(1, 10, dec!(300)),
            tally(2, 20, dec!(500)),
            tally(3, 30, dec!(300)),
            tally(4, 40, dec!(100)),
        ];
        assert_eq!(select_winners(tallies, 3), vec![20, 10, 30]);
    }

    #[test]
    fn equal_weight_allocation_scenario() {
        // 1000 across 4 winners: each position 250.00 at weight 25.00.
        let winners = vec![
            company(1, dec!(125)),
            company(2, dec!(50)),
            company(3, dec!(10)),
            company(4, dec!(2.50)),
        ];
        let drafts = allocate_equal_weight(dec!(1000), &winners);
        assert_eq!(drafts.len(), 4);
        for draft in &drafts {
            assert_eq!(draft.amount, dec!(250.00));
            assert_eq!(draft.weight, dec!(25.00));
        }
        assert_eq!(drafts[0].quantity, dec!(2));
        assert_eq!(drafts[3].quantity, dec!(100));
    }

    #[test]
    fn allocation_with_null_price_keeps_amount_and_weight() {
        let mut winners = vec![
            company(1, dec!(10)),
            company(2, dec!(10)),
            company(3, dec!(10)),
            company(4, dec!(10)),
        ];
        winners[2].current_price = None;
        let drafts = allocate_equal_weight(dec!(1000), &winners);
        assert_eq!(drafts[2].quantity, dec!(0));
        assert_eq!(drafts[2].amount, dec!(250.00));
        assert_eq!(drafts[2].weight, dec!(25.00));
        // Other positions unaffected.
        assert_eq!(drafts[0].quantity, dec!(25));
    }

    #[test]
    fn decide_fails_with_no_votes() {
        let err = decide(Vec::new(), &[], bounds(3, 10)).unwrap_err();
        assert!(err.to_string().contains("no votes"));
    }

    #[test]
    fn decide_selects_mode_sized_winner_set() {
        let mut votes = Vec::new();
        let mut tallies = Vec::new();
        // Users a, b, c vote for 5 companies each; d votes for 3.
        for (row, company_id) in (1..=8).enumerate() {
            tallies.push(tally(row as i64 + 1, company_id, dec!(100) * Decimal::from(9 - company_id)));
        }
        for user in ["a", "b", "c"] {
            for company_id in 1..=5 {
                votes.push(vote(user, company_id));
            }
        }
        for company_id in 6..=8 {
            votes.push(vote("d", company_id));
        }

        let decision = decide(tallies, &votes, bounds(3, 10)).unwrap();
        assert_eq!(decision.target_count, 5);
        assert_eq!(decision.winners, vec![1, 2, 3, 4, 5]);
    }
}
