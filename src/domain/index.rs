//! Index entity and its lifecycle state machine.
//!
//! An index moves DRAFT -> ACTIVE -> VOTING -> EXECUTED, with ARCHIVED as an
//! absorbing administrative end state. Every transition guard is a pure
//! function here; the store adapter wraps them in a transaction so the status
//! check doubles as optimistic concurrency control.

use chrono::{DateTime, Utc};

use super::error::IndexpoolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    Draft,
    Active,
    Voting,
    Executed,
    Archived,
}

impl IndexStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexStatus::Draft => "DRAFT",
            IndexStatus::Active => "ACTIVE",
            IndexStatus::Voting => "VOTING",
            IndexStatus::Executed => "EXECUTED",
            IndexStatus::Archived => "ARCHIVED",
        }
    }

    pub fn parse(s: &str) -> Result<IndexStatus, IndexpoolError> {
        match s {
            "DRAFT" => Ok(IndexStatus::Draft),
            "ACTIVE" => Ok(IndexStatus::Active),
            "VOTING" => Ok(IndexStatus::Voting),
            "EXECUTED" => Ok(IndexStatus::Executed),
            "ARCHIVED" => Ok(IndexStatus::Archived),
            other => Err(IndexpoolError::validation(format!(
                "unknown index status: {other}"
            ))),
        }
    }
}

/// An inclusive `[min, max]` size window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeBounds {
    pub min: u32,
    pub max: u32,
}

impl SizeBounds {
    pub fn new(min: u32, max: u32) -> Result<SizeBounds, IndexpoolError> {
        if min < 1 {
            return Err(IndexpoolError::validation("size bounds minimum must be at least 1"));
        }
        if min > max {
            return Err(IndexpoolError::validation(format!(
                "size bounds minimum {min} exceeds maximum {max}"
            )));
        }
        Ok(SizeBounds { min, max })
    }

    pub fn contains(&self, n: usize) -> bool {
        n >= self.min as usize && n <= self.max as usize
    }

    pub fn clamp(&self, n: usize) -> usize {
        n.clamp(self.min as usize, self.max as usize)
    }
}

/// The four scheduling timestamps of an index, in strictly increasing order:
/// investment window, then voting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub investment_start: DateTime<Utc>,
    pub investment_end: DateTime<Utc>,
    pub voting_start: DateTime<Utc>,
    pub voting_end: DateTime<Utc>,
}

impl Schedule {
    pub fn new(
        investment_start: DateTime<Utc>,
        investment_end: DateTime<Utc>,
        voting_start: DateTime<Utc>,
        voting_end: DateTime<Utc>,
    ) -> Result<Schedule, IndexpoolError> {
        if investment_end <= investment_start {
            return Err(IndexpoolError::validation(
                "investment end date must be after investment start date",
            ));
        }
        if voting_start <= investment_end {
            return Err(IndexpoolError::validation(
                "voting start date must be after investment end date",
            ));
        }
        if voting_end <= voting_start {
            return Err(IndexpoolError::validation(
                "voting end date must be after voting start date",
            ));
        }
        Ok(Schedule {
            investment_start,
            investment_end,
            voting_start,
            voting_end,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub status: IndexStatus,
    /// Capacity of the membership set, enforced on activation.
    pub company_bounds: SizeBounds,
    /// Per-user ballot size window, enforced on ballot submission.
    pub ballot_bounds: SizeBounds,
    /// Bounds on the executed index size. Defaults to `ballot_bounds` at
    /// creation, but the two are independently configurable.
    pub final_size_bounds: SizeBounds,
    pub schedule: Schedule,
    pub lock_period_months: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for creating a new index (always born in DRAFT).
#[derive(Debug, Clone)]
pub struct NewIndex {
    pub name: String,
    pub description: String,
    pub company_bounds: SizeBounds,
    pub ballot_bounds: SizeBounds,
    /// `None` reuses `ballot_bounds`, the historical behavior.
    pub final_size_bounds: Option<SizeBounds>,
    pub schedule: Schedule,
    pub lock_period_months: u32,
}

impl NewIndex {
    pub fn validate(&self) -> Result<(), IndexpoolError> {
        if self.name.trim().is_empty() {
            return Err(IndexpoolError::validation("index name must not be empty"));
        }
        if self.lock_period_months < 1 {
            return Err(IndexpoolError::validation(
                "lock period must be at least one month",
            ));
        }
        Ok(())
    }
}

impl Index {
    fn require_status(&self, expected: IndexStatus, action: &str) -> Result<(), IndexpoolError> {
        if self.status != expected {
            return Err(IndexpoolError::validation(format!(
                "cannot {action}: index is {}, expected {}",
                self.status.as_str(),
                expected.as_str()
            )));
        }
        Ok(())
    }

    /// DRAFT -> ACTIVE. The membership set must fit the capacity bounds.
    pub fn activate(&mut self, member_count: usize) -> Result<(), IndexpoolError> {
        self.require_status(IndexStatus::Draft, "activate")?;
        if !self.company_bounds.contains(member_count) {
            return Err(IndexpoolError::validation(format!(
                "index has {member_count} companies, needs between {} and {}",
                self.company_bounds.min, self.company_bounds.max
            )));
        }
        self.status = IndexStatus::Active;
        Ok(())
    }

    /// ACTIVE -> VOTING, only once the investment window has closed.
    pub fn start_voting(&mut self, now: DateTime<Utc>) -> Result<(), IndexpoolError> {
        self.require_status(IndexStatus::Active, "start voting")?;
        if now < self.schedule.investment_end {
            return Err(IndexpoolError::validation(
                "investment period has not ended yet",
            ));
        }
        self.status = IndexStatus::Voting;
        Ok(())
    }

    /// VOTING -> EXECUTED. The rebalancing engine calls this as its last step.
    pub fn mark_executed(&mut self) -> Result<(), IndexpoolError> {
        self.require_status(IndexStatus::Voting, "execute")?;
        self.status = IndexStatus::Executed;
        Ok(())
    }

    /// Any non-ARCHIVED state -> ARCHIVED.
    pub fn archive(&mut self) -> Result<(), IndexpoolError> {
        if self.status == IndexStatus::Archived {
            return Err(IndexpoolError::validation("index is already archived"));
        }
        self.status = IndexStatus::Archived;
        Ok(())
    }

    /// Administrative reset to DRAFT. Archival is final.
    pub fn set_draft(&mut self) -> Result<(), IndexpoolError> {
        if self.status == IndexStatus::Archived {
            return Err(IndexpoolError::validation(
                "archived indexes cannot be reset to draft",
            ));
        }
        self.status = IndexStatus::Draft;
        Ok(())
    }

    /// Whether vote tallies may be read: voting has started or concluded.
    pub fn results_visible(&self) -> bool {
        matches!(
            self.status,
            IndexStatus::Voting | IndexStatus::Executed | IndexStatus::Archived
        )
    }

    pub fn accepts_investments(&self, now: DateTime<Utc>) -> Result<(), IndexpoolError> {
        self.require_status(IndexStatus::Active, "invest")?;
        if now > self.schedule.investment_end {
            return Err(IndexpoolError::validation("investment period has ended"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, day, 12, 0, 0).unwrap()
    }

    pub(crate) fn sample_schedule() -> Schedule {
        Schedule::new(ts(1), ts(10), ts(11), ts(20)).unwrap()
    }

    fn sample_index(status: IndexStatus) -> Index {
        Index {
            id: 1,
            name: "Community Tech 10".into(),
            description: "Top community-voted tech companies".into(),
            status,
            company_bounds: SizeBounds::new(3, 50).unwrap(),
            ballot_bounds: SizeBounds::new(3, 10).unwrap(),
            final_size_bounds: SizeBounds::new(3, 10).unwrap(),
            schedule: sample_schedule(),
            lock_period_months: 12,
            created_at: ts(1),
            updated_at: ts(1),
        }
    }

    #[test]
    fn schedule_rejects_out_of_order_dates() {
        assert!(Schedule::new(ts(10), ts(1), ts(11), ts(20)).is_err());
        assert!(Schedule::new(ts(1), ts(10), ts(10), ts(20)).is_err());
        assert!(Schedule::new(ts(1), ts(10), ts(11), ts(11)).is_err());
    }

    #[test]
    fn size_bounds_validation() {
        assert!(SizeBounds::new(0, 5).is_err());
        assert!(SizeBounds::new(6, 5).is_err());
        let bounds = SizeBounds::new(3, 10).unwrap();
        assert!(bounds.contains(3) && bounds.contains(10));
        assert!(!bounds.contains(2) && !bounds.contains(11));
        assert_eq!(bounds.clamp(1), 3);
        assert_eq!(bounds.clamp(99), 10);
        assert_eq!(bounds.clamp(7), 7);
    }

    #[test]
    fn activate_requires_draft() {
        let mut index = sample_index(IndexStatus::Draft);
        index.activate(5).unwrap();
        assert_eq!(index.status, IndexStatus::Active);

        for status in [IndexStatus::Active, IndexStatus::Voting, IndexStatus::Archived] {
            let mut index = sample_index(status);
            assert!(index.activate(5).is_err());
            assert_eq!(index.status, status, "failed guard must not change status");
        }
    }

    #[test]
    fn activate_enforces_capacity_bounds() {
        let mut index = sample_index(IndexStatus::Draft);
        assert!(index.activate(2).is_err());
        assert_eq!(index.status, IndexStatus::Draft);
        assert!(index.activate(51).is_err());
        index.activate(3).unwrap();
    }

    #[test]
    fn start_voting_requires_closed_investment_window() {
        let mut index = sample_index(IndexStatus::Active);
        assert!(index.start_voting(ts(5)).is_err());
        assert_eq!(index.status, IndexStatus::Active);
        index.start_voting(ts(10)).unwrap();
        assert_eq!(index.status, IndexStatus::Voting);
    }

    #[test]
    fn start_voting_requires_active() {
        let mut index = sample_index(IndexStatus::Draft);
        assert!(index.start_voting(ts(15)).is_err());
        assert_eq!(index.status, IndexStatus::Draft);
    }

    #[test]
    fn mark_executed_only_from_voting() {
        let mut index = sample_index(IndexStatus::Voting);
        index.mark_executed().unwrap();
        assert_eq!(index.status, IndexStatus::Executed);

        let mut index = sample_index(IndexStatus::Active);
        assert!(index.mark_executed().is_err());
        assert_eq!(index.status, IndexStatus::Active);
    }

    #[test]
    fn archive_is_absorbing() {
        let mut index = sample_index(IndexStatus::Executed);
        index.archive().unwrap();
        assert_eq!(index.status, IndexStatus::Archived);
        assert!(index.archive().is_err());
        assert!(index.set_draft().is_err());
        assert_eq!(index.status, IndexStatus::Archived);
    }

    #[test]
    fn set_draft_resets_non_archived() {
        let mut index = sample_index(IndexStatus::Voting);
        index.set_draft().unwrap();
        assert_eq!(index.status, IndexStatus::Draft);
    }

    #[test]
    fn results_visible_gating() {
        assert!(!sample_index(IndexStatus::Draft).results_visible());
        assert!(!sample_index(IndexStatus::Active).results_visible());
        assert!(sample_index(IndexStatus::Voting).results_visible());
        assert!(sample_index(IndexStatus::Executed).results_visible());
        assert!(sample_index(IndexStatus::Archived).results_visible());
    }

    #[test]
    fn accepts_investments_inside_window_only() {
        let index = sample_index(IndexStatus::Active);
        assert!(index.accepts_investments(ts(5)).is_ok());
        assert!(index.accepts_investments(ts(11)).is_err());
        let draft = sample_index(IndexStatus::Draft);
        assert!(draft.accepts_investments(ts(5)).is_err());
    }

    #[test]
    fn status_round_trip() {
        for status in [
            IndexStatus::Draft,
            IndexStatus::Active,
            IndexStatus::Voting,
            IndexStatus::Executed,
            IndexStatus::Archived,
        ] {
            assert_eq!(IndexStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(IndexStatus::parse("CLOSED").is_err());
    }
}
