#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use indexpool::adapters::sqlite_adapter::SqliteAdapter;
use indexpool::domain::company::{NewCompany, Sector};
use indexpool::domain::index::{Index, NewIndex, Schedule, SizeBounds};
use indexpool::domain::investment::Investment;
use indexpool::domain::voting::Ballot;
use indexpool::ports::store_port::StorePort;

/// During the investment window.
pub fn t_invest() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// After the investment window has closed.
pub fn t_vote() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 2, 12, 0, 0).unwrap()
}

/// Past the 12-month lock on investments made at [`t_invest`].
pub fn t_after_lock() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2027, 3, 15, 12, 0, 0).unwrap()
}

pub fn store() -> SqliteAdapter {
    let adapter = SqliteAdapter::in_memory().unwrap();
    adapter.initialize_schema().unwrap();
    adapter
}

/// Insert companies with the given symbols and prices; returns ids in
/// symbol-sorted order (the adapter lists by symbol).
pub fn seed_companies(adapter: &SqliteAdapter, specs: &[(&str, Decimal)]) -> Vec<i64> {
    let companies: Vec<NewCompany> = specs
        .iter()
        .map(|(symbol, price)| NewCompany {
            name: format!("{symbol} Corp"),
            symbol: symbol.to_string(),
            sector: Sector::Technology,
            current_price: Some(*price),
            market_cap: None,
        })
        .collect();
    adapter.upsert_companies(&companies).unwrap();
    adapter
        .list_companies()
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect()
}

/// Create an index with a Feb-May 2026 schedule, attach the given companies,
/// and activate it.
pub fn open_index(
    adapter: &SqliteAdapter,
    company_ids: &[i64],
    ballot_bounds: (u32, u32),
    final_size_bounds: Option<(u32, u32)>,
) -> Index {
    let schedule = Schedule::new(
        Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2026, 4, 2, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap(),
    )
    .unwrap();
    let new_index = NewIndex {
        name: "Community Tech".into(),
        description: "pooled technology picks".into(),
        company_bounds: SizeBounds::new(1, 50).unwrap(),
        ballot_bounds: SizeBounds::new(ballot_bounds.0, ballot_bounds.1).unwrap(),
        final_size_bounds: final_size_bounds
            .map(|(min, max)| SizeBounds::new(min, max).unwrap()),
        schedule,
        lock_period_months: 12,
    };
    let index = adapter.create_index(&new_index, t_invest()).unwrap();
    adapter
        .set_index_companies(index.id, company_ids, t_invest())
        .unwrap();
    adapter.activate_index(index.id, t_invest()).unwrap()
}

/// Deposit credits and invest them in one step.
pub fn invest(
    adapter: &SqliteAdapter,
    user: &str,
    index_id: i64,
    amount: Decimal,
) -> Investment {
    adapter.deposit(user, amount).unwrap();
    adapter
        .create_investment(user, index_id, amount, t_invest())
        .unwrap()
}

pub fn ballot(user: &str, index_id: i64, investment_id: i64, company_ids: &[i64]) -> Ballot {
    Ballot {
        user_id: user.to_string(),
        index_id,
        investment_id,
        company_ids: company_ids.to_vec(),
    }
}
