//! SQLite store adapter.
//!
//! Every mutating operation runs in a single transaction, so the status
//! guards double as optimistic concurrency control and derived aggregates
//! (vote tallies, positions, current values) can never be observed
//! half-applied. Decimals are stored as TEXT and compared in Rust.

use std::collections::HashSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use log::info;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{Connection, Row, params};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::account::Account;
use crate::domain::company::{Company, NewCompany, PriceUpdate, Sector};
use crate::domain::error::IndexpoolError;
use crate::domain::index::{Index, IndexStatus, NewIndex, Schedule, SizeBounds};
use crate::domain::investment::{
    Investment, InvestmentStatus, Position, PositionDraft, default_positions,
};
use crate::domain::portfolio::{self, PortfolioSummary};
use crate::domain::rebalance::{self, allocate_equal_weight};
use crate::domain::risk::LedgerSnapshot;
use crate::domain::voting::{
    Ballot, Vote, VoteTally, rank_tallies, validate_ballot, weight_per_company,
};
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::{ExecutionReport, RankedCompany, StorePort, WithdrawalReceipt};

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_err(e: r2d2::Error) -> IndexpoolError {
    IndexpoolError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> IndexpoolError {
    IndexpoolError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn dec_col(row: &Row, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn opt_dec_col(row: &Row, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        Decimal::from_str(&s)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn dt_col(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn conversion_err(idx: usize, e: IndexpoolError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn map_company(row: &Row) -> rusqlite::Result<Company> {
    let sector: String = row.get(3)?;
    Ok(Company {
        id: row.get(0)?,
        name: row.get(1)?,
        symbol: row.get(2)?,
        sector: Sector::parse(&sector),
        current_price: opt_dec_col(row, 4)?,
        market_cap: opt_dec_col(row, 5)?,
        is_active: row.get(6)?,
    })
}

const COMPANY_COLS: &str = "id, name, symbol, sector, current_price, market_cap, is_active";

fn map_index(row: &Row) -> rusqlite::Result<Index> {
    let status: String = row.get(3)?;
    let company_bounds = SizeBounds::new(row.get(4)?, row.get(5)?).map_err(|e| conversion_err(4, e))?;
    let ballot_bounds = SizeBounds::new(row.get(6)?, row.get(7)?).map_err(|e| conversion_err(6, e))?;
    let final_size_bounds =
        SizeBounds::new(row.get(8)?, row.get(9)?).map_err(|e| conversion_err(8, e))?;
    let schedule = Schedule::new(
        dt_col(row, 10)?,
        dt_col(row, 11)?,
        dt_col(row, 12)?,
        dt_col(row, 13)?,
    )
    .map_err(|e| conversion_err(10, e))?;
    Ok(Index {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        status: IndexStatus::parse(&status).map_err(|e| conversion_err(3, e))?,
        company_bounds,
        ballot_bounds,
        final_size_bounds,
        schedule,
        lock_period_months: row.get(14)?,
        created_at: dt_col(row, 15)?,
        updated_at: dt_col(row, 16)?,
    })
}

const INDEX_COLS: &str = "id, name, description, status, min_companies, max_companies, \
     min_ballot, max_ballot, min_final, max_final, investment_start, investment_end, \
     voting_start, voting_end, lock_period_months, created_at, updated_at";

fn map_investment(row: &Row) -> rusqlite::Result<Investment> {
    let status: String = row.get(7)?;
    Ok(Investment {
        id: row.get(0)?,
        user_id: row.get(1)?,
        index_id: row.get(2)?,
        amount: dec_col(row, 3)?,
        current_value: dec_col(row, 4)?,
        profit_loss: dec_col(row, 5)?,
        profit_loss_pct: dec_col(row, 6)?,
        status: InvestmentStatus::parse(&status).map_err(|e| conversion_err(7, e))?,
        has_voted: row.get(8)?,
        transaction_id: row.get(9)?,
        lock_period_end: dt_col(row, 10)?,
        invested_at: dt_col(row, 11)?,
        updated_at: dt_col(row, 12)?,
    })
}

const INVESTMENT_COLS: &str = "id, user_id, index_id, amount, current_value, profit_loss, \
     profit_loss_pct, status, has_voted, transaction_id, lock_period_end, invested_at, updated_at";

fn map_position(row: &Row) -> rusqlite::Result<Position> {
    Ok(Position {
        id: row.get(0)?,
        investment_id: row.get(1)?,
        company_id: row.get(2)?,
        amount: dec_col(row, 3)?,
        quantity: dec_col(row, 4)?,
        purchase_price: dec_col(row, 5)?,
        current_price: dec_col(row, 6)?,
        weight: dec_col(row, 7)?,
    })
}

const POSITION_COLS: &str =
    "id, investment_id, company_id, amount, quantity, purchase_price, current_price, weight";

fn map_vote(row: &Row) -> rusqlite::Result<Vote> {
    Ok(Vote {
        id: row.get(0)?,
        user_id: row.get(1)?,
        index_id: row.get(2)?,
        investment_id: row.get(3)?,
        company_id: row.get(4)?,
        weight: dec_col(row, 5)?,
        created_at: dt_col(row, 6)?,
    })
}

fn map_tally(row: &Row) -> rusqlite::Result<VoteTally> {
    Ok(VoteTally {
        id: row.get(0)?,
        index_id: row.get(1)?,
        company_id: row.get(2)?,
        total_weight: dec_col(row, 3)?,
        vote_count: row.get(4)?,
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, IndexpoolError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| IndexpoolError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    /// Single-connection in-memory store for tests.
    pub fn in_memory() -> Result<Self, IndexpoolError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(pool_err)?;
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, IndexpoolError> {
        self.pool.get().map_err(pool_err)
    }

    /// Direct connection access, for tests that need to inspect or shape the
    /// database underneath the adapter.
    pub fn raw_connection(
        &self,
    ) -> Result<PooledConnection<SqliteConnectionManager>, IndexpoolError> {
        self.conn()
    }

    pub fn initialize_schema(&self) -> Result<(), IndexpoolError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS companies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                symbol TEXT NOT NULL UNIQUE,
                sector TEXT NOT NULL,
                current_price TEXT,
                market_cap TEXT,
                is_active INTEGER NOT NULL DEFAULT 1
            );
            CREATE TABLE IF NOT EXISTS accounts (
                user_id TEXT PRIMARY KEY,
                credits TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS indexes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                status TEXT NOT NULL,
                min_companies INTEGER NOT NULL,
                max_companies INTEGER NOT NULL,
                min_ballot INTEGER NOT NULL,
                max_ballot INTEGER NOT NULL,
                min_final INTEGER NOT NULL,
                max_final INTEGER NOT NULL,
                investment_start TEXT NOT NULL,
                investment_end TEXT NOT NULL,
                voting_start TEXT NOT NULL,
                voting_end TEXT NOT NULL,
                lock_period_months INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS index_companies (
                index_id INTEGER NOT NULL REFERENCES indexes(id),
                company_id INTEGER NOT NULL REFERENCES companies(id),
                PRIMARY KEY (index_id, company_id)
            );
            CREATE TABLE IF NOT EXISTS investments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                index_id INTEGER NOT NULL REFERENCES indexes(id),
                amount TEXT NOT NULL,
                current_value TEXT NOT NULL,
                profit_loss TEXT NOT NULL,
                profit_loss_pct TEXT NOT NULL,
                status TEXT NOT NULL,
                has_voted INTEGER NOT NULL DEFAULT 0,
                transaction_id TEXT NOT NULL UNIQUE,
                lock_period_end TEXT NOT NULL,
                invested_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_investments_user_status
                ON investments(user_id, status);
            CREATE INDEX IF NOT EXISTS idx_investments_index_status
                ON investments(index_id, status);
            CREATE TABLE IF NOT EXISTS positions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                investment_id INTEGER NOT NULL REFERENCES investments(id),
                company_id INTEGER NOT NULL REFERENCES companies(id),
                amount TEXT NOT NULL,
                quantity TEXT NOT NULL,
                purchase_price TEXT NOT NULL,
                current_price TEXT NOT NULL,
                weight TEXT NOT NULL,
                UNIQUE (investment_id, company_id)
            );
            CREATE TABLE IF NOT EXISTS votes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                index_id INTEGER NOT NULL REFERENCES indexes(id),
                investment_id INTEGER NOT NULL REFERENCES investments(id),
                company_id INTEGER NOT NULL REFERENCES companies(id),
                weight TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (user_id, investment_id, company_id)
            );
            CREATE INDEX IF NOT EXISTS idx_votes_index_company
                ON votes(index_id, company_id);
            CREATE TABLE IF NOT EXISTS company_vote_counts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                index_id INTEGER NOT NULL REFERENCES indexes(id),
                company_id INTEGER NOT NULL REFERENCES companies(id),
                total_weight TEXT NOT NULL,
                vote_count INTEGER NOT NULL,
                last_updated TEXT NOT NULL,
                UNIQUE (index_id, company_id)
            );",
        )
        .map_err(query_err)?;
        Ok(())
    }
}

// Internal loaders shared between pooled connections and open transactions.

fn load_index(conn: &Connection, index_id: i64) -> Result<Index, IndexpoolError> {
    let sql = format!("SELECT {INDEX_COLS} FROM indexes WHERE id = ?1");
    conn.query_row(&sql, params![index_id], map_index)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => IndexpoolError::not_found("index", index_id),
            other => query_err(other),
        })
}

fn load_investment(conn: &Connection, investment_id: i64) -> Result<Investment, IndexpoolError> {
    let sql = format!("SELECT {INVESTMENT_COLS} FROM investments WHERE id = ?1");
    conn.query_row(&sql, params![investment_id], map_investment)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                IndexpoolError::not_found("investment", investment_id)
            }
            other => query_err(other),
        })
}

fn load_member_ids(conn: &Connection, index_id: i64) -> Result<Vec<i64>, IndexpoolError> {
    let mut stmt = conn
        .prepare("SELECT company_id FROM index_companies WHERE index_id = ?1 ORDER BY rowid")
        .map_err(query_err)?;
    let ids = stmt
        .query_map(params![index_id], |row| row.get(0))
        .map_err(query_err)?
        .collect::<rusqlite::Result<Vec<i64>>>()
        .map_err(query_err)?;
    Ok(ids)
}

fn load_companies_by_ids(
    conn: &Connection,
    ids: &[i64],
) -> Result<Vec<Company>, IndexpoolError> {
    let sql = format!("SELECT {COMPANY_COLS} FROM companies WHERE id = ?1");
    let mut stmt = conn.prepare(&sql).map_err(query_err)?;
    let mut companies = Vec::with_capacity(ids.len());
    for id in ids {
        let company = stmt
            .query_row(params![id], map_company)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => IndexpoolError::not_found("company", *id),
                other => query_err(other),
            })?;
        companies.push(company);
    }
    Ok(companies)
}

fn load_positions(conn: &Connection, investment_id: i64) -> Result<Vec<Position>, IndexpoolError> {
    let sql = format!(
        "SELECT {POSITION_COLS} FROM positions WHERE investment_id = ?1 ORDER BY id"
    );
    let mut stmt = conn.prepare(&sql).map_err(query_err)?;
    let positions = stmt
        .query_map(params![investment_id], map_position)
        .map_err(query_err)?
        .collect::<rusqlite::Result<Vec<Position>>>()
        .map_err(query_err)?;
    Ok(positions)
}

fn load_tallies(conn: &Connection, index_id: i64) -> Result<Vec<VoteTally>, IndexpoolError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, index_id, company_id, total_weight, vote_count
             FROM company_vote_counts WHERE index_id = ?1",
        )
        .map_err(query_err)?;
    let tallies = stmt
        .query_map(params![index_id], map_tally)
        .map_err(query_err)?
        .collect::<rusqlite::Result<Vec<VoteTally>>>()
        .map_err(query_err)?;
    Ok(tallies)
}

fn load_votes_for_index(conn: &Connection, index_id: i64) -> Result<Vec<Vote>, IndexpoolError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, user_id, index_id, investment_id, company_id, weight, created_at
             FROM votes WHERE index_id = ?1 ORDER BY id",
        )
        .map_err(query_err)?;
    let votes = stmt
        .query_map(params![index_id], map_vote)
        .map_err(query_err)?
        .collect::<rusqlite::Result<Vec<Vote>>>()
        .map_err(query_err)?;
    Ok(votes)
}

fn load_account(conn: &Connection, user_id: &str) -> Result<Account, IndexpoolError> {
    let credits = conn
        .query_row(
            "SELECT credits FROM accounts WHERE user_id = ?1",
            params![user_id],
            |row| dec_col(row, 0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(query_err(other)),
        })?;
    Ok(Account {
        user_id: user_id.to_string(),
        credits: credits.unwrap_or(Decimal::ZERO),
    })
}

fn save_account(conn: &Connection, account: &Account) -> Result<(), IndexpoolError> {
    conn.execute(
        "INSERT INTO accounts (user_id, credits) VALUES (?1, ?2)
         ON CONFLICT(user_id) DO UPDATE SET credits = excluded.credits",
        params![account.user_id, account.credits.to_string()],
    )
    .map_err(query_err)?;
    Ok(())
}

fn save_index_status(
    conn: &Connection,
    index: &Index,
    now: DateTime<Utc>,
) -> Result<(), IndexpoolError> {
    conn.execute(
        "UPDATE indexes SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![index.status.as_str(), now.to_rfc3339(), index.id],
    )
    .map_err(query_err)?;
    Ok(())
}

fn save_investment(
    conn: &Connection,
    inv: &Investment,
    now: DateTime<Utc>,
) -> Result<(), IndexpoolError> {
    conn.execute(
        "UPDATE investments SET current_value = ?1, profit_loss = ?2, profit_loss_pct = ?3,
                status = ?4, has_voted = ?5, updated_at = ?6 WHERE id = ?7",
        params![
            inv.current_value.to_string(),
            inv.profit_loss.to_string(),
            inv.profit_loss_pct.to_string(),
            inv.status.as_str(),
            inv.has_voted,
            now.to_rfc3339(),
            inv.id
        ],
    )
    .map_err(query_err)?;
    Ok(())
}

fn insert_position_drafts(
    conn: &Connection,
    investment_id: i64,
    drafts: &[PositionDraft],
) -> Result<(), IndexpoolError> {
    let mut stmt = conn
        .prepare(
            "INSERT INTO positions (investment_id, company_id, amount, quantity,
                    purchase_price, current_price, weight)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .map_err(query_err)?;
    for draft in drafts {
        stmt.execute(params![
            investment_id,
            draft.company_id,
            draft.amount.to_string(),
            draft.quantity.to_string(),
            draft.purchase_price.to_string(),
            draft.current_price.to_string(),
            draft.weight.to_string(),
        ])
        .map_err(query_err)?;
    }
    Ok(())
}

/// Re-aggregate the vote rows for one (index, company) pair into the
/// denormalized tally table. Pairs with no remaining votes lose their row so
/// they no longer count as "companies with votes".
fn recompute_vote_count(
    conn: &Connection,
    index_id: i64,
    company_id: i64,
    now: DateTime<Utc>,
) -> Result<(), IndexpoolError> {
    let mut stmt = conn
        .prepare("SELECT weight FROM votes WHERE index_id = ?1 AND company_id = ?2")
        .map_err(query_err)?;
    let weights = stmt
        .query_map(params![index_id, company_id], |row| dec_col(row, 0))
        .map_err(query_err)?
        .collect::<rusqlite::Result<Vec<Decimal>>>()
        .map_err(query_err)?;

    if weights.is_empty() {
        conn.execute(
            "DELETE FROM company_vote_counts WHERE index_id = ?1 AND company_id = ?2",
            params![index_id, company_id],
        )
        .map_err(query_err)?;
        return Ok(());
    }

    let total: Decimal = weights.iter().sum();
    conn.execute(
        "INSERT INTO company_vote_counts (index_id, company_id, total_weight, vote_count, last_updated)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(index_id, company_id) DO UPDATE SET
             total_weight = excluded.total_weight,
             vote_count = excluded.vote_count,
             last_updated = excluded.last_updated",
        params![
            index_id,
            company_id,
            total.to_string(),
            weights.len() as u32,
            now.to_rfc3339()
        ],
    )
    .map_err(query_err)?;
    Ok(())
}

/// Delete and rebuild one investment's positions from an allocation plan,
/// then refresh the derived value fields.
fn apply_allocation(
    conn: &Connection,
    inv: &mut Investment,
    drafts: &[PositionDraft],
    now: DateTime<Utc>,
) -> Result<(), IndexpoolError> {
    conn.execute(
        "DELETE FROM positions WHERE investment_id = ?1",
        params![inv.id],
    )
    .map_err(query_err)?;
    insert_position_drafts(conn, inv.id, drafts)?;

    let positions = load_positions(conn, inv.id)?;
    inv.revalue(&positions);
    inv.status = InvestmentStatus::Active;
    save_investment(conn, inv, now)
}

impl StorePort for SqliteAdapter {
    fn upsert_companies(&self, companies: &[NewCompany]) -> Result<usize, IndexpoolError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO companies (name, symbol, sector, current_price, market_cap, is_active)
                     VALUES (?1, ?2, ?3, ?4, ?5, 1)
                     ON CONFLICT(symbol) DO UPDATE SET
                         name = excluded.name,
                         sector = excluded.sector,
                         current_price = excluded.current_price,
                         market_cap = excluded.market_cap",
                )
                .map_err(query_err)?;
            for company in companies {
                stmt.execute(params![
                    company.name,
                    company.symbol,
                    company.sector.as_str(),
                    company.current_price.map(|d| d.to_string()),
                    company.market_cap.map(|d| d.to_string()),
                ])
                .map_err(query_err)?;
            }
        }
        tx.commit().map_err(query_err)?;
        Ok(companies.len())
    }

    fn list_companies(&self) -> Result<Vec<Company>, IndexpoolError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {COMPANY_COLS} FROM companies ORDER BY symbol");
        let mut stmt = conn.prepare(&sql).map_err(query_err)?;
        let companies = stmt
            .query_map([], map_company)
            .map_err(query_err)?
            .collect::<rusqlite::Result<Vec<Company>>>()
            .map_err(query_err)?;
        Ok(companies)
    }

    fn update_prices(&self, updates: &[PriceUpdate]) -> Result<usize, IndexpoolError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        let mut updated = 0;
        {
            let mut stmt = tx
                .prepare("UPDATE companies SET current_price = ?1 WHERE symbol = ?2")
                .map_err(query_err)?;
            for update in updates {
                if update.price < Decimal::ZERO {
                    return Err(IndexpoolError::validation(format!(
                        "negative price for {}",
                        update.symbol
                    )));
                }
                updated += stmt
                    .execute(params![update.price.to_string(), update.symbol])
                    .map_err(query_err)?;
            }
        }
        tx.commit().map_err(query_err)?;
        info!("applied {updated} price updates");
        Ok(updated)
    }

    fn deposit(&self, user_id: &str, amount: Decimal) -> Result<Decimal, IndexpoolError> {
        if amount <= Decimal::ZERO {
            return Err(IndexpoolError::validation("deposit amount must be positive"));
        }
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        let mut account = load_account(&tx, user_id)?;
        account.add_credits(amount);
        save_account(&tx, &account)?;
        tx.commit().map_err(query_err)?;
        Ok(account.credits)
    }

    fn balance(&self, user_id: &str) -> Result<Decimal, IndexpoolError> {
        let conn = self.conn()?;
        Ok(load_account(&conn, user_id)?.credits)
    }

    fn create_index(&self, new_index: &NewIndex, now: DateTime<Utc>) -> Result<Index, IndexpoolError> {
        new_index.validate()?;
        let final_bounds = new_index.final_size_bounds.unwrap_or(new_index.ballot_bounds);
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        tx.execute(
            "INSERT INTO indexes (name, description, status, min_companies, max_companies,
                    min_ballot, max_ballot, min_final, max_final, investment_start,
                    investment_end, voting_start, voting_end, lock_period_months,
                    created_at, updated_at)
             VALUES (?1, ?2, 'DRAFT', ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)",
            params![
                new_index.name,
                new_index.description,
                new_index.company_bounds.min,
                new_index.company_bounds.max,
                new_index.ballot_bounds.min,
                new_index.ballot_bounds.max,
                final_bounds.min,
                final_bounds.max,
                new_index.schedule.investment_start.to_rfc3339(),
                new_index.schedule.investment_end.to_rfc3339(),
                new_index.schedule.voting_start.to_rfc3339(),
                new_index.schedule.voting_end.to_rfc3339(),
                new_index.lock_period_months,
                now.to_rfc3339(),
            ],
        )
        .map_err(query_err)?;
        let id = tx.last_insert_rowid();
        let index = load_index(&tx, id)?;
        tx.commit().map_err(query_err)?;
        info!("created index {} ({})", index.id, index.name);
        Ok(index)
    }

    fn get_index(&self, index_id: i64) -> Result<Index, IndexpoolError> {
        let conn = self.conn()?;
        load_index(&conn, index_id)
    }

    fn list_indexes(&self, status: Option<IndexStatus>) -> Result<Vec<Index>, IndexpoolError> {
        let conn = self.conn()?;
        let (sql, args) = match status {
            Some(status) => (
                format!("SELECT {INDEX_COLS} FROM indexes WHERE status = ?1 ORDER BY id"),
                vec![status.as_str().to_string()],
            ),
            None => (
                format!("SELECT {INDEX_COLS} FROM indexes ORDER BY id"),
                Vec::new(),
            ),
        };
        let mut stmt = conn.prepare(&sql).map_err(query_err)?;
        let indexes = stmt
            .query_map(rusqlite::params_from_iter(args), map_index)
            .map_err(query_err)?
            .collect::<rusqlite::Result<Vec<Index>>>()
            .map_err(query_err)?;
        Ok(indexes)
    }

    fn set_index_companies(
        &self,
        index_id: i64,
        company_ids: &[i64],
        now: DateTime<Utc>,
    ) -> Result<(), IndexpoolError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        let index = load_index(&tx, index_id)?;
        if !matches!(index.status, IndexStatus::Draft | IndexStatus::Active) {
            return Err(IndexpoolError::validation(format!(
                "membership can only be edited in DRAFT or ACTIVE (status: {})",
                index.status.as_str()
            )));
        }
        // Once activated the index must keep a valid membership size.
        if index.status == IndexStatus::Active && !index.company_bounds.contains(company_ids.len()) {
            return Err(IndexpoolError::validation(format!(
                "index would have {} companies, needs between {} and {}",
                company_ids.len(),
                index.company_bounds.min,
                index.company_bounds.max
            )));
        }
        // Existence check up front so a bad id fails cleanly, not via FK noise.
        load_companies_by_ids(&tx, company_ids)?;
        tx.execute(
            "DELETE FROM index_companies WHERE index_id = ?1",
            params![index_id],
        )
        .map_err(query_err)?;
        {
            let mut stmt = tx
                .prepare("INSERT INTO index_companies (index_id, company_id) VALUES (?1, ?2)")
                .map_err(query_err)?;
            for company_id in company_ids {
                stmt.execute(params![index_id, company_id]).map_err(query_err)?;
            }
        }
        save_index_status(&tx, &index, now)?;
        tx.commit().map_err(query_err)?;
        Ok(())
    }

    fn index_company_ids(&self, index_id: i64) -> Result<Vec<i64>, IndexpoolError> {
        let conn = self.conn()?;
        load_index(&conn, index_id)?;
        load_member_ids(&conn, index_id)
    }

    fn activate_index(&self, index_id: i64, now: DateTime<Utc>) -> Result<Index, IndexpoolError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        let mut index = load_index(&tx, index_id)?;
        let member_count = load_member_ids(&tx, index_id)?.len();
        index.activate(member_count)?;
        save_index_status(&tx, &index, now)?;
        tx.commit().map_err(query_err)?;
        info!("index {index_id} activated with {member_count} companies");
        Ok(index)
    }

    fn start_voting(&self, index_id: i64, now: DateTime<Utc>) -> Result<Index, IndexpoolError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        let mut index = load_index(&tx, index_id)?;
        index.start_voting(now)?;
        // Flip in-flight capital to VOTED so portfolio aggregation still sees
        // it while plain investment actions are blocked.
        tx.execute(
            "UPDATE investments SET status = 'VOTED', updated_at = ?1
             WHERE index_id = ?2 AND status = 'ACTIVE'",
            params![now.to_rfc3339(), index_id],
        )
        .map_err(query_err)?;
        save_index_status(&tx, &index, now)?;
        tx.commit().map_err(query_err)?;
        info!("index {index_id} is now voting");
        Ok(index)
    }

    fn execute_index(
        &self,
        index_id: i64,
        now: DateTime<Utc>,
    ) -> Result<ExecutionReport, IndexpoolError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        let mut index = load_index(&tx, index_id)?;
        index.mark_executed()?;

        let tallies = load_tallies(&tx, index_id)?;
        let votes = load_votes_for_index(&tx, index_id)?;
        let decision = rebalance::decide(tallies, &votes, index.final_size_bounds)?;

        // Rewrite membership to exactly the winners, in rank order.
        tx.execute(
            "DELETE FROM index_companies WHERE index_id = ?1",
            params![index_id],
        )
        .map_err(query_err)?;
        {
            let mut stmt = tx
                .prepare("INSERT INTO index_companies (index_id, company_id) VALUES (?1, ?2)")
                .map_err(query_err)?;
            for company_id in &decision.winners {
                stmt.execute(params![index_id, company_id]).map_err(query_err)?;
            }
        }

        let winners = load_companies_by_ids(&tx, &decision.winners)?;

        let sql = format!(
            "SELECT {INVESTMENT_COLS} FROM investments WHERE index_id = ?1 AND status = 'VOTED'
             ORDER BY id"
        );
        let investments = {
            let mut stmt = tx.prepare(&sql).map_err(query_err)?;
            stmt.query_map(params![index_id], map_investment)
                .map_err(query_err)?
                .collect::<rusqlite::Result<Vec<Investment>>>()
                .map_err(query_err)?
        };

        let mut rebalanced = 0;
        for mut inv in investments {
            let drafts = allocate_equal_weight(inv.amount, &winners);
            apply_allocation(&tx, &mut inv, &drafts, now)?;
            rebalanced += 1;
        }

        save_index_status(&tx, &index, now)?;
        tx.commit().map_err(query_err)?;
        info!(
            "index {index_id} executed: {} winners, {rebalanced} investments rebalanced",
            decision.winners.len()
        );
        Ok(ExecutionReport {
            index,
            decision,
            investments_rebalanced: rebalanced,
        })
    }

    fn archive_index(&self, index_id: i64, now: DateTime<Utc>) -> Result<Index, IndexpoolError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        let mut index = load_index(&tx, index_id)?;
        index.archive()?;
        save_index_status(&tx, &index, now)?;
        tx.commit().map_err(query_err)?;
        Ok(index)
    }

    fn set_draft(&self, index_id: i64, now: DateTime<Utc>) -> Result<Index, IndexpoolError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        let mut index = load_index(&tx, index_id)?;
        index.set_draft()?;
        save_index_status(&tx, &index, now)?;
        tx.commit().map_err(query_err)?;
        Ok(index)
    }

    fn submit_ballot(
        &self,
        ballot: &Ballot,
        now: DateTime<Utc>,
    ) -> Result<Vec<Vote>, IndexpoolError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        let index = load_index(&tx, ballot.index_id)?;
        let member_ids: HashSet<i64> =
            load_member_ids(&tx, ballot.index_id)?.into_iter().collect();
        let mut investment = load_investment(&tx, ballot.investment_id)?;
        validate_ballot(ballot, &index, &member_ids, &investment)?;

        let weight = weight_per_company(investment.amount, ballot.company_ids.len());

        // Ballot replacement: drop any prior votes for this investment, then
        // recompute every touched pair from the vote rows.
        let prior: Vec<i64> = {
            let mut stmt = tx
                .prepare("SELECT company_id FROM votes WHERE user_id = ?1 AND investment_id = ?2")
                .map_err(query_err)?;
            stmt.query_map(params![ballot.user_id, ballot.investment_id], |row| row.get(0))
                .map_err(query_err)?
                .collect::<rusqlite::Result<Vec<i64>>>()
                .map_err(query_err)?
        };
        tx.execute(
            "DELETE FROM votes WHERE user_id = ?1 AND investment_id = ?2",
            params![ballot.user_id, ballot.investment_id],
        )
        .map_err(query_err)?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO votes (user_id, index_id, investment_id, company_id, weight, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )
                .map_err(query_err)?;
            for company_id in &ballot.company_ids {
                stmt.execute(params![
                    ballot.user_id,
                    ballot.index_id,
                    ballot.investment_id,
                    company_id,
                    weight.to_string(),
                    now.to_rfc3339(),
                ])
                .map_err(query_err)?;
            }
        }

        let mut affected: HashSet<i64> = prior.into_iter().collect();
        affected.extend(ballot.company_ids.iter().copied());
        for company_id in affected {
            recompute_vote_count(&tx, ballot.index_id, company_id, now)?;
        }

        investment.has_voted = true;
        investment.status = InvestmentStatus::Voted;
        save_investment(&tx, &investment, now)?;

        let votes = {
            let mut stmt = tx
                .prepare(
                    "SELECT id, user_id, index_id, investment_id, company_id, weight, created_at
                     FROM votes WHERE user_id = ?1 AND investment_id = ?2 ORDER BY id",
                )
                .map_err(query_err)?;
            stmt.query_map(params![ballot.user_id, ballot.investment_id], map_vote)
                .map_err(query_err)?
                .collect::<rusqlite::Result<Vec<Vote>>>()
                .map_err(query_err)?
        };
        tx.commit().map_err(query_err)?;
        Ok(votes)
    }

    fn company_vote_weights(&self, index_id: i64) -> Result<Vec<RankedCompany>, IndexpoolError> {
        let conn = self.conn()?;
        let index = load_index(&conn, index_id)?;
        if !index.results_visible() {
            return Err(IndexpoolError::validation(format!(
                "vote weights are not visible while the index is {}",
                index.status.as_str()
            )));
        }
        let ranked = rank_tallies(load_tallies(&conn, index_id)?);
        let ids: Vec<i64> = ranked.iter().map(|t| t.company_id).collect();
        let companies = load_companies_by_ids(&conn, &ids)?;
        Ok(ranked
            .into_iter()
            .zip(companies)
            .map(|(tally, company)| RankedCompany { company, tally })
            .collect())
    }

    fn create_investment(
        &self,
        user_id: &str,
        index_id: i64,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Investment, IndexpoolError> {
        Investment::validate_amount(amount)?;
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        let index = load_index(&tx, index_id)?;
        index.accepts_investments(now)?;

        let mut account = load_account(&tx, user_id)?;
        account.deduct_credits(amount)?;
        save_account(&tx, &account)?;

        let lock_end = Investment::lock_period_end(now, index.lock_period_months);
        tx.execute(
            "INSERT INTO investments (user_id, index_id, amount, current_value, profit_loss,
                    profit_loss_pct, status, has_voted, transaction_id, lock_period_end,
                    invested_at, updated_at)
             VALUES (?1, ?2, ?3, ?3, '0', '0', 'ACTIVE', 0, ?4, ?5, ?6, ?6)",
            params![
                user_id,
                index_id,
                amount.to_string(),
                Uuid::new_v4().to_string(),
                lock_end.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )
        .map_err(query_err)?;
        let investment = load_investment(&tx, tx.last_insert_rowid())?;
        tx.commit().map_err(query_err)?;
        info!("user {user_id} invested {amount} in index {index_id}");
        Ok(investment)
    }

    fn withdraw(
        &self,
        investment_id: i64,
        now: DateTime<Utc>,
    ) -> Result<WithdrawalReceipt, IndexpoolError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        let mut investment = load_investment(&tx, investment_id)?;
        investment.check_withdrawal(now)?;

        let mut account = load_account(&tx, &investment.user_id)?;
        account.add_credits(investment.current_value);
        save_account(&tx, &account)?;

        investment.status = InvestmentStatus::Withdrawn;
        save_investment(&tx, &investment, now)?;
        tx.commit().map_err(query_err)?;
        info!(
            "investment {investment_id} withdrawn, {} credits returned",
            investment.current_value
        );
        Ok(WithdrawalReceipt {
            investment_id,
            credits_returned: investment.current_value,
            new_balance: account.credits,
        })
    }

    fn generate_positions(
        &self,
        investment_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Position>, IndexpoolError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        let mut investment = load_investment(&tx, investment_id)?;
        if !load_positions(&tx, investment_id)?.is_empty() {
            return Err(IndexpoolError::validation(
                "investment already has positions",
            ));
        }
        let member_ids = load_member_ids(&tx, investment.index_id)?;
        if member_ids.is_empty() {
            return Err(IndexpoolError::validation("index has no companies"));
        }
        let companies = load_companies_by_ids(&tx, &member_ids)?;

        let drafts = default_positions(investment.amount, &companies);
        insert_position_drafts(&tx, investment_id, &drafts)?;

        let positions = load_positions(&tx, investment_id)?;
        investment.revalue(&positions);
        save_investment(&tx, &investment, now)?;
        tx.commit().map_err(query_err)?;
        Ok(positions)
    }

    fn get_investment(&self, investment_id: i64) -> Result<Investment, IndexpoolError> {
        let conn = self.conn()?;
        load_investment(&conn, investment_id)
    }

    fn list_investments(&self, user_id: &str) -> Result<Vec<Investment>, IndexpoolError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {INVESTMENT_COLS} FROM investments WHERE user_id = ?1 ORDER BY id"
        );
        let mut stmt = conn.prepare(&sql).map_err(query_err)?;
        let investments = stmt
            .query_map(params![user_id], map_investment)
            .map_err(query_err)?
            .collect::<rusqlite::Result<Vec<Investment>>>()
            .map_err(query_err)?;
        Ok(investments)
    }

    fn list_positions(&self, investment_id: i64) -> Result<Vec<Position>, IndexpoolError> {
        let conn = self.conn()?;
        load_investment(&conn, investment_id)?;
        load_positions(&conn, investment_id)
    }

    fn revalue_investments(&self, now: DateTime<Utc>) -> Result<usize, IndexpoolError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        // Pull company prices into positions, then refresh each in-flight
        // investment's derived values.
        tx.execute(
            "UPDATE positions SET current_price = (
                 SELECT c.current_price FROM companies c WHERE c.id = positions.company_id
             )
             WHERE EXISTS (
                 SELECT 1 FROM companies c
                 WHERE c.id = positions.company_id AND c.current_price IS NOT NULL
             )",
            [],
        )
        .map_err(query_err)?;

        let sql = format!(
            "SELECT {INVESTMENT_COLS} FROM investments WHERE status IN ('ACTIVE', 'VOTED')
             ORDER BY id"
        );
        let investments = {
            let mut stmt = tx.prepare(&sql).map_err(query_err)?;
            stmt.query_map([], map_investment)
                .map_err(query_err)?
                .collect::<rusqlite::Result<Vec<Investment>>>()
                .map_err(query_err)?
        };

        let mut updated = 0;
        for mut inv in investments {
            let positions = load_positions(&tx, inv.id)?;
            inv.revalue(&positions);
            save_investment(&tx, &inv, now)?;
            updated += 1;
        }
        tx.commit().map_err(query_err)?;
        info!("revalued {updated} investments");
        Ok(updated)
    }

    fn portfolio_summary(&self, user_id: &str) -> Result<PortfolioSummary, IndexpoolError> {
        let investments = self.list_investments(user_id)?;
        Ok(portfolio::summarize(user_id, &investments))
    }

    fn ledger_snapshot(&self, user_id: &str) -> Result<LedgerSnapshot, IndexpoolError> {
        let investments = self.list_investments(user_id)?;
        Ok(portfolio::ledger_snapshot(user_id, &investments))
    }
}
