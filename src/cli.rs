//! CLI definition and dispatch.

use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use crate::adapters::csv_adapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::sqlite_adapter::SqliteAdapter;
use crate::domain::error::IndexpoolError;
use crate::domain::index::{IndexStatus, NewIndex, Schedule, SizeBounds};
use crate::domain::risk;
use crate::domain::voting::Ballot;
use crate::ports::store_port::StorePort;

#[derive(Parser, Debug)]
#[command(name = "indexpool", about = "Community index funds with weighted voting")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the database schema
    InitDb {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Import companies from a CSV file (symbol,name,sector,price,market_cap)
    ImportCompanies {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Apply price updates from a CSV file (symbol,price)
    UpdatePrices {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Revalue all in-flight investments from current prices
    Revalue {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List companies
    Companies {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Create an index (always born in DRAFT)
    CreateIndex {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        min_companies: u32,
        #[arg(long)]
        max_companies: u32,
        #[arg(long)]
        min_ballot: u32,
        #[arg(long)]
        max_ballot: u32,
        /// Defaults to the ballot bounds when omitted
        #[arg(long)]
        min_final: Option<u32>,
        #[arg(long)]
        max_final: Option<u32>,
        /// RFC 3339 timestamps
        #[arg(long)]
        investment_start: String,
        #[arg(long)]
        investment_end: String,
        #[arg(long)]
        voting_start: String,
        #[arg(long)]
        voting_end: String,
        #[arg(long, default_value_t = 12)]
        lock_months: u32,
    },
    /// Replace an index's company membership
    SetCompanies {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        index: i64,
        /// Comma-separated company ids
        #[arg(long)]
        companies: String,
    },
    /// List indexes, optionally filtered by status
    ListIndexes {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        status: Option<String>,
    },
    /// DRAFT -> ACTIVE
    Activate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        index: i64,
    },
    /// ACTIVE -> VOTING
    StartVoting {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        index: i64,
    },
    /// VOTING -> EXECUTED: rebalance every voted investment
    Execute {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        index: i64,
    },
    /// Archive an index
    Archive {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        index: i64,
    },
    /// Send an index back to DRAFT
    SetDraft {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        index: i64,
    },
    /// Add credits to a user account
    Deposit {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        user: String,
        #[arg(long)]
        amount: String,
    },
    /// Show a user's credit balance
    Balance {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        user: String,
    },
    /// Invest credits into an index
    Invest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        user: String,
        #[arg(long)]
        index: i64,
        #[arg(long)]
        amount: String,
    },
    /// Submit (or replace) a ballot for an investment
    Vote {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        user: String,
        #[arg(long)]
        index: i64,
        #[arg(long)]
        investment: i64,
        /// Comma-separated company ids
        #[arg(long)]
        companies: String,
    },
    /// Show ranked vote weights for an index
    VoteWeights {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        index: i64,
    },
    /// Withdraw an investment after its lock period
    Withdraw {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        investment: i64,
    },
    /// Create default equal-weight positions for an investment
    GeneratePositions {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        investment: i64,
    },
    /// Show an investment's positions
    Positions {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        investment: i64,
    },
    /// List a user's investments
    Investments {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        user: String,
    },
    /// Show a user's portfolio summary
    Portfolio {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        user: String,
    },
    /// Quote an insurance premium for a prospective investment
    QuoteInsurance {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        user: String,
        #[arg(long)]
        amount: String,
        #[arg(long, default_value = "10")]
        base_premium: String,
    },
    /// Start the JSON API server
    Serve {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::InitDb { config } => run_init_db(&config),
        Command::ImportCompanies { config, file } => run_import_companies(&config, &file),
        Command::UpdatePrices { config, file } => run_update_prices(&config, &file),
        Command::Revalue { config } => run_revalue(&config),
        Command::Companies { config } => run_companies(&config),
        Command::CreateIndex {
            config,
            name,
            description,
            min_companies,
            max_companies,
            min_ballot,
            max_ballot,
            min_final,
            max_final,
            investment_start,
            investment_end,
            voting_start,
            voting_end,
            lock_months,
        } => run_create_index(
            &config,
            CreateIndexArgs {
                name,
                description,
                min_companies,
                max_companies,
                min_ballot,
                max_ballot,
                min_final,
                max_final,
                investment_start,
                investment_end,
                voting_start,
                voting_end,
                lock_months,
            },
        ),
        Command::SetCompanies {
            config,
            index,
            companies,
        } => run_set_companies(&config, index, &companies),
        Command::ListIndexes { config, status } => run_list_indexes(&config, status.as_deref()),
        Command::Activate { config, index } => {
            run_transition(&config, index, |store, id| store.activate_index(id, Utc::now()))
        }
        Command::StartVoting { config, index } => {
            run_transition(&config, index, |store, id| store.start_voting(id, Utc::now()))
        }
        Command::Execute { config, index } => run_execute(&config, index),
        Command::Archive { config, index } => {
            run_transition(&config, index, |store, id| store.archive_index(id, Utc::now()))
        }
        Command::SetDraft { config, index } => {
            run_transition(&config, index, |store, id| store.set_draft(id, Utc::now()))
        }
        Command::Deposit {
            config,
            user,
            amount,
        } => run_deposit(&config, &user, &amount),
        Command::Balance { config, user } => run_balance(&config, &user),
        Command::Invest {
            config,
            user,
            index,
            amount,
        } => run_invest(&config, &user, index, &amount),
        Command::Vote {
            config,
            user,
            index,
            investment,
            companies,
        } => run_vote(&config, &user, index, investment, &companies),
        Command::VoteWeights { config, index } => run_vote_weights(&config, index),
        Command::Withdraw { config, investment } => run_withdraw(&config, investment),
        Command::GeneratePositions { config, investment } => {
            run_generate_positions(&config, investment)
        }
        Command::Positions { config, investment } => run_positions(&config, investment),
        Command::Investments { config, user } => run_investments(&config, &user),
        Command::Portfolio { config, user } => run_portfolio(&config, &user),
        Command::QuoteInsurance {
            config,
            user,
            amount,
            base_premium,
        } => run_quote_insurance(&config, &user, &amount, &base_premium),
        Command::Serve { config } => run_serve(&config),
    }
}

fn fail(e: &IndexpoolError) -> ExitCode {
    eprintln!("error: {e}");
    e.into()
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

fn open_store(config_path: &PathBuf) -> Result<SqliteAdapter, ExitCode> {
    let config = load_config(config_path)?;
    let store = SqliteAdapter::from_config(&config).map_err(|e| fail(&e))?;
    store.initialize_schema().map_err(|e| fail(&e))?;
    Ok(store)
}

fn parse_amount(raw: &str) -> Result<Decimal, ExitCode> {
    Decimal::from_str(raw.trim()).map_err(|_| {
        fail(&IndexpoolError::validation(format!(
            "invalid amount '{raw}'"
        )))
    })
}

fn parse_timestamp(raw: &str, name: &str) -> Result<DateTime<Utc>, ExitCode> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|_| {
            fail(&IndexpoolError::validation(format!(
                "invalid {name} '{raw}', expected RFC 3339"
            )))
        })
}

fn parse_id_list(raw: &str) -> Result<Vec<i64>, ExitCode> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>().map_err(|_| {
                fail(&IndexpoolError::validation(format!("invalid id '{s}'")))
            })
        })
        .collect()
}

fn run_init_db(config_path: &PathBuf) -> ExitCode {
    match open_store(config_path) {
        Ok(_) => {
            println!("schema initialized");
            ExitCode::SUCCESS
        }
        Err(code) => code,
    }
}

fn run_import_companies(config_path: &PathBuf, file: &PathBuf) -> ExitCode {
    let store = match open_store(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let companies = match csv_adapter::read_companies(file) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    match store.upsert_companies(&companies) {
        Ok(count) => {
            println!("imported {count} companies");
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_update_prices(config_path: &PathBuf, file: &PathBuf) -> ExitCode {
    let store = match open_store(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let updates = match csv_adapter::read_price_updates(file) {
        Ok(u) => u,
        Err(e) => return fail(&e),
    };
    match store.update_prices(&updates) {
        Ok(count) => {
            println!("updated {count} prices");
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_revalue(config_path: &PathBuf) -> ExitCode {
    let store = match open_store(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    match store.revalue_investments(Utc::now()) {
        Ok(count) => {
            println!("revalued {count} investments");
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_companies(config_path: &PathBuf) -> ExitCode {
    let store = match open_store(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    match store.list_companies() {
        Ok(companies) => {
            for c in companies {
                let price = c
                    .current_price
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{:>5}  {:<8} {:<30} {:<22} {}", c.id, c.symbol, c.name, c.sector.as_str(), price);
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

struct CreateIndexArgs {
    name: String,
    description: String,
    min_companies: u32,
    max_companies: u32,
    min_ballot: u32,
    max_ballot: u32,
    min_final: Option<u32>,
    max_final: Option<u32>,
    investment_start: String,
    investment_end: String,
    voting_start: String,
    voting_end: String,
    lock_months: u32,
}

fn run_create_index(config_path: &PathBuf, args: CreateIndexArgs) -> ExitCode {
    let store = match open_store(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let company_bounds = match SizeBounds::new(args.min_companies, args.max_companies) {
        Ok(b) => b,
        Err(e) => return fail(&e),
    };
    let ballot_bounds = match SizeBounds::new(args.min_ballot, args.max_ballot) {
        Ok(b) => b,
        Err(e) => return fail(&e),
    };
    let final_size_bounds = match (args.min_final, args.max_final) {
        (None, None) => None,
        (min, max) => {
            let min = min.unwrap_or(args.min_ballot);
            let max = max.unwrap_or(args.max_ballot);
            match SizeBounds::new(min, max) {
                Ok(b) => Some(b),
                Err(e) => return fail(&e),
            }
        }
    };

    let schedule = {
        let investment_start = match parse_timestamp(&args.investment_start, "investment start") {
            Ok(t) => t,
            Err(code) => return code,
        };
        let investment_end = match parse_timestamp(&args.investment_end, "investment end") {
            Ok(t) => t,
            Err(code) => return code,
        };
        let voting_start = match parse_timestamp(&args.voting_start, "voting start") {
            Ok(t) => t,
            Err(code) => return code,
        };
        let voting_end = match parse_timestamp(&args.voting_end, "voting end") {
            Ok(t) => t,
            Err(code) => return code,
        };
        match Schedule::new(investment_start, investment_end, voting_start, voting_end) {
            Ok(s) => s,
            Err(e) => return fail(&e),
        }
    };

    let new_index = NewIndex {
        name: args.name,
        description: args.description,
        company_bounds,
        ballot_bounds,
        final_size_bounds,
        schedule,
        lock_period_months: args.lock_months,
    };
    match store.create_index(&new_index, Utc::now()) {
        Ok(index) => {
            println!("created index {} ({})", index.id, index.name);
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_set_companies(config_path: &PathBuf, index_id: i64, companies: &str) -> ExitCode {
    let store = match open_store(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let ids = match parse_id_list(companies) {
        Ok(ids) => ids,
        Err(code) => return code,
    };
    match store.set_index_companies(index_id, &ids, Utc::now()) {
        Ok(()) => {
            println!("index {index_id} now has {} companies", ids.len());
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_list_indexes(config_path: &PathBuf, status: Option<&str>) -> ExitCode {
    let store = match open_store(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let status = match status.map(IndexStatus::parse).transpose() {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    match store.list_indexes(status) {
        Ok(indexes) => {
            for index in indexes {
                println!(
                    "{:>5}  {:<30} {:<9} lock {}mo",
                    index.id,
                    index.name,
                    index.status.as_str(),
                    index.lock_period_months
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_transition<F>(config_path: &PathBuf, index_id: i64, op: F) -> ExitCode
where
    F: FnOnce(&SqliteAdapter, i64) -> Result<crate::domain::index::Index, IndexpoolError>,
{
    let store = match open_store(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    match op(&store, index_id) {
        Ok(index) => {
            println!("index {} is now {}", index.id, index.status.as_str());
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_execute(config_path: &PathBuf, index_id: i64) -> ExitCode {
    let store = match open_store(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    match store.execute_index(index_id, Utc::now()) {
        Ok(report) => {
            println!(
                "index {} executed: {} companies selected, {} investments rebalanced",
                report.index.id,
                report.decision.target_count,
                report.investments_rebalanced
            );
            for company_id in &report.decision.winners {
                println!("  company {company_id}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_deposit(config_path: &PathBuf, user: &str, amount: &str) -> ExitCode {
    let store = match open_store(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let amount = match parse_amount(amount) {
        Ok(a) => a,
        Err(code) => return code,
    };
    match store.deposit(user, amount) {
        Ok(balance) => {
            println!("{user}: {balance} credits");
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_balance(config_path: &PathBuf, user: &str) -> ExitCode {
    let store = match open_store(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    match store.balance(user) {
        Ok(balance) => {
            println!("{user}: {balance} credits");
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_invest(config_path: &PathBuf, user: &str, index_id: i64, amount: &str) -> ExitCode {
    let store = match open_store(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let amount = match parse_amount(amount) {
        Ok(a) => a,
        Err(code) => return code,
    };
    match store.create_investment(user, index_id, amount, Utc::now()) {
        Ok(inv) => {
            println!(
                "investment {} created: {} in index {} (locked until {})",
                inv.id,
                inv.amount,
                inv.index_id,
                inv.lock_period_end.format("%Y-%m-%d")
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_vote(
    config_path: &PathBuf,
    user: &str,
    index_id: i64,
    investment_id: i64,
    companies: &str,
) -> ExitCode {
    let store = match open_store(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let company_ids = match parse_id_list(companies) {
        Ok(ids) => ids,
        Err(code) => return code,
    };
    let ballot = Ballot {
        user_id: user.to_string(),
        index_id,
        investment_id,
        company_ids,
    };
    match store.submit_ballot(&ballot, Utc::now()) {
        Ok(votes) => {
            let weight = votes.first().map(|v| v.weight).unwrap_or_default();
            println!(
                "ballot recorded: {} companies at {} weight each",
                votes.len(),
                weight
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_vote_weights(config_path: &PathBuf, index_id: i64) -> ExitCode {
    let store = match open_store(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    match store.company_vote_weights(index_id) {
        Ok(ranked) => {
            for (rank, entry) in ranked.iter().enumerate() {
                println!(
                    "{:>3}. {:<8} {:<30} weight {:>12}  votes {}",
                    rank + 1,
                    entry.company.symbol,
                    entry.company.name,
                    entry.tally.total_weight,
                    entry.tally.vote_count
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_withdraw(config_path: &PathBuf, investment_id: i64) -> ExitCode {
    let store = match open_store(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    match store.withdraw(investment_id, Utc::now()) {
        Ok(receipt) => {
            println!(
                "investment {} withdrawn: {} credits returned, balance {}",
                receipt.investment_id, receipt.credits_returned, receipt.new_balance
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_generate_positions(config_path: &PathBuf, investment_id: i64) -> ExitCode {
    let store = match open_store(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    match store.generate_positions(investment_id, Utc::now()) {
        Ok(positions) => {
            println!("created {} positions", positions.len());
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_positions(config_path: &PathBuf, investment_id: i64) -> ExitCode {
    let store = match open_store(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    match store.list_positions(investment_id) {
        Ok(positions) => {
            for p in positions {
                println!(
                    "company {:>5}  amount {:>12}  qty {:>16}  weight {:>6}%",
                    p.company_id, p.amount, p.quantity, p.weight
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_investments(config_path: &PathBuf, user: &str) -> ExitCode {
    let store = match open_store(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    match store.list_investments(user) {
        Ok(investments) => {
            for inv in investments {
                println!(
                    "{:>5}  index {:>4}  {:<10} amount {:>12}  value {:>12}  p/l {:>10} ({:>6}%)",
                    inv.id,
                    inv.index_id,
                    inv.status.as_str(),
                    inv.amount,
                    inv.current_value,
                    inv.profit_loss,
                    inv.profit_loss_pct
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_portfolio(config_path: &PathBuf, user: &str) -> ExitCode {
    let store = match open_store(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    match store.portfolio_summary(user) {
        Ok(summary) => {
            println!("user:        {}", summary.user_id);
            println!("investments: {}", summary.investment_count);
            println!("invested:    {}", summary.total_invested);
            println!("value:       {}", summary.total_value);
            println!("p/l:         {}", summary.total_profit_loss);
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_quote_insurance(
    config_path: &PathBuf,
    user: &str,
    amount: &str,
    base_premium: &str,
) -> ExitCode {
    let store = match open_store(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let amount = match parse_amount(amount) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let base_premium = match parse_amount(base_premium) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let ledger = match store.ledger_snapshot(user) {
        Ok(l) => l,
        Err(e) => return fail(&e),
    };
    let risk_factor = risk::risk_factor(amount, &ledger);
    let premium = risk::monthly_premium(base_premium, risk_factor);
    println!("risk factor:     {risk_factor}");
    println!("monthly premium: {premium}");
    ExitCode::SUCCESS
}

fn run_serve(config_path: &PathBuf) -> ExitCode {
    #[cfg(feature = "web")]
    {
        use std::net::SocketAddr;
        use std::sync::Arc;

        use crate::adapters::web::{AppState, build_router, spawn_revaluation_task};
        use crate::ports::config_port::ConfigPort;

        eprintln!("Loading config from {}", config_path.display());
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(code) => return code,
        };

        let store = match SqliteAdapter::from_config(&config) {
            Ok(s) => s,
            Err(e) => return fail(&e),
        };
        if let Err(e) = store.initialize_schema() {
            return fail(&e);
        }
        let store: Arc<dyn StorePort + Send + Sync> = Arc::new(store);

        let bind = config
            .get_string("server", "bind")
            .unwrap_or_else(|| "127.0.0.1:8080".to_string());
        let addr: SocketAddr = match bind.parse() {
            Ok(addr) => addr,
            Err(_) => {
                eprintln!("Error: invalid [server] bind address '{bind}'");
                return ExitCode::from(2);
            }
        };

        let refresh_seconds = config.get_int("pricing", "refresh_seconds", 1800) as u64;

        eprintln!("Starting server on {addr}");

        let state = AppState {
            store: Arc::clone(&store),
            config: Arc::new(config),
        };
        let router = build_router(state);

        match tokio::runtime::Runtime::new() {
            Ok(runtime) => {
                runtime.block_on(async {
                    spawn_revaluation_task(store, refresh_seconds);
                    match tokio::net::TcpListener::bind(addr).await {
                        Ok(listener) => {
                            if let Err(e) = axum::serve(listener, router).await {
                                eprintln!("error: {e}");
                            }
                        }
                        Err(e) => eprintln!("error: failed to bind {addr}: {e}"),
                    }
                });
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {e}");
                ExitCode::from(1)
            }
        }
    }

    #[cfg(not(feature = "web"))]
    {
        let _ = config_path;
        eprintln!("error: web feature is required for serve");
        ExitCode::from(1)
    }
}
