//! JSON request handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::company::Company;
use crate::domain::index::{Index, IndexStatus, NewIndex, Schedule, SizeBounds};
use crate::domain::investment::{Investment, Position};
use crate::domain::portfolio::PortfolioSummary;
use crate::domain::risk;
use crate::domain::voting::{Ballot, Vote};
use crate::ports::store_port::{ExecutionReport, RankedCompany, WithdrawalReceipt};

use super::{AppState, WebError};

#[derive(Debug, Serialize)]
pub struct CompanyDto {
    pub id: i64,
    pub name: String,
    pub symbol: String,
    pub sector: String,
    pub current_price: Option<Decimal>,
    pub market_cap: Option<Decimal>,
    pub is_active: bool,
}

impl From<Company> for CompanyDto {
    fn from(c: Company) -> Self {
        Self {
            id: c.id,
            name: c.name,
            symbol: c.symbol,
            sector: c.sector.as_str().to_string(),
            current_price: c.current_price,
            market_cap: c.market_cap,
            is_active: c.is_active,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct BoundsDto {
    pub min: u32,
    pub max: u32,
}

impl From<SizeBounds> for BoundsDto {
    fn from(b: SizeBounds) -> Self {
        Self {
            min: b.min,
            max: b.max,
        }
    }
}

impl BoundsDto {
    fn into_bounds(self) -> Result<SizeBounds, WebError> {
        SizeBounds::new(self.min, self.max).map_err(WebError::from)
    }
}

#[derive(Debug, Serialize)]
pub struct IndexDto {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub status: String,
    pub company_bounds: BoundsDto,
    pub ballot_bounds: BoundsDto,
    pub final_size_bounds: BoundsDto,
    pub investment_start: String,
    pub investment_end: String,
    pub voting_start: String,
    pub voting_end: String,
    pub lock_period_months: u32,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Index> for IndexDto {
    fn from(i: Index) -> Self {
        Self {
            id: i.id,
            name: i.name,
            description: i.description,
            status: i.status.as_str().to_string(),
            company_bounds: i.company_bounds.into(),
            ballot_bounds: i.ballot_bounds.into(),
            final_size_bounds: i.final_size_bounds.into(),
            investment_start: i.schedule.investment_start.to_rfc3339(),
            investment_end: i.schedule.investment_end.to_rfc3339(),
            voting_start: i.schedule.voting_start.to_rfc3339(),
            voting_end: i.schedule.voting_end.to_rfc3339(),
            lock_period_months: i.lock_period_months,
            created_at: i.created_at.to_rfc3339(),
            updated_at: i.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvestmentDto {
    pub id: i64,
    pub user_id: String,
    pub index_id: i64,
    pub amount: Decimal,
    pub current_value: Decimal,
    pub profit_loss: Decimal,
    pub profit_loss_pct: Decimal,
    pub status: String,
    pub has_voted: bool,
    pub transaction_id: String,
    pub lock_period_end: String,
    pub invested_at: String,
}

impl From<Investment> for InvestmentDto {
    fn from(inv: Investment) -> Self {
        Self {
            id: inv.id,
            user_id: inv.user_id,
            index_id: inv.index_id,
            amount: inv.amount,
            current_value: inv.current_value,
            profit_loss: inv.profit_loss,
            profit_loss_pct: inv.profit_loss_pct,
            status: inv.status.as_str().to_string(),
            has_voted: inv.has_voted,
            transaction_id: inv.transaction_id,
            lock_period_end: inv.lock_period_end.to_rfc3339(),
            invested_at: inv.invested_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PositionDto {
    pub id: i64,
    pub company_id: i64,
    pub amount: Decimal,
    pub quantity: Decimal,
    pub purchase_price: Decimal,
    pub current_price: Decimal,
    pub weight: Decimal,
}

impl From<Position> for PositionDto {
    fn from(p: Position) -> Self {
        Self {
            id: p.id,
            company_id: p.company_id,
            amount: p.amount,
            quantity: p.quantity,
            purchase_price: p.purchase_price,
            current_price: p.current_price,
            weight: p.weight,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VoteDto {
    pub id: i64,
    pub company_id: i64,
    pub weight: Decimal,
}

impl From<Vote> for VoteDto {
    fn from(v: Vote) -> Self {
        Self {
            id: v.id,
            company_id: v.company_id,
            weight: v.weight,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RankedCompanyDto {
    pub company: CompanyDto,
    pub total_weight: Decimal,
    pub vote_count: u32,
}

impl From<RankedCompany> for RankedCompanyDto {
    fn from(r: RankedCompany) -> Self {
        Self {
            company: r.company.into(),
            total_weight: r.tally.total_weight,
            vote_count: r.tally.vote_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExecutionReportDto {
    pub index: IndexDto,
    pub target_count: usize,
    pub winners: Vec<i64>,
    pub investments_rebalanced: usize,
}

impl From<ExecutionReport> for ExecutionReportDto {
    fn from(r: ExecutionReport) -> Self {
        Self {
            index: r.index.into(),
            target_count: r.decision.target_count,
            winners: r.decision.winners,
            investments_rebalanced: r.investments_rebalanced,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PortfolioDto {
    pub user_id: String,
    pub total_invested: Decimal,
    pub total_value: Decimal,
    pub total_profit_loss: Decimal,
    pub investment_count: usize,
}

impl From<PortfolioSummary> for PortfolioDto {
    fn from(p: PortfolioSummary) -> Self {
        Self {
            user_id: p.user_id,
            total_invested: p.total_invested,
            total_value: p.total_value,
            total_profit_loss: p.total_profit_loss,
            investment_count: p.investment_count,
        }
    }
}

fn parse_timestamp(raw: &str, name: &str) -> Result<DateTime<Utc>, WebError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|_| WebError::bad_request(format!("invalid {name} timestamp")))
}

// --- Companies ---

pub async fn list_companies(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CompanyDto>>, WebError> {
    let companies = state.store.list_companies()?;
    Ok(Json(companies.into_iter().map(CompanyDto::from).collect()))
}

// --- Indexes ---

#[derive(Debug, Deserialize)]
pub struct CreateIndexBody {
    pub name: String,
    pub description: String,
    pub company_bounds: BoundsDto,
    pub ballot_bounds: BoundsDto,
    pub final_size_bounds: Option<BoundsDto>,
    pub investment_start: String,
    pub investment_end: String,
    pub voting_start: String,
    pub voting_end: String,
    pub lock_period_months: u32,
}

pub async fn create_index(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateIndexBody>,
) -> Result<Json<IndexDto>, WebError> {
    let schedule = Schedule::new(
        parse_timestamp(&body.investment_start, "investment_start")?,
        parse_timestamp(&body.investment_end, "investment_end")?,
        parse_timestamp(&body.voting_start, "voting_start")?,
        parse_timestamp(&body.voting_end, "voting_end")?,
    )?;
    let new_index = NewIndex {
        name: body.name,
        description: body.description,
        company_bounds: body.company_bounds.into_bounds()?,
        ballot_bounds: body.ballot_bounds.into_bounds()?,
        final_size_bounds: body
            .final_size_bounds
            .map(BoundsDto::into_bounds)
            .transpose()?,
        schedule,
        lock_period_months: body.lock_period_months,
    };
    let index = state.store.create_index(&new_index, Utc::now())?;
    Ok(Json(index.into()))
}

#[derive(Debug, Deserialize)]
pub struct ListIndexesQuery {
    pub status: Option<String>,
}

pub async fn list_indexes(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListIndexesQuery>,
) -> Result<Json<Vec<IndexDto>>, WebError> {
    let status = query
        .status
        .as_deref()
        .map(IndexStatus::parse)
        .transpose()
        .map_err(|_| WebError::bad_request("unknown index status"))?;
    let indexes = state.store.list_indexes(status)?;
    Ok(Json(indexes.into_iter().map(IndexDto::from).collect()))
}

pub async fn get_index(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<IndexDto>, WebError> {
    Ok(Json(state.store.get_index(id)?.into()))
}

#[derive(Debug, Deserialize)]
pub struct SetCompaniesBody {
    pub company_ids: Vec<i64>,
}

pub async fn set_index_companies(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<SetCompaniesBody>,
) -> Result<Json<Vec<i64>>, WebError> {
    state
        .store
        .set_index_companies(id, &body.company_ids, Utc::now())?;
    Ok(Json(state.store.index_company_ids(id)?))
}

pub async fn index_companies(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<i64>>, WebError> {
    Ok(Json(state.store.index_company_ids(id)?))
}

pub async fn activate_index(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<IndexDto>, WebError> {
    Ok(Json(state.store.activate_index(id, Utc::now())?.into()))
}

pub async fn start_voting(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<IndexDto>, WebError> {
    Ok(Json(state.store.start_voting(id, Utc::now())?.into()))
}

pub async fn execute_index(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ExecutionReportDto>, WebError> {
    Ok(Json(state.store.execute_index(id, Utc::now())?.into()))
}

pub async fn archive_index(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<IndexDto>, WebError> {
    Ok(Json(state.store.archive_index(id, Utc::now())?.into()))
}

pub async fn set_draft(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<IndexDto>, WebError> {
    Ok(Json(state.store.set_draft(id, Utc::now())?.into()))
}

pub async fn vote_weights(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<RankedCompanyDto>>, WebError> {
    let ranked = state.store.company_vote_weights(id)?;
    Ok(Json(ranked.into_iter().map(RankedCompanyDto::from).collect()))
}

// --- Voting ---

#[derive(Debug, Deserialize)]
pub struct BallotBody {
    pub user_id: String,
    pub investment_id: i64,
    pub company_ids: Vec<i64>,
}

pub async fn submit_ballot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<BallotBody>,
) -> Result<Json<Vec<VoteDto>>, WebError> {
    let ballot = Ballot {
        user_id: body.user_id,
        index_id: id,
        investment_id: body.investment_id,
        company_ids: body.company_ids,
    };
    let votes = state.store.submit_ballot(&ballot, Utc::now())?;
    Ok(Json(votes.into_iter().map(VoteDto::from).collect()))
}

// --- Accounts ---

#[derive(Debug, Deserialize)]
pub struct DepositBody {
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct BalanceDto {
    pub user_id: String,
    pub credits: Decimal,
}

pub async fn deposit(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(body): Json<DepositBody>,
) -> Result<Json<BalanceDto>, WebError> {
    let credits = state.store.deposit(&user_id, body.amount)?;
    Ok(Json(BalanceDto { user_id, credits }))
}

pub async fn balance(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<BalanceDto>, WebError> {
    let credits = state.store.balance(&user_id)?;
    Ok(Json(BalanceDto { user_id, credits }))
}

// --- Investments ---

#[derive(Debug, Deserialize)]
pub struct InvestBody {
    pub user_id: String,
    pub index_id: i64,
    pub amount: Decimal,
}

pub async fn create_investment(
    State(state): State<Arc<AppState>>,
    Json(body): Json<InvestBody>,
) -> Result<Json<InvestmentDto>, WebError> {
    let investment =
        state
            .store
            .create_investment(&body.user_id, body.index_id, body.amount, Utc::now())?;
    Ok(Json(investment.into()))
}

pub async fn get_investment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<InvestmentDto>, WebError> {
    Ok(Json(state.store.get_investment(id)?.into()))
}

#[derive(Debug, Serialize)]
pub struct WithdrawalDto {
    pub investment_id: i64,
    pub credits_returned: Decimal,
    pub new_balance: Decimal,
}

impl From<WithdrawalReceipt> for WithdrawalDto {
    fn from(r: WithdrawalReceipt) -> Self {
        Self {
            investment_id: r.investment_id,
            credits_returned: r.credits_returned,
            new_balance: r.new_balance,
        }
    }
}

pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<WithdrawalDto>, WebError> {
    Ok(Json(state.store.withdraw(id, Utc::now())?.into()))
}

pub async fn generate_positions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<PositionDto>>, WebError> {
    let positions = state.store.generate_positions(id, Utc::now())?;
    Ok(Json(positions.into_iter().map(PositionDto::from).collect()))
}

pub async fn list_positions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<PositionDto>>, WebError> {
    let positions = state.store.list_positions(id)?;
    Ok(Json(positions.into_iter().map(PositionDto::from).collect()))
}

pub async fn user_investments(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<InvestmentDto>>, WebError> {
    let investments = state.store.list_investments(&user_id)?;
    Ok(Json(
        investments.into_iter().map(InvestmentDto::from).collect(),
    ))
}

pub async fn portfolio(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<PortfolioDto>, WebError> {
    Ok(Json(state.store.portfolio_summary(&user_id)?.into()))
}

// --- Insurance ---

#[derive(Debug, Deserialize)]
pub struct QuoteBody {
    pub user_id: String,
    pub investment_amount: Decimal,
    pub base_premium: Decimal,
}

#[derive(Debug, Serialize)]
pub struct QuoteDto {
    pub user_id: String,
    pub risk_factor: Decimal,
    pub monthly_premium: Decimal,
}

pub async fn insurance_quote(
    State(state): State<Arc<AppState>>,
    Json(body): Json<QuoteBody>,
) -> Result<Json<QuoteDto>, WebError> {
    if body.investment_amount <= Decimal::ZERO {
        return Err(WebError::bad_request("investment amount must be positive"));
    }
    let ledger = state.store.ledger_snapshot(&body.user_id)?;
    let risk_factor = risk::risk_factor(body.investment_amount, &ledger);
    let monthly_premium = risk::monthly_premium(body.base_premium, risk_factor);
    Ok(Json(QuoteDto {
        user_id: body.user_id,
        risk_factor,
        monthly_premium,
    }))
}
