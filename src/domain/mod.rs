//! Core domain types and algorithms: companies, index lifecycle, voting,
//! rebalancing, and the investment ledger. Pure logic only; persistence and
//! transport live in the adapters.

pub mod account;
pub mod company;
pub mod error;
pub mod index;
pub mod investment;
pub mod portfolio;
pub mod rebalance;
pub mod risk;
pub mod voting;
