//! JSON HTTP adapter.
//!
//! Exposes the store operations as a REST-style API. Identity is taken at
//! face value from paths and request bodies; authentication lives in front
//! of this service.

mod error;
mod handlers;

pub use error::WebError;
pub use handlers::*;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use chrono::Utc;
use log::{info, warn};

use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::StorePort;

pub struct AppState {
    pub store: Arc<dyn StorePort + Send + Sync>,
    pub config: Arc<dyn ConfigPort + Send + Sync>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/companies", get(handlers::list_companies))
        .route(
            "/indexes",
            get(handlers::list_indexes).post(handlers::create_index),
        )
        .route("/indexes/{id}", get(handlers::get_index))
        .route(
            "/indexes/{id}/companies",
            get(handlers::index_companies).put(handlers::set_index_companies),
        )
        .route("/indexes/{id}/activate", post(handlers::activate_index))
        .route("/indexes/{id}/start-voting", post(handlers::start_voting))
        .route("/indexes/{id}/execute", post(handlers::execute_index))
        .route("/indexes/{id}/archive", post(handlers::archive_index))
        .route("/indexes/{id}/draft", post(handlers::set_draft))
        .route("/indexes/{id}/ballots", post(handlers::submit_ballot))
        .route("/indexes/{id}/vote-weights", get(handlers::vote_weights))
        .route("/accounts/{user_id}", get(handlers::balance))
        .route("/accounts/{user_id}/deposit", post(handlers::deposit))
        .route("/investments", post(handlers::create_investment))
        .route("/investments/{id}", get(handlers::get_investment))
        .route("/investments/{id}/withdraw", post(handlers::withdraw))
        .route(
            "/investments/{id}/positions",
            get(handlers::list_positions).post(handlers::generate_positions),
        )
        .route("/users/{user_id}/investments", get(handlers::user_investments))
        .route("/users/{user_id}/portfolio", get(handlers::portfolio))
        .route("/insurance/quote", post(handlers::insurance_quote))
        .with_state(Arc::new(state))
}

/// Periodic revaluation of in-flight investments from current company
/// prices. The first tick fires after one full interval.
pub fn spawn_revaluation_task(
    store: Arc<dyn StorePort + Send + Sync>,
    interval_seconds: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds));
        interval.tick().await;
        loop {
            interval.tick().await;
            match store.revalue_investments(Utc::now()) {
                Ok(count) => info!("background revaluation updated {count} investments"),
                Err(e) => warn!("background revaluation failed: {e}"),
            }
        }
    })
}
