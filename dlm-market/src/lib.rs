//! dlm-market library - consensus and settlement core
//!
//! Item lifecycle, verification quorum, reputation, reward ledger and
//! claim settlement for the data-labeling marketplace, plus the HTTP
//! router that exposes them.

use axum::Router;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod ledger;
pub mod lifecycle;
pub mod market;
pub mod models;
pub mod quorum;
pub mod reputation;
pub mod rewards;
pub mod settlement;
pub mod signer;
pub mod utils;

pub use error::{ApiError, ApiResult, MarketError, MarketResult};
pub use market::Market;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub market: Market,
    /// Server start time, reported by the health endpoint
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(market: Market) -> Self {
        Self {
            market,
            startup_time: chrono::Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::labeling_routes())
        .merge(api::verification_routes())
        .merge(api::reward_routes())
        .merge(api::settlement_routes())
        .merge(api::ingest_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
