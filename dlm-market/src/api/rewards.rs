//! Reward endpoints: pending balances, earnings summary, claim issuance

use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Serialize;

use super::identity;
use crate::error::ApiResult;
use crate::ledger::{EarningsSummary, PendingBalance};
use crate::settlement::ClaimTicket;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PendingResponse {
    pub balances: Vec<PendingBalance>,
    pub total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    pub claims: Vec<ClaimTicket>,
}

/// GET /api/rewards/pending
pub async fn pending_balance(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<PendingResponse>> {
    let labeler_id = identity::labeler_id(&headers)?;
    let balances = state.market.pending_balance(labeler_id).await?;
    let total = balances.iter().map(|b| b.amount).sum();
    Ok(Json(PendingResponse { balances, total }))
}

/// GET /api/rewards/summary
pub async fn earnings_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<EarningsSummary>> {
    let labeler_id = identity::labeler_id(&headers)?;
    Ok(Json(state.market.earnings_summary(labeler_id).await?))
}

/// POST /api/rewards/claim
pub async fn initiate_claim(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<ClaimResponse>> {
    let labeler_id = identity::labeler_id(&headers)?;
    let claims = state.market.initiate_claim(labeler_id).await?;
    Ok(Json(ClaimResponse { claims }))
}

pub fn reward_routes() -> Router<AppState> {
    Router::new()
        .route("/api/rewards/pending", get(pending_balance))
        .route("/api/rewards/summary", get(earnings_summary))
        .route("/api/rewards/claim", post(initiate_claim))
}
