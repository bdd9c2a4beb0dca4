//! Verification endpoints

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::identity;
use super::labeling::NextWorkResponse;
use crate::error::{ApiError, ApiResult};
use crate::models::Vote;
use crate::quorum::{ItemForVerification, VoteReceipt};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitVoteRequest {
    pub item_id: Uuid,
    /// "YES" or "NO"
    pub vote: Vote,
}

/// GET /api/verify/next
pub async fn next_verification_item(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<NextWorkResponse<ItemForVerification>>> {
    let verifier_id = identity::labeler_id(&headers)?;
    let item = state.market.request_verification_work(verifier_id).await?;
    Ok(Json(NextWorkResponse { item }))
}

/// POST /api/verify/submit
pub async fn submit_vote(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SubmitVoteRequest>, JsonRejection>,
) -> ApiResult<Json<VoteReceipt>> {
    let verifier_id = identity::labeler_id(&headers)?;
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let receipt = state
        .market
        .submit_vote(verifier_id, request.item_id, request.vote)
        .await?;
    Ok(Json(receipt))
}

pub fn verification_routes() -> Router<AppState> {
    Router::new()
        .route("/api/verify/next", get(next_verification_item))
        .route("/api/verify/submit", post(submit_vote))
}
