//! Settlement endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::identity;
use crate::error::{ApiError, ApiResult};
use crate::models::Settlement;
use crate::settlement::ConfirmedSettlement;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SettlementListResponse {
    pub settlements: Vec<Settlement>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub settlement_id: Uuid,
    pub external_tx_ref: String,
}

/// GET /api/settlements
pub async fn list_settlements(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<SettlementListResponse>> {
    let labeler_id = identity::labeler_id(&headers)?;
    let settlements = state.market.list_settlements(labeler_id).await?;
    Ok(Json(SettlementListResponse { settlements }))
}

/// GET /api/settlements/:id
pub async fn get_settlement(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(settlement_id): Path<Uuid>,
) -> ApiResult<Json<Settlement>> {
    let caller = identity::caller(&headers)?;
    Ok(Json(state.market.get_settlement(caller, settlement_id).await?))
}

/// POST /api/settlements/confirm
///
/// Called once the external ledger has accepted the claim or lock.
pub async fn confirm_settlement(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ConfirmRequest>, JsonRejection>,
) -> ApiResult<Json<ConfirmedSettlement>> {
    let caller = identity::caller(&headers)?;
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let confirmed = state
        .market
        .confirm_claim(caller, request.settlement_id, &request.external_tx_ref)
        .await?;
    Ok(Json(confirmed))
}

pub fn settlement_routes() -> Router<AppState> {
    Router::new()
        .route("/api/settlements", get(list_settlements))
        .route("/api/settlements/confirm", post(confirm_settlement))
        .route("/api/settlements/:id", get(get_settlement))
}
