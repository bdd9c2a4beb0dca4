//! Labeling endpoints

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::identity;
use crate::error::{ApiError, ApiResult};
use crate::lifecycle::{ItemForLabeling, LabelReceipt};
use crate::AppState;

/// Work offer; `item` is null when nothing is available
#[derive(Debug, Serialize)]
pub struct NextWorkResponse<T> {
    pub item: Option<T>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitLabelRequest {
    pub item_id: Uuid,
    pub label: String,
}

/// GET /api/label/next
pub async fn next_labeling_item(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<NextWorkResponse<ItemForLabeling>>> {
    let labeler_id = identity::labeler_id(&headers)?;
    let item = state.market.request_labeling_work(labeler_id).await?;
    Ok(Json(NextWorkResponse { item }))
}

/// POST /api/label/submit
pub async fn submit_label(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SubmitLabelRequest>, JsonRejection>,
) -> ApiResult<Json<LabelReceipt>> {
    let labeler_id = identity::labeler_id(&headers)?;
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let receipt = state
        .market
        .submit_label(labeler_id, request.item_id, &request.label)
        .await?;
    Ok(Json(receipt))
}

pub fn labeling_routes() -> Router<AppState> {
    Router::new()
        .route("/api/label/next", get(next_labeling_item))
        .route("/api/label/submit", post(submit_label))
}
