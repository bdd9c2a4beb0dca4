//! Ingest endpoints used by the identity provider and company onboarding

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::identity;
use crate::error::{ApiError, ApiResult};
use crate::ingest::{CreatedDataset, NewDataset};
use crate::models::{Dataset, Item, ItemStatus, Labeler};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterLabelerRequest {
    pub wallet_address: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateDatasetRequest {
    pub name: String,
    pub labels: Vec<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    pub amount_locked: Decimal,
    #[serde(default = "default_verification_required")]
    pub verification_required: bool,
    #[serde(default)]
    pub external_id: Option<String>,
}

fn default_verification_required() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct AddItemsRequest {
    pub image_urls: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ItemSummary {
    pub item_id: Uuid,
    pub image_url: String,
    pub reward_value: Decimal,
    pub status: ItemStatus,
}

impl From<Item> for ItemSummary {
    fn from(item: Item) -> Self {
        Self {
            item_id: item.id,
            status: item.status(),
            image_url: item.image_url,
            reward_value: item.reward_value,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AddItemsResponse {
    pub dataset_id: Uuid,
    pub items: Vec<ItemSummary>,
}

/// POST /api/ingest/labelers
pub async fn register_labeler(
    State(state): State<AppState>,
    payload: Result<Json<RegisterLabelerRequest>, JsonRejection>,
) -> ApiResult<Json<Labeler>> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    Ok(Json(state.market.register_labeler(&request.wallet_address).await?))
}

/// POST /api/ingest/datasets
pub async fn create_dataset(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateDatasetRequest>, JsonRejection>,
) -> ApiResult<Json<CreatedDataset>> {
    let company_id = identity::company_id(&headers)?;
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let created = state
        .market
        .create_dataset(NewDataset {
            company_id,
            name: request.name,
            labels: request.labels,
            instructions: request.instructions,
            amount_locked: request.amount_locked,
            verification_required: request.verification_required,
            external_id: request.external_id,
        })
        .await?;
    Ok(Json(created))
}

/// POST /api/ingest/datasets/:id/items
pub async fn add_items(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(dataset_id): Path<Uuid>,
    payload: Result<Json<AddItemsRequest>, JsonRejection>,
) -> ApiResult<Json<AddItemsResponse>> {
    let company_id = identity::company_id(&headers)?;
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let items = state
        .market
        .add_items(company_id, dataset_id, &request.image_urls)
        .await?;
    Ok(Json(AddItemsResponse {
        dataset_id,
        items: items.into_iter().map(ItemSummary::from).collect(),
    }))
}

/// POST /api/ingest/datasets/:id/expire
pub async fn expire_dataset(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(dataset_id): Path<Uuid>,
) -> ApiResult<Json<Dataset>> {
    let company_id = identity::company_id(&headers)?;
    Ok(Json(state.market.expire_dataset(company_id, dataset_id).await?))
}

pub fn ingest_routes() -> Router<AppState> {
    Router::new()
        .route("/api/ingest/labelers", post(register_labeler))
        .route("/api/ingest/datasets", post(create_dataset))
        .route("/api/ingest/datasets/:id/items", post(add_items))
        .route("/api/ingest/datasets/:id/expire", post(expire_dataset))
}
