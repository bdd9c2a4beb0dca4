//! Caller identity
//!
//! The upstream identity provider authenticates callers and forwards an
//! opaque id in `x-labeler-id` or `x-company-id`. Nothing here verifies it.

use axum::http::HeaderMap;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::Caller;

pub const LABELER_HEADER: &str = "x-labeler-id";
pub const COMPANY_HEADER: &str = "x-company-id";

fn header_uuid(headers: &HeaderMap, name: &str) -> ApiResult<Option<Uuid>> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| ApiError::Unauthorized(format!("{} is not valid text", name)))?;
    Uuid::parse_str(value.trim())
        .map(Some)
        .map_err(|_| ApiError::Unauthorized(format!("{} is not a valid id", name)))
}

pub fn labeler_id(headers: &HeaderMap) -> ApiResult<Uuid> {
    header_uuid(headers, LABELER_HEADER)?
        .ok_or_else(|| ApiError::Unauthorized(format!("missing {} header", LABELER_HEADER)))
}

pub fn company_id(headers: &HeaderMap) -> ApiResult<Uuid> {
    header_uuid(headers, COMPANY_HEADER)?
        .ok_or_else(|| ApiError::Unauthorized(format!("missing {} header", COMPANY_HEADER)))
}

/// Either identity; a labeler id wins when both are present
pub fn caller(headers: &HeaderMap) -> ApiResult<Caller> {
    if let Some(id) = header_uuid(headers, LABELER_HEADER)? {
        return Ok(Caller::Labeler(id));
    }
    if let Some(id) = header_uuid(headers, COMPANY_HEADER)? {
        return Ok(Caller::Company(id));
    }
    Err(ApiError::Unauthorized(format!(
        "missing {} or {} header",
        LABELER_HEADER, COMPANY_HEADER
    )))
}
