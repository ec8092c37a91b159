//! Shipping functions: rate quotes and destination search.

use axum::{Json, extract::State};
use kilau_core::{RateQuery, RatesResponse};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{ApiJson, ApiQuery};
use crate::error::{AppError, Result};
use crate::komerce::DestinationResult;
use crate::state::AppState;

const MIN_SEARCH_LEN: usize = 3;
const DEFAULT_SEARCH_LIMIT: u32 = 10;
const MAX_SEARCH_LIMIT: u32 = 50;

/// Rate query as received; every field is optional so a missing one can be
/// named in the error.
#[derive(Debug, Default, Deserialize)]
pub struct RateParams {
    pub destination: Option<String>,
    pub weight: Option<u32>,
    pub courier: Option<String>,
}

impl RateParams {
    /// Validate and fill in defaults. Weight is clamped to at least 1 g.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` naming the first missing field.
    pub fn into_query(self, default_couriers: &str) -> Result<RateQuery> {
        let destination = self
            .destination
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .ok_or_else(|| AppError::BadRequest("Missing field: destination".to_string()))?;
        let weight = self
            .weight
            .ok_or_else(|| AppError::BadRequest("Missing field: weight".to_string()))?
            .max(1);
        let courier = self
            .courier
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| default_couriers.to_string());
        Ok(RateQuery {
            destination,
            weight,
            courier,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct DestinationParams {
    #[serde(default)]
    pub search: String,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct DestinationsResponse {
    pub data: Vec<DestinationResult>,
}

/// `GET /api/shipping?destination=&weight=&courier=`
pub async fn rates_get(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<RateParams>,
) -> Result<Json<RatesResponse>> {
    quote(&state, params).await
}

/// `POST /api/shipping`
pub async fn rates_post(
    State(state): State<AppState>,
    ApiJson(params): ApiJson<RateParams>,
) -> Result<Json<RatesResponse>> {
    quote(&state, params).await
}

#[instrument(skip(state))]
async fn quote(state: &AppState, params: RateParams) -> Result<Json<RatesResponse>> {
    let query = params.into_query(state.komerce().couriers())?;
    let data = state
        .komerce()
        .calculate_rates(&query.destination, query.weight, &query.courier)
        .await?;
    tracing::debug!(services = data.len(), "Rates quoted");
    Ok(Json(RatesResponse { data }))
}

/// `GET /api/shipping/destinations?search=`
#[instrument(skip(state))]
pub async fn destinations(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<DestinationParams>,
) -> Result<Json<DestinationsResponse>> {
    let search = params.search.trim();
    if search.chars().count() < MIN_SEARCH_LEN {
        return Err(AppError::BadRequest(format!(
            "Kata kunci minimal {MIN_SEARCH_LEN} karakter"
        )));
    }
    let limit = params
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);
    let data = state.komerce().search_destinations(search, limit).await?;
    Ok(Json(DestinationsResponse { data }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_destination_named() {
        let err = RateParams {
            weight: Some(1000),
            ..RateParams::default()
        }
        .into_query("jne")
        .unwrap_err();
        assert_eq!(err.to_string(), "Missing field: destination");
    }

    #[test]
    fn test_missing_weight_named() {
        let err = RateParams {
            destination: Some("1330".into()),
            ..RateParams::default()
        }
        .into_query("jne")
        .unwrap_err();
        assert_eq!(err.to_string(), "Missing field: weight");
    }

    #[test]
    fn test_defaults_and_clamp() {
        let query = RateParams {
            destination: Some(" 1330 ".into()),
            weight: Some(0),
            courier: Some("  ".into()),
        }
        .into_query("jne:pos:tiki")
        .unwrap();
        assert_eq!(query.destination, "1330");
        assert_eq!(query.weight, 1);
        assert_eq!(query.courier, "jne:pos:tiki");
    }
}
