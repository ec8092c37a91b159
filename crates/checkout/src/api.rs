//! HTTP adapters to the storefront functions.

use async_trait::async_trait;
use kilau_core::{
    Address, Destination, RateQuery, RatesResponse, ServiceOption, TransactionRequest,
    TransactionToken, User, UserId,
};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::address::AddressSource;
use crate::payment::TokenClient;
use crate::shipping::{RateError, RateProvider};
use crate::storage::{Storage, StorageExt, keys};

/// Errors talking to the storefront API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with an error status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The endpoint path could not be joined to the base URL.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// HTTP status of an error response, if there was one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(_) | Self::Url(_) => None,
        }
    }
}

/// `{"error": "..."}` body returned by every failing endpoint.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "message")]
    error: String,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    #[serde(default)]
    address: Option<Address>,
}

/// Shipper details for `admin-shipments`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShipmentDetails {
    pub order_id: String,
    pub brand_name: String,
    pub shipper_name: String,
    pub shipper_phone: String,
    pub shipper_address: String,
}

#[derive(Debug, Deserialize)]
struct ShipmentCreated {
    komerce_order_no: String,
}

/// Client for the storefront `/api/` functions.
#[derive(Debug, Clone)]
pub struct StorefrontApi {
    client: reqwest::Client,
    base: Url,
}

impl StorefrontApi {
    /// Create a client for the API rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or the HTTP client fails to build.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!("kilau-checkout/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, base })
    }

    /// The base URL requests are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base.join(path)?)
    }

    /// Create the Komerce shipment for a paid order from the admin
    /// dashboard and remember its number under `komerce_order_no`.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the storefront refuses it
    /// (not an admin, order unpaid or already shipped).
    #[tracing::instrument(skip(self, details, storage), fields(order_id = %details.order_id))]
    pub async fn create_shipment(
        &self,
        admin_id: &UserId,
        details: &ShipmentDetails,
        storage: &dyn Storage,
    ) -> Result<String, ApiError> {
        let response = self
            .client
            .post(self.endpoint("admin-shipments")?)
            .header("x-admin-id", admin_id.to_string())
            .json(details)
            .send()
            .await?;
        let created: ShipmentCreated = Self::read(response).await?;
        if let Err(e) = storage.write_json(keys::KOMERCE_ORDER_NO, &created.komerce_order_no) {
            tracing::warn!(error = %e, "shipment number not persisted");
        }
        Ok(created.komerce_order_no)
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| body.error)
                .unwrap_or(text);
            return Err(ApiError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl RateProvider for StorefrontApi {
    #[tracing::instrument(skip(self, destination), fields(destination = destination.location_id()))]
    async fn fetch_rates(
        &self,
        destination: &Destination,
        weight_grams: u32,
        courier: &str,
    ) -> Result<Vec<ServiceOption>, RateError> {
        let query = RateQuery {
            destination: destination.location_id().to_owned(),
            weight: weight_grams,
            courier: courier.to_owned(),
        };
        let response = self
            .client
            .post(self.endpoint("shipping")?)
            .json(&query)
            .send()
            .await
            .map_err(ApiError::from)?;
        let rates: RatesResponse = Self::read(response).await?;
        Ok(rates.data)
    }
}

#[async_trait]
impl TokenClient for StorefrontApi {
    #[tracing::instrument(skip_all)]
    async fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<TransactionToken, ApiError> {
        let response = self
            .client
            .post(self.endpoint("create-transaction")?)
            .json(request)
            .send()
            .await?;
        Self::read(response).await
    }
}

#[async_trait]
impl AddressSource for StorefrontApi {
    #[tracing::instrument(skip_all, fields(user_id = %user.id))]
    async fn fetch_address(&self, user: &User) -> Result<Option<Address>, ApiError> {
        let mut url = self.endpoint("auth-profile")?;
        url.query_pairs_mut().append_pair("user_id", &user.id.to_string());
        let response = self.client.get(url).send().await?;
        let profile: ProfileResponse = Self::read(response).await?;
        Ok(profile.address)
    }
}
