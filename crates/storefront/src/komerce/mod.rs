//! Komerce client: `RajaOngkir` rates and destinations, plus the delivery
//! API for shipments, pickups and labels.
//!
//! Rate quotes are cached for 5 minutes, keyed by destination, weight and
//! courier list.

pub mod types;

use std::sync::Arc;
use std::time::Duration;

use kilau_core::ServiceOption;
use moka::future::Cache;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::KomerceConfig;

pub use types::{
    DestinationResult, Label, PickupOrder, PickupRequest, PickupResult, RateKey, RateResult,
    ShipmentCreated, ShipmentLine, ShipmentRequest,
};
use types::Envelope;

/// Errors that can occur when interacting with Komerce.
#[derive(Debug, Error)]
pub enum KomerceError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Komerce answered with an error status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// A successful envelope carried no data.
    #[error("Empty response: {0}")]
    Empty(String),

    /// The API key cannot be used as a header value.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

/// Komerce API client.
#[derive(Clone)]
pub struct KomerceClient {
    inner: Arc<KomerceClientInner>,
}

struct KomerceClientInner {
    client: reqwest::Client,
    base_url: String,
    delivery_url: String,
    origin_id: String,
    couriers: String,
    rates: Cache<RateKey, Vec<ServiceOption>>,
}

impl KomerceClient {
    /// Create a new Komerce client.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &KomerceConfig) -> Result<Self, KomerceError> {
        let key = config.api_key.expose_secret();
        let mut headers = HeaderMap::new();
        // Rate API reads `key`, delivery API reads `x-api-key`
        for name in ["key", "x-api-key"] {
            let mut value = HeaderValue::from_str(key)
                .map_err(|e| KomerceError::InvalidHeader(e.to_string()))?;
            value.set_sensitive(true);
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(15))
            .build()?;

        let rates = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Ok(Self {
            inner: Arc::new(KomerceClientInner {
                client,
                base_url: config.base_url.clone(),
                delivery_url: config.delivery_url.clone(),
                origin_id: config.origin_id.clone(),
                couriers: config.couriers.clone(),
                rates,
            }),
        })
    }

    /// Warehouse location id used as the shipping origin.
    #[must_use]
    pub fn origin_id(&self) -> &str {
        &self.inner.origin_id
    }

    /// Default colon-separated courier list.
    #[must_use]
    pub fn couriers(&self) -> &str {
        &self.inner.couriers
    }

    /// Search provinces, cities, districts and subdistricts by name or
    /// postal code.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self))]
    pub async fn search_destinations(
        &self,
        search: &str,
        limit: u32,
    ) -> Result<Vec<DestinationResult>, KomerceError> {
        let response = self
            .inner
            .client
            .get(format!(
                "{}/destination/domestic-destination",
                self.inner.base_url
            ))
            .query(&[
                ("search", search.to_string()),
                ("limit", limit.to_string()),
                ("offset", "0".to_string()),
            ])
            .send()
            .await?;
        Ok(read_envelope::<Vec<DestinationResult>>(response)
            .await?
            .unwrap_or_default())
    }

    /// Quote every service of `couriers` from the warehouse to `destination`.
    ///
    /// "Not found" answers are an empty list, not an error.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self))]
    pub async fn calculate_rates(
        &self,
        destination: &str,
        weight: u32,
        couriers: &str,
    ) -> Result<Vec<ServiceOption>, KomerceError> {
        let key = RateKey {
            destination: destination.to_string(),
            weight: weight.max(1),
            courier: couriers.to_lowercase(),
        };
        if let Some(cached) = self.inner.rates.get(&key).await {
            debug!("Cache hit for rates");
            return Ok(cached);
        }

        let weight = key.weight.to_string();
        let response = self
            .inner
            .client
            .post(format!("{}/calculate/domestic-cost", self.inner.base_url))
            .form(&[
                ("origin", self.inner.origin_id.as_str()),
                ("destination", destination),
                ("weight", weight.as_str()),
                ("courier", key.courier.as_str()),
                ("price", "lowest"),
            ])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let options: Vec<ServiceOption> = read_envelope::<Vec<RateResult>>(response)
            .await?
            .unwrap_or_default()
            .into_iter()
            .map(ServiceOption::from)
            .collect();

        self.inner.rates.insert(key, options.clone()).await;
        Ok(options)
    }

    /// Create a shipment for a paid order.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Komerce returns no order number.
    #[instrument(skip(self, request))]
    pub async fn create_order(
        &self,
        request: &ShipmentRequest,
    ) -> Result<ShipmentCreated, KomerceError> {
        let response = self
            .inner
            .client
            .post(format!("{}/orders/store", self.inner.delivery_url))
            .json(request)
            .send()
            .await?;
        read_envelope(response)
            .await?
            .ok_or_else(|| KomerceError::Empty("orders/store".to_string()))
    }

    /// Ask the courier to collect shipments.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self, request))]
    pub async fn request_pickup(
        &self,
        request: &PickupRequest,
    ) -> Result<Vec<PickupResult>, KomerceError> {
        let response = self
            .inner
            .client
            .post(format!("{}/pickup/request", self.inner.delivery_url))
            .json(request)
            .send()
            .await?;
        Ok(read_envelope(response).await?.unwrap_or_default())
    }

    /// Fetch a printable label for one or more comma-separated order numbers.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or no label is returned.
    #[instrument(skip(self))]
    pub async fn print_label(&self, order_no: &str) -> Result<Label, KomerceError> {
        let response = self
            .inner
            .client
            .post(format!("{}/orders/print-label", self.inner.delivery_url))
            .query(&[("page", "page_2"), ("order_no", order_no)])
            .send()
            .await?;
        read_envelope(response)
            .await?
            .ok_or_else(|| KomerceError::Empty("orders/print-label".to_string()))
    }
}

async fn read_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<Option<T>, KomerceError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        let message = serde_json::from_str::<Envelope<serde_json::Value>>(&text)
            .ok()
            .map(|e| e.meta.message)
            .filter(|m| !m.is_empty())
            .unwrap_or(text);
        return Err(KomerceError::Api {
            status: status.as_u16(),
            message,
        });
    }
    let envelope: Envelope<T> = serde_json::from_str(&text).map_err(|e| KomerceError::Api {
        status: status.as_u16(),
        message: format!("unexpected body: {e}"),
    })?;
    Ok(envelope.data)
}
