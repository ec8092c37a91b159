//! Shipping rates.
//!
//! One [`ShippingResolver`] drives the courier/service selection for every
//! rate source. Sources implement [`RateProvider`]: the storefront shipping
//! endpoint (see [`crate::api::StorefrontApi`]) or the built-in
//! [`StaticRateProvider`] table.

mod providers;
mod resolver;

pub use providers::StaticRateProvider;
pub use resolver::{SelectionMeta, ShippingResolver, ShippingView};

use async_trait::async_trait;
use kilau_core::{Destination, ServiceOption};
use thiserror::Error;

use crate::api::ApiError;

/// Errors from rate lookups and service selection.
#[derive(Debug, Error)]
pub enum RateError {
    /// The rate endpoint failed.
    #[error("rate lookup failed: {0}")]
    Api(#[from] ApiError),

    /// The requested courier/service pair is not in the current option list.
    #[error("service {courier} {service} is not available for this destination")]
    UnknownService { courier: String, service: String },

    /// No destination has been entered yet.
    #[error("destination is incomplete")]
    NoDestination,
}

/// A source of shipping quotes.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Quote every service of the given couriers for a parcel.
    ///
    /// `courier` is a colon-separated list of courier codes, e.g.
    /// `jne:pos:tiki`.
    async fn fetch_rates(
        &self,
        destination: &Destination,
        weight_grams: u32,
        courier: &str,
    ) -> Result<Vec<ServiceOption>, RateError>;
}
