//! Checkout library configuration.

use std::time::Duration;

use kilau_core::DEFAULT_ITEM_WEIGHT_GRAMS;

/// Which rate source the shipping resolver uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateProviderMode {
    /// Live rates from the storefront shipping endpoint only.
    Live,
    /// The built-in static table only.
    Static,
    /// Live rates, degrading to the static table on failure.
    #[default]
    LiveWithStaticFallback,
}

/// Settings for one checkout page.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Base URL of the storefront API, e.g. `https://kilau.id/api/`.
    pub api_base_url: String,
    pub rate_mode: RateProviderMode,
    /// Silence required before an address edit is committed.
    pub address_debounce: Duration,
    /// Silence required before rates are fetched.
    pub shipping_debounce: Duration,
    /// Unit weight for products without a weight.
    pub default_item_weight_grams: u32,
    /// Courier codes to quote, in display order.
    pub couriers: Vec<String>,
    pub success_path: String,
    pub pending_path: String,
    /// Per-subscriber event buffer.
    pub event_capacity: usize,
}

impl CheckoutConfig {
    /// Courier list in the `jne:pos:tiki` form the rate endpoint expects.
    #[must_use]
    pub fn couriers_param(&self) -> String {
        self.couriers.join(":")
    }
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:3000/api/".to_owned(),
            rate_mode: RateProviderMode::default(),
            address_debounce: Duration::from_millis(250),
            shipping_debounce: Duration::from_millis(300),
            default_item_weight_grams: DEFAULT_ITEM_WEIGHT_GRAMS,
            couriers: ["jne", "pos", "tiki"].map(String::from).to_vec(),
            success_path: "/checkout/success".to_owned(),
            pending_path: "/checkout/pending".to_owned(),
            event_capacity: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CheckoutConfig::default();
        assert_eq!(config.address_debounce, Duration::from_millis(250));
        assert_eq!(config.shipping_debounce, Duration::from_millis(300));
        assert_eq!(config.default_item_weight_grams, 500);
        assert_eq!(config.couriers_param(), "jne:pos:tiki");
        assert_eq!(config.rate_mode, RateProviderMode::LiveWithStaticFallback);
    }
}
