//! Komerce (`RajaOngkir`) wire types.

use kilau_core::{Rupiah, ServiceOption};
use serde::{Deserialize, Serialize};

/// Envelope shared by every Komerce response.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub meta: Meta,
    pub data: Option<T>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub status: String,
}

/// One row of the domestic destination search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationResult {
    pub id: u64,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub province_name: String,
    #[serde(default)]
    pub city_name: String,
    #[serde(default)]
    pub district_name: String,
    #[serde(default)]
    pub subdistrict_name: String,
    #[serde(default)]
    pub zip_code: String,
}

/// One courier service quoted by `calculate/domestic-cost`.
#[derive(Debug, Clone, Deserialize)]
pub struct RateResult {
    /// Courier display name, e.g. "Jalur Nugraha Ekakurir (JNE)".
    pub name: String,
    /// Courier code, e.g. "jne".
    pub code: String,
    pub service: String,
    #[serde(default)]
    pub description: String,
    pub cost: Rupiah,
    #[serde(default)]
    pub etd: String,
}

impl From<RateResult> for ServiceOption {
    fn from(rate: RateResult) -> Self {
        let service_name = if rate.description.is_empty() {
            rate.service.clone()
        } else {
            rate.description
        };
        Self {
            courier: rate.code.to_lowercase(),
            courier_name: rate.name,
            service: rate.service,
            service_name,
            cost: rate.cost,
            etd: rate.etd,
        }
    }
}

/// Cache key for a rate quote.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct RateKey {
    pub destination: String,
    pub weight: u32,
    pub courier: String,
}

/// Body of `orders/store` on the delivery API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentRequest {
    pub order_date: String,
    pub brand_name: String,
    pub shipper_name: String,
    pub shipper_phone: String,
    pub shipper_destination_id: String,
    pub shipper_address: String,
    pub receiver_name: String,
    pub receiver_phone: String,
    pub receiver_destination_id: String,
    pub receiver_address: String,
    pub shipping: String,
    pub shipping_type: String,
    pub payment_method: String,
    pub shipping_cost: Rupiah,
    pub grand_total: Rupiah,
    pub order_details: Vec<ShipmentLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentLine {
    pub product_name: String,
    pub product_price: Rupiah,
    pub product_weight: u32,
    pub qty: u32,
    pub subtotal: Rupiah,
}

/// Result of `orders/store`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentCreated {
    pub order_no: String,
}

/// Body of `pickup/request`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupRequest {
    pub pickup_date: String,
    pub pickup_time: String,
    #[serde(default = "default_vehicle")]
    pub pickup_vehicle: String,
    pub orders: Vec<PickupOrder>,
}

fn default_vehicle() -> String {
    "Motor".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupOrder {
    pub order_no: String,
}

/// Per-order result of a pickup request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupResult {
    #[serde(default)]
    pub status: String,
    pub order_no: String,
    #[serde(default)]
    pub awb: Option<String>,
}

/// Printable label returned by `orders/print-label`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub base_64: String,
}
