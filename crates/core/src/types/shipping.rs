//! Shipping quotes and the customer's chosen service.

use serde::{Deserialize, Serialize};

use super::price::Rupiah;

/// One courier service returned by a rate lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOption {
    /// Courier code, e.g. `jne`.
    pub courier: String,
    /// Courier display name.
    pub courier_name: String,
    /// Service code, e.g. `REG`.
    pub service: String,
    /// Service display name or description.
    pub service_name: String,
    /// Shipping cost for the quoted weight.
    pub cost: Rupiah,
    /// Estimated time of delivery, e.g. `2-3 day`.
    #[serde(default)]
    pub etd: String,
}

impl ServiceOption {
    /// Whether this option is the given courier/service pair.
    /// Codes compare case-insensitively; providers disagree on casing.
    #[must_use]
    pub fn matches(&self, courier: &str, service: &str) -> bool {
        self.courier.eq_ignore_ascii_case(courier) && self.service.eq_ignore_ascii_case(service)
    }
}

/// A courier entry for the courier select.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourierOption {
    pub code: String,
    pub name: String,
}

/// The service the customer picked, persisted under `checkout:shipping`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingSelection {
    pub courier: String,
    #[serde(default)]
    pub courier_name: String,
    pub service: String,
    #[serde(default)]
    pub service_name: String,
    pub cost: Rupiah,
    #[serde(default)]
    pub etd: String,
}

impl ShippingSelection {
    /// Label stored under `shipping_service`, e.g. `JNE REG`.
    #[must_use]
    pub fn display_label(&self) -> String {
        format!("{} {}", self.courier.to_uppercase(), self.service)
    }
}

impl From<&ServiceOption> for ShippingSelection {
    fn from(option: &ServiceOption) -> Self {
        Self {
            courier: option.courier.clone(),
            courier_name: option.courier_name.clone(),
            service: option.service.clone(),
            service_name: option.service_name.clone(),
            cost: option.cost,
            etd: option.etd.clone(),
        }
    }
}

/// Query of the `shipping` rate endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateQuery {
    /// Destination location id (subdistrict, else district).
    pub destination: String,
    /// Parcel weight in grams.
    pub weight: u32,
    /// Colon-separated courier codes, e.g. `jne:pos:tiki`.
    pub courier: String,
}

/// Response of the `shipping` rate endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatesResponse {
    pub data: Vec<ServiceOption>,
}
