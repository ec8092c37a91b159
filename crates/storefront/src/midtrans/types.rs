//! Midtrans Snap request and notification payloads.

use kilau_core::{Address, CartItem, CustomerDetails, OrderNumber, OrderStatus, Rupiah};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Snap rejects item names longer than this.
const MAX_ITEM_NAME: usize = 50;

/// Body of `POST /snap/v1/transactions`.
#[derive(Debug, Clone, Serialize)]
pub struct SnapRequest {
    pub transaction_details: TransactionDetails,
    pub item_details: Vec<ItemDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_details: Option<SnapCustomer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callbacks: Option<Callbacks>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionDetails {
    pub order_id: String,
    pub gross_amount: Rupiah,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemDetail {
    pub id: String,
    pub price: Rupiah,
    pub quantity: u32,
    pub name: String,
}

impl ItemDetail {
    /// Snap line for a cart item priced by the catalog.
    #[must_use]
    pub fn product(item: &CartItem) -> Self {
        Self {
            id: item.id.clone(),
            price: item.price,
            quantity: item.qty,
            name: truncate(&item.name),
        }
    }

    /// Snap line carrying the shipping charge, so the lines sum to the
    /// gross amount.
    #[must_use]
    pub fn shipping(label: &str, cost: Rupiah) -> Self {
        Self {
            id: "shipping".to_string(),
            price: cost,
            quantity: 1,
            name: truncate(&format!("Ongkir {label}")),
        }
    }
}

fn truncate(name: &str) -> String {
    name.chars().take(MAX_ITEM_NAME).collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapCustomer {
    pub first_name: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<SnapAddress>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapAddress {
    pub first_name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country_code: &'static str,
}

impl SnapCustomer {
    /// Merge the buyer's contact details with the checkout address.
    #[must_use]
    pub fn new(customer: Option<&CustomerDetails>, address: Option<&Address>) -> Option<Self> {
        if customer.is_none() && address.is_none() {
            return None;
        }
        let contact = customer.cloned().unwrap_or_default();
        let shipping_address = address.map(|a| SnapAddress {
            first_name: a.recipient_name.clone(),
            phone: a.phone.clone(),
            address: a.address_line.clone(),
            city: a.city_label.clone().unwrap_or_else(|| a.city.clone()),
            postal_code: a.postal_code.clone(),
            country_code: "IDN",
        });
        let fallback_name = address.map(|a| a.recipient_name.clone()).unwrap_or_default();
        let fallback_phone = address.map(|a| a.phone.clone()).unwrap_or_default();
        Some(Self {
            first_name: if contact.name.is_empty() { fallback_name } else { contact.name },
            email: contact.email,
            phone: if contact.phone.is_empty() { fallback_phone } else { contact.phone },
            shipping_address,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Callbacks {
    pub finish: String,
}

/// Response of a successful Snap transaction request.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapResponse {
    pub token: String,
    pub redirect_url: String,
}

/// HTTP notification posted by Midtrans to `payment-callback`.
#[derive(Debug, Clone, Deserialize)]
pub struct Notification {
    pub order_id: String,
    pub status_code: String,
    /// Decimal string such as `"150000.00"`; signed verbatim.
    pub gross_amount: String,
    pub signature_key: String,
    pub transaction_status: String,
    #[serde(default)]
    pub fraud_status: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub payment_type: Option<String>,
}

impl Notification {
    #[must_use]
    pub fn order_number(&self) -> OrderNumber {
        OrderNumber::from_raw(self.order_id.clone())
    }

    /// Order status this notification moves the order to, if any.
    #[must_use]
    pub fn order_status(&self) -> Option<OrderStatus> {
        OrderStatus::from_midtrans(&self.transaction_status, self.fraud_status.as_deref())
    }

    /// Whether the notified amount equals `expected`.
    ///
    /// Unparseable amounts never match.
    #[must_use]
    pub fn amount_matches(&self, expected: Rupiah) -> bool {
        self.gross_amount
            .trim()
            .parse::<Decimal>()
            .is_ok_and(|amount| amount == Decimal::from(expected.as_u64()))
    }
}
