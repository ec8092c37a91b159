//! Payment token exchange between the checkout page and `create-transaction`.

use serde::{Deserialize, Serialize};

use super::address::Address;
use super::cart::CartItem;
use super::id::UserId;
use super::price::Rupiah;
use super::shipping::ShippingSelection;

/// Buyer contact details forwarded to the payment gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Body of `POST create-transaction`.
///
/// `client_total` is what the customer saw. The server recomputes the charge
/// from catalog prices and a fresh shipping quote and never charges this
/// value directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub shipping: Option<ShippingSelection>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub customer: Option<CustomerDetails>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub client_total: Rupiah,
}

/// Response of `create-transaction`: the Snap token for the payment widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionToken {
    pub token: String,
    #[serde(default)]
    pub redirect_url: String,
    pub order_id: String,
    /// The amount the server will actually charge.
    pub gross_amount: Rupiah,
}

/// Result object reported by the payment widget callbacks.
///
/// Fields mirror the gateway's callback payload; all are optional because
/// the shape differs between success, pending and error callbacks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionResult {
    pub order_id: String,
    pub transaction_id: String,
    pub transaction_status: String,
    pub status_code: String,
    pub status_message: String,
    pub gross_amount: String,
    pub payment_type: String,
}
