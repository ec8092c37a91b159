//! Row shapes of the Supabase tables.

use chrono::{DateTime, Utc};
use kilau_core::{
    Address, CartItem, CustomerDetails, OrderNumber, OrderStatus, ProductId, Role, Rupiah,
    ShippingSelection, User, UserId, VendorId, slugify,
};
use serde::{Deserialize, Serialize};

/// `profiles` row, keyed by the auth user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRow {
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub role: Role,
    /// Last address saved from the checkout form.
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<ProfileRow> for User {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            role: row.role,
        }
    }
}

/// `products` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRow {
    pub id: ProductId,
    pub slug: String,
    pub name: String,
    pub price: Rupiah,
    /// Shipping weight in grams.
    #[serde(default)]
    pub weight: Option<u32>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub vendor_id: Option<VendorId>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_true() -> bool {
    true
}

/// Body for inserting a product. The id is generated by the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    #[serde(default)]
    pub slug: String,
    pub name: String,
    pub price: Rupiah,
    #[serde(default)]
    pub weight: Option<u32>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub vendor_id: Option<VendorId>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl NewProduct {
    /// Trim the name, derive a missing slug from it and reject unusable
    /// values. The error is a user-facing message.
    ///
    /// # Errors
    ///
    /// Returns the message to show when the name is blank or the price is
    /// zero.
    pub fn normalize(&mut self) -> Result<(), String> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err("Nama produk wajib diisi".to_string());
        }
        if self.price.is_zero() {
            return Err("Harga produk harus lebih dari 0".to_string());
        }
        self.slug = if self.slug.trim().is_empty() {
            slugify(&self.name)
        } else {
            slugify(&self.slug)
        };
        if self.slug.is_empty() {
            return Err("Slug produk tidak valid".to_string());
        }
        Ok(())
    }
}

/// Partial product update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Rupiah>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl ProductPatch {
    /// Whether the patch would change nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.price.is_none()
            && self.weight.is_none()
            && self.stock.is_none()
            && self.description.is_none()
            && self.image_url.is_none()
            && self.is_active.is_none()
    }
}

/// `orders` row, keyed by the merchant order number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRow {
    pub order_number: OrderNumber,
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub shipping: Option<ShippingSelection>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub customer: Option<CustomerDetails>,
    pub subtotal: Rupiah,
    pub shipping_cost: Rupiah,
    pub total: Rupiah,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub komerce_order_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// `vendors` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorRow {
    pub id: VendorId,
    pub user_id: UserId,
    pub store_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}
