//! Cart line items as persisted under the `cart` storage key.

use serde::{Deserialize, Serialize};

use super::price::Rupiah;

/// Weight assumed for a unit whose product record carries no weight.
pub const DEFAULT_ITEM_WEIGHT_GRAMS: u32 = 500;

/// A line in the shopping cart.
///
/// The `id` is the [`slugify`]d product name; adding a product whose name
/// normalizes to an existing id merges into that line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Normalized name slug, the identity key.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Unit price.
    pub price: Rupiah,
    /// Quantity, always at least 1 while the line exists.
    #[serde(alias = "quantity")]
    pub qty: u32,
    /// Unit weight in grams, when the product record provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
}

impl CartItem {
    /// Create a single-unit line for a product.
    #[must_use]
    pub fn new(name: &str, price: Rupiah) -> Self {
        Self {
            id: slugify(name),
            name: name.trim().to_owned(),
            price,
            qty: 1,
            weight: None,
        }
    }

    /// Attach the product's unit weight.
    #[must_use]
    pub const fn with_weight(mut self, grams: u32) -> Self {
        self.weight = Some(grams);
        self
    }

    /// Price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Rupiah {
        self.price.times(self.qty)
    }

    /// Unit weight, falling back to `default_grams`.
    #[must_use]
    pub fn unit_weight(&self, default_grams: u32) -> u32 {
        self.weight.filter(|w| *w > 0).unwrap_or(default_grams)
    }
}

/// Normalize a product name into its cart identity key.
///
/// Lowercases, collapses every run of non-alphanumeric characters into a
/// single `-`, and strips leading/trailing dashes.
///
/// ```
/// use kilau_core::slugify;
///
/// assert_eq!(slugify("  Wax Kit (Large) "), "wax-kit-large");
/// assert_eq!(slugify("wax   kit"), slugify("Wax Kit"));
/// ```
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Total shipping weight of a cart in grams.
///
/// Each unit weighs its product weight, or `default_grams` when unknown.
/// The result is never below 1 g, since rate APIs reject zero weight.
#[must_use]
pub fn cart_weight(items: &[CartItem], default_grams: u32) -> u32 {
    items
        .iter()
        .map(|item| item.unit_weight(default_grams).saturating_mul(item.qty))
        .fold(0u32, u32::saturating_add)
        .max(1)
}
