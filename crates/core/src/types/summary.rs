//! Derived order summary.

use serde::ser::{Serialize, SerializeStruct, Serializer};

use super::cart::CartItem;
use super::price::Rupiah;
use super::shipping::ShippingSelection;

/// Subtotal, shipping and total for the current checkout.
///
/// Only `subtotal` and `shipping` are stored; `total` is always computed so it
/// cannot drift from its parts. The type is never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrderSummary {
    subtotal: Rupiah,
    shipping: Rupiah,
}

impl OrderSummary {
    /// Build a summary from its two independent parts.
    #[must_use]
    pub const fn new(subtotal: Rupiah, shipping: Rupiah) -> Self {
        Self { subtotal, shipping }
    }

    /// Compute the summary for a cart and an optional shipping selection.
    #[must_use]
    pub fn compute(items: &[CartItem], shipping: Option<&ShippingSelection>) -> Self {
        Self {
            subtotal: items.iter().map(CartItem::line_total).sum(),
            shipping: shipping.map_or(Rupiah::ZERO, |s| s.cost),
        }
    }

    #[must_use]
    pub const fn subtotal(&self) -> Rupiah {
        self.subtotal
    }

    #[must_use]
    pub const fn shipping(&self) -> Rupiah {
        self.shipping
    }

    #[must_use]
    pub fn total(&self) -> Rupiah {
        self.subtotal + self.shipping
    }
}

/// Serializes as the `{ subtotal, shipping, total }` triple.
impl Serialize for OrderSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("OrderSummary", 3)?;
        state.serialize_field("subtotal", &self.subtotal)?;
        state.serialize_field("shipping", &self.shipping)?;
        state.serialize_field("total", &self.total())?;
        state.end()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_total_is_sum_without_shipping() {
        let items = vec![CartItem {
            qty: 2,
            ..CartItem::new("Wax Kit", Rupiah::new(150_000))
        }];
        let summary = OrderSummary::compute(&items, None);
        assert_eq!(summary.subtotal(), Rupiah::new(300_000));
        assert_eq!(summary.shipping(), Rupiah::ZERO);
        assert_eq!(summary.total(), Rupiah::new(300_000));
    }

    #[test]
    fn test_serializes_triple() {
        let summary = OrderSummary::new(Rupiah::new(300_000), Rupiah::new(20_000));
        let json = serde_json::to_value(summary).unwrap();
        assert_eq!(json["total"], 320_000);
    }
}
