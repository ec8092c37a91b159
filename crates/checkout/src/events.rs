//! Typed publish/subscribe bus for checkout components.

use kilau_core::{Address, CartItem, OrderSummary, Rupiah, ShippingSelection};
use tokio::sync::broadcast;

/// Events exchanged between checkout components.
///
/// Each variant carries the full record it announces, so subscribers never
/// need to re-read storage to learn what changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutEvent {
    /// The cart was mutated. `count` is the badge value (sum of quantities).
    CartUpdated { items: Vec<CartItem>, count: u32 },
    /// The address form was pre-filled on mount.
    AddressInitialized(Address),
    /// The address form settled after input.
    AddressUpdated(Address),
    /// A concrete shipping service was confirmed.
    ShippingSelected(ShippingSelection),
    /// Shipping cost changed, including being cleared (`service: None`, cost 0).
    ShippingUpdated {
        cost: Rupiah,
        service: Option<String>,
    },
    /// The order summary was recomputed.
    OrderSummaryUpdated(OrderSummary),
}

impl CheckoutEvent {
    /// The event name used by the page scripts.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CartUpdated { .. } => "cart:updated",
            Self::AddressInitialized(_) => "checkout:address-initialized",
            Self::AddressUpdated(_) => "checkout:address-updated",
            Self::ShippingSelected(_) => "checkout:shipping-selected",
            Self::ShippingUpdated { .. } => "shippingUpdated",
            Self::OrderSummaryUpdated(_) => "checkout:order-summary-updated",
        }
    }
}

/// Broadcast bus. Cloning shares the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CheckoutEvent>,
}

impl EventBus {
    /// Create a bus that buffers up to `capacity` events per slow subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event, returning how many subscribers received it.
    pub fn publish(&self, event: CheckoutEvent) -> usize {
        let name = event.name();
        match self.tx.send(event) {
            Ok(receivers) => {
                tracing::trace!(event = name, receivers, "published");
                receivers
            }
            // No subscribers yet; nothing is listening for this event.
            Err(_) => 0,
        }
    }

    /// Subscribe to every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CheckoutEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let delivered = bus.publish(CheckoutEvent::ShippingUpdated {
            cost: Rupiah::ZERO,
            service: None,
        });
        assert_eq!(delivered, 1);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "shippingUpdated");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(4);
        assert_eq!(
            bus.publish(CheckoutEvent::AddressUpdated(Address::default())),
            0
        );
    }
}
