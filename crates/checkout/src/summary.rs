//! Order summary aggregation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use kilau_core::{CartItem, OrderSummary, Rupiah, ShippingSelection};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::events::{CheckoutEvent, EventBus};
use crate::storage::{Storage, StorageExt, keys};

/// Display strings for the summary panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSummary {
    pub subtotal: String,
    pub shipping: String,
    pub total: String,
}

impl From<&OrderSummary> for RenderedSummary {
    fn from(summary: &OrderSummary) -> Self {
        Self {
            subtotal: summary.subtotal().to_string(),
            shipping: summary.shipping().to_string(),
            total: summary.total().to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    /// Last cart seen on the bus; storage is read until one arrives.
    items: Option<Vec<CartItem>>,
    /// Last shipping cost seen on the bus.
    shipping: Option<Rupiah>,
    latest: Option<OrderSummary>,
}

/// Recomputes subtotal, shipping and total on cart and shipping changes.
pub struct SummaryAggregator {
    storage: Arc<dyn Storage>,
    bus: EventBus,
    state: Mutex<State>,
}

impl SummaryAggregator {
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, bus: EventBus) -> Self {
        Self {
            storage,
            bus,
            state: Mutex::default(),
        }
    }

    /// React to bus events until the bus closes.
    pub async fn run(&self, mut rx: broadcast::Receiver<CheckoutEvent>) {
        self.recompute();
        loop {
            match rx.recv().await {
                Ok(CheckoutEvent::CartUpdated { items, .. }) => {
                    self.lock().items = Some(items);
                    self.recompute();
                }
                Ok(CheckoutEvent::ShippingSelected(selection)) => {
                    self.lock().shipping = Some(selection.cost);
                    self.recompute();
                }
                Ok(CheckoutEvent::ShippingUpdated { cost, .. }) => {
                    self.lock().shipping = Some(cost);
                    self.recompute();
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    // Events were dropped; fall back to storage for both parts.
                    tracing::warn!(skipped, "summary lagged behind the event bus");
                    {
                        let mut state = self.lock();
                        state.items = None;
                        state.shipping = None;
                    }
                    self.recompute();
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    /// Recompute from the latest known cart and shipping cost, publishing
    /// `checkout:order-summary-updated` when the result changed.
    ///
    /// A missing or malformed stored selection counts as no shipping.
    pub fn recompute(&self) -> OrderSummary {
        let mut state = self.lock();
        let items = state
            .items
            .clone()
            .unwrap_or_else(|| self.storage.read_json(keys::CART).unwrap_or_default());
        let shipping = state.shipping.unwrap_or_else(|| {
            self.storage
                .read_json::<ShippingSelection>(keys::CHECKOUT_SHIPPING)
                .map_or(Rupiah::ZERO, |s| s.cost)
        });

        let subtotal = items.iter().map(CartItem::line_total).sum();
        let summary = OrderSummary::new(subtotal, shipping);
        if state.latest != Some(summary) {
            state.latest = Some(summary);
            tracing::debug!(total = summary.total().as_u64(), "order summary updated");
            self.bus.publish(CheckoutEvent::OrderSummaryUpdated(summary));
        }
        summary
    }

    /// The last published summary, if any.
    #[must_use]
    pub fn latest(&self) -> Option<OrderSummary> {
        self.lock().latest
    }

    #[must_use]
    pub fn render(&self) -> Option<RenderedSummary> {
        self.latest().as_ref().map(RenderedSummary::from)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SummaryAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummaryAggregator")
            .field("latest", &self.latest())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn wax_kit() -> Vec<CartItem> {
        let mut item = CartItem::new("Wax Kit", Rupiah::new(150_000));
        item.qty = 2;
        vec![item]
    }

    #[test]
    fn test_malformed_selection_counts_as_zero() {
        let storage = Arc::new(MemoryStorage::new());
        storage.write_json(keys::CART, &wax_kit()).unwrap();
        storage.set(keys::CHECKOUT_SHIPPING, r#"{"courier":1}"#).unwrap();
        let aggregator = SummaryAggregator::new(storage, EventBus::default());
        let summary = aggregator.recompute();
        assert_eq!(summary.subtotal(), Rupiah::new(300_000));
        assert_eq!(summary.shipping(), Rupiah::ZERO);
        assert_eq!(summary.total(), Rupiah::new(300_000));
    }

    #[tokio::test]
    async fn test_publishes_only_on_change() {
        let storage = Arc::new(MemoryStorage::new());
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let aggregator = SummaryAggregator::new(storage, bus);

        aggregator.recompute();
        aggregator.recompute();
        assert!(matches!(
            rx.try_recv().unwrap(),
            CheckoutEvent::OrderSummaryUpdated(_)
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_event_driven_totals() {
        let storage = Arc::new(MemoryStorage::new());
        let bus = EventBus::default();
        let aggregator = Arc::new(SummaryAggregator::new(storage, bus.clone()));
        let task = {
            let aggregator = Arc::clone(&aggregator);
            let rx = bus.subscribe();
            tokio::spawn(async move { aggregator.run(rx).await })
        };
        let mut rx = bus.subscribe();

        bus.publish(CheckoutEvent::CartUpdated { items: wax_kit(), count: 2 });
        bus.publish(CheckoutEvent::ShippingUpdated {
            cost: Rupiah::new(20_000),
            service: Some("JNE REG".into()),
        });

        let mut last = None;
        while let Ok(event) = rx.recv().await {
            if let CheckoutEvent::OrderSummaryUpdated(summary) = event {
                last = Some(summary);
                if summary.shipping() == Rupiah::new(20_000) {
                    break;
                }
            }
        }
        let summary = last.unwrap();
        assert_eq!(summary.total(), Rupiah::new(320_000));
        assert_eq!(
            aggregator.render().unwrap().total,
            Rupiah::new(320_000).to_string()
        );
        task.abort();
    }
}
