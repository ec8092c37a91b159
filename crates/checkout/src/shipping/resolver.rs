//! Courier/service selection driven by the address and the cart.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use kilau_core::{
    Address, CartItem, CourierOption, Destination, Rupiah, ServiceOption, ShippingSelection,
    cart_weight,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};

use super::{RateError, RateProvider};
use crate::config::CheckoutConfig;
use crate::debounce::Debouncer;
use crate::events::{CheckoutEvent, EventBus};
use crate::storage::{Storage, StorageExt, keys};

/// The courier/service pair remembered under `shipping_selection_meta`, so
/// the choice survives a refetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionMeta {
    pub courier: String,
    pub service: String,
}

/// What the shipping widgets should display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShippingView {
    pub couriers: Vec<CourierOption>,
    /// Services of the selected courier.
    pub services: Vec<ServiceOption>,
    pub courier: Option<String>,
    pub selection: Option<ShippingSelection>,
    pub loading: bool,
    /// Inline warning, e.g. when the static table stands in for live rates.
    pub notice: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    destination: Option<Destination>,
    options: Vec<ServiceOption>,
    courier: Option<String>,
    selection: Option<ShippingSelection>,
    items: Vec<CartItem>,
    quoted_weight: Option<u32>,
    loading: bool,
    notice: Option<String>,
}

struct Inner {
    storage: Arc<dyn Storage>,
    bus: EventBus,
    provider: Arc<dyn RateProvider>,
    fallback: Option<Arc<dyn RateProvider>>,
    couriers: String,
    default_weight: u32,
    /// Bumped for every issued request and every destination change; a
    /// response is applied only if no newer request has been issued since.
    seq: AtomicU64,
    state: Mutex<State>,
}

/// Resolves shipping options for the current destination and cart weight.
pub struct ShippingResolver {
    inner: Arc<Inner>,
    debouncer: Debouncer,
}

impl ShippingResolver {
    /// Create a resolver, restoring the destination, cart and selection
    /// persisted by an earlier page.
    #[must_use]
    pub fn new(
        storage: Arc<dyn Storage>,
        bus: EventBus,
        provider: Arc<dyn RateProvider>,
        fallback: Option<Arc<dyn RateProvider>>,
        config: &CheckoutConfig,
    ) -> Self {
        let state = State {
            destination: storage
                .read_json::<Address>(keys::CHECKOUT_ADDRESS)
                .and_then(|a| a.destination()),
            selection: storage.read_json(keys::CHECKOUT_SHIPPING),
            items: storage.read_json(keys::CART).unwrap_or_default(),
            ..State::default()
        };
        let courier = state.selection.as_ref().map(|s| s.courier.clone());
        Self {
            inner: Arc::new(Inner {
                storage,
                bus,
                provider,
                fallback,
                couriers: config.couriers_param(),
                default_weight: config.default_item_weight_grams,
                seq: AtomicU64::new(0),
                state: Mutex::new(State { courier, ..state }),
            }),
            debouncer: Debouncer::new(config.shipping_debounce),
        }
    }

    /// React to bus events until the bus closes.
    pub async fn run(&self, mut rx: broadcast::Receiver<CheckoutEvent>) {
        loop {
            match rx.recv().await {
                Ok(CheckoutEvent::AddressInitialized(address) | CheckoutEvent::AddressUpdated(address)) => {
                    self.handle_address(&address);
                }
                Ok(CheckoutEvent::CartUpdated { items, .. }) => self.handle_cart(items),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "shipping resolver lagged behind the event bus");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    /// Apply a committed address. An incomplete destination never fetches;
    /// a changed destination clears the current selection at once and
    /// schedules a refetch.
    pub fn handle_address(&self, address: &Address) {
        let destination = address.destination();
        let needs_fetch = {
            let mut state = self.inner.lock();
            let changed = state.destination != destination;
            if changed {
                // Invalidate anything still in flight for the old destination.
                self.inner.seq.fetch_add(1, Ordering::SeqCst);
                state.destination.clone_from(&destination);
                state.options.clear();
                state.quoted_weight = None;
                state.loading = false;
                if state.selection.is_some() {
                    self.inner.clear_selection(&mut state);
                }
            }
            destination.is_some() && (changed || state.options.is_empty()) && !state.loading
        };
        if needs_fetch {
            self.schedule_refresh();
        }
    }

    /// Track the cart so rate requests use the current weight. A weight
    /// change for a quoted destination triggers a requote; an emptied cart
    /// keeps the current quote and selection.
    pub fn handle_cart(&self, items: Vec<CartItem>) {
        let needs_fetch = {
            let mut state = self.inner.lock();
            let weight = cart_weight(&items, self.inner.default_weight);
            let requote = !items.is_empty()
                && state.destination.is_some()
                && state.quoted_weight.is_some_and(|quoted| quoted != weight);
            state.items = items;
            requote
        };
        if needs_fetch {
            self.schedule_refresh();
        }
    }

    /// Fetch after the debounce interval, superseding a pending fetch.
    pub fn schedule_refresh(&self) {
        self.inner.lock().loading = true;
        let inner = Arc::clone(&self.inner);
        self.debouncer.schedule(async move {
            inner.refresh().await;
        });
    }

    /// Fetch rates for the current destination now.
    pub async fn refresh(&self) {
        self.debouncer.cancel();
        self.inner.refresh().await;
    }

    /// Choose a courier. Keeps the selection only if it belongs to that
    /// courier.
    pub fn select_courier(&self, courier: &str) -> Vec<ServiceOption> {
        let mut state = self.inner.lock();
        state.courier = Some(courier.to_owned());
        let keep = state
            .selection
            .as_ref()
            .is_some_and(|s| s.courier.eq_ignore_ascii_case(courier));
        if !keep && state.selection.is_some() {
            self.inner.clear_selection(&mut state);
        }
        services_for(&state.options, courier)
    }

    /// Confirm a service of the selected courier.
    ///
    /// # Errors
    ///
    /// Returns `RateError::UnknownService` if the pair is not in the most
    /// recently fetched option list.
    pub fn select_service(&self, service: &str) -> Result<ShippingSelection, RateError> {
        let mut state = self.inner.lock();
        let courier = state.courier.clone().unwrap_or_default();
        let option = state
            .options
            .iter()
            .find(|o| o.matches(&courier, service))
            .cloned()
            .ok_or_else(|| RateError::UnknownService {
                courier,
                service: service.to_owned(),
            })?;
        Ok(self.inner.select(&mut state, &option))
    }

    /// Drop the current selection (cost back to 0).
    pub fn clear_selection(&self) {
        let mut state = self.inner.lock();
        self.inner.clear_selection(&mut state);
    }

    /// The current selection, if any.
    #[must_use]
    pub fn selection(&self) -> Option<ShippingSelection> {
        self.inner.lock().selection.clone()
    }

    #[must_use]
    pub fn view(&self) -> ShippingView {
        let state = self.inner.lock();
        let mut couriers: Vec<CourierOption> = Vec::new();
        for option in &state.options {
            if !couriers.iter().any(|c| c.code == option.courier) {
                couriers.push(CourierOption {
                    code: option.courier.clone(),
                    name: option.courier_name.clone(),
                });
            }
        }
        ShippingView {
            couriers,
            services: state
                .courier
                .as_deref()
                .map(|c| services_for(&state.options, c))
                .unwrap_or_default(),
            courier: state.courier.clone(),
            selection: state.selection.clone(),
            loading: state.loading,
            notice: state.notice.clone(),
        }
    }
}

impl std::fmt::Debug for ShippingResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShippingResolver")
            .field("seq", &self.inner.seq.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn refresh(&self) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let (destination, weight) = {
            let mut state = self.lock();
            let Some(destination) = state.destination.clone() else {
                state.loading = false;
                return;
            };
            state.loading = true;
            (destination, cart_weight(&state.items, self.default_weight))
        };

        let (options, notice) = match self
            .provider
            .fetch_rates(&destination, weight, &self.couriers)
            .await
        {
            Ok(options) => (options, None),
            Err(e) => {
                tracing::warn!(error = %e, location = destination.location_id(), "live rates unavailable");
                match &self.fallback {
                    Some(fallback) => match fallback.fetch_rates(&destination, weight, &self.couriers).await {
                        Ok(options) => (options, Some("Menggunakan tarif ongkir perkiraan.".to_owned())),
                        Err(e) => (Vec::new(), Some(e.to_string())),
                    },
                    None => (Vec::new(), Some("Ongkir tidak tersedia, coba lagi.".to_owned())),
                }
            }
        };

        // Destination changes bump `seq` under this lock, so compare under it.
        let mut state = self.lock();
        let current = self.seq.load(Ordering::SeqCst);
        if current != seq {
            tracing::debug!(seq, current, "discarding stale rate response");
            return;
        }
        state.loading = false;
        state.notice = notice;
        state.quoted_weight = Some(weight);
        state.options = options;
        self.restore(&mut state);
    }

    /// Re-select the remembered pair if the new option list still offers
    /// it; otherwise clear the selection.
    fn restore(&self, state: &mut State) {
        let preferred = state
            .selection
            .as_ref()
            .map(|s| SelectionMeta {
                courier: s.courier.clone(),
                service: s.service.clone(),
            })
            .or_else(|| self.storage.read_json(keys::SHIPPING_SELECTION_META));

        let found = preferred.and_then(|meta| {
            state
                .options
                .iter()
                .find(|o| o.matches(&meta.courier, &meta.service))
                .cloned()
        });

        match found {
            Some(option) => {
                state.courier = Some(option.courier.clone());
                let unchanged = state
                    .selection
                    .as_ref()
                    .is_some_and(|s| *s == ShippingSelection::from(&option));
                if !unchanged {
                    self.select(state, &option);
                }
            }
            None => {
                if state.selection.is_some() {
                    self.clear_selection(state);
                }
                let courier_offered = state.courier.as_deref().is_some_and(|c| {
                    state.options.iter().any(|o| o.courier.eq_ignore_ascii_case(c))
                });
                if !courier_offered {
                    state.courier = None;
                }
            }
        }
    }

    fn select(&self, state: &mut State, option: &ServiceOption) -> ShippingSelection {
        let selection = ShippingSelection::from(option);
        let label = selection.display_label();
        let meta = SelectionMeta {
            courier: selection.courier.clone(),
            service: selection.service.clone(),
        };

        let writes = [
            self.storage.write_json(keys::CHECKOUT_SHIPPING, &selection),
            self.storage.write_json(keys::SHIPPING_COST, &selection.cost),
            self.storage.write_json(keys::SHIPPING_SERVICE, &label),
            self.storage.write_json(keys::SHIPPING_SELECTION_META, &meta),
        ];
        for e in writes.into_iter().filter_map(Result::err) {
            tracing::warn!(error = %e, "shipping selection not persisted");
        }

        state.courier = Some(selection.courier.clone());
        state.selection = Some(selection.clone());
        self.bus.publish(CheckoutEvent::ShippingSelected(selection.clone()));
        self.bus.publish(CheckoutEvent::ShippingUpdated {
            cost: selection.cost,
            service: Some(label),
        });
        selection
    }

    /// Clears the confirmed selection but keeps `shipping_selection_meta`,
    /// so the pair can be restored once new rates arrive.
    fn clear_selection(&self, state: &mut State) {
        state.selection = None;
        self.storage.remove(keys::CHECKOUT_SHIPPING);
        self.storage.remove(keys::SHIPPING_SERVICE);
        if let Err(e) = self.storage.write_json(keys::SHIPPING_COST, &Rupiah::ZERO) {
            tracing::warn!(error = %e, "shipping cost not persisted");
        }
        self.bus.publish(CheckoutEvent::ShippingUpdated {
            cost: Rupiah::ZERO,
            service: None,
        });
    }
}

fn services_for(options: &[ServiceOption], courier: &str) -> Vec<ServiceOption> {
    options
        .iter()
        .filter(|o| o.courier.eq_ignore_ascii_case(courier))
        .cloned()
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::shipping::StaticRateProvider;
    use crate::storage::MemoryStorage;

    /// Quotes `base` per destination id, slowly for destinations in `slow`.
    struct TableProvider {
        slow: &'static str,
    }

    #[async_trait]
    impl RateProvider for TableProvider {
        async fn fetch_rates(
            &self,
            destination: &Destination,
            weight_grams: u32,
            _courier: &str,
        ) -> Result<Vec<ServiceOption>, RateError> {
            if destination.location_id() == self.slow {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            let base: u64 = destination.location_id().parse().unwrap_or(1);
            Ok(vec![ServiceOption {
                courier: "jne".into(),
                courier_name: "JNE".into(),
                service: "REG".into(),
                service_name: "Reguler".into(),
                cost: Rupiah::new(base * 1_000 + u64::from(weight_grams)),
                etd: "2-3".into(),
            }])
        }
    }

    struct DownProvider;

    #[async_trait]
    impl RateProvider for DownProvider {
        async fn fetch_rates(
            &self,
            _destination: &Destination,
            _weight_grams: u32,
            _courier: &str,
        ) -> Result<Vec<ServiceOption>, RateError> {
            Err(RateError::NoDestination)
        }
    }

    fn address(district: &str) -> Address {
        Address {
            province: "6".into(),
            city: "152".into(),
            district: district.into(),
            postal_code: "10110".into(),
            ..Address::default()
        }
    }

    fn resolver(provider: Arc<dyn RateProvider>) -> (Arc<MemoryStorage>, ShippingResolver) {
        let storage = Arc::new(MemoryStorage::new());
        let resolver = ShippingResolver::new(
            storage.clone(),
            EventBus::default(),
            provider,
            Some(Arc::new(StaticRateProvider)),
            &CheckoutConfig::default(),
        );
        (storage, resolver)
    }

    #[tokio::test(start_paused = true)]
    async fn test_incomplete_destination_never_fetches() {
        let (_, resolver) = resolver(Arc::new(TableProvider { slow: "" }));
        let mut partial = address("20");
        partial.postal_code = "  ".into();
        resolver.handle_address(&partial);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(resolver.view().couriers.is_empty());
        assert!(!resolver.view().loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_persists_and_meta_survives_clear() {
        let (storage, resolver) = resolver(Arc::new(TableProvider { slow: "" }));
        resolver.handle_address(&address("20"));
        tokio::time::sleep(Duration::from_millis(350)).await;

        let services = resolver.select_courier("jne");
        assert_eq!(services.len(), 1);
        let selection = resolver.select_service("REG").unwrap();
        assert_eq!(selection.cost, Rupiah::new(20_001));
        assert_eq!(storage.read_json::<u64>(keys::SHIPPING_COST), Some(20_001));
        assert_eq!(storage.get(keys::SHIPPING_SERVICE).as_deref(), Some("\"JNE REG\""));

        resolver.handle_address(&address("30"));
        assert_eq!(resolver.selection(), None);
        assert_eq!(storage.read_json::<u64>(keys::SHIPPING_COST), Some(0));
        assert!(storage.read_json::<SelectionMeta>(keys::SHIPPING_SELECTION_META).is_some());

        tokio::time::sleep(Duration::from_millis(350)).await;
        let restored = resolver.selection().unwrap();
        assert_eq!(restored.cost, Rupiah::new(30_001));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_service_is_rejected() {
        let (_, resolver) = resolver(Arc::new(TableProvider { slow: "" }));
        resolver.handle_address(&address("20"));
        tokio::time::sleep(Duration::from_millis(350)).await;
        resolver.select_courier("jne");
        assert!(matches!(
            resolver.select_service("YES"),
            Err(RateError::UnknownService { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_is_discarded() {
        let (_, resolver) = resolver(Arc::new(TableProvider { slow: "20" }));
        let resolver = Arc::new(resolver);

        resolver.handle_address(&address("20"));
        tokio::time::sleep(Duration::from_millis(350)).await;
        // Slow request for district 20 is now in flight.
        resolver.handle_address(&address("30"));
        tokio::time::sleep(Duration::from_millis(350)).await;
        resolver.select_courier("jne");
        let fresh = resolver.select_service("REG").unwrap();
        assert_eq!(fresh.cost, Rupiah::new(30_001));

        tokio::time::sleep(Duration::from_secs(10)).await;
        let view = resolver.view();
        assert_eq!(view.services[0].cost, Rupiah::new(30_001));
        assert_eq!(view.selection.unwrap().cost, Rupiah::new(30_001));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_falls_back_to_static_table() {
        let (_, resolver) = resolver(Arc::new(DownProvider));
        resolver.handle_address(&address("20"));
        tokio::time::sleep(Duration::from_millis(350)).await;
        let view = resolver.view();
        assert_eq!(view.couriers.len(), 3);
        assert!(view.notice.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_weight_change_requotes() {
        let (_, resolver) = resolver(Arc::new(TableProvider { slow: "" }));
        resolver.handle_address(&address("20"));
        tokio::time::sleep(Duration::from_millis(350)).await;
        resolver.select_courier("jne");
        resolver.select_service("REG").unwrap();

        let mut item = CartItem::new("Wax Kit", Rupiah::new(150_000)).with_weight(1_200);
        item.qty = 2;
        resolver.handle_cart(vec![item]);
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(resolver.selection().unwrap().cost, Rupiah::new(22_400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_emptied_cart_keeps_quote() {
        let (storage, resolver) = resolver(Arc::new(TableProvider { slow: "" }));
        let mut item = CartItem::new("Wax Kit", Rupiah::new(150_000)).with_weight(1_200);
        item.qty = 2;
        resolver.handle_cart(vec![item]);
        resolver.handle_address(&address("20"));
        tokio::time::sleep(Duration::from_millis(350)).await;
        resolver.select_courier("jne");
        assert_eq!(resolver.select_service("REG").unwrap().cost, Rupiah::new(22_400));

        resolver.handle_cart(Vec::new());
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert!(!resolver.view().loading);
        assert_eq!(resolver.selection().unwrap().cost, Rupiah::new(22_400));
        assert_eq!(storage.read_json::<u64>(keys::SHIPPING_COST), Some(22_400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_after_destination_cleared_is_discarded() {
        let (_, resolver) = resolver(Arc::new(TableProvider { slow: "20" }));
        let resolver = Arc::new(resolver);
        resolver.handle_address(&address("20"));

        let pending = {
            let resolver = Arc::clone(&resolver);
            tokio::spawn(async move { resolver.refresh().await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        let mut partial = address("20");
        partial.district.clear();
        resolver.handle_address(&partial);
        pending.await.unwrap();

        let view = resolver.view();
        assert!(view.couriers.is_empty());
        assert_eq!(view.selection, None);
        assert!(!view.loading);
    }
}
