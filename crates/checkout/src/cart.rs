//! Cart model mirrored to the `cart` storage key.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use kilau_core::{CartItem, Rupiah};
use thiserror::Error;

use crate::events::{CheckoutEvent, EventBus};
use crate::storage::{Storage, StorageError, StorageExt, keys};

/// Errors from cart mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("product name must not be empty")]
    InvalidName,

    #[error("no cart line at index {index} (cart has {len})")]
    NoSuchLine { index: usize, len: usize },
}

/// Whether a mutation reached storage.
///
/// A refused write is not fatal: the in-memory cart stays authoritative for
/// the rest of the session and the caller may show a warning.
#[derive(Debug)]
#[must_use]
pub enum Persistence {
    Saved,
    Degraded(StorageError),
}

impl Persistence {
    #[must_use]
    pub const fn is_saved(&self) -> bool {
        matches!(self, Self::Saved)
    }
}

/// In-memory cart, persisted and announced on every mutation.
pub struct CartModel {
    storage: Arc<dyn Storage>,
    bus: EventBus,
    items: Mutex<Vec<CartItem>>,
}

impl CartModel {
    /// Load the cart from storage. Missing or malformed data yields an empty
    /// cart; lines with a zero quantity are dropped.
    #[must_use]
    pub fn load(storage: Arc<dyn Storage>, bus: EventBus) -> Self {
        let mut items: Vec<CartItem> = storage.read_json(keys::CART).unwrap_or_default();
        items.retain(|item| item.qty > 0);
        Self {
            storage,
            bus,
            items: Mutex::new(items),
        }
    }

    /// Snapshot of the current lines.
    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.lock().clone()
    }

    /// Badge count: the sum of quantities.
    #[must_use]
    pub fn count(&self) -> u32 {
        count_of(&self.lock())
    }

    #[must_use]
    pub fn subtotal(&self) -> Rupiah {
        self.lock().iter().map(CartItem::line_total).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Add one unit of a product, merging with an existing line whose name
    /// normalizes to the same id.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidName` if the name has no alphanumeric
    /// characters.
    pub fn add_item(&self, name: &str, price: Rupiah) -> Result<Persistence, CartError> {
        self.add_product(CartItem::new(name, price))
    }

    /// Add a prepared line (e.g. one carrying a product weight). Its `qty`
    /// is added to an existing line with the same id.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidName` if the line's id is empty.
    pub fn add_product(&self, item: CartItem) -> Result<Persistence, CartError> {
        if item.id.is_empty() {
            return Err(CartError::InvalidName);
        }
        let mut items = self.lock();
        let qty = item.qty.max(1);
        if let Some(existing) = items.iter_mut().find(|line| line.id == item.id) {
            existing.qty = existing.qty.saturating_add(qty);
            if existing.weight.is_none() {
                existing.weight = item.weight;
            }
        } else {
            items.push(CartItem { qty, ..item });
        }
        Ok(self.commit(&items))
    }

    /// Adjust a line's quantity by `delta`, removing it at zero or below.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NoSuchLine` for an out-of-range index.
    pub fn change_qty(&self, index: usize, delta: i64) -> Result<Persistence, CartError> {
        let mut items = self.lock();
        let len = items.len();
        let line = items
            .get_mut(index)
            .ok_or(CartError::NoSuchLine { index, len })?;
        let next = i64::from(line.qty).saturating_add(delta);
        if next <= 0 {
            items.remove(index);
        } else {
            line.qty = u32::try_from(next).unwrap_or(u32::MAX);
        }
        Ok(self.commit(&items))
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NoSuchLine` for an out-of-range index.
    pub fn remove_item(&self, index: usize) -> Result<Persistence, CartError> {
        let mut items = self.lock();
        let len = items.len();
        if index >= len {
            return Err(CartError::NoSuchLine { index, len });
        }
        items.remove(index);
        Ok(self.commit(&items))
    }

    /// Empty the cart and delete the `cart` key.
    pub fn clear(&self) {
        let mut items = self.lock();
        items.clear();
        self.storage.remove(keys::CART);
        self.announce(&items);
    }

    /// Persist and announce while the caller still holds the lock, so the
    /// stored array and the published event always describe the same cart.
    fn commit(&self, items: &[CartItem]) -> Persistence {
        let persistence = match self.storage.write_json(keys::CART, items) {
            Ok(()) => Persistence::Saved,
            Err(e) => {
                tracing::warn!(error = %e, "cart not persisted; keeping in-memory cart");
                Persistence::Degraded(e)
            }
        };
        self.announce(items);
        persistence
    }

    fn announce(&self, items: &[CartItem]) {
        self.bus.publish(CheckoutEvent::CartUpdated {
            items: items.to_vec(),
            count: count_of(items),
        });
    }

    fn lock(&self) -> MutexGuard<'_, Vec<CartItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CartModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartModel")
            .field("items", &*self.lock())
            .finish_non_exhaustive()
    }
}

fn count_of(items: &[CartItem]) -> u32 {
    items.iter().map(|item| item.qty).fold(0, u32::saturating_add)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::storage::MemoryStorage;

    fn cart() -> (Arc<MemoryStorage>, CartModel) {
        let storage = Arc::new(MemoryStorage::new());
        let model = CartModel::load(storage.clone(), EventBus::default());
        (storage, model)
    }

    fn stored(storage: &MemoryStorage) -> Vec<CartItem> {
        storage.read_json(keys::CART).unwrap_or_default()
    }

    #[test]
    fn test_add_merges_by_slug() {
        let (storage, cart) = cart();
        assert!(cart.add_item("Soap", Rupiah::new(10_000)).unwrap().is_saved());
        assert!(cart.add_item("  soap ", Rupiah::new(10_000)).unwrap().is_saved());

        let items = stored(&storage);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].qty, 2);
        assert_eq!(cart.count(), 2);
        assert_eq!(cart.subtotal(), Rupiah::new(20_000));
    }

    #[test]
    fn test_add_rejects_blank_name() {
        let (_, cart) = cart();
        assert_eq!(
            cart.add_item("  !! ", Rupiah::new(1)).unwrap_err(),
            CartError::InvalidName
        );
    }

    #[test]
    fn test_change_qty_removes_at_zero() {
        let (storage, cart) = cart();
        let _ = cart.add_item("Wax Kit", Rupiah::new(150_000)).unwrap();
        let _ = cart.add_item("Soap", Rupiah::new(10_000)).unwrap();

        let _ = cart.change_qty(0, 2).unwrap();
        assert_eq!(cart.items()[0].qty, 3);

        let _ = cart.change_qty(0, -5).unwrap();
        let items = stored(&storage);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "soap");
        assert!(matches!(
            cart.change_qty(4, 1),
            Err(CartError::NoSuchLine { index: 4, len: 1 })
        ));
    }

    #[test]
    fn test_remove_and_clear() {
        let (storage, cart) = cart();
        let _ = cart.add_item("A", Rupiah::new(1)).unwrap();
        let _ = cart.add_item("B", Rupiah::new(2)).unwrap();
        let _ = cart.remove_item(0).unwrap();
        assert_eq!(stored(&storage)[0].id, "b");

        cart.clear();
        assert!(cart.is_empty());
        assert!(!storage.contains(keys::CART));
    }

    #[test]
    fn test_load_drops_zero_qty_and_garbage() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set(
                keys::CART,
                r#"[{"id":"a","name":"A","price":5,"qty":0},{"id":"b","name":"B","price":7,"quantity":3}]"#,
            )
            .unwrap();
        let cart = CartModel::load(storage.clone(), EventBus::default());
        assert_eq!(cart.count(), 3);

        storage.set(keys::CART, "oops").unwrap();
        let cart = CartModel::load(storage, EventBus::default());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_quota_keeps_memory_state() {
        let storage = Arc::new(MemoryStorage::with_quota(8));
        let cart = CartModel::load(storage.clone(), EventBus::default());
        let result = cart.add_item("Soap", Rupiah::new(10_000)).unwrap();
        assert!(matches!(result, Persistence::Degraded(StorageError::QuotaExceeded { .. })));
        assert_eq!(cart.count(), 1);
        assert!(!storage.contains(keys::CART));
    }

    const NAMES: [&str; 4] = ["Soap", "Wax Kit", "Microfiber Towel", "Tire Shine"];

    #[derive(Debug, Clone)]
    enum Op {
        Add(usize),
        Change(usize, i64),
        Remove(usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..NAMES.len()).prop_map(Op::Add),
            (0..6usize, -4i64..=4).prop_map(|(index, delta)| Op::Change(index, delta)),
            (0..6usize).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn prop_count_is_sum_of_surviving_quantities(
            ops in prop::collection::vec(op_strategy(), 0..40)
        ) {
            let (storage, cart) = cart();
            for op in ops {
                // Out-of-range indices are rejected without touching the cart.
                let _ = match op {
                    Op::Add(name) => cart.add_item(NAMES[name], Rupiah::new(1_000)),
                    Op::Change(index, delta) => cart.change_qty(index, delta),
                    Op::Remove(index) => cart.remove_item(index),
                };
            }

            let items = cart.items();
            prop_assert!(items.iter().all(|item| item.qty >= 1));
            prop_assert_eq!(cart.count(), items.iter().map(|item| item.qty).sum::<u32>());
            prop_assert_eq!(stored(&storage), items);
        }
    }

    #[tokio::test]
    async fn test_mutation_publishes_badge_count() {
        let storage = Arc::new(MemoryStorage::new());
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let cart = CartModel::load(storage, bus);
        let _ = cart.add_item("Soap", Rupiah::new(10_000)).unwrap();
        let _ = cart.add_item("Soap", Rupiah::new(10_000)).unwrap();

        let _ = rx.recv().await.unwrap();
        match rx.recv().await.unwrap() {
            CheckoutEvent::CartUpdated { items, count } => {
                assert_eq!(count, 2);
                assert_eq!(items.len(), 1);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
