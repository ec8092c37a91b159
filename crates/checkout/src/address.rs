//! Address form binding.
//!
//! Field edits are buffered in memory and committed after a quiet period:
//! the whole record is written to `checkout:address` and announced as
//! `checkout:address-updated`, so a burst of keystrokes costs one write and
//! one event.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use kilau_core::{Address, AddressField, User};

use crate::api::ApiError;
use crate::debounce::Debouncer;
use crate::events::{CheckoutEvent, EventBus};
use crate::storage::{Storage, StorageExt, keys};

/// Remote profile store holding a saved address per user.
#[async_trait]
pub trait AddressSource: Send + Sync {
    /// The address saved for `user`, if any.
    async fn fetch_address(&self, user: &User) -> Result<Option<Address>, ApiError>;
}

struct Inner {
    storage: Arc<dyn Storage>,
    bus: EventBus,
    address: Mutex<Address>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Address> {
        self.address.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn commit(&self) -> Address {
        let snapshot = self.lock().clone();
        if let Err(e) = self.storage.write_json(keys::CHECKOUT_ADDRESS, &snapshot) {
            tracing::warn!(error = %e, "address not persisted");
        }
        self.bus.publish(CheckoutEvent::AddressUpdated(snapshot.clone()));
        snapshot
    }
}

/// Binds the checkout address form to storage and the event bus.
pub struct AddressBinding {
    inner: Arc<Inner>,
    debouncer: Debouncer,
}

impl AddressBinding {
    /// Pre-fill the form and announce `checkout:address-initialized`.
    ///
    /// Starts from `checkout:address` (or the older `address_data` record),
    /// then, for a logged-in user, overlays the address saved remotely. Only
    /// fields the remote record actually fills are overwritten. A failed
    /// remote lookup keeps the local record.
    pub async fn mount(
        storage: Arc<dyn Storage>,
        bus: EventBus,
        debounce: Duration,
        remote: Option<&dyn AddressSource>,
    ) -> Self {
        let mut address: Address = storage
            .read_json(keys::CHECKOUT_ADDRESS)
            .or_else(|| storage.read_json(keys::ADDRESS_DATA))
            .unwrap_or_default();

        let user: Option<User> = storage.read_json(keys::USER);
        if let (Some(source), Some(user)) = (remote, user.as_ref()) {
            match source.fetch_address(user).await {
                Ok(Some(saved)) => address.overlay(&saved),
                Ok(None) => {}
                Err(e) => tracing::warn!(user_id = %user.id, error = %e, "saved address unavailable"),
            }
        }

        if let Err(e) = storage.write_json(keys::CHECKOUT_ADDRESS, &address) {
            tracing::warn!(error = %e, "address not persisted");
        }
        bus.publish(CheckoutEvent::AddressInitialized(address.clone()));

        Self {
            inner: Arc::new(Inner {
                storage,
                bus,
                address: Mutex::new(address),
            }),
            debouncer: Debouncer::new(debounce),
        }
    }

    /// A free-text or select value changed.
    pub fn input(&self, field: AddressField, value: impl Into<String>) {
        self.inner.lock().set(field, value);
        self.schedule();
    }

    /// A select changed; `label` is the option text shown to the customer.
    pub fn select(&self, field: AddressField, value: impl Into<String>, label: Option<String>) {
        {
            let mut address = self.inner.lock();
            address.set(field, value);
            address.set_label(field, label);
        }
        self.schedule();
    }

    /// Commit immediately, dropping any pending debounced commit.
    pub fn commit_now(&self) -> Address {
        self.debouncer.cancel();
        self.inner.commit()
    }

    /// The in-memory record, including uncommitted edits.
    #[must_use]
    pub fn current(&self) -> Address {
        self.inner.lock().clone()
    }

    fn schedule(&self) {
        let inner = Arc::clone(&self.inner);
        self.debouncer.schedule(async move {
            inner.commit();
        });
    }
}

impl std::fmt::Debug for AddressBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressBinding")
            .field("debounce", &self.debouncer.delay())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use kilau_core::Role;

    use super::*;
    use crate::storage::MemoryStorage;

    struct SavedAddress(Option<Address>);

    #[async_trait]
    impl AddressSource for SavedAddress {
        async fn fetch_address(&self, _user: &User) -> Result<Option<Address>, ApiError> {
            Ok(self.0.clone())
        }
    }

    fn store_user(storage: &MemoryStorage) {
        let user = User {
            id: "7d9f0c52-3b8e-4a41-9a57-6f1e2b3c4d5e".parse().unwrap(),
            name: "Siti".into(),
            email: "siti@example.com".into(),
            phone: String::new(),
            role: Role::Customer,
        };
        storage.write_json(keys::USER, &user).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_commits_once() {
        let storage = Arc::new(MemoryStorage::new());
        let bus = EventBus::default();
        let binding =
            AddressBinding::mount(storage.clone(), bus.clone(), Duration::from_millis(250), None)
                .await;
        let mut rx = bus.subscribe();

        for prefix in ["J", "Jl", "Jl. Me", "Jl. Merdeka 1"] {
            binding.input(AddressField::AddressLine, prefix);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        tokio::time::sleep(Duration::from_millis(300)).await;

        match rx.try_recv().unwrap() {
            CheckoutEvent::AddressUpdated(address) => {
                assert_eq!(address.address_line, "Jl. Merdeka 1");
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(rx.try_recv().is_err());
        let stored: Address = storage.read_json(keys::CHECKOUT_ADDRESS).unwrap();
        assert_eq!(stored.address_line, "Jl. Merdeka 1");
    }

    #[tokio::test]
    async fn test_mount_overlays_remote_fields_only() {
        let storage = Arc::new(MemoryStorage::new());
        let local = Address {
            recipient_name: "Siti".into(),
            phone: "0812".into(),
            notes: "pagar hijau".into(),
            ..Address::default()
        };
        storage.write_json(keys::CHECKOUT_ADDRESS, &local).unwrap();
        store_user(&storage);

        let remote = SavedAddress(Some(Address {
            phone: "0813".into(),
            city: "152".into(),
            city_label: Some("Jakarta Pusat".into()),
            ..Address::default()
        }));
        let binding = AddressBinding::mount(
            storage,
            EventBus::default(),
            Duration::from_millis(250),
            Some(&remote as &dyn AddressSource),
        )
        .await;

        let address = binding.current();
        assert_eq!(address.recipient_name, "Siti");
        assert_eq!(address.phone, "0813");
        assert_eq!(address.notes, "pagar hijau");
        assert_eq!(address.city_label.as_deref(), Some("Jakarta Pusat"));
    }

    #[tokio::test]
    async fn test_mount_reads_legacy_record_for_guests() {
        let storage = Arc::new(MemoryStorage::new());
        let legacy = Address {
            postal_code: "10110".into(),
            ..Address::default()
        };
        storage.write_json(keys::ADDRESS_DATA, &legacy).unwrap();
        let remote = SavedAddress(Some(Address {
            postal_code: "99999".into(),
            ..Address::default()
        }));

        let binding = AddressBinding::mount(
            storage,
            EventBus::default(),
            Duration::from_millis(250),
            Some(&remote as &dyn AddressSource),
        )
        .await;
        // No stored user, so the remote record is not consulted.
        assert_eq!(binding.current().postal_code, "10110");
    }

    #[tokio::test]
    async fn test_select_keeps_label_and_commit_now() {
        let storage = Arc::new(MemoryStorage::new());
        let binding = AddressBinding::mount(
            storage.clone(),
            EventBus::default(),
            Duration::from_secs(60),
            None,
        )
        .await;
        binding.select(AddressField::Province, "6", Some("DKI Jakarta".into()));
        let committed = binding.commit_now();
        assert_eq!(committed.province_label.as_deref(), Some("DKI Jakarta"));
        let stored: Address = storage.read_json(keys::CHECKOUT_ADDRESS).unwrap();
        assert_eq!(stored.province, "6");
    }
}
