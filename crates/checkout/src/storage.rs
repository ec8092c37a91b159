//! Key/value storage seam.
//!
//! Every component persists through [`Storage`] instead of touching a global.
//! Values are JSON strings; readers must tolerate missing or malformed values
//! and fall back to defaults, since other code (or older versions) may have
//! written the same keys.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Fixed storage keys shared by the checkout components.
pub mod keys {
    /// Cart line items (`Vec<CartItem>`).
    pub const CART: &str = "cart";
    /// Logged-in user (`User`).
    pub const USER: &str = "user";
    /// Address form record (`Address`).
    pub const CHECKOUT_ADDRESS: &str = "checkout:address";
    /// Confirmed shipping selection (`ShippingSelection`).
    pub const CHECKOUT_SHIPPING: &str = "checkout:shipping";
    /// Shipping cost as a bare number, for legacy readers.
    pub const SHIPPING_COST: &str = "shipping_cost";
    /// Shipping service label, e.g. `"JNE REG"`, for legacy readers.
    pub const SHIPPING_SERVICE: &str = "shipping_service";
    /// Courier/service pair to restore after rates are refetched.
    pub const SHIPPING_SELECTION_META: &str = "shipping_selection_meta";
    /// Address record written by the older address form.
    pub const ADDRESS_DATA: &str = "address_data";
    /// Komerce order number of the last shipment created for this browser.
    pub const KOMERCE_ORDER_NO: &str = "komerce_order_no";
    /// Last payment widget result (`TransactionResult`).
    pub const CHECKOUT_TRANSACTION: &str = "checkout:transaction";
}

/// Errors raised by storage writes.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend refused the write because it is full.
    #[error("storage quota exceeded writing {key} ({needed} bytes, limit {limit})")]
    QuotaExceeded {
        key: String,
        needed: usize,
        limit: usize,
    },

    /// The value could not be encoded as JSON.
    #[error("failed to encode {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Synchronous key/value storage (browser local storage or a fake).
pub trait Storage: Send + Sync {
    /// Read the raw value under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Write the raw value under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::QuotaExceeded` when the backend is full.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Deleting a missing key is a no-op.
    fn remove(&self, key: &str);
}

/// Typed JSON helpers on top of any [`Storage`].
pub trait StorageExt: Storage {
    /// Read and decode `key`, treating malformed JSON as absent.
    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(key, error = %e, "ignoring malformed stored value");
                None
            }
        }
    }

    /// Encode and write `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Encode` if serialization fails, or the
    /// backend's error if the write is refused.
    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value).map_err(|source| StorageError::Encode {
            key: key.to_owned(),
            source,
        })?;
        self.set(key, &raw)
    }
}

impl<S: Storage + ?Sized> StorageExt for S {}

/// In-memory [`Storage`], optionally with a byte quota to mimic the browser's
/// `QuotaExceededError`.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the total size of keys plus values, in bytes.
    #[must_use]
    pub fn with_quota(limit: usize) -> Self {
        Self {
            entries: Mutex::default(),
            quota: Some(limit),
        }
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.lock();
        if let Some(limit) = self.quota {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > limit {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_owned(),
                    needed,
                    limit,
                });
            }
        }
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.lock().remove(key);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_read_json_tolerates_garbage() {
        let storage = MemoryStorage::new();
        storage.set(keys::CART, "{not json").unwrap();
        assert_eq!(storage.read_json::<Vec<u32>>(keys::CART), None);
        assert_eq!(storage.read_json::<Vec<u32>>(keys::USER), None);
    }

    #[test]
    fn test_write_then_read() {
        let storage = MemoryStorage::new();
        storage.write_json(keys::SHIPPING_COST, &20_000u64).unwrap();
        assert_eq!(storage.get(keys::SHIPPING_COST).as_deref(), Some("20000"));
        assert_eq!(storage.read_json::<u64>(keys::SHIPPING_COST), Some(20_000));
    }

    #[test]
    fn test_quota_counts_replacement_once() {
        let storage = MemoryStorage::with_quota(12);
        storage.set("k", "12345").unwrap();
        // Overwriting the same key does not count the old value.
        storage.set("k", "1234567890").unwrap();
        let err = storage.set("other", "x").unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { .. }));
        assert_eq!(storage.get("k").as_deref(), Some("1234567890"));
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let storage = MemoryStorage::new();
        storage.remove(keys::CART);
        assert!(!storage.contains(keys::CART));
    }
}
