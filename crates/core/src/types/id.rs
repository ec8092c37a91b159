//! Newtype IDs for type-safe entity references.
//!
//! Supabase rows are keyed by UUIDs. Use the `define_id!` macro to create
//! wrappers that prevent accidentally mixing IDs from different tables.

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around [`Uuid`] with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_uuid()`
/// - `FromStr` so IDs can be read from headers and query strings
///
/// # Example
///
/// ```rust
/// # use kilau_core::define_id;
/// define_id!(UserId);
/// define_id!(ProductId);
///
/// let user_id = UserId::new(uuid::Uuid::nil());
/// let product_id = ProductId::new(uuid::Uuid::nil());
///
/// // These are different types, so this won't compile:
/// // let _: UserId = product_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(::uuid::Uuid);

        impl $name {
            /// Wrap an existing UUID.
            #[must_use]
            pub const fn new(id: ::uuid::Uuid) -> Self {
                Self(id)
            }

            /// Get the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> ::uuid::Uuid {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::uuid::Error;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                ::uuid::Uuid::parse_str(s.trim()).map(Self)
            }
        }

        impl From<::uuid::Uuid> for $name {
            fn from(id: ::uuid::Uuid) -> Self {
                Self(id)
            }
        }
    };
}

// Supabase table keys
define_id!(UserId);
define_id!(ProductId);
define_id!(VendorId);
define_id!(AddressId);

/// Merchant-side order number sent to Midtrans as `order_id`.
///
/// Generated by the storefront (`KLU-<unix seconds>-<suffix>`), never by the
/// browser, so a client cannot collide with or overwrite another order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Prefix shared by every order number issued by the storefront.
    pub const PREFIX: &'static str = "KLU";

    /// Build an order number from a timestamp and a random suffix.
    #[must_use]
    pub fn generate(unix_seconds: i64, suffix: u32) -> Self {
        Self(format!("{}-{unix_seconds}-{suffix:06}", Self::PREFIX))
    }

    /// Accept an order number received from Midtrans or a client.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the order number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Uuid> for OrderNumber {
    fn from(id: Uuid) -> Self {
        Self(id.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_id_from_str_trims() {
        let id: UserId = " 00000000-0000-0000-0000-000000000001 ".parse().unwrap();
        assert_eq!(id.to_string(), "00000000-0000-0000-0000-000000000001");
    }

    #[test]
    fn test_id_rejects_garbage() {
        assert!("admin".parse::<UserId>().is_err());
    }

    #[test]
    fn test_order_number_format() {
        let n = OrderNumber::generate(1_700_000_000, 42);
        assert_eq!(n.as_str(), "KLU-1700000000-000042");
    }
}
