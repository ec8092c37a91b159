//! Core types for Kilau.
//!
//! This module provides type-safe wrappers for common domain concepts and the
//! checkout records persisted by the client.

pub mod address;
pub mod cart;
pub mod email;
pub mod id;
pub mod payment;
pub mod price;
pub mod shipping;
pub mod status;
pub mod summary;
pub mod user;

pub use address::{Address, AddressField, Destination};
pub use cart::{CartItem, DEFAULT_ITEM_WEIGHT_GRAMS, cart_weight, slugify};
pub use email::{Email, EmailError};
pub use id::*;
pub use payment::{CustomerDetails, TransactionRequest, TransactionResult, TransactionToken};
pub use price::Rupiah;
pub use shipping::{CourierOption, RateQuery, RatesResponse, ServiceOption, ShippingSelection};
pub use status::*;
pub use summary::OrderSummary;
pub use user::User;
