//! Kilau checkout - client-side checkout state reconciliation.
//!
//! The checkout page is a small set of components that never call each other
//! directly. Each one reads and writes the shared [`Storage`] and talks over a
//! typed [`EventBus`]:
//!
//! ```text
//!   CartModel ──cart:updated──────────────────────┐
//!                                                 ▼
//!   AddressBinding ──address-updated──▶ ShippingResolver ──shipping-selected──▶ SummaryAggregator
//!                                                                                   │
//!                                                     order-summary-updated ◀───────┘
//!                                                              │
//!                                                      PaymentInitiator
//! ```
//!
//! # Modules
//!
//! - [`storage`] - Key/value persistence seam and the fixed storage keys
//! - [`events`] - Typed publish/subscribe bus
//! - [`cart`] - Cart model mirrored to storage
//! - [`address`] - Debounced address form binding
//! - [`shipping`] - Rate providers and the shipping resolver
//! - [`summary`] - Subtotal/shipping/total aggregation
//! - [`payment`] - Payment token request and widget outcome handling
//! - [`api`] - HTTP adapters to the storefront functions
//! - [`session`] - Wires everything together for one checkout page

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod address;
pub mod api;
pub mod cart;
pub mod config;
pub mod debounce;
pub mod events;
pub mod payment;
pub mod session;
pub mod shipping;
pub mod storage;
pub mod summary;

pub use address::{AddressBinding, AddressSource};
pub use api::{ApiError, ShipmentDetails, StorefrontApi};
pub use cart::{CartError, CartModel, Persistence};
pub use config::{CheckoutConfig, RateProviderMode};
pub use events::{CheckoutEvent, EventBus};
pub use payment::{
    Navigator, PaymentError, PaymentInitiator, PaymentOutcome, PaymentPorts, PaymentWidget, Prompt,
    TokenClient, TransactionRequest, TransactionResult, TransactionToken, WidgetOutcome,
};
pub use session::{CheckoutDeps, CheckoutSession};
pub use shipping::{
    RateError, RateProvider, SelectionMeta, ShippingResolver, ShippingView, StaticRateProvider,
};
pub use storage::{MemoryStorage, Storage, StorageError, StorageExt, keys};
pub use summary::{RenderedSummary, SummaryAggregator};
