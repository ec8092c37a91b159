//! Kilau Core - Shared types library.
//!
//! This crate provides common types used across all Kilau components:
//! - `checkout` - Client-side cart, address, shipping and payment reconciliation
//! - `storefront` - HTTP functions proxying Supabase, Midtrans and Komerce
//!
//! # Architecture
//!
//! The core crate contains only types and pure helpers - no I/O, no HTTP
//! clients, no timers. Records here are the JSON shapes exchanged between the
//! browser-side checkout flow and the storefront functions.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, emails, statuses and checkout records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
