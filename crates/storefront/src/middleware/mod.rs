//! HTTP middleware stack for the storefront functions.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS (browser checkout calls)
//! 5. Security headers
//! 6. Rate limiting on the auth functions (governor)
//!
//! Role gates are extractors (`RequireAdmin`, `RequireVendor`), not layers,
//! so each handler states what it needs.

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use auth::{RequireAdmin, RequireVendor};
pub use rate_limit::{RateLimitError, auth_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
