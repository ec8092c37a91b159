//! Server functions under `/api`.
//!
//! # Route Structure
//!
//! ```text
//! # Auth
//! POST   /api/auth-login              - Password login (rate limited)
//! POST   /api/auth-register           - Account registration (rate limited)
//! POST   /api/auth-save-address       - Store the checkout address on the profile
//! GET    /api/auth-profile            - Profile plus saved address
//!
//! # Shipping
//! GET    /api/shipping                - Rate quote (query string)
//! POST   /api/shipping                - Rate quote (JSON body)
//! GET    /api/shipping/destinations   - Destination search
//!
//! # Payment
//! POST   /api/create-transaction      - Reprice, store order, issue Snap token
//! POST   /api/payment-callback        - Midtrans HTTP notification
//!
//! # Admin (x-admin-id)
//! GET    /api/admin-orders            - Orders, optionally by status
//! POST   /api/admin-orders/status     - Set order status
//! GET    /api/admin-products          - All products
//! POST   /api/admin-products          - Create product
//! PATCH  /api/admin-products/{id}     - Update product
//! DELETE /api/admin-products/{id}     - Delete product
//! POST   /api/admin-shipments         - Book a Komerce shipment for a paid order
//! POST   /api/admin-shipments/pickup  - Request courier pickup
//! GET    /api/admin-shipments/label   - Shipping label
//!
//! # Vendor (x-vendor-id)
//! POST   /api/vendor-register         - Open a store
//! GET    /api/vendor-products         - Own products
//! POST   /api/vendor-products         - Create own product
//! DELETE /api/vendor-products         - Delete own product (?id=)
//! ```

pub mod admin;
pub mod auth;
pub mod payment;
pub mod shipping;
pub mod vendor;

use axum::{
    Router,
    extract::{FromRequest, FromRequestParts},
    routing::{get, patch, post},
};

use crate::error::AppError;
use crate::middleware::{RateLimitError, auth_rate_limiter};
use crate::state::AppState;

/// JSON body extractor whose rejection is an `AppError`, so malformed bodies
/// get the same `{"error": ...}` shape as every other failure.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor with an `AppError` rejection.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

fn auth_routes() -> Result<Router<AppState>, RateLimitError> {
    let limited = Router::new()
        .route("/auth-login", post(auth::login))
        .route("/auth-register", post(auth::register))
        .layer(auth_rate_limiter()?);

    Ok(Router::new()
        .merge(limited)
        .route("/auth-save-address", post(auth::save_address))
        .route("/auth-profile", get(auth::profile)))
}

fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/shipping",
            get(shipping::rates_get).post(shipping::rates_post),
        )
        .route("/shipping/destinations", get(shipping::destinations))
        .route("/create-transaction", post(payment::create_transaction))
        .route("/payment-callback", post(payment::payment_callback))
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin-orders", get(admin::list_orders))
        .route("/admin-orders/status", post(admin::update_order_status))
        .route(
            "/admin-products",
            get(admin::list_products).post(admin::create_product),
        )
        .route(
            "/admin-products/{id}",
            patch(admin::update_product).delete(admin::delete_product),
        )
        .route("/admin-shipments", post(admin::create_shipment))
        .route("/admin-shipments/pickup", post(admin::request_pickup))
        .route("/admin-shipments/label", get(admin::print_label))
}

fn vendor_routes() -> Router<AppState> {
    Router::new()
        .route("/vendor-register", post(vendor::register))
        .route(
            "/vendor-products",
            get(vendor::list_products)
                .post(vendor::create_product)
                .delete(vendor::delete_product),
        )
}

/// Every server function, to be nested under `/api`.
///
/// # Errors
///
/// Returns `RateLimitError` if the auth limiter cannot be built.
pub fn api_routes() -> Result<Router<AppState>, RateLimitError> {
    Ok(Router::new()
        .merge(auth_routes()?)
        .merge(checkout_routes())
        .merge(admin_routes())
        .merge(vendor_routes()))
}
