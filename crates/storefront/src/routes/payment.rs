//! Payment functions: Snap token issuance and the Midtrans notification.
//!
//! The browser's total is advisory. `create-transaction` reprices every line
//! from the catalog and re-quotes the chosen shipping service before asking
//! Snap for a token, so the charged amount never comes from the client.

use axum::{Json, extract::State};
use chrono::Utc;
use kilau_core::{
    Address, CartItem, DEFAULT_ITEM_WEIGHT_GRAMS, OrderNumber, OrderStatus, OrderSummary,
    ShippingSelection, TransactionRequest, TransactionToken, cart_weight,
};
use serde::Serialize;
use tracing::instrument;

use super::ApiJson;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::midtrans::{
    Callbacks, ItemDetail, Notification, SnapCustomer, SnapRequest, TransactionDetails,
};
use crate::state::AppState;
use crate::supabase::types::{OrderRow, ProductRow};
use crate::supabase::{OrderRepository, ProductRepository};

const EMPTY_CART: &str = "Keranjang kosong";
const INCOMPLETE_ADDRESS: &str = "Alamat pengiriman belum lengkap";
const SERVICE_GONE: &str = "Layanan pengiriman tidak tersedia lagi, silakan pilih ulang";

/// Reprice cart lines from the catalog.
///
/// Names, prices and weights come from the product rows; only the slug and
/// quantity are taken from the client.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for an unknown or inactive product or a
/// zero quantity.
pub fn price_items(items: &[CartItem], catalog: &[ProductRow]) -> Result<Vec<CartItem>> {
    items
        .iter()
        .map(|item| {
            if item.qty == 0 {
                return Err(AppError::BadRequest(format!(
                    "Jumlah tidak valid: {}",
                    item.name
                )));
            }
            let product = catalog
                .iter()
                .find(|p| p.slug == item.id && p.is_active)
                .ok_or_else(|| {
                    AppError::BadRequest(format!("Produk tidak tersedia: {}", item.name))
                })?;
            Ok(CartItem {
                id: product.slug.clone(),
                name: product.name.clone(),
                price: product.price,
                qty: item.qty,
                weight: product.weight,
            })
        })
        .collect()
}

/// Re-quote the selected service for the priced cart.
async fn requote(
    state: &AppState,
    items: &[CartItem],
    selection: &ShippingSelection,
    address: Option<&Address>,
) -> Result<ShippingSelection> {
    let destination = address
        .and_then(Address::destination)
        .ok_or_else(|| AppError::BadRequest(INCOMPLETE_ADDRESS.to_string()))?;
    let weight = cart_weight(items, DEFAULT_ITEM_WEIGHT_GRAMS);
    let options = state
        .komerce()
        .calculate_rates(destination.location_id(), weight, &selection.courier)
        .await?;
    options
        .iter()
        .find(|o| o.matches(&selection.courier, &selection.service))
        .map(ShippingSelection::from)
        .ok_or_else(|| AppError::Conflict(SERVICE_GONE.to_string()))
}

fn new_order_number() -> OrderNumber {
    OrderNumber::generate(Utc::now().timestamp(), rand::random_range(0..1_000_000))
}

/// `POST /api/create-transaction`
#[instrument(skip_all)]
pub async fn create_transaction(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<TransactionRequest>,
) -> Result<Json<TransactionToken>> {
    if request.items.is_empty() {
        return Err(AppError::BadRequest(EMPTY_CART.to_string()));
    }

    let slugs: Vec<&str> = request.items.iter().map(|i| i.id.as_str()).collect();
    let catalog = ProductRepository::new(state.supabase())
        .active_by_slugs(&slugs)
        .await?;
    let items = price_items(&request.items, &catalog)?;

    let shipping = match &request.shipping {
        Some(selection) => {
            Some(requote(&state, &items, selection, request.address.as_ref()).await?)
        }
        None => None,
    };

    let summary = OrderSummary::compute(&items, shipping.as_ref());
    let total = summary.total();
    if total != request.client_total {
        tracing::warn!(
            client_total = request.client_total.as_u64(),
            server_total = total.as_u64(),
            "Client total differs from recomputed total"
        );
    }

    let order_number = new_order_number();
    OrderRepository::new(state.supabase())
        .create(&OrderRow {
            order_number: order_number.clone(),
            user_id: request.user_id,
            items: items.clone(),
            shipping: shipping.clone(),
            address: request.address.clone(),
            customer: request.customer.clone(),
            subtotal: summary.subtotal(),
            shipping_cost: summary.shipping(),
            total,
            status: OrderStatus::Pending,
            payment_type: None,
            transaction_id: None,
            komerce_order_no: None,
            created_at: None,
        })
        .await?;

    let mut item_details: Vec<ItemDetail> = items.iter().map(ItemDetail::product).collect();
    if let Some(selection) = shipping.as_ref().filter(|s| !s.cost.is_zero()) {
        item_details.push(ItemDetail::shipping(&selection.display_label(), selection.cost));
    }

    let snap = state
        .midtrans()
        .create_transaction(&SnapRequest {
            transaction_details: TransactionDetails {
                order_id: order_number.to_string(),
                gross_amount: total,
            },
            item_details,
            customer_details: SnapCustomer::new(
                request.customer.as_ref(),
                request.address.as_ref(),
            ),
            callbacks: Some(Callbacks {
                finish: format!(
                    "{}/checkout/success",
                    state.config().base_url.trim_end_matches('/')
                ),
            }),
        })
        .await?;

    add_breadcrumb(
        "payment",
        "Snap token issued",
        Some(&[("order_id", order_number.as_str())]),
    );
    tracing::info!(order_id = %order_number, total = total.as_u64(), "Transaction created");

    Ok(Json(TransactionToken {
        token: snap.token,
        redirect_url: snap.redirect_url,
        order_id: order_number.to_string(),
        gross_amount: total,
    }))
}

#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub status: &'static str,
}

/// `POST /api/payment-callback`
///
/// Midtrans retries on any non-2xx answer, so notifications that need no
/// change are acknowledged with 200.
#[instrument(skip_all)]
pub async fn payment_callback(
    State(state): State<AppState>,
    ApiJson(notification): ApiJson<Notification>,
) -> Result<Json<CallbackResponse>> {
    state.midtrans().verify_notification(&notification)?;

    let orders = OrderRepository::new(state.supabase());
    let number = notification.order_number();
    tracing::debug!(order_id = %number, "Notification verified");
    let order = orders
        .get(&number)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {number}")))?;

    let Some(status) = notification.order_status() else {
        tracing::debug!(
            transaction_status = %notification.transaction_status,
            "Notification ignored"
        );
        return Ok(Json(CallbackResponse { status: "ignored" }));
    };

    if order.status.is_final() && status == OrderStatus::Pending {
        tracing::debug!(current = %order.status, "Late pending notification ignored");
        return Ok(Json(CallbackResponse { status: "ignored" }));
    }

    if status == OrderStatus::Paid && !notification.amount_matches(order.total) {
        tracing::error!(
            gross_amount = %notification.gross_amount,
            expected = order.total.as_u64(),
            "Paid amount does not match order total"
        );
        return Err(AppError::BadRequest("Amount mismatch".to_string()));
    }

    orders
        .update_status(
            &number,
            status,
            notification.transaction_id.as_deref(),
            notification.payment_type.as_deref(),
        )
        .await?;

    tracing::info!(order_id = %number, status = %status, "Order status updated");
    Ok(Json(CallbackResponse { status: "ok" }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use kilau_core::Rupiah;

    use super::*;

    fn product(slug: &str, price: u64, active: bool) -> ProductRow {
        ProductRow {
            id: uuid::Uuid::new_v4().into(),
            slug: slug.to_string(),
            name: format!("Catalog {slug}"),
            price: Rupiah::new(price),
            weight: Some(750),
            stock: 10,
            description: String::new(),
            image_url: None,
            vendor_id: None,
            is_active: active,
        }
    }

    #[test]
    fn test_price_items_uses_catalog_price() {
        let client_item = CartItem {
            qty: 2,
            ..CartItem::new("Wax Kit", Rupiah::new(1))
        };
        let priced = price_items(&[client_item], &[product("wax-kit", 150_000, true)]).unwrap();
        assert_eq!(priced[0].price, Rupiah::new(150_000));
        assert_eq!(priced[0].qty, 2);
        assert_eq!(priced[0].weight, Some(750));
        assert_eq!(priced[0].name, "Catalog wax-kit");
    }

    #[test]
    fn test_price_items_rejects_unknown_and_inactive() {
        let item = CartItem::new("Wax Kit", Rupiah::new(150_000));
        assert!(matches!(
            price_items(std::slice::from_ref(&item), &[]),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            price_items(&[item], &[product("wax-kit", 150_000, false)]),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_price_items_rejects_zero_qty() {
        let item = CartItem {
            qty: 0,
            ..CartItem::new("Wax Kit", Rupiah::new(150_000))
        };
        assert!(price_items(&[item], &[product("wax-kit", 150_000, true)]).is_err());
    }

    #[test]
    fn test_order_number_prefix() {
        assert!(new_order_number().as_str().starts_with("KLU-"));
    }
}
