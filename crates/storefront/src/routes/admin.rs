//! Admin dashboard functions. Every handler takes `RequireAdmin`.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use kilau_core::{DEFAULT_ITEM_WEIGHT_GRAMS, OrderNumber, OrderStatus, ProductId};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{ApiJson, ApiQuery};
use crate::error::{AppError, Result};
use crate::komerce::{Label, PickupRequest, PickupResult, ShipmentLine, ShipmentRequest};
use crate::middleware::RequireAdmin;
use crate::state::AppState;
use crate::supabase::types::{NewProduct, OrderRow, ProductPatch, ProductRow};
use crate::supabase::{OrderRepository, ProductRepository};

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
}

/// `GET /api/admin-orders?status=`
#[instrument(skip_all)]
pub async fn list_orders(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<OrdersQuery>,
) -> Result<Json<ListResponse<OrderRow>>> {
    let data = OrderRepository::new(state.supabase())
        .list(query.status)
        .await?;
    Ok(Json(ListResponse { data }))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub order_id: Option<String>,
    pub status: Option<OrderStatus>,
}

/// `POST /api/admin-orders/status`
#[instrument(skip_all)]
pub async fn update_order_status(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(update): ApiJson<StatusUpdate>,
) -> Result<Json<OrderRow>> {
    let number = update
        .order_id
        .filter(|id| !id.trim().is_empty())
        .map(OrderNumber::from_raw)
        .ok_or_else(|| AppError::BadRequest("Missing field: order_id".to_string()))?;
    let status = update
        .status
        .ok_or_else(|| AppError::BadRequest("Missing field: status".to_string()))?;

    let order = OrderRepository::new(state.supabase())
        .update_status(&number, status, None, None)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {number}")))?;

    tracing::info!(admin_id = %admin.id, order_id = %number, status = %status, "Order status set");
    Ok(Json(order))
}

// =============================================================================
// Products
// =============================================================================

/// `GET /api/admin-products`
#[instrument(skip_all)]
pub async fn list_products(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<ListResponse<ProductRow>>> {
    let data = ProductRepository::new(state.supabase()).list().await?;
    Ok(Json(ListResponse { data }))
}

/// `POST /api/admin-products`
#[instrument(skip_all)]
pub async fn create_product(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(mut product): ApiJson<NewProduct>,
) -> Result<(StatusCode, Json<ProductRow>)> {
    product.normalize().map_err(AppError::BadRequest)?;
    let row = ProductRepository::new(state.supabase())
        .create(&product)
        .await
        .map_err(|e| {
            if e.is_client_error() {
                AppError::Conflict(format!("Slug sudah dipakai: {}", product.slug))
            } else {
                e.into()
            }
        })?;
    tracing::info!(product_id = %row.id, slug = %row.slug, "Product created");
    Ok((StatusCode::CREATED, Json(row)))
}

/// `PATCH /api/admin-products/{id}`
#[instrument(skip_all)]
pub async fn update_product(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    ApiJson(patch): ApiJson<ProductPatch>,
) -> Result<Json<ProductRow>> {
    if patch.is_empty() {
        return Err(AppError::BadRequest("Tidak ada perubahan".to_string()));
    }
    if patch.price.is_some_and(|p| p.is_zero()) {
        return Err(AppError::BadRequest(
            "Harga produk harus lebih dari 0".to_string(),
        ));
    }
    let row = ProductRepository::new(state.supabase())
        .update(id, &patch)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product {id}")))?;
    Ok(Json(row))
}

/// `DELETE /api/admin-products/{id}`
#[instrument(skip_all)]
pub async fn delete_product(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    if ProductRepository::new(state.supabase())
        .delete(id, None)
        .await?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Product {id}")))
    }
}

// =============================================================================
// Shipments (Komerce delivery API)
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ShipmentParams {
    pub order_id: Option<String>,
    #[serde(default)]
    pub brand_name: String,
    #[serde(default)]
    pub shipper_name: String,
    #[serde(default)]
    pub shipper_phone: String,
    #[serde(default)]
    pub shipper_address: String,
}

#[derive(Debug, Serialize)]
pub struct ShipmentResponse {
    pub order_id: String,
    pub komerce_order_no: String,
}

/// Build the Komerce shipment body for a paid order.
///
/// # Errors
///
/// Returns `AppError::Conflict` when the order is not paid or was already
/// shipped, and `AppError::BadRequest` when it has no shipping selection or
/// complete address.
pub fn shipment_request(
    order: &OrderRow,
    params: &ShipmentParams,
    origin_id: &str,
) -> Result<ShipmentRequest> {
    if order.komerce_order_no.is_some() {
        return Err(AppError::Conflict("Pesanan sudah dikirim".to_string()));
    }
    if order.status != OrderStatus::Paid {
        return Err(AppError::Conflict(format!(
            "Pesanan belum dibayar (status: {})",
            order.status
        )));
    }
    let selection = order
        .shipping
        .as_ref()
        .ok_or_else(|| AppError::BadRequest("Pesanan tanpa layanan pengiriman".to_string()))?;
    let address = order
        .address
        .as_ref()
        .ok_or_else(|| AppError::BadRequest("Alamat pengiriman belum lengkap".to_string()))?;
    let destination = address
        .destination()
        .ok_or_else(|| AppError::BadRequest("Alamat pengiriman belum lengkap".to_string()))?;

    Ok(ShipmentRequest {
        order_date: Utc::now().format("%Y-%m-%d").to_string(),
        brand_name: params.brand_name.clone(),
        shipper_name: params.shipper_name.clone(),
        shipper_phone: params.shipper_phone.clone(),
        shipper_destination_id: origin_id.to_string(),
        shipper_address: params.shipper_address.clone(),
        receiver_name: address.recipient_name.clone(),
        receiver_phone: address.phone.clone(),
        receiver_destination_id: destination.location_id().to_string(),
        receiver_address: address.address_line.clone(),
        shipping: selection.courier.to_uppercase(),
        shipping_type: selection.service.clone(),
        payment_method: "BANK TRANSFER".to_string(),
        shipping_cost: order.shipping_cost,
        grand_total: order.total,
        order_details: order
            .items
            .iter()
            .map(|item| ShipmentLine {
                product_name: item.name.clone(),
                product_price: item.price,
                product_weight: item.unit_weight(DEFAULT_ITEM_WEIGHT_GRAMS),
                qty: item.qty,
                subtotal: item.line_total(),
            })
            .collect(),
    })
}

/// `POST /api/admin-shipments`
#[instrument(skip_all)]
pub async fn create_shipment(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(params): ApiJson<ShipmentParams>,
) -> Result<Json<ShipmentResponse>> {
    let number = params
        .order_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .map(OrderNumber::from_raw)
        .ok_or_else(|| AppError::BadRequest("Missing field: order_id".to_string()))?;

    let orders = OrderRepository::new(state.supabase());
    let order = orders
        .get(&number)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {number}")))?;
    let request = shipment_request(&order, &params, state.komerce().origin_id())?;

    let created = state.komerce().create_order(&request).await?;
    orders.set_shipment(&number, &created.order_no).await?;

    tracing::info!(order_id = %number, komerce_order_no = %created.order_no, "Shipment created");
    Ok(Json(ShipmentResponse {
        order_id: number.to_string(),
        komerce_order_no: created.order_no,
    }))
}

/// `POST /api/admin-shipments/pickup`
#[instrument(skip_all)]
pub async fn request_pickup(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<PickupRequest>,
) -> Result<Json<ListResponse<PickupResult>>> {
    if request.orders.is_empty() {
        return Err(AppError::BadRequest("Missing field: orders".to_string()));
    }
    let data = state.komerce().request_pickup(&request).await?;
    Ok(Json(ListResponse { data }))
}

#[derive(Debug, Deserialize)]
pub struct LabelQuery {
    #[serde(default)]
    pub order_no: String,
}

/// `GET /api/admin-shipments/label?order_no=`
#[instrument(skip_all)]
pub async fn print_label(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<LabelQuery>,
) -> Result<Json<Label>> {
    let order_no = query.order_no.trim();
    if order_no.is_empty() {
        return Err(AppError::BadRequest("Missing field: order_no".to_string()));
    }
    Ok(Json(state.komerce().print_label(order_no).await?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use kilau_core::{Address, CartItem, Rupiah, ShippingSelection};

    use super::*;

    fn paid_order() -> OrderRow {
        let items = vec![CartItem {
            qty: 2,
            ..CartItem::new("Wax Kit", Rupiah::new(150_000))
        }];
        OrderRow {
            order_number: OrderNumber::from_raw("KLU-1700000000-000042"),
            user_id: None,
            items,
            shipping: Some(ShippingSelection {
                courier: "jne".into(),
                courier_name: "JNE".into(),
                service: "REG".into(),
                service_name: "Layanan Reguler".into(),
                cost: Rupiah::new(20_000),
                etd: "2-3 day".into(),
            }),
            address: Some(Address {
                recipient_name: "Budi".into(),
                phone: "0812".into(),
                address_line: "Jl. Melati 5".into(),
                province: "6".into(),
                city: "152".into(),
                district: "1330".into(),
                postal_code: "12940".into(),
                ..Address::default()
            }),
            customer: None,
            subtotal: Rupiah::new(300_000),
            shipping_cost: Rupiah::new(20_000),
            total: Rupiah::new(320_000),
            status: OrderStatus::Paid,
            payment_type: None,
            transaction_id: None,
            komerce_order_no: None,
            created_at: None,
        }
    }

    fn params() -> ShipmentParams {
        ShipmentParams {
            order_id: Some("KLU-1700000000-000042".into()),
            brand_name: "Kilau".into(),
            shipper_name: "Gudang Kilau".into(),
            shipper_phone: "0211234".into(),
            shipper_address: "Jl. Gudang 1".into(),
        }
    }

    #[test]
    fn test_shipment_request_from_paid_order() {
        let request = shipment_request(&paid_order(), &params(), "17650").unwrap();
        assert_eq!(request.shipper_destination_id, "17650");
        assert_eq!(request.receiver_destination_id, "1330");
        assert_eq!(request.shipping, "JNE");
        assert_eq!(request.shipping_type, "REG");
        assert_eq!(request.grand_total, Rupiah::new(320_000));
        assert_eq!(request.order_details[0].product_weight, DEFAULT_ITEM_WEIGHT_GRAMS);
    }

    #[test]
    fn test_unpaid_order_rejected() {
        let mut order = paid_order();
        order.status = OrderStatus::Pending;
        assert!(matches!(
            shipment_request(&order, &params(), "17650"),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn test_already_shipped_rejected() {
        let mut order = paid_order();
        order.komerce_order_no = Some("KOM123".into());
        assert!(matches!(
            shipment_request(&order, &params(), "17650"),
            Err(AppError::Conflict(_))
        ));
    }
}
