//! Vendor registration and the vendor's own product list.

use axum::{Json, extract::State, http::StatusCode};
use kilau_core::{ProductId, Role, UserId};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::admin::ListResponse;
use super::{ApiJson, ApiQuery};
use crate::error::{AppError, Result};
use crate::middleware::RequireVendor;
use crate::state::AppState;
use crate::supabase::types::{NewProduct, ProductRow, VendorRow};
use crate::supabase::{ProductRepository, ProfileRepository, VendorRepository};

#[derive(Debug, Deserialize)]
pub struct VendorRegistration {
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub store_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub id: Option<ProductId>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

/// `POST /api/vendor-register`
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<VendorRegistration>,
) -> Result<(StatusCode, Json<VendorRow>)> {
    let user_id = request
        .user_id
        .ok_or_else(|| AppError::BadRequest("Missing field: user_id".to_string()))?;
    let store_name = request.store_name.trim();
    if store_name.is_empty() {
        return Err(AppError::BadRequest("Nama toko wajib diisi".to_string()));
    }

    let profiles = ProfileRepository::new(state.supabase());
    let profile = profiles
        .get(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profil tidak ditemukan".to_string()))?;

    let vendors = VendorRepository::new(state.supabase());
    if vendors.get_by_user(user_id).await?.is_some() {
        return Err(AppError::Conflict("Toko sudah terdaftar".to_string()));
    }
    let vendor = vendors
        .create(
            user_id,
            store_name,
            request.phone.trim(),
            request.address.trim(),
        )
        .await?;

    // Admins keep their role; the vendors row alone grants vendor access
    if profile.role != Role::Admin {
        profiles.set_role(user_id, Role::Vendor).await?;
    }

    tracing::info!(user_id = %user_id, vendor_id = %vendor.id, "Vendor registered");
    Ok((StatusCode::CREATED, Json(vendor)))
}

/// `GET /api/vendor-products`
#[instrument(skip_all)]
pub async fn list_products(
    vendor: RequireVendor,
    State(state): State<AppState>,
) -> Result<Json<ListResponse<ProductRow>>> {
    let data = ProductRepository::new(state.supabase())
        .list_by_vendor(vendor.vendor.id)
        .await?;
    Ok(Json(ListResponse { data }))
}

/// `POST /api/vendor-products`
#[instrument(skip_all)]
pub async fn create_product(
    vendor: RequireVendor,
    State(state): State<AppState>,
    ApiJson(mut product): ApiJson<NewProduct>,
) -> Result<(StatusCode, Json<ProductRow>)> {
    product.normalize().map_err(AppError::BadRequest)?;
    product.vendor_id = Some(vendor.vendor.id);
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
    tracing::info!(vendor_id = %vendor.vendor.id, product_id = %row.id, "Vendor product created");
    Ok((StatusCode::CREATED, Json(row)))
}

/// `DELETE /api/vendor-products?id=`
///
/// Only rows owned by the calling vendor are removed.
#[instrument(skip_all)]
pub async fn delete_product(
    vendor: RequireVendor,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<DeleteQuery>,
) -> Result<Json<DeleteResponse>> {
    let id = query
        .id
        .ok_or_else(|| AppError::BadRequest("Missing field: id".to_string()))?;
    let removed = ProductRepository::new(state.supabase())
        .delete(id, Some(vendor.vendor.id))
        .await?;
    if !removed {
        return Err(AppError::NotFound(format!("Product {id}")));
    }
    Ok(Json(DeleteResponse { success: true }))
}
