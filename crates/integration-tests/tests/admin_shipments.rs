//! Dashboard shipment client against a local stand-in for `/api`.

#![allow(clippy::unwrap_used)]

use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use kilau_checkout::{MemoryStorage, ShipmentDetails, Storage, StorageExt, StorefrontApi, keys};
use kilau_core::UserId;
use serde_json::{Value, json};

const ADMIN: &str = "7d9f0c52-3b8e-4a41-9a57-6f1e2b3c4d5e";

async fn create_shipment(
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if headers.get("x-admin-id").and_then(|v| v.to_str().ok()) != Some(ADMIN) {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Akses admin diperlukan" })),
        );
    }
    if body["order_id"] == "KLU-1700000000-000002" {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": "Pesanan sudah dikirim" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({ "order_id": body["order_id"], "komerce_order_no": "KOM-20261016-0001" })),
    )
}

async fn serve() -> StorefrontApi {
    let router = Router::new().route("/api/admin-shipments", post(create_shipment));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await });
    StorefrontApi::new(&format!("http://{addr}/api")).unwrap()
}

fn details(order_id: &str) -> ShipmentDetails {
    ShipmentDetails {
        order_id: order_id.into(),
        brand_name: "Kilau".into(),
        shipper_name: "Gudang Kilau".into(),
        shipper_phone: "081200000000".into(),
        shipper_address: "Jl. Kenanga No. 1, Bandung".into(),
    }
}

#[tokio::test]
async fn test_created_shipment_number_is_remembered() {
    let api = serve().await;
    let storage = MemoryStorage::new();
    let admin: UserId = ADMIN.parse().unwrap();

    let order_no = api
        .create_shipment(&admin, &details("KLU-1700000000-000001"), &storage)
        .await
        .unwrap();

    assert_eq!(order_no, "KOM-20261016-0001");
    assert_eq!(
        storage.read_json::<String>(keys::KOMERCE_ORDER_NO).as_deref(),
        Some("KOM-20261016-0001")
    );
}

#[tokio::test]
async fn test_refused_shipment_keeps_previous_number() {
    let api = serve().await;
    let storage = MemoryStorage::new();
    storage.write_json(keys::KOMERCE_ORDER_NO, "KOM-OLD").unwrap();
    let admin: UserId = ADMIN.parse().unwrap();

    let err = api
        .create_shipment(&admin, &details("KLU-1700000000-000002"), &storage)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(409));
    assert_eq!(storage.get(keys::KOMERCE_ORDER_NO).as_deref(), Some("\"KOM-OLD\""));
}
