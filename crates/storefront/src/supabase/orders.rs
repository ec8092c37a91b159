//! Order repository.

use kilau_core::{OrderNumber, OrderStatus};
use serde_json::{Map, Value};

use super::profiles::missing_row;
use super::types::OrderRow;
use super::{SupabaseClient, SupabaseError, eq};

/// Repository for `orders`.
pub struct OrderRepository<'a> {
    client: &'a SupabaseClient,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(client: &'a SupabaseClient) -> Self {
        Self { client }
    }

    /// Orders, newest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn list(&self, status: Option<OrderStatus>) -> Result<Vec<OrderRow>, SupabaseError> {
        let mut filters = vec![
            ("select", "*".to_string()),
            ("order", "created_at.desc".to_string()),
        ];
        if let Some(status) = status {
            filters.push(("status", eq(status)));
        }
        self.client.select("orders", &filters).await
    }

    /// Get an order by its number.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn get(&self, number: &OrderNumber) -> Result<Option<OrderRow>, SupabaseError> {
        self.client
            .select_one(
                "orders",
                &[("select", "*".to_string()), ("order_number", eq(number))],
            )
            .await
    }

    /// Record a new order.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn create(&self, order: &OrderRow) -> Result<OrderRow, SupabaseError> {
        let rows: Vec<OrderRow> = self.client.insert("orders", order).await?;
        rows.into_iter().next().ok_or_else(|| missing_row("orders"))
    }

    /// Set the status and, when known, the gateway's transaction details.
    ///
    /// Returns `None` when no order has that number.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn update_status(
        &self,
        number: &OrderNumber,
        status: OrderStatus,
        transaction_id: Option<&str>,
        payment_type: Option<&str>,
    ) -> Result<Option<OrderRow>, SupabaseError> {
        let mut patch = Map::new();
        patch.insert("status".into(), Value::from(status.as_str()));
        if let Some(id) = transaction_id.filter(|s| !s.is_empty()) {
            patch.insert("transaction_id".into(), Value::from(id));
        }
        if let Some(kind) = payment_type.filter(|s| !s.is_empty()) {
            patch.insert("payment_type".into(), Value::from(kind));
        }
        self.patch(number, &Value::Object(patch)).await
    }

    /// Remember the Komerce shipment number for an order.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn set_shipment(
        &self,
        number: &OrderNumber,
        komerce_order_no: &str,
    ) -> Result<Option<OrderRow>, SupabaseError> {
        self.patch(
            number,
            &serde_json::json!({
                "komerce_order_no": komerce_order_no,
                "status": OrderStatus::Shipped.as_str(),
            }),
        )
        .await
    }

    async fn patch(
        &self,
        number: &OrderNumber,
        body: &Value,
    ) -> Result<Option<OrderRow>, SupabaseError> {
        let rows: Vec<OrderRow> = self
            .client
            .update("orders", &[("order_number", eq(number))], body)
            .await?;
        Ok(rows.into_iter().next())
    }
}
