//! Product repository.

use kilau_core::{ProductId, VendorId};

use super::profiles::missing_row;
use super::types::{NewProduct, ProductPatch, ProductRow};
use super::{SupabaseClient, SupabaseError, eq};

/// Repository for `products`.
pub struct ProductRepository<'a> {
    client: &'a SupabaseClient,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(client: &'a SupabaseClient) -> Self {
        Self { client }
    }

    /// All products, newest first.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn list(&self) -> Result<Vec<ProductRow>, SupabaseError> {
        self.client
            .select(
                "products",
                &[("select", "*".to_string()), ("order", "created_at.desc".to_string())],
            )
            .await
    }

    /// Products belonging to one vendor.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn list_by_vendor(&self, vendor: VendorId) -> Result<Vec<ProductRow>, SupabaseError> {
        self.client
            .select(
                "products",
                &[
                    ("select", "*".to_string()),
                    ("vendor_id", eq(vendor)),
                    ("order", "created_at.desc".to_string()),
                ],
            )
            .await
    }

    /// Active products whose slug is one of `slugs`.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn active_by_slugs(&self, slugs: &[&str]) -> Result<Vec<ProductRow>, SupabaseError> {
        if slugs.is_empty() {
            return Ok(Vec::new());
        }
        // PostgREST list values are double-quoted with backslash escapes
        let quoted: Vec<String> = slugs
            .iter()
            .map(|s| format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")))
            .collect();
        self.client
            .select(
                "products",
                &[
                    ("select", "*".to_string()),
                    ("slug", format!("in.({})", quoted.join(","))),
                    ("is_active", "eq.true".to_string()),
                ],
            )
            .await
    }

    /// Insert a product.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails (409 on duplicate slug).
    pub async fn create(&self, product: &NewProduct) -> Result<ProductRow, SupabaseError> {
        let rows: Vec<ProductRow> = self.client.insert("products", product).await?;
        rows.into_iter().next().ok_or_else(|| missing_row("products"))
    }

    /// Apply a partial update. Returns `None` when the product does not exist.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn update(
        &self,
        id: ProductId,
        patch: &ProductPatch,
    ) -> Result<Option<ProductRow>, SupabaseError> {
        let rows: Vec<ProductRow> = self
            .client
            .update("products", &[("id", eq(id))], patch)
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Delete a product, optionally only if it belongs to `vendor`.
    ///
    /// Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn delete(
        &self,
        id: ProductId,
        vendor: Option<VendorId>,
    ) -> Result<bool, SupabaseError> {
        let mut filters = vec![("id", eq(id))];
        if let Some(vendor) = vendor {
            filters.push(("vendor_id", eq(vendor)));
        }
        Ok(self.client.delete("products", &filters).await? > 0)
    }
}
