//! Profile and vendor repositories.

use kilau_core::{Address, Role, UserId};

use super::types::{ProfileRow, VendorRow};
use super::{SupabaseClient, SupabaseError, eq};

/// Repository for `profiles`.
pub struct ProfileRepository<'a> {
    client: &'a SupabaseClient,
}

impl<'a> ProfileRepository<'a> {
    #[must_use]
    pub const fn new(client: &'a SupabaseClient) -> Self {
        Self { client }
    }

    /// Get a profile by auth user id.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn get(&self, id: UserId) -> Result<Option<ProfileRow>, SupabaseError> {
        self.client
            .select_one("profiles", &[("select", "*".to_string()), ("id", eq(id))])
            .await
    }

    /// Create or replace a profile.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn upsert(&self, profile: &ProfileRow) -> Result<ProfileRow, SupabaseError> {
        let rows: Vec<ProfileRow> = self.client.upsert("profiles", profile).await?;
        rows.into_iter().next().ok_or_else(|| missing_row("profiles"))
    }

    /// Store the checkout address on the profile.
    ///
    /// Returns `None` if there is no profile with that id.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn save_address(
        &self,
        id: UserId,
        address: &Address,
    ) -> Result<Option<ProfileRow>, SupabaseError> {
        let rows: Vec<ProfileRow> = self
            .client
            .update(
                "profiles",
                &[("id", eq(id))],
                &serde_json::json!({ "address": address }),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Change a profile's role.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn set_role(&self, id: UserId, role: Role) -> Result<(), SupabaseError> {
        let _: Vec<ProfileRow> = self
            .client
            .update("profiles", &[("id", eq(id))], &serde_json::json!({ "role": role }))
            .await?;
        Ok(())
    }
}

/// Repository for `vendors`.
pub struct VendorRepository<'a> {
    client: &'a SupabaseClient,
}

impl<'a> VendorRepository<'a> {
    #[must_use]
    pub const fn new(client: &'a SupabaseClient) -> Self {
        Self { client }
    }

    /// Get the store owned by a user.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn get_by_user(&self, user_id: UserId) -> Result<Option<VendorRow>, SupabaseError> {
        self.client
            .select_one("vendors", &[("select", "*".to_string()), ("user_id", eq(user_id))])
            .await
    }

    /// Register a store for a user.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails (409 when the user already has one).
    pub async fn create(
        &self,
        user_id: UserId,
        store_name: &str,
        phone: &str,
        address: &str,
    ) -> Result<VendorRow, SupabaseError> {
        let rows: Vec<VendorRow> = self
            .client
            .insert(
                "vendors",
                &serde_json::json!({
                    "user_id": user_id,
                    "store_name": store_name,
                    "phone": phone,
                    "address": address,
                }),
            )
            .await?;
        rows.into_iter().next().ok_or_else(|| missing_row("vendors"))
    }
}

pub(super) fn missing_row(table: &str) -> SupabaseError {
    SupabaseError::Api {
        status: 500,
        message: format!("{table}: write returned no row"),
    }
}
