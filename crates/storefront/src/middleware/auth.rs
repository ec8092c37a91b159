//! Role gates for the admin and vendor functions.
//!
//! The dashboards identify the caller with an `x-admin-id` / `x-vendor-id`
//! header holding the Supabase user id. The id is checked against the
//! `profiles` (and `vendors`) tables on every request.

use axum::{extract::FromRequestParts, http::request::Parts};
use kilau_core::{Role, UserId};

use crate::error::{AppError, set_sentry_user};
use crate::state::AppState;
use crate::supabase::types::{ProfileRow, VendorRow};
use crate::supabase::{ProfileRepository, VendorRepository};

pub const ADMIN_ID_HEADER: &str = "x-admin-id";
pub const VENDOR_ID_HEADER: &str = "x-vendor-id";

/// Extractor that requires an admin profile.
///
/// Missing or malformed id → 401; unknown or non-admin profile → 403.
///
/// # Example
///
/// ```rust,ignore
/// async fn list_orders(RequireAdmin(admin): RequireAdmin) -> Result<Json<Vec<OrderRow>>> {
///     // ...
/// }
/// ```
pub struct RequireAdmin(pub ProfileRow);

/// Extractor that requires a registered vendor.
///
/// A profile without a `vendors` row is rejected with 403.
pub struct RequireVendor {
    pub profile: ProfileRow,
    pub vendor: VendorRow,
}

fn header_user_id(parts: &Parts, header: &str) -> Result<UserId, AppError> {
    let raw = parts
        .headers
        .get(header)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Unauthorized(format!("Missing {header} header")))?;
    raw.parse()
        .map_err(|_| AppError::Unauthorized(format!("Invalid {header} header")))
}

async fn load_profile(state: &AppState, id: UserId) -> Result<ProfileRow, AppError> {
    let profile = ProfileRepository::new(state.supabase())
        .get(id)
        .await?
        .ok_or_else(|| AppError::Forbidden("Unknown user".to_string()))?;
    set_sentry_user(&profile.id, Some(&profile.email));
    Ok(profile)
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let id = header_user_id(parts, ADMIN_ID_HEADER)?;
        let profile = load_profile(state, id).await?;
        if profile.role != Role::Admin {
            tracing::warn!(user_id = %id, "Non-admin called an admin function");
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
        Ok(Self(profile))
    }
}

impl FromRequestParts<AppState> for RequireVendor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let id = header_user_id(parts, VENDOR_ID_HEADER)?;
        let profile = load_profile(state, id).await?;
        let vendor = VendorRepository::new(state.supabase())
            .get_by_user(id)
            .await?
            .ok_or_else(|| AppError::Forbidden("Vendor registration required".to_string()))?;
        Ok(Self { profile, vendor })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder();
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_missing_header_is_unauthorized() {
        let err = header_user_id(&parts(&[]), ADMIN_ID_HEADER).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_malformed_header_is_unauthorized() {
        let err = header_user_id(&parts(&[(ADMIN_ID_HEADER, "admin")]), ADMIN_ID_HEADER)
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_valid_header_parses() {
        let id = header_user_id(
            &parts(&[(VENDOR_ID_HEADER, "7d9f0c52-3b8e-4a41-9a57-6f1e2b3c4d5e")]),
            VENDOR_ID_HEADER,
        )
        .unwrap();
        assert_eq!(id.to_string(), "7d9f0c52-3b8e-4a41-9a57-6f1e2b3c4d5e");
    }
}
