//! Account functions: login, registration and the saved checkout address.
//!
//! Credentials are checked by Supabase auth; the `profiles` row carries the
//! role and contact details returned to the browser as the `user` record.

use axum::{Json, extract::State, http::StatusCode};
use kilau_core::{Address, Email, Role, User, UserId};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{ApiJson, ApiQuery};
use crate::error::{AppError, Result, add_breadcrumb, set_sentry_user};
use crate::state::AppState;
use crate::supabase::{ProfileRepository, SupabaseError};
use crate::supabase::types::ProfileRow;

const MIN_PASSWORD_LEN: usize = 8;

// =============================================================================
// Request / Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveAddressRequest {
    pub user_id: Option<UserId>,
    pub address: Option<Address>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileQuery {
    pub user_id: Option<UserId>,
}

/// Body returned by login and registration.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: User,
    pub address: Option<Address>,
}

#[derive(Debug, Serialize)]
pub struct SaveAddressResponse {
    pub success: bool,
    pub address: Address,
}

// =============================================================================
// Handlers
// =============================================================================

/// `POST /api/auth-login`
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let email = request.email.trim();
    if email.is_empty() || request.password.is_empty() {
        return Err(AppError::BadRequest("Email dan password wajib diisi".to_string()));
    }

    let session = state
        .supabase()
        .sign_in(email, &request.password)
        .await
        .map_err(|e| {
            if e.is_client_error() {
                AppError::Unauthorized("Email atau password salah".to_string())
            } else {
                e.into()
            }
        })?;

    let profiles = ProfileRepository::new(state.supabase());
    let profile = match profiles.get(session.user.id).await? {
        Some(profile) => profile,
        // Accounts created outside this site have no profile yet
        None => {
            profiles
                .upsert(&ProfileRow {
                    id: session.user.id,
                    name: String::new(),
                    email: session.user.email.clone().unwrap_or_else(|| email.to_string()),
                    phone: String::new(),
                    role: Role::Customer,
                    address: None,
                    created_at: None,
                })
                .await?
        }
    };

    set_sentry_user(&profile.id, Some(&profile.email));
    add_breadcrumb("auth", "User logged in", None);
    tracing::info!(user_id = %profile.id, "Login succeeded");

    Ok(Json(AuthResponse {
        user: profile.into(),
        access_token: Some(session.access_token),
    }))
}

/// `POST /api/auth-register`
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Nama wajib diisi".to_string()));
    }
    let email = Email::parse(&request.email)
        .map_err(|_| AppError::BadRequest("Email tidak valid".to_string()))?;
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password minimal {MIN_PASSWORD_LEN} karakter"
        )));
    }

    let metadata = serde_json::json!({ "name": name, "phone": request.phone.trim() });
    let auth_user = state
        .supabase()
        .sign_up(email.as_str(), &request.password, &metadata)
        .await
        .map_err(|e| match e {
            // Taken address or rejected password
            SupabaseError::Api { status, message } if (400..500).contains(&status) => {
                AppError::BadRequest(message)
            }
            other => other.into(),
        })?;

    let profile = ProfileRepository::new(state.supabase())
        .upsert(&ProfileRow {
            id: auth_user.id,
            name: name.to_string(),
            email: email.to_string(),
            phone: request.phone.trim().to_string(),
            role: Role::Customer,
            address: None,
            created_at: None,
        })
        .await?;

    tracing::info!(user_id = %profile.id, "User registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: profile.into(),
            access_token: None,
        }),
    ))
}

/// `POST /api/auth-save-address`
#[instrument(skip_all)]
pub async fn save_address(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SaveAddressRequest>,
) -> Result<Json<SaveAddressResponse>> {
    let user_id = request
        .user_id
        .ok_or_else(|| AppError::BadRequest("Missing field: user_id".to_string()))?;
    let address = request
        .address
        .ok_or_else(|| AppError::BadRequest("Missing field: address".to_string()))?;

    ProfileRepository::new(state.supabase())
        .save_address(user_id, &address)
        .await?
        .ok_or_else(|| AppError::NotFound("Profil tidak ditemukan".to_string()))?;

    tracing::debug!(user_id = %user_id, "Address saved");
    Ok(Json(SaveAddressResponse {
        success: true,
        address,
    }))
}

/// `GET /api/auth-profile?user_id=`
#[instrument(skip_all)]
pub async fn profile(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProfileQuery>,
) -> Result<Json<ProfileResponse>> {
    let user_id = query
        .user_id
        .ok_or_else(|| AppError::BadRequest("Missing field: user_id".to_string()))?;
    let mut profile = ProfileRepository::new(state.supabase())
        .get(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profil tidak ditemukan".to_string()))?;

    let address = profile.address.take();
    Ok(Json(ProfileResponse {
        user: profile.into(),
        address,
    }))
}
