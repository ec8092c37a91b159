//! Supabase client: `PostgREST` tables and GoTrue password auth.
//!
//! # Tables
//!
//! - `profiles` - One row per auth user: contact details, role, saved address
//! - `products` - Catalog rows (price in rupiah, optional weight in grams)
//! - `orders` - Orders created by `create-transaction`, updated by the
//!   Midtrans notification
//! - `vendors` - Stores registered through `vendor-register`
//!
//! Table access uses the service role key, so every handler is responsible
//! for its own authorization checks.

mod orders;
mod products;
mod profiles;
pub mod types;

use std::sync::Arc;

use kilau_core::UserId;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::config::SupabaseConfig;

pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use profiles::{ProfileRepository, VendorRepository};

/// Errors that can occur when talking to Supabase.
#[derive(Debug, Error)]
pub enum SupabaseError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Supabase answered with an error status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// A configured key cannot be used as a header value.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

impl SupabaseError {
    /// Whether the error is a rejection of the caller's input (4xx), as
    /// opposed to an outage.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Api { status, .. } if *status >= 400 && *status < 500)
    }
}

/// Session returned by a successful password sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: u64,
    pub user: AuthUser,
}

/// Auth user as reported by GoTrue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
}

/// Sign-up answers with a session when e-mail confirmation is off and with
/// the bare user otherwise.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(AuthSession),
    User(AuthUser),
}

/// Supabase client shared by all handlers.
#[derive(Clone)]
pub struct SupabaseClient {
    inner: Arc<SupabaseClientInner>,
}

struct SupabaseClientInner {
    /// Authenticated with the service role key.
    client: reqwest::Client,
    /// Authenticated with the anon key (GoTrue).
    auth_client: reqwest::Client,
    url: String,
}

impl SupabaseClient {
    /// Create a new Supabase client.
    ///
    /// # Errors
    ///
    /// Returns error if a key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &SupabaseConfig) -> Result<Self, SupabaseError> {
        let client = reqwest::Client::builder()
            .default_headers(key_headers(config.service_role_key.expose_secret())?)
            .build()?;
        let auth_client = reqwest::Client::builder()
            .default_headers(key_headers(&config.anon_key)?)
            .build()?;

        Ok(Self {
            inner: Arc::new(SupabaseClientInner {
                client,
                auth_client,
                url: config.url.clone(),
            }),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.inner.url)
    }

    /// `GET /rest/v1/{table}` with `PostgREST` filters such as
    /// `("id", "eq.<uuid>")`.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the rows cannot be decoded.
    #[instrument(skip(self, filters))]
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Vec<T>, SupabaseError> {
        let response = self
            .inner
            .client
            .get(self.table_url(table))
            .query(filters)
            .send()
            .await?;
        read_json(response).await
    }

    /// Select at most one row.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the row cannot be decoded.
    pub async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Option<T>, SupabaseError> {
        let mut filters = filters.to_vec();
        filters.push(("limit", "1".to_string()));
        Ok(self.select(table, &filters).await?.into_iter().next())
    }

    /// Insert rows and return them as stored.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the rows cannot be decoded.
    #[instrument(skip(self, body))]
    pub async fn insert<B, T>(&self, table: &str, body: &B) -> Result<Vec<T>, SupabaseError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .inner
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }

    /// Insert or update rows on primary-key conflict.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the rows cannot be decoded.
    #[instrument(skip(self, body))]
    pub async fn upsert<B, T>(&self, table: &str, body: &B) -> Result<Vec<T>, SupabaseError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .inner
            .client
            .post(self.table_url(table))
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }

    /// Patch the rows matching `filters` and return them.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the rows cannot be decoded.
    #[instrument(skip(self, filters, body))]
    pub async fn update<B, T>(
        &self,
        table: &str,
        filters: &[(&str, String)],
        body: &B,
    ) -> Result<Vec<T>, SupabaseError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .inner
            .client
            .patch(self.table_url(table))
            .query(filters)
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }

    /// Delete the rows matching `filters`, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self, filters))]
    pub async fn delete(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<usize, SupabaseError> {
        let response = self
            .inner
            .client
            .delete(self.table_url(table))
            .query(filters)
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let rows: Vec<serde_json::Value> = read_json(response).await?;
        Ok(rows.len())
    }

    /// Password sign-in.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::Api` with status 400 for wrong credentials.
    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, SupabaseError> {
        let response = self
            .inner
            .auth_client
            .post(format!("{}/auth/v1/token", self.inner.url))
            .query(&[("grant_type", "password")])
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        read_json(response).await
    }

    /// Register a new auth user.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::Api` when the address is taken or the
    /// password is rejected.
    #[instrument(skip(self, password, metadata))]
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &serde_json::Value,
    ) -> Result<AuthUser, SupabaseError> {
        let response = self
            .inner
            .auth_client
            .post(format!("{}/auth/v1/signup", self.inner.url))
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "data": metadata,
            }))
            .send()
            .await?;
        Ok(match read_json(response).await? {
            SignUpResponse::Session(session) => session.user,
            SignUpResponse::User(user) => user,
        })
    }

    /// Cheap request used by the readiness probe.
    ///
    /// # Errors
    ///
    /// Returns error if Supabase is unreachable or rejects the key.
    pub async fn ping(&self) -> Result<(), SupabaseError> {
        let _: Vec<serde_json::Value> = self
            .select("products", &[("select", "id".to_string()), ("limit", "1".to_string())])
            .await?;
        Ok(())
    }
}

fn key_headers(key: &str) -> Result<HeaderMap, SupabaseError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        "apikey",
        HeaderValue::from_str(key).map_err(|e| SupabaseError::InvalidHeader(e.to_string()))?,
    );
    headers.insert(
        "Authorization",
        HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|e| SupabaseError::InvalidHeader(e.to_string()))?,
    );
    Ok(headers)
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, SupabaseError> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(SupabaseError::Api {
            status: status.as_u16(),
            message: error_message(&text),
        });
    }
    Ok(response.json().await?)
}

/// Pull a human readable message out of a `PostgREST` or GoTrue error body.
fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.to_string();
    };
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(serde_json::Value::as_str))
        .map_or_else(|| body.to_string(), str::to_string)
}

/// `PostgREST` equality filter value.
pub(crate) fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_description() {
        let body = r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;
        assert_eq!(error_message(body), "Invalid login credentials");
        assert_eq!(
            error_message(r#"{"code":"23505","message":"duplicate key value"}"#),
            "duplicate key value"
        );
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn test_sign_up_response_shapes() {
        let user: SignUpResponse = serde_json::from_str(
            r#"{"id":"7d9f0c52-3b8e-4a41-9a57-6f1e2b3c4d5e","email":"a@b.id"}"#,
        )
        .unwrap();
        assert!(matches!(user, SignUpResponse::User(_)));

        let session: SignUpResponse = serde_json::from_str(
            r#"{"access_token":"t","user":{"id":"7d9f0c52-3b8e-4a41-9a57-6f1e2b3c4d5e"}}"#,
        )
        .unwrap();
        assert!(matches!(session, SignUpResponse::Session(_)));
    }

    #[test]
    fn test_client_error_classification() {
        let err = SupabaseError::Api {
            status: 409,
            message: "conflict".into(),
        };
        assert!(err.is_client_error());
        let err = SupabaseError::Api {
            status: 503,
            message: "down".into(),
        };
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_eq_filter() {
        assert_eq!(eq("kit"), "eq.kit");
    }
}
