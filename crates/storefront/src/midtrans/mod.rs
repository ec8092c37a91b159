//! Midtrans Snap client and notification verification.

pub mod types;

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::{Digest, Sha512};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::MidtransConfig;

pub use types::{
    Callbacks, ItemDetail, Notification, SnapCustomer, SnapRequest, SnapResponse,
    TransactionDetails,
};

/// Errors that can occur when interacting with Midtrans.
#[derive(Debug, Error)]
pub enum MidtransError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Snap rejected the transaction.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Notification signature did not verify.
    #[error("Invalid signature for order {0}")]
    InvalidSignature(String),

    /// The server key cannot be used as a header value.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

#[derive(Debug, Deserialize)]
struct SnapErrorBody {
    #[serde(default)]
    error_messages: Vec<String>,
}

/// Midtrans Snap API client.
#[derive(Clone)]
pub struct MidtransClient {
    inner: Arc<MidtransClientInner>,
}

struct MidtransClientInner {
    client: reqwest::Client,
    snap_url: String,
    server_key: SecretString,
    client_key: String,
}

impl MidtransClient {
    /// Create a new Snap client.
    ///
    /// # Errors
    ///
    /// Returns error if the server key is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &MidtransConfig) -> Result<Self, MidtransError> {
        let mut headers = HeaderMap::new();

        // Basic auth with the server key as user name and an empty password
        let credentials = STANDARD.encode(format!("{}:", config.server_key.expose_secret()));
        let mut auth = HeaderValue::from_str(&format!("Basic {credentials}"))
            .map_err(|e| MidtransError::InvalidHeader(e.to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            inner: Arc::new(MidtransClientInner {
                client,
                snap_url: config.snap_url.trim_end_matches('/').to_string(),
                server_key: config.server_key.clone(),
                client_key: config.client_key.clone(),
            }),
        })
    }

    /// Client key for the Snap widget.
    #[must_use]
    pub fn client_key(&self) -> &str {
        &self.inner.client_key
    }

    /// Request a Snap token.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Snap rejects it.
    #[instrument(skip(self, request), fields(order_id = %request.transaction_details.order_id))]
    pub async fn create_transaction(
        &self,
        request: &SnapRequest,
    ) -> Result<SnapResponse, MidtransError> {
        let response = self
            .inner
            .client
            .post(format!("{}/transactions", self.inner.snap_url))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<SnapErrorBody>(&text)
                .ok()
                .filter(|body| !body.error_messages.is_empty())
                .map_or(text, |body| body.error_messages.join("; "));
            return Err(MidtransError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let snap: SnapResponse = response.json().await?;
        debug!("Snap token issued");
        Ok(snap)
    }

    /// Check a notification's `signature_key`.
    ///
    /// # Errors
    ///
    /// Returns `MidtransError::InvalidSignature` if the signature does not
    /// match.
    pub fn verify_notification(&self, notification: &Notification) -> Result<(), MidtransError> {
        let expected = notification_signature(
            &notification.order_id,
            &notification.status_code,
            &notification.gross_amount,
            self.inner.server_key.expose_secret(),
        );
        if !constant_time_compare(&expected, &notification.signature_key.to_ascii_lowercase()) {
            return Err(MidtransError::InvalidSignature(notification.order_id.clone()));
        }
        Ok(())
    }
}

/// `SHA512(order_id + status_code + gross_amount + server_key)`, hex encoded.
#[must_use]
pub fn notification_signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SERVER_KEY: &str = "SB-Mid-server-7fQk2LwZp9XbN4vR1tYc";

    fn client() -> MidtransClient {
        MidtransClient::new(&MidtransConfig {
            server_key: SecretString::from(SERVER_KEY),
            client_key: "SB-Mid-client-abc".to_string(),
            is_production: false,
            snap_url: MidtransConfig::snap_url_for(false).to_string(),
        })
        .unwrap()
    }

    fn signed(order_id: &str, amount: &str) -> Notification {
        Notification {
            order_id: order_id.into(),
            status_code: "200".into(),
            gross_amount: amount.into(),
            signature_key: notification_signature(order_id, "200", amount, SERVER_KEY),
            transaction_status: "settlement".into(),
            fraud_status: None,
            transaction_id: None,
            payment_type: None,
        }
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }

    #[test]
    fn test_signature_is_sha512_hex() {
        let sig = notification_signature("KLU-1-000001", "200", "10000.00", SERVER_KEY);
        assert_eq!(sig.len(), 128);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_verify_accepts_valid_signature() {
        assert!(client().verify_notification(&signed("KLU-1-000001", "10000.00")).is_ok());
    }

    #[test]
    fn test_verify_rejects_tampered_amount() {
        let mut notification = signed("KLU-1-000001", "10000.00");
        notification.gross_amount = "1.00".into();
        assert!(matches!(
            client().verify_notification(&notification),
            Err(MidtransError::InvalidSignature(_))
        ));
    }
}
