//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::komerce::{KomerceClient, KomerceError};
use crate::midtrans::{MidtransClient, MidtransError};
use crate::supabase::{SupabaseClient, SupabaseError};

/// Error building the upstream clients.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("supabase client: {0}")]
    Supabase(#[from] SupabaseError),
    #[error("midtrans client: {0}")]
    Midtrans(#[from] MidtransError),
    #[error("komerce client: {0}")]
    Komerce(#[from] KomerceError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. Handlers keep no state of
/// their own; the clients only share connection pools and the rate cache.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    supabase: SupabaseClient,
    midtrans: MidtransClient,
    komerce: KomerceClient,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if any upstream client cannot be built from the
    /// configuration.
    pub fn new(config: StorefrontConfig) -> Result<Self, StateError> {
        let supabase = SupabaseClient::new(&config.supabase)?;
        let midtrans = MidtransClient::new(&config.midtrans)?;
        let komerce = KomerceClient::new(&config.komerce)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                supabase,
                midtrans,
                komerce,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn supabase(&self) -> &SupabaseClient {
        &self.inner.supabase
    }

    #[must_use]
    pub fn midtrans(&self) -> &MidtransClient {
        &self.inner.midtrans
    }

    #[must_use]
    pub fn komerce(&self) -> &KomerceClient {
        &self.inner.komerce
    }
}
