//! Integration tests for Kilau.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p kilau-integration-tests
//! ```
//!
//! Nothing here needs a network: checkout tests use the fakes below with
//! paused tokio time, and router tests point the storefront at an upstream
//! address that refuses connections.
//!
//! # Test Files
//!
//! - `checkout_flow` - the checkout session end to end
//! - `admin_shipments` - the dashboard shipment client against a local server
//! - `storefront_router` - validation, auth gates and middleware of `/api`

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use kilau_checkout::{
    AddressSource, ApiError, CheckoutConfig, CheckoutDeps, MemoryStorage, Navigator,
    PaymentWidget, Prompt, RateError, RateProvider, TokenClient, TransactionRequest,
    TransactionResult, TransactionToken, WidgetOutcome,
};
use kilau_core::{Address, Destination, Rupiah, ServiceOption, User};
use kilau_storefront::config::{KomerceConfig, MidtransConfig, StorefrontConfig, SupabaseConfig};
use secrecy::SecretString;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Checkout fakes
// =============================================================================

/// Rate provider quoting one JNE REG service per destination.
///
/// The cost is `cost` for the destination's location id, or 20 000 when no
/// cost was configured. Destinations listed in `delays` answer late.
#[derive(Default)]
pub struct FakeRates {
    costs: HashMap<String, u64>,
    delays: HashMap<String, Duration>,
    calls: AtomicUsize,
}

impl FakeRates {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn cost(mut self, location_id: &str, cost: u64) -> Self {
        self.costs.insert(location_id.to_owned(), cost);
        self
    }

    #[must_use]
    pub fn delay(mut self, location_id: &str, delay: Duration) -> Self {
        self.delays.insert(location_id.to_owned(), delay);
        self
    }

    /// Number of rate requests issued so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateProvider for FakeRates {
    async fn fetch_rates(
        &self,
        destination: &Destination,
        _weight_grams: u32,
        _courier: &str,
    ) -> Result<Vec<ServiceOption>, RateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let id = destination.location_id();
        if let Some(delay) = self.delays.get(id) {
            tokio::time::sleep(*delay).await;
        }
        Ok(vec![ServiceOption {
            courier: "jne".into(),
            courier_name: "JNE".into(),
            service: "REG".into(),
            service_name: "Layanan Reguler".into(),
            cost: Rupiah::new(self.costs.get(id).copied().unwrap_or(20_000)),
            etd: "2-3 hari".into(),
        }])
    }
}

/// Token client that records every request and charges the client total.
#[derive(Default)]
pub struct FakeTokens {
    requests: Mutex<Vec<TransactionRequest>>,
}

impl FakeTokens {
    #[must_use]
    pub fn requests(&self) -> Vec<TransactionRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl TokenClient for FakeTokens {
    async fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<TransactionToken, ApiError> {
        lock(&self.requests).push(request.clone());
        Ok(TransactionToken {
            token: "snap-token".into(),
            redirect_url: "https://app.sandbox.midtrans.com/snap/v4/redirection/snap-token".into(),
            order_id: "KLU-1700000000-000001".into(),
            gross_amount: request.client_total,
        })
    }
}

/// Payment widget that answers with a fixed outcome.
pub struct FakeWidget(pub WidgetOutcome);

impl FakeWidget {
    /// A widget reporting a settled payment.
    #[must_use]
    pub fn paid() -> Self {
        Self(WidgetOutcome::Success(TransactionResult {
            order_id: "KLU-1700000000-000001".into(),
            transaction_status: "settlement".into(),
            status_code: "200".into(),
            ..TransactionResult::default()
        }))
    }
}

#[async_trait]
impl PaymentWidget for FakeWidget {
    async fn pay(&self, _token: &TransactionToken) -> WidgetOutcome {
        self.0.clone()
    }
}

/// Browser page: records redirects and alerts, answers confirms with
/// `proceed`.
#[derive(Default)]
pub struct FakePage {
    redirects: Mutex<Vec<String>>,
    alerts: Mutex<Vec<String>>,
    pub proceed: bool,
}

impl FakePage {
    #[must_use]
    pub fn redirects(&self) -> Vec<String> {
        lock(&self.redirects).clone()
    }

    #[must_use]
    pub fn alerts(&self) -> Vec<String> {
        lock(&self.alerts).clone()
    }
}

impl Navigator for FakePage {
    fn redirect(&self, path: &str) {
        lock(&self.redirects).push(path.to_owned());
    }
}

impl Prompt for FakePage {
    fn alert(&self, message: &str) {
        lock(&self.alerts).push(message.to_owned());
    }

    fn confirm(&self, _message: &str) -> bool {
        self.proceed
    }
}

/// Address source returning the same saved address for every user.
pub struct FakeAddressSource(pub Option<Address>);

#[async_trait]
impl AddressSource for FakeAddressSource {
    async fn fetch_address(&self, _user: &User) -> Result<Option<Address>, ApiError> {
        Ok(self.0.clone())
    }
}

/// Everything a checkout test needs to inspect after the fact.
pub struct Harness {
    pub storage: Arc<MemoryStorage>,
    pub rates: Arc<FakeRates>,
    pub tokens: Arc<FakeTokens>,
    pub page: Arc<FakePage>,
}

impl Harness {
    #[must_use]
    pub fn new(rates: FakeRates) -> Self {
        Self {
            storage: Arc::new(MemoryStorage::new()),
            rates: Arc::new(rates),
            tokens: Arc::new(FakeTokens::default()),
            page: Arc::new(FakePage {
                proceed: true,
                ..FakePage::default()
            }),
        }
    }

    /// Session dependencies with a widget that reports a settled payment.
    #[must_use]
    pub fn deps(&self) -> CheckoutDeps {
        CheckoutDeps {
            storage: self.storage.clone(),
            rates: Some(self.rates.clone()),
            address_source: None,
            tokens: self.tokens.clone(),
            widget: Arc::new(FakeWidget::paid()),
            navigator: self.page.clone(),
            prompt: self.page.clone(),
        }
    }
}

/// Checkout settings for tests: live rates only, default debounce.
#[must_use]
pub fn checkout_config() -> CheckoutConfig {
    CheckoutConfig {
        rate_mode: kilau_checkout::RateProviderMode::Live,
        ..CheckoutConfig::default()
    }
}

/// A complete Jakarta address whose rate destination is `district`.
#[must_use]
pub fn address_in(district: &str) -> Address {
    Address {
        recipient_name: "Budi Santoso".into(),
        phone: "081234567890".into(),
        address_line: "Jl. Melati No. 5".into(),
        province: "6".into(),
        city: "152".into(),
        district: district.into(),
        postal_code: "12940".into(),
        ..Address::default()
    }
}

// =============================================================================
// Storefront config
// =============================================================================

/// Upstream base URL that refuses connections.
pub const UNREACHABLE: &str = "http://127.0.0.1:9";

/// Midtrans server key used by [`storefront_config`].
pub const MIDTRANS_SERVER_KEY: &str = "SB-Mid-server-7fQk2LwZp9XbN4vR1tYc";

/// Storefront settings whose upstreams are all unreachable.
#[must_use]
pub fn storefront_config() -> StorefrontConfig {
    StorefrontConfig {
        host: std::net::IpAddr::from([127, 0, 0, 1]),
        port: 3000,
        base_url: "http://localhost:3000".into(),
        cors_origin: Some("https://preview.kilau.id".into()),
        supabase: SupabaseConfig {
            url: UNREACHABLE.into(),
            anon_key: "anon-key-for-tests".into(),
            service_role_key: SecretString::from("service-role-key-for-tests"),
        },
        midtrans: MidtransConfig {
            server_key: SecretString::from(MIDTRANS_SERVER_KEY),
            client_key: "SB-Mid-client-test".into(),
            is_production: false,
            snap_url: UNREACHABLE.into(),
        },
        komerce: KomerceConfig {
            api_key: SecretString::from("komerce-key-for-tests"),
            base_url: UNREACHABLE.into(),
            delivery_url: UNREACHABLE.into(),
            origin_id: "17650".into(),
            couriers: "jne:pos:tiki".into(),
        },
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}
