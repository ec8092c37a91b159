//! Payment initiation.
//!
//! [`PaymentInitiator::submit`] validates the cart, asks the storefront for a
//! payment token and hands it to the payment widget. The amount sent is only
//! advisory; the server recomputes what is charged.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use kilau_core::{CustomerDetails, OrderSummary, ShippingSelection, User};
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};

pub use kilau_core::{TransactionRequest, TransactionResult, TransactionToken};

use crate::api::ApiError;
use crate::cart::CartModel;
use crate::config::CheckoutConfig;
use crate::events::CheckoutEvent;
use crate::storage::{Storage, StorageExt, keys};

const EMPTY_CART_MESSAGE: &str = "Keranjang belanja masih kosong.";
const NO_SHIPPING_MESSAGE: &str =
    "Layanan pengiriman belum dipilih. Lanjutkan pembayaran tanpa ongkir?";
const TOKEN_FAILED_MESSAGE: &str = "Gagal memulai pembayaran. Silakan coba lagi.";
const PAYMENT_FAILED_MESSAGE: &str = "Pembayaran gagal. Silakan coba lagi.";

/// Requests a payment token from the storefront.
#[async_trait]
pub trait TokenClient: Send + Sync {
    async fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<TransactionToken, ApiError>;
}

/// How the payment widget finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetOutcome {
    Success(TransactionResult),
    Pending(TransactionResult),
    Error(TransactionResult),
    /// Closed by the customer before finishing.
    Closed,
}

/// The hosted payment widget.
#[async_trait]
pub trait PaymentWidget: Send + Sync {
    /// Open the widget with `token` and wait for its callback.
    async fn pay(&self, token: &TransactionToken) -> WidgetOutcome;
}

/// Page navigation.
pub trait Navigator: Send + Sync {
    fn redirect(&self, path: &str);
}

/// Blocking user dialogs.
pub trait Prompt: Send + Sync {
    fn alert(&self, message: &str);
    /// Ask a yes/no question; `true` means proceed.
    fn confirm(&self, message: &str) -> bool;
}

/// Reasons a submission stopped before or at the token request.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("a payment is already in progress")]
    InProgress,

    #[error("checkout stopped: no shipping service selected")]
    ShippingDeclined,

    #[error("payment token request failed: {0}")]
    Token(#[from] ApiError),
}

/// What happened after the widget was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Paid; the cart was cleared and the page redirected.
    Paid(TransactionResult),
    /// Awaiting settlement; the page was redirected.
    Pending(TransactionResult),
    /// The gateway reported an error; the customer was asked to retry.
    Failed(TransactionResult),
    /// The widget was closed; checkout state is unchanged.
    Closed,
}

/// Resets the submission latch when a submission ends, however it ends.
struct Latch<'a>(&'a AtomicBool);

impl Drop for Latch<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Injected collaborators of [`PaymentInitiator`].
pub struct PaymentPorts {
    pub tokens: Arc<dyn TokenClient>,
    pub widget: Arc<dyn PaymentWidget>,
    pub navigator: Arc<dyn Navigator>,
    pub prompt: Arc<dyn Prompt>,
}

pub struct PaymentInitiator {
    storage: Arc<dyn Storage>,
    cart: Arc<CartModel>,
    ports: PaymentPorts,
    success_path: String,
    pending_path: String,
    latest: Mutex<Option<OrderSummary>>,
    in_flight: AtomicBool,
}

impl PaymentInitiator {
    #[must_use]
    pub fn new(
        storage: Arc<dyn Storage>,
        cart: Arc<CartModel>,
        ports: PaymentPorts,
        config: &CheckoutConfig,
    ) -> Self {
        Self {
            storage,
            cart,
            ports,
            success_path: config.success_path.clone(),
            pending_path: config.pending_path.clone(),
            latest: Mutex::new(None),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Track `checkout:order-summary-updated` until the bus closes.
    pub async fn run(&self, mut rx: broadcast::Receiver<CheckoutEvent>) {
        loop {
            match rx.recv().await {
                Ok(CheckoutEvent::OrderSummaryUpdated(summary)) => {
                    *self.lock() = Some(summary);
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    }

    /// Whether a submission is currently running.
    #[must_use]
    pub fn in_progress(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Run one checkout submission.
    ///
    /// # Errors
    ///
    /// - `PaymentError::InProgress` while another submission runs
    /// - `PaymentError::EmptyCart` for an empty cart (no token is requested)
    /// - `PaymentError::ShippingDeclined` if the customer stops at the
    ///   missing-shipping warning
    /// - `PaymentError::Token` if the storefront refuses the token request
    #[tracing::instrument(skip(self))]
    pub async fn submit(&self) -> Result<PaymentOutcome, PaymentError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(PaymentError::InProgress);
        }
        let _latch = Latch(&self.in_flight);

        let items = self.cart.items();
        if items.is_empty() {
            self.ports.prompt.alert(EMPTY_CART_MESSAGE);
            return Err(PaymentError::EmptyCart);
        }

        let shipping: Option<ShippingSelection> = self.storage.read_json(keys::CHECKOUT_SHIPPING);
        if shipping.is_none() && !self.ports.prompt.confirm(NO_SHIPPING_MESSAGE) {
            return Err(PaymentError::ShippingDeclined);
        }

        let summary = self.final_summary(&items, shipping.as_ref());
        let user: Option<User> = self.storage.read_json(keys::USER);
        let request = TransactionRequest {
            items,
            shipping,
            address: self.storage.read_json(keys::CHECKOUT_ADDRESS),
            customer: user.as_ref().map(|u| CustomerDetails {
                name: u.name.clone(),
                email: u.email.clone(),
                phone: u.phone.clone(),
            }),
            user_id: user.map(|u| u.id),
            client_total: summary.total(),
        };

        let token = match self.ports.tokens.create_transaction(&request).await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "payment token request failed");
                self.ports.prompt.alert(TOKEN_FAILED_MESSAGE);
                return Err(e.into());
            }
        };
        if token.gross_amount != request.client_total {
            tracing::info!(
                client_total = request.client_total.as_u64(),
                charged = token.gross_amount.as_u64(),
                "server adjusted the payment amount"
            );
        }

        Ok(match self.ports.widget.pay(&token).await {
            WidgetOutcome::Success(result) => {
                self.persist(&result);
                self.cart.clear();
                self.ports.navigator.redirect(&redirect_target(&self.success_path, &token.order_id));
                PaymentOutcome::Paid(result)
            }
            WidgetOutcome::Pending(result) => {
                self.persist(&result);
                self.ports.navigator.redirect(&redirect_target(&self.pending_path, &token.order_id));
                PaymentOutcome::Pending(result)
            }
            WidgetOutcome::Error(result) => {
                tracing::warn!(order_id = %token.order_id, status = %result.status_code, "payment failed");
                self.ports.prompt.alert(PAYMENT_FAILED_MESSAGE);
                PaymentOutcome::Failed(result)
            }
            WidgetOutcome::Closed => PaymentOutcome::Closed,
        })
    }

    /// The last published summary, unless none arrived yet or it predates
    /// the current cart.
    fn final_summary(
        &self,
        items: &[kilau_core::CartItem],
        shipping: Option<&ShippingSelection>,
    ) -> OrderSummary {
        let fresh = OrderSummary::compute(items, shipping);
        match *self.lock() {
            Some(published) if published.subtotal() == fresh.subtotal() => published,
            _ => fresh,
        }
    }

    fn persist(&self, result: &TransactionResult) {
        if let Err(e) = self.storage.write_json(keys::CHECKOUT_TRANSACTION, result) {
            tracing::warn!(error = %e, "transaction result not persisted");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<OrderSummary>> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for PaymentInitiator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentInitiator")
            .field("in_progress", &self.in_progress())
            .finish_non_exhaustive()
    }
}

fn redirect_target(path: &str, order_id: &str) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{path}{separator}order_id={order_id}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use kilau_core::Rupiah;

    use super::*;
    use crate::events::EventBus;
    use crate::storage::MemoryStorage;

    #[derive(Default)]
    struct Tokens {
        calls: AtomicUsize,
        last_total: Mutex<Option<Rupiah>>,
    }

    #[async_trait]
    impl TokenClient for Tokens {
        async fn create_transaction(
            &self,
            request: &TransactionRequest,
        ) -> Result<TransactionToken, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_total.lock().unwrap() = Some(request.client_total);
            Ok(TransactionToken {
                token: "snap-token".into(),
                redirect_url: String::new(),
                order_id: "KLU-1700000000-000001".into(),
                gross_amount: request.client_total,
            })
        }
    }

    struct Widget(WidgetOutcome);

    #[async_trait]
    impl PaymentWidget for Widget {
        async fn pay(&self, _token: &TransactionToken) -> WidgetOutcome {
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.0.clone()
        }
    }

    #[derive(Default)]
    struct Page {
        redirects: Mutex<Vec<String>>,
        alerts: Mutex<Vec<String>>,
        proceed: bool,
    }

    impl Navigator for Page {
        fn redirect(&self, path: &str) {
            self.redirects.lock().unwrap().push(path.to_owned());
        }
    }

    impl Prompt for Page {
        fn alert(&self, message: &str) {
            self.alerts.lock().unwrap().push(message.to_owned());
        }

        fn confirm(&self, _message: &str) -> bool {
            self.proceed
        }
    }

    struct Fixture {
        storage: Arc<MemoryStorage>,
        cart: Arc<CartModel>,
        tokens: Arc<Tokens>,
        page: Arc<Page>,
        initiator: PaymentInitiator,
    }

    fn fixture(outcome: WidgetOutcome, proceed: bool) -> Fixture {
        let storage = Arc::new(MemoryStorage::new());
        let cart = Arc::new(CartModel::load(storage.clone(), EventBus::default()));
        let tokens = Arc::new(Tokens::default());
        let page = Arc::new(Page {
            proceed,
            ..Page::default()
        });
        let initiator = PaymentInitiator::new(
            storage.clone(),
            Arc::clone(&cart),
            PaymentPorts {
                tokens: tokens.clone(),
                widget: Arc::new(Widget(outcome)),
                navigator: page.clone(),
                prompt: page.clone(),
            },
            &CheckoutConfig::default(),
        );
        Fixture {
            storage,
            cart,
            tokens,
            page,
            initiator,
        }
    }

    fn paid() -> TransactionResult {
        TransactionResult {
            order_id: "KLU-1700000000-000001".into(),
            transaction_status: "settlement".into(),
            status_code: "200".into(),
            ..TransactionResult::default()
        }
    }

    #[tokio::test]
    async fn test_empty_cart_never_requests_token() {
        let f = fixture(WidgetOutcome::Closed, true);
        let err = f.initiator.submit().await.unwrap_err();
        assert!(matches!(err, PaymentError::EmptyCart));
        assert_eq!(f.tokens.calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.page.alerts.lock().unwrap().len(), 1);
        assert!(!f.initiator.in_progress());
    }

    #[tokio::test]
    async fn test_missing_shipping_can_be_declined() {
        let f = fixture(WidgetOutcome::Closed, false);
        let _ = f.cart.add_item("Soap", Rupiah::new(10_000)).unwrap();
        let err = f.initiator.submit().await.unwrap_err();
        assert!(matches!(err, PaymentError::ShippingDeclined));
        assert_eq!(f.tokens.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_clears_cart_and_redirects() {
        let f = fixture(WidgetOutcome::Success(paid()), true);
        let _ = f.cart.add_item("Soap", Rupiah::new(10_000)).unwrap();
        let outcome = f.initiator.submit().await.unwrap();

        assert!(matches!(outcome, PaymentOutcome::Paid(_)));
        assert!(!f.storage.contains(keys::CART));
        assert!(f.storage.contains(keys::CHECKOUT_TRANSACTION));
        assert_eq!(
            f.page.redirects.lock().unwrap().as_slice(),
            ["/checkout/success?order_id=KLU-1700000000-000001"]
        );
        assert_eq!(*f.tokens.last_total.lock().unwrap(), Some(Rupiah::new(10_000)));
    }

    #[tokio::test]
    async fn test_close_leaves_state_unchanged() {
        let f = fixture(WidgetOutcome::Closed, true);
        let _ = f.cart.add_item("Soap", Rupiah::new(10_000)).unwrap();
        let outcome = f.initiator.submit().await.unwrap();
        assert_eq!(outcome, PaymentOutcome::Closed);
        assert_eq!(f.cart.count(), 1);
        assert!(f.page.redirects.lock().unwrap().is_empty());
        assert!(!f.storage.contains(keys::CHECKOUT_TRANSACTION));
    }

    #[tokio::test]
    async fn test_error_prompts_retry_and_keeps_cart() {
        let f = fixture(WidgetOutcome::Error(TransactionResult::default()), true);
        let _ = f.cart.add_item("Soap", Rupiah::new(10_000)).unwrap();
        let outcome = f.initiator.submit().await.unwrap();
        assert!(matches!(outcome, PaymentOutcome::Failed(_)));
        assert_eq!(f.cart.count(), 1);
        assert_eq!(f.page.alerts.lock().unwrap().as_slice(), [PAYMENT_FAILED_MESSAGE]);
    }

    #[tokio::test]
    async fn test_double_submit_is_rejected() {
        let f = fixture(WidgetOutcome::Pending(paid()), true);
        let _ = f.cart.add_item("Soap", Rupiah::new(10_000)).unwrap();
        let (first, second) = tokio::join!(f.initiator.submit(), f.initiator.submit());
        assert!(matches!(first, Ok(PaymentOutcome::Pending(_))));
        assert!(matches!(second, Err(PaymentError::InProgress)));
        assert_eq!(f.tokens.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_prefers_published_summary() {
        let f = fixture(WidgetOutcome::Closed, true);
        let _ = f.cart.add_item("Soap", Rupiah::new(10_000)).unwrap();
        *f.initiator.lock() = Some(OrderSummary::new(Rupiah::new(10_000), Rupiah::new(9_000)));
        f.initiator.submit().await.unwrap();
        assert_eq!(*f.tokens.last_total.lock().unwrap(), Some(Rupiah::new(19_000)));
    }

    #[tokio::test]
    async fn test_summary_behind_cart_is_recomputed() {
        let f = fixture(WidgetOutcome::Closed, true);
        let _ = f.cart.add_item("Soap", Rupiah::new(10_000)).unwrap();
        *f.initiator.lock() = Some(OrderSummary::new(Rupiah::new(10_000), Rupiah::ZERO));
        let _ = f.cart.add_item("Soap", Rupiah::new(10_000)).unwrap();

        f.initiator.submit().await.unwrap();
        assert_eq!(*f.tokens.last_total.lock().unwrap(), Some(Rupiah::new(20_000)));
    }
}
