//! One checkout page: components wired to a shared storage and bus.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::address::{AddressBinding, AddressSource};
use crate::cart::CartModel;
use crate::config::{CheckoutConfig, RateProviderMode};
use crate::events::EventBus;
use crate::payment::{
    Navigator, PaymentInitiator, PaymentPorts, PaymentWidget, Prompt, TokenClient,
};
use crate::shipping::{RateProvider, ShippingResolver, StaticRateProvider};
use crate::storage::Storage;
use crate::summary::SummaryAggregator;

/// External collaborators of a checkout page.
pub struct CheckoutDeps {
    pub storage: Arc<dyn Storage>,
    /// Live rate source; `None` means only the static table is available.
    pub rates: Option<Arc<dyn RateProvider>>,
    pub address_source: Option<Arc<dyn AddressSource>>,
    pub tokens: Arc<dyn TokenClient>,
    pub widget: Arc<dyn PaymentWidget>,
    pub navigator: Arc<dyn Navigator>,
    pub prompt: Arc<dyn Prompt>,
}

/// A running checkout page. Dropping it stops the background tasks.
pub struct CheckoutSession {
    bus: EventBus,
    cart: Arc<CartModel>,
    address: AddressBinding,
    shipping: Arc<ShippingResolver>,
    summary: Arc<SummaryAggregator>,
    payment: Arc<PaymentInitiator>,
    tasks: Vec<JoinHandle<()>>,
}

impl CheckoutSession {
    /// Build every component, subscribe the listeners, then mount the
    /// address form so its initial event reaches the shipping resolver.
    pub async fn start(config: &CheckoutConfig, deps: CheckoutDeps) -> Self {
        let bus = EventBus::new(config.event_capacity);
        let cart = Arc::new(CartModel::load(Arc::clone(&deps.storage), bus.clone()));

        let table: Arc<dyn RateProvider> = Arc::new(StaticRateProvider);
        let (provider, fallback) = match (config.rate_mode, deps.rates) {
            (RateProviderMode::Static, _) | (_, None) => (table, None),
            (RateProviderMode::Live, Some(live)) => (live, None),
            (RateProviderMode::LiveWithStaticFallback, Some(live)) => (live, Some(table)),
        };
        let shipping = Arc::new(ShippingResolver::new(
            Arc::clone(&deps.storage),
            bus.clone(),
            provider,
            fallback,
            config,
        ));
        let summary = Arc::new(SummaryAggregator::new(Arc::clone(&deps.storage), bus.clone()));
        let payment = Arc::new(PaymentInitiator::new(
            Arc::clone(&deps.storage),
            Arc::clone(&cart),
            PaymentPorts {
                tokens: deps.tokens,
                widget: deps.widget,
                navigator: deps.navigator,
                prompt: deps.prompt,
            },
            config,
        ));

        let tasks = vec![
            {
                let shipping = Arc::clone(&shipping);
                let rx = bus.subscribe();
                tokio::spawn(async move { shipping.run(rx).await })
            },
            {
                let summary = Arc::clone(&summary);
                let rx = bus.subscribe();
                tokio::spawn(async move { summary.run(rx).await })
            },
            {
                let payment = Arc::clone(&payment);
                let rx = bus.subscribe();
                tokio::spawn(async move { payment.run(rx).await })
            },
        ];

        let address = AddressBinding::mount(
            Arc::clone(&deps.storage),
            bus.clone(),
            config.address_debounce,
            deps.address_source.as_deref(),
        )
        .await;

        tracing::debug!(rate_mode = ?config.rate_mode, "checkout session started");
        Self {
            bus,
            cart,
            address,
            shipping,
            summary,
            payment,
            tasks,
        }
    }

    #[must_use]
    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }

    #[must_use]
    pub fn cart(&self) -> &CartModel {
        &self.cart
    }

    #[must_use]
    pub const fn address(&self) -> &AddressBinding {
        &self.address
    }

    #[must_use]
    pub fn shipping(&self) -> &ShippingResolver {
        &self.shipping
    }

    #[must_use]
    pub fn summary(&self) -> &SummaryAggregator {
        &self.summary
    }

    #[must_use]
    pub fn payment(&self) -> &PaymentInitiator {
        &self.payment
    }
}

impl Drop for CheckoutSession {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl std::fmt::Debug for CheckoutSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutSession")
            .field("cart", &self.cart)
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}
