//! Shop
//!
//! The [`Shop`] ties the store to the pluggable parts: the catalogue, shipping
//! and voucher strategies, mailer, payment gateway and clock. Carts borrow it
//! for their whole lifetime.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::Arc,
};

use jiff::{Timestamp, civil::Date, tz::TimeZone};
use rusty_money::iso::Currency;
use tracing::info;

use crate::{
    config::{ConfigError, ShippingMode, ShopConfig},
    items::ItemResolver,
    orders::{Mailer, NullMailer},
    payments::PaymentGateway,
    regions::Regions,
    shipping::{PerItemShipping, RegionalShipping, ShippingStrategy},
    store::Store,
    vouchers::{Calculator, VoucherStrategy},
};

/// Source of the current time.
pub trait Clock: Debug + Send + Sync {
    /// Now.
    fn now(&self) -> Timestamp;

    /// Today's date in UTC.
    fn today(&self) -> Date {
        self.now().to_zoned(TimeZone::UTC).date()
    }
}

/// The system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock stuck at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

/// A shop.
pub struct Shop {
    config: ShopConfig,
    currency: &'static Currency,
    store: Store,
    items: Arc<dyn ItemResolver>,
    regions: Regions,
    shipping: Option<Box<dyn ShippingStrategy>>,
    vouchers: Option<Box<dyn VoucherStrategy>>,
    mailer: Arc<dyn Mailer>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    clock: Box<dyn Clock>,
}

impl Debug for Shop {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Shop")
            .field("config", &self.config)
            .field("items", &self.items)
            .field("regions", &self.regions)
            .field("shipping", &self.shipping)
            .field("vouchers", &self.vouchers)
            .field("gateway", &self.gateway.is_some())
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl Shop {
    /// Start building a shop.
    pub fn builder(config: ShopConfig, items: Arc<dyn ItemResolver>) -> ShopBuilder {
        ShopBuilder::new(config, items)
    }

    /// Settings.
    pub fn config(&self) -> &ShopConfig {
        &self.config
    }

    /// Default currency.
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Persistent state.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Item lookup.
    pub fn items(&self) -> &dyn ItemResolver {
        self.items.as_ref()
    }

    /// Shipping regions.
    pub fn regions(&self) -> &Regions {
        &self.regions
    }

    /// Shipping strategy, `None` for free shipping everywhere.
    pub fn shipping(&self) -> Option<&dyn ShippingStrategy> {
        self.shipping.as_deref()
    }

    /// Voucher strategy, `None` when vouchers are disabled.
    pub fn vouchers(&self) -> Option<&dyn VoucherStrategy> {
        self.vouchers.as_deref()
    }

    /// Email delivery.
    pub fn mailer(&self) -> &dyn Mailer {
        self.mailer.as_ref()
    }

    /// Payment gateway, if payments are taken.
    pub fn gateway(&self) -> Option<&dyn PaymentGateway> {
        self.gateway.as_deref()
    }

    /// Time source.
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Delete saved carts created before `cutoff`, with their lines. Returns
    /// the number of carts deleted.
    pub fn remove_saved_carts(&self, cutoff: Timestamp) -> usize {
        let mut tx = self.store.begin();
        let removed = tx.remove_saved_carts(cutoff);
        tx.commit();

        info!(removed, %cutoff, "old saved carts removed");

        removed
    }

    /// Delete every saved cart line. Returns the number of lines deleted.
    pub fn clear_saved_carts(&self) -> u64 {
        let mut tx = self.store.begin();
        let cleared = tx.clear_saved_carts();
        tx.commit();

        info!(cleared, "saved cart lines cleared");

        cleared
    }
}

/// Builds a [`Shop`]. Parts that aren't given come from the config.
pub struct ShopBuilder {
    config: ShopConfig,
    items: Arc<dyn ItemResolver>,
    regions: Regions,
    shipping: Option<Box<dyn ShippingStrategy>>,
    vouchers: Option<Option<Box<dyn VoucherStrategy>>>,
    mailer: Arc<dyn Mailer>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    clock: Box<dyn Clock>,
}

impl Debug for ShopBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ShopBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ShopBuilder {
    /// Builder with no regions, the null mailer, no gateway and the system
    /// clock.
    pub fn new(config: ShopConfig, items: Arc<dyn ItemResolver>) -> Self {
        Self {
            config,
            items,
            regions: Regions::new(),
            shipping: None,
            vouchers: None,
            mailer: Arc::new(NullMailer),
            gateway: None,
            clock: Box::new(SystemClock),
        }
    }

    /// Shipping regions.
    #[must_use]
    pub fn regions(mut self, regions: Regions) -> Self {
        self.regions = regions;
        self
    }

    /// Shipping strategy, replacing the one the config selects.
    #[must_use]
    pub fn shipping(mut self, strategy: Box<dyn ShippingStrategy>) -> Self {
        self.shipping = Some(strategy);
        self
    }

    /// Voucher strategy, replacing the config's. `None` disables vouchers.
    #[must_use]
    pub fn vouchers(mut self, strategy: Option<Box<dyn VoucherStrategy>>) -> Self {
        self.vouchers = Some(strategy);
        self
    }

    /// Email delivery.
    #[must_use]
    pub fn mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }

    /// Payment gateway.
    #[must_use]
    pub fn gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Time source.
    #[must_use]
    pub fn clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build the shop.
    ///
    /// Without an explicit shipping strategy, `per_item` uses
    /// [`PerItemShipping`] and `regional` an empty [`RegionalShipping`], which
    /// can't ship anywhere until rates are given.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Currency`] if the default currency is unknown.
    pub fn build(self) -> Result<Shop, ConfigError> {
        let currency = self.config.currency()?;

        let shipping = self.shipping.or_else(|| match self.config.shipping {
            ShippingMode::None => None,
            ShippingMode::PerItem => Some(Box::new(PerItemShipping) as Box<dyn ShippingStrategy>),
            ShippingMode::Regional => Some(Box::new(RegionalShipping::default())),
        });

        let vouchers = self.vouchers.unwrap_or_else(|| {
            self.config
                .vouchers_enabled
                .then(|| Box::new(Calculator) as Box<dyn VoucherStrategy>)
        });

        Ok(Shop {
            config: self.config,
            currency,
            store: Store::new(),
            items: self.items,
            regions: self.regions,
            shipping,
            vouchers,
            mailer: self.mailer,
            gateway: self.gateway,
            clock: self.clock,
        })
    }
}
