//! Shared builders for integration tests.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicUsize, Ordering},
};

use rusty_money::{Money, iso::NZD};
use shoptools::{
    config::ShopConfig,
    items::{
        ItemRef, OptionChoices,
        catalogue::{Catalogue, Product},
    },
    money::Amount,
    orders::{Address, Email, EmailKind, MailError, Mailer},
    payments::{GatewayError, GatewayRedirect, PaymentGateway},
    regions::{Country, Region, RegionKey, Regions},
    shipping::PerItemShipping,
    shop::{Shop, ShopBuilder},
    store::TransactionRecord,
};

/// Mailer that keeps everything it is asked to send.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<Email> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, kind: EmailKind) -> usize {
        self.sent().iter().filter(|email| email.kind == kind).count()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, email: &Email) -> Result<(), MailError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(email.clone());

        Ok(())
    }
}

/// Gateway that approves or declines every payment and counts calls.
#[derive(Debug, Default)]
pub struct TestGateway {
    pub decline: bool,
    pub begun: AtomicUsize,
    pub confirmed: AtomicUsize,
}

impl TestGateway {
    pub fn declining() -> Self {
        Self {
            decline: true,
            ..Self::default()
        }
    }
}

impl PaymentGateway for TestGateway {
    fn begin(&self, transaction: &TransactionRecord) -> Result<GatewayRedirect, GatewayError> {
        let count = self.begun.fetch_add(1, Ordering::SeqCst) + 1;

        Ok(GatewayRedirect {
            reference: format!("PAY-{count}"),
            url: format!("https://pay.example.com/{}", transaction.id),
        })
    }

    fn confirm(&self, _transaction: &TransactionRecord, _payer: &str) -> Result<bool, GatewayError> {
        self.confirmed.fetch_add(1, Ordering::SeqCst);

        Ok(!self.decline)
    }
}

/// Products used across the tests.
#[derive(Debug)]
pub struct Items {
    pub catalogue: Arc<Catalogue>,
    pub mug: ItemRef,
    pub print: ItemRef,
    pub lamp: ItemRef,
}

pub fn nzd(minor: i64) -> Amount {
    Money::from_minor(minor, NZD)
}

/// A mug with colour choices, a print with a free-text dedication and a lamp
/// with shipping of its own and three in stock.
pub fn items() -> Items {
    let catalogue = Arc::new(Catalogue::new());

    let mug = catalogue.insert(
        Product::new(1, "Mug", nzd(1000))
            .with_option("colour", OptionChoices::choices(["white", "blue"])),
    );
    let print = catalogue.insert(
        Product::new(2, "Print", nzd(5000))
            .with_option("dedication", OptionChoices::free_text()),
    );
    let lamp = catalogue.insert(
        Product::new(3, "Lamp", nzd(10_000))
            .with_stock(3)
            .with_shipping_cost(nzd(2000)),
    );

    Items {
        catalogue,
        mug,
        print,
        lamp,
    }
}

pub fn regions() -> (Regions, RegionKey) {
    let mut regions = Regions::new();
    let nz = regions.insert(
        Region::new("New Zealand", NZD)
            .with_country(Country::new("NZ", "New Zealand"))
            .as_default(),
    );

    (regions, nz)
}

/// Builder with the test items, one region and per-item shipping.
pub fn builder(items: &Items) -> ShopBuilder {
    let (regions, _) = regions();

    Shop::builder(ShopConfig::default(), Arc::clone(&items.catalogue) as _)
        .regions(regions)
        .shipping(Box::new(PerItemShipping))
}

pub fn address() -> Address {
    Address {
        first_name: "Mere".to_string(),
        last_name: "Tane".to_string(),
        email: "mere@example.com".to_string(),
        street: "1 Queen Street".to_string(),
        city: "Auckland".to_string(),
        country: "NZ".to_string(),
        ..Address::default()
    }
}
