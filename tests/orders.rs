//! Payment completion, fulfilment and dispatch.

mod common;

use std::{
    sync::{Arc, atomic::Ordering},
    thread,
};

use testresult::TestResult;

use shoptools::{
    cart::{Cart, SessionCart, StoredCart, UpdateOutcome},
    checkout::{CheckoutDetails, CheckoutOutcome, checkout},
    config::ShopConfig,
    items::LineOptions,
    orders::{self, EmailKind, OrderStatus},
    payments::{PaymentError, TransactionStatus, confirm_payment},
    session::Session,
    shipping::PerItemShipping,
    shop::Shop,
    store::{OrderId, TransactionId, UserId},
};

use common::{Items, RecordingMailer, TestGateway, address, builder, items, regions};

struct Harness {
    items: Items,
    shop: Shop,
    mailer: Arc<RecordingMailer>,
    gateway: Arc<TestGateway>,
}

fn harness(gateway: TestGateway) -> Result<Harness, Box<dyn std::error::Error>> {
    let items = items();
    let mailer = Arc::new(RecordingMailer::default());
    let gateway = Arc::new(gateway);

    let shop = builder(&items)
        .mailer(Arc::clone(&mailer) as _)
        .gateway(Arc::clone(&gateway) as _)
        .build()?;

    Ok(Harness {
        items,
        shop,
        mailer,
        gateway,
    })
}

/// Check out `quantity` lamps and return the order and its pending transaction.
fn pending_order(
    shop: &Shop,
    items: &Items,
    user: Option<UserId>,
    quantity: u32,
) -> Result<(OrderId, TransactionId), Box<dyn std::error::Error>> {
    let mut session = Session::new();
    session.set_user(user);

    let mut cart = SessionCart::load(shop, &mut session)?;
    cart.add(&items.lamp, quantity, &LineOptions::new())?;

    let outcome = checkout(
        shop,
        &mut cart,
        None,
        CheckoutDetails {
            shipping_address: Some(address()),
            ..CheckoutDetails::default()
        },
    )?;

    match outcome {
        CheckoutOutcome::PaymentRequired {
            order, transaction, ..
        } => Ok((order, transaction)),
        other => Err(format!("expected payment to be required, got {other:?}").into()),
    }
}

fn status(shop: &Shop, order: OrderId) -> Result<OrderStatus, Box<dyn std::error::Error>> {
    Ok(shop.store().read().order(order)?.status)
}

#[test]
fn concurrent_confirmations_complete_the_order_once() -> TestResult {
    let h = harness(TestGateway::default())?;
    let (order, transaction) = pending_order(&h.shop, &h.items, None, 1)?;

    let results: Vec<Result<TransactionStatus, PaymentError>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| confirm_payment(&h.shop, transaction, "payer-1")))
            .collect();

        handles
            .into_iter()
            .filter_map(|handle| handle.join().ok())
            .collect()
    });

    let successes = results
        .iter()
        .filter(|result| matches!(result, Ok(TransactionStatus::Successful)))
        .count();

    assert_eq!(results.len(), 4);
    assert_eq!(successes, 1);
    assert_eq!(h.gateway.begun.load(Ordering::SeqCst), 1);
    assert!(h.gateway.confirmed.load(Ordering::SeqCst) >= 1);
    assert!(
        results
            .iter()
            .filter(|result| result.is_err())
            .all(|result| matches!(result, Err(PaymentError::AlreadyCompleted(_))))
    );
    assert_eq!(status(&h.shop, order)?, OrderStatus::Paid);
    assert_eq!(h.mailer.count(EmailKind::Receipt), 1);
    assert_eq!(orders::amount_due(&h.shop, order)?.to_minor_units(), 0);

    Ok(())
}

#[test]
fn repeated_success_notifications_are_ignored() -> TestResult {
    let h = harness(TestGateway::default())?;
    let (order, _) = pending_order(&h.shop, &h.items, None, 1)?;
    let due = orders::amount_due(&h.shop, order)?;

    assert!(orders::transaction_succeeded(&h.shop, order, Some(&due))?);
    assert!(!orders::transaction_succeeded(&h.shop, order, Some(&due))?);
    assert!(!orders::transaction_succeeded(&h.shop, order, None)?);

    orders::transaction_failed(&h.shop, order)?;

    assert_eq!(status(&h.shop, order)?, OrderStatus::Paid);
    assert_eq!(h.mailer.count(EmailKind::Receipt), 1);
    assert_eq!(
        h.shop.store().read().order(order)?.amount_paid.to_minor_units(),
        due.to_minor_units()
    );
    assert_eq!(orders::amount_due(&h.shop, order)?.to_minor_units(), 0);

    Ok(())
}

#[test]
fn part_payment_leaves_the_order_open() -> TestResult {
    let h = harness(TestGateway::default())?;
    let (order, _) = pending_order(&h.shop, &h.items, None, 1)?;

    assert!(!orders::transaction_succeeded(&h.shop, order, Some(&common::nzd(5000)))?);
    assert_eq!(orders::amount_due(&h.shop, order)?.to_minor_units(), 7000);
    assert!(status(&h.shop, order)? < OrderStatus::Paid);

    assert!(orders::transaction_succeeded(&h.shop, order, Some(&common::nzd(7000)))?);
    assert_eq!(status(&h.shop, order)?, OrderStatus::Paid);

    Ok(())
}

#[test]
fn declined_payment_marks_the_order_failed() -> TestResult {
    let h = harness(TestGateway::declining())?;
    let (order, transaction) = pending_order(&h.shop, &h.items, None, 1)?;

    assert_eq!(
        confirm_payment(&h.shop, transaction, "payer-1")?,
        TransactionStatus::Failed
    );
    assert_eq!(status(&h.shop, order)?, OrderStatus::PaymentFailed);
    assert!(h.mailer.sent().is_empty());
    assert!(matches!(
        confirm_payment(&h.shop, transaction, "payer-1"),
        Err(PaymentError::AlreadyCompleted(_))
    ));

    Ok(())
}

#[test]
fn paid_orders_can_no_longer_be_edited() -> TestResult {
    let h = harness(TestGateway::default())?;
    let (order, transaction) = pending_order(&h.shop, &h.items, None, 1)?;

    confirm_payment(&h.shop, transaction, "payer-1")?;

    let mut cart = StoredCart::order(&h.shop, order)?;

    assert!(cart.add(&h.items.mug, 1, &LineOptions::new()).is_err());
    assert_eq!(cart.count()?, 1);

    Ok(())
}

#[test]
fn purchase_updates_stock_and_favourites() -> TestResult {
    let h = harness(TestGateway::default())?;
    let user = UserId::new();

    let mut favourites = StoredCart::default_favourites(&h.shop, user, None);
    favourites.add(&h.items.lamp, 3, &LineOptions::new())?;
    favourites.add(&h.items.mug, 1, &LineOptions::new())?;

    let (_, transaction) = pending_order(&h.shop, &h.items, Some(user), 2)?;
    confirm_payment(&h.shop, transaction, "payer-1")?;

    let favourites = StoredCart::default_favourites(&h.shop, user, None);
    let left: Vec<(u64, u32)> = favourites
        .lines()?
        .iter()
        .map(|line| (line.line.item.id, line.line.quantity))
        .collect();

    assert_eq!(left, [(h.items.lamp.id, 1), (h.items.mug.id, 1)]);

    let mut session = Session::new();
    let mut cart = SessionCart::load(&h.shop, &mut session)?;

    assert!(matches!(
        cart.add(&h.items.lamp, 2, &LineOptions::new())?,
        UpdateOutcome::Rejected(_)
    ));
    assert_eq!(cart.add(&h.items.lamp, 1, &LineOptions::new())?, UpdateOutcome::Saved);

    Ok(())
}

#[test]
fn concurrent_shipping_sends_one_dispatch_email() -> TestResult {
    let h = harness(TestGateway::default())?;
    let (order, transaction) = pending_order(&h.shop, &h.items, None, 1)?;

    confirm_payment(&h.shop, transaction, "payer-1")?;

    let shipped: Vec<bool> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| orders::ship(&h.shop, order)))
            .collect();

        handles
            .into_iter()
            .filter_map(|handle| handle.join().ok())
            .collect::<Result<Vec<_>, _>>()
    })?;

    assert_eq!(shipped.len(), 8);
    assert_eq!(shipped.iter().filter(|sent| **sent).count(), 1);
    assert_eq!(h.mailer.count(EmailKind::Dispatch), 1);
    assert_eq!(status(&h.shop, order)?, OrderStatus::Shipped);
    assert!(h.shop.store().read().order(order)?.dispatched.is_some());

    Ok(())
}

#[test]
fn managers_are_notified_when_receipts_are_on() -> TestResult {
    let items = items();
    let (regions, _) = regions();
    let mailer = Arc::new(RecordingMailer::default());

    let config = ShopConfig {
        managers: vec!["orders@example.com".to_string()],
        ..ShopConfig::default()
    };

    let shop = Shop::builder(config, Arc::clone(&items.catalogue) as _)
        .regions(regions)
        .shipping(Box::new(PerItemShipping))
        .mailer(Arc::clone(&mailer) as _)
        .gateway(Arc::new(TestGateway::default()))
        .build()?;

    let (order, transaction) = pending_order(&shop, &items, None, 1)?;
    confirm_payment(&shop, transaction, "payer-1")?;

    let sent = mailer.sent();
    let notification = sent
        .iter()
        .find(|email| email.kind == EmailKind::Notification);

    assert_eq!(
        notification.map(|email| email.to.clone()),
        Some(vec!["orders@example.com".to_string()])
    );
    assert_eq!(
        sent.iter()
            .find(|email| email.kind == EmailKind::Receipt)
            .map(|email| (email.order, email.to.clone())),
        Some((order, vec!["mere@example.com".to_string()]))
    );

    Ok(())
}
