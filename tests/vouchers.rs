//! Voucher limits, balances and ordering across carts and orders.

mod common;

use jiff::{Timestamp, civil::date};
use testresult::TestResult;

use shoptools::{
    cart::{Cart, SessionCart, StoredCart},
    checkout::{CheckoutDetails, CheckoutOutcome, checkout},
    items::{ItemRef, LineOptions},
    session::Session,
    shop::{FixedClock, Shop},
    store::OrderId,
    vouchers::{Voucher, VoucherKind, create_voucher, saved_discounts},
};

use common::{address, builder, items, nzd};

fn details() -> CheckoutDetails {
    CheckoutDetails {
        shipping_address: Some(address()),
        ..CheckoutDetails::default()
    }
}

/// Check out a fresh session holding `quantity` of `item` and the given codes.
fn order_with(
    shop: &Shop,
    item: &ItemRef,
    quantity: u32,
    codes: &[&str],
) -> Result<CheckoutOutcome, Box<dyn std::error::Error>> {
    let mut session = Session::new();
    let mut cart = SessionCart::load(shop, &mut session)?;

    cart.add(item, quantity, &LineOptions::new())?;
    cart.set_voucher_codes(codes.iter().map(ToString::to_string).collect())?;

    Ok(checkout(shop, &mut cart, None, details())?)
}

fn redeemed(shop: &Shop, order: OrderId) -> Result<i64, Box<dyn std::error::Error>> {
    Ok(saved_discounts(shop, order)?
        .discounts
        .iter()
        .map(|discount| discount.amount.to_minor_units())
        .sum())
}

#[test]
fn fixed_voucher_is_never_redeemed_past_its_face_value() -> TestResult {
    let items = items();
    let shop = builder(&items).build()?;

    create_voucher(
        &shop,
        Voucher::new("gift30", VoucherKind::Fixed { amount: nzd(3000) }),
    )?;

    let first = order_with(&shop, &items.mug, 2, &["GIFT30"])?;
    let second = order_with(&shop, &items.mug, 2, &["gift30"])?;
    let third = order_with(&shop, &items.mug, 2, &["GIFT30"])?;

    assert!(matches!(first, CheckoutOutcome::Completed { .. }));
    assert!(matches!(second, CheckoutOutcome::PaymentUnavailable { .. }));
    assert!(matches!(third, CheckoutOutcome::PaymentUnavailable { .. }));

    let amounts = [
        redeemed(&shop, first.order())?,
        redeemed(&shop, second.order())?,
        redeemed(&shop, third.order())?,
    ];

    assert_eq!(amounts, [2000, 1000, 0]);

    let third_order = StoredCart::order(&shop, third.order())?;

    assert_eq!(third_order.total()?.to_minor_units(), 2000);

    Ok(())
}

#[test]
fn free_shipping_comes_off_before_percentage() -> TestResult {
    let items = items();
    let shop = builder(&items).build()?;

    create_voucher(&shop, Voucher::new("SHIPFREE", VoucherKind::FreeShipping))?;
    create_voucher(&shop, Voucher::new("TENOFF", VoucherKind::percentage(10)?))?;

    let mut session = Session::new();
    let mut cart = SessionCart::load(&shop, &mut session)?;

    cart.add(&items.lamp, 1, &LineOptions::new())?;
    cart.set_voucher_codes(vec!["tenoff".to_string(), "shipfree".to_string()])?;

    assert_eq!(cart.subtotal()?.to_minor_units(), 10_000);
    assert_eq!(cart.shipping_cost()?.to_minor_units(), 2000);

    let calculation = cart.calculate_discounts(true)?;
    let applied: Vec<(&str, i64)> = calculation
        .discounts
        .iter()
        .map(|discount| (discount.code.as_str(), discount.amount.to_minor_units()))
        .collect();

    assert_eq!(applied, [("SHIPFREE", 2000), ("TENOFF", 1000)]);
    assert_eq!(cart.total()?.to_minor_units(), 9000);

    Ok(())
}

#[test]
fn limited_voucher_is_refused_once_used_up() -> TestResult {
    let items = items();
    let shop = builder(&items).build()?;

    create_voucher(
        &shop,
        Voucher::new("ONCE", VoucherKind::percentage(50)?).with_limit(1),
    )?;

    let first = order_with(&shop, &items.mug, 1, &["ONCE"])?;

    assert_eq!(redeemed(&shop, first.order())?, 500);

    let mut session = Session::new();
    let mut cart = SessionCart::load(&shop, &mut session)?;
    cart.add(&items.mug, 1, &LineOptions::new())?;
    cart.set_voucher_codes(vec!["ONCE".to_string()])?;

    let calculation = cart.calculate_discounts(true)?;

    assert!(calculation.discounts.is_empty());
    assert_eq!(calculation.invalid_codes, ["ONCE"]);

    Ok(())
}

#[test]
fn expired_and_under_minimum_vouchers_are_invalid() -> TestResult {
    let items = items();
    let now: Timestamp = "2030-02-01T09:00:00Z".parse()?;
    let shop = builder(&items).clock(Box::new(FixedClock(now))).build()?;

    create_voucher(
        &shop,
        Voucher::new("JANUARY", VoucherKind::percentage(10)?).expiring(date(2030, 1, 31)),
    )?;
    create_voucher(
        &shop,
        Voucher::new("FEBRUARY", VoucherKind::percentage(10)?).expiring(date(2030, 2, 1)),
    )?;
    create_voucher(
        &shop,
        Voucher::new("BIGSPEND", VoucherKind::percentage(20)?).with_minimum_spend(5000),
    )?;

    let mut session = Session::new();
    let mut cart = SessionCart::load(&shop, &mut session)?;
    cart.add(&items.mug, 2, &LineOptions::new())?;
    cart.set_voucher_codes(vec![
        "JANUARY".to_string(),
        "FEBRUARY".to_string(),
        "BIGSPEND".to_string(),
    ])?;

    let calculation = cart.calculate_discounts(true)?;

    assert_eq!(
        calculation
            .discounts
            .iter()
            .map(|discount| discount.code.as_str())
            .collect::<Vec<_>>(),
        ["FEBRUARY"]
    );
    assert_eq!(calculation.invalid_codes, ["JANUARY", "BIGSPEND"]);

    Ok(())
}

#[test]
fn checking_out_again_replaces_the_order_discounts() -> TestResult {
    let items = items();
    let shop = builder(&items).build()?;

    create_voucher(&shop, Voucher::new("TENOFF", VoucherKind::percentage(10)?))?;

    let mut session = Session::new();
    let mut cart = SessionCart::load(&shop, &mut session)?;
    cart.add(&items.print, 1, &LineOptions::new())?;
    cart.set_voucher_codes(vec!["TENOFF".to_string()])?;

    let first = checkout(&shop, &mut cart, None, details())?;

    assert!(matches!(first, CheckoutOutcome::PaymentUnavailable { .. }));
    assert_eq!(redeemed(&shop, first.order())?, 500);

    let again = checkout(&shop, &mut cart, None, details())?;

    assert_eq!(again.order(), first.order());
    assert_eq!(saved_discounts(&shop, first.order())?.discounts.len(), 1);

    cart.add(&items.mug, 1, &LineOptions::new())?;
    cart.set_voucher_codes(vec!["TENOFF".to_string()])?;

    let changed = checkout(&shop, &mut cart, None, details())?;

    assert_eq!(changed.order(), first.order());
    assert_eq!(saved_discounts(&shop, first.order())?.discounts.len(), 1);
    assert_eq!(redeemed(&shop, first.order())?, 100);

    Ok(())
}
