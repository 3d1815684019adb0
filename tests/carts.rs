//! Cart line behaviour shared by session and stored carts.

mod common;

use testresult::TestResult;

use shoptools::{
    cart::{
        Cart, QUANTITY_TOO_LARGE, SessionCart, StoredCart, UpdateOutcome,
        merge::ITEM_UNAVAILABLE,
    },
    items::LineOptions,
    money::Amount,
    session::Session,
    store::UserId,
};

use common::{builder, items};

#[test]
fn adding_the_same_item_twice_increments_one_line() -> TestResult {
    let items = items();
    let shop = builder(&items).build()?;
    let mut session = Session::new();
    let mut cart = SessionCart::load(&shop, &mut session)?;

    cart.add(&items.mug, 1, &LineOptions::new())?;
    cart.add(&items.mug, 2, &LineOptions::new())?;

    let lines = cart.lines()?;

    assert_eq!(lines.len(), 1);
    assert_eq!(cart.count()?, 3);
    assert_eq!(cart.subtotal()?.to_minor_units(), 3000);

    Ok(())
}

#[test]
fn options_are_normalised_before_matching() -> TestResult {
    let items = items();
    let shop = builder(&items).build()?;
    let mut session = Session::new();
    let mut cart = SessionCart::load(&shop, &mut session)?;

    cart.add(&items.mug, 1, &LineOptions::new())?;
    cart.add(&items.mug, 1, &LineOptions::new().with("colour", "white"))?;
    cart.add(&items.mug, 1, &LineOptions::new().with("colour", "purple").with("size", "XL"))?;
    cart.add(&items.mug, 1, &LineOptions::new().with("colour", "blue"))?;

    let lines = cart.lines()?;
    let quantities: Vec<(Option<&str>, u32)> = lines
        .iter()
        .map(|line| (line.line.options.get("colour"), line.line.quantity))
        .collect();

    assert_eq!(quantities, [(Some("white"), 3), (Some("blue"), 1)]);

    Ok(())
}

#[test]
fn zero_or_negative_quantity_removes_the_line() -> TestResult {
    let items = items();
    let shop = builder(&items).build()?;
    let mut session = Session::new();
    let mut cart = SessionCart::load(&shop, &mut session)?;

    cart.add(&items.mug, 2, &LineOptions::new())?;
    cart.add(&items.print, 1, &LineOptions::new())?;

    assert_eq!(
        cart.update_quantity(&items.mug, -1, false, &LineOptions::new())?,
        UpdateOutcome::Removed
    );
    assert_eq!(
        cart.update_quantity(&items.print, -1, true, &LineOptions::new())?,
        UpdateOutcome::Removed
    );
    assert!(cart.is_empty()?);

    Ok(())
}

#[test]
fn rejected_update_leaves_the_cart_untouched() -> TestResult {
    let items = items();
    let shop = builder(&items).build()?;
    let mut session = Session::new();
    let mut cart = SessionCart::load(&shop, &mut session)?;

    assert_eq!(cart.add(&items.lamp, 2, &LineOptions::new())?, UpdateOutcome::Saved);

    let outcome = cart.add(&items.lamp, 2, &LineOptions::new())?;

    assert!(matches!(outcome, UpdateOutcome::Rejected(ref errors) if !errors.is_empty()));
    assert_eq!(cart.count()?, 2);

    Ok(())
}

#[test]
fn stored_carts_follow_the_same_line_rules() -> TestResult {
    let items = items();
    let shop = builder(&items).build()?;
    let mut cart = StoredCart::for_user(&shop, UserId::new(), None);

    cart.add(&items.mug, 1, &LineOptions::new())?;
    cart.add(&items.mug, 1, &LineOptions::new())?;
    cart.add(&items.lamp, 3, &LineOptions::new())?;

    assert!(matches!(
        cart.add(&items.lamp, 1, &LineOptions::new())?,
        UpdateOutcome::Rejected(_)
    ));
    assert_eq!(cart.line_records()?.len(), 2);
    assert_eq!(cart.count()?, 5);

    cart.remove(&items.lamp, &LineOptions::new())?;

    assert_eq!(cart.count()?, 2);

    Ok(())
}

#[test]
fn saving_a_session_cart_drops_stale_lines() -> TestResult {
    let items = items();
    let shop = builder(&items).build()?;
    let mut session = Session::new();
    let user = UserId::new();
    session.set_user(Some(user));

    let mut cart = SessionCart::load(&shop, &mut session)?;
    cart.add(&items.mug, 1, &LineOptions::new())?;
    cart.add(&items.print, 1, &LineOptions::new().with("dedication", "For Sam"))?;
    cart.add(&items.lamp, 1, &LineOptions::new())?;

    items.catalogue.remove(items.lamp.id);

    let mut target = StoredCart::for_user(&shop, user, None);
    target.add(&items.print, 5, &LineOptions::new())?;

    let report = cart.save_to(&mut target)?;

    assert_eq!(report.transferred.len(), 2);
    assert_eq!(report.dropped.len(), 1);
    assert_eq!(
        report.dropped.first().map(|dropped| dropped.reasons.clone()),
        Some(vec![ITEM_UNAVAILABLE.to_string()])
    );

    let lines = target.lines()?;

    assert_eq!(lines.len(), 2);
    assert_eq!(target.count()?, 2);
    assert!(
        lines
            .iter()
            .any(|line| line.line.options.get("dedication") == Some("For Sam"))
    );
    assert!(cart.data().lines.is_empty());

    Ok(())
}

#[test]
fn changing_options_folds_into_a_matching_line() -> TestResult {
    let items = items();
    let shop = builder(&items).build()?;
    let mut cart = StoredCart::for_user(&shop, UserId::new(), None);

    cart.add(&items.mug, 1, &LineOptions::new())?;
    cart.add(&items.mug, 2, &LineOptions::new().with("colour", "blue"))?;

    let blue = cart
        .line_records()?
        .into_iter()
        .find(|(_, record)| record.line.options.get("colour") == Some("blue"))
        .map(|(id, _)| id)
        .ok_or_else(|| std::io::Error::other("blue line missing"))?;

    assert_eq!(
        cart.update_options(blue, &LineOptions::new().with("colour", "white"))?,
        UpdateOutcome::Saved
    );

    let lines = cart.line_records()?;

    assert_eq!(lines.len(), 1);
    assert_eq!(
        lines
            .first()
            .map(|(_, record)| (record.line.options.get("colour"), record.line.quantity)),
        Some((Some("white"), 3))
    );

    Ok(())
}

#[test]
fn oversized_quantity_is_rejected() -> TestResult {
    let items = items();
    let shop = builder(&items).build()?;
    let mut session = Session::new();
    let mut cart = SessionCart::load(&shop, &mut session)?;

    cart.add(&items.mug, 1, &LineOptions::new())?;

    assert_eq!(
        cart.update_quantity(&items.mug, i64::from(u32::MAX) + 1, false, &LineOptions::new())?,
        UpdateOutcome::Rejected(vec![QUANTITY_TOO_LARGE.to_string()])
    );
    assert_eq!(cart.count()?, 1);

    Ok(())
}

#[test]
fn saving_into_an_empty_order_freezes_the_valid_lines() -> TestResult {
    let items = items();
    let shop = builder(&items).build()?;

    let order = {
        let mut tx = shop.store().begin();
        let order = tx.insert_order(shop.currency(), shop.clock().now());
        tx.commit();
        order
    };

    let mut session = Session::new();
    let mut cart = SessionCart::load(&shop, &mut session)?;
    cart.add(&items.mug, 2, &LineOptions::new().with("colour", "blue"))?;
    cart.add(&items.print, 1, &LineOptions::new())?;
    cart.add(&items.lamp, 1, &LineOptions::new())?;

    items.catalogue.remove(items.lamp.id);

    let mut target = StoredCart::order(&shop, order)?;
    let report = cart.save_to(&mut target)?;

    assert_eq!(report.transferred.len(), 2);
    assert_eq!(report.dropped.len(), 1);

    let frozen: Vec<(Option<String>, Option<i64>)> = target
        .line_records()?
        .iter()
        .map(|(_, record)| {
            (
                record.description.clone(),
                record.total.as_ref().map(Amount::to_minor_units),
            )
        })
        .collect();

    assert_eq!(
        frozen,
        [
            (Some("Mug".to_string()), Some(2000)),
            (Some("Print".to_string()), Some(5000)),
        ]
    );
    assert_eq!(target.subtotal()?.to_minor_units(), 7000);
    assert_eq!(target.shipping_cost()?.to_minor_units(), 0);
    assert_eq!(cart.order(), Some(order));
    assert_eq!(shop.store().read().order(order)?.session, Some(cart.session_id()));

    Ok(())
}
