//! The demo fixture set priced end to end.

use testresult::TestResult;

use shoptools::{
    cart::{Cart, SessionCart},
    fixtures::Fixture,
    receipt::Receipt,
    session::Session,
    shipping::INVALID_OPTION,
};

#[test]
fn demo_set_prices_the_cart() -> TestResult {
    let fixture = Fixture::from_set("demo")?;
    let shop = fixture.shop()?;
    let mut session = Session::new();

    fixture.fill_session(&shop, &mut session, &[], None)?;

    let cart = SessionCart::load(&shop, &mut session)?;

    // Mugs and the tote are discountable, the gift card isn't.
    assert_eq!(cart.count()?, 4);
    assert_eq!(cart.subtotal()?.to_minor_units(), 11_050);
    assert_eq!(cart.shipping_cost()?.to_minor_units(), 0);
    assert_eq!(cart.total_discount()?.to_minor_units(), 605);
    assert_eq!(cart.total()?.to_minor_units(), 10_445);
    assert!(cart.is_valid()?);

    Ok(())
}

#[test]
fn demo_set_with_courier_and_expired_voucher() -> TestResult {
    let fixture = Fixture::from_set("demo")?;
    let shop = fixture.shop()?;
    let mut session = Session::new();

    fixture.fill_session(
        &shop,
        &mut session,
        &["summer25".to_string()],
        Some("courier".to_string()),
    )?;

    let cart = SessionCart::load(&shop, &mut session)?;
    let summary = cart.summary()?;

    assert_eq!(cart.shipping_cost()?.to_minor_units(), 1200);
    assert_eq!(summary.invalid_codes, ["SUMMER25"]);
    assert_eq!(cart.total()?.to_minor_units(), 11_050 + 1200 - 605);

    let mut out = Vec::new();
    Receipt::new(summary).write_to(&mut out)?;
    let text = String::from_utf8(out)?;

    assert!(text.contains("Enamel Mug"), "missing line: {text}");
    assert!(text.contains("SUMMER25"), "missing invalid code: {text}");

    Ok(())
}

#[test]
fn unknown_shipping_option_blocks_checkout() -> TestResult {
    let fixture = Fixture::from_set("demo")?;
    let shop = fixture.shop()?;
    let mut session = Session::new();

    fixture.fill_session(&shop, &mut session, &[], Some("pigeon".to_string()))?;

    let cart = SessionCart::load(&shop, &mut session)?;

    assert_eq!(cart.errors()?, [INVALID_OPTION]);
    assert!(!cart.is_valid()?);

    Ok(())
}
