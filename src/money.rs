//! Money helpers
//!
//! All cart arithmetic is done on minor units and wrapped back into
//! [`Money`] at the edges, so rounding only happens in one place
//! ([`percent_of_minor`]).

use decimal_percentage::Percentage;
use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use rusty_money::{Money, MoneyError, iso, iso::Currency};
use thiserror::Error;

/// Money in one of the ISO currencies.
pub type Amount = Money<'static, Currency>;

/// Errors that can occur while doing money arithmetic or parsing prices.
#[derive(Debug, Error, PartialEq)]
pub enum PriceError {
    /// Price string was not in the `AMOUNT CURRENCY` format.
    #[error("invalid price: {0}")]
    InvalidPrice(String),

    /// Currency code is not an ISO currency.
    #[error("unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Percentage calculation could not be safely converted.
    #[error("percentage conversion overflowed")]
    PercentConversion,

    /// Minor unit arithmetic overflowed.
    #[error("amount overflowed")]
    Overflow,

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Zero in the given currency.
pub fn zero(currency: &'static Currency) -> Amount {
    Money::from_minor(0, currency)
}

/// Look up an ISO currency by its alpha code, case-insensitively.
///
/// # Errors
///
/// Returns [`PriceError::UnknownCurrency`] if the code is not an ISO currency.
pub fn currency(code: &str) -> Result<&'static Currency, PriceError> {
    iso::find(&code.trim().to_ascii_uppercase())
        .ok_or_else(|| PriceError::UnknownCurrency(code.to_string()))
}

/// Sums amounts, starting from zero in `currency`.
///
/// # Errors
///
/// - [`PriceError::Money`]: an amount is in a different currency.
/// - [`PriceError::Overflow`]: the sum does not fit in minor units.
pub fn sum<'a>(
    amounts: impl IntoIterator<Item = &'a Amount>,
    currency: &'static Currency,
) -> Result<Amount, PriceError> {
    let total = amounts.into_iter().try_fold(0i64, |acc, amount| {
        ensure_currency(amount, currency)?;

        acc.checked_add(amount.to_minor_units())
            .ok_or(PriceError::Overflow)
    })?;

    Ok(Money::from_minor(total, currency))
}

/// Returns an error if `amount` is not in `currency`.
///
/// # Errors
///
/// Returns [`MoneyError::CurrencyMismatch`] wrapped in [`PriceError::Money`].
pub fn ensure_currency(amount: &Amount, currency: &'static Currency) -> Result<(), PriceError> {
    if amount.currency() == currency {
        Ok(())
    } else {
        Err(PriceError::Money(MoneyError::CurrencyMismatch {
            expected: currency.iso_alpha_code,
            actual: amount.currency().iso_alpha_code,
        }))
    }
}

/// Multiplies a unit price by a quantity.
///
/// # Errors
///
/// Returns [`PriceError::Overflow`] if the result does not fit in minor units.
pub fn times(unit: &Amount, quantity: u32) -> Result<Amount, PriceError> {
    let minor = unit
        .to_minor_units()
        .checked_mul(i64::from(quantity))
        .ok_or(PriceError::Overflow)?;

    Ok(Money::from_minor(minor, unit.currency()))
}

/// Build a [`Percentage`] from whole percentage points (`10` is 10%).
pub fn percentage_points(points: u8) -> Percentage {
    Percentage::from(Decimal::from(points) / Decimal::ONE_HUNDRED)
}

/// Calculate a percentage of a minor unit amount, rounding half away from zero.
///
/// # Errors
///
/// Returns [`PriceError::PercentConversion`] if the result cannot be represented.
pub fn percent_of_minor(percent: &Percentage, minor: i64) -> Result<i64, PriceError> {
    let minor = Decimal::from_i64(minor).ok_or(PriceError::PercentConversion)?;

    ((*percent) * Decimal::ONE)
        .checked_mul(minor)
        .ok_or(PriceError::PercentConversion)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(PriceError::PercentConversion)
}

/// Parse a price string (e.g. `"12.50 NZD"`) into money.
///
/// # Errors
///
/// Returns an error if the string is not `AMOUNT CURRENCY`, the amount is not a
/// decimal, or the currency code is unknown.
pub fn parse_price(s: &str) -> Result<Amount, PriceError> {
    let mut parts = s.split_whitespace();

    let (Some(amount), Some(code), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(PriceError::InvalidPrice(format!(
            "expected format 'AMOUNT CURRENCY', got: {s}"
        )));
    };

    let currency = currency(code)?;
    let minor = parse_minor(amount, currency)?;

    Ok(Money::from_minor(minor, currency))
}

/// Parse a decimal amount (e.g. `"12.50"`) into minor units of `currency`.
///
/// # Errors
///
/// Returns [`PriceError::InvalidPrice`] if the amount is not a decimal or overflows.
pub fn parse_minor(amount: &str, currency: &'static Currency) -> Result<i64, PriceError> {
    let amount = amount
        .trim()
        .parse::<Decimal>()
        .map_err(|_err| PriceError::InvalidPrice(amount.to_string()))?;

    let scale = Decimal::from(10i64.pow(currency.exponent));

    amount
        .checked_mul(scale)
        .and_then(|value| {
            value
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_i64()
        })
        .ok_or_else(|| PriceError::InvalidPrice(amount.to_string()))
}

/// Converts money into a major-unit decimal (`1250` NZD minor units is `12.50`).
pub fn to_decimal(amount: &Amount) -> Decimal {
    Decimal::new(amount.to_minor_units(), amount.currency().exponent)
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::{GBP, JPY, NZD, USD};
    use testresult::TestResult;

    use super::*;

    #[test]
    fn sum_of_amounts() -> TestResult {
        let amounts = [Money::from_minor(100, NZD), Money::from_minor(250, NZD)];

        assert_eq!(sum(&amounts, NZD)?, Money::from_minor(350, NZD));

        Ok(())
    }

    #[test]
    fn sum_of_nothing_is_zero() -> TestResult {
        let amounts: [Amount; 0] = [];

        assert_eq!(sum(&amounts, NZD)?, zero(NZD));

        Ok(())
    }

    #[test]
    fn sum_rejects_currency_mismatch() {
        let amounts = [Money::from_minor(100, NZD), Money::from_minor(100, USD)];

        assert_eq!(
            sum(&amounts, NZD),
            Err(PriceError::Money(MoneyError::CurrencyMismatch {
                expected: NZD.iso_alpha_code,
                actual: USD.iso_alpha_code,
            }))
        );
    }

    #[test]
    fn times_multiplies_unit_price() -> TestResult {
        assert_eq!(
            times(&Money::from_minor(250, GBP), 3)?,
            Money::from_minor(750, GBP)
        );

        Ok(())
    }

    #[test]
    fn percent_of_minor_rounds_half_away_from_zero() -> TestResult {
        assert_eq!(percent_of_minor(&percentage_points(10), 1005)?, 101);
        assert_eq!(percent_of_minor(&percentage_points(15), 999)?, 150);

        Ok(())
    }

    #[test]
    fn percent_of_minor_overflow_returns_error() {
        let result = percent_of_minor(&Percentage::from(2.0), i64::MAX);

        assert!(matches!(result, Err(PriceError::PercentConversion)));
    }

    #[test]
    fn parse_price_reads_amount_and_currency() -> TestResult {
        assert_eq!(parse_price("12.50 NZD")?, Money::from_minor(1250, NZD));
        assert_eq!(parse_price("300 jpy")?, Money::from_minor(300, JPY));

        Ok(())
    }

    #[test]
    fn parse_price_rejects_bad_input() {
        assert!(matches!(
            parse_price("12.50"),
            Err(PriceError::InvalidPrice(_))
        ));
        assert!(matches!(
            parse_price("abc NZD"),
            Err(PriceError::InvalidPrice(_))
        ));
        assert!(matches!(
            parse_price("1.00 XXY"),
            Err(PriceError::UnknownCurrency(_))
        ));
    }

    #[test]
    fn to_decimal_uses_currency_exponent() {
        assert_eq!(
            to_decimal(&Money::from_minor(1250, NZD)),
            Decimal::new(1250, 2)
        );
    }
}
