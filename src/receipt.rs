//! Receipt

use std::io;

use rust_decimal::Decimal;
use tabled::{
    builder::Builder,
    grid::config::HorizontalLine,
    settings::{
        Alignment, Color, Style, Theme,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::{
    cart::{Cart, CartError, CartSummary},
    lines::LineSummary,
};

/// Errors that can occur when building or writing a receipt.
#[derive(Debug, Error)]
pub enum ReceiptError {
    /// Error pricing the cart.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Printable quote for a cart.
#[derive(Debug, Clone)]
pub struct Receipt {
    summary: CartSummary,
}

impl Receipt {
    /// Create a receipt from a cart summary.
    #[must_use]
    pub fn new(summary: CartSummary) -> Self {
        Self { summary }
    }

    /// Price `cart` and build its receipt.
    ///
    /// # Errors
    ///
    /// Returns a [`ReceiptError`] if the cart cannot be priced.
    pub fn from_cart(cart: &dyn Cart) -> Result<Self, ReceiptError> {
        Ok(Self::new(cart.summary()?))
    }

    /// The summary this receipt prints.
    #[must_use]
    pub fn summary(&self) -> &CartSummary {
        &self.summary
    }

    /// Subtotal plus shipping.
    #[must_use]
    pub fn gross(&self) -> Decimal {
        self.summary.subtotal + self.summary.shipping_cost
    }

    /// Sum of the applied discounts.
    #[must_use]
    pub fn savings(&self) -> Decimal {
        self.summary
            .discounts
            .iter()
            .map(|discount| discount.amount)
            .sum()
    }

    /// Writes the receipt as a table followed by the totals.
    ///
    /// # Errors
    ///
    /// Returns an error if the receipt cannot be written.
    pub fn write_to(&self, mut out: impl io::Write) -> Result<(), ReceiptError> {
        let mut builder = Builder::default();

        builder.push_record(["", "Item", "Options", "Qty", "Total"]);

        for (idx, line) in self.summary.lines.iter().enumerate() {
            builder.push_record(line_record(idx, line, &self.summary.currency));
        }

        let mut table = builder.build();
        let mut theme = Theme::from(Style::modern_rounded());

        theme.remove_horizontal_lines();
        theme.insert_horizontal_line(
            1,
            HorizontalLine::new(Some('─'), Some('┼'), Some('├'), Some('┤')),
        );

        table.with(theme);
        table.modify(Rows::first(), Color::BOLD);
        table.modify(Columns::new(3..5), Alignment::right());

        writeln!(out, "\n{table}")?;

        self.write_totals(&mut out)?;
        self.write_notes(&mut out)?;

        Ok(())
    }

    fn write_totals(&self, out: &mut impl io::Write) -> Result<(), ReceiptError> {
        let currency = &self.summary.currency;

        let mut rows = vec![
            (" Subtotal:".to_string(), price(self.summary.subtotal, currency)),
            (" Shipping:".to_string(), price(self.summary.shipping_cost, currency)),
        ];

        for discount in &self.summary.discounts {
            rows.push((
                format!(" {}:", discount.description),
                format!("-{}", price(discount.amount, currency)),
            ));
        }

        rows.push((" Total:".to_string(), price(self.summary.total, currency)));

        let label_width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
        let value_width = rows.iter().map(|(_, value)| value.len()).max().unwrap_or(0);

        for (label, value) in rows {
            writeln!(out, "{label:<label_width$} {value:>value_width$}  ")?;
        }

        writeln!(out)?;

        Ok(())
    }

    fn write_notes(&self, out: &mut impl io::Write) -> Result<(), ReceiptError> {
        for code in &self.summary.invalid_codes {
            writeln!(out, " Voucher {code} can't be used with this cart")?;
        }

        for error in &self.summary.errors {
            writeln!(out, " ! {error}")?;
        }

        Ok(())
    }
}

fn line_record(idx: usize, line: &LineSummary, currency: &str) -> [String; 5] {
    let options = line
        .options
        .iter()
        .map(|(key, value)| format!("{key}: {value}"))
        .collect::<Vec<_>>()
        .join("\n");

    [
        format!("#{:<3}", idx + 1),
        line.description.clone(),
        options,
        line.quantity.to_string(),
        price(line.total, currency),
    ]
}

fn price(amount: Decimal, currency: &str) -> String {
    format!("{amount:.2} {currency}")
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use testresult::TestResult;

    use super::*;
    use crate::{
        cart::{CartKind, DiscountSummary},
        items::{ItemRef, options::LineOptions},
    };

    fn summary() -> CartSummary {
        CartSummary {
            kind: CartKind::Session,
            currency: "NZD".to_string(),
            count: 2,
            lines: vec![LineSummary {
                item: ItemRef::new("product", 1),
                description: "Mug".to_string(),
                quantity: 2,
                options: LineOptions::new().with("colour", "blue"),
                total: Decimal::new(2000, 2),
            }],
            shipping_option: None,
            subtotal: Decimal::new(2000, 2),
            shipping_cost: Decimal::new(500, 2),
            discounts: vec![DiscountSummary {
                code: "TENOFF".to_string(),
                description: "10% off".to_string(),
                amount: Decimal::new(200, 2),
            }],
            invalid_codes: vec!["NOPE".to_string()],
            total: Decimal::new(2300, 2),
            errors: vec![],
        }
    }

    #[test]
    fn savings_sum_the_discounts() {
        let receipt = Receipt::new(summary());

        assert_eq!(receipt.gross(), Decimal::new(2500, 2));
        assert_eq!(receipt.savings(), Decimal::new(200, 2));
    }

    #[test]
    fn write_to_prints_lines_and_totals() -> TestResult {
        let receipt = Receipt::new(summary());
        let mut out = Vec::new();

        receipt.write_to(&mut out)?;

        let text = String::from_utf8(out)?;

        assert!(text.contains("Mug"), "missing line: {text}");
        assert!(text.contains("colour: blue"), "missing options: {text}");
        assert!(text.contains("-2.00 NZD"), "missing discount: {text}");
        assert!(text.contains("23.00 NZD"), "missing total: {text}");
        assert!(text.contains("NOPE"), "missing invalid code: {text}");

        Ok(())
    }
}
