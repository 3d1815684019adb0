//! Carts
//!
//! [`Cart`] is the contract shared by session carts and stored carts (saved
//! carts, orders and favourites lists). Implementors provide line storage;
//! totals, discounts, shipping and validation are derived from the lines
//! through the shop's strategies.

use std::sync::Arc;

use rust_decimal::Decimal;
use rusty_money::iso::Currency;
use serde::Serialize;
use thiserror::Error;

use crate::{
    items::{CartItem, ItemRef, LineOptions},
    lines::{CartLine, LineSummary, ResolvedLine},
    money::{self, Amount, PriceError},
    regions::{Region, RegionKey},
    shipping,
    shop::Shop,
    store::{OrderId, StoreError},
    vouchers::{AppliedDiscount, Calculation, VoucherError},
};

pub mod merge;
pub mod session;
pub mod stored;

pub use merge::{DroppedLine, LoginMerge, MergeReport, merge_on_login, save_to};
pub use session::{SessionCart, SessionCartData};
pub use stored::StoredCart;

/// Error returned when adding with a zero quantity.
pub const NO_QUANTITY: &str = "No quantity specified";

/// Error returned when a line would hold more than `u32::MAX` units.
pub const QUANTITY_TOO_LARGE: &str = "Quantity is too large";

/// Cart errors.
#[derive(Debug, Error)]
pub enum CartError {
    /// Item reference doesn't resolve.
    #[error("item not found: {0}")]
    ItemNotFound(ItemRef),

    /// Order has been paid and can't be changed.
    #[error("order {0} has been paid and can no longer be changed")]
    OrderLocked(OrderId),

    /// Store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Amount arithmetic error.
    #[error(transparent)]
    Price(#[from] PriceError),

    /// Voucher validation error.
    #[error(transparent)]
    Voucher(#[from] VoucherError),

    /// Session contents couldn't be read or written.
    #[error("invalid session cart data: {0}")]
    Session(#[from] serde_json::Error),
}

/// What kind of cart this is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CartKind {
    /// Anonymous cart in the session.
    Session,

    /// Anonymous favourites in the session.
    SessionFavourites,

    /// A user's saved cart.
    SavedCart,

    /// An order.
    Order,

    /// A user's favourites list.
    Favourites,
}

impl CartKind {
    /// Favourites have no shipping and no discounts.
    pub const fn is_favourites(self) -> bool {
        matches!(self, Self::SessionFavourites | Self::Favourites)
    }
}

/// Result of [`Cart::update_quantity`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Line was added or changed.
    Saved,

    /// Line was removed.
    Removed,

    /// Nothing to do, e.g. removing a line that wasn't there.
    Unchanged,

    /// Item validation failed; the cart is untouched.
    Rejected(Vec<String>),
}

impl UpdateOutcome {
    /// `true` unless the update was rejected.
    pub fn is_ok(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

/// A cart line update worked out before anything is written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum LineChange {
    Remove,
    Set(u32),
    Reject(Vec<String>),
}

impl LineChange {
    /// Decide what `update_quantity` should do to a line that currently has
    /// `existing` units.
    pub(crate) fn plan(
        item: &dyn CartItem,
        existing: Option<u32>,
        quantity: i64,
        add: bool,
        options: &LineOptions,
    ) -> Self {
        if add && quantity == 0 {
            return Self::Reject(vec![NO_QUANTITY.to_string()]);
        }

        let quantity = match (add, existing) {
            (true, Some(existing)) => quantity.saturating_add(i64::from(existing)),
            _ => quantity,
        };

        if quantity < 1 {
            return Self::Remove;
        }

        let Ok(quantity) = u32::try_from(quantity) else {
            return Self::Reject(vec![QUANTITY_TOO_LARGE.to_string()]);
        };

        let errors = item.cart_errors(quantity, options);

        if errors.is_empty() {
            Self::Set(quantity)
        } else {
            Self::Reject(errors)
        }
    }
}

/// Resolve an item and validate raw options against it.
///
/// # Errors
///
/// Returns [`CartError::ItemNotFound`] if the item doesn't resolve.
pub(crate) fn prepare(
    shop: &Shop,
    item: &ItemRef,
    options: &LineOptions,
) -> Result<(Arc<dyn CartItem>, LineOptions), CartError> {
    let resolved = shop
        .items()
        .resolve(item)
        .ok_or_else(|| CartError::ItemNotFound(item.clone()))?;

    let options = options.normalised(&resolved.available_options());

    Ok((resolved, options))
}

/// Resolve a line against current item state.
///
/// # Errors
///
/// Returns a [`PriceError`] if the line total can't be computed.
pub(crate) fn resolve_line(
    shop: &Shop,
    line: &CartLine,
) -> Result<Option<ResolvedLine>, CartError> {
    let Some(item) = shop.items().resolve(&line.item) else {
        return Ok(None);
    };

    Ok(Some(ResolvedLine {
        id: None,
        total: item.line_total(line.quantity, &line.options)?,
        description: item.description(),
        line: line.clone(),
        item,
    }))
}

/// Shared cart behaviour.
///
/// Implementors supply line storage, shipping option and voucher code
/// storage. Everything else has a default derived from those.
pub trait Cart {
    /// The shop this cart belongs to.
    fn shop(&self) -> &Shop;

    /// This cart as a trait object, for strategies.
    fn as_dyn(&self) -> &dyn Cart;

    /// Cart kind.
    fn kind(&self) -> CartKind;

    /// Selected region, if any.
    fn region_key(&self) -> Option<RegionKey>;

    /// Lines whose items still resolve, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the lines can't be read or priced.
    fn lines(&self) -> Result<Vec<ResolvedLine>, CartError>;

    /// All stored lines, including stale ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the lines can't be read.
    fn raw_lines(&self) -> Result<Vec<CartLine>, CartError>;

    /// Set or add to the quantity of a line.
    ///
    /// Options are normalised against the item first. A resulting quantity
    /// below one removes the line. Item validation runs before anything is
    /// written; a failure returns [`UpdateOutcome::Rejected`] and leaves the
    /// cart as it was.
    ///
    /// # Errors
    ///
    /// - [`CartError::ItemNotFound`]: the item doesn't resolve.
    /// - [`CartError::OrderLocked`]: the cart is a paid order.
    fn update_quantity(
        &mut self,
        item: &ItemRef,
        quantity: i64,
        add: bool,
        options: &LineOptions,
    ) -> Result<UpdateOutcome, CartError>;

    /// Delete all lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart can't be written.
    fn clear(&mut self) -> Result<(), CartError>;

    /// Selected shipping option.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart can't be read.
    fn shipping_option(&self) -> Result<Option<String>, CartError>;

    /// Select a shipping option.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart can't be written.
    fn set_shipping_option(&mut self, option: Option<String>) -> Result<(), CartError>;

    /// Entered voucher codes.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart can't be read.
    fn voucher_codes(&self) -> Result<Vec<String>, CartError>;

    /// Replace the entered voucher codes.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart can't be written or, for orders, the
    /// discounts fail validation.
    fn set_voucher_codes(&mut self, codes: Vec<String>) -> Result<(), CartError>;

    /// Order whose own discounts don't count against voucher limits.
    fn discount_scope(&self) -> Option<OrderId> {
        None
    }

    /// Region this cart is in.
    fn region(&self) -> Option<&Region> {
        self.region_key()
            .and_then(|key| self.shop().regions().get(key))
    }

    /// Currency this cart is priced in.
    fn currency(&self) -> &'static Currency {
        self.region()
            .map_or_else(|| self.shop().currency(), |region| region.currency)
    }

    /// Add `quantity` units.
    ///
    /// # Errors
    ///
    /// See [`Cart::update_quantity`].
    fn add(
        &mut self,
        item: &ItemRef,
        quantity: u32,
        options: &LineOptions,
    ) -> Result<UpdateOutcome, CartError> {
        self.update_quantity(item, i64::from(quantity), true, options)
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// See [`Cart::update_quantity`].
    fn remove(&mut self, item: &ItemRef, options: &LineOptions) -> Result<UpdateOutcome, CartError> {
        self.update_quantity(item, 0, false, options)
    }

    /// Total units across valid lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the lines can't be read.
    fn count(&self) -> Result<u32, CartError> {
        Ok(self
            .lines()?
            .iter()
            .fold(0u32, |count, line| count.saturating_add(line.line.quantity)))
    }

    /// Returns `true` if there are no valid lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the lines can't be read.
    fn is_empty(&self) -> Result<bool, CartError> {
        Ok(self.lines()?.is_empty())
    }

    /// Sum of line totals.
    ///
    /// # Errors
    ///
    /// Returns an error if the lines can't be read or summed.
    fn subtotal(&self) -> Result<Amount, CartError> {
        let lines = self.lines()?;

        Ok(money::sum(lines.iter().map(|line| &line.total), self.currency())?)
    }

    /// Shipping cost from the shop's shipping strategy.
    ///
    /// # Errors
    ///
    /// Returns an error if the strategy fails.
    fn shipping_cost(&self) -> Result<Amount, CartError> {
        if self.kind().is_favourites() {
            return Ok(money::zero(self.currency()));
        }

        match self.shop().shipping() {
            Some(strategy) => strategy.calculate(self.as_dyn()),
            None => Ok(money::zero(self.currency())),
        }
    }

    /// Discounts for the entered voucher codes.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart can't be totalled.
    fn calculate_discounts(&self, include_shipping: bool) -> Result<Calculation, CartError> {
        if self.kind().is_favourites() {
            return Ok(Calculation::default());
        }

        match self.shop().vouchers() {
            Some(strategy) => {
                strategy.calculate(self.as_dyn(), &self.voucher_codes()?, include_shipping)
            }
            None => Ok(Calculation::default()),
        }
    }

    /// Sum of discounts.
    ///
    /// # Errors
    ///
    /// Returns an error if the discounts can't be calculated.
    fn total_discount(&self) -> Result<Amount, CartError> {
        let calculation = self.calculate_discounts(true)?;

        Ok(calculation.total(self.currency())?)
    }

    /// Subtotal plus shipping minus discounts, never below zero.
    ///
    /// # Errors
    ///
    /// Returns an error if any component can't be calculated.
    fn total(&self) -> Result<Amount, CartError> {
        let subtotal = self.subtotal()?.to_minor_units();
        let shipping = self.shipping_cost()?.to_minor_units();
        let discount = self.total_discount()?.to_minor_units();

        let total = subtotal
            .checked_add(shipping)
            .ok_or(PriceError::Overflow)?
            .saturating_sub(discount)
            .max(0);

        Ok(Amount::from_minor(total, self.currency()))
    }

    /// Line and shipping problems that block checkout.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart can't be read.
    fn errors(&self) -> Result<Vec<String>, CartError> {
        let mut errors: Vec<String> = self
            .lines()?
            .iter()
            .flat_map(ResolvedLine::errors)
            .collect();

        errors.extend(shipping::shipping_errors(self.as_dyn())?);

        Ok(errors)
    }

    /// Non-empty and without errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart can't be read.
    fn is_valid(&self) -> Result<bool, CartError> {
        Ok(!self.is_empty()? && self.errors()?.is_empty())
    }

    /// Plain data view of this cart.
    ///
    /// # Errors
    ///
    /// Returns an error if any total can't be calculated.
    fn summary(&self) -> Result<CartSummary, CartError> {
        let lines = self.lines()?;
        let calculation = self.calculate_discounts(true)?;

        Ok(CartSummary {
            kind: self.kind(),
            currency: self.currency().iso_alpha_code.to_string(),
            count: lines
                .iter()
                .fold(0u32, |count, line| count.saturating_add(line.line.quantity)),
            lines: lines.iter().map(ResolvedLine::summary).collect(),
            shipping_option: self.shipping_option()?,
            subtotal: money::to_decimal(&self.subtotal()?),
            shipping_cost: money::to_decimal(&self.shipping_cost()?),
            discounts: calculation
                .discounts
                .iter()
                .map(AppliedDiscount::summary)
                .collect(),
            invalid_codes: calculation.invalid_codes,
            total: money::to_decimal(&self.total()?),
            errors: self.errors()?,
        })
    }
}

/// Plain data view of a cart, ready for JSON.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CartSummary {
    /// Cart kind.
    pub kind: CartKind,

    /// Currency code.
    pub currency: String,

    /// Total units.
    pub count: u32,

    /// Lines.
    pub lines: Vec<LineSummary>,

    /// Selected shipping option.
    pub shipping_option: Option<String>,

    /// Subtotal.
    pub subtotal: Decimal,

    /// Shipping cost.
    pub shipping_cost: Decimal,

    /// Applied discounts.
    pub discounts: Vec<DiscountSummary>,

    /// Codes that didn't match a usable voucher.
    pub invalid_codes: Vec<String>,

    /// Total.
    pub total: Decimal,

    /// Problems blocking checkout.
    pub errors: Vec<String>,
}

/// Plain data view of a discount.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DiscountSummary {
    /// Voucher code.
    pub code: String,

    /// Voucher description.
    pub description: String,

    /// Amount taken off.
    pub amount: Decimal,
}

#[cfg(test)]
mod tests {
    use rusty_money::{Money, iso::NZD};

    use super::*;
    use crate::items::catalogue::Product;

    fn product() -> Product {
        Product::new(1, "Mug", Money::from_minor(1000, NZD)).with_stock(5)
    }

    #[test]
    fn plan_rejects_add_without_quantity() {
        let change = LineChange::plan(&product(), None, 0, true, &LineOptions::new());

        assert_eq!(change, LineChange::Reject(vec![NO_QUANTITY.to_string()]));
    }

    #[test]
    fn plan_adds_to_existing_quantity() {
        let change = LineChange::plan(&product(), Some(2), 1, true, &LineOptions::new());

        assert_eq!(change, LineChange::Set(3));
    }

    #[test]
    fn plan_overwrites_without_add() {
        let change = LineChange::plan(&product(), Some(2), 4, false, &LineOptions::new());

        assert_eq!(change, LineChange::Set(4));
    }

    #[test]
    fn plan_treats_negative_as_removal() {
        let change = LineChange::plan(&product(), Some(2), -3, false, &LineOptions::new());

        assert_eq!(change, LineChange::Remove);
    }

    #[test]
    fn plan_rejects_quantities_past_the_line_limit() {
        let too_many = i64::from(u32::MAX) + 1;

        assert_eq!(
            LineChange::plan(&product(), None, too_many, false, &LineOptions::new()),
            LineChange::Reject(vec![QUANTITY_TOO_LARGE.to_string()])
        );
        assert_eq!(
            LineChange::plan(&product(), Some(2), i64::from(u32::MAX), true, &LineOptions::new()),
            LineChange::Reject(vec![QUANTITY_TOO_LARGE.to_string()])
        );
    }

    #[test]
    fn plan_runs_item_validation_on_the_new_quantity() {
        let change = LineChange::plan(&product(), Some(4), 2, true, &LineOptions::new());

        assert_eq!(
            change,
            LineChange::Reject(vec!["Only 5 of Mug left in stock".to_string()])
        );
    }
}
