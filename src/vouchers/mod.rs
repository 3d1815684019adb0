//! Vouchers
//!
//! Vouchers come in three kinds: fixed amount (spread over any number of
//! orders until the balance is used up), percentage (best one wins) and free
//! shipping. Discounts are only calculated on the fly for carts; orders get
//! theirs persisted at checkout by [`save_discounts`].

use std::fmt::Debug;

use jiff::civil::Date;
use rusty_money::iso::Currency;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    cart::{Cart, CartError, DiscountSummary},
    money::{self, Amount, PriceError},
    shop::Shop,
    store::{OrderId, StoreError},
};

pub mod calculator;

pub use calculator::{Calculator, normalise_codes};

/// Voucher errors.
#[derive(Debug, Error, PartialEq)]
pub enum VoucherError {
    /// Usage limit reached.
    #[error("Voucher has already been used")]
    AlreadyUsed(String),

    /// A single discount is larger than the voucher's face value.
    #[error("Discount exceeds voucher amount")]
    ExceedsAmount(String),

    /// Discounts across all orders would exceed the voucher's face value.
    #[error("Discount exceeds voucher's remaining balance")]
    ExceedsBalance(String),

    /// Percentage outside 0-100.
    #[error("invalid percentage: {0}")]
    InvalidPercentage(u8),

    /// No voucher with this code.
    #[error("unknown voucher: {0}")]
    UnknownVoucher(String),

    /// Store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Amount arithmetic error.
    #[error(transparent)]
    Price(#[from] PriceError),
}

/// What a voucher takes off.
#[derive(Clone, Debug, PartialEq)]
pub enum VoucherKind {
    /// Fixed amount, usable across orders until the balance runs out.
    Fixed {
        /// Face value.
        amount: Amount,
    },

    /// Percentage of the discountable subtotal.
    Percentage {
        /// Whole percentage points, 0-100.
        points: u8,
    },

    /// The whole shipping cost.
    FreeShipping,
}

impl VoucherKind {
    /// Percentage voucher kind.
    ///
    /// # Errors
    ///
    /// Returns [`VoucherError::InvalidPercentage`] above 100.
    pub fn percentage(points: u8) -> Result<Self, VoucherError> {
        if points > 100 {
            return Err(VoucherError::InvalidPercentage(points));
        }

        Ok(Self::Percentage { points })
    }
}

/// A voucher.
#[derive(Clone, Debug, PartialEq)]
pub struct Voucher {
    /// Unique, upper-case code.
    pub code: String,

    /// Kind.
    pub kind: VoucherKind,

    /// Maximum number of uses. Ignored for fixed vouchers.
    pub limit: Option<u32>,

    /// Minimum subtotal, in minor units of the cart currency.
    pub minimum_spend: i64,

    /// Last day the voucher can be used.
    pub expiry: Option<Date>,
}

impl Voucher {
    /// New voucher. A blank code is replaced with a generated one.
    pub fn new(code: &str, kind: VoucherKind) -> Self {
        let code = normalise_code(code);

        Self {
            code: if code.is_empty() { generate_code() } else { code },
            kind,
            limit: None,
            minimum_spend: 0,
            expiry: None,
        }
    }

    /// Limit the number of uses.
    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Require a minimum subtotal, in minor units.
    #[must_use]
    pub fn with_minimum_spend(mut self, minimum_spend: i64) -> Self {
        self.minimum_spend = minimum_spend;
        self
    }

    /// Expire after `date`.
    #[must_use]
    pub fn expiring(mut self, date: Date) -> Self {
        self.expiry = Some(date);
        self
    }

    /// Whether the voucher has passed its expiry date.
    pub fn is_expired(&self, today: Date) -> bool {
        self.expiry.is_some_and(|expiry| expiry < today)
    }

    /// Whether the voucher has uses left, given `uses` elsewhere.
    pub fn available(&self, uses: u32) -> bool {
        match (&self.kind, self.limit) {
            (VoucherKind::Fixed { .. }, _) | (_, None) => true,
            (_, Some(limit)) => uses < limit,
        }
    }

    /// Face value left on a fixed voucher after `redeemed` minor units.
    pub fn remaining(&self, redeemed: i64) -> Option<i64> {
        match &self.kind {
            VoucherKind::Fixed { amount } => {
                Some(amount.to_minor_units().saturating_sub(redeemed).max(0))
            }
            _ => None,
        }
    }

    /// Short description, e.g. `$10.00 voucher`.
    pub fn description(&self) -> String {
        match &self.kind {
            VoucherKind::Fixed { amount } => format!("{amount} voucher"),
            VoucherKind::Percentage { points } => format!("{points}% discount"),
            VoucherKind::FreeShipping => "free shipping".to_string(),
        }
    }
}

/// Trim and upper-case a code.
pub fn normalise_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Random 8 character code.
pub fn generate_code() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(8)
        .collect::<String>()
        .to_uppercase()
}

/// Add a voucher to the shop.
///
/// # Errors
///
/// Returns [`StoreError::Duplicate`] if the code is taken.
pub fn create_voucher(shop: &Shop, voucher: Voucher) -> Result<String, VoucherError> {
    let code = voucher.code.clone();

    let mut tx = shop.store().begin();
    tx.insert_voucher(voucher)?;
    tx.commit();

    info!(code, "voucher created");

    Ok(code)
}

/// A discount worked out for a cart, not yet saved.
#[derive(Clone, Debug, PartialEq)]
pub struct AppliedDiscount {
    /// Voucher code.
    pub code: String,

    /// Voucher description.
    pub description: String,

    /// Amount taken off.
    pub amount: Amount,
}

impl AppliedDiscount {
    /// Plain data view.
    pub fn summary(&self) -> DiscountSummary {
        DiscountSummary {
            code: self.code.clone(),
            description: self.description.clone(),
            amount: money::to_decimal(&self.amount),
        }
    }
}

/// Discounts for a cart plus the codes that couldn't be used.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Calculation {
    /// Discounts, in the order they were applied.
    pub discounts: Vec<AppliedDiscount>,

    /// Codes that didn't match a usable voucher.
    pub invalid_codes: Vec<String>,
}

impl Calculation {
    /// Sum of all discounts.
    ///
    /// # Errors
    ///
    /// Returns an error if a discount is in another currency.
    pub fn total(&self, currency: &'static Currency) -> Result<Amount, PriceError> {
        money::sum(self.discounts.iter().map(|discount| &discount.amount), currency)
    }
}

/// Works out the discounts a cart gets for a set of codes.
pub trait VoucherStrategy: Debug + Send + Sync {
    /// Calculate discounts for `cart`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart can't be totalled.
    fn calculate(
        &self,
        cart: &dyn Cart,
        codes: &[String],
        include_shipping: bool,
    ) -> Result<Calculation, CartError>;
}

/// Recalculate and persist the discounts on an order.
///
/// Existing discounts on the order are replaced. Every discount is validated
/// against the voucher's usage limit, face value and remaining balance inside
/// one store transaction; any failure leaves the order's previous discounts
/// in place.
///
/// # Errors
///
/// - [`VoucherError`]: a discount failed validation.
/// - [`CartError`]: the order couldn't be totalled.
#[tracing::instrument(skip(order, codes))]
pub fn save_discounts(
    order: &dyn Cart,
    order_id: OrderId,
    codes: &[String],
) -> Result<Calculation, CartError> {
    let calculation = match order.shop().vouchers() {
        Some(strategy) => strategy.calculate(order, codes, true)?,
        None => Calculation::default(),
    };

    let mut tx = order.shop().store().begin();
    tx.delete_discounts(order_id);

    for discount in &calculation.discounts {
        let voucher = tx
            .voucher(&discount.code)
            .cloned()
            .ok_or_else(|| VoucherError::UnknownVoucher(discount.code.clone()))?;
        let usage = tx.voucher_usage(&voucher.code, Some(order_id));
        let amount = discount.amount.to_minor_units();

        if voucher.limit.is_some() && !voucher.available(usage.uses) {
            warn!(code = voucher.code, "voucher usage limit reached");
            return Err(VoucherError::AlreadyUsed(voucher.code).into());
        }

        if let VoucherKind::Fixed { amount: face } = &voucher.kind {
            if amount > face.to_minor_units() {
                return Err(VoucherError::ExceedsAmount(voucher.code).into());
            }
        }

        if voucher
            .remaining(usage.redeemed)
            .is_some_and(|remaining| amount > remaining)
        {
            warn!(code = voucher.code, amount, "voucher balance exceeded");
            return Err(VoucherError::ExceedsBalance(voucher.code).into());
        }

        tx.insert_discount(order_id, voucher.code, discount.amount);
    }

    tx.commit();

    info!(
        discounts = calculation.discounts.len(),
        invalid = calculation.invalid_codes.len(),
        "discounts saved"
    );

    Ok(calculation)
}

/// Discounts saved on an order.
///
/// # Errors
///
/// Returns [`StoreError::NotFound`] if the order doesn't exist.
pub fn saved_discounts(shop: &Shop, order: OrderId) -> Result<Calculation, StoreError> {
    let store = shop.store().read();
    store.order(order)?;

    let discounts = store
        .discounts_for(order)
        .map(|discount| AppliedDiscount {
            code: discount.voucher.clone(),
            description: store
                .voucher(&discount.voucher)
                .map_or_else(|| discount.voucher.clone(), Voucher::description),
            amount: discount.amount,
        })
        .collect();

    Ok(Calculation {
        discounts,
        invalid_codes: Vec::new(),
    })
}
