//! Shipping
//!
//! A [`ShippingStrategy`] prices shipping for a cart and, optionally, limits
//! the options and destination countries on offer. A shop without a strategy
//! ships everything for free, anywhere.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::{
    cart::{Cart, CartError},
    money::Amount,
    regions::Country,
};

mod per_item;
mod regional;

pub use per_item::PerItemShipping;
pub use regional::{RegionalShipping, ShippingMethod, ShippingRate};

/// Shown when an options-based strategy has nothing for the cart.
pub const UNABLE_TO_SHIP: &str = "We are unable to ship your current order to the selected region";

/// Shown when the selected option isn't one of the available ones.
pub const INVALID_OPTION: &str = "Invalid shipping option selected";

/// A shipping option a customer can pick.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingChoice {
    /// Stored on the cart when selected.
    pub slug: String,

    /// Display name.
    pub title: String,
}

/// Prices shipping for a cart.
pub trait ShippingStrategy: Debug + Send + Sync {
    /// Shipping cost for the cart's lines and selected option.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart can't be read or priced.
    fn calculate(&self, cart: &dyn Cart) -> Result<Amount, CartError>;

    /// Options the cart can choose from, `None` if this strategy doesn't use
    /// options.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart can't be read.
    fn available_options(&self, _cart: &dyn Cart) -> Result<Option<Vec<ShippingChoice>>, CartError> {
        Ok(None)
    }

    /// Countries the cart can be shipped to, `None` for no restriction.
    fn available_countries(&self, _cart: &dyn Cart) -> Option<Vec<Country>> {
        None
    }
}

/// Shipping problems that block checkout.
///
/// # Errors
///
/// Returns an error if the cart can't be read.
pub fn shipping_errors(cart: &dyn Cart) -> Result<Vec<String>, CartError> {
    if cart.kind().is_favourites() {
        return Ok(Vec::new());
    }

    let Some(strategy) = cart.shop().shipping() else {
        return Ok(Vec::new());
    };

    let Some(options) = strategy.available_options(cart)? else {
        return Ok(Vec::new());
    };

    if options.is_empty() {
        return Ok(vec![UNABLE_TO_SHIP.to_string()]);
    }

    let selected = cart.shipping_option()?;

    if !options
        .iter()
        .any(|option| selected.as_deref() == Some(option.slug.as_str()))
    {
        return Ok(vec![INVALID_OPTION.to_string()]);
    }

    Ok(Vec::new())
}
