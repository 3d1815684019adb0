//! Items
//!
//! Anything that can be put in a cart implements [`CartItem`]. Carts never hold
//! items directly, only [`ItemRef`]s that an [`ItemResolver`] turns back into
//! items when lines are read, so an item removed from the catalogue simply
//! stops resolving.

use std::{
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::money::{Amount, PriceError};

pub mod catalogue;
pub mod options;

pub use options::{LineOptions, OptionChoices};

/// Reference to a purchasable item: its kind plus its id within that kind.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemRef {
    /// Item kind, e.g. `product`.
    pub kind: String,

    /// Id within the kind.
    pub id: u64,
}

impl ItemRef {
    /// Reference an item of `kind` by id.
    pub fn new(kind: impl Into<String>, id: u64) -> Self {
        Self {
            kind: kind.into(),
            id,
        }
    }
}

impl Display for ItemRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Capabilities a cart line needs from the thing being bought.
pub trait CartItem: Debug + Send + Sync {
    /// Reference that resolves back to this item.
    fn item_ref(&self) -> ItemRef;

    /// Total for `quantity` units with the given options.
    ///
    /// # Errors
    ///
    /// Returns a [`PriceError`] if the total overflows.
    fn line_total(&self, quantity: u32, options: &LineOptions) -> Result<Amount, PriceError>;

    /// Human readable description, frozen onto order lines at purchase time.
    fn description(&self) -> String;

    /// Option keys this item accepts and their allowed values.
    fn available_options(&self) -> Vec<(String, OptionChoices)> {
        Vec::new()
    }

    /// Problems that prevent buying `quantity` units, e.g. out of stock.
    fn cart_errors(&self, _quantity: u32, _options: &LineOptions) -> Vec<String> {
        Vec::new()
    }

    /// Whether percentage discounts may be applied to this item.
    fn allow_discounts(&self) -> bool {
        true
    }

    /// Per-unit shipping cost, if the item carries its own.
    fn shipping_cost(&self) -> Option<Amount> {
        None
    }

    /// Called once for each order line after the order has been paid.
    fn purchase(&self, _quantity: u32, _options: &LineOptions) {}
}

/// Resolves [`ItemRef`]s to live items.
pub trait ItemResolver: Debug + Send + Sync {
    /// Look up an item, `None` if it no longer exists.
    fn resolve(&self, item: &ItemRef) -> Option<Arc<dyn CartItem>>;
}
