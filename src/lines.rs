//! Cart Lines

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    items::{CartItem, ItemRef, LineOptions},
    money::{self, Amount},
    store::LineId,
};

/// A quantity of one item with one set of options.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// The item being bought.
    pub item: ItemRef,

    /// Number of units, always at least one for a stored line.
    pub quantity: u32,

    /// Normalised options.
    #[serde(default)]
    pub options: LineOptions,
}

impl CartLine {
    /// New line.
    pub fn new(item: ItemRef, quantity: u32, options: LineOptions) -> Self {
        Self {
            item,
            quantity,
            options,
        }
    }

    /// Whether this line is for `item` with `options`.
    pub fn matches(&self, item: &ItemRef, options: &LineOptions) -> bool {
        self.item == *item && self.options == *options
    }
}

/// A line whose item still resolves, with its total worked out.
#[derive(Clone, Debug)]
pub struct ResolvedLine {
    /// Stored row id, `None` for session lines.
    pub id: Option<LineId>,

    /// The underlying line.
    pub line: CartLine,

    /// The resolved item.
    pub item: Arc<dyn CartItem>,

    /// Line total.
    pub total: Amount,

    /// Line description.
    pub description: String,
}

impl ResolvedLine {
    /// Item level problems with this line, e.g. insufficient stock.
    pub fn errors(&self) -> Vec<String> {
        self.item.cart_errors(self.line.quantity, &self.line.options)
    }

    /// Serialisable view of this line.
    pub fn summary(&self) -> LineSummary {
        LineSummary {
            item: self.line.item.clone(),
            description: self.description.clone(),
            quantity: self.line.quantity,
            options: self.line.options.clone(),
            total: money::to_decimal(&self.total),
        }
    }
}

/// Plain data view of a line.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LineSummary {
    /// Item reference.
    pub item: ItemRef,

    /// Description.
    pub description: String,

    /// Quantity.
    pub quantity: u32,

    /// Options.
    pub options: LineOptions,

    /// Line total in major units.
    pub total: Decimal,
}
