//! Per-item shipping

use crate::{
    cart::{Cart, CartError},
    money::{self, Amount},
    regions::Country,
    shipping::ShippingStrategy,
};

/// Charges each item's own shipping cost per unit, restricted to the cart's
/// region.
#[derive(Debug, Default, Clone, Copy)]
pub struct PerItemShipping;

impl ShippingStrategy for PerItemShipping {
    fn calculate(&self, cart: &dyn Cart) -> Result<Amount, CartError> {
        let costs = cart
            .lines()?
            .iter()
            .filter_map(|line| {
                line.item
                    .shipping_cost()
                    .map(|cost| money::times(&cost, line.line.quantity))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(money::sum(&costs, cart.currency())?)
    }

    fn available_countries(&self, cart: &dyn Cart) -> Option<Vec<Country>> {
        cart.region().map(|region| region.countries.clone())
    }
}
