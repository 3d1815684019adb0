//! Regional shipping

use crate::{
    cart::{Cart, CartError},
    money::{self, Amount},
    regions::Country,
    shipping::{ShippingChoice, ShippingStrategy},
};

/// A named way of shipping, e.g. courier or post.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShippingMethod {
    /// Stored on carts when selected.
    pub slug: String,

    /// Display name.
    pub name: String,

    /// Display ordering, ties broken by name.
    pub sort_order: u16,
}

/// Price of a method in one region for carts within a value band.
#[derive(Clone, Debug, PartialEq)]
pub struct ShippingRate {
    /// Method slug.
    pub method: String,

    /// Region name.
    pub region: String,

    /// Cost.
    pub cost: Amount,

    /// Smallest subtotal this rate applies to, inclusive, in minor units.
    pub min_cart_value: i64,

    /// Largest subtotal this rate applies to, inclusive, in minor units.
    pub max_cart_value: Option<i64>,
}

impl ShippingRate {
    fn applies(&self, region: &str, subtotal: &Amount) -> bool {
        let value = subtotal.to_minor_units();

        self.region == region
            && self.cost.currency() == subtotal.currency()
            && self.min_cart_value <= value
            && self.max_cart_value.is_none_or(|max| value <= max)
    }
}

/// Shipping priced per method, region and cart value.
#[derive(Clone, Debug, Default)]
pub struct RegionalShipping {
    methods: Vec<ShippingMethod>,
    rates: Vec<ShippingRate>,
}

impl RegionalShipping {
    /// Strategy with the given methods and rates.
    pub fn new(methods: Vec<ShippingMethod>, rates: Vec<ShippingRate>) -> Self {
        let mut methods = methods;
        methods.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name)));

        Self { methods, rates }
    }

    fn matching_rates<'a>(
        &'a self,
        cart: &dyn Cart,
    ) -> Result<impl Iterator<Item = &'a ShippingRate>, CartError> {
        let region = cart.region().map(|region| region.name.clone());
        let subtotal = cart.subtotal()?;

        Ok(self.rates.iter().filter(move |rate| {
            region
                .as_deref()
                .is_some_and(|region| rate.applies(region, &subtotal))
        }))
    }
}

impl ShippingStrategy for RegionalShipping {
    fn calculate(&self, cart: &dyn Cart) -> Result<Amount, CartError> {
        let Some(option) = cart.shipping_option()? else {
            return Ok(money::zero(cart.currency()));
        };

        let cheapest = self
            .matching_rates(cart)?
            .filter(|rate| rate.method == option)
            .min_by_key(|rate| rate.cost.to_minor_units());

        Ok(cheapest.map_or_else(|| money::zero(cart.currency()), |rate| rate.cost))
    }

    fn available_options(&self, cart: &dyn Cart) -> Result<Option<Vec<ShippingChoice>>, CartError> {
        let rates: Vec<&ShippingRate> = self.matching_rates(cart)?.collect();

        let choices = self
            .methods
            .iter()
            .filter(|method| rates.iter().any(|rate| rate.method == method.slug))
            .map(|method| ShippingChoice {
                slug: method.slug.clone(),
                title: method.name.clone(),
            })
            .collect();

        Ok(Some(choices))
    }

    fn available_countries(&self, cart: &dyn Cart) -> Option<Vec<Country>> {
        cart.region().map(|region| region.countries.clone())
    }
}
