//! Shipping Fixtures

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::{
    fixtures::FixtureError,
    money,
    shipping::{ShippingMethod, ShippingRate},
};

/// Wrapper for shipping methods and rates in YAML
#[derive(Debug, Deserialize)]
pub struct ShippingFixture {
    /// Map of method slug -> method fixture
    pub methods: BTreeMap<String, MethodFixture>,

    /// Rates
    #[serde(default)]
    pub rates: Vec<RateFixture>,
}

/// Shipping method fixture from YAML
#[derive(Debug, Deserialize)]
pub struct MethodFixture {
    /// Display name
    pub name: String,

    /// Display ordering
    #[serde(default)]
    pub sort_order: u16,
}

/// Shipping rate fixture from YAML
#[derive(Debug, Deserialize)]
pub struct RateFixture {
    /// Method slug
    pub method: String,

    /// Region name
    pub region: String,

    /// Cost, e.g. `"8.50 NZD"`
    pub cost: String,

    /// Smallest cart subtotal, in the cost's currency
    #[serde(default)]
    pub min_cart_value: Option<String>,

    /// Largest cart subtotal, in the cost's currency
    #[serde(default)]
    pub max_cart_value: Option<String>,
}

impl ShippingFixture {
    /// Methods and rates. Rates must name a known method.
    ///
    /// # Errors
    ///
    /// Returns an error if a price is invalid or a rate names an unknown
    /// method.
    pub fn into_parts(self) -> Result<(Vec<ShippingMethod>, Vec<ShippingRate>), FixtureError> {
        let rates = self
            .rates
            .into_iter()
            .map(|rate| {
                if !self.methods.contains_key(&rate.method) {
                    return Err(FixtureError::ShippingMethodNotFound(rate.method));
                }

                let cost = money::parse_price(&rate.cost)?;
                let min_cart_value = rate
                    .min_cart_value
                    .map(|value| money::parse_minor(&value, cost.currency()))
                    .transpose()?
                    .unwrap_or(0);
                let max_cart_value = rate
                    .max_cart_value
                    .map(|value| money::parse_minor(&value, cost.currency()))
                    .transpose()?;

                Ok(ShippingRate {
                    method: rate.method,
                    region: rate.region,
                    cost,
                    min_cart_value,
                    max_cart_value,
                })
            })
            .collect::<Result<Vec<_>, FixtureError>>()?;

        let methods = self
            .methods
            .into_iter()
            .map(|(slug, method)| ShippingMethod {
                slug,
                name: method.name,
                sort_order: method.sort_order,
            })
            .collect();

        Ok((methods, rates))
    }
}
