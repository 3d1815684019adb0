//! Catalogue Fixtures

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::{
    fixtures::FixtureError,
    items::{OptionChoices, catalogue::Product},
    money,
};

/// Wrapper for products in YAML
#[derive(Debug, Deserialize)]
pub struct CatalogueFixture {
    /// Map of product key -> product fixture
    pub products: BTreeMap<String, ProductFixture>,
}

/// Product fixture from YAML
#[derive(Debug, Deserialize)]
pub struct ProductFixture {
    /// Catalogue id
    pub id: u64,

    /// Product name
    pub name: String,

    /// Unit price, e.g. `"18.00 NZD"`
    pub price: String,

    /// Units in stock, unlimited when missing
    #[serde(default)]
    pub stock: Option<u32>,

    /// Per-unit shipping cost
    #[serde(default)]
    pub shipping_cost: Option<String>,

    /// Accepted options: a list of choices, or `text`
    #[serde(default)]
    pub options: BTreeMap<String, OptionChoices>,

    /// Whether percentage vouchers apply
    #[serde(default = "allow_discounts")]
    pub allow_discounts: bool,
}

fn allow_discounts() -> bool {
    true
}

impl TryFrom<ProductFixture> for Product {
    type Error = FixtureError;

    fn try_from(fixture: ProductFixture) -> Result<Self, Self::Error> {
        let mut product = Product::new(fixture.id, fixture.name, money::parse_price(&fixture.price)?);

        if let Some(stock) = fixture.stock {
            product = product.with_stock(stock);
        }

        if let Some(cost) = fixture.shipping_cost {
            product = product.with_shipping_cost(money::parse_price(&cost)?);
        }

        for (key, choices) in fixture.options {
            product = product.with_option(key, choices);
        }

        if !fixture.allow_discounts {
            product = product.without_discounts();
        }

        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;
    use crate::items::CartItem;

    #[test]
    fn parses_products_with_options() -> TestResult {
        let yaml = r"
products:
  mug:
    id: 1
    name: Mug
    price: 18.00 NZD
    stock: 3
    options:
      colour: [Red, Blue]
      engraving: text
";

        let fixture: CatalogueFixture = serde_norway::from_str(yaml)?;
        let product = fixture
            .products
            .into_values()
            .next()
            .ok_or_else(|| FixtureError::ProductNotFound("mug".to_string()))?;
        let product = Product::try_from(product)?;

        assert_eq!(product.price().to_minor_units(), 1800);
        assert_eq!(product.stock(), Some(3));
        assert_eq!(
            product.available_options(),
            vec![
                ("colour".to_string(), OptionChoices::choices(["Red", "Blue"])),
                ("engraving".to_string(), OptionChoices::free_text()),
            ]
        );

        Ok(())
    }

    #[test]
    fn invalid_price_is_an_error() -> TestResult {
        let fixture: ProductFixture =
            serde_norway::from_str("id: 1\nname: Mug\nprice: eighteen dollars")?;

        assert!(matches!(Product::try_from(fixture), Err(FixtureError::Price(_))));

        Ok(())
    }
}
