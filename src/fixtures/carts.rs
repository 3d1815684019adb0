//! Cart Fixtures

use std::collections::BTreeMap;

use serde::Deserialize;

/// Wrapper for a cart in YAML
#[derive(Debug, Deserialize)]
pub struct CartsFixture {
    /// The cart
    pub cart: CartFixture,
}

/// Cart fixture from YAML
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CartFixture {
    /// Region name
    #[serde(default)]
    pub region: Option<String>,

    /// Shipping method slug
    #[serde(default)]
    pub shipping_option: Option<String>,

    /// Voucher codes
    #[serde(default)]
    pub vouchers: Vec<String>,

    /// Lines
    #[serde(default)]
    pub lines: Vec<LineFixture>,
}

/// Cart line fixture from YAML
#[derive(Clone, Debug, Deserialize)]
pub struct LineFixture {
    /// Product key from the catalogue fixture
    pub product: String,

    /// Units
    #[serde(default = "one")]
    pub quantity: u32,

    /// Chosen options
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

fn one() -> u32 {
    1
}
