//! Region Fixtures

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::{
    fixtures::FixtureError,
    money,
    regions::{Country, Region},
};

/// Wrapper for regions in YAML
#[derive(Debug, Deserialize)]
pub struct RegionsFixture {
    /// Map of region name -> region fixture
    pub regions: BTreeMap<String, RegionFixture>,
}

/// Region fixture from YAML
#[derive(Debug, Deserialize)]
pub struct RegionFixture {
    /// ISO currency code
    pub currency: String,

    /// Map of ISO country code -> country name
    #[serde(default)]
    pub countries: BTreeMap<String, String>,

    /// Used when the visitor's country matches no region
    #[serde(default)]
    pub default: bool,

    /// Display ordering
    #[serde(default)]
    pub sort_order: u16,
}

impl RegionFixture {
    /// Build the region named `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the currency is unknown.
    pub fn into_region(self, name: String) -> Result<Region, FixtureError> {
        let mut region = Region::new(name, money::currency(&self.currency)?);

        region.countries = self
            .countries
            .into_iter()
            .map(|(code, name)| Country::new(code, name))
            .collect();
        region.is_default = self.default;
        region.sort_order = self.sort_order;

        Ok(region)
    }
}
