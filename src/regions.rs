//! Regions

use rusty_money::iso::Currency;
use serde::Serialize;
use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// Region Key
    pub struct RegionKey;
}

/// A country belonging to a region.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Country {
    /// ISO 3166 alpha-2 code.
    pub code: String,

    /// Display name.
    pub name: String,
}

impl Country {
    /// New country.
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

/// A shipping/pricing region with its own currency.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    /// Unique display name.
    pub name: String,

    /// Currency carts in this region are priced in.
    pub currency: &'static Currency,

    /// Countries in this region.
    pub countries: Vec<Country>,

    /// Used when no region matches.
    pub is_default: bool,

    /// Display ordering.
    pub sort_order: u16,
}

impl Region {
    /// New region with no countries.
    pub fn new(name: impl Into<String>, currency: &'static Currency) -> Self {
        Self {
            name: name.into(),
            currency,
            countries: Vec::new(),
            is_default: false,
            sort_order: 0,
        }
    }

    /// Add a country.
    #[must_use]
    pub fn with_country(mut self, country: Country) -> Self {
        self.countries.push(country);
        self
    }

    /// Mark as the default region.
    #[must_use]
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }
}

/// All configured regions.
#[derive(Clone, Debug, Default)]
pub struct Regions {
    regions: SlotMap<RegionKey, Region>,
}

impl Regions {
    /// No regions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a region.
    pub fn insert(&mut self, region: Region) -> RegionKey {
        self.regions.insert(region)
    }

    /// Look up a region.
    pub fn get(&self, key: RegionKey) -> Option<&Region> {
        self.regions.get(key)
    }

    /// Find a region by name.
    pub fn find(&self, name: &str) -> Option<RegionKey> {
        self.regions
            .iter()
            .find(|(_, region)| region.name == name)
            .map(|(key, _)| key)
    }

    /// The region flagged default, otherwise the first one added.
    pub fn default_region(&self) -> Option<RegionKey> {
        self.regions
            .iter()
            .find(|(_, region)| region.is_default)
            .or_else(|| self.regions.iter().next())
            .map(|(key, _)| key)
    }

    /// Region containing `country_code`, falling back to the default region.
    pub fn for_country(&self, country_code: &str) -> Option<RegionKey> {
        self.regions
            .iter()
            .find(|(_, region)| {
                region
                    .countries
                    .iter()
                    .any(|country| country.code.eq_ignore_ascii_case(country_code))
            })
            .map(|(key, _)| key)
            .or_else(|| self.default_region())
    }

    /// Number of regions.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Returns `true` if there are no regions.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::{AUD, NZD};

    use super::*;

    fn regions() -> (Regions, RegionKey, RegionKey) {
        let mut regions = Regions::new();
        let aus = regions.insert(Region::new("Australia", AUD).with_country(Country::new("AU", "Australia")));
        let nz = regions.insert(
            Region::new("New Zealand", NZD)
                .with_country(Country::new("NZ", "New Zealand"))
                .as_default(),
        );

        (regions, aus, nz)
    }

    #[test]
    fn default_region_prefers_flagged_region() {
        let (regions, _, nz) = regions();

        assert_eq!(regions.default_region(), Some(nz));
    }

    #[test]
    fn for_country_matches_case_insensitively() {
        let (regions, aus, _) = regions();

        assert_eq!(regions.for_country("au"), Some(aus));
    }

    #[test]
    fn unknown_country_falls_back_to_default() {
        let (regions, _, nz) = regions();

        assert_eq!(regions.for_country("GB"), Some(nz));
    }

    #[test]
    fn empty_regions_have_no_default() {
        assert_eq!(Regions::new().default_region(), None);
    }
}
