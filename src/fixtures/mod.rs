//! Fixtures
//!
//! YAML fixture sets for demos and tests. A set is one file per kind, all
//! with the same name: `{base}/catalogue/{name}.yml`, `regions`, `shipping`,
//! `vouchers` and `carts`.

use std::{fs, path::PathBuf, sync::Arc};

use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::{
    cart::{Cart, CartError, SessionCart, UpdateOutcome},
    config::{ConfigError, ShopConfig},
    fixtures::{
        carts::{CartFixture, CartsFixture},
        catalogue::CatalogueFixture,
        regions::RegionsFixture,
        shipping::ShippingFixture,
        vouchers::VouchersFixture,
    },
    items::{
        ItemRef, LineOptions,
        catalogue::{Catalogue, Product},
    },
    money::PriceError,
    regions::Regions,
    session::Session,
    shipping::{RegionalShipping, ShippingMethod, ShippingRate},
    shop::Shop,
    vouchers::{Voucher, VoucherError, create_voucher},
};

pub mod carts;
pub mod catalogue;
pub mod regions;
pub mod shipping;
pub mod vouchers;

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Invalid price or currency
    #[error(transparent)]
    Price(#[from] PriceError),

    /// Invalid shop config
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Invalid voucher
    #[error(transparent)]
    Voucher(#[from] VoucherError),

    /// Cart couldn't be filled
    #[error(transparent)]
    Cart(#[from] CartError),

    /// Product not found
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Region not found
    #[error("Region not found: {0}")]
    RegionNotFound(String),

    /// Shipping rate names an unknown method
    #[error("Shipping method not found: {0}")]
    ShippingMethodNotFound(String),

    /// A cart line failed item validation
    #[error("Line for {product} rejected: {}", errors.join("; "))]
    LineRejected {
        /// Product key
        product: String,
        /// Validation errors
        errors: Vec<String>,
    },
}

/// Fixture
#[derive(Debug)]
pub struct Fixture {
    /// Base path for fixture files
    base_path: PathBuf,

    /// Shop settings
    config: ShopConfig,

    /// Products, shared with the shops built from this fixture
    catalogue: Arc<Catalogue>,

    /// Product key -> item reference
    product_keys: FxHashMap<String, ItemRef>,

    /// Regions
    regions: Regions,

    /// Shipping methods and rates, when loaded
    shipping: Option<(Vec<ShippingMethod>, Vec<ShippingRate>)>,

    /// Vouchers to create
    vouchers: Vec<Voucher>,

    /// Cart contents
    cart: CartFixture,
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

impl Fixture {
    /// Create a new empty fixture with default base path
    pub fn new() -> Self {
        Self::with_base_path("./fixtures")
    }

    /// Create a new empty fixture with custom base path
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            config: ShopConfig::default(),
            catalogue: Arc::new(Catalogue::new()),
            product_keys: FxHashMap::default(),
            regions: Regions::new(),
            shipping: None,
            vouchers: Vec::new(),
            cart: CartFixture::default(),
        }
    }

    /// Use `config` for shops built from this fixture
    #[must_use]
    pub fn with_config(mut self, config: ShopConfig) -> Self {
        self.config = config;
        self
    }

    fn read<T: DeserializeOwned>(&self, kind: &str, name: &str) -> Result<T, FixtureError> {
        let file_path = self.base_path.join(kind).join(format!("{name}.yml"));
        let contents = fs::read_to_string(&file_path)?;

        Ok(serde_norway::from_str(&contents)?)
    }

    /// Load products from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or a price is invalid.
    pub fn load_catalogue(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let fixture: CatalogueFixture = self.read("catalogue", name)?;

        for (key, product_fixture) in fixture.products {
            let product = Product::try_from(product_fixture)?;
            let item = self.catalogue.insert(product);

            self.product_keys.insert(key, item);
        }

        Ok(self)
    }

    /// Load regions from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or a currency is unknown.
    pub fn load_regions(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let fixture: RegionsFixture = self.read("regions", name)?;

        for (region_name, region_fixture) in fixture.regions {
            self.regions.insert(region_fixture.into_region(region_name)?);
        }

        Ok(self)
    }

    /// Load shipping methods and rates from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, a price is
    /// invalid, or a rate names an unknown method.
    pub fn load_shipping(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let fixture: ShippingFixture = self.read("shipping", name)?;

        self.shipping = Some(fixture.into_parts()?);

        Ok(self)
    }

    /// Load vouchers from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or a voucher is invalid.
    pub fn load_vouchers(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let fixture: VouchersFixture = self.read("vouchers", name)?;
        let currency = self.config.currency()?;

        for voucher in fixture.vouchers {
            self.vouchers.push(voucher.into_voucher(currency)?);
        }

        Ok(self)
    }

    /// Load cart contents from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_cart(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let fixture: CartsFixture = self.read("carts", name)?;

        self.cart = fixture.cart;

        Ok(self)
    }

    /// Load a complete fixture set (every kind with the same name)
    ///
    /// # Errors
    ///
    /// Returns an error if any of the fixture files cannot be loaded.
    pub fn from_set(name: &str) -> Result<Self, FixtureError> {
        Self::new().load_set(name)
    }

    /// Load every kind of fixture named `name` into this fixture
    ///
    /// # Errors
    ///
    /// Returns an error if any of the fixture files cannot be loaded.
    pub fn load_set(mut self, name: &str) -> Result<Self, FixtureError> {
        self.load_catalogue(name)?
            .load_regions(name)?
            .load_shipping(name)?
            .load_vouchers(name)?
            .load_cart(name)?;

        Ok(self)
    }

    /// Item reference for a product key
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not found.
    pub fn item(&self, key: &str) -> Result<&ItemRef, FixtureError> {
        self.product_keys
            .get(key)
            .ok_or_else(|| FixtureError::ProductNotFound(key.to_string()))
    }

    /// Product by its key
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not found.
    pub fn product(&self, key: &str) -> Result<Arc<Product>, FixtureError> {
        self.item(key)
            .ok()
            .and_then(|item| self.catalogue.product(item.id))
            .ok_or_else(|| FixtureError::ProductNotFound(key.to_string()))
    }

    /// The loaded catalogue
    pub fn catalogue(&self) -> Arc<Catalogue> {
        Arc::clone(&self.catalogue)
    }

    /// Build a shop with the loaded products, regions, shipping and vouchers
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or a voucher code is duplicated.
    pub fn shop(&self) -> Result<Shop, FixtureError> {
        let mut builder = Shop::builder(self.config.clone(), self.catalogue())
            .regions(self.regions.clone());

        if let Some((methods, rates)) = &self.shipping {
            builder = builder.shipping(Box::new(RegionalShipping::new(
                methods.clone(),
                rates.clone(),
            )));
        }

        let shop = builder.build()?;

        for voucher in &self.vouchers {
            create_voucher(&shop, voucher.clone())?;
        }

        Ok(shop)
    }

    /// Fill `session`'s cart with the loaded cart, with extra voucher codes
    /// and an optional shipping option override
    ///
    /// # Errors
    ///
    /// Returns an error if a product or region is unknown, or a line fails
    /// validation.
    pub fn fill_session(
        &self,
        shop: &Shop,
        session: &mut Session,
        extra_vouchers: &[String],
        shipping_option: Option<String>,
    ) -> Result<(), FixtureError> {
        if let Some(name) = &self.cart.region {
            let region = shop
                .regions()
                .find(name)
                .ok_or_else(|| FixtureError::RegionNotFound(name.clone()))?;

            session.set_region(Some(region));
        }

        let mut cart = SessionCart::load(shop, session)?;

        for line in &self.cart.lines {
            let options: LineOptions = line.options.clone().into_iter().collect();
            let outcome = cart.add(self.item(&line.product)?, line.quantity, &options)?;

            if let UpdateOutcome::Rejected(errors) = outcome {
                return Err(FixtureError::LineRejected {
                    product: line.product.clone(),
                    errors,
                });
            }
        }

        cart.set_shipping_option(shipping_option.or_else(|| self.cart.shipping_option.clone()))?;

        let mut codes = self.cart.vouchers.clone();
        codes.extend(extra_vouchers.iter().cloned());
        cart.set_voucher_codes(codes)?;

        Ok(())
    }
}
