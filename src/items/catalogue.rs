//! Catalogue

use std::sync::{
    Arc, PoisonError, RwLock,
    atomic::{AtomicU32, Ordering},
};

use rustc_hash::FxHashMap;
use tracing::warn;

use crate::{
    items::{CartItem, ItemRef, ItemResolver, LineOptions, OptionChoices},
    money::{self, Amount, PriceError},
};

/// Item kind used for catalogue products.
pub const PRODUCT_KIND: &str = "product";

/// A product with a unit price, optional stock and optional per-unit shipping.
#[derive(Debug)]
pub struct Product {
    id: u64,
    name: String,
    price: Amount,
    stock: Option<AtomicU32>,
    shipping_cost: Option<Amount>,
    options: Vec<(String, OptionChoices)>,
    allow_discounts: bool,
}

impl Product {
    /// New product with unlimited stock.
    pub fn new(id: u64, name: impl Into<String>, price: Amount) -> Self {
        Self {
            id,
            name: name.into(),
            price,
            stock: None,
            shipping_cost: None,
            options: Vec::new(),
            allow_discounts: true,
        }
    }

    /// Limit the number of units that can be sold.
    #[must_use]
    pub fn with_stock(mut self, stock: u32) -> Self {
        self.stock = Some(AtomicU32::new(stock));
        self
    }

    /// Charge a shipping cost per unit.
    #[must_use]
    pub fn with_shipping_cost(mut self, cost: Amount) -> Self {
        self.shipping_cost = Some(cost);
        self
    }

    /// Accept an option.
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, choices: OptionChoices) -> Self {
        self.options.push((key.into(), choices));
        self
    }

    /// Exclude this product from percentage discounts, e.g. gift cards.
    #[must_use]
    pub fn without_discounts(mut self) -> Self {
        self.allow_discounts = false;
        self
    }

    /// Product id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Unit price.
    pub fn price(&self) -> Amount {
        self.price
    }

    /// Units left, `None` if stock isn't tracked.
    pub fn stock(&self) -> Option<u32> {
        self.stock.as_ref().map(|stock| stock.load(Ordering::Acquire))
    }
}

impl CartItem for Product {
    fn item_ref(&self) -> ItemRef {
        ItemRef::new(PRODUCT_KIND, self.id)
    }

    fn line_total(&self, quantity: u32, _options: &LineOptions) -> Result<Amount, PriceError> {
        money::times(&self.price, quantity)
    }

    fn description(&self) -> String {
        self.name.clone()
    }

    fn available_options(&self) -> Vec<(String, OptionChoices)> {
        self.options.clone()
    }

    fn cart_errors(&self, quantity: u32, _options: &LineOptions) -> Vec<String> {
        match self.stock() {
            Some(0) => vec![format!("{} is out of stock", self.name)],
            Some(left) if left < quantity => {
                vec![format!("Only {left} of {} left in stock", self.name)]
            }
            _ => Vec::new(),
        }
    }

    fn allow_discounts(&self) -> bool {
        self.allow_discounts
    }

    fn shipping_cost(&self) -> Option<Amount> {
        self.shipping_cost
    }

    fn purchase(&self, quantity: u32, _options: &LineOptions) {
        let Some(stock) = &self.stock else {
            return;
        };

        let result = stock.fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| {
            left.checked_sub(quantity)
        });

        if let Err(left) = result {
            warn!(
                product = self.id,
                quantity, left, "stock exhausted, purchase not decremented"
            );
        }
    }
}

/// In-memory product catalogue.
#[derive(Debug, Default)]
pub struct Catalogue {
    products: RwLock<FxHashMap<u64, Arc<Product>>>,
}

impl Catalogue {
    /// Empty catalogue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a product, returning its reference.
    pub fn insert(&self, product: Product) -> ItemRef {
        let item = product.item_ref();

        self.products
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(product.id, Arc::new(product));

        item
    }

    /// Remove a product. Lines referencing it become stale.
    pub fn remove(&self, id: u64) -> Option<Arc<Product>> {
        self.products
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }

    /// Look up a product.
    pub fn product(&self, id: u64) -> Option<Arc<Product>> {
        self.products
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Number of products.
    pub fn len(&self) -> usize {
        self.products
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if there are no products.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ItemResolver for Catalogue {
    fn resolve(&self, item: &ItemRef) -> Option<Arc<dyn CartItem>> {
        if item.kind != PRODUCT_KIND {
            return None;
        }

        self.product(item.id)
            .map(|product| -> Arc<dyn CartItem> { product })
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::{Money, iso::NZD};
    use testresult::TestResult;

    use super::*;

    #[test]
    fn resolves_products_by_ref() {
        let catalogue = Catalogue::new();
        let item = catalogue.insert(Product::new(1, "Mug", Money::from_minor(1200, NZD)));

        let resolved = catalogue.resolve(&item);

        assert_eq!(resolved.map(|item| item.description()), Some("Mug".into()));
    }

    #[test]
    fn other_kinds_do_not_resolve() {
        let catalogue = Catalogue::new();
        catalogue.insert(Product::new(1, "Mug", Money::from_minor(1200, NZD)));

        assert!(catalogue.resolve(&ItemRef::new("giftcard", 1)).is_none());
    }

    #[test]
    fn removed_products_stop_resolving() {
        let catalogue = Catalogue::new();
        let item = catalogue.insert(Product::new(1, "Mug", Money::from_minor(1200, NZD)));

        catalogue.remove(1);

        assert!(catalogue.resolve(&item).is_none());
    }

    #[test]
    fn line_total_multiplies_price() -> TestResult {
        let product = Product::new(1, "Mug", Money::from_minor(1200, NZD));

        assert_eq!(
            product.line_total(3, &LineOptions::new())?,
            Money::from_minor(3600, NZD)
        );

        Ok(())
    }

    #[test]
    fn cart_errors_report_stock() {
        let product = Product::new(1, "Mug", Money::from_minor(1200, NZD)).with_stock(2);

        assert!(product.cart_errors(2, &LineOptions::new()).is_empty());
        assert_eq!(
            product.cart_errors(3, &LineOptions::new()),
            vec!["Only 2 of Mug left in stock".to_string()]
        );
    }

    #[test]
    fn purchase_decrements_stock_once_per_unit() {
        let product = Product::new(1, "Mug", Money::from_minor(1200, NZD)).with_stock(3);

        product.purchase(2, &LineOptions::new());
        product.purchase(2, &LineOptions::new());

        assert_eq!(product.stock(), Some(1));
        assert_eq!(
            product.cart_errors(1, &LineOptions::new()),
            Vec::<String>::new()
        );
    }

    #[test]
    fn sold_out_product_reports_out_of_stock() {
        let product = Product::new(1, "Mug", Money::from_minor(1200, NZD)).with_stock(1);

        product.purchase(1, &LineOptions::new());

        assert_eq!(
            product.cart_errors(1, &LineOptions::new()),
            vec!["Mug is out of stock".to_string()]
        );
    }
}
