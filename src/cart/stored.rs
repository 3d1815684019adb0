//! Stored Carts

use std::fmt::{Debug, Formatter, Result as FmtResult};

use rusty_money::iso::Currency;
use tracing::debug;

use crate::{
    cart::{self, Cart, CartError, CartKind, LineChange, MergeReport, UpdateOutcome},
    items::{CartItem, ItemRef, LineOptions},
    lines::{CartLine, ResolvedLine},
    money::{self, Amount},
    orders::OrderStatus,
    regions::RegionKey,
    shop::Shop,
    store::{
        Container, FavouritesId, LineId, LineRecord, OrderId, SavedCartId, StoreError, UserId,
    },
    vouchers::{self, Calculation},
};

/// A cart persisted in the store: a saved cart, an order or a favourites list.
pub struct StoredCart<'a> {
    shop: &'a Shop,
    container: Container,
    region: Option<RegionKey>,
}

impl Debug for StoredCart<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("StoredCart")
            .field("container", &self.container)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl<'a> StoredCart<'a> {
    /// Open a saved cart.
    pub fn saved_cart(shop: &'a Shop, id: SavedCartId, region: Option<RegionKey>) -> Self {
        Self {
            shop,
            container: Container::SavedCart(id),
            region,
        }
    }

    /// Open `user`'s saved cart, creating it if needed.
    pub fn for_user(shop: &'a Shop, user: UserId, region: Option<RegionKey>) -> Self {
        let mut tx = shop.store().begin();
        let id = tx.saved_cart_or_create(user, shop.clock().now());
        tx.commit();

        Self::saved_cart(shop, id, region)
    }

    /// Open an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the order doesn't exist.
    pub fn order(shop: &'a Shop, id: OrderId) -> Result<Self, CartError> {
        let region = shop.store().read().order(id)?.region;

        Ok(Self {
            shop,
            container: Container::Order(id),
            region,
        })
    }

    /// Open a favourites list.
    pub fn favourites(shop: &'a Shop, id: FavouritesId, region: Option<RegionKey>) -> Self {
        Self {
            shop,
            container: Container::Favourites(id),
            region,
        }
    }

    /// `user`'s most recent favourites list, creating one if they have none.
    pub fn default_favourites(shop: &'a Shop, user: UserId, region: Option<RegionKey>) -> Self {
        let mut tx = shop.store().begin();
        let id = match tx.favourites_for(user).first() {
            Some(list) => list.id,
            None => tx.insert_favourites(user, None, shop.clock().now()),
        };
        tx.commit();

        Self::favourites(shop, id, region)
    }

    /// Where this cart's lines live.
    pub fn container(&self) -> Container {
        self.container
    }

    /// Order id, if this cart is an order.
    pub fn order_id(&self) -> Option<OrderId> {
        match self.container {
            Container::Order(id) => Some(id),
            _ => None,
        }
    }

    /// Stored lines with their row ids, including stale ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the store can't be read.
    pub fn line_records(&self) -> Result<Vec<(LineId, LineRecord)>, CartError> {
        Ok(self
            .shop
            .store()
            .read()
            .lines(self.container)
            .map(|(id, line)| (id, line.clone()))
            .collect())
    }

    /// Fail if this is an order that has been paid.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::OrderLocked`] for paid orders.
    pub fn ensure_editable(&self) -> Result<(), CartError> {
        if let Container::Order(id) = self.container {
            if self.shop.store().read().order(id)?.status >= OrderStatus::Paid {
                return Err(CartError::OrderLocked(id));
            }
        }

        Ok(())
    }

    /// Replace a line's options, merging it into an existing line with the
    /// same item and options.
    ///
    /// # Errors
    ///
    /// Returns an error if the line or its item no longer exist, or the cart is
    /// a paid order.
    pub fn update_options(
        &mut self,
        line: LineId,
        options: &LineOptions,
    ) -> Result<UpdateOutcome, CartError> {
        self.ensure_editable()?;

        let record = self.shop.store().read().line(line)?.clone();

        if record.container != self.container {
            return Err(StoreError::not_found("line", line).into());
        }

        let item = record.line.item;
        let (resolved, options) = cart::prepare(self.shop, &item, options)?;

        let mut tx = self.shop.store().begin();
        let quantity = tx.line(line)?.line.quantity;

        match tx.find_line(self.container, &item, &options) {
            Some(existing) if existing == line => return Ok(UpdateOutcome::Unchanged),
            Some(existing) => {
                let merged = tx.line(existing)?.line.quantity.saturating_add(quantity);
                let errors = resolved.cart_errors(merged, &options);

                if !errors.is_empty() {
                    return Ok(UpdateOutcome::Rejected(errors));
                }

                let total = self.frozen_total(resolved.as_ref(), merged, &options)?;
                let record = tx.line_mut(existing)?;
                record.line.quantity = merged;
                record.total = total;
                tx.delete_line(line);
            }
            None => {
                let total = self.frozen_total(resolved.as_ref(), quantity, &options)?;
                let record = tx.line_mut(line)?;
                record.line.options = options;
                record.total = total;
            }
        }

        tx.commit();

        Ok(UpdateOutcome::Saved)
    }

    /// Copy this cart into `target`. A saved cart remembers the order it was
    /// last saved to.
    ///
    /// # Errors
    ///
    /// See [`cart::save_to`].
    pub fn save_to(&self, target: &mut StoredCart<'_>) -> Result<MergeReport, CartError> {
        let report = cart::save_to(self, target)?;

        if let (Container::SavedCart(id), Some(order)) = (self.container, target.order_id()) {
            let mut tx = self.shop.store().begin();
            tx.saved_cart_mut(id)?.order = Some(order);
            tx.commit();
        }

        Ok(report)
    }

    /// Order lines keep the total they were bought at.
    fn frozen_total(
        &self,
        item: &dyn CartItem,
        quantity: u32,
        options: &LineOptions,
    ) -> Result<Option<Amount>, CartError> {
        match self.container {
            Container::Order(_) => Ok(Some(item.line_total(quantity, options)?)),
            _ => Ok(None),
        }
    }

    /// Replace all lines with `lines`, which must already be validated and
    /// unique per item and options.
    pub(crate) fn replace_lines(&mut self, lines: &[ResolvedLine]) -> Result<(), CartError> {
        let now = self.shop.clock().now();
        let freeze = matches!(self.container, Container::Order(_));

        let mut tx = self.shop.store().begin();
        tx.delete_lines(self.container);

        for line in lines {
            tx.insert_line(LineRecord {
                container: self.container,
                line: line.line.clone(),
                total: freeze.then_some(line.total),
                description: freeze.then(|| line.description.clone()),
                created: now,
            })?;
        }

        tx.commit();

        Ok(())
    }
}

impl Cart for StoredCart<'_> {
    fn shop(&self) -> &Shop {
        self.shop
    }

    fn as_dyn(&self) -> &dyn Cart {
        self
    }

    fn kind(&self) -> CartKind {
        match self.container {
            Container::SavedCart(_) => CartKind::SavedCart,
            Container::Order(_) => CartKind::Order,
            Container::Favourites(_) => CartKind::Favourites,
        }
    }

    fn region_key(&self) -> Option<RegionKey> {
        self.region
    }

    fn currency(&self) -> &'static Currency {
        if let Container::Order(id) = self.container {
            if let Ok(order) = self.shop.store().read().order(id) {
                return order.currency;
            }
        }

        self.region()
            .map_or_else(|| self.shop.currency(), |region| region.currency)
    }

    fn lines(&self) -> Result<Vec<ResolvedLine>, CartError> {
        let mut lines = Vec::new();

        for (id, record) in self.line_records()? {
            let Some(item) = self.shop.items().resolve(&record.line.item) else {
                debug!(item = %record.line.item, "skipping stale line");
                continue;
            };

            let total = match record.total {
                Some(total) => total,
                None => item.line_total(record.line.quantity, &record.line.options)?,
            };

            lines.push(ResolvedLine {
                id: Some(id),
                total,
                description: record.description.unwrap_or_else(|| item.description()),
                line: record.line,
                item,
            });
        }

        Ok(lines)
    }

    fn raw_lines(&self) -> Result<Vec<CartLine>, CartError> {
        Ok(self
            .line_records()?
            .into_iter()
            .map(|(_, record)| record.line)
            .collect())
    }

    fn update_quantity(
        &mut self,
        item: &ItemRef,
        quantity: i64,
        add: bool,
        options: &LineOptions,
    ) -> Result<UpdateOutcome, CartError> {
        self.ensure_editable()?;

        let (resolved, options) = cart::prepare(self.shop, item, options)?;

        let mut tx = self.shop.store().begin();
        let existing = tx.find_line(self.container, item, &options);
        let current = existing
            .map(|id| tx.line(id).map(|record| record.line.quantity))
            .transpose()?;

        let outcome = match LineChange::plan(resolved.as_ref(), current, quantity, add, &options) {
            LineChange::Reject(errors) => return Ok(UpdateOutcome::Rejected(errors)),
            LineChange::Remove => match existing {
                Some(id) => {
                    tx.delete_line(id);
                    UpdateOutcome::Removed
                }
                None => return Ok(UpdateOutcome::Unchanged),
            },
            LineChange::Set(quantity) => {
                let total = self.frozen_total(resolved.as_ref(), quantity, &options)?;

                match existing {
                    Some(id) => {
                        let record = tx.line_mut(id)?;
                        record.line.quantity = quantity;
                        record.total = total;
                    }
                    None => {
                        let freeze = total.is_some();

                        tx.insert_line(LineRecord {
                            container: self.container,
                            line: CartLine::new(item.clone(), quantity, options),
                            total,
                            description: freeze.then(|| resolved.description()),
                            created: self.shop.clock().now(),
                        })?;
                    }
                }

                UpdateOutcome::Saved
            }
        };

        tx.commit();

        Ok(outcome)
    }

    fn clear(&mut self) -> Result<(), CartError> {
        self.ensure_editable()?;

        let mut tx = self.shop.store().begin();
        tx.delete_lines(self.container);
        tx.commit();

        Ok(())
    }

    fn shipping_option(&self) -> Result<Option<String>, CartError> {
        let store = self.shop.store().read();

        Ok(match self.container {
            Container::SavedCart(id) => store.saved_cart(id)?.shipping_option.clone(),
            Container::Order(id) => store.order(id)?.shipping_option.clone(),
            Container::Favourites(_) => None,
        })
    }

    fn set_shipping_option(&mut self, option: Option<String>) -> Result<(), CartError> {
        match self.container {
            Container::SavedCart(id) => {
                let mut tx = self.shop.store().begin();
                tx.saved_cart_mut(id)?.shipping_option = option;
                tx.commit();
            }
            Container::Order(id) => {
                self.ensure_editable()?;

                {
                    let mut tx = self.shop.store().begin();
                    tx.order_mut(id)?.shipping_option = option;
                    tx.commit();
                }

                // The strategy reads the option back through this cart.
                let cost = match self.shop.shipping() {
                    Some(strategy) => strategy.calculate(self)?,
                    None => money::zero(self.currency()),
                };

                let mut tx = self.shop.store().begin();
                tx.order_mut(id)?.shipping_cost = cost;
                tx.commit();
            }
            Container::Favourites(_) => {}
        }

        Ok(())
    }

    fn voucher_codes(&self) -> Result<Vec<String>, CartError> {
        let store = self.shop.store().read();

        Ok(match self.container {
            Container::SavedCart(id) => store.saved_cart(id)?.voucher_codes.clone(),
            Container::Order(id) => store
                .discounts_for(id)
                .map(|discount| discount.voucher.clone())
                .collect(),
            Container::Favourites(_) => Vec::new(),
        })
    }

    fn set_voucher_codes(&mut self, codes: Vec<String>) -> Result<(), CartError> {
        match self.container {
            Container::SavedCart(id) => {
                let mut tx = self.shop.store().begin();
                tx.saved_cart_mut(id)?.voucher_codes = codes;
                tx.commit();
            }
            Container::Order(id) => {
                self.ensure_editable()?;
                vouchers::save_discounts(self, id, &codes)?;
            }
            Container::Favourites(_) => {}
        }

        Ok(())
    }

    fn discount_scope(&self) -> Option<OrderId> {
        self.order_id()
    }

    fn shipping_cost(&self) -> Result<Amount, CartError> {
        match self.container {
            Container::Order(id) => Ok(self.shop.store().read().order(id)?.shipping_cost),
            Container::Favourites(_) => Ok(money::zero(self.currency())),
            Container::SavedCart(_) => match self.shop.shipping() {
                Some(strategy) => strategy.calculate(self),
                None => Ok(money::zero(self.currency())),
            },
        }
    }

    fn calculate_discounts(&self, include_shipping: bool) -> Result<Calculation, CartError> {
        match self.container {
            Container::Order(id) => Ok(vouchers::saved_discounts(self.shop, id)?),
            Container::Favourites(_) => Ok(Calculation::default()),
            Container::SavedCart(_) => match self.shop.vouchers() {
                Some(strategy) => strategy.calculate(self, &self.voucher_codes()?, include_shipping),
                None => Ok(Calculation::default()),
            },
        }
    }
}
