//! Store
//!
//! In-memory relational store. All tables live behind one mutex; a
//! [`StoreTx`] holds the lock for its whole lifetime and rolls back on drop
//! unless committed, so compound operations (replace an order's lines, validate
//! and insert discounts) are atomic with respect to other threads.
//!
//! Guarded updates return the number of rows they affected. Callers treat `0`
//! as "somebody else got there first".

use std::{
    collections::BTreeMap,
    ops::{Deref, DerefMut},
    sync::{Mutex, MutexGuard, PoisonError},
};

use jiff::Timestamp;
use rusty_money::iso::Currency;
use thiserror::Error;

use crate::{
    items::{ItemRef, LineOptions},
    money::{self, Amount, PriceError},
    payments::TransactionStatus,
    vouchers::Voucher,
};

mod records;

pub use records::{
    Container, DiscountId, DiscountRecord, FavouritesId, FavouritesRecord, LineId, LineRecord,
    OrderAccess, OrderId, OrderRecord, OrderSecret, Payment, SavedCartId, SavedCartRecord,
    TransactionId, TransactionRecord, User, UserId,
};

/// Store errors.
#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    /// Row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Table name.
        entity: &'static str,
        /// Row id.
        id: String,
    },

    /// Unique constraint violated.
    #[error("duplicate {entity}: {key}")]
    Duplicate {
        /// Table name.
        entity: &'static str,
        /// Conflicting key.
        key: String,
    },

    /// Amount arithmetic failed.
    #[error(transparent)]
    Price(#[from] PriceError),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Voucher usage outside of a given order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoucherUsage {
    /// Number of discounts using the voucher.
    pub uses: u32,

    /// Total redeemed, in minor units.
    pub redeemed: i64,
}

/// A container's lines, shipping and discounts as they were before a save.
///
/// Taken with [`Tables::snapshot`] and put back with [`Tables::restore`] when
/// a multi-step save fails part way.
#[derive(Clone, Debug)]
pub struct ContainerSnapshot {
    container: Container,
    lines: Vec<(LineId, LineRecord)>,
    order_shipping: Option<(Option<String>, Amount)>,
    saved_cart: Option<(Option<String>, Vec<String>)>,
    discounts: Vec<DiscountRecord>,
}

/// All tables.
#[derive(Clone, Debug, Default)]
pub struct Tables {
    next_id: u64,
    orders: BTreeMap<OrderId, OrderRecord>,
    lines: BTreeMap<LineId, LineRecord>,
    saved_carts: BTreeMap<SavedCartId, SavedCartRecord>,
    favourites: BTreeMap<FavouritesId, FavouritesRecord>,
    vouchers: BTreeMap<String, Voucher>,
    discounts: BTreeMap<DiscountId, DiscountRecord>,
    transactions: BTreeMap<TransactionId, TransactionRecord>,
}

/// The shop's persistent state.
#[derive(Debug, Default)]
pub struct Store {
    tables: Mutex<Tables>,
}

impl Store {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the tables for reading.
    pub fn read(&self) -> StoreRead<'_> {
        StoreRead {
            tables: self.lock(),
        }
    }

    /// Start a transaction. Changes are discarded unless [`StoreTx::commit`] is called.
    pub fn begin(&self) -> StoreTx<'_> {
        let tables = self.lock();
        let snapshot = Some(tables.clone());

        StoreTx { tables, snapshot }
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read-only view of the tables.
#[derive(Debug)]
pub struct StoreRead<'s> {
    tables: MutexGuard<'s, Tables>,
}

impl Deref for StoreRead<'_> {
    type Target = Tables;

    fn deref(&self) -> &Self::Target {
        &self.tables
    }
}

/// A store transaction.
#[derive(Debug)]
pub struct StoreTx<'s> {
    tables: MutexGuard<'s, Tables>,
    snapshot: Option<Tables>,
}

impl StoreTx<'_> {
    /// Keep the changes made in this transaction.
    pub fn commit(mut self) {
        self.snapshot = None;
    }
}

impl Drop for StoreTx<'_> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.tables = snapshot;
        }
    }
}

impl Deref for StoreTx<'_> {
    type Target = Tables;

    fn deref(&self) -> &Self::Target {
        &self.tables
    }
}

impl DerefMut for StoreTx<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.tables
    }
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    // Orders

    /// Insert a new order with the next order number.
    pub fn insert_order(&mut self, currency: &'static Currency, now: Timestamp) -> OrderId {
        let id = OrderId(self.next_id());

        self.orders.insert(id, OrderRecord::new(id, currency, now));

        id
    }

    /// Look up an order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if there is no such order.
    pub fn order(&self, id: OrderId) -> Result<&OrderRecord, StoreError> {
        self.orders
            .get(&id)
            .ok_or_else(|| StoreError::not_found("order", id))
    }

    /// Look up an order for update.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if there is no such order.
    pub fn order_mut(&mut self, id: OrderId) -> Result<&mut OrderRecord, StoreError> {
        self.orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("order", id))
    }

    /// Delete an order with its lines and discounts. Returns rows affected.
    pub fn delete_order(&mut self, id: OrderId) -> u64 {
        self.delete_lines(Container::Order(id));
        self.delete_discounts(id);

        u64::from(self.orders.remove(&id).is_some())
    }

    /// All orders, oldest first.
    pub fn orders(&self) -> impl Iterator<Item = &OrderRecord> {
        self.orders.values()
    }

    /// Find an order by its secret.
    pub fn order_by_secret(&self, secret: OrderSecret) -> Option<&OrderRecord> {
        self.orders.values().find(|order| order.secret == secret)
    }

    /// Set `dispatched` if it is still unset. Returns rows affected.
    pub fn mark_dispatched(&mut self, id: OrderId, now: Timestamp) -> u64 {
        match self.orders.get_mut(&id) {
            Some(order) if order.dispatched.is_none() => {
                order.dispatched = Some(now);
                1
            }
            _ => 0,
        }
    }

    /// Add `amount` to an order's `amount_paid`.
    ///
    /// # Errors
    ///
    /// Returns an error if the order doesn't exist or the currency differs.
    pub fn record_payment(&mut self, id: OrderId, amount: &Amount) -> Result<Amount, StoreError> {
        let order = self.order_mut(id)?;
        let paid = money::sum([&order.amount_paid, amount], order.currency)?;

        order.amount_paid = paid;

        Ok(paid)
    }

    // Lines

    /// Lines of a container in insertion order.
    pub fn lines(&self, container: Container) -> impl Iterator<Item = (LineId, &LineRecord)> {
        self.lines
            .iter()
            .filter(move |(_, line)| line.container == container)
            .map(|(id, line)| (*id, line))
    }

    /// Look up a line.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if there is no such line.
    pub fn line(&self, id: LineId) -> Result<&LineRecord, StoreError> {
        self.lines
            .get(&id)
            .ok_or_else(|| StoreError::not_found("line", id))
    }

    /// Look up a line for update.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if there is no such line.
    pub fn line_mut(&mut self, id: LineId) -> Result<&mut LineRecord, StoreError> {
        self.lines
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("line", id))
    }

    /// The line for `item` with `options` in `container`.
    pub fn find_line(
        &self,
        container: Container,
        item: &ItemRef,
        options: &LineOptions,
    ) -> Option<LineId> {
        self.lines
            .iter()
            .find(|(_, line)| line.matches(container, item, options))
            .map(|(id, _)| *id)
    }

    /// Insert a line.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] if the container already has a line for
    /// the same item and options.
    pub fn insert_line(&mut self, record: LineRecord) -> Result<LineId, StoreError> {
        if self
            .find_line(record.container, &record.line.item, &record.line.options)
            .is_some()
        {
            return Err(StoreError::Duplicate {
                entity: "line",
                key: record.line.item.to_string(),
            });
        }

        let id = LineId(self.next_id());
        self.lines.insert(id, record);

        Ok(id)
    }

    /// Delete a line. Returns rows affected.
    pub fn delete_line(&mut self, id: LineId) -> u64 {
        u64::from(self.lines.remove(&id).is_some())
    }

    /// Delete all lines of a container. Returns rows affected.
    pub fn delete_lines(&mut self, container: Container) -> u64 {
        let before = self.lines.len();
        self.lines.retain(|_, line| line.container != container);

        (before - self.lines.len()) as u64
    }

    /// Subtract `quantity` from a line if it has at least that many. Returns rows affected.
    pub fn decrement_line(&mut self, id: LineId, quantity: u32) -> u64 {
        match self.lines.get_mut(&id) {
            Some(line) if line.line.quantity >= quantity => {
                line.line.quantity -= quantity;
                1
            }
            _ => 0,
        }
    }

    // Snapshots

    /// Capture the rows a cart save rewrites.
    pub fn snapshot(&self, container: Container) -> ContainerSnapshot {
        let (order_shipping, discounts) = match container {
            Container::Order(id) => (
                self.orders
                    .get(&id)
                    .map(|order| (order.shipping_option.clone(), order.shipping_cost)),
                self.discounts_for(id).cloned().collect(),
            ),
            _ => (None, Vec::new()),
        };

        let saved_cart = match container {
            Container::SavedCart(id) => self
                .saved_carts
                .get(&id)
                .map(|cart| (cart.shipping_option.clone(), cart.voucher_codes.clone())),
            _ => None,
        };

        ContainerSnapshot {
            container,
            lines: self
                .lines(container)
                .map(|(id, line)| (id, line.clone()))
                .collect(),
            order_shipping,
            saved_cart,
            discounts,
        }
    }

    /// Put a container back the way [`Tables::snapshot`] found it.
    pub fn restore(&mut self, snapshot: ContainerSnapshot) {
        let ContainerSnapshot {
            container,
            lines,
            order_shipping,
            saved_cart,
            discounts,
        } = snapshot;

        self.delete_lines(container);
        self.lines.extend(lines);

        match container {
            Container::Order(id) => {
                self.delete_discounts(id);
                self.discounts
                    .extend(discounts.into_iter().map(|discount| (discount.id, discount)));

                if let (Some(order), Some((option, cost))) =
                    (self.orders.get_mut(&id), order_shipping)
                {
                    order.shipping_option = option;
                    order.shipping_cost = cost;
                }
            }
            Container::SavedCart(id) => {
                if let (Some(cart), Some((option, codes))) =
                    (self.saved_carts.get_mut(&id), saved_cart)
                {
                    cart.shipping_option = option;
                    cart.voucher_codes = codes;
                }
            }
            Container::Favourites(_) => {}
        }
    }

    // Saved carts

    /// The saved cart belonging to `user`.
    pub fn saved_cart_for(&self, user: UserId) -> Option<&SavedCartRecord> {
        self.saved_carts.values().find(|cart| cart.user == user)
    }

    /// The saved cart belonging to `user`, created if missing.
    pub fn saved_cart_or_create(&mut self, user: UserId, now: Timestamp) -> SavedCartId {
        if let Some(cart) = self.saved_cart_for(user) {
            return cart.id;
        }

        let id = SavedCartId(self.next_id());

        self.saved_carts.insert(
            id,
            SavedCartRecord {
                id,
                user,
                created: now,
                shipping_option: None,
                voucher_codes: Vec::new(),
                order: None,
            },
        );

        id
    }

    /// Look up a saved cart.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if there is no such saved cart.
    pub fn saved_cart(&self, id: SavedCartId) -> Result<&SavedCartRecord, StoreError> {
        self.saved_carts
            .get(&id)
            .ok_or_else(|| StoreError::not_found("saved cart", id))
    }

    /// Look up a saved cart for update.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if there is no such saved cart.
    pub fn saved_cart_mut(&mut self, id: SavedCartId) -> Result<&mut SavedCartRecord, StoreError> {
        self.saved_carts
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("saved cart", id))
    }

    /// Delete saved carts created before `cutoff`, with their lines. Returns carts deleted.
    pub fn remove_saved_carts(&mut self, cutoff: Timestamp) -> usize {
        let stale: Vec<SavedCartId> = self
            .saved_carts
            .values()
            .filter(|cart| cart.created < cutoff)
            .map(|cart| cart.id)
            .collect();

        for id in &stale {
            self.saved_carts.remove(id);
            self.delete_lines(Container::SavedCart(*id));
        }

        stale.len()
    }

    /// Delete every saved cart line. Returns lines deleted.
    pub fn clear_saved_carts(&mut self) -> u64 {
        let before = self.lines.len();
        self.lines
            .retain(|_, line| !matches!(line.container, Container::SavedCart(_)));

        (before - self.lines.len()) as u64
    }

    // Favourites

    /// Favourites lists belonging to `user`, most recent first.
    pub fn favourites_for(&self, user: UserId) -> Vec<&FavouritesRecord> {
        let mut lists: Vec<&FavouritesRecord> = self
            .favourites
            .values()
            .filter(|list| list.user == user)
            .collect();

        lists.sort_by(|a, b| b.created.cmp(&a.created).then(b.id.cmp(&a.id)));

        lists
    }

    /// Create a favourites list.
    pub fn insert_favourites(
        &mut self,
        user: UserId,
        name: Option<String>,
        now: Timestamp,
    ) -> FavouritesId {
        let id = FavouritesId(self.next_id());

        self.favourites.insert(
            id,
            FavouritesRecord {
                id,
                user,
                name,
                created: now,
            },
        );

        id
    }

    /// Look up a favourites list.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if there is no such list.
    pub fn favourites(&self, id: FavouritesId) -> Result<&FavouritesRecord, StoreError> {
        self.favourites
            .get(&id)
            .ok_or_else(|| StoreError::not_found("favourites", id))
    }

    // Vouchers

    /// Insert a voucher.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] if the code is taken.
    pub fn insert_voucher(&mut self, voucher: Voucher) -> Result<(), StoreError> {
        if self.vouchers.contains_key(&voucher.code) {
            return Err(StoreError::Duplicate {
                entity: "voucher",
                key: voucher.code,
            });
        }

        self.vouchers.insert(voucher.code.clone(), voucher);

        Ok(())
    }

    /// Look up a voucher by normalised code.
    pub fn voucher(&self, code: &str) -> Option<&Voucher> {
        self.vouchers.get(code)
    }

    /// Discounts redeemed with `code`, ignoring those on `excluding`.
    pub fn voucher_usage(&self, code: &str, excluding: Option<OrderId>) -> VoucherUsage {
        self.discounts
            .values()
            .filter(|discount| discount.voucher == code && Some(discount.order) != excluding)
            .fold(VoucherUsage { uses: 0, redeemed: 0 }, |usage, discount| {
                VoucherUsage {
                    uses: usage.uses.saturating_add(1),
                    redeemed: usage
                        .redeemed
                        .saturating_add(discount.amount.to_minor_units()),
                }
            })
    }

    // Discounts

    /// Discounts saved against an order.
    pub fn discounts_for(&self, order: OrderId) -> impl Iterator<Item = &DiscountRecord> {
        self.discounts
            .values()
            .filter(move |discount| discount.order == order)
    }

    /// Delete all discounts on an order. Returns rows affected.
    pub fn delete_discounts(&mut self, order: OrderId) -> u64 {
        let before = self.discounts.len();
        self.discounts.retain(|_, discount| discount.order != order);

        (before - self.discounts.len()) as u64
    }

    /// Insert a discount.
    pub fn insert_discount(&mut self, order: OrderId, voucher: String, amount: Amount) -> DiscountId {
        let id = DiscountId(self.next_id());

        self.discounts.insert(
            id,
            DiscountRecord {
                id,
                order,
                voucher,
                amount,
            },
        );

        id
    }

    // Transactions

    /// Insert a transaction.
    pub fn insert_transaction(&mut self, record: TransactionRecord) -> TransactionId {
        let id = record.id;
        self.transactions.insert(id, record);

        id
    }

    /// Look up a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if there is no such transaction.
    pub fn transaction(&self, id: TransactionId) -> Result<&TransactionRecord, StoreError> {
        self.transactions
            .get(&id)
            .ok_or_else(|| StoreError::not_found("transaction", id))
    }

    /// Move a transaction from `Pending` to `Created` once the gateway has
    /// accepted it. Returns rows affected.
    pub fn activate_transaction(&mut self, id: TransactionId, reference: String) -> u64 {
        match self.transactions.get_mut(&id) {
            Some(transaction) if transaction.status == TransactionStatus::Pending => {
                transaction.status = TransactionStatus::Created;
                transaction.reference = Some(reference);
                1
            }
            _ => 0,
        }
    }

    /// Move a transaction from `Created` to `status`. Returns rows affected.
    pub fn complete_transaction(
        &mut self,
        id: TransactionId,
        status: TransactionStatus,
        now: Timestamp,
    ) -> u64 {
        match self.transactions.get_mut(&id) {
            Some(transaction) if transaction.status == TransactionStatus::Created => {
                transaction.status = status;
                transaction.completed = Some(now);
                1
            }
            _ => 0,
        }
    }

    /// Transactions for an order, oldest first.
    pub fn transactions_for(&self, order: OrderId) -> Vec<&TransactionRecord> {
        let mut transactions: Vec<&TransactionRecord> = self
            .transactions
            .values()
            .filter(|transaction| transaction.order == order)
            .collect();

        transactions.sort_by_key(|transaction| transaction.created);

        transactions
    }
}
