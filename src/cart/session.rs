//! Session Carts

use std::fmt::{Debug, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

use crate::{
    cart::{self, Cart, CartError, CartKind, LineChange, MergeReport, StoredCart, UpdateOutcome},
    items::{ItemRef, LineOptions},
    lines::{CartLine, ResolvedLine},
    regions::RegionKey,
    session::{Session, SessionId},
    shop::Shop,
    store::{OrderId, UserId},
};

/// What a session cart keeps in the session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCartData {
    /// Lines in the order they were added.
    #[serde(default)]
    pub lines: Vec<CartLine>,

    /// Entered voucher codes.
    #[serde(default)]
    pub vouchers: Vec<String>,

    /// Selected shipping option.
    #[serde(default)]
    pub shipping_option: Option<String>,

    /// Order this cart was last saved to.
    #[serde(default)]
    pub order: Option<OrderId>,
}

/// A cart kept in the visitor's session.
///
/// Every change is written straight back to the session.
pub struct SessionCart<'a> {
    shop: &'a Shop,
    session: &'a mut Session,
    key: String,
    kind: CartKind,
    data: SessionCartData,
}

impl Debug for SessionCart<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("SessionCart")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

impl<'a> SessionCart<'a> {
    /// The session's shopping cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Session`] if the stored data is malformed.
    pub fn load(shop: &'a Shop, session: &'a mut Session) -> Result<Self, CartError> {
        let key = shop.config().cart_session_key.clone();

        Self::open(shop, session, key, CartKind::Session)
    }

    /// The session's favourites list.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Session`] if the stored data is malformed.
    pub fn favourites(shop: &'a Shop, session: &'a mut Session) -> Result<Self, CartError> {
        let key = shop.config().favourites_session_key.clone();

        Self::open(shop, session, key, CartKind::SessionFavourites)
    }

    fn open(
        shop: &'a Shop,
        session: &'a mut Session,
        key: String,
        kind: CartKind,
    ) -> Result<Self, CartError> {
        let data = session.get(&key)?.unwrap_or_default();

        Ok(Self {
            shop,
            session,
            key,
            kind,
            data,
        })
    }

    fn save(&mut self) -> Result<(), CartError> {
        self.session.set(&self.key, &self.data)?;

        Ok(())
    }

    /// Raw session data.
    pub fn data(&self) -> &SessionCartData {
        &self.data
    }

    /// Id of the owning session.
    pub fn session_id(&self) -> SessionId {
        self.session.id()
    }

    /// Logged in user, if any.
    pub fn user(&self) -> Option<UserId> {
        self.session.user()
    }

    /// Order this cart was last saved to.
    pub fn order(&self) -> Option<OrderId> {
        self.data.order
    }

    /// Remove everything, including the link to the last order.
    pub fn reset(&mut self) {
        self.data = SessionCartData::default();
        self.session.remove(&self.key);
    }

    /// Copy this cart into `target`, then empty this cart's lines.
    ///
    /// The session remembers the order it was saved to, and the order
    /// remembers the session, so checking out again re-uses the same order.
    ///
    /// # Errors
    ///
    /// See [`cart::save_to`].
    pub fn save_to(&mut self, target: &mut StoredCart<'_>) -> Result<MergeReport, CartError> {
        let report = cart::save_to(&*self, target)?;

        if let Some(order) = target.order_id() {
            let mut tx = self.shop.store().begin();
            tx.order_mut(order)?.session = Some(self.session.id());
            tx.commit();

            self.data.order = Some(order);
        }

        self.data.lines.clear();
        self.save()?;

        Ok(report)
    }
}

impl Cart for SessionCart<'_> {
    fn shop(&self) -> &Shop {
        self.shop
    }

    fn as_dyn(&self) -> &dyn Cart {
        self
    }

    fn kind(&self) -> CartKind {
        self.kind
    }

    fn region_key(&self) -> Option<RegionKey> {
        self.session.region()
    }

    fn lines(&self) -> Result<Vec<ResolvedLine>, CartError> {
        let mut lines = Vec::with_capacity(self.data.lines.len());

        for line in &self.data.lines {
            if let Some(resolved) = cart::resolve_line(self.shop, line)? {
                lines.push(resolved);
            }
        }

        Ok(lines)
    }

    fn raw_lines(&self) -> Result<Vec<CartLine>, CartError> {
        Ok(self.data.lines.clone())
    }

    fn update_quantity(
        &mut self,
        item: &ItemRef,
        quantity: i64,
        add: bool,
        options: &LineOptions,
    ) -> Result<UpdateOutcome, CartError> {
        let (resolved, options) = cart::prepare(self.shop, item, options)?;

        let index = self
            .data
            .lines
            .iter()
            .position(|line| line.matches(item, &options));
        let current = index
            .and_then(|index| self.data.lines.get(index))
            .map(|line| line.quantity);

        match LineChange::plan(resolved.as_ref(), current, quantity, add, &options) {
            LineChange::Reject(errors) => Ok(UpdateOutcome::Rejected(errors)),
            LineChange::Remove => {
                let Some(index) = index else {
                    return Ok(UpdateOutcome::Unchanged);
                };

                self.data.lines.remove(index);
                self.save()?;

                Ok(UpdateOutcome::Removed)
            }
            LineChange::Set(quantity) => {
                match index.and_then(|index| self.data.lines.get_mut(index)) {
                    Some(line) => line.quantity = quantity,
                    None => self
                        .data
                        .lines
                        .push(CartLine::new(item.clone(), quantity, options)),
                }

                self.save()?;

                Ok(UpdateOutcome::Saved)
            }
        }
    }

    fn clear(&mut self) -> Result<(), CartError> {
        self.data.lines.clear();
        self.data.vouchers.clear();
        self.data.shipping_option = None;

        self.save()
    }

    fn shipping_option(&self) -> Result<Option<String>, CartError> {
        Ok(self.data.shipping_option.clone())
    }

    fn set_shipping_option(&mut self, option: Option<String>) -> Result<(), CartError> {
        self.data.shipping_option = option;

        self.save()
    }

    fn voucher_codes(&self) -> Result<Vec<String>, CartError> {
        Ok(self.data.vouchers.clone())
    }

    fn set_voucher_codes(&mut self, codes: Vec<String>) -> Result<(), CartError> {
        self.data.vouchers = codes;

        self.save()
    }

    fn discount_scope(&self) -> Option<OrderId> {
        let order = self.data.order?;
        let store = self.shop.store().read();

        store
            .order(order)
            .ok()
            .filter(|record| record.amount_paid.is_zero())
            .map(|_| order)
    }
}
