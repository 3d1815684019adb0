//! Store Records

use jiff::Timestamp;
use rusty_money::iso::Currency;
use serde::{Deserialize, Serialize};

use crate::{
    items::{ItemRef, LineOptions},
    lines::CartLine,
    money::{self, Amount},
    orders::{Address, OrderStatus},
    payments::{TransactionIntent, TransactionStatus},
    regions::RegionKey,
    session::SessionId,
    uuids::TypedUuid,
};

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

row_id!(
    /// Order number, assigned sequentially.
    OrderId
);
row_id!(
    /// Line row id. Ordered by insertion.
    LineId
);
row_id!(
    /// Saved cart row id.
    SavedCartId
);
row_id!(
    /// Favourites list row id.
    FavouritesId
);
row_id!(
    /// Discount row id.
    DiscountId
);

/// Marker for user ids.
#[derive(Debug)]
pub struct User;

/// Authenticated user id.
pub type UserId = TypedUuid<User>;

/// Marker for order secrets.
#[derive(Debug)]
pub struct OrderAccess;

/// Unguessable order secret for anonymous access.
pub type OrderSecret = TypedUuid<OrderAccess>;

/// Marker for transaction ids.
#[derive(Debug)]
pub struct Payment;

/// Payment transaction id.
pub type TransactionId = TypedUuid<Payment>;

/// The stored cart a line belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Container {
    /// A user's saved cart.
    SavedCart(SavedCartId),

    /// An order.
    Order(OrderId),

    /// A favourites list.
    Favourites(FavouritesId),
}

/// A persisted order.
#[derive(Clone, Debug)]
pub struct OrderRecord {
    /// Order number.
    pub id: OrderId,

    /// Secret for anonymous access.
    pub secret: OrderSecret,

    /// Buyer, if logged in.
    pub user: Option<UserId>,

    /// Session the order was checked out from.
    pub session: Option<SessionId>,

    /// Currency the order is priced in.
    pub currency: &'static Currency,

    /// Region the order ships to.
    pub region: Option<RegionKey>,

    /// Lifecycle status.
    pub status: OrderStatus,

    /// Total paid so far.
    pub amount_paid: Amount,

    /// Created at.
    pub created: Timestamp,

    /// When the order was fully paid.
    pub checkout_completed: Option<Timestamp>,

    /// When the dispatch email was sent. Set at most once.
    pub dispatched: Option<Timestamp>,

    /// Selected shipping option.
    pub shipping_option: Option<String>,

    /// Shipping cost computed when the option was set.
    pub shipping_cost: Amount,

    /// Shipping address.
    pub shipping_address: Option<Address>,

    /// Billing address, when different from shipping.
    pub billing_address: Option<Address>,

    /// Delivery notes.
    pub delivery_notes: String,

    /// Gift message.
    pub gift_message: String,
}

impl OrderRecord {
    /// New unpaid order.
    pub fn new(id: OrderId, currency: &'static Currency, created: Timestamp) -> Self {
        Self {
            id,
            secret: OrderSecret::random(),
            user: None,
            session: None,
            currency,
            region: None,
            status: OrderStatus::New,
            amount_paid: money::zero(currency),
            created,
            checkout_completed: None,
            dispatched: None,
            shipping_option: None,
            shipping_cost: money::zero(currency),
            shipping_address: None,
            billing_address: None,
            delivery_notes: String::new(),
            gift_message: String::new(),
        }
    }
}

/// A persisted line.
#[derive(Clone, Debug)]
pub struct LineRecord {
    /// Owning cart.
    pub container: Container,

    /// Item, quantity and options.
    pub line: CartLine,

    /// Frozen total, order lines only.
    pub total: Option<Amount>,

    /// Frozen description, order lines only.
    pub description: Option<String>,

    /// Created at.
    pub created: Timestamp,
}

impl LineRecord {
    /// Whether this is the line for `item` with `options` in `container`.
    pub fn matches(&self, container: Container, item: &ItemRef, options: &LineOptions) -> bool {
        self.container == container && self.line.matches(item, options)
    }
}

/// A user's saved cart.
#[derive(Clone, Debug)]
pub struct SavedCartRecord {
    /// Row id.
    pub id: SavedCartId,

    /// Owner.
    pub user: UserId,

    /// Created at.
    pub created: Timestamp,

    /// Selected shipping option.
    pub shipping_option: Option<String>,

    /// Entered voucher codes.
    pub voucher_codes: Vec<String>,

    /// Order this cart was last saved to.
    pub order: Option<OrderId>,
}

/// A user's favourites list.
#[derive(Clone, Debug)]
pub struct FavouritesRecord {
    /// Row id.
    pub id: FavouritesId,

    /// Owner.
    pub user: UserId,

    /// Optional list name.
    pub name: Option<String>,

    /// Created at.
    pub created: Timestamp,
}

/// A voucher applied to an order.
#[derive(Clone, Debug, PartialEq)]
pub struct DiscountRecord {
    /// Row id.
    pub id: DiscountId,

    /// Order the discount was redeemed on.
    pub order: OrderId,

    /// Voucher code.
    pub voucher: String,

    /// Amount taken off.
    pub amount: Amount,
}

/// A payment attempt.
#[derive(Clone, Debug)]
pub struct TransactionRecord {
    /// Transaction id.
    pub id: TransactionId,

    /// Order being paid.
    pub order: OrderId,

    /// Payment intent.
    pub intent: TransactionIntent,

    /// Status.
    pub status: TransactionStatus,

    /// Amount requested.
    pub amount: Amount,

    /// Gateway reference.
    pub reference: Option<String>,

    /// Created at.
    pub created: Timestamp,

    /// Completed at.
    pub completed: Option<Timestamp>,
}
