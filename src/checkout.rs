//! Checkout
//!
//! Turns a session cart into an order and starts payment. Checking out the
//! same session twice re-uses the order from the first attempt until it has
//! been paid.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    cart::{Cart, CartError, SessionCart, StoredCart},
    money::Amount,
    orders::{self, Address, OrderStatus},
    payments::{self, GatewayRedirect, PaymentError, TransactionIntent},
    shop::Shop,
    store::{OrderId, OrderRecord, TransactionId, UserId},
};

/// Reported when checking out with nothing in the cart.
pub const EMPTY_CART: &str = "Your cart is empty";

/// Checkout errors.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart is empty or has problems.
    #[error("cart can't be checked out: {}", .0.join("; "))]
    InvalidCart(Vec<String>),

    /// No shipping address was given.
    #[error("a shipping address is required")]
    MissingShippingAddress,

    /// The shipping strategy doesn't ship to the address's country.
    #[error("we don't ship to {0}")]
    CountryUnavailable(String),

    /// Cart or order error.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// Payment couldn't be started.
    #[error(transparent)]
    Payment(#[from] PaymentError),
}

/// Customer details collected at checkout.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckoutDetails {
    /// Buyer, when not the session's user.
    pub user: Option<UserId>,

    /// Where to ship. Required.
    pub shipping_address: Option<Address>,

    /// Where to bill, `None` to bill the shipping address.
    pub billing_address: Option<Address>,

    /// Delivery instructions.
    pub delivery_notes: String,

    /// Gift message.
    pub gift_message: String,
}

/// How checkout ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckoutOutcome {
    /// Nothing was due; the order is paid.
    Completed {
        /// The order.
        order: OrderId,
    },

    /// The customer has to pay.
    PaymentRequired {
        /// The order.
        order: OrderId,

        /// Transaction to confirm once the customer has paid.
        transaction: TransactionId,

        /// Where to send the customer.
        redirect: GatewayRedirect,

        /// Amount being charged, in minor units.
        amount_due: i64,
    },

    /// Payment is due but the shop has no gateway; the order is marked as
    /// failed payment.
    PaymentUnavailable {
        /// The order.
        order: OrderId,
    },

    /// The order had already been paid.
    AlreadyPaid {
        /// The order.
        order: OrderId,
    },
}

impl CheckoutOutcome {
    /// Order the checkout was for.
    pub fn order(&self) -> OrderId {
        match self {
            Self::Completed { order }
            | Self::PaymentRequired { order, .. }
            | Self::PaymentUnavailable { order }
            | Self::AlreadyPaid { order } => *order,
        }
    }
}

/// Check out `cart`, into `order` if given or the session's unpaid order if
/// there is one, otherwise into a new order.
///
/// When the session cart is empty but the re-used order still has lines, the
/// order's own lines are checked out. Otherwise the cart's lines replace the
/// order's.
///
/// # Errors
///
/// - [`CheckoutError::InvalidCart`]: nothing to check out, or the cart has
///   errors.
/// - [`CheckoutError::MissingShippingAddress`]: no shipping address.
/// - [`CheckoutError::CountryUnavailable`]: can't ship to the address.
/// - [`CheckoutError::Payment`]: the gateway rejected the payment.
#[tracing::instrument(skip_all, fields(session = %cart.session_id(), order = ?order))]
pub fn checkout(
    shop: &Shop,
    cart: &mut SessionCart<'_>,
    order: Option<OrderId>,
    details: CheckoutDetails,
) -> Result<CheckoutOutcome, CheckoutError> {
    let order = order.or_else(|| linked_order(shop, cart));

    if let Some(id) = order {
        let status = shop.store().read().order(id).map_err(CartError::from)?.status;

        if status >= OrderStatus::Paid {
            if cart.order() == Some(id) {
                cart.reset();
            }

            debug!(%id, "order already paid");
            return Ok(CheckoutOutcome::AlreadyPaid { order: id });
        }
    }

    let from_order = match order {
        Some(id) if cart.is_empty()? => Some(StoredCart::order(shop, id)?),
        _ => None,
    };

    let source: &dyn Cart = match &from_order {
        Some(existing) => existing,
        None => &*cart,
    };

    if source.is_empty()? {
        return Err(CheckoutError::InvalidCart(vec![EMPTY_CART.to_string()]));
    }

    let errors = source.errors()?;
    if !errors.is_empty() {
        return Err(CheckoutError::InvalidCart(errors));
    }

    let shipping_address = details
        .shipping_address
        .ok_or(CheckoutError::MissingShippingAddress)?;

    if let Some(countries) = shop
        .shipping()
        .and_then(|strategy| strategy.available_countries(source))
    {
        if !countries
            .iter()
            .any(|country| country.code.eq_ignore_ascii_case(&shipping_address.country))
        {
            return Err(CheckoutError::CountryUnavailable(shipping_address.country));
        }
    }

    let currency = source.currency();
    let region = source.region_key();
    let user = details.user.or_else(|| cart.user());
    let copy_cart = from_order.is_none();

    let (id, previous) = {
        let mut tx = shop.store().begin();
        let id = match order {
            Some(id) => id,
            None => tx.insert_order(currency, shop.clock().now()),
        };

        let record = tx.order_mut(id).map_err(CartError::from)?;
        let previous = order.map(|_| record.clone());
        record.currency = currency;
        record.region = region;
        record.user = user;
        record.billing_address = details
            .billing_address
            .filter(|billing| *billing != shipping_address);
        record.shipping_address = Some(shipping_address);
        record.delivery_notes = details.delivery_notes;
        record.gift_message = details.gift_message;
        tx.commit();

        (id, previous)
    };

    if copy_cart {
        let mut target = StoredCart::order(shop, id)?;

        match cart.save_to(&mut target) {
            Ok(report) if !report.is_complete() => {
                info!(%id, dropped = report.dropped.len(), "lines dropped at checkout");
            }
            Ok(_) => {}
            Err(err) => {
                discard_details(shop, id, previous);
                return Err(err.into());
            }
        }
    }

    let due = orders::amount_due(shop, id)?;

    if due.is_zero() {
        orders::transaction_succeeded(shop, id, None)?;

        return Ok(CheckoutOutcome::Completed { order: id });
    }

    if shop.gateway().is_none() {
        orders::transaction_failed(shop, id)?;

        return Ok(CheckoutOutcome::PaymentUnavailable { order: id });
    }

    let start = payments::start_payment(shop, id, TransactionIntent::Sale)?;

    info!(%id, due = %due, "checkout awaiting payment");

    Ok(payment_required(id, start.transaction, start.redirect, &due))
}

/// Undo the order details written by a checkout whose cart couldn't be saved.
/// An order created for that checkout is deleted outright.
fn discard_details(shop: &Shop, id: OrderId, previous: Option<OrderRecord>) {
    let mut tx = shop.store().begin();

    match previous {
        Some(previous) => {
            if let Ok(record) = tx.order_mut(id) {
                record.currency = previous.currency;
                record.region = previous.region;
                record.user = previous.user;
                record.billing_address = previous.billing_address;
                record.shipping_address = previous.shipping_address;
                record.delivery_notes = previous.delivery_notes;
                record.gift_message = previous.gift_message;
            }
        }
        None => {
            tx.delete_order(id);
            debug!(%id, "discarded new order");
        }
    }

    tx.commit();
}

fn payment_required(
    order: OrderId,
    transaction: TransactionId,
    redirect: GatewayRedirect,
    due: &Amount,
) -> CheckoutOutcome {
    CheckoutOutcome::PaymentRequired {
        order,
        transaction,
        redirect,
        amount_due: due.to_minor_units(),
    }
}

/// The session's last order, while it is unpaid.
fn linked_order(shop: &Shop, cart: &SessionCart<'_>) -> Option<OrderId> {
    let id = cart.order()?;
    let store = shop.store().read();

    store
        .order(id)
        .ok()
        .filter(|record| record.status < OrderStatus::Paid)
        .map(|_| id)
}
