//! Orders
//!
//! An order is a stored cart that has been through checkout. Payment results
//! move it from `New` to `Paid` or `PaymentFailed`, shipping moves it to
//! `Shipped`. Receipt and dispatch emails go out through the shop's
//! [`Mailer`].

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    cart::{Cart, CartError, StoredCart},
    lines::ResolvedLine,
    money::{self, Amount, PriceError},
    shop::Shop,
    store::{Container, OrderId, UserId},
};

/// Order lifecycle status. Ordered by progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum OrderStatus {
    /// Awaiting payment.
    New = 1,

    /// Last payment attempt failed.
    PaymentFailed = 2,

    /// Fully paid.
    Paid = 3,

    /// Sent to the customer.
    Shipped = 4,
}

impl OrderStatus {
    /// Display name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::PaymentFailed => "Payment Failed",
            Self::Paid => "Paid",
            Self::Shipped => "Shipped",
        }
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// A postal address with contact details.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// First name.
    pub first_name: String,

    /// Last name.
    pub last_name: String,

    /// Email address, receipts and dispatch notices go here.
    pub email: String,

    /// Phone number.
    #[serde(default)]
    pub phone: String,

    /// Street address.
    pub street: String,

    /// Town or city.
    pub city: String,

    /// Postcode.
    #[serde(default)]
    pub postcode: String,

    /// ISO country code.
    pub country: String,
}

impl Address {
    /// Full name.
    pub fn name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Zero padded order number, e.g. `00042`.
pub fn invoice_number(id: OrderId) -> String {
    format!("{:05}", id.0)
}

/// Which email is being sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailKind {
    /// Sent to the customer once paid.
    Receipt,

    /// Sent to shop managers once paid.
    Notification,

    /// Sent to the customer once shipped.
    Dispatch,
}

/// An email about an order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Email {
    /// What kind of email this is.
    pub kind: EmailKind,

    /// Order the email is about.
    pub order: OrderId,

    /// Recipients.
    pub to: Vec<String>,

    /// Subject line.
    pub subject: String,
}

impl Email {
    fn new(kind: EmailKind, order: OrderId, to: Vec<String>) -> Self {
        let number = invoice_number(order);
        let subject = match kind {
            EmailKind::Receipt => format!("Receipt for order #{number}"),
            EmailKind::Notification => format!("New order #{number}"),
            EmailKind::Dispatch => format!("Order #{number} has been dispatched"),
        };

        Self {
            kind,
            order,
            to,
            subject,
        }
    }
}

/// Failed to send an email.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("failed to send email: {0}")]
pub struct MailError(pub String);

/// Delivers order emails.
#[cfg_attr(test, mockall::automock)]
pub trait Mailer: Send + Sync {
    /// Send `email`.
    ///
    /// # Errors
    ///
    /// Returns [`MailError`] if delivery fails.
    fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// Mailer that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMailer;

impl Mailer for NullMailer {
    fn send(&self, email: &Email) -> Result<(), MailError> {
        debug!(kind = ?email.kind, order = %email.order, to = ?email.to, "email not sent");

        Ok(())
    }
}

/// Emails are best effort: failures are logged and otherwise ignored.
fn send_email(shop: &Shop, email: &Email) {
    if email.to.is_empty() {
        warn!(kind = ?email.kind, order = %email.order, "no recipient for email");
        return;
    }

    match shop.mailer().send(email) {
        Ok(()) => info!(kind = ?email.kind, order = %email.order, "email sent"),
        Err(error) => warn!(%error, kind = ?email.kind, order = %email.order, "email failed"),
    }
}

fn customer_email(shop: &Shop, order: OrderId) -> Result<Vec<String>, CartError> {
    let store = shop.store().read();

    Ok(store
        .order(order)?
        .shipping_address
        .iter()
        .map(|address| address.email.clone())
        .filter(|email| !email.is_empty())
        .collect())
}

/// What is left to pay: the order total less what has been paid, never
/// below zero.
///
/// # Errors
///
/// Returns an error if the order doesn't exist or can't be totalled.
pub fn amount_due(shop: &Shop, order: OrderId) -> Result<Amount, CartError> {
    let cart = StoredCart::order(shop, order)?;
    let total = cart.total()?;
    let paid = shop.store().read().order(order)?.amount_paid;

    money::ensure_currency(&paid, total.currency())?;

    let due = total
        .to_minor_units()
        .checked_sub(paid.to_minor_units())
        .ok_or(PriceError::Overflow)?
        .max(0);

    Ok(Amount::from_minor(due, total.currency()))
}

/// Record a successful payment of `payment`, or a free order when `None`.
///
/// The order is marked paid once the payment covers the amount due, or
/// straight away when nothing is due. Completing an order sends the receipt,
/// calls [`CartItem::purchase`](crate::items::CartItem::purchase) for each
/// line and ticks the bought items off the buyer's favourites. Returns `true`
/// if this call completed the order; an order completes at most once, and
/// notifications for an order that is already paid record nothing.
///
/// # Errors
///
/// Returns an error if the order doesn't exist or the payment is in another
/// currency.
#[tracing::instrument(skip(shop, payment), fields(payment = ?payment.map(Amount::to_minor_units)))]
pub fn transaction_succeeded(
    shop: &Shop,
    order: OrderId,
    payment: Option<&Amount>,
) -> Result<bool, CartError> {
    let due = amount_due(shop, order)?;
    let lines = StoredCart::order(shop, order)?.lines()?;

    let complete = match payment {
        Some(amount) => amount.to_minor_units() >= due.to_minor_units(),
        None => due.is_zero(),
    };

    let user = {
        let mut tx = shop.store().begin();

        if tx.order(order)?.status >= OrderStatus::Paid {
            debug!("order already paid, ignoring notification");
            return Ok(false);
        }

        if let Some(amount) = payment.filter(|amount| !amount.is_zero()) {
            tx.record_payment(order, amount)?;
        }

        let record = tx.order_mut(order)?;

        if complete {
            record.status = OrderStatus::Paid;
            record.checkout_completed = Some(shop.clock().now());
        }

        let user = record.user;
        tx.commit();

        if !complete {
            info!("order not completed by this payment");
            return Ok(false);
        }

        user
    };

    info!("order paid");

    if shop.config().email_receipts {
        send_email(
            shop,
            &Email::new(EmailKind::Receipt, order, customer_email(shop, order)?),
        );

        if !shop.config().managers.is_empty() {
            send_email(
                shop,
                &Email::new(
                    EmailKind::Notification,
                    order,
                    shop.config().managers.clone(),
                ),
            );
        }
    }

    for line in &lines {
        line.item.purchase(line.line.quantity, &line.line.options);
    }

    if let Some(user) = user {
        fulfil_favourites(shop, user, &lines)?;
    }

    Ok(true)
}

/// Take bought items off the buyer's favourites lists. A line is reduced by
/// the quantity bought and deleted when nothing is left.
fn fulfil_favourites(shop: &Shop, user: UserId, bought: &[ResolvedLine]) -> Result<(), CartError> {
    let mut tx = shop.store().begin();
    let lists: Vec<Container> = tx
        .favourites_for(user)
        .iter()
        .map(|list| Container::Favourites(list.id))
        .collect();

    for container in lists {
        for line in bought {
            let Some(found) = tx.find_line(container, &line.line.item, &line.line.options) else {
                continue;
            };

            let quantity = tx.line(found)?.line.quantity.min(line.line.quantity);

            if tx.decrement_line(found, quantity) == 0 {
                debug!(line = %found, "favourites line already fulfilled");
                continue;
            }

            if tx.line(found)?.line.quantity == 0 {
                tx.delete_line(found);
            }

            debug!(line = %found, quantity, "favourites line fulfilled");
        }
    }

    tx.commit();

    Ok(())
}

/// Record a failed payment. Orders that are already paid are left alone.
///
/// # Errors
///
/// Returns an error if the order doesn't exist.
#[tracing::instrument(skip(shop))]
pub fn transaction_failed(shop: &Shop, order: OrderId) -> Result<(), CartError> {
    let mut tx = shop.store().begin();
    let record = tx.order_mut(order)?;

    if record.status >= OrderStatus::Paid {
        warn!(status = %record.status, "ignoring failed payment on a completed order");
        return Ok(());
    }

    record.status = OrderStatus::PaymentFailed;
    tx.commit();

    info!("payment failed");

    Ok(())
}

/// Mark an order shipped and send the dispatch email.
///
/// The dispatch timestamp is only ever set once, so when several callers
/// ship the same order concurrently exactly one of them sends the email and
/// gets `true`.
///
/// # Errors
///
/// Returns an error if the order doesn't exist.
#[tracing::instrument(skip(shop))]
pub fn ship(shop: &Shop, order: OrderId) -> Result<bool, CartError> {
    let affected = {
        let mut tx = shop.store().begin();
        tx.order_mut(order)?.status = OrderStatus::Shipped;
        let affected = tx.mark_dispatched(order, shop.clock().now());
        tx.commit();

        affected
    };

    if affected == 0 {
        debug!("order already dispatched");
        return Ok(false);
    }

    send_email(
        shop,
        &Email::new(EmailKind::Dispatch, order, customer_email(shop, order)?),
    );

    Ok(true)
}
