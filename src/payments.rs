//! Payments
//!
//! A [`PaymentGateway`] takes the customer off-site to pay and later confirms
//! the result. Each attempt is a transaction record that moves
//! `Pending -> Created -> Successful | Failed`, every step a guarded update,
//! so a confirmation is only ever acted on once.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    cart::CartError,
    orders,
    shop::Shop,
    store::{OrderId, StoreError, TransactionId, TransactionRecord},
};

/// What the payment is for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionIntent {
    /// Immediate payment.
    #[default]
    Sale,

    /// Authorise now, capture later.
    Authorise,

    /// Order now, authorise and capture later.
    Order,
}

/// Where a transaction is up to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Recorded, not yet sent to the gateway.
    #[default]
    Pending,

    /// Accepted by the gateway, awaiting the customer.
    Created,

    /// Paid.
    Successful,

    /// Declined or abandoned.
    Failed,
}

impl TransactionStatus {
    /// Returns `true` for `Successful` and `Failed`.
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Successful | Self::Failed)
    }
}

/// Where to send the customer to pay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GatewayRedirect {
    /// Gateway's id for the payment.
    pub reference: String,

    /// URL the customer should be sent to.
    pub url: String,
}

/// The payment provider rejected a request.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("payment gateway error: {0}")]
pub struct GatewayError(pub String);

/// Payment provider.
#[cfg_attr(test, mockall::automock)]
pub trait PaymentGateway: Send + Sync {
    /// Create the payment with the provider.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the provider rejects the payment.
    fn begin(&self, transaction: &TransactionRecord) -> Result<GatewayRedirect, GatewayError>;

    /// Execute the payment once `payer` has approved it. Returns whether the
    /// payment went through.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the provider can't be reached.
    fn confirm(&self, transaction: &TransactionRecord, payer: &str) -> Result<bool, GatewayError>;
}

/// Payment errors.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// No gateway is configured.
    #[error("no payment gateway configured")]
    Unavailable,

    /// Transaction hasn't been accepted by the gateway yet.
    #[error("transaction {0} has not been started")]
    NotStarted(TransactionId),

    /// Transaction was completed by an earlier or concurrent request.
    #[error("transaction {0} has already been completed")]
    AlreadyCompleted(TransactionId),

    /// Gateway error.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Order couldn't be read or updated.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// Store error.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A transaction handed to the gateway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PaymentStart {
    /// Transaction id, also the secret used to confirm it.
    pub transaction: TransactionId,

    /// Where to send the customer.
    pub redirect: GatewayRedirect,
}

/// Create a transaction for the amount due on `order` and hand it to the
/// gateway.
///
/// # Errors
///
/// - [`PaymentError::Unavailable`]: the shop has no gateway.
/// - [`PaymentError::Gateway`]: the gateway rejected the payment. The
///   transaction is left `Pending`.
#[tracing::instrument(skip(shop))]
pub fn start_payment(
    shop: &Shop,
    order: OrderId,
    intent: TransactionIntent,
) -> Result<PaymentStart, PaymentError> {
    let gateway = shop.gateway().ok_or(PaymentError::Unavailable)?;
    let amount = orders::amount_due(shop, order)?;

    let record = TransactionRecord {
        id: TransactionId::random(),
        order,
        intent,
        status: TransactionStatus::Pending,
        amount,
        reference: None,
        created: shop.clock().now(),
        completed: None,
    };

    {
        let mut tx = shop.store().begin();
        tx.insert_transaction(record.clone());
        tx.commit();
    }

    let redirect = gateway.begin(&record).inspect_err(|error| {
        warn!(%error, transaction = %record.id, "gateway rejected payment");
    })?;

    let mut tx = shop.store().begin();
    if tx.activate_transaction(record.id, redirect.reference.clone()) == 0 {
        return Err(PaymentError::AlreadyCompleted(record.id));
    }
    tx.commit();

    info!(transaction = %record.id, amount = %amount, "payment started");

    Ok(PaymentStart {
        transaction: record.id,
        redirect,
    })
}

/// Ask the gateway to execute a transaction and record the outcome against
/// its order.
///
/// Only the request that moves the transaction out of `Created` updates the
/// order. Everyone else gets [`PaymentError::AlreadyCompleted`].
///
/// # Errors
///
/// - [`PaymentError::NotStarted`]: the transaction is still `Pending`.
/// - [`PaymentError::AlreadyCompleted`]: the transaction is already final.
/// - [`PaymentError::Gateway`]: the gateway failed; nothing is recorded.
#[tracing::instrument(skip(shop, payer))]
pub fn confirm_payment(
    shop: &Shop,
    transaction: TransactionId,
    payer: &str,
) -> Result<TransactionStatus, PaymentError> {
    let gateway = shop.gateway().ok_or(PaymentError::Unavailable)?;
    let record = shop.store().read().transaction(transaction)?.clone();

    match record.status {
        TransactionStatus::Pending => return Err(PaymentError::NotStarted(transaction)),
        status if status.is_final() => return Err(PaymentError::AlreadyCompleted(transaction)),
        _ => {}
    }

    let approved = gateway.confirm(&record, payer)?;
    let status = if approved {
        TransactionStatus::Successful
    } else {
        TransactionStatus::Failed
    };

    {
        let mut tx = shop.store().begin();
        if tx.complete_transaction(transaction, status, shop.clock().now()) == 0 {
            warn!("transaction completed concurrently");
            return Err(PaymentError::AlreadyCompleted(transaction));
        }
        tx.commit();
    }

    if approved {
        orders::transaction_succeeded(shop, record.order, Some(&record.amount))?;
    } else {
        orders::transaction_failed(shop, record.order)?;
    }

    info!(?status, order = %record.order, "payment confirmed");

    Ok(status)
}
