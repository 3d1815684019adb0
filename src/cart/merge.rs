//! Cart Merging
//!
//! Copies lines from one cart into a stored cart, re-validating each against
//! the current catalogue. Lines that no longer make sense are dropped and
//! reported rather than failing the whole merge.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    cart::{Cart, CartError, SessionCart, StoredCart},
    items::CartItem,
    lines::{CartLine, ResolvedLine},
    session::Session,
    shop::Shop,
};

/// Reason given for lines whose item no longer resolves.
pub const ITEM_UNAVAILABLE: &str = "Item is no longer available";

/// A source line that wasn't copied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DroppedLine {
    /// The line, with options normalised where the item still exists.
    pub line: CartLine,

    /// Why it was dropped.
    pub reasons: Vec<String>,
}

/// What a merge did.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Lines written to the target.
    pub transferred: Vec<CartLine>,

    /// Lines left behind.
    pub dropped: Vec<DroppedLine>,
}

impl MergeReport {
    /// Returns `true` if every source line made it across.
    pub fn is_complete(&self) -> bool {
        self.dropped.is_empty()
    }
}

/// Result of [`merge_on_login`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LoginMerge {
    /// Session cart merged into the user's saved cart.
    pub cart: Option<MergeReport>,

    /// Session favourites merged into the user's favourites list.
    pub favourites: Option<MergeReport>,
}

/// Source lines grouped by item and normalised options.
struct Candidate {
    line: CartLine,
    item: Arc<dyn CartItem>,
}

/// Copy `source` into `target`.
///
/// The target's lines are replaced by the source's. Each line is resolved,
/// its options normalised and its quantity re-validated; lines that collapse
/// onto the same options are combined first. The shipping option and voucher
/// codes are copied after the lines, so an order target gets its shipping
/// cost and discounts worked out against the new lines. If any step fails the
/// target is put back as it was.
///
/// # Errors
///
/// - [`CartError::OrderLocked`]: the target is a paid order.
/// - [`CartError::Voucher`]: the target is an order and its discounts failed
///   validation.
#[tracing::instrument(skip_all, fields(source = ?source.kind(), target = ?target.container()))]
pub fn save_to(source: &dyn Cart, target: &mut StoredCart<'_>) -> Result<MergeReport, CartError> {
    target.ensure_editable()?;

    let shop = source.shop();
    let mut report = MergeReport::default();
    let mut candidates: Vec<Candidate> = Vec::new();

    for line in source.raw_lines()? {
        let Some(item) = shop.items().resolve(&line.item) else {
            debug!(item = %line.item, "item no longer resolves");
            report.dropped.push(DroppedLine {
                line,
                reasons: vec![ITEM_UNAVAILABLE.to_string()],
            });
            continue;
        };

        let options = line.options.normalised(&item.available_options());

        match candidates
            .iter_mut()
            .find(|candidate| candidate.line.matches(&line.item, &options))
        {
            Some(candidate) => {
                candidate.line.quantity = candidate.line.quantity.saturating_add(line.quantity);
            }
            None => candidates.push(Candidate {
                line: CartLine::new(line.item, line.quantity, options),
                item,
            }),
        }
    }

    let mut lines = Vec::with_capacity(candidates.len());

    for Candidate { line, item } in candidates {
        let errors = item.cart_errors(line.quantity, &line.options);

        if !errors.is_empty() {
            report.dropped.push(DroppedLine {
                line,
                reasons: errors,
            });
            continue;
        }

        lines.push(ResolvedLine {
            id: None,
            total: item.line_total(line.quantity, &line.options)?,
            description: item.description(),
            line,
            item,
        });
    }

    let shipping_option = source.shipping_option()?;
    let voucher_codes = source.voucher_codes()?;
    let snapshot = shop.store().read().snapshot(target.container());

    if let Err(err) = write_target(target, &lines, shipping_option, voucher_codes) {
        warn!(error = %err, "cart save failed, restoring target");
        let mut tx = shop.store().begin();
        tx.restore(snapshot);
        tx.commit();

        return Err(err);
    }

    report.transferred = lines.into_iter().map(|line| line.line).collect();

    for dropped in &report.dropped {
        warn!(
            item = %dropped.line.item,
            reasons = ?dropped.reasons,
            "line dropped while saving cart"
        );
    }

    info!(
        transferred = report.transferred.len(),
        dropped = report.dropped.len(),
        "cart saved"
    );

    Ok(report)
}

fn write_target(
    target: &mut StoredCart<'_>,
    lines: &[ResolvedLine],
    shipping_option: Option<String>,
    voucher_codes: Vec<String>,
) -> Result<(), CartError> {
    target.replace_lines(lines)?;
    target.set_shipping_option(shipping_option)?;
    target.set_voucher_codes(voucher_codes)
}

/// Move a freshly logged in session's cart and favourites into the user's
/// stored ones.
///
/// Empty session carts are left alone. Merged session carts are reset.
/// Returns `None` if the session has no user.
///
/// # Errors
///
/// Returns an error if either merge fails. A failed favourites merge leaves a
/// completed cart merge in place.
pub fn merge_on_login(shop: &Shop, session: &mut Session) -> Result<Option<LoginMerge>, CartError> {
    let Some(user) = session.user() else {
        return Ok(None);
    };

    let region = session.region();

    let cart = {
        let mut source = SessionCart::load(shop, session)?;

        if source.data().lines.is_empty() {
            None
        } else {
            let mut target = StoredCart::for_user(shop, user, region);
            let report = source.save_to(&mut target)?;
            source.reset();

            Some(report)
        }
    };

    let favourites = {
        let mut source = SessionCart::favourites(shop, session)?;

        if source.data().lines.is_empty() {
            None
        } else {
            let mut target = StoredCart::default_favourites(shop, user, region);
            let report = source.save_to(&mut target)?;
            source.reset();

            Some(report)
        }
    };

    Ok(Some(LoginMerge { cart, favourites }))
}
