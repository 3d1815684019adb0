//! Discount Calculator

use rusty_money::Money;
use tracing::debug;

use crate::{
    cart::{Cart, CartError},
    money::{self, PriceError},
    vouchers::{AppliedDiscount, Calculation, Voucher, VoucherKind, VoucherStrategy},
};

/// Trim, upper-case and de-duplicate codes, keeping first occurrences.
pub fn normalise_codes(codes: &[String]) -> Vec<String> {
    let mut seen = Vec::with_capacity(codes.len());

    for code in codes.iter().map(|code| super::normalise_code(code)) {
        if !code.is_empty() && !seen.contains(&code) {
            seen.push(code);
        }
    }

    seen
}

/// The default voucher strategy.
///
/// Vouchers are applied in a fixed order: one free shipping voucher, then
/// fixed vouchers from smallest remaining balance up, then the single best
/// percentage voucher against whatever is left of the discountable lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct Calculator;

/// A voucher that passed availability, expiry and minimum spend checks.
struct Usable {
    voucher: Voucher,
    redeemed: i64,
}

impl Calculator {
    fn usable(cart: &dyn Cart, codes: &[String], subtotal: i64) -> Vec<Usable> {
        let today = cart.shop().clock().today();
        let scope = cart.discount_scope();
        let store = cart.shop().store().read();

        let mut usable = Vec::new();

        for code in codes {
            let Some(voucher) = store.voucher(code) else {
                debug!(code, "unknown voucher code");
                continue;
            };

            let usage = store.voucher_usage(code, scope);

            if !voucher.available(usage.uses)
                || voucher.is_expired(today)
                || subtotal < voucher.minimum_spend
            {
                debug!(code, "voucher not usable");
                continue;
            }

            usable.push(Usable {
                voucher: voucher.clone(),
                redeemed: usage.redeemed,
            });
        }

        usable
    }
}

impl VoucherStrategy for Calculator {
    fn calculate(
        &self,
        cart: &dyn Cart,
        codes: &[String],
        include_shipping: bool,
    ) -> Result<Calculation, CartError> {
        let codes = normalise_codes(codes);

        if codes.is_empty() {
            return Ok(Calculation::default());
        }

        let currency = cart.currency();
        let subtotal = cart.subtotal()?.to_minor_units();
        let shipping = if include_shipping {
            cart.shipping_cost()?.to_minor_units()
        } else {
            0
        };

        let usable = Self::usable(cart, &codes, subtotal);
        let mut running = subtotal.checked_add(shipping).ok_or(PriceError::Overflow)?;
        let mut discounts = Vec::new();

        let mut apply = |voucher: &Voucher, amount: i64, running: &mut i64| {
            *running -= amount;
            discounts.push(AppliedDiscount {
                code: voucher.code.clone(),
                description: voucher.description(),
                amount: Money::from_minor(amount, currency),
            });
        };

        if include_shipping {
            let free_shipping = usable
                .iter()
                .find(|usable| usable.voucher.kind == VoucherKind::FreeShipping);

            if let Some(free_shipping) = free_shipping {
                apply(&free_shipping.voucher, shipping.min(running), &mut running);
            }
        }

        let mut fixed: Vec<(&Voucher, i64, i64)> = usable
            .iter()
            .filter_map(|usable| match &usable.voucher.kind {
                VoucherKind::Fixed { amount } if amount.currency() == currency => Some((
                    &usable.voucher,
                    amount.to_minor_units(),
                    usable.voucher.remaining(usable.redeemed).unwrap_or_default(),
                )),
                _ => None,
            })
            .collect();

        fixed.sort_by(|(a, _, a_remaining), (b, _, b_remaining)| {
            a_remaining.cmp(b_remaining).then_with(|| a.code.cmp(&b.code))
        });

        for (voucher, face, remaining) in fixed {
            let amount = running.min(face).min(remaining).max(0);

            if amount == 0 {
                continue;
            }

            apply(voucher, amount, &mut running);
        }

        let best = usable
            .iter()
            .filter_map(|usable| match usable.voucher.kind {
                VoucherKind::Percentage { points } => Some((&usable.voucher, points)),
                _ => None,
            })
            .reduce(|best, candidate| {
                if candidate.1 > best.1 || (candidate.1 == best.1 && candidate.0.code < best.0.code) {
                    candidate
                } else {
                    best
                }
            });

        if let Some((voucher, points)) = best {
            let discountable = cart
                .lines()?
                .iter()
                .filter(|line| line.item.allow_discounts())
                .try_fold(0i64, |total, line| {
                    total
                        .checked_add(line.total.to_minor_units())
                        .ok_or(PriceError::Overflow)
                })?;

            let base = running.min(discountable).max(0);
            let amount = money::percent_of_minor(&money::percentage_points(points), base)?;

            apply(voucher, amount, &mut running);
        }

        let invalid_codes = codes
            .into_iter()
            .filter(|code| !discounts.iter().any(|discount| discount.code == *code))
            .collect();

        Ok(Calculation {
            discounts,
            invalid_codes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalise_codes_dedupes_preserving_order() {
        let codes = vec![
            " spring ".to_string(),
            "GIFT".to_string(),
            "Spring".to_string(),
            String::new(),
        ];

        assert_eq!(normalise_codes(&codes), vec!["SPRING", "GIFT"]);
    }
}
