//! Voucher Fixtures

use jiff::civil::Date;
use rusty_money::iso::Currency;
use serde::Deserialize;

use crate::{
    fixtures::FixtureError,
    money,
    vouchers::{Voucher, VoucherKind},
};

/// Wrapper for vouchers in YAML
#[derive(Debug, Deserialize)]
pub struct VouchersFixture {
    /// Vouchers
    pub vouchers: Vec<VoucherFixture>,
}

/// What a voucher fixture takes off
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KindFixture {
    /// Fixed amount, e.g. `"20.00 NZD"`
    Fixed {
        /// Face value
        amount: String,
    },

    /// Percentage off
    Percentage {
        /// Whole percentage points
        percent: u8,
    },

    /// Free shipping
    FreeShipping,
}

/// Voucher fixture from YAML
#[derive(Debug, Deserialize)]
pub struct VoucherFixture {
    /// Code, generated when blank
    #[serde(default)]
    pub code: String,

    /// Kind and value
    #[serde(flatten)]
    pub kind: KindFixture,

    /// Maximum uses
    #[serde(default)]
    pub limit: Option<u32>,

    /// Minimum subtotal, in the shop currency
    #[serde(default)]
    pub minimum_spend: Option<String>,

    /// Last valid day
    #[serde(default)]
    pub expiry: Option<Date>,
}

impl VoucherFixture {
    /// Build the voucher. `currency` prices the minimum spend.
    ///
    /// # Errors
    ///
    /// Returns an error if an amount or percentage is invalid.
    pub fn into_voucher(self, currency: &'static Currency) -> Result<Voucher, FixtureError> {
        let kind = match self.kind {
            KindFixture::Fixed { amount } => VoucherKind::Fixed {
                amount: money::parse_price(&amount)?,
            },
            KindFixture::Percentage { percent } => VoucherKind::percentage(percent)?,
            KindFixture::FreeShipping => VoucherKind::FreeShipping,
        };

        let mut voucher = Voucher::new(&self.code, kind);

        if let Some(limit) = self.limit {
            voucher = voucher.with_limit(limit);
        }

        if let Some(minimum) = self.minimum_spend {
            voucher = voucher.with_minimum_spend(money::parse_minor(&minimum, currency)?);
        }

        if let Some(expiry) = self.expiry {
            voucher = voucher.expiring(expiry);
        }

        Ok(voucher)
    }
}
