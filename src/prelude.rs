//! Shoptools prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    cart::{
        Cart, CartError, CartKind, CartSummary, LoginMerge, MergeReport, SessionCart, StoredCart,
        UpdateOutcome, merge_on_login,
    },
    checkout::{CheckoutDetails, CheckoutError, CheckoutOutcome, checkout},
    config::{ConfigError, ShippingMode, ShopConfig},
    items::{
        CartItem, ItemRef, ItemResolver, LineOptions, OptionChoices,
        catalogue::{Catalogue, Product},
    },
    lines::CartLine,
    money::{Amount, PriceError},
    orders::{
        Address, Email, EmailKind, MailError, Mailer, NullMailer, OrderStatus, amount_due, ship,
        transaction_failed, transaction_succeeded,
    },
    payments::{
        GatewayError, GatewayRedirect, PaymentError, PaymentGateway, TransactionIntent,
        TransactionStatus, confirm_payment, start_payment,
    },
    receipt::{Receipt, ReceiptError},
    regions::{Country, Region, RegionKey, Regions},
    session::Session,
    shipping::{PerItemShipping, RegionalShipping, ShippingChoice, ShippingStrategy},
    shop::{Clock, FixedClock, Shop, ShopBuilder, SystemClock},
    store::{OrderId, Store, StoreError, UserId},
    vouchers::{Calculator, Voucher, VoucherError, VoucherKind, VoucherStrategy, create_voucher},
};
