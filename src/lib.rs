//! Shoptools
//!
//! Shoptools is a cart, checkout, voucher and shipping engine. Carts live in
//! the visitor's session, in a user's saved cart or favourites, or on an
//! order, and all of them share one [`cart::Cart`] surface. Checkout copies a
//! session cart onto an order, prices it with pluggable shipping and voucher
//! strategies, and hands off to a payment gateway.

pub mod cart;
pub mod checkout;
pub mod config;
pub mod fixtures;
pub mod items;
pub mod lines;
pub mod logging;
pub mod money;
pub mod orders;
pub mod payments;
pub mod prelude;
pub mod receipt;
pub mod regions;
pub mod session;
pub mod shipping;
pub mod shop;
pub mod store;
pub mod uuids;
pub mod vouchers;
