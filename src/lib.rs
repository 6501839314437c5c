//! Medcart
//!
//! Medcart is the cart engine of a multi-vendor pharmacy marketplace: line items keyed by product
//! and pharmacy, per-vendor delivery fees, promotion codes, prescription grouping and order
//! assembly. Everything in this crate is synchronous; the only I/O is catalog loading and receipt
//! rendering.

pub mod cart;
pub mod catalog;
pub mod items;
pub mod merge;
pub mod money;
pub mod orders;
pub mod prelude;
pub mod prescriptions;
pub mod pricing;
pub mod products;
pub mod promotions;
pub mod receipt;
pub mod snapshot;
