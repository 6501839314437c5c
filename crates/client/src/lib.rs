//! Medcart client
//!
//! Keeps a [`medcart`] cart in step with the marketplace cart service: optimistic local
//! changes, guest storage while signed out, and the promotion and order calls.

pub mod auth;
pub mod cli;
pub mod config;
pub mod http;
pub mod persistence;
pub mod remote;
pub mod sync;
pub mod wire;
