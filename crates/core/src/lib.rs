//! Garage Inventory Core - Shared domain types.
//!
//! This crate provides the validated types used across all Garage Inventory
//! components:
//! - `web` - The box/item tracking web application
//! - `cli` - Command-line tools for migrations and user administration
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. The optional `sqlite` feature adds `sqlx` encode/decode support
//! so the ID newtypes can be bound directly in queries.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, usernames, emails, quantities and money

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
