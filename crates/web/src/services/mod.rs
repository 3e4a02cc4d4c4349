//! Business logic shared by the route handlers.

pub mod auth;
pub mod guard;
pub mod qr;
pub mod storage;
