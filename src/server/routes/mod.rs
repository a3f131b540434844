//! Route handlers, grouped by path prefix.

pub mod api;
pub mod auth;
pub mod health;
pub mod projects;
