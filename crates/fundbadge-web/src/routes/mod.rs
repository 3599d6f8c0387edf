//! Route groups.

pub mod auth;
pub mod badge;
pub mod debug;
pub mod health;
