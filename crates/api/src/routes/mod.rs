//! Route handlers

pub mod ensemble;
pub mod health;
pub mod sessions;
