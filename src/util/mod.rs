//! Shared helpers.

pub mod naming;
pub mod timeout;
