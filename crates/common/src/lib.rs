//! Common utilities shared by the keep-tbtc crates: logging initialization
//! and the deadline-bounded retry primitive.

pub mod logging;
pub mod retry;
