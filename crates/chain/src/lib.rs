//! The chain façade the operator engine is written against.
//!
//! The engine never talks to an RPC client directly. Instead it consumes
//! the narrow capability set defined here: event subscriptions, transaction
//! submitters and view calls, split between the keep side ([`KeepChain`])
//! and the tBTC deposit side ([`DepositChain`]). A production backend wraps
//! contract bindings for an EVM-compatible chain; tests use the in-process
//! implementation from `keep-tbtc-test-utils`.
//!
//! Failure semantics: every submitter returns a terminal [`ChainError`] or
//! success. Subscriptions deliver events at-least-once, so handlers must be
//! idempotent. The only repeated-submission workaround the façade layer
//! itself performs is [`submit_keep_public_key_with_retry`].

pub mod deposit;
pub mod error;
pub mod keep;
pub mod submit;

pub use deposit::DepositChain;
pub use error::ChainError;
pub use keep::KeepChain;
pub use submit::submit_keep_public_key_with_retry;

/// The full chain handle the tBTC engine consumes.
pub trait TbtcChain: KeepChain + DepositChain {}

impl<T: KeepChain + DepositChain> TbtcChain for T {}
