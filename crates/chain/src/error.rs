//! Error type shared by all chain façade implementations.

use keep_tbtc_primitives::{DepositId, KeepId, SignatureError};
use thiserror::Error;

/// Unified error for chain subscriptions, view calls and submitters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// No keep is deployed under the given address.
    #[error("no keep with id [{0}]")]
    UnknownKeep(KeepId),

    /// No deposit is deployed under the given address.
    #[error("no deposit with id [{0}]")]
    UnknownDeposit(DepositId),

    /// A submitted transaction was rejected by the contract.
    #[error("transaction [{method}] reverted: {reason}")]
    TransactionReverted {
        /// Contract method that rejected the call.
        method: &'static str,
        /// Revert reason as reported by the backend.
        reason: String,
    },

    /// A signature failed validation before submission.
    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    /// A transient backend failure: RPC timeout, nonce race, reorg-visible
    /// mismatch. Safe to retry under the caller's deadline.
    #[error("transient chain error: {0}")]
    Transient(String),
}
