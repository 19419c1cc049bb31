//! Error types for the deposit monitors.

use keep_tbtc_chain::ChainError;
use keep_tbtc_primitives::{DepositId, KeepId};
use keep_tbtc_recovery::StorageError;
use thiserror::Error;

/// Errors from a monitor's recovery action. Failed actions are retried by
/// the harness within its bounded attempt budget.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    /// The chain façade failed.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// The deposit has no redemption request on record.
    #[error("no redemption request recorded for deposit [{0}]")]
    NoRedemptionRequest(DepositId),

    /// The keep has not submitted a signature matching the latest
    /// redemption digest yet.
    #[error("no signature matching the redemption digest for keep [{0}]")]
    NoMatchingSignature(KeepId),

    /// The redemption request history is arithmetically inconsistent.
    #[error("inconsistent redemption request data for deposit [{0}]")]
    InconsistentRedemptionData(DepositId),
}

/// Errors preventing the engine from starting up.
#[derive(Debug, Error)]
pub enum InitializeError {
    /// The derivation-index store could not be opened.
    #[error("could not open the derivation index store: {0}")]
    Storage(#[from] StorageError),

    /// The Electrs client could not be constructed.
    #[error("could not set up the electrs client: {0}")]
    Btcio(#[from] keep_tbtc_btcio::BtcioError),
}
