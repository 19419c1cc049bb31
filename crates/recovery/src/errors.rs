//! Error types for the liquidation recovery protocol.

use keep_tbtc_btcio::BtcioError;
use thiserror::Error;

use crate::{
    derive::DeriveAddressError, group::GroupError, storage::StorageError, tx::TransactionError,
};

/// Errors aborting a liquidation recovery attempt.
///
/// Every variant aborts the attempt cleanly: no on-chain state is touched
/// and the protocol is retried on the next process restart.
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// Deriving this member's liquidation address failed.
    #[error("address derivation failed: {0}")]
    Derivation(#[from] DeriveAddressError),

    /// The derivation-index store failed.
    #[error("derivation index storage failed: {0}")]
    Storage(#[from] StorageError),

    /// Composing or signing the split transaction failed.
    #[error("transaction composition failed: {0}")]
    Transaction(#[from] TransactionError),

    /// The signing group collaborator failed.
    #[error("signing group failed: {0}")]
    Group(#[from] GroupError),

    /// Not every member announced readiness within the window.
    #[error("liquidation recovery readiness window expired")]
    ReadyWindowExpired,

    /// The broadcast channel closed before all members announced.
    #[error("announcement channel closed before all members were ready")]
    AnnouncementChannelClosed,

    /// Broadcasting the signed transaction failed within the retry
    /// deadline.
    #[error("bitcoin broadcast failed: {0}")]
    Broadcast(#[from] BtcioError),
}
