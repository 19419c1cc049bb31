//! Capability trait for the Bitcoin side of liquidation recovery.

use async_trait::async_trait;
use bitcoin::{Transaction, Txid};

use crate::error::BtcioError;

/// The Bitcoin operations the engine consumes.
#[async_trait]
pub trait BitcoinHandle: Send + Sync {
    /// Broadcasts a signed transaction to the Bitcoin network and returns
    /// its txid. Broadcasting is idempotent by transaction id: re-sending
    /// an already-known transaction succeeds.
    async fn broadcast_transaction(&self, transaction: &Transaction) -> Result<Txid, BtcioError>;

    /// Retrieves the 25-block sat/vbyte fee estimate. A missing estimate
    /// for that confirmation target is reported as 0.
    async fn vbyte_fee_for_25_blocks(&self) -> Result<u64, BtcioError>;

    /// Returns true if and only if the supplied address has no recorded
    /// transactions.
    ///
    /// Callers should treat an error as "unused" so that processing can
    /// continue without a working Electrs connection.
    async fn is_address_unused(&self, address: &str) -> Result<bool, BtcioError>;
}
