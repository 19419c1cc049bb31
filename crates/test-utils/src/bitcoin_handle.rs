//! A recording double for the Bitcoin HTTP surface.

use std::sync::Mutex;

use async_trait::async_trait;
use bitcoin::{Transaction, Txid};
use keep_tbtc_btcio::{BitcoinHandle, BtcioError};

/// Records broadcast transactions and serves canned responses for fee and
/// address-usage queries.
#[derive(Debug)]
pub struct RecordingBitcoinHandle {
    fee: u64,
    broadcasts: Mutex<Vec<Transaction>>,
}

impl RecordingBitcoinHandle {
    /// Creates a handle answering fee queries with `fee` sat/vbyte.
    pub fn new(fee: u64) -> Self {
        Self {
            fee,
            broadcasts: Mutex::new(Vec::new()),
        }
    }

    /// All transactions broadcast so far, in order.
    pub fn broadcast_transactions(&self) -> Vec<Transaction> {
        self.broadcasts
            .lock()
            .expect("recorded broadcasts poisoned")
            .clone()
    }
}

#[async_trait]
impl BitcoinHandle for RecordingBitcoinHandle {
    async fn broadcast_transaction(&self, transaction: &Transaction) -> Result<Txid, BtcioError> {
        self.broadcasts
            .lock()
            .expect("recorded broadcasts poisoned")
            .push(transaction.clone());
        Ok(transaction.compute_txid())
    }

    async fn vbyte_fee_for_25_blocks(&self) -> Result<u64, BtcioError> {
        Ok(self.fee)
    }

    async fn is_address_unused(&self, _address: &str) -> Result<bool, BtcioError> {
        Ok(true)
    }
}
