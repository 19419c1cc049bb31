//! Electrs-backed implementation of [`BitcoinHandle`].

use std::{collections::HashMap, str::FromStr, time::Duration};

use async_trait::async_trait;
use bitcoin::{address::NetworkUnchecked, Address, Transaction, Txid};
use esplora_client::{r#async::AsyncClient, Builder};
use keep_tbtc_common::retry::retry_with_default;
use tracing::{info, trace};

use crate::{error::BtcioError, traits::BitcoinHandle};

/// Period within which a single Electrs API call, including its retries,
/// must complete.
///
/// It is important that this value is less than the liquidation recovery
/// readiness window (`recovery_protocol_ready_timeout`) so the members can
/// correctly synchronize protocol execution.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Confirmation target used for fee estimation.
const FEE_ESTIMATE_BLOCKS: u16 = 25;

/// HTTP client for an Electrs (Esplora-compatible) API.
#[derive(Debug)]
pub struct ElectrsClient {
    client: Option<AsyncClient>,
    timeout: Duration,
}

impl ElectrsClient {
    /// Creates a client for the given API base URL.
    ///
    /// An empty URL produces a disabled client whose calls fail with
    /// [`BtcioError::NoApiUrl`]; the liquidation path treats that as
    /// "broadcast disabled".
    pub fn connect(api_url: &str) -> Result<Self, BtcioError> {
        let client = if api_url.is_empty() {
            None
        } else {
            trace!(%api_url, "creating electrs client");
            Some(Builder::new(api_url).build_async()?)
        };

        Ok(Self {
            client,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    fn client(&self, method: &'static str) -> Result<&AsyncClient, BtcioError> {
        self.client.as_ref().ok_or(BtcioError::NoApiUrl(method))
    }
}

#[async_trait]
impl BitcoinHandle for ElectrsClient {
    async fn broadcast_transaction(&self, transaction: &Transaction) -> Result<Txid, BtcioError> {
        let client = self.client("broadcast_transaction")?;
        let txid = transaction.compute_txid();

        retry_with_default(self.timeout, || async {
            client.broadcast(transaction).await
        })
        .await?;

        info!(%txid, "successfully broadcast the bitcoin transaction");
        Ok(txid)
    }

    async fn vbyte_fee_for_25_blocks(&self) -> Result<u64, BtcioError> {
        let client = self.client("vbyte_fee_for_25_blocks")?;

        let estimates: HashMap<u16, f64> =
            retry_with_default(self.timeout, || async { client.get_fee_estimates().await })
                .await?;

        let fee = estimates
            .get(&FEE_ESTIMATE_BLOCKS)
            .copied()
            .unwrap_or(0.0) as u64;
        info!(fee, "retrieved a vbyte fee");
        Ok(fee)
    }

    async fn is_address_unused(&self, address: &str) -> Result<bool, BtcioError> {
        let client = self.client("is_address_unused")?;

        let script_pubkey = Address::<NetworkUnchecked>::from_str(address)
            .map_err(|e| BtcioError::InvalidAddress {
                address: address.to_owned(),
                reason: e.to_string(),
            })?
            .assume_checked()
            .script_pubkey();

        let transactions = retry_with_default(self.timeout, || async {
            client.scripthash_txs(&script_pubkey, None).await
        })
        .await?;

        Ok(transactions.is_empty())
    }
}
