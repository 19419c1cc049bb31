//! The tBTC deposit monitoring and recovery engine.
//!
//! Each monitor watches for a "start" event on a deposit, races the
//! deposit's expected "stop" events against a configurable timeout and, if
//! the timeout expires first, performs a bounded, retrying recovery action
//! on behalf of the signing group. A separate supervisor triggers the
//! cooperative liquidation recovery protocol when a keep is terminated
//! before its deposit is redeemed.
//!
//! [`initialize`] is the embedding surface: an agent process connects a
//! chain handle and a signing-group provider, then hands both to the
//! engine together with its [`Config`].

pub mod config;
pub mod deposits;
pub mod errors;
pub mod membership;

mod harness;
mod liquidation;
mod lock;

use std::sync::Arc;

use keep_tbtc_btcio::ElectrsClient;
use keep_tbtc_chain::TbtcChain;
use keep_tbtc_common::retry::default_backoff;
use keep_tbtc_recovery::{
    derive_address, DerivationIndexStorage, KeepGroupProvider, LiquidationRecoverer,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use config::Config;
pub use deposits::DepositMonitor;
pub use errors::{InitializeError, MonitorError};

/// Wires up every deposit monitor and the liquidation supervisor.
///
/// The monitors run until `cancel` fires. Configuration problems on the
/// liquidation path (missing or invalid extended public key, empty Electrs
/// URL) disable only that path; the deposit monitors keep running.
pub async fn initialize<C, P>(
    cancel: CancellationToken,
    chain: Arc<C>,
    groups: Arc<P>,
    config: Config,
) -> Result<(), InitializeError>
where
    C: TbtcChain + 'static,
    P: KeepGroupProvider + 'static,
{
    let monitors = DepositMonitor::new(chain.clone(), cancel.clone());
    monitors
        .monitor_retrieve_pubkey(default_backoff, config.monitor.retrieve_pubkey_timeout)
        .await;
    monitors
        .monitor_provide_redemption_signature(
            default_backoff,
            config.monitor.provide_redemption_signature_timeout,
        )
        .await;
    monitors
        .monitor_provide_redemption_proof(
            default_backoff,
            config.monitor.provide_redemption_proof_timeout,
        )
        .await;

    if config.bitcoin.electrs_url.is_empty() {
        warn!("no electrs URL configured; bitcoin broadcast is disabled");
    }
    let btc = Arc::new(ElectrsClient::connect(&config.bitcoin.electrs_url)?);

    let extended_public_key = match &config.liquidation.extended_public_key {
        Some(key) => match derive_address(key, 0) {
            Ok(_) => Some(key.clone()),
            Err(error) => {
                // The liquidation path is disabled for this member; its
                // share is redistributed among the members with keys.
                warn!(
                    %error,
                    "configured extended public key is unusable; this operator will \
                     contribute no liquidation payout output"
                );
                None
            }
        },
        None => {
            warn!("no extended public key configured; this operator will contribute no liquidation payout output");
            None
        }
    };

    let storage = Arc::new(DerivationIndexStorage::new(
        &config.liquidation.storage_dir,
    )?);
    let recoverer = Arc::new(LiquidationRecoverer::new(
        chain.operator_address(),
        config.bitcoin.network,
        extended_public_key,
        config.liquidation.recovery_protocol_ready_timeout,
        btc,
        storage,
    ));

    monitors.monitor_liquidation(recoverer, groups).await;

    info!("tbtc monitoring initialized");
    Ok(())
}
