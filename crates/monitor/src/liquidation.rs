//! Liquidation recovery supervision.
//!
//! A terminated keep can no longer advance its deposit, but its signing
//! group still controls the deposit's Bitcoin UTXO. This supervisor
//! watches every deposit whose signing group this operator belongs to and
//! triggers the cooperative recovery protocol when the keep is terminated
//! before the deposit is redeemed.

use std::sync::Arc;

use futures::StreamExt;
use keep_tbtc_chain::{ChainError, TbtcChain};
use keep_tbtc_primitives::{DepositId, KeepId};
use keep_tbtc_recovery::{KeepGroupProvider, LiquidationRecoverer};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    harness::{filter_deposit, unit},
    lock::MonitoringLock,
    membership::is_member_of_signing_group,
};

const MONITOR_NAME: &str = "liquidation-recovery";

/// Spawns the liquidation supervisor: one watcher task per deposit this
/// operator signs for, each waiting for the keep's termination.
pub(crate) async fn monitor_liquidation<C, P>(
    chain: Arc<C>,
    cancel: CancellationToken,
    locks: MonitoringLock,
    recoverer: Arc<LiquidationRecoverer>,
    groups: Arc<P>,
) where
    C: TbtcChain + 'static,
    P: KeepGroupProvider + 'static,
{
    let mut start_events = chain.on_deposit_created().await;

    tokio::spawn(async move {
        info!(monitor = MONITOR_NAME, "monitoring started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(monitor = MONITOR_NAME, "monitoring cancelled");
                    break;
                }
                event = start_events.next() => match event {
                    Some(deposit_id) => {
                        tokio::spawn(watch_keep_termination(
                            chain.clone(),
                            cancel.clone(),
                            locks.clone(),
                            recoverer.clone(),
                            groups.clone(),
                            deposit_id,
                        ));
                    }
                    None => {
                        debug!(monitor = MONITOR_NAME, "start event stream ended");
                        break;
                    }
                }
            }
        }
    });
}

async fn watch_keep_termination<C, P>(
    chain: Arc<C>,
    cancel: CancellationToken,
    locks: MonitoringLock,
    recoverer: Arc<LiquidationRecoverer>,
    groups: Arc<P>,
    deposit_id: DepositId,
) where
    C: TbtcChain + 'static,
    P: KeepGroupProvider + 'static,
{
    match is_member_of_signing_group(chain.as_ref(), deposit_id).await {
        Ok(true) => {}
        Ok(false) => {
            debug!(%deposit_id, monitor = MONITOR_NAME, "operator is not in the signing group; skipping");
            return;
        }
        Err(error) => {
            warn!(%deposit_id, monitor = MONITOR_NAME, %error, "could not check signing group membership");
            return;
        }
    }

    let Some(_lock_guard) = locks.acquire(deposit_id, MONITOR_NAME) else {
        debug!(%deposit_id, monitor = MONITOR_NAME, "deposit is already being watched");
        return;
    };

    let keep_id = match chain.keep_for_deposit(deposit_id).await {
        Ok(keep_id) => keep_id,
        Err(error) => {
            warn!(%deposit_id, monitor = MONITOR_NAME, %error, "could not resolve the deposit's keep");
            return;
        }
    };

    let (mut terminated, mut stops) = match subscribe(chain.as_ref(), deposit_id, keep_id).await {
        Ok(subscriptions) => subscriptions,
        Err(error) => {
            warn!(%deposit_id, monitor = MONITOR_NAME, %error, "could not subscribe to keep events");
            return;
        }
    };

    info!(%deposit_id, %keep_id, monitor = MONITOR_NAME, "watching for keep termination");

    tokio::select! {
        _ = cancel.cancelled() => {
            debug!(%deposit_id, monitor = MONITOR_NAME, "monitoring cancelled");
        }
        Some(()) = stops.next() => {
            info!(%deposit_id, monitor = MONITOR_NAME, "deposit completed its lifecycle; monitoring completed");
        }
        Some(_) = terminated.next() => {
            warn!(%deposit_id, %keep_id, "keep terminated; attempting liquidation recovery");
            run_recovery(chain.as_ref(), &recoverer, groups.as_ref(), deposit_id, keep_id).await;
        }
    }
}

type StopStreams = futures::stream::SelectAll<futures::stream::BoxStream<'static, ()>>;

async fn subscribe<C>(
    chain: &C,
    deposit_id: DepositId,
    keep_id: KeepId,
) -> Result<
    (
        keep_tbtc_primitives::Subscription<keep_tbtc_primitives::events::KeepTerminatedEvent>,
        StopStreams,
    ),
    ChainError,
>
where
    C: TbtcChain,
{
    let terminated = chain.on_keep_terminated(keep_id).await?;
    let stops = futures::stream::select_all(vec![
        filter_deposit(chain.on_deposit_redeemed().await, deposit_id),
        unit(chain.on_keep_closed(keep_id).await?),
    ]);
    Ok((terminated, stops))
}

async fn run_recovery<C, P>(
    chain: &C,
    recoverer: &LiquidationRecoverer,
    groups: &P,
    deposit_id: DepositId,
    keep_id: KeepId,
) where
    C: TbtcChain,
    P: KeepGroupProvider,
{
    let attempt = async {
        let members = chain.members(keep_id).await?;
        let keep_public_key = chain.keep_public_key(keep_id).await?;
        let funding = chain.funding_info(deposit_id).await?;
        Ok::<_, ChainError>((members, keep_public_key, funding))
    };

    let (members, keep_public_key, funding) = match attempt.await {
        Ok(inputs) => inputs,
        Err(error) => {
            error!(%deposit_id, %keep_id, %error, "could not gather liquidation recovery inputs");
            return;
        }
    };

    let group = match groups.group(keep_id).await {
        Ok(group) => group,
        Err(error) => {
            error!(%deposit_id, %keep_id, %error, "no signing group handle for liquidation recovery");
            return;
        }
    };

    match recoverer
        .recover(keep_id, &members, &keep_public_key, funding, group.as_ref())
        .await
    {
        Ok(txid) => {
            info!(%deposit_id, %keep_id, %txid, "liquidation recovery completed");
        }
        Err(error) => {
            // The attempt aborted without touching on-chain state; it is
            // retried on the next process restart.
            error!(%deposit_id, %keep_id, %error, "liquidation recovery attempt failed");
        }
    }
}
