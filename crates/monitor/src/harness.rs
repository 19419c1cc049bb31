//! The generic deposit monitoring harness.
//!
//! A monitor is a "start event → race(stop events, timeout) → bounded
//! recovery action" loop parameterized by one deposit-lifecycle step. For
//! every start event the harness spawns an independent per-deposit task
//! that owns the subscriptions it opened and releases them on every exit
//! path.

use std::{future, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt};
use keep_tbtc_chain::{ChainError, TbtcChain};
use keep_tbtc_primitives::{DepositId, Subscription};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    errors::MonitorError, lock::MonitoringLock, membership::is_member_of_signing_group,
};

/// Maximum number of times a recovery action is attempted per timeout:
/// the initial attempt plus two retries.
pub(crate) const MAX_ACT_ATTEMPTS: u32 = 3;

/// One deposit-lifecycle step driven by the monitoring harness.
#[async_trait]
pub(crate) trait LifecycleStep<C>: Send + Sync + 'static
where
    C: TbtcChain,
{
    /// Short name used in logs and the per-deposit deduplication lock.
    fn name(&self) -> &'static str;

    /// Subscribes to the events that start monitoring a deposit.
    async fn subscribe_start(&self, chain: &C) -> Subscription<DepositId>;

    /// Subscribes to every event that stops monitoring the deposit. The
    /// full stop set is subscribed before the harness arms its timer, so
    /// no wake-up is lost.
    async fn subscribe_stop(
        &self,
        chain: &C,
        deposit_id: DepositId,
    ) -> Result<Vec<BoxStream<'static, ()>>, ChainError>;

    /// The recovery action performed when the timeout elapses first. Must
    /// be idempotent: events are delivered at-least-once and the chain
    /// state may have advanced since the timer was armed.
    async fn act(&self, chain: &C, deposit_id: DepositId) -> Result<(), MonitorError>;
}

/// Spawns the supervisor task for one lifecycle step. The supervisor
/// consumes start events and spawns one watcher task per deposit; it runs
/// until the cancellation token fires or the start stream ends.
pub(crate) async fn monitor<C, S, B>(
    chain: Arc<C>,
    cancel: CancellationToken,
    locks: MonitoringLock,
    step: S,
    backoff: B,
    action_timeout: Duration,
) where
    C: TbtcChain + 'static,
    S: LifecycleStep<C>,
    B: Fn(u32) -> Duration + Send + Sync + 'static,
{
    let mut start_events = step.subscribe_start(chain.as_ref()).await;
    let step = Arc::new(step);
    let backoff = Arc::new(backoff);

    tokio::spawn(async move {
        info!(monitor = step.name(), "monitoring started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(monitor = step.name(), "monitoring cancelled");
                    break;
                }
                event = start_events.next() => match event {
                    Some(deposit_id) => {
                        tokio::spawn(watch_deposit(
                            chain.clone(),
                            cancel.clone(),
                            locks.clone(),
                            step.clone(),
                            backoff.clone(),
                            action_timeout,
                            deposit_id,
                        ));
                    }
                    None => {
                        debug!(monitor = step.name(), "start event stream ended");
                        break;
                    }
                }
            }
        }
    });
}

/// Watches a single deposit through one lifecycle step.
async fn watch_deposit<C, S, B>(
    chain: Arc<C>,
    cancel: CancellationToken,
    locks: MonitoringLock,
    step: Arc<S>,
    backoff: Arc<B>,
    action_timeout: Duration,
    deposit_id: DepositId,
) where
    C: TbtcChain + 'static,
    S: LifecycleStep<C>,
    B: Fn(u32) -> Duration + Send + Sync + 'static,
{
    let name = step.name();

    match is_member_of_signing_group(chain.as_ref(), deposit_id).await {
        Ok(true) => {}
        Ok(false) => {
            debug!(%deposit_id, monitor = name, "operator is not in the signing group; skipping");
            return;
        }
        Err(error) => {
            warn!(%deposit_id, monitor = name, %error, "could not check signing group membership");
            return;
        }
    }

    let Some(_lock_guard) = locks.acquire(deposit_id, name) else {
        debug!(%deposit_id, monitor = name, "deposit is already being monitored");
        return;
    };

    let stops = match step.subscribe_stop(chain.as_ref(), deposit_id).await {
        Ok(stops) => stops,
        Err(error) => {
            warn!(%deposit_id, monitor = name, %error, "could not subscribe to stop events");
            return;
        }
    };
    let mut stop_events = futures::stream::select_all(stops);

    info!(%deposit_id, monitor = name, "starting monitoring");

    let mut attempt: u32 = 1;
    let mut timer = Box::pin(tokio::time::sleep(action_timeout));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(%deposit_id, monitor = name, "monitoring cancelled");
                break;
            }
            stop = stop_events.next() => match stop {
                Some(()) => {
                    info!(%deposit_id, monitor = name, "stop event received; monitoring completed");
                    break;
                }
                None => {
                    debug!(%deposit_id, monitor = name, "stop event streams ended");
                    break;
                }
            },
            () = &mut timer => {
                warn!(%deposit_id, monitor = name, attempt, "timeout elapsed; executing recovery action");
                match step.act(chain.as_ref(), deposit_id).await {
                    Ok(()) => {
                        info!(%deposit_id, monitor = name, "recovery action completed");
                        break;
                    }
                    Err(error) if attempt == MAX_ACT_ATTEMPTS => {
                        error!(%deposit_id, monitor = name, %error, "recovery action failed; giving up");
                        break;
                    }
                    Err(error) => {
                        warn!(%deposit_id, monitor = name, %error, "recovery action failed; retrying");
                        // Re-arming the race timer keeps stop events and
                        // cancellation observable during the backoff.
                        timer = Box::pin(tokio::time::sleep(backoff(attempt)));
                        attempt += 1;
                    }
                }
            }
        }
    }
    // Dropping the stop streams releases their subscriptions; the lock
    // guard frees the deposit for a later start event.
}

/// Narrows a deposit-wide subscription to one deposit's events.
pub(crate) fn filter_deposit(
    subscription: Subscription<DepositId>,
    deposit_id: DepositId,
) -> BoxStream<'static, ()> {
    subscription
        .filter(move |id| future::ready(*id == deposit_id))
        .map(|_| ())
        .boxed()
}

/// Erases a subscription's payload, leaving only wake-ups.
pub(crate) fn unit<T: Send + 'static>(subscription: Subscription<T>) -> BoxStream<'static, ()> {
    subscription.map(|_| ()).boxed()
}
