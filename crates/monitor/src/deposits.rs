//! The three deposit monitors: signer pubkey retrieval, redemption
//! signature provision and redemption fee bumping.
//!
//! Fee bumping and signature provision form a deliberate cycle: a fee
//! increase emits a fresh redemption request on-chain, which re-enters the
//! signature monitor through its ordinary start subscription. The harness
//! does not special-case the cycle; idempotent actions and the per-deposit
//! lock prevent doubled submissions.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::stream::BoxStream;
use keep_tbtc_chain::{ChainError, TbtcChain};
use keep_tbtc_primitives::{DepositId, DepositState, EcdsaSignature, Subscription};
use keep_tbtc_recovery::{KeepGroupProvider, LiquidationRecoverer};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    errors::MonitorError,
    harness::{filter_deposit, monitor, unit, LifecycleStep},
    liquidation::monitor_liquidation,
    lock::MonitoringLock,
};

/// Drives the deposit-lifecycle monitors against one chain handle.
#[derive(Debug)]
pub struct DepositMonitor<C> {
    chain: Arc<C>,
    cancel: CancellationToken,
    locks: MonitoringLock,
}

impl<C> DepositMonitor<C>
where
    C: TbtcChain + 'static,
{
    /// Creates a monitor set parented to the given cancellation token.
    /// Cancelling the token winds down every supervisor and per-deposit
    /// task at its next suspension point.
    pub fn new(chain: Arc<C>, cancel: CancellationToken) -> Self {
        Self {
            chain,
            cancel,
            locks: MonitoringLock::new(),
        }
    }

    /// Monitors new deposits for signer public key retrieval.
    ///
    /// Start: deposit created. Stops: pubkey registered, keep closed, keep
    /// terminated. Recovery action: `retrieveSignerPubkey`, which only
    /// succeeds once the keep has published a key on-chain.
    pub async fn monitor_retrieve_pubkey<B>(&self, backoff: B, action_timeout: Duration)
    where
        B: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        monitor(
            self.chain.clone(),
            self.cancel.clone(),
            self.locks.clone(),
            RetrievePubkey,
            backoff,
            action_timeout,
        )
        .await;
    }

    /// Monitors redemption requests for signature provision.
    ///
    /// Start: redemption requested. Stops: signature provided, deposit
    /// redeemed, keep closed, keep terminated. Recovery action: publish the
    /// keep's signature over the latest redemption digest with
    /// `v = 27 + recovery_id`.
    pub async fn monitor_provide_redemption_signature<B>(
        &self,
        backoff: B,
        action_timeout: Duration,
    ) where
        B: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        monitor(
            self.chain.clone(),
            self.cancel.clone(),
            self.locks.clone(),
            ProvideRedemptionSignature,
            backoff,
            action_timeout,
        )
        .await;
    }

    /// Monitors provided redemption signatures for proof submission,
    /// bumping the redemption fee when the redeemer stalls.
    ///
    /// Start: redemption signature provided. Stops: a new redemption
    /// request (fee bump landed or the redeemer re-requested), deposit
    /// redeemed, keep closed, keep terminated. Recovery action:
    /// `increaseRedemptionFee`, which re-enters the signature monitor via
    /// the fresh on-chain redemption request.
    pub async fn monitor_provide_redemption_proof<B>(&self, backoff: B, action_timeout: Duration)
    where
        B: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        monitor(
            self.chain.clone(),
            self.cancel.clone(),
            self.locks.clone(),
            ProvideRedemptionProof,
            backoff,
            action_timeout,
        )
        .await;
    }

    /// Monitors deposits whose signing group this operator belongs to for
    /// keep termination, triggering cooperative liquidation recovery.
    ///
    /// Start: deposit created. Stops: deposit redeemed, keep closed. On
    /// keep termination the recovery protocol runs once; a failed attempt
    /// is retried on the next process restart.
    pub async fn monitor_liquidation<P>(
        &self,
        recoverer: Arc<LiquidationRecoverer>,
        groups: Arc<P>,
    ) where
        P: KeepGroupProvider + 'static,
    {
        monitor_liquidation(
            self.chain.clone(),
            self.cancel.clone(),
            self.locks.clone(),
            recoverer,
            groups,
        )
        .await;
    }
}

struct RetrievePubkey;

#[async_trait]
impl<C> LifecycleStep<C> for RetrievePubkey
where
    C: TbtcChain + 'static,
{
    fn name(&self) -> &'static str {
        "retrieve-pubkey"
    }

    async fn subscribe_start(&self, chain: &C) -> Subscription<DepositId> {
        chain.on_deposit_created().await
    }

    async fn subscribe_stop(
        &self,
        chain: &C,
        deposit_id: DepositId,
    ) -> Result<Vec<BoxStream<'static, ()>>, ChainError> {
        let keep_id = chain.keep_for_deposit(deposit_id).await?;
        Ok(vec![
            filter_deposit(chain.on_deposit_registered_pubkey().await, deposit_id),
            unit(chain.on_keep_closed(keep_id).await?),
            unit(chain.on_keep_terminated(keep_id).await?),
        ])
    }

    async fn act(&self, chain: &C, deposit_id: DepositId) -> Result<(), MonitorError> {
        if chain.deposit_state(deposit_id).await? != DepositState::AwaitingPubkey {
            debug!(%deposit_id, "deposit is no longer awaiting its pubkey; nothing to do");
            return Ok(());
        }
        chain.retrieve_signer_pubkey(deposit_id).await?;
        Ok(())
    }
}

struct ProvideRedemptionSignature;

#[async_trait]
impl<C> LifecycleStep<C> for ProvideRedemptionSignature
where
    C: TbtcChain + 'static,
{
    fn name(&self) -> &'static str {
        "redemption-signature"
    }

    async fn subscribe_start(&self, chain: &C) -> Subscription<DepositId> {
        chain.on_deposit_redemption_requested().await
    }

    async fn subscribe_stop(
        &self,
        chain: &C,
        deposit_id: DepositId,
    ) -> Result<Vec<BoxStream<'static, ()>>, ChainError> {
        let keep_id = chain.keep_for_deposit(deposit_id).await?;
        Ok(vec![
            filter_deposit(
                chain.on_deposit_got_redemption_signature().await,
                deposit_id,
            ),
            filter_deposit(chain.on_deposit_redeemed().await, deposit_id),
            unit(chain.on_keep_closed(keep_id).await?),
            unit(chain.on_keep_terminated(keep_id).await?),
        ])
    }

    async fn act(&self, chain: &C, deposit_id: DepositId) -> Result<(), MonitorError> {
        if chain.deposit_state(deposit_id).await? != DepositState::AwaitingRedemptionSignature {
            debug!(%deposit_id, "deposit is not awaiting a redemption signature; nothing to do");
            return Ok(());
        }

        let keep_id = chain.keep_for_deposit(deposit_id).await?;

        // The most recent request by block number is authoritative.
        let requests = chain
            .past_deposit_redemption_requested_events(deposit_id, 0)
            .await?;
        let latest = requests
            .iter()
            .max_by_key(|event| event.block_number)
            .ok_or(MonitorError::NoRedemptionRequest(deposit_id))?;

        let start_block = chain
            .signature_requested_block(keep_id, latest.digest)
            .await?;
        let submitted = chain
            .past_signature_submitted_events(keep_id, start_block)
            .await?;
        let submitted = submitted
            .iter()
            .rev()
            .find(|event| event.digest == latest.digest)
            .ok_or(MonitorError::NoMatchingSignature(keep_id))?;

        let signature = EcdsaSignature {
            r: submitted.r,
            s: submitted.s,
            recovery_id: submitted.recovery_id,
        };
        signature.validate().map_err(ChainError::from)?;

        chain
            .provide_redemption_signature(deposit_id, signature.v(), signature.r, signature.s)
            .await?;
        Ok(())
    }
}

struct ProvideRedemptionProof;

#[async_trait]
impl<C> LifecycleStep<C> for ProvideRedemptionProof
where
    C: TbtcChain + 'static,
{
    fn name(&self) -> &'static str {
        "redemption-proof"
    }

    async fn subscribe_start(&self, chain: &C) -> Subscription<DepositId> {
        chain.on_deposit_got_redemption_signature().await
    }

    async fn subscribe_stop(
        &self,
        chain: &C,
        deposit_id: DepositId,
    ) -> Result<Vec<BoxStream<'static, ()>>, ChainError> {
        let keep_id = chain.keep_for_deposit(deposit_id).await?;
        Ok(vec![
            filter_deposit(chain.on_deposit_redemption_requested().await, deposit_id),
            filter_deposit(chain.on_deposit_redeemed().await, deposit_id),
            unit(chain.on_keep_closed(keep_id).await?),
            unit(chain.on_keep_terminated(keep_id).await?),
        ])
    }

    async fn act(&self, chain: &C, deposit_id: DepositId) -> Result<(), MonitorError> {
        if chain.deposit_state(deposit_id).await? != DepositState::AwaitingRedemptionProof {
            debug!(%deposit_id, "deposit is not awaiting a redemption proof; nothing to do");
            return Ok(());
        }

        let requests = chain
            .past_deposit_redemption_requested_events(deposit_id, 0)
            .await?;
        let latest = requests
            .iter()
            .max_by_key(|event| event.block_number)
            .ok_or(MonitorError::NoRedemptionRequest(deposit_id))?;
        // The deposit contract requires the fee to grow by a constant step
        // equal to the initial request's fee.
        let initial_fee = requests
            .iter()
            .min_by_key(|event| event.block_number)
            .ok_or(MonitorError::NoRedemptionRequest(deposit_id))?
            .requested_fee;

        let previous_output_value = latest
            .utxo_value
            .checked_sub(latest.requested_fee)
            .ok_or(MonitorError::InconsistentRedemptionData(deposit_id))?;
        let new_output_value = previous_output_value
            .checked_sub(initial_fee)
            .ok_or(MonitorError::InconsistentRedemptionData(deposit_id))?;

        chain
            .increase_redemption_fee(
                deposit_id,
                previous_output_value.to_le_bytes(),
                new_output_value.to_le_bytes(),
            )
            .await?;
        Ok(())
    }
}
