//! Deposit-side chain capabilities.

use async_trait::async_trait;
use keep_tbtc_primitives::{
    events::DepositRedemptionRequestedEvent, DepositId, DepositState, FundingInfo, KeepId,
    RedemptionProof, Subscription,
};

use crate::error::ChainError;

/// Capabilities of the tBTC `TBTCSystem` and `Deposit` contracts the engine
/// consumes.
#[async_trait]
pub trait DepositChain: Send + Sync {
    /// Fires for every newly created deposit.
    async fn on_deposit_created(&self) -> Subscription<DepositId>;

    /// Fires when a deposit registers its signer public key.
    async fn on_deposit_registered_pubkey(&self) -> Subscription<DepositId>;

    /// Fires when a redemption is requested for a deposit, including the
    /// re-requests caused by fee increases.
    async fn on_deposit_redemption_requested(&self) -> Subscription<DepositId>;

    /// Fires when a deposit receives its redemption signature.
    async fn on_deposit_got_redemption_signature(&self) -> Subscription<DepositId>;

    /// Fires when a deposit is redeemed.
    async fn on_deposit_redeemed(&self) -> Subscription<DepositId>;

    /// The keep backing the given deposit.
    async fn keep_for_deposit(&self, deposit_id: DepositId) -> Result<KeepId, ChainError>;

    /// The deposit's current lifecycle state.
    async fn deposit_state(&self, deposit_id: DepositId) -> Result<DepositState, ChainError>;

    /// The Bitcoin UTXO backing the deposit.
    async fn funding_info(&self, deposit_id: DepositId) -> Result<FundingInfo, ChainError>;

    /// All redemption-requested events for the deposit from `start_block`
    /// onwards, ascending by block number.
    async fn past_deposit_redemption_requested_events(
        &self,
        deposit_id: DepositId,
        start_block: u64,
    ) -> Result<Vec<DepositRedemptionRequestedEvent>, ChainError>;

    /// Copies the keep's published public key into the deposit contract.
    async fn retrieve_signer_pubkey(&self, deposit_id: DepositId) -> Result<(), ChainError>;

    /// Publishes the keep's redemption signature to the deposit, with
    /// `v = 27 + recovery_id`.
    async fn provide_redemption_signature(
        &self,
        deposit_id: DepositId,
        v: u8,
        r: [u8; 32],
        s: [u8; 32],
    ) -> Result<(), ChainError>;

    /// Bumps the deposit's redemption fee. Output values are 8-byte
    /// little-endian satoshi amounts.
    async fn increase_redemption_fee(
        &self,
        deposit_id: DepositId,
        previous_output_value: [u8; 8],
        new_output_value: [u8; 8],
    ) -> Result<(), ChainError>;

    /// Submits the SPV proof of the redeeming Bitcoin transaction.
    async fn provide_redemption_proof(
        &self,
        deposit_id: DepositId,
        proof: RedemptionProof,
    ) -> Result<(), ChainError>;
}
