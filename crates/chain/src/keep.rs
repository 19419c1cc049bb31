//! Keep-side chain capabilities.

use async_trait::async_trait;
use keep_tbtc_primitives::{
    events::{
        BondedKeepCreatedEvent, ConflictingPublicKeySubmittedEvent, KeepClosedEvent,
        KeepTerminatedEvent, PublicKeyPublishedEvent, SignatureRequestedEvent,
        SignatureSubmittedEvent,
    },
    EcdsaSignature, KeepId, OperatorId, Subscription,
};

use crate::error::ChainError;

/// Capabilities of the `BondedECDSAKeepFactory` and `BondedECDSAKeep`
/// contracts the engine consumes.
///
/// Per-keep subscriptions are expected to catch up over roughly the last
/// 2000 blocks on (re)connect, so a subscriber that comes up late still
/// observes recent lifecycle events.
#[async_trait]
pub trait KeepChain: Send + Sync {
    /// This operator's own chain address.
    fn operator_address(&self) -> OperatorId;

    /// Fires once for every newly created bonded keep.
    async fn on_bonded_keep_created(&self) -> Subscription<BondedKeepCreatedEvent>;

    /// Fires when the given keep is closed cleanly.
    async fn on_keep_closed(
        &self,
        keep_id: KeepId,
    ) -> Result<Subscription<KeepClosedEvent>, ChainError>;

    /// Fires when the given keep is terminated.
    async fn on_keep_terminated(
        &self,
        keep_id: KeepId,
    ) -> Result<Subscription<KeepTerminatedEvent>, ChainError>;

    /// Fires when the given keep is asked to sign a digest.
    async fn on_signature_requested(
        &self,
        keep_id: KeepId,
    ) -> Result<Subscription<SignatureRequestedEvent>, ChainError>;

    /// Fires when the given keep publishes its agreed public key.
    async fn on_public_key_published(
        &self,
        keep_id: KeepId,
    ) -> Result<Subscription<PublicKeyPublishedEvent>, ChainError>;

    /// Fires when a member of the given keep submits a public key that
    /// conflicts with an earlier submission.
    async fn on_conflicting_public_key_submitted(
        &self,
        keep_id: KeepId,
    ) -> Result<Subscription<ConflictingPublicKeySubmittedEvent>, ChainError>;

    /// Submits this member's copy of the keep public key. The key is
    /// written exactly once, when all members agree.
    async fn submit_keep_public_key(
        &self,
        keep_id: KeepId,
        public_key: [u8; 64],
    ) -> Result<(), ChainError>;

    /// Submits a signature produced by the keep's signing protocol.
    async fn submit_signature(
        &self,
        keep_id: KeepId,
        signature: &EcdsaSignature,
    ) -> Result<(), ChainError>;

    /// Whether the keep is still active.
    async fn is_active(&self, keep_id: KeepId) -> Result<bool, ChainError>;

    /// The keep's 64-byte public key, or an empty vector if it has not
    /// been published yet.
    async fn keep_public_key(&self, keep_id: KeepId) -> Result<Vec<u8>, ChainError>;

    /// The keep's signing group members.
    async fn members(&self, keep_id: KeepId) -> Result<Vec<OperatorId>, ChainError>;

    /// The keep's honest threshold.
    async fn honest_threshold(&self, keep_id: KeepId) -> Result<u64, ChainError>;

    /// Unix timestamp of the keep's creation.
    async fn opened_timestamp(&self, keep_id: KeepId) -> Result<u64, ChainError>;

    /// The digest most recently requested to be signed.
    async fn latest_digest(&self, keep_id: KeepId) -> Result<[u8; 32], ChainError>;

    /// Block at which a signature over the given digest was requested, or
    /// 0 when it never was.
    async fn signature_requested_block(
        &self,
        keep_id: KeepId,
        digest: [u8; 32],
    ) -> Result<u64, ChainError>;

    /// All signature-submitted events for the keep from `start_block`
    /// onwards, ascending by block number.
    async fn past_signature_submitted_events(
        &self,
        keep_id: KeepId,
        start_block: u64,
    ) -> Result<Vec<SignatureSubmittedEvent>, ChainError>;
}
