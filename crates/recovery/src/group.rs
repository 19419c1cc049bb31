//! Collaborator traits for a keep's off-chain signing group.
//!
//! The DKG/signing protocols and their transport live outside this
//! repository; liquidation recovery only needs the narrow surface defined
//! here: a broadcast channel between the keep's members and the ability to
//! have the group threshold-sign a digest.

use std::sync::Arc;

use async_trait::async_trait;
use keep_tbtc_primitives::{EcdsaSignature, KeepId, Subscription};
use thiserror::Error;

use crate::messages::LiquidationAnnouncement;

/// Errors surfaced by signing-group collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupError {
    /// The broadcast channel failed.
    #[error("broadcast channel failed: {0}")]
    Transport(String),

    /// The signing protocol failed or was rejected.
    #[error("signing failed: {0}")]
    Signing(String),

    /// This operator holds no signer share for the keep.
    #[error("no signing group handle for keep [{0}]")]
    UnknownKeep(KeepId),
}

/// Off-chain capabilities of one keep's signing group.
#[async_trait]
pub trait KeepGroup: Send + Sync {
    /// Broadcasts an announcement to every member of the group, including
    /// this one.
    async fn publish(&self, announcement: LiquidationAnnouncement) -> Result<(), GroupError>;

    /// Subscribes to announcements broadcast within the group.
    async fn announcements(&self) -> Result<Subscription<LiquidationAnnouncement>, GroupError>;

    /// Runs the threshold-ECDSA signing protocol over the given digest.
    async fn sign(&self, digest: [u8; 32]) -> Result<EcdsaSignature, GroupError>;
}

/// Hands out [`KeepGroup`] handles for keeps this operator is a member of.
#[async_trait]
pub trait KeepGroupProvider: Send + Sync {
    /// Returns the group handle for the given keep.
    async fn group(&self, keep_id: KeepId) -> Result<Arc<dyn KeepGroup>, GroupError>;
}
