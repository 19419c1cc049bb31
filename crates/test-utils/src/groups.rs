//! Loopback signing-group doubles.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use keep_tbtc_primitives::{EcdsaSignature, KeepId, Subscription};
use keep_tbtc_recovery::{GroupError, KeepGroup, KeepGroupProvider, LiquidationAnnouncement};
use secp256k1::{Message, PublicKey, SecretKey, SECP256K1};
use tokio::sync::mpsc::UnboundedSender;

/// A single-process stand-in for a keep's off-chain group: announcements
/// fan out to every subscriber (including the publisher) and the
/// threshold-signing protocol collapses to one plain secp256k1 keypair.
#[derive(Debug)]
pub struct LoopbackGroup {
    subscribers: Mutex<Vec<UnboundedSender<LiquidationAnnouncement>>>,
    secret: SecretKey,
}

impl LoopbackGroup {
    /// Creates a group with a random signing key.
    pub fn new() -> Self {
        Self::from_secret(SecretKey::new(&mut rand::thread_rng()))
    }

    /// Creates a group signing with the given key.
    pub fn from_secret(secret: SecretKey) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            secret,
        }
    }

    /// The group's public key as a secp256k1 point.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_secret_key(SECP256K1, &self.secret)
    }

    /// The group's public key in the 64-byte on-chain form (`x || y`).
    pub fn keep_public_key_bytes(&self) -> [u8; 64] {
        self.public_key().serialize_uncompressed()[1..]
            .try_into()
            .expect("uncompressed key payload is 64 bytes")
    }
}

impl Default for LoopbackGroup {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeepGroup for LoopbackGroup {
    async fn publish(&self, announcement: LiquidationAnnouncement) -> Result<(), GroupError> {
        self.subscribers
            .lock()
            .expect("loopback group subscribers poisoned")
            .retain(|subscriber| subscriber.send(announcement.clone()).is_ok());
        Ok(())
    }

    async fn announcements(&self) -> Result<Subscription<LiquidationAnnouncement>, GroupError> {
        let (sender, subscription) = Subscription::channel();
        self.subscribers
            .lock()
            .expect("loopback group subscribers poisoned")
            .push(sender);
        Ok(subscription)
    }

    async fn sign(&self, digest: [u8; 32]) -> Result<EcdsaSignature, GroupError> {
        let message = Message::from_digest(digest);
        let (recovery_id, compact) = SECP256K1
            .sign_ecdsa_recoverable(&message, &self.secret)
            .serialize_compact();
        Ok(EcdsaSignature {
            r: compact[..32].try_into().expect("compact r is 32 bytes"),
            s: compact[32..].try_into().expect("compact s is 32 bytes"),
            recovery_id: recovery_id.to_i32() as u8,
        })
    }
}

/// Hands out the same [`LoopbackGroup`] for every keep.
#[derive(Debug, Clone)]
pub struct LoopbackGroupProvider {
    group: Arc<LoopbackGroup>,
}

impl LoopbackGroupProvider {
    /// Wraps a shared group.
    pub fn new(group: Arc<LoopbackGroup>) -> Self {
        Self { group }
    }
}

#[async_trait]
impl KeepGroupProvider for LoopbackGroupProvider {
    async fn group(&self, _keep_id: KeepId) -> Result<Arc<dyn KeepGroup>, GroupError> {
        Ok(self.group.clone())
    }
}
