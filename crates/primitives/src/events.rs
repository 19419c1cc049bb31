//! On-chain event payloads consumed by the engine.
//!
//! The field sets mirror the events emitted by the `BondedECDSAKeepFactory`,
//! `BondedECDSAKeep` and tBTC `Deposit`/`TBTCSystem` contracts. Events are
//! delivered at-least-once; consumers must be idempotent.

use crate::address::{DepositId, KeepId, OperatorId};

/// A new bonded keep was created and this set of members was selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BondedKeepCreatedEvent {
    /// Address of the freshly cloned keep contract.
    pub keep_id: KeepId,
    /// Operators selected into the signing group.
    pub members: Vec<OperatorId>,
    /// Minimum number of honest members required to sign.
    pub honest_threshold: u64,
    /// Block the event was emitted in.
    pub block_number: u64,
}

/// A keep was closed cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepClosedEvent {
    /// Block the event was emitted in.
    pub block_number: u64,
}

/// A keep was terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepTerminatedEvent {
    /// Block the event was emitted in.
    pub block_number: u64,
}

/// All members agreed on the keep public key and it was published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyPublishedEvent {
    /// The 64-byte uncompressed public key, without the `0x04` prefix.
    pub public_key: Vec<u8>,
    /// Block the event was emitted in.
    pub block_number: u64,
}

/// A member submitted a public key conflicting with an earlier submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictingPublicKeySubmittedEvent {
    /// The member whose submission conflicted.
    pub submitting_member: OperatorId,
    /// The conflicting key bytes.
    pub conflicting_public_key: Vec<u8>,
    /// Block the event was emitted in.
    pub block_number: u64,
}

/// The keep was asked to sign a digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureRequestedEvent {
    /// The 32-byte digest to sign.
    pub digest: [u8; 32],
    /// Block the event was emitted in.
    pub block_number: u64,
}

/// The keep published a signature over a previously requested digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureSubmittedEvent {
    /// The digest the signature covers.
    pub digest: [u8; 32],
    /// Signature `r` component.
    pub r: [u8; 32],
    /// Signature `s` component.
    pub s: [u8; 32],
    /// Recovery id in `0..=3`.
    pub recovery_id: u8,
    /// Block the event was emitted in.
    pub block_number: u64,
}

/// A redemption was requested for a deposit.
///
/// Requests are append-only per deposit; the most recent one by block
/// number is authoritative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositRedemptionRequestedEvent {
    /// The deposit being redeemed.
    pub deposit_id: DepositId,
    /// Sighash digest the keep is expected to sign.
    pub digest: [u8; 32],
    /// Value of the deposit UTXO in satoshi.
    pub utxo_value: u64,
    /// Output script the redeemer wants to be paid to.
    pub redeemer_output_script: Vec<u8>,
    /// Redemption fee requested, in satoshi.
    pub requested_fee: u64,
    /// Serialized outpoint of the deposit UTXO.
    pub outpoint: Vec<u8>,
    /// Block the event was emitted in.
    pub block_number: u64,
}
