//! Engine-side views of deposit and keep lifecycle state.

use bitcoin::OutPoint;

/// Lifecycle state of a tBTC deposit as the engine observes it.
///
/// The state advances strictly forward with one exception: a redemption fee
/// increase re-enters [`DepositState::AwaitingRedemptionSignature`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepositState {
    /// The deposit exists but its keep has not registered a public key yet.
    AwaitingPubkey,
    /// The signer group registered a public key; Bitcoin funding is pending.
    AwaitingSignerSetup,
    /// The deposit is funded and can be redeemed.
    AwaitingRedemptionRequest,
    /// A redemption was requested; the keep must sign the redemption digest.
    AwaitingRedemptionSignature,
    /// The redemption signature is on-chain; the redemption transaction
    /// proof is pending.
    AwaitingRedemptionProof,
    /// The redemption proof was accepted.
    Redeemed,
    /// The backing keep was terminated before redemption completed.
    Liquidated,
}

/// On-chain status of a keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepStatus {
    /// The keep is open and able to sign.
    Active,
    /// The keep was closed cleanly.
    Closed,
    /// The keep was terminated, typically due to misbehavior or
    /// liquidation.
    Terminated,
}

/// Arguments of the deposit's `provideRedemptionProof` call: the redeeming
/// Bitcoin transaction broken into its serialized parts plus an SPV proof
/// of its inclusion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedemptionProof {
    /// Transaction version, little-endian.
    pub tx_version: [u8; 4],
    /// Serialized transaction input vector.
    pub tx_input_vector: Vec<u8>,
    /// Serialized transaction output vector.
    pub tx_output_vector: Vec<u8>,
    /// Transaction locktime, little-endian.
    pub tx_locktime: [u8; 4],
    /// Merkle proof of inclusion in a Bitcoin block.
    pub merkle_proof: Vec<u8>,
    /// Index of the transaction in the proving block.
    pub tx_index_in_block: Vec<u8>,
    /// Serialized Bitcoin headers confirming the proving block.
    pub bitcoin_headers: Vec<u8>,
}

/// The Bitcoin unspent output backing a deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundingInfo {
    /// Outpoint of the funding transaction output held by the keep.
    pub outpoint: OutPoint,

    /// Value of the funding output in satoshi.
    pub value: u64,
}
