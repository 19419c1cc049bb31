//! Liquidation recovery for terminated keeps.
//!
//! When a keep is terminated before its deposit is redeemed, the bonded
//! funds are lost but the deposit's Bitcoin UTXO is still controlled by the
//! keep's signing group. This crate implements the cooperative protocol
//! that splits that UTXO between the members' liquidation addresses:
//! address derivation from each member's extended public key
//! ([`derive`]), the durable index store that keeps payouts non-colliding
//! across runs ([`storage`]), deterministic construction and BIP-143
//! signing of the split transaction ([`tx`]), and the member coordination
//! protocol itself ([`protocol`]).

pub mod derive;
pub mod errors;
pub mod group;
pub mod messages;
pub mod protocol;
pub mod storage;
pub mod tx;

pub use derive::{derive_address, DeriveAddressError};
pub use errors::RecoveryError;
pub use group::{GroupError, KeepGroup, KeepGroupProvider};
pub use messages::LiquidationAnnouncement;
pub use protocol::LiquidationRecoverer;
pub use storage::{DerivationIndexStorage, StorageError};
