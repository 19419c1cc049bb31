//! In-process test doubles for the keep-tbtc engine.
//!
//! [`LocalChain`] mocks the behavior of a real chain backend, without the
//! complexity of deployments, accounts and async transactions, by invoking
//! subscription handlers directly. For use in tests ONLY.

pub mod bitcoin_handle;
pub mod groups;
pub mod local_chain;

pub use bitcoin_handle::RecordingBitcoinHandle;
pub use groups::{LoopbackGroup, LoopbackGroupProvider};
pub use local_chain::{random_signing_group, LocalChain, OnChainSignature};
