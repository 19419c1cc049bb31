//! Domain types shared across the keep-tbtc operator engine.
//!
//! This crate defines the chain-side identifiers (keeps, deposits,
//! operators), the on-chain event payloads the engine consumes, the ECDSA
//! signature representation used when publishing redemption signatures, and
//! the generic [`Subscription`] stream that every chain event subscription
//! hands out.

pub mod address;
pub mod deposit;
pub mod events;
pub mod signature;
pub mod subscription;

pub use address::{Address, AddressParseError, DepositId, KeepId, OperatorId};
pub use deposit::{DepositState, FundingInfo, KeepStatus, RedemptionProof};
pub use signature::{EcdsaSignature, SignatureError};
pub use subscription::Subscription;
