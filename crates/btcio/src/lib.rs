//! The narrow Bitcoin HTTP surface the engine consumes.
//!
//! The liquidation recovery protocol needs exactly three things from the
//! Bitcoin side: broadcasting a signed transaction, the 25-block fee
//! estimate and an address-usage check. [`BitcoinHandle`] captures that
//! capability set; [`ElectrsClient`] implements it against an Electrs
//! (Esplora-compatible) HTTP API, with every call bounded by the default
//! 1-minute retry deadline.

pub mod electrs;
pub mod error;
pub mod traits;

pub use electrs::ElectrsClient;
pub use error::BtcioError;
pub use traits::BitcoinHandle;
