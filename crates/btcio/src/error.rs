//! Error types for the Bitcoin HTTP surface.

use thiserror::Error;

/// Errors returned by [`crate::BitcoinHandle`] implementations.
#[derive(Debug, Error)]
pub enum BtcioError {
    /// The client was configured without an API URL. Broadcast is disabled
    /// in this configuration.
    #[error("attempted to call {0} with no API URL")]
    NoApiUrl(&'static str),

    /// The supplied Bitcoin address could not be parsed.
    #[error("invalid bitcoin address [{address}]: {reason}")]
    InvalidAddress {
        /// The offending address string.
        address: String,
        /// Parser error message.
        reason: String,
    },

    /// The underlying Esplora client failed.
    #[error("esplora client error: {0}")]
    Client(#[from] esplora_client::Error),
}
