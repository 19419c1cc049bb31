//! Chain-side identifiers.
//!
//! Keeps, deposits and operators are all identified by 20-byte contract or
//! account addresses on the host chain. [`KeepId`] and [`DepositId`] are
//! distinct newtypes so that a keep handle can never be passed where a
//! deposit handle is expected.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when parsing an [`Address`] from its hex form.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AddressParseError {
    /// The input was not valid hexadecimal.
    #[error("address is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// The decoded input was not exactly 20 bytes.
    #[error("address must be 20 bytes, got {0}")]
    InvalidLength(usize),
}

/// A 20-byte account or contract address on the host chain.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address([u8; 20]);

impl Address {
    /// Wraps raw address bytes.
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Returns the raw address bytes.
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped)?;
        let bytes: [u8; 20] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AddressParseError::InvalidLength(bytes.len()))?;
        Ok(Self(bytes))
    }
}

/// The chain address an operator stakes and submits transactions from.
pub type OperatorId = Address;

macro_rules! address_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Serialize,
            Deserialize,
        )]
        pub struct $name(pub Address);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Address> for $name {
            fn from(address: Address) -> Self {
                Self(address)
            }
        }
    };
}

address_newtype!(
    /// Address of a deployed `BondedECDSAKeep` contract.
    KeepId
);

address_newtype!(
    /// Address of a deployed tBTC `Deposit` contract.
    DepositId
);
