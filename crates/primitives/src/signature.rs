//! ECDSA signature representation used on the chain side.

use thiserror::Error;

/// `n / 2` for secp256k1, big-endian. Signatures with `s` above this value
/// are malleable and rejected by the keep contract.
const SECP256K1_HALF_ORDER: [u8; 32] = [
    0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b,
    0x20, 0xa0,
];

/// Validation failures for an [`EcdsaSignature`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// The recovery id is outside `0..=3`.
    #[error("recovery id must be in 0..=3, got {0}")]
    InvalidRecoveryId(u8),

    /// `s` is in the upper half of the curve order.
    #[error("signature s value is in the malleable upper half of the curve order")]
    MalleableS,
}

/// A signature produced by a keep's threshold-ECDSA protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcdsaSignature {
    /// Signature `r` component, big-endian.
    pub r: [u8; 32],
    /// Signature `s` component, big-endian.
    pub s: [u8; 32],
    /// Recovery id in `0..=3` identifying which public key recovers from
    /// the signature.
    pub recovery_id: u8,
}

impl EcdsaSignature {
    /// The Ethereum-style `v` value the chain expects: `27 + recovery_id`.
    pub const fn v(&self) -> u8 {
        27 + self.recovery_id
    }

    /// Returns the signature in 64-byte compact `r || s` form.
    pub fn to_compact(&self) -> [u8; 64] {
        let mut compact = [0u8; 64];
        compact[..32].copy_from_slice(&self.r);
        compact[32..].copy_from_slice(&self.s);
        compact
    }

    /// Checks that the recovery id is in range and that `s` is in the lower
    /// half of the curve order.
    pub fn validate(&self) -> Result<(), SignatureError> {
        if self.recovery_id > 3 {
            return Err(SignatureError::InvalidRecoveryId(self.recovery_id));
        }
        if !self.is_low_s() {
            return Err(SignatureError::MalleableS);
        }
        Ok(())
    }

    /// Returns true when `s <= n / 2`.
    pub fn is_low_s(&self) -> bool {
        self.s <= SECP256K1_HALF_ORDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signature_with_s(s: [u8; 32]) -> EcdsaSignature {
        EcdsaSignature {
            r: [1u8; 32],
            s,
            recovery_id: 1,
        }
    }

    #[test]
    fn v_is_27_plus_recovery_id() {
        for recovery_id in 0..=3 {
            let signature = EcdsaSignature {
                r: [1u8; 32],
                s: [1u8; 32],
                recovery_id,
            };
            assert_eq!(signature.v(), 27 + recovery_id);
        }
    }

    #[test]
    fn rejects_out_of_range_recovery_id() {
        let signature = EcdsaSignature {
            r: [1u8; 32],
            s: [1u8; 32],
            recovery_id: 4,
        };
        assert_eq!(
            signature.validate(),
            Err(SignatureError::InvalidRecoveryId(4))
        );
    }

    #[test]
    fn accepts_low_s() {
        assert_eq!(signature_with_s(SECP256K1_HALF_ORDER).validate(), Ok(()));
    }

    #[test]
    fn rejects_high_s() {
        let mut high = SECP256K1_HALF_ORDER;
        high[31] += 1;
        assert_eq!(
            signature_with_s(high).validate(),
            Err(SignatureError::MalleableS)
        );
    }
}
