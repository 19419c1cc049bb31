//! Bitcoin address derivation from extended public keys.

use bitcoin::{
    base58,
    bip32::{ChildNumber, Xpub},
    hashes::Hash,
    Address, Network, PubkeyHash,
};
use secp256k1::SECP256K1;
use thiserror::Error;

/// Depth of the external chain node (`m/purpose'/coin'/account'/0`) in the
/// BIP-44/49/84 hierarchies.
const EXTERNAL_CHAIN_DEPTH: u8 = 4;

/// Serialized extended key length: version, depth, fingerprint, child
/// number, chain code and key material.
const EXTENDED_KEY_LEN: usize = 78;

/// BIP-32 mainnet public key version bytes (`xpub`).
const MAINNET_VERSION: [u8; 4] = [0x04, 0x88, 0xb2, 0x1e];

/// BIP-32 testnet public key version bytes (`tpub`).
const TESTNET_VERSION: [u8; 4] = [0x04, 0x35, 0x87, 0xcf];

/// Errors from [`derive_address`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeriveAddressError {
    /// The extended public key could not be parsed.
    #[error("error parsing extended public key: [{0}]")]
    InvalidExtendedKey(String),

    /// The extended key prefix does not select a known network and address
    /// form.
    #[error("unknown extended public key prefix [{0}]")]
    UnknownPrefix(String),

    /// The requested child index cannot be derived (hardened range).
    #[error("address index [{0}] is out of the derivable range")]
    DerivationOutOfRange(u32),
}

/// Address form selected by the extended key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AddressForm {
    /// Legacy pay-to-pubkey-hash (`xpub`/`tpub`).
    P2pkh,
    /// P2WPKH nested in P2SH (`ypub`/`upub`).
    P2shWpkh,
    /// Native segwit pay-to-witness-pubkey-hash (`zpub`/`vpub`).
    P2wpkh,
}

fn classify_prefix(prefix: &str) -> Option<(Network, AddressForm)> {
    match prefix {
        "xpub" => Some((Network::Bitcoin, AddressForm::P2pkh)),
        "ypub" => Some((Network::Bitcoin, AddressForm::P2shWpkh)),
        "zpub" => Some((Network::Bitcoin, AddressForm::P2wpkh)),
        "tpub" => Some((Network::Testnet, AddressForm::P2pkh)),
        "upub" => Some((Network::Testnet, AddressForm::P2shWpkh)),
        "vpub" => Some((Network::Testnet, AddressForm::P2wpkh)),
        _ => None,
    }
}

/// Uses the specified extended public key and address index to derive an
/// address string in the appropriate format at the specified index.
///
/// The extended public key can be at any level. Derivation takes the first
/// child `/0` until a depth of 4 is reached, and then produces the address
/// at the supplied index; an extended key generated at `m/44'/0'` with
/// address index 5 thus yields the address at `m/44'/0'/0/0/5`. Keys
/// already at depth 4 derive the address index directly.
///
/// The returned address is P2PKH for `xpub`/`tpub` prefixes, P2WPKH nested
/// in P2SH for `ypub`/`upub`, and bech32 P2WPKH for `zpub`/`vpub`; the
/// prefix also selects mainnet versus testnet3 encoding.
///
/// This is a pure function: equal inputs yield byte-equal outputs.
pub fn derive_address(
    extended_public_key: &str,
    address_index: u32,
) -> Result<String, DeriveAddressError> {
    let prefix = extended_public_key
        .get(0..4)
        .ok_or_else(|| DeriveAddressError::UnknownPrefix(extended_public_key.to_owned()))?;
    let (network, form) = classify_prefix(prefix)
        .ok_or_else(|| DeriveAddressError::UnknownPrefix(prefix.to_owned()))?;

    // SLIP-132 prefixes reuse the BIP-32 payload with alternative version
    // bytes; normalize to the standard version so the key parses.
    let mut data = base58::decode_check(extended_public_key)
        .map_err(|e| DeriveAddressError::InvalidExtendedKey(e.to_string()))?;
    if data.len() != EXTENDED_KEY_LEN {
        return Err(DeriveAddressError::InvalidExtendedKey(format!(
            "wrong extended key length [{}]",
            data.len()
        )));
    }
    data[0..4].copy_from_slice(match network {
        Network::Bitcoin => &MAINNET_VERSION,
        _ => &TESTNET_VERSION,
    });

    let mut external_chain = Xpub::decode(&data)
        .map_err(|e| DeriveAddressError::InvalidExtendedKey(e.to_string()))?;

    // Descend the hierarchy at /0 until the external chain path `m/*/*/*/0`.
    while external_chain.depth < EXTERNAL_CHAIN_DEPTH {
        external_chain = external_chain
            .ckd_pub(SECP256K1, ChildNumber::Normal { index: 0 })
            .map_err(|e| DeriveAddressError::InvalidExtendedKey(e.to_string()))?;
    }

    let child = ChildNumber::from_normal_idx(address_index)
        .map_err(|_| DeriveAddressError::DerivationOutOfRange(address_index))?;
    let requested = external_chain
        .ckd_pub(SECP256K1, child)
        .map_err(|e| DeriveAddressError::InvalidExtendedKey(e.to_string()))?;

    let public_key = requested.to_pub();
    let address = match form {
        AddressForm::P2pkh => {
            Address::p2pkh(PubkeyHash::hash(&public_key.to_bytes()), network)
        }
        AddressForm::P2shWpkh => Address::p2shwpkh(&public_key, network),
        AddressForm::P2wpkh => Address::p2wpkh(&public_key, network),
    };

    Ok(address.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Account-level (depth 3) key from the BIP-84 test vectors,
    /// `m/84'/0'/0'` of the "abandon … about" seed.
    const BIP84_ACCOUNT_ZPUB: &str = "zpub6rFR7y4Q2AijBEqTUquhVz398htDFrtymD9xYYfG1m4wAcvPhXNfE3EfH1r1ADqtfSdVCToUG868RvUUkgDKf31mGDtKsAYz2oz2AGutZYs";

    /// Account-level key from the BIP-44 test vectors, `m/44'/0'/0'` of the
    /// same seed.
    const BIP44_ACCOUNT_XPUB: &str = "xpub6BosfCnifzxcFwrSzQiqu2DBVTshkCXacvNsWGYJVVhhawA7d4R5WSWGFNbi8Aw6ZRc1brxMyWMzG3DSSSSoekkudhUd9yLb6qx39T9nMdj";

    const YPUB: &str = "ypub6ZpieGfpesfH3KqGr4zZPETidCze6RzeNMz7FLnSPgABwyQNZZmpA4tpUYFn53xtHkHXaoGviseJJcFhSn3Kw9sgzsiSnP5xEqp6Z2Yy4ZH";

    /// SLIP-132 version bytes.
    const ZPUB_VERSION: [u8; 4] = [0x04, 0xb2, 0x47, 0x46];
    const TPUB_VERSION: [u8; 4] = [0x04, 0x35, 0x87, 0xcf];
    const UPUB_VERSION: [u8; 4] = [0x04, 0x4a, 0x52, 0x62];
    const VPUB_VERSION: [u8; 4] = [0x04, 0x5f, 0x1c, 0xf6];

    /// Re-encodes a known-good extended key under different version bytes.
    fn with_version(key: &str, version: [u8; 4]) -> String {
        let mut data = base58::decode_check(key).unwrap();
        data[0..4].copy_from_slice(&version);
        base58::encode_check(&data)
    }

    #[test]
    fn derives_bip84_receiving_addresses() {
        assert_eq!(
            derive_address(BIP84_ACCOUNT_ZPUB, 0).unwrap(),
            "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu"
        );
        assert_eq!(
            derive_address(BIP84_ACCOUNT_ZPUB, 1).unwrap(),
            "bc1qnjg0jd8228aq7egyzacy8cys3knf9xvrerkf9g"
        );
    }

    #[test]
    fn derives_bip44_receiving_address() {
        assert_eq!(
            derive_address(BIP44_ACCOUNT_XPUB, 0).unwrap(),
            "1LqBGSKuX5yYUonjxT5qGfpUsXKYYWeabA"
        );
    }

    #[test]
    fn address_form_follows_prefix() {
        let p2sh = derive_address(YPUB, 0).unwrap();
        assert!(p2sh.starts_with('3'), "ypub must yield a P2SH address, got {p2sh}");

        let tpub = with_version(BIP44_ACCOUNT_XPUB, TPUB_VERSION);
        assert!(tpub.starts_with("tpub"));
        let testnet_p2pkh = derive_address(&tpub, 0).unwrap();
        assert!(
            testnet_p2pkh.starts_with('m') || testnet_p2pkh.starts_with('n'),
            "tpub must yield a testnet P2PKH address, got {testnet_p2pkh}"
        );

        let upub = with_version(BIP44_ACCOUNT_XPUB, UPUB_VERSION);
        assert!(upub.starts_with("upub"));
        let nested = derive_address(&upub, 0).unwrap();
        assert!(
            nested.starts_with('2'),
            "upub must yield a testnet P2SH address, got {nested}"
        );

        let vpub = with_version(BIP84_ACCOUNT_ZPUB, VPUB_VERSION);
        assert!(vpub.starts_with("vpub"));
        let bech32 = derive_address(&vpub, 0).unwrap();
        assert!(
            bech32.starts_with("tb1q"),
            "vpub must yield a testnet bech32 address, got {bech32}"
        );
    }

    #[test]
    fn depth_four_keys_derive_the_index_directly() {
        // Build the external-chain (depth 4) variant of the account key and
        // re-encode it with the zpub version bytes.
        let mut data = base58::decode_check(BIP84_ACCOUNT_ZPUB).unwrap();
        data[0..4].copy_from_slice(&MAINNET_VERSION);
        let account = Xpub::decode(&data).unwrap();
        let external = account
            .ckd_pub(SECP256K1, ChildNumber::Normal { index: 0 })
            .unwrap();
        let mut encoded = external.encode();
        encoded[0..4].copy_from_slice(&ZPUB_VERSION);
        let external_zpub = base58::encode_check(&encoded);
        assert!(external_zpub.starts_with("zpub"));

        assert_eq!(external.depth, 4);
        assert_eq!(
            derive_address(&external_zpub, 0).unwrap(),
            derive_address(BIP84_ACCOUNT_ZPUB, 0).unwrap()
        );
        assert_eq!(
            derive_address(&external_zpub, 7).unwrap(),
            derive_address(BIP84_ACCOUNT_ZPUB, 7).unwrap()
        );
    }

    #[test]
    fn derivation_is_deterministic() {
        let first = derive_address(BIP84_ACCOUNT_ZPUB, 42).unwrap();
        let second = derive_address(BIP84_ACCOUNT_ZPUB, 42).unwrap();
        assert_eq!(first, second);
        assert_ne!(first, derive_address(BIP84_ACCOUNT_ZPUB, 43).unwrap());
    }

    #[test]
    fn rejects_unknown_prefixes() {
        assert_eq!(
            derive_address("apub6Cg41S2", 0),
            Err(DeriveAddressError::UnknownPrefix("apub".to_owned()))
        );
        assert!(matches!(
            derive_address("xp", 0),
            Err(DeriveAddressError::UnknownPrefix(_))
        ));
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(matches!(
            derive_address("xpub6NotAValidKey", 0),
            Err(DeriveAddressError::InvalidExtendedKey(_))
        ));
    }

    #[test]
    fn rejects_hardened_indices() {
        assert_eq!(
            derive_address(BIP84_ACCOUNT_ZPUB, 1 << 31),
            Err(DeriveAddressError::DerivationOutOfRange(1 << 31))
        );
    }
}
