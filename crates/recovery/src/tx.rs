//! Deterministic construction and BIP-143 signing of the liquidation
//! split transaction.
//!
//! Every signing group member must assemble byte-identical transactions, so
//! construction takes only chain-derived inputs and the agreed recipient
//! list, already ordered.

use std::str::FromStr;

use bitcoin::{
    absolute,
    address::NetworkUnchecked,
    hashes::{hash160, Hash},
    sighash::SighashCache,
    transaction::Version,
    Address, Amount, EcdsaSighashType, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut,
    Txid, Witness,
};
use keep_tbtc_primitives::EcdsaSignature;
use secp256k1::PublicKey;
use thiserror::Error;

/// Size of the DER signature placeholder used for fee estimation: the
/// maximum DER encoding plus the sighash-type byte.
const SIGNATURE_PLACEHOLDER_LEN: usize = 73;

/// Size of the compressed public key placeholder used for fee estimation.
const PUBKEY_PLACEHOLDER_LEN: usize = 33;

/// Length of the BIP-143 P2WPKH script code, including its leading
/// compact-size byte.
pub const P2WPKH_SCRIPT_CODE_LEN: usize = 26;

/// Errors from transaction composition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    /// The previous output transaction hash could not be parsed.
    #[error("invalid previous output transaction hash: {0}")]
    InvalidTxid(String),

    /// A recipient address could not be parsed for the target network.
    #[error("invalid recipient address [{address}]: {reason}")]
    InvalidRecipient {
        /// The offending address.
        address: String,
        /// Parser error message.
        reason: String,
    },

    /// No member contributed a recipient address.
    #[error("no recipient addresses to pay out to")]
    NoRecipients,

    /// The estimated fee leaves nothing to distribute.
    #[error("fee of {fee} sat exceeds the utxo value of {utxo_value} sat")]
    FeeExceedsUtxoValue {
        /// Total transaction fee in satoshi.
        fee: u64,
        /// Value of the spent output in satoshi.
        utxo_value: u64,
    },

    /// The keep public key is not a valid 64-byte uncompressed key.
    #[error("invalid keep public key: {0}")]
    InvalidKeepPublicKey(String),

    /// The signature could not be DER-encoded.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Sighash computation failed.
    #[error("sighash computation failed: {0}")]
    Sighash(String),

    /// The transaction to sign does not have exactly one input.
    #[error("expected a single-input transaction, got {0} inputs")]
    UnexpectedInputCount(usize),
}

/// Interprets a keep's on-chain public key (64 bytes, `x || y`) as a
/// secp256k1 point.
pub fn keep_public_key_from_bytes(bytes: &[u8]) -> Result<PublicKey, TransactionError> {
    if bytes.len() != 64 {
        return Err(TransactionError::InvalidKeepPublicKey(format!(
            "expected 64 bytes, got {}",
            bytes.len()
        )));
    }
    let mut uncompressed = [0u8; 65];
    uncompressed[0] = 0x04;
    uncompressed[1..].copy_from_slice(bytes);
    PublicKey::from_slice(&uncompressed)
        .map_err(|e| TransactionError::InvalidKeepPublicKey(e.to_string()))
}

/// Computes the BIP-143 script code for spending a P2WPKH output held by
/// `public_key`: `0x19 76a914 {hash160(compressed key)} 88ac`, exactly
/// [`P2WPKH_SCRIPT_CODE_LEN`] bytes including the leading length byte.
pub fn public_key_to_p2wpkh_script_code(public_key: &PublicKey) -> [u8; P2WPKH_SCRIPT_CODE_LEN] {
    let key_hash = hash160::Hash::hash(&public_key.serialize());

    let mut script_code = [0u8; P2WPKH_SCRIPT_CODE_LEN];
    script_code[0] = 0x19; // compact-size length of the script code
    script_code[1] = 0x76; // OP_DUP
    script_code[2] = 0xa9; // OP_HASH160
    script_code[3] = 0x14; // 20-byte push
    script_code[4..24].copy_from_slice(&key_hash.to_byte_array());
    script_code[24] = 0x88; // OP_EQUALVERIFY
    script_code[25] = 0xac; // OP_CHECKSIG
    script_code
}

/// Builds the unsigned liquidation transaction: version 1, a single input
/// spending `(previous_output_tx_hash, previous_output_index)`, one P2WPKH
/// output per recipient paying `⌊(value − fee)/n⌋` satoshi, lock time 0.
///
/// `max_fee_per_vbyte` is multiplied by the virtual size of the
/// transaction, measured with placeholder witness data of the final size.
/// The division remainder stays with the fee.
pub fn construct_unsigned_transaction(
    previous_output_tx_hash: &str,
    previous_output_index: u32,
    previous_output_value: u64,
    max_fee_per_vbyte: u64,
    recipient_addresses: &[String],
    network: bitcoin::Network,
) -> Result<Transaction, TransactionError> {
    if recipient_addresses.is_empty() {
        return Err(TransactionError::NoRecipients);
    }

    let txid = Txid::from_str(previous_output_tx_hash)
        .map_err(|e| TransactionError::InvalidTxid(e.to_string()))?;

    let output = recipient_addresses
        .iter()
        .map(|address| {
            let script_pubkey = Address::<NetworkUnchecked>::from_str(address)
                .map_err(|e| e.to_string())
                .and_then(|parsed| parsed.require_network(network).map_err(|e| e.to_string()))
                .map_err(|e| TransactionError::InvalidRecipient {
                    address: address.clone(),
                    reason: e.to_string(),
                })?
                .script_pubkey();
            Ok(TxOut {
                value: Amount::ZERO,
                script_pubkey,
            })
        })
        .collect::<Result<Vec<_>, TransactionError>>()?;

    let mut transaction = Transaction {
        version: Version::ONE,
        lock_time: absolute::LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint {
                txid,
                vout: previous_output_index,
            },
            script_sig: ScriptBuf::new(),
            sequence: Sequence::ZERO,
            witness: Witness::from_slice(&[
                vec![0u8; SIGNATURE_PLACEHOLDER_LEN],
                vec![0u8; PUBKEY_PLACEHOLDER_LEN],
            ]),
        }],
        output,
    };

    let fee = max_fee_per_vbyte * transaction.vsize() as u64;
    let distributable = previous_output_value
        .checked_sub(fee)
        .ok_or(TransactionError::FeeExceedsUtxoValue {
            fee,
            utxo_value: previous_output_value,
        })?;
    let per_recipient = Amount::from_sat(distributable / recipient_addresses.len() as u64);

    for txout in &mut transaction.output {
        txout.value = per_recipient;
    }

    Ok(transaction)
}

/// Computes the BIP-143 digest the keep must sign to spend its P2WPKH
/// output of `previous_output_value` satoshi with the given transaction.
pub fn liquidation_digest(
    transaction: &Transaction,
    keep_public_key: &PublicKey,
    previous_output_value: u64,
) -> Result<[u8; 32], TransactionError> {
    let compressed = bitcoin::CompressedPublicKey(*keep_public_key);
    let script_pubkey = ScriptBuf::new_p2wpkh(&compressed.wpubkey_hash());

    let mut cache = SighashCache::new(transaction);
    let sighash = cache
        .p2wpkh_signature_hash(
            0,
            &script_pubkey,
            Amount::from_sat(previous_output_value),
            EcdsaSighashType::All,
        )
        .map_err(|e| TransactionError::Sighash(e.to_string()))?;

    Ok(sighash.to_byte_array())
}

/// Attaches the witness `[DER(r, s) || SIGHASH_ALL, compressed pubkey]` to
/// the unsigned transaction. The signature is normalized to the strict
/// low-S form before encoding.
pub fn build_signed_transaction(
    unsigned: &Transaction,
    signature: &EcdsaSignature,
    keep_public_key: &PublicKey,
) -> Result<Transaction, TransactionError> {
    if unsigned.input.len() != 1 {
        return Err(TransactionError::UnexpectedInputCount(unsigned.input.len()));
    }

    let mut der_signature = secp256k1::ecdsa::Signature::from_compact(&signature.to_compact())
        .map_err(|e| TransactionError::InvalidSignature(e.to_string()))?;
    der_signature.normalize_s();

    let mut witness_signature = der_signature.serialize_der().to_vec();
    witness_signature.push(EcdsaSighashType::All as u8);

    let mut witness = Witness::new();
    witness.push(witness_signature);
    witness.push(bitcoin::CompressedPublicKey(*keep_public_key).to_bytes());

    let mut signed = unsigned.clone();
    signed.input[0].witness = witness;
    Ok(signed)
}
