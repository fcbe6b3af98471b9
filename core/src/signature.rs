//! Deterministic hashing and ECDSA sign/recover over secp256k1.
//!
//! Canonical serialization of any value is its minimal JSON encoding; `serde`
//! preserves struct field declaration order, which is what makes the hash
//! and signature stable across processes. [`hash`] is the plain content
//! hash used for block/state hashing. [`sign`] / [`from_address`] implement
//! the "stamped message" signing scheme: the JSON payload is wrapped in a
//! length-prefixed banner and Keccak-256 hashed before being handed to
//! secp256k1, mirroring how the upstream reference node signs transactions.

use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use num_bigint::BigUint;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tiny_keccak::{Hasher, Keccak};

use crate::account::AccountID;
use crate::error::{Error, Result};

/// Offset added to the ECDSA recovery id before it is put on the wire.
///
/// This is a protocol fingerprint, not a cryptographic parameter: keep the
/// exact value and the subtract-before-recover order or signatures stop
/// being interoperable with peers running the same protocol.
pub const CHAIN_TAG: u8 = 29;

pub const ZERO_HASH: &str = "0x0000000000000000000000000000000000000000000000000000000000000000";

/// Returns the `0x`-prefixed SHA-256 hash of `value`'s canonical JSON form.
pub fn hash<T: Serialize>(value: &T) -> Result<String> {
    let data = serde_json::to_vec(value)?;
    let digest = Sha256::digest(&data);
    Ok(format!("0x{}", hex::encode(digest)))
}

/// Stamps `value` with the signed-message banner and Keccak-256 hashes it.
fn stamp<T: Serialize>(value: &T) -> Result<[u8; 32]> {
    let data = serde_json::to_vec(value)?;
    let banner = format!("\x19Ardan Signed Message:\n{}", data.len());

    let mut keccak = Keccak::v256();
    keccak.update(banner.as_bytes());
    keccak.update(&data);
    let mut out = [0u8; 32];
    keccak.finalize(&mut out);
    Ok(out)
}

/// Signs `value` with `signing_key`, returning the chain-tagged `(v, r, s)`.
///
/// `r` and `s` are returned as base-10 big-integer strings, matching the
/// wire format: decimal rather than hex, so the signature round-trips
/// through JSON exactly as a reference client would emit it.
pub fn sign<T: Serialize>(value: &T, signing_key: &SigningKey) -> Result<(u8, String, String)> {
    let digest = stamp(value)?;

    let (sig, recid): (Signature, RecoveryId) = signing_key
        .sign_prehash_recoverable(&digest)
        .map_err(|_| Error::InvalidSignature)?;

    let r = BigUint::from_bytes_be(&sig.r().to_bytes()).to_string();
    let s = BigUint::from_bytes_be(&sig.s().to_bytes()).to_string();
    let v = recid.to_byte() + CHAIN_TAG;

    Ok((v, r, s))
}

/// Recovers the signer's address from `value` and its chain-tagged signature.
pub fn from_address<T: Serialize>(value: &T, v: u8, r: &str, s: &str) -> Result<AccountID> {
    let recid = recovery_id(v)?;
    let sig = reconstruct_signature(r, s)?;
    let digest = stamp(value)?;

    let verifying_key = VerifyingKey::recover_from_prehash(&digest, &sig, recid)
        .map_err(|_| Error::InvalidSignature)?;

    account_id_from_verifying_key(&verifying_key)
}

/// Validates that `(v, r, s)` form a structurally sound chain-tagged
/// signature, without recovering an address from it.
pub fn verify_signature(v: u8, r: &str, s: &str) -> Result<()> {
    recovery_id(v)?;
    reconstruct_signature(r, s)?;
    Ok(())
}

fn recovery_id(v: u8) -> Result<RecoveryId> {
    let raw = v.checked_sub(CHAIN_TAG).ok_or(Error::InvalidSignature)?;
    RecoveryId::from_byte(raw).ok_or(Error::InvalidSignature)
}

fn reconstruct_signature(r: &str, s: &str) -> Result<Signature> {
    let r_bytes = decode_decimal_32(r)?;
    let s_bytes = decode_decimal_32(s)?;
    Signature::from_scalars(r_bytes, s_bytes).map_err(|_| Error::InvalidSignature)
}

/// Parses a base-10 big-integer string into a big-endian, zero-padded
/// 32-byte array, rejecting values that do not fit a secp256k1 scalar.
fn decode_decimal_32(s: &str) -> Result<[u8; 32]> {
    let value = s.parse::<BigUint>().map_err(|_| Error::InvalidSignature)?;
    let bytes = value.to_bytes_be();
    if bytes.len() > 32 {
        return Err(Error::InvalidSignature);
    }
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(out)
}

/// Derives the Ethereum-style address (low 20 bytes of the Keccak-256 hash
/// of the uncompressed public key) from a recovered or freshly generated key.
pub fn account_id_from_verifying_key(verifying_key: &VerifyingKey) -> Result<AccountID> {
    let encoded = verifying_key.to_encoded_point(false);
    let pubkey_bytes = &encoded.as_bytes()[1..]; // drop the 0x04 prefix

    let mut keccak = Keccak::v256();
    keccak.update(pubkey_bytes);
    let mut out = [0u8; 32];
    keccak.finalize(&mut out);

    let address = format!("0x{}", hex::encode(&out[12..]));
    AccountID::try_from(address)
}
