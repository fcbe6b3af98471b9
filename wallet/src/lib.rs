//! A minimal secp256k1 keypair wallet: generate a key, persist it as a
//! hex-encoded private key file, and sign outgoing [`Tx`]s the same way
//! [`tallychain_core::signature`] expects for recovery to succeed.
//!
//! This is plumbing for the CLI's `wallet` subcommand, not a hardened key
//! store: the private key is written to disk unencrypted. A real deployment
//! would wrap this in an OS keychain or an encrypted keystore file; that is
//! out of scope here.

use std::fs;
use std::path::Path;

use k256::ecdsa::SigningKey;
use rand_core::OsRng;

use tallychain_core::account::AccountID;
use tallychain_core::error::{Error, Result};
use tallychain_core::signature;
use tallychain_core::transaction::{SignedTx, Tx};

pub struct Wallet {
    signing_key: SigningKey,
}

impl Wallet {
    /// Generates a fresh keypair.
    pub fn generate() -> Self {
        Self { signing_key: SigningKey::random(&mut OsRng) }
    }

    /// Loads a keypair from a hex-encoded 32-byte private key file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let bytes = hex::decode(raw.trim()).map_err(|_| Error::InvalidSignature)?;
        let signing_key = SigningKey::from_slice(&bytes).map_err(|_| Error::InvalidSignature)?;
        Ok(Self { signing_key })
    }

    /// Writes the private key to `path` as hex, creating parent
    /// directories as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, hex::encode(self.signing_key.to_bytes()))?;
        Ok(())
    }

    /// This wallet's account identity, derived the same way the core's
    /// signature recovery would: keccak-256 of the uncompressed public
    /// key, low 20 bytes.
    pub fn account_id(&self) -> Result<AccountID> {
        signature::account_id_from_verifying_key(self.signing_key.verifying_key())
    }

    /// Signs `tx`, producing the wire-ready [`SignedTx`].
    pub fn sign(&self, tx: Tx) -> Result<SignedTx> {
        tx.sign(&self.signing_key)
    }
}
