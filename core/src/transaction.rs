//! Transactions: the unsigned payload, its signed wire form, and the
//! mined/mempool form carrying gas accounting.

use k256::ecdsa::SigningKey;
use serde::{Deserialize, Serialize};

use crate::account::AccountID;
use crate::error::{Error, Result};
use crate::merkle::Hashable;
use crate::signature;

/// The value a sender wants to commit, before any signature is attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    pub chain_id: u16,
    pub nonce: u64,
    pub from: AccountID,
    pub to: AccountID,
    pub value: u64,
    pub tip: u64,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

impl Tx {
    pub fn new(chain_id: u16, from: AccountID, to: AccountID, value: u64, tip: u64) -> Self {
        Self { chain_id, nonce: 0, from, to, value, tip, data: Vec::new() }
    }

    /// Signs this transaction, producing the wire-ready [`SignedTx`].
    pub fn sign(self, signing_key: &SigningKey) -> Result<SignedTx> {
        let (v, r, s) = signature::sign(&self, signing_key)?;
        Ok(SignedTx { tx: self, v, r, s })
    }
}

/// A [`Tx`] plus its chain-tagged ECDSA signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTx {
    #[serde(flatten)]
    pub tx: Tx,
    pub v: u8,
    pub r: String,
    pub s: String,
}

impl SignedTx {
    /// Validates chain membership, address well-formedness, and that the
    /// signature actually belongs to the declared sender.
    pub fn validate(&self, chain_id: u16) -> Result<()> {
        if self.tx.chain_id != chain_id {
            return Err(Error::InvalidChainId);
        }
        if self.tx.from == self.tx.to {
            return Err(Error::SameFromTo);
        }

        signature::verify_signature(self.v, &self.r, &self.s)?;

        let recovered = signature::from_address(&self.tx, self.v, &self.r, &self.s)?;
        if recovered != self.tx.from {
            return Err(Error::SignatureMismatch);
        }

        Ok(())
    }
}

/// The form a transaction takes once it is accepted into a block or the
/// mempool: a [`SignedTx`] plus the gas terms charged against the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTx {
    #[serde(flatten)]
    pub signed_tx: SignedTx,
    pub timestamp: u64,
    pub gas_price: u64,
    pub gas_units: u64,
}

impl BlockTx {
    pub fn new(signed_tx: SignedTx, timestamp: u64, gas_price: u64, gas_units: u64) -> Self {
        Self { signed_tx, timestamp, gas_price, gas_units }
    }

    /// Gas fee owed by the sender regardless of whether the transfer itself
    /// succeeds.
    pub fn gas_fee(&self) -> u64 {
        self.gas_price * self.gas_units
    }

    /// The `"from:nonce"` key used by the mempool to dedupe/replace.
    pub fn mempool_key(&self) -> String {
        format!("{}:{}", self.signed_tx.tx.from, self.signed_tx.tx.nonce)
    }

    pub fn hash(&self) -> Result<String> {
        signature::hash(self)
    }
}

impl Hashable for BlockTx {
    fn hash(&self) -> Result<Vec<u8>> {
        let hex_hash = signature::hash(self)?;
        let digits = hex_hash.strip_prefix("0x").unwrap_or(&hex_hash);
        hex::decode(digits).map_err(|e| Error::Merkle(e.to_string()))
    }

    fn equals(&self, other: &Self) -> bool {
        self == other
    }
}

/// Raw transaction data is carried as hex on the wire (the upstream format
/// for an opaque payload field), never as a JSON byte array.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        hex::encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    fn account(n: u8) -> AccountID {
        AccountID::try_from(format!("0x{:040x}", n)).unwrap()
    }

    fn signed(chain_id: u16, nonce: u64, signing_key: &SigningKey) -> SignedTx {
        let from = signature::account_id_from_verifying_key(signing_key.verifying_key()).unwrap();
        let mut tx = Tx::new(chain_id, from, account(2), 100, 5);
        tx.nonce = nonce;
        tx.sign(signing_key).unwrap()
    }

    #[test]
    fn validate_accepts_well_formed_signed_tx() {
        let signing_key = SigningKey::random(&mut OsRng);
        let tx = signed(1, 1, &signing_key);
        assert!(tx.validate(1).is_ok());
    }

    #[test]
    fn validate_rejects_wrong_chain_id() {
        let signing_key = SigningKey::random(&mut OsRng);
        let tx = signed(1, 1, &signing_key);
        assert!(matches!(tx.validate(2), Err(Error::InvalidChainId)));
    }

    #[test]
    fn validate_rejects_self_transfer() {
        let signing_key = SigningKey::random(&mut OsRng);
        let from = signature::account_id_from_verifying_key(signing_key.verifying_key()).unwrap();
        let tx = Tx::new(1, from.clone(), from, 10, 1).sign(&signing_key).unwrap();
        assert!(matches!(tx.validate(1), Err(Error::SameFromTo)));
    }

    #[test]
    fn validate_rejects_forged_sender() {
        let signing_key = SigningKey::random(&mut OsRng);
        let mut tx = signed(1, 1, &signing_key);
        tx.tx.from = account(99);
        assert!(matches!(tx.validate(1), Err(Error::SignatureMismatch)));
    }

    #[test]
    fn block_tx_gas_fee_and_mempool_key() {
        let signing_key = SigningKey::random(&mut OsRng);
        let tx = signed(1, 7, &signing_key);
        let block_tx = BlockTx::new(tx.clone(), 1_700_000_000, 2, 3);
        assert_eq!(block_tx.gas_fee(), 6);
        assert_eq!(block_tx.mempool_key(), format!("{}:7", tx.tx.from));
    }
}
