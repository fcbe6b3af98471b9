//! A keyed, single-writer pending-transaction pool with pluggable
//! selection strategies.

pub mod selector;

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::account::AccountID;
use crate::error::{Error, Result};
use crate::transaction::BlockTx;
pub use selector::Strategy;

/// Pending transactions keyed by `"from:nonce"`.
pub struct Mempool {
    pool: RwLock<BTreeMap<String, BlockTx>>,
    strategy: Strategy,
}

impl Mempool {
    pub fn new(strategy: Strategy) -> Self {
        Self { pool: RwLock::new(BTreeMap::new()), strategy }
    }

    pub fn count(&self) -> usize {
        self.pool.read().expect("mempool lock poisoned").len()
    }

    /// Inserts or replaces `tx`. A replacement must bump the tip by at
    /// least 10% over the transaction it displaces.
    pub fn upsert(&self, tx: BlockTx) -> Result<()> {
        let key = tx.mempool_key();
        let mut pool = self.pool.write().expect("mempool lock poisoned");

        if let Some(existing) = pool.get(&key) {
            let minimum = (existing.signed_tx.tx.tip as f64 * 1.10).ceil() as u64;
            if tx.signed_tx.tx.tip < minimum {
                return Err(Error::ReplaceBelowMinimumBump);
            }
        }

        pool.insert(key, tx);
        Ok(())
    }

    pub fn delete(&self, tx: &BlockTx) {
        let key = tx.mempool_key();
        self.pool.write().expect("mempool lock poisoned").remove(&key);
    }

    pub fn truncate(&self) {
        self.pool.write().expect("mempool lock poisoned").clear();
    }

    /// All pending transactions, in mempool-key order.
    pub fn transactions(&self) -> Vec<BlockTx> {
        self.pool.read().expect("mempool lock poisoned").values().cloned().collect()
    }

    /// Picks up to `how_many` transactions per the configured strategy. A
    /// `how_many` of zero means "all of them".
    pub fn pick_best(&self, how_many: u16) -> Vec<BlockTx> {
        let by_sender = self.group_by_sender();
        let budget = if how_many == 0 { by_sender.values().map(|v| v.len()).sum() } else { how_many as usize };
        self.strategy.select(by_sender, budget)
    }

    fn group_by_sender(&self) -> BTreeMap<AccountID, Vec<BlockTx>> {
        let pool = self.pool.read().expect("mempool lock poisoned");
        let mut grouped: BTreeMap<AccountID, Vec<BlockTx>> = BTreeMap::new();
        for tx in pool.values() {
            grouped.entry(tx.signed_tx.tx.from.clone()).or_default().push(tx.clone());
        }
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature;
    use crate::transaction::Tx;
    use k256::ecdsa::SigningKey;
    use rand_core::OsRng;

    fn tx(signing_key: &SigningKey, nonce: u64, tip: u64) -> BlockTx {
        let from = signature::account_id_from_verifying_key(signing_key.verifying_key()).unwrap();
        let to = AccountID::try_from(format!("0x{:040x}", 2)).unwrap();
        let mut unsigned = Tx::new(1, from, to, 10, tip);
        unsigned.nonce = nonce;
        BlockTx::new(unsigned.sign(signing_key).unwrap(), 0, 1, 1)
    }

    #[test]
    fn upsert_then_delete_roundtrips_count() {
        let key = SigningKey::random(&mut OsRng);
        let mempool = Mempool::new(Strategy::Tip);
        let t = tx(&key, 1, 5);
        mempool.upsert(t.clone()).unwrap();
        assert_eq!(mempool.count(), 1);
        mempool.delete(&t);
        assert_eq!(mempool.count(), 0);
    }

    #[test]
    fn replace_requires_ten_percent_tip_bump() {
        let key = SigningKey::random(&mut OsRng);
        let mempool = Mempool::new(Strategy::Tip);
        mempool.upsert(tx(&key, 1, 10)).unwrap();

        assert!(matches!(mempool.upsert(tx(&key, 1, 10)), Err(Error::ReplaceBelowMinimumBump)));
        assert!(matches!(mempool.upsert(tx(&key, 1, 10)), Err(Error::ReplaceBelowMinimumBump)));
        assert!(mempool.upsert(tx(&key, 1, 11)).is_ok());
    }

    #[test]
    fn truncate_clears_everything() {
        let key = SigningKey::random(&mut OsRng);
        let mempool = Mempool::new(Strategy::Tip);
        mempool.upsert(tx(&key, 1, 5)).unwrap();
        mempool.upsert(tx(&key, 2, 5)).unwrap();
        mempool.truncate();
        assert_eq!(mempool.count(), 0);
    }

    #[test]
    fn pick_best_respects_budget() {
        let key = SigningKey::random(&mut OsRng);
        let mempool = Mempool::new(Strategy::Tip);
        for n in 1..=5u64 {
            mempool.upsert(tx(&key, n, n)).unwrap();
        }
        assert_eq!(mempool.pick_best(3).len(), 3);
        assert_eq!(mempool.pick_best(0).len(), 5);
    }
}
