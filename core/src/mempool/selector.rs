//! Pluggable transaction selection strategies for [`super::Mempool::pick_best`].

use std::collections::{BTreeMap, VecDeque};

use crate::account::AccountID;
use crate::transaction::BlockTx;

/// Which selection strategy a mempool uses when building a block's
/// candidate transaction list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    #[default]
    Tip,
    TipAdvanced,
}

impl Strategy {
    pub fn select(self, by_sender: BTreeMap<AccountID, Vec<BlockTx>>, how_many: usize) -> Vec<BlockTx> {
        match self {
            Strategy::Tip => tip_select(by_sender, how_many),
            Strategy::TipAdvanced => tip_advanced_select(by_sender, how_many),
        }
    }
}

fn nonce_sorted_queues(by_sender: BTreeMap<AccountID, Vec<BlockTx>>) -> BTreeMap<AccountID, VecDeque<BlockTx>> {
    by_sender
        .into_iter()
        .map(|(id, mut txs)| {
            txs.sort_by_key(|tx| tx.signed_tx.tx.nonce);
            (id, VecDeque::from(txs))
        })
        .collect()
}

/// Round `k` contains the `k`-th lowest-nonce transaction of every sender
/// that still has one. Full rows are taken as-is; the row that would
/// overflow the requested budget is sorted by tip descending and truncated.
fn tip_select(by_sender: BTreeMap<AccountID, Vec<BlockTx>>, how_many: usize) -> Vec<BlockTx> {
    let mut queues = nonce_sorted_queues(by_sender);

    let mut rows: Vec<Vec<BlockTx>> = Vec::new();
    loop {
        let mut row = Vec::new();
        for queue in queues.values_mut() {
            if let Some(tx) = queue.pop_front() {
                row.push(tx);
            }
        }
        if row.is_empty() {
            break;
        }
        rows.push(row);
    }

    let mut final_list = Vec::with_capacity(how_many.min(rows.iter().map(|r| r.len()).sum()));
    for mut row in rows {
        let need = how_many - final_list.len();
        if row.len() > need {
            row.sort_by(|a, b| b.signed_tx.tx.tip.cmp(&a.signed_tx.tx.tip));
            final_list.extend(row.into_iter().take(need));
            break;
        }
        final_list.extend(row);
    }

    final_list
}

/// Distributes the requested budget round-robin across senders (in
/// nonce-sorted order within each sender's queue) until the total reaches
/// `how_many`, then takes exactly that many transactions per sender.
fn tip_advanced_select(by_sender: BTreeMap<AccountID, Vec<BlockTx>>, how_many: usize) -> Vec<BlockTx> {
    let total: usize = by_sender.values().map(|v| v.len()).sum();
    if total == 0 {
        return Vec::new();
    }
    if total <= how_many {
        return nonce_sorted_queues(by_sender).into_values().flatten().collect();
    }

    let sorted = nonce_sorted_queues(by_sender);
    let mut scratch = sorted.clone();
    let mut allotment: BTreeMap<AccountID, usize> = BTreeMap::new();

    loop {
        let mut advanced = false;
        for (id, queue) in scratch.iter_mut() {
            if queue.pop_front().is_some() {
                *allotment.entry(id.clone()).or_insert(0) += 1;
                advanced = true;
            }
        }
        if !advanced {
            break;
        }
        let taken: usize = allotment.values().sum();
        if taken >= how_many {
            break;
        }
    }

    let mut final_list = Vec::with_capacity(how_many);
    for (id, count) in allotment {
        if let Some(queue) = sorted.get(&id) {
            final_list.extend(queue.iter().take(count).cloned());
        }
    }

    final_list
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature;
    use k256::ecdsa::SigningKey;
    use rand_core::OsRng;

    fn tx(signing_key: &SigningKey, nonce: u64, tip: u64) -> BlockTx {
        use crate::transaction::Tx;
        let from = signature::account_id_from_verifying_key(signing_key.verifying_key()).unwrap();
        let to = AccountID::try_from(format!("0x{:040x}", 2)).unwrap();
        let mut unsigned = Tx::new(1, from, to, 10, tip);
        unsigned.nonce = nonce;
        let signed = unsigned.sign(signing_key).unwrap();
        BlockTx::new(signed, 0, 1, 1)
    }

    #[test]
    fn tip_select_fills_full_rounds_then_sorts_overflow_row_by_tip() {
        let alice = SigningKey::random(&mut OsRng);
        let bob = SigningKey::random(&mut OsRng);

        let mut by_sender = BTreeMap::new();
        let alice_id = signature::account_id_from_verifying_key(alice.verifying_key()).unwrap();
        let bob_id = signature::account_id_from_verifying_key(bob.verifying_key()).unwrap();
        by_sender.insert(alice_id, vec![tx(&alice, 1, 5), tx(&alice, 2, 1)]);
        by_sender.insert(bob_id, vec![tx(&bob, 1, 9), tx(&bob, 2, 2)]);

        let picked = tip_select(by_sender, 3);
        assert_eq!(picked.len(), 3);
        // round 1 (both nonce==1 txs) is full and included as-is; round 2
        // overflows the budget of 1 remaining slot and is tip-sorted, so
        // bob's tip=2 tx beats alice's tip=1 tx for the last slot.
        assert_eq!(picked[2].signed_tx.tx.tip, 2);
    }
}
