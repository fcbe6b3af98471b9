//! The central coordinator: composes the account database, mempool, and
//! peer set, and mediates every mutation that needs to touch more than one
//! of them. HTTP handlers and the worker only ever talk to a `State`; they
//! never reach into the database or mempool directly.

use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::account::{Account, AccountID};
use crate::block::{self, Block, BlockData, PowArgs};
use crate::database::Database;
use crate::error::{Error, Result};
use crate::genesis::Genesis;
use crate::mempool::{Mempool, Strategy};
use crate::nameservice::NameService;
use crate::peer::{Peer, PeerStatus, PeerSet};
use crate::storage::Storage;
use crate::transaction::{BlockTx, SignedTx};
use crate::worker::{NoopWorker, Worker};

/// Sentinel meaning "up to the latest block" in a block-range query.
pub const QUERY_LATEST: u64 = u64::MAX / 2;

/// Everything a node needs besides its network identity: where to send
/// mining rewards, and which mempool selection strategy to run.
pub struct StateConfig {
    pub beneficiary: AccountID,
    pub host: String,
    pub mempool_strategy: Strategy,
    /// Directory of `<account_id>.txt` display names to load at boot.
    /// `None` leaves the name service empty, so listings fall back to raw
    /// account ids.
    pub names_dir: Option<String>,
}

pub struct State {
    host: String,
    beneficiary: AccountID,
    db: Database,
    mempool: Mempool,
    peers: PeerSet,
    names: NameService,
    worker: RwLock<Arc<dyn Worker>>,
}

impl State {
    /// Builds the account database from `genesis` and replays whatever
    /// `storage` already holds, then wires up an empty mempool and peer
    /// set. The worker starts out as a no-op; install the real one with
    /// [`State::set_worker`] once it has been spawned.
    pub fn new(genesis: Genesis, storage: Box<dyn Storage>, config: StateConfig) -> Result<Self> {
        let db = Database::new(genesis, storage)?;
        let names = match &config.names_dir {
            Some(dir) => NameService::load(dir)?,
            None => NameService::empty(),
        };
        Ok(Self {
            host: config.host,
            beneficiary: config.beneficiary,
            db,
            mempool: Mempool::new(config.mempool_strategy),
            peers: PeerSet::new(),
            names,
            worker: RwLock::new(Arc::new(NoopWorker)),
        })
    }

    /// Installs the worker handle built by the network crate, breaking the
    /// construction-order cycle between `State` and `Worker`.
    pub fn set_worker(&self, worker: Arc<dyn Worker>) {
        *self.worker.write().expect("worker lock poisoned") = worker;
    }

    fn worker(&self) -> Arc<dyn Worker> {
        Arc::clone(&self.worker.read().expect("worker lock poisoned"))
    }

    pub fn shutdown(&self) {
        self.worker().shutdown();
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn beneficiary(&self) -> &AccountID {
        &self.beneficiary
    }

    pub fn genesis(&self) -> &Genesis {
        self.db.genesis()
    }

    /// The display name for `id`, or its raw hex form if the name service
    /// has no entry for it.
    pub fn name_for(&self, id: &AccountID) -> String {
        self.names.lookup(id)
    }

    // -- accounts --

    pub fn query_account(&self, id: &AccountID) -> Result<Account> {
        self.db.query(id)
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.db.accounts()
    }

    // -- mempool --

    pub fn mempool_transactions(&self) -> Vec<BlockTx> {
        self.mempool.transactions()
    }

    pub fn mempool_len(&self) -> usize {
        self.mempool.count()
    }

    /// Validates a wallet-submitted transaction, wraps it with the
    /// genesis's flat per-transaction gas terms, and upserts it into the
    /// mempool. Used by the public HTTP surface.
    pub fn upsert_wallet_tx(&self, signed: SignedTx) -> Result<()> {
        signed.validate(self.db.genesis().chain_id)?;

        const ONE_UNIT_OF_GAS: u64 = 1;
        let block_tx = BlockTx::new(signed, now_millis(), self.db.genesis().gas_price, ONE_UNIT_OF_GAS);
        self.mempool.upsert(block_tx.clone())?;

        self.worker().signal_start_mining();
        self.worker().signal_share_tx(block_tx);
        Ok(())
    }

    /// Upserts a transaction that arrived already wrapped as a `BlockTx`,
    /// the form peer-to-peer gossip carries. Does not re-broadcast: the
    /// originating node is already doing that.
    pub fn upsert_node_tx(&self, block_tx: BlockTx) -> Result<()> {
        block_tx.signed_tx.validate(self.db.genesis().chain_id)?;
        self.mempool.upsert(block_tx)?;
        self.worker().signal_start_mining();
        Ok(())
    }

    // -- peers --

    pub fn known_external_peers(&self) -> Vec<Peer> {
        self.peers.copy_excluding(&self.host)
    }

    pub fn known_peers(&self) -> Vec<Peer> {
        self.peers.all()
    }

    pub fn add_known_peer(&self, peer: Peer) -> bool {
        self.peers.add(peer)
    }

    pub fn remove_known_peer(&self, peer: &Peer) -> bool {
        self.peers.remove(peer)
    }

    pub fn status(&self) -> Result<PeerStatus> {
        let latest = self.db.latest_block();
        Ok(PeerStatus {
            latest_block_hash: latest.hash()?,
            latest_block_num: latest.number,
            known_peers: self.known_peers(),
        })
    }

    // -- mining & block acceptance --

    /// Picks the best `genesis.trans_per_block` pending transactions,
    /// mines a block atop the current tip, and runs it straight through
    /// [`State::validate_update_database`] before returning it.
    ///
    /// `is_cancelled` is polled by the PoW search loop; see
    /// [`crate::block::pow`].
    pub fn mine_new_block(&self, is_cancelled: impl Fn() -> bool) -> Result<Block> {
        if self.mempool.count() == 0 {
            return Err(Error::NoTransactions);
        }

        let trans = self.mempool.pick_best(self.db.genesis().trans_per_block);
        let prev = self.db.latest_block();

        let args = PowArgs {
            beneficiary: self.beneficiary.clone(),
            difficulty: self.db.genesis().difficulty,
            mining_reward: self.db.genesis().mining_reward,
            state_root: self.db.hash_state(),
            trans,
        };

        let block = block::pow(args, &prev, is_cancelled)?;
        self.validate_update_database(block.to_block_data()?)?;
        Ok(block)
    }

    /// Validates `block_data` against the current tip and the state root
    /// computed just before it, persists it, then applies its
    /// transactions and mining reward. The single writer lock on `State`
    /// (implicit: callers serialize through the worker / HTTP handler
    /// layer) makes this the one place block-driven mutation happens.
    ///
    /// A per-transaction `apply_transaction` failure is logged, not
    /// propagated: the block already passed validation, so these are
    /// already-committed facts and a failure here indicates a bug to
    /// chase down in telemetry, not a reason to reject the block.
    pub fn validate_update_database(&self, block_data: BlockData) -> Result<()> {
        let prev = self.db.latest_block();
        let expected_state_root = self.db.hash_state();

        let block = Block::from_block_data(block_data)?;
        block::validate_block(&block.header, &block.merkle, &prev, &expected_state_root)?;

        self.db.write(&block)?;

        for tx in block.merkle.values() {
            self.mempool.delete(&tx);
            if let Err(err) = self.db.apply_transaction(&block.header.beneficiary, &tx) {
                tracing::error!(%err, key = %tx.mempool_key(), "apply_transaction failed on an already-accepted block");
            }
        }
        self.db.apply_mining_reward(&block.header.beneficiary);
        self.db.update_latest_block(block.header);

        Ok(())
    }

    /// Entry point for blocks received from peers; the same guarantees as
    /// a locally mined block.
    pub fn process_proposed_block(&self, block_data: BlockData) -> Result<()> {
        self.validate_update_database(block_data)
    }

    /// Inclusive block range lookup. `to >= QUERY_LATEST` means "through
    /// the current tip"; requesting past the tip simply yields fewer
    /// blocks rather than an error.
    pub fn query_blocks_by_number(&self, from: u64, to: u64) -> Result<Vec<BlockData>> {
        let latest = self.db.latest_block().number;
        let to = if to >= QUERY_LATEST { latest } else { to.min(latest) };
        let from = from.max(1);

        if from > to {
            return Ok(Vec::new());
        }
        (from..=to).map(|number| self.db.get_block_by_number(number)).collect()
    }
}

fn now_millis() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before unix epoch").as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature;
    use crate::transaction::Tx;
    use k256::ecdsa::SigningKey;
    use rand_core::OsRng;
    use std::collections::BTreeMap;

    fn genesis(balances: Vec<(AccountID, u64)>) -> Genesis {
        let mut map = BTreeMap::new();
        for (id, balance) in balances {
            map.insert(id.as_str().to_string(), balance);
        }
        Genesis { chain_id: 1, difficulty: 1, trans_per_block: 100, mining_reward: 100, gas_price: 1, balances: map }
    }

    /// Returns the state alongside the `TempDir` guard backing its storage;
    /// callers must keep the guard alive for as long as the state is used,
    /// or the backing directory is removed out from under it.
    fn test_state(balances: Vec<(AccountID, u64)>, beneficiary: AccountID) -> (State, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let disk = crate::storage::disk::Disk::new(dir.path()).unwrap();
        let config = StateConfig { beneficiary, host: "self:8080".into(), mempool_strategy: Strategy::Tip, names_dir: None };
        (State::new(genesis(balances), Box::new(disk), config).unwrap(), dir)
    }

    /// A fast-to-mine state: difficulty zero still runs the real PoW search
    /// loop, it just solves on the first or second nonce.
    fn fast_test_state(balances: Vec<(AccountID, u64)>, beneficiary: AccountID) -> (State, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let disk = crate::storage::disk::Disk::new(dir.path()).unwrap();
        let mut gen = genesis(balances);
        gen.difficulty = 0;
        let config = StateConfig { beneficiary, host: "self:8080".into(), mempool_strategy: Strategy::Tip, names_dir: None };
        (State::new(gen, Box::new(disk), config).unwrap(), dir)
    }

    // Scenario S1/S2 from the spec: A signs nonce=1 value=200 tip=5, it's
    // mined, and the accounting lands exactly where the spec says it must.
    #[test]
    fn end_to_end_submit_then_mine_moves_balances_as_specified() {
        let key_a = SigningKey::random(&mut OsRng);
        let a = signature::account_id_from_verifying_key(key_a.verifying_key()).unwrap();
        let b = AccountID::try_from(format!("0x{:040x}", 2)).unwrap();
        let miner = AccountID::try_from(format!("0x{:040x}", 3)).unwrap();

        let (state, _dir) = fast_test_state(vec![(a.clone(), 1000), (b.clone(), 500)], miner.clone());

        let mut tx = Tx::new(1, a.clone(), b.clone(), 200, 5);
        tx.nonce = 1;
        let signed = tx.sign(&key_a).unwrap();
        state.upsert_wallet_tx(signed).unwrap();
        assert_eq!(state.mempool_len(), 1);
        assert_eq!(state.query_account(&a).unwrap().balance, 1000);

        state.mine_new_block(|| false).unwrap();

        assert_eq!(state.query_account(&a).unwrap().balance, 1000 - 200 - 5 - 1);
        assert_eq!(state.query_account(&b).unwrap().balance, 700);
        assert_eq!(state.query_account(&miner).unwrap().balance, 100 + 5 + 1);
        assert_eq!(state.query_account(&a).unwrap().nonce, 1);
        assert_eq!(state.mempool_len(), 0);
    }

    // Scenario S3/S4: replace-by-fee boundary at the 10% bump.
    #[test]
    fn upsert_wallet_tx_enforces_replace_by_fee_boundary() {
        let key_a = SigningKey::random(&mut OsRng);
        let a = signature::account_id_from_verifying_key(key_a.verifying_key()).unwrap();
        let b = AccountID::try_from(format!("0x{:040x}", 2)).unwrap();
        let miner = AccountID::try_from(format!("0x{:040x}", 3)).unwrap();
        let (state, _dir) = test_state(vec![(a.clone(), 1000)], miner);

        let mut tx1 = Tx::new(1, a.clone(), b.clone(), 200, 5);
        tx1.nonce = 1;
        state.upsert_wallet_tx(tx1.sign(&key_a).unwrap()).unwrap();

        let mut tx2 = Tx::new(1, a.clone(), b.clone(), 200, 5);
        tx2.nonce = 1;
        assert!(matches!(
            state.upsert_wallet_tx(tx2.sign(&key_a).unwrap()),
            Err(Error::ReplaceBelowMinimumBump)
        ));

        let mut tx3 = Tx::new(1, a.clone(), b, 200, 6);
        tx3.nonce = 1;
        assert!(state.upsert_wallet_tx(tx3.sign(&key_a).unwrap()).is_ok());
        assert_eq!(state.mempool_len(), 1);
    }

    // Scenario S5: tampering the recipient after signing breaks recovery.
    #[test]
    fn upsert_wallet_tx_rejects_tampered_recipient() {
        let key_a = SigningKey::random(&mut OsRng);
        let a = signature::account_id_from_verifying_key(key_a.verifying_key()).unwrap();
        let b = AccountID::try_from(format!("0x{:040x}", 2)).unwrap();
        let c = AccountID::try_from(format!("0x{:040x}", 4)).unwrap();
        let miner = AccountID::try_from(format!("0x{:040x}", 3)).unwrap();
        let (state, _dir) = test_state(vec![(a.clone(), 1000)], miner);

        let mut tx = Tx::new(1, a, b, 10, 999_999);
        tx.nonce = 1;
        let mut signed = tx.sign(&key_a).unwrap();
        signed.tx.to = c;

        assert!(matches!(state.upsert_wallet_tx(signed), Err(Error::SignatureMismatch)));
    }

    // Scenario S6: a peer-proposed block with a mismatched state root is
    // rejected and the local tip is untouched.
    #[test]
    fn process_proposed_block_rejects_wrong_state_root() {
        let key_a = SigningKey::random(&mut OsRng);
        let a = signature::account_id_from_verifying_key(key_a.verifying_key()).unwrap();
        let b = AccountID::try_from(format!("0x{:040x}", 2)).unwrap();
        let miner = AccountID::try_from(format!("0x{:040x}", 3)).unwrap();
        let (state, _dir) = fast_test_state(vec![(a.clone(), 1000)], miner.clone());

        let mut tx = Tx::new(1, a, b, 1, 1);
        tx.nonce = 1;
        let block_tx = BlockTx::new(tx.sign(&key_a).unwrap(), 0, 1, 1);

        let prev = state.db.latest_block();
        let args = PowArgs {
            beneficiary: miner,
            difficulty: 0,
            mining_reward: 100,
            state_root: "0xdeadbeef".to_string(),
            trans: vec![block_tx],
        };
        let block = block::pow(args, &prev, || false).unwrap();
        let before_tip = state.db.latest_block();

        let result = state.process_proposed_block(block.to_block_data().unwrap());
        assert!(matches!(result, Err(Error::InvalidStateRoot)));
        assert_eq!(state.db.latest_block().number, before_tip.number);
    }
}
