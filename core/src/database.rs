//! The account ledger: balances, nonces, and the chain tip, rebuilt from
//! storage at startup and mutated only through [`Database::apply_transaction`]
//! / [`Database::apply_mining_reward`].

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::account::{Account, AccountID};
use crate::block::{validate_block, Block, BlockHeader};
use crate::error::{Error, Result};
use crate::genesis::Genesis;
use crate::signature;
use crate::storage::Storage;
use crate::transaction::BlockTx;

struct Inner {
    accounts: BTreeMap<AccountID, Account>,
    latest_block: BlockHeader,
}

pub struct Database {
    genesis: Genesis,
    storage: Box<dyn Storage>,
    inner: RwLock<Inner>,
}

fn genesis_header() -> BlockHeader {
    BlockHeader {
        number: 0,
        prev_block_hash: signature::ZERO_HASH.to_string(),
        timestamp: 0,
        beneficiary: AccountID::try_from(format!("0x{:040x}", 0)).expect("all-zero address is valid"),
        difficulty: 0,
        mining_reward: 0,
        state_root: signature::ZERO_HASH.to_string(),
        trans_root: signature::ZERO_HASH.to_string(),
        nonce: 0,
    }
}

impl Database {
    /// Seeds accounts from `genesis.balances`, then replays every stored
    /// block from height 1 upward, validating and applying each in turn.
    pub fn new(genesis: Genesis, storage: Box<dyn Storage>) -> Result<Self> {
        let mut accounts = BTreeMap::new();
        for (id, balance) in genesis.accounts()? {
            accounts.insert(id.clone(), Account::new(id, balance));
        }

        let db = Self { genesis, storage, inner: RwLock::new(Inner { accounts, latest_block: genesis_header() }) };

        for block_data in db.storage.for_each() {
            let prev = db.latest_block();
            let expected_state_root = db.hash_state();
            let block = Block::from_block_data(block_data)?;
            validate_block(&block.header, &block.merkle, &prev, &expected_state_root)?;
            db.apply_block(&block)?;
        }

        Ok(db)
    }

    pub fn genesis(&self) -> &Genesis {
        &self.genesis
    }

    pub fn query(&self, id: &AccountID) -> Result<Account> {
        self.inner
            .read()
            .expect("database lock poisoned")
            .accounts
            .get(id)
            .cloned()
            .ok_or(Error::AccountNotFound)
    }

    pub fn get_account(&self, id: &AccountID) -> Option<Account> {
        self.inner.read().expect("database lock poisoned").accounts.get(id).cloned()
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.inner.read().expect("database lock poisoned").accounts.values().cloned().collect()
    }

    pub fn copy(&self) -> BTreeMap<AccountID, Account> {
        self.inner.read().expect("database lock poisoned").accounts.clone()
    }

    pub fn remove(&self, id: &AccountID) {
        self.inner.write().expect("database lock poisoned").accounts.remove(id);
    }

    fn get_or_create(accounts: &mut BTreeMap<AccountID, Account>, id: &AccountID) -> &mut Account {
        accounts.entry(id.clone()).or_insert_with(|| Account::new(id.clone(), 0))
    }

    /// Applies one transaction's accounting effects.
    ///
    /// The gas fee is deducted and credited to the beneficiary even if the
    /// transfer itself is subsequently rejected for insufficient funds or a
    /// bad nonce — gas is a spam deterrent, not a refundable deposit.
    pub fn apply_transaction(&self, beneficiary: &AccountID, tx: &BlockTx) -> Result<()> {
        let mut inner = self.inner.write().expect("database lock poisoned");

        if !inner.accounts.contains_key(&tx.signed_tx.tx.from) {
            return Err(Error::AccountNotFound);
        }
        Self::get_or_create(&mut inner.accounts, &tx.signed_tx.tx.to);
        Self::get_or_create(&mut inner.accounts, beneficiary);

        let gas_fee = tx.gas_fee();
        let charged = {
            let from = inner.accounts.get_mut(&tx.signed_tx.tx.from).expect("checked above");
            let charged = gas_fee.min(from.balance);
            from.balance -= charged;
            charged
        };
        inner.accounts.get_mut(beneficiary).expect("just created").balance += charged;

        let expected_nonce = inner.accounts.get(&tx.signed_tx.tx.from).expect("checked above").nonce + 1;
        if tx.signed_tx.tx.nonce != expected_nonce {
            return Err(Error::InvalidNonce { expected: expected_nonce, got: tx.signed_tx.tx.nonce });
        }
        let from_balance = inner.accounts.get(&tx.signed_tx.tx.from).expect("checked above").balance;
        if from_balance < tx.signed_tx.tx.value + tx.signed_tx.tx.tip {
            return Err(Error::InsufficientFunds);
        }

        {
            let from = inner.accounts.get_mut(&tx.signed_tx.tx.from).expect("checked above");
            from.balance -= tx.signed_tx.tx.value + tx.signed_tx.tx.tip;
            from.nonce = tx.signed_tx.tx.nonce;
        }
        inner.accounts.get_mut(&tx.signed_tx.tx.to).expect("just created").balance += tx.signed_tx.tx.value;
        inner.accounts.get_mut(beneficiary).expect("just created").balance += tx.signed_tx.tx.tip;

        Ok(())
    }

    pub fn apply_mining_reward(&self, beneficiary: &AccountID) {
        let mut inner = self.inner.write().expect("database lock poisoned");
        let reward = self.genesis.mining_reward;
        Self::get_or_create(&mut inner.accounts, beneficiary).balance += reward;
    }

    fn apply_block(&self, block: &Block) -> Result<()> {
        for tx in block.merkle.values() {
            self.apply_transaction(&block.header.beneficiary, &tx)?;
        }
        self.apply_mining_reward(&block.header.beneficiary);
        self.update_latest_block(block.header.clone());
        Ok(())
    }

    /// A deterministic hash of the current account set: accounts sorted
    /// by id ascending (the `BTreeMap` iteration order already guarantees
    /// this) hashed via the canonical content hasher.
    pub fn hash_state(&self) -> String {
        let accounts: Vec<Account> = self.accounts();
        signature::hash(&accounts).expect("account vector is always serializable")
    }

    pub fn latest_block(&self) -> BlockHeader {
        self.inner.read().expect("database lock poisoned").latest_block.clone()
    }

    pub fn update_latest_block(&self, header: BlockHeader) {
        self.inner.write().expect("database lock poisoned").latest_block = header;
    }

    pub fn write(&self, block: &Block) -> Result<()> {
        self.storage.write(&block.to_block_data()?)
    }

    pub fn get_block_by_number(&self, number: u64) -> Result<crate::block::BlockData> {
        self.storage.get_block_by_number(number)
    }
}
