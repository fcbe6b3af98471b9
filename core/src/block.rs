//! Block headers, proof-of-work mining, and block validation.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::account::AccountID;
use crate::error::{Error, Result};
use crate::merkle::Tree;
use crate::signature::{self, ZERO_HASH};
use crate::transaction::BlockTx;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub number: u64,
    pub prev_block_hash: String,
    pub timestamp: u64,
    pub beneficiary: AccountID,
    pub difficulty: u16,
    pub mining_reward: u64,
    pub state_root: String,
    pub trans_root: String,
    pub nonce: u64,
}

impl BlockHeader {
    /// The genesis header hashes to [`ZERO_HASH`]; every other header
    /// hashes to its own canonical content hash.
    pub fn hash(&self) -> Result<String> {
        if self.number == 0 {
            return Ok(ZERO_HASH.to_string());
        }
        signature::hash(self)
    }
}

/// A mined block: its header plus the Merkle tree over its transactions.
pub struct Block {
    pub header: BlockHeader,
    pub merkle: Tree<BlockTx>,
}

impl Block {
    pub fn hash(&self) -> Result<String> {
        self.header.hash()
    }

    pub fn to_block_data(&self) -> Result<BlockData> {
        Ok(BlockData { hash: self.hash()?, header: self.header.clone(), trans: self.merkle.values() })
    }

    pub fn from_block_data(data: BlockData) -> Result<Self> {
        let merkle = Tree::new(data.trans)?;
        Ok(Self { header: data.header, merkle })
    }
}

/// Wire form of a block: the flat transaction list instead of the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockData {
    pub hash: String,
    pub header: BlockHeader,
    pub trans: Vec<BlockTx>,
}

/// Inputs to [`pow`] beyond the previous block's header.
pub struct PowArgs {
    pub beneficiary: AccountID,
    pub difficulty: u16,
    pub mining_reward: u64,
    pub state_root: String,
    pub trans: Vec<BlockTx>,
}

/// Returns whether `hash` (a `0x`-prefixed hex string) satisfies `difficulty`:
/// `difficulty + 2` leading hex zero digits (the extra two account for the
/// guaranteed-zero `0x00` leading byte of a solved hash).
pub fn is_solved(difficulty: u16, hash: &str) -> bool {
    let digits = hash.strip_prefix("0x").unwrap_or(hash);
    let required = difficulty as usize + 2;
    digits.len() >= required && digits.as_bytes()[..required].iter().all(|&b| b == b'0')
}

fn now_utc_millis() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before unix epoch").as_millis() as u64
}

/// Brute-force mines a block satisfying `args.difficulty` atop `prev`.
///
/// `is_cancelled` is polled every iteration; a `true` return aborts the
/// search with [`Error::Cancelled`]. Callers running this off the async
/// reactor (e.g. inside `tokio::task::spawn_blocking`) back it with a
/// cancellation token.
pub fn pow(args: PowArgs, prev: &BlockHeader, is_cancelled: impl Fn() -> bool) -> Result<Block> {
    let merkle = Tree::new(args.trans)?;
    let prev_hash = prev.hash()?;

    let mut header = BlockHeader {
        number: prev.number + 1,
        prev_block_hash: prev_hash,
        timestamp: now_utc_millis(),
        beneficiary: args.beneficiary,
        difficulty: args.difficulty,
        mining_reward: args.mining_reward,
        state_root: args.state_root,
        trans_root: merkle.root_hex(),
        nonce: rand::thread_rng().gen(),
    };

    let mut attempts: u64 = 0;
    loop {
        if is_cancelled() {
            return Err(Error::Cancelled);
        }

        let hash = header.hash()?;
        if is_solved(header.difficulty, &hash) {
            return Ok(Block { header, merkle });
        }

        header.nonce = rand::thread_rng().gen();
        attempts += 1;
        if attempts % 1_000_000 == 0 {
            tracing::info!(attempts, number = header.number, "mining in progress");
        }
    }
}

/// Validates `header` against its claimed predecessor and the expected
/// pre-apply state root.
pub fn validate_block(header: &BlockHeader, merkle: &Tree<BlockTx>, prev: &BlockHeader, expected_state_root: &str) -> Result<()> {
    if header.number >= prev.number + 2 {
        return Err(Error::ChainForked);
    }
    if header.difficulty < prev.difficulty {
        return Err(Error::InvalidDifficulty);
    }
    if !is_solved(header.difficulty, &header.hash()?) {
        return Err(Error::InvalidHash);
    }
    if header.number != prev.number + 1 {
        return Err(Error::InvalidBlockNumber);
    }
    if header.prev_block_hash != prev.hash()? {
        return Err(Error::InvalidPrevBlockHash);
    }
    if prev.timestamp > 0 && header.timestamp < prev.timestamp {
        return Err(Error::InvalidBlockTimestamp);
    }
    if header.state_root != expected_state_root {
        return Err(Error::InvalidStateRoot);
    }
    if header.trans_root != merkle.root_hex() {
        return Err(Error::InvalidTransRoot);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature;
    use k256::ecdsa::SigningKey;
    use rand_core::OsRng;

    fn genesis_header() -> BlockHeader {
        BlockHeader {
            number: 0,
            prev_block_hash: ZERO_HASH.to_string(),
            timestamp: 0,
            beneficiary: AccountID::try_from(format!("0x{:040x}", 1)).unwrap(),
            difficulty: 1,
            mining_reward: 0,
            state_root: ZERO_HASH.to_string(),
            trans_root: ZERO_HASH.to_string(),
            nonce: 0,
        }
    }

    fn one_tx() -> BlockTx {
        use crate::transaction::Tx;
        let key = SigningKey::random(&mut OsRng);
        let from = signature::account_id_from_verifying_key(key.verifying_key()).unwrap();
        let to = AccountID::try_from(format!("0x{:040x}", 2)).unwrap();
        let mut tx = Tx::new(1, from, to, 10, 1);
        tx.nonce = 1;
        BlockTx::new(tx.sign(&key).unwrap(), 0, 1, 1)
    }

    #[test]
    fn is_solved_checks_leading_zero_count() {
        assert!(is_solved(0, "0x00abc"));
        assert!(!is_solved(0, "0x01abc"));
        assert!(is_solved(2, "0x0000abc"));
        assert!(!is_solved(2, "0x0001abc"));
    }

    #[test]
    fn pow_mines_a_block_satisfying_its_own_difficulty() {
        let prev = genesis_header();
        let args = PowArgs {
            beneficiary: AccountID::try_from(format!("0x{:040x}", 1)).unwrap(),
            difficulty: 0,
            mining_reward: 100,
            state_root: ZERO_HASH.to_string(),
            trans: vec![one_tx()],
        };

        let block = pow(args, &prev, || false).unwrap();
        assert_eq!(block.header.number, 1);
        assert!(is_solved(block.header.difficulty, &block.header.hash().unwrap()));
    }

    #[test]
    fn pow_honors_cancellation() {
        let prev = genesis_header();
        let args = PowArgs {
            beneficiary: AccountID::try_from(format!("0x{:040x}", 1)).unwrap(),
            difficulty: 20,
            mining_reward: 100,
            state_root: ZERO_HASH.to_string(),
            trans: vec![one_tx()],
        };

        let result = pow(args, &prev, || true);
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn validate_block_detects_fork_and_stale_number() {
        let prev = genesis_header();
        let args = PowArgs {
            beneficiary: AccountID::try_from(format!("0x{:040x}", 1)).unwrap(),
            difficulty: 0,
            mining_reward: 100,
            state_root: ZERO_HASH.to_string(),
            trans: vec![one_tx()],
        };
        let block = pow(args, &prev, || false).unwrap();

        assert!(validate_block(&block.header, &block.merkle, &prev, ZERO_HASH).is_ok());

        let mut forked = block.header.clone();
        forked.number = prev.number + 3;
        assert!(matches!(
            validate_block(&forked, &block.merkle, &prev, ZERO_HASH),
            Err(Error::ChainForked)
        ));
    }
}
