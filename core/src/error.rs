//! Error types for the **tallychain** core crate.
//!
//! All high-level operations return [`Result`]. The variants mirror the
//! validation, block-integrity, mempool, transport and lifecycle failure
//! modes of the consensus design, plus the I/O failures the storage and
//! genesis loaders can raise.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // -- validation --
    #[error("invalid chain id")]
    InvalidChainId,

    #[error("invalid account id: {0}")]
    InvalidAccountId(String),

    #[error("from and to accounts are the same")]
    SameFromTo,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("signature does not match the declared sender")]
    SignatureMismatch,

    #[error("invalid nonce: expected {expected}, got {got}")]
    InvalidNonce { expected: u64, got: u64 },

    #[error("insufficient funds")]
    InsufficientFunds,

    // -- block integrity --
    #[error("blockchain forked, resync required")]
    ChainForked,

    #[error("invalid difficulty")]
    InvalidDifficulty,

    #[error("invalid block hash")]
    InvalidHash,

    #[error("invalid block number")]
    InvalidBlockNumber,

    #[error("invalid previous block hash")]
    InvalidPrevBlockHash,

    #[error("invalid block timestamp")]
    InvalidBlockTimestamp,

    #[error("invalid state root")]
    InvalidStateRoot,

    #[error("invalid transaction root")]
    InvalidTransRoot,

    // -- mempool --
    #[error("replacing a transaction requires at least a 10% tip bump")]
    ReplaceBelowMinimumBump,

    // -- transport --
    #[error("peer unreachable")]
    PeerUnreachable,

    #[error("peer returned an error: {0}")]
    PeerBadStatus(String),

    // -- lifecycle --
    #[error("no transactions in mempool")]
    NoTransactions,

    #[error("mining cancelled")]
    Cancelled,

    // -- ambient --
    #[error("account not found")]
    AccountNotFound,

    #[error("merkle tree error: {0}")]
    Merkle(String),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
