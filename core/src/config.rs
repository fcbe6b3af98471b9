//! Node-operational configuration for **tallychain** core.
//!
//! [`Config`] centralises the tunables that are *not* part of the genesis
//! descriptor: which consensus algorithm to run, where to persist blocks,
//! which peers to dial on startup, and which mempool selection strategy to
//! use. It is built via the fluent [`ConfigBuilder`], the same pattern the
//! rest of this crate already uses for its knobs.
//!
//! ```
//! use tallychain_core::config::{Config, Consensus};
//!
//! let cfg = Config::builder()
//!     .host("0.0.0.0:8080")
//!     .consensus(Consensus::Pow)
//!     .finish();
//! assert_eq!(cfg.consensus, Consensus::Pow);
//! ```

use crate::account::AccountID;
use crate::mempool::selector::Strategy;

/// Which consensus algorithm the worker's consensus task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consensus {
    Pow,
    Poa,
}

/// Runtime configuration for a single node process.
#[derive(Debug, Clone)]
pub struct Config {
    pub beneficiary: AccountID,
    pub host: String,
    pub db_path: String,
    pub known_peers: Vec<String>,
    pub consensus: Consensus,
    pub mempool_strategy: Strategy,
    pub names_dir: Option<String>,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Fluent builder for [`Config`].
pub struct ConfigBuilder {
    beneficiary: Option<AccountID>,
    host: String,
    db_path: String,
    known_peers: Vec<String>,
    consensus: Consensus,
    mempool_strategy: Strategy,
    names_dir: Option<String>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            beneficiary: None,
            host: "0.0.0.0:8080".to_string(),
            db_path: "./zblock".to_string(),
            known_peers: Vec::new(),
            consensus: Consensus::Pow,
            mempool_strategy: Strategy::Tip,
            names_dir: None,
        }
    }

    pub fn beneficiary(mut self, id: AccountID) -> Self {
        self.beneficiary = Some(id);
        self
    }

    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = host.into();
        self
    }

    pub fn db_path<S: Into<String>>(mut self, path: S) -> Self {
        self.db_path = path.into();
        self
    }

    pub fn known_peers(mut self, peers: Vec<String>) -> Self {
        self.known_peers = peers;
        self
    }

    pub fn consensus(mut self, consensus: Consensus) -> Self {
        self.consensus = consensus;
        self
    }

    pub fn mempool_strategy(mut self, strategy: Strategy) -> Self {
        self.mempool_strategy = strategy;
        self
    }

    pub fn names_dir(mut self, dir: Option<String>) -> Self {
        self.names_dir = dir;
        self
    }

    /// Consumes the builder returning an immutable configuration value.
    ///
    /// Panics if no beneficiary was set; every node needs somewhere to
    /// route mining rewards.
    pub fn finish(self) -> Config {
        Config {
            beneficiary: self.beneficiary.expect("config: beneficiary is required"),
            host: self.host,
            db_path: self.db_path,
            known_peers: self.known_peers,
            consensus: self.consensus,
            mempool_strategy: self.mempool_strategy,
            names_dir: self.names_dir,
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_fields() {
        let id = AccountID::try_from("0x0000000000000000000000000000000000000001").unwrap();
        let cfg = ConfigBuilder::new()
            .beneficiary(id.clone())
            .host("127.0.0.1:9000")
            .consensus(Consensus::Poa)
            .finish();
        assert_eq!(cfg.host, "127.0.0.1:9000");
        assert_eq!(cfg.beneficiary, id);
        assert_eq!(cfg.consensus, Consensus::Poa);
    }
}
