//! The genesis descriptor: chain parameters and initial balances, loaded
//! once from a JSON file at node startup.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::account::AccountID;
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Genesis {
    pub chain_id: u16,
    pub difficulty: u16,
    pub trans_per_block: u16,
    pub mining_reward: u64,
    pub gas_price: u64,
    pub balances: BTreeMap<String, u64>,
}

impl Genesis {
    /// Reads and deserializes the genesis file at `path`.
    ///
    /// Every key in `balances` is validated as an [`AccountID`] eagerly so
    /// a malformed genesis file fails fast at startup rather than when the
    /// first account lookup happens to touch it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let genesis: Genesis = serde_json::from_str(&data)?;

        for key in genesis.balances.keys() {
            AccountID::try_from(key.as_str())?;
        }

        Ok(genesis)
    }

    /// Validated account/balance pairs, in file order.
    pub fn accounts(&self) -> Result<Vec<(AccountID, u64)>> {
        self.balances
            .iter()
            .map(|(id, balance)| Ok((AccountID::try_from(id.as_str())?, *balance)))
            .collect()
    }
}
