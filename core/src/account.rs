//! Accounts and account identifiers.
//!
//! An [`AccountID`] is the low 20 bytes of a recovered ECDSA public key,
//! rendered as a 40-character hex string with an optional `0x` prefix. It is
//! the identity of a principal in the ledger and, once constructed, never
//! changes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

const ADDRESS_HEX_LEN: usize = 40;

/// A validated 20-byte address rendered as hex, with or without `0x`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountID(String);

impl AccountID {
    /// Strips an optional `0x` prefix and returns the bare hex digits.
    fn hex_digits(s: &str) -> &str {
        s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s)
    }

    fn is_valid(s: &str) -> bool {
        let digits = Self::hex_digits(s);
        digits.len() == ADDRESS_HEX_LEN && digits.chars().all(|c| c.is_ascii_hexdigit())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for AccountID {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        if !Self::is_valid(s) {
            return Err(Error::InvalidAccountId(s.to_string()));
        }
        Ok(AccountID(s.to_string()))
    }
}

impl TryFrom<String> for AccountID {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        if !Self::is_valid(&s) {
            return Err(Error::InvalidAccountId(s));
        }
        Ok(AccountID(s))
    }
}

impl From<AccountID> for String {
    fn from(id: AccountID) -> Self {
        id.0
    }
}

impl fmt::Display for AccountID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A keyed balance/nonce record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: AccountID,
    pub balance: u64,
    pub nonce: u64,
}

impl Account {
    pub fn new(account_id: AccountID, balance: u64) -> Self {
        Self {
            account_id,
            balance,
            nonce: 0,
        }
    }
}
