//! Optional human-readable names for accounts, built once at startup by
//! scanning a directory of `<account_id>.txt` files. Absence of an entry
//! is never an error: callers fall back to the raw [`AccountID`].

use std::collections::BTreeMap;
use std::path::Path;

use crate::account::AccountID;
use crate::error::Result;

pub struct NameService {
    names: BTreeMap<AccountID, String>,
}

impl NameService {
    /// Builds an empty name service, useful when no name directory is
    /// configured.
    pub fn empty() -> Self {
        Self { names: BTreeMap::new() }
    }

    /// Scans `root` for `<account_id>.txt` files; each file's trimmed
    /// contents becomes that account's display name. Files whose stem is
    /// not a valid [`AccountID`] are skipped, not fatal.
    pub fn load(root: impl AsRef<Path>) -> Result<Self> {
        let mut names = BTreeMap::new();

        let entries = match std::fs::read_dir(root) {
            Ok(entries) => entries,
            Err(_) => return Ok(Self::empty()),
        };

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else { continue };
            let Ok(account_id) = AccountID::try_from(stem) else { continue };

            let contents = std::fs::read_to_string(&path)?;
            names.insert(account_id, contents.trim().to_string());
        }

        Ok(Self { names })
    }

    /// The display name for `id`, or `id`'s own string form if unknown.
    pub fn lookup(&self, id: &AccountID) -> String {
        self.names.get(id).cloned().unwrap_or_else(|| id.to_string())
    }

    pub fn copy(&self) -> BTreeMap<AccountID, String> {
        self.names.clone()
    }
}
