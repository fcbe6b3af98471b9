//! Known-peer bookkeeping: a single peer handle and the set the node
//! gossips with.

use std::collections::BTreeSet;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// One known peer, identified solely by its `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Peer {
    pub host: String,
}

impl Peer {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    pub fn matches(&self, host: &str) -> bool {
        self.host == host
    }
}

/// What a peer reports about itself in response to a status request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeerStatus {
    pub latest_block_hash: String,
    pub latest_block_num: u64,
    pub known_peers: Vec<Peer>,
}

/// A deduplicated, thread-safe set of known peers.
#[derive(Default)]
pub struct PeerSet {
    set: RwLock<BTreeSet<Peer>>,
}

impl PeerSet {
    pub fn new() -> Self {
        Self { set: RwLock::new(BTreeSet::new()) }
    }

    /// Adds `peer`, returning `true` if it was not already known.
    pub fn add(&self, peer: Peer) -> bool {
        self.set.write().expect("peer set lock poisoned").insert(peer)
    }

    /// Removes `peer`, returning `true` if it was known.
    pub fn remove(&self, peer: &Peer) -> bool {
        self.set.write().expect("peer set lock poisoned").remove(peer)
    }

    /// Every known peer except `exclude_host`, if present.
    pub fn copy_excluding(&self, exclude_host: &str) -> Vec<Peer> {
        self.set
            .read()
            .expect("peer set lock poisoned")
            .iter()
            .filter(|p| p.host != exclude_host)
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<Peer> {
        self.set.read().expect("peer set lock poisoned").iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.set.read().expect("peer set lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent_and_remove_reports_presence() {
        let set = PeerSet::new();
        assert!(set.add(Peer::new("a:1")));
        assert!(!set.add(Peer::new("a:1")));
        assert_eq!(set.len(), 1);
        assert!(set.remove(&Peer::new("a:1")));
        assert!(!set.remove(&Peer::new("a:1")));
    }

    #[test]
    fn copy_excluding_drops_self() {
        let set = PeerSet::new();
        set.add(Peer::new("self:1"));
        set.add(Peer::new("other:2"));
        let others = set.copy_excluding("self:1");
        assert_eq!(others, vec![Peer::new("other:2")]);
    }
}
