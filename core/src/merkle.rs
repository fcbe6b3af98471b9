//! A generic binary Merkle tree with odd-leaf duplication.
//!
//! Leaves are any type implementing [`Hashable`]. The tree hashes each leaf,
//! duplicates the final leaf if the count is odd, then combines siblings
//! pairwise (`H(left || right)`) up to a single root. [`Tree::proof`] and
//! [`Tree::verify_data`] provide membership proofs; [`Tree::values`] returns
//! the original (non-duplicate) leaves in insertion order.

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Behavior a leaf type must provide to be used in a [`Tree`].
pub trait Hashable {
    fn hash(&self) -> Result<Vec<u8>>;
    fn equals(&self, other: &Self) -> bool;
}

#[derive(Clone)]
struct Leaf<T> {
    hash: Vec<u8>,
    value: T,
    dup: bool,
}

/// A Merkle tree over leaves of type `T`.
pub struct Tree<T> {
    leaves: Vec<Leaf<T>>,
    // layers[0] is leaf hashes (including the duplicate, if any); layers.last() is [root].
    layers: Vec<Vec<Vec<u8>>>,
}

fn combine(left: &[u8], right: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().to_vec()
}

impl<T: Hashable + Clone> Tree<T> {
    /// Builds a tree over `values`. Fails if `values` is empty.
    pub fn new(values: Vec<T>) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::Merkle("no values provided".into()));
        }

        let mut leaves = Vec::with_capacity(values.len() + 1);
        for value in values {
            let hash = value.hash()?;
            leaves.push(Leaf { hash, value, dup: false });
        }

        if leaves.len() % 2 != 0 {
            let last = leaves.last().expect("checked non-empty above").clone();
            leaves.push(Leaf { hash: last.hash, value: last.value, dup: true });
        }

        let mut layers = vec![leaves.iter().map(|l| l.hash.clone()).collect::<Vec<_>>()];
        while layers.last().expect("at least one layer").len() > 1 {
            let prev = layers.last().expect("at least one layer");
            let mut next = Vec::with_capacity(prev.len().div_ceil(2));
            let mut i = 0;
            while i < prev.len() {
                let left = &prev[i];
                let right = prev.get(i + 1).unwrap_or(left);
                next.push(combine(left, right));
                i += 2;
            }
            layers.push(next);
        }

        Ok(Self { leaves, layers })
    }

    /// Root hash as raw bytes.
    pub fn root(&self) -> &[u8] {
        &self.layers.last().expect("always has a root layer")[0]
    }

    /// `0x`-prefixed hex root.
    pub fn root_hex(&self) -> String {
        format!("0x{}", hex::encode(self.root()))
    }

    /// Leaves in insertion order, excluding the duplicate padding leaf.
    pub fn values(&self) -> Vec<T> {
        self.leaves.iter().filter(|l| !l.dup).map(|l| l.value.clone()).collect()
    }

    fn leaf_index(&self, value: &T) -> Option<usize> {
        self.leaves.iter().position(|l| l.value.equals(value))
    }

    /// Returns the sibling hashes and side indicators (`0` = sibling is
    /// left, `1` = sibling is right) needed to recompute the root from
    /// `value`'s leaf hash.
    pub fn proof(&self, value: &T) -> Result<(Vec<Vec<u8>>, Vec<u8>)> {
        let mut idx = self
            .leaf_index(value)
            .ok_or_else(|| Error::Merkle("data not found in tree".into()))?;

        let mut siblings = Vec::new();
        let mut order = Vec::new();
        for layer in &self.layers[..self.layers.len() - 1] {
            let is_left = idx % 2 == 0;
            let sibling_idx = if is_left { idx + 1 } else { idx - 1 };
            let sibling_idx = sibling_idx.min(layer.len() - 1);
            siblings.push(layer[sibling_idx].clone());
            order.push(if is_left { 1 } else { 0 });
            idx /= 2;
        }

        Ok((siblings, order))
    }

    /// Verifies that `value` is present in the tree and its leaf hash
    /// recomputes to the tree's root through the stored proof path.
    pub fn verify_data(&self, value: &T) -> Result<()> {
        let idx = self
            .leaf_index(value)
            .ok_or_else(|| Error::Merkle("data not found in tree".into()))?;
        let (siblings, order) = self.proof(value)?;

        let mut running = self.leaves[idx].hash.clone();
        for (sibling, side) in siblings.iter().zip(order.iter()) {
            running = if *side == 1 { combine(&running, sibling) } else { combine(sibling, &running) };
        }

        if running == self.root() {
            Ok(())
        } else {
            Err(Error::Merkle("invalid merkle proof".into()))
        }
    }

    /// Verifies the whole tree's internal consistency, recomputing every
    /// layer from the leaf hashes up to the root.
    pub fn verify(&self) -> Result<()> {
        let mut layer = self.layers[0].clone();
        for expected in &self.layers[1..] {
            let mut next = Vec::with_capacity(expected.len());
            let mut i = 0;
            while i < layer.len() {
                let left = &layer[i];
                let right = layer.get(i + 1).unwrap_or(left);
                next.push(combine(left, right));
                i += 2;
            }
            if &next != expected {
                return Err(Error::Merkle("calculated merkle root does not match the original one".into()));
            }
            layer = next;
        }
        Ok(())
    }
}

/// Verifies a membership proof without needing the whole tree: hashes
/// `leaf_hash` up through `siblings`/`order` and compares against `root`.
pub fn verify_proof(leaf_hash: &[u8], siblings: &[Vec<u8>], order: &[u8], root: &[u8]) -> bool {
    let mut running = leaf_hash.to_vec();
    for (sibling, side) in siblings.iter().zip(order.iter()) {
        running = if *side == 1 { combine(&running, sibling) } else { combine(sibling, &running) };
    }
    running == root
}
