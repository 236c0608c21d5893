use log::debug;

use super::proof::{self, ProofPath};
use crate::error::Result;
use crate::utils::hasher::{self, Hash32, ZERO_HASH32};

/// A fully built commitment tree.
///
/// `levels[0]` holds the leaves in ascending byte order and the last level
/// holds only the root. An empty tree has no levels.
///
/// Two rules fix the shape of the tree for a given multiset of leaves:
/// - leaves are sorted before folding, so insertion order never matters
/// - on a level with an odd node count the last node is promoted to the next
///   level unchanged (it is not paired with a copy of itself)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tree {
    levels: Vec<Vec<Hash32>>,
}

/// Folds one level into the next with sorted-pair hashing.
fn fold_level(nodes: &[Hash32]) -> Vec<Hash32> {
    nodes
        .chunks(2)
        .map(|pair| match pair {
            [a, b] => hasher::hash_pair(a, b),
            // lone last node, promoted as is
            _ => pair[0],
        })
        .collect()
}

impl Tree {
    /// Builds the tree over `values`.
    ///
    /// Deterministic and free of side effects; the same multiset of values
    /// always yields the same tree whatever order it arrives in.
    pub fn build<I: IntoIterator<Item = Hash32>>(values: I) -> Self {
        let mut leaves: Vec<Hash32> = values.into_iter().collect();
        if leaves.is_empty() {
            return Self::default();
        }
        leaves.sort_unstable();
        let mut levels = vec![leaves];
        while let Some(nodes) = levels.last().filter(|nodes| nodes.len() > 1) {
            let next = fold_level(nodes);
            levels.push(next);
        }
        debug!(
            "built tree with {} leaves and {} levels",
            levels[0].len(),
            levels.len()
        );
        Self { levels }
    }

    /// The root, or the all-zero sentinel for an empty tree.
    pub fn root(&self) -> Hash32 {
        self.levels
            .last()
            .and_then(|top| top.first())
            .copied()
            .unwrap_or(ZERO_HASH32)
    }

    pub fn leaf_count(&self) -> usize {
        self.levels.first().map_or(0, |leaves| leaves.len())
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Leaves in ascending order.
    pub fn leaves(&self) -> &[Hash32] {
        self.levels
            .first()
            .map(|leaves| leaves.as_slice())
            .unwrap_or(&[])
    }

    /// All levels, leaves first, root last.
    pub fn levels(&self) -> &[Vec<Hash32>] {
        &self.levels
    }

    /// Number of levels above the leaves.
    pub fn depth(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    /// Index of `value` among the leaves, if it is one.
    pub fn leaf_index(&self, value: &Hash32) -> Option<usize> {
        self.leaves().binary_search(value).ok()
    }

    pub fn contains(&self, value: &Hash32) -> bool {
        self.leaf_index(value).is_some()
    }

    /// Inclusion proof for `value`, see [`proof::prove_inclusion`].
    pub fn get_proof(&self, value: &Hash32) -> Result<ProofPath> {
        proof::prove_inclusion(self, value)
    }
}
