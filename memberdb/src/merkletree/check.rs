//! Verification utilities for tree consistency checking.
//!
//! The checks ensure that:
//! 1. Leaves are stored in ascending order
//! 2. Every parent is the sorted-pair hash of its two children
//! 3. A lone last node is carried up unchanged
//! 4. The last level holds exactly one node, the root

use super::tree::Tree;
use crate::utils::hasher::{self, Hash32};

/// Verifies that two hashes are equal.
///
/// # Arguments
/// * `tag` - Identifier used in the panic message
/// * `a` - First hash value
/// * `b` - Second hash value
///
/// # Panics
/// Panics if the hash values don't match
pub fn hash_equal(tag: &str, a: &[u8], b: &[u8]) {
    if !a.eq(b) {
        panic!(
            "{} not equal: {} vs {}",
            tag,
            hex::encode(a),
            hex::encode(b)
        );
    }
}

/// Verifies that `upper` is the fold of `lower`.
///
/// # Panics
/// Panics if a node does not match its children
pub fn check_level(level: usize, lower: &[Hash32], upper: &[Hash32]) {
    if upper.len() != lower.len().div_ceil(2) {
        panic!(
            "level {} has {} nodes for {} children",
            level,
            upper.len(),
            lower.len()
        );
    }
    let mut sum = [0u8; 32];
    for (i, parent) in upper.iter().enumerate() {
        let left = &lower[2 * i];
        match lower.get(2 * i + 1) {
            Some(right) => {
                hasher::node_hash_inplace(&mut sum, left, right);
                hash_equal(&format!("node {}-{}", level, i), &sum, parent);
            }
            None => hash_equal(&format!("promoted {}-{}", level, i), left, parent),
        }
    }
}

/// Verifies every hash relationship in `tree`.
///
/// # Panics
/// Panics on the first inconsistency found
pub fn check_hash_consistency(tree: &Tree) {
    let levels = tree.levels();
    if levels.is_empty() {
        return;
    }
    if !levels[0].windows(2).all(|w| w[0] <= w[1]) {
        panic!("leaves are not sorted");
    }
    for (i, pair) in levels.windows(2).enumerate() {
        check_level(i + 1, &pair[0], &pair[1]);
    }
    if let Some(top) = levels.last() {
        if top.len() != 1 {
            panic!("top level has {} nodes", top.len());
        }
        hash_equal("root", &top[0], &tree.root());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_built_trees_are_consistent() {
        for n in 0..40u8 {
            let tree = Tree::build((0..n).map(|i| hasher::hash([i])));
            check_hash_consistency(&tree);
        }
    }

    #[test]
    #[should_panic(expected = "node 1-0 not equal")]
    fn test_detects_bad_parent() {
        let lower = vec![[1u8; 32], [2u8; 32]];
        check_level(1, &lower, &[[0u8; 32]]);
    }

    #[test]
    #[should_panic(expected = "promoted 1-1 not equal")]
    fn test_detects_bad_promotion() {
        let lower = vec![[1u8; 32], [2u8; 32], [3u8; 32]];
        let upper = vec![hasher::hash_pair(&lower[0], &lower[1]), [4u8; 32]];
        check_level(1, &lower, &upper);
    }
}
