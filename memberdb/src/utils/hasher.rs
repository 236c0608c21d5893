//! Hashing utilities for the commitment tree.
//!
//! This module provides Keccak-256 based hashing functions for:
//! - Single values
//! - Pairs of sibling nodes, combined in sorted order
//! - In-place node hashing
//!
//! Keccak-256 is the hash an EVM verifier contract recomputes, so a root
//! published here can be checked on-chain without translation.

use sha3::{Digest, Keccak256};

/// Type alias for a 32-byte hash value.
/// Used for commitments, tree nodes and roots.
pub type Hash32 = [u8; 32];

/// A constant representing a hash of all zeros.
/// This is the root of a tree with no leaves.
pub const ZERO_HASH32: Hash32 = [0u8; 32];

/// Computes the Keccak-256 hash of a single value.
///
/// # Arguments
/// * `a` - Value to hash
///
/// # Returns
/// The 32-byte hash of the input
pub fn hash<T: AsRef<[u8]>>(a: T) -> Hash32 {
    let mut hasher = Keccak256::new();
    hasher.update(a);
    hasher.finalize().into()
}

/// Orders two sibling nodes so the smaller byte string comes first.
#[inline]
pub fn sort_pair<'a>(a: &'a Hash32, b: &'a Hash32) -> (&'a Hash32, &'a Hash32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Computes the parent of two sibling nodes.
///
/// The two children are sorted as byte strings before they are concatenated,
/// so `hash_pair(a, b) == hash_pair(b, a)`.
///
/// # Arguments
/// * `a` - One child
/// * `b` - The other child
///
/// # Returns
/// `keccak256(min(a, b) || max(a, b))`
pub fn hash_pair(a: &Hash32, b: &Hash32) -> Hash32 {
    let mut target = ZERO_HASH32;
    node_hash_inplace(&mut target, a, b);
    target
}

/// Computes the parent of two sibling nodes and stores it in-place.
///
/// # Arguments
/// * `target` - Buffer to store the resulting hash
/// * `src_a` - One child
/// * `src_b` - The other child
pub fn node_hash_inplace(target: &mut [u8], src_a: &Hash32, src_b: &Hash32) {
    let (lo, hi) = sort_pair(src_a, src_b);
    let mut hasher = Keccak256::new();
    hasher.update(lo);
    hasher.update(hi);
    target.copy_from_slice(&hasher.finalize());
}
