//! Merkle tree over the registered commitments.
//!
//! - [`Tree`]: full rebuild of the tree from a commitment set
//! - [`proof`]: inclusion proof generation and verification
//! - [`check`]: tree consistency validation utilities
//!
//! The tree is rebuilt from scratch on every registration. That is O(n) per
//! write and is the scaling ceiling of the registry; an append-friendly
//! accumulator would have to keep the same root for the same leaf multiset.

pub mod check;
pub mod proof;
pub mod tree;

pub use proof::{prove_inclusion, verify, Position, ProofNode, ProofPath};
pub use tree::Tree;
