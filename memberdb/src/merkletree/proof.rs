//! Inclusion proofs for the commitment tree.
//!
//! A proof is the list of siblings met on the way from a leaf to the root.
//! Because parents hash their children in sorted order, [`verify`] needs
//! only the siblings; each step also records on which side the sibling sat
//! so a proof can be read and debugged by hand.
//!
//! Byte layout produced by [`ProofPath::to_bytes`]:
//!
//! ```text
//! +-----------+----------------------------------------------+
//! | count (1B)| count * (position (1B) | sibling hash (32B)) |
//! +-----------+----------------------------------------------+
//! ```

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use super::tree::Tree;
use crate::def::{MAX_PROOF_LEN, POSITION_LEFT, POSITION_RIGHT, PROOF_NODE_LEN};
use crate::error::{RegistryError, Result};
use crate::utils::codec::{self, serde_hex32};
use crate::utils::hasher::{self, Hash32, ZERO_HASH32};

/// Side of the running node on which the sibling sits.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Left,
    Right,
}

impl Position {
    pub fn to_byte(self) -> u8 {
        match self {
            Position::Left => POSITION_LEFT,
            Position::Right => POSITION_RIGHT,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            POSITION_LEFT => Some(Position::Left),
            POSITION_RIGHT => Some(Position::Right),
            _ => None,
        }
    }
}

/// One step of a proof.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ProofNode {
    #[serde(with = "serde_hex32")]
    pub sibling: Hash32,
    pub position: Position,
}

/// Ordered siblings from a leaf up to, but not including, the root.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct ProofPath {
    pub nodes: Vec<ProofNode>,
}

impl ProofPath {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Recomputes the root reached from `leaf` through this path.
    pub fn compute_root(&self, leaf: &Hash32) -> Hash32 {
        self.nodes.iter().fold(*leaf, |node, step| {
            hasher::hash_pair(&node, &step.sibling)
        })
    }

    /// Checks this path against `root`, see [`verify`].
    pub fn check(&self, leaf: &Hash32, root: &Hash32) -> bool {
        verify(leaf, self, root)
    }

    /// Encodes the path; fails for paths longer than `MAX_PROOF_LEN`, which
    /// no tree produces but a deserialized path may carry.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.nodes.len() > MAX_PROOF_LEN {
            return Err(RegistryError::InvalidFormat(format!(
                "proof of {} steps exceeds {}",
                self.nodes.len(),
                MAX_PROOF_LEN
            )));
        }
        let mut res = Vec::with_capacity(1 + self.nodes.len() * PROOF_NODE_LEN);
        res.push(self.nodes.len() as u8);
        for node in self.nodes.iter() {
            res.push(node.position.to_byte());
            res.extend_from_slice(&node.sibling);
        }
        Ok(res)
    }
}

/// Decodes the output of [`ProofPath::to_bytes`].
pub fn bytes_to_proof_path(bz: &[u8]) -> Result<ProofPath> {
    let Some((&count, body)) = bz.split_first() else {
        return Err(RegistryError::InvalidFormat("empty proof bytes".to_owned()));
    };
    let count = count as usize;
    if count > MAX_PROOF_LEN {
        return Err(RegistryError::InvalidFormat(format!(
            "proof of {} steps exceeds {}",
            count, MAX_PROOF_LEN
        )));
    }
    if body.len() != count * PROOF_NODE_LEN {
        return Err(RegistryError::InvalidFormat(format!(
            "proof of {} steps needs {} bytes, got {}",
            count,
            count * PROOF_NODE_LEN,
            body.len()
        )));
    }
    let nodes = body
        .chunks_exact(PROOF_NODE_LEN)
        .map(|chunk| {
            let position = Position::from_byte(chunk[0]).ok_or_else(|| {
                RegistryError::InvalidFormat(format!("bad position byte {}", chunk[0]))
            })?;
            let mut sibling = ZERO_HASH32;
            sibling.copy_from_slice(&chunk[1..]);
            Ok(ProofNode { sibling, position })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ProofPath { nodes })
}

/// Builds the inclusion proof of `value` in `tree`.
///
/// Fails with [`RegistryError::NotInSet`] when `value` is not a leaf, which
/// is always the case for the empty tree. A leaf that is promoted past an
/// odd level gets no step for that level, so its proof can be shorter than
/// `ceil(log2(leaf_count))`.
pub fn prove_inclusion(tree: &Tree, value: &Hash32) -> Result<ProofPath> {
    let mut idx = tree
        .leaf_index(value)
        .ok_or_else(|| RegistryError::NotInSet(codec::hash32_to_hex(value)))?;
    let levels = tree.levels();
    let mut nodes = Vec::with_capacity(tree.depth());
    for level in &levels[..levels.len() - 1] {
        let peer = idx ^ 1;
        if peer < level.len() {
            let position = if peer < idx {
                Position::Left
            } else {
                Position::Right
            };
            nodes.push(ProofNode {
                sibling: level[peer],
                position,
            });
        }
        idx /= 2;
    }
    Ok(ProofPath { nodes })
}

/// Checks that `leaf` belongs to the tree whose root is `claimed_root`.
///
/// Needs nothing but the hash function, so any third party holding the
/// published root can run it. The final comparison runs in constant time.
/// The sentinel root of the empty tree has no members and never verifies.
pub fn verify(leaf: &Hash32, proof: &ProofPath, claimed_root: &Hash32) -> bool {
    if claimed_root == &ZERO_HASH32 {
        return false;
    }
    let computed = proof.compute_root(leaf);
    computed[..].ct_eq(&claimed_root[..]).into()
}
