//! memberdb is a commitment registry that publishes versioned Merkle roots
//! and serves membership proofs against them.
//!
//! # Overview
//! Each owner registers exactly one opaque 256-bit commitment. The set of
//! commitments is folded into a Merkle tree with sorted-pair Keccak-256
//! hashing, and every change publishes a new root version. Anyone holding a
//! published root can check an inclusion proof with [`merkletree::verify`]
//! alone. Separately, a verification gate records, once per owner, the
//! evidence of an external payment.
//!
//! # Architecture
//! - [`commitments::CommitmentStore`]: one commitment per owner, never replaced
//! - [`merkletree::Tree`]: deterministic, order-independent tree builder
//! - [`ledger::RootLedger`]: append-only root history with an atomic "latest"
//! - [`merkletree::proof`]: proof generation and verification
//! - [`gate::VerificationGate`]: idempotent payment-confirmation records
//! - [`Registry`]: wires the above to one [`store::Store`] handle and
//!   serializes the register / rebuild / publish sequence
//!
//! # Example Usage
//! ```no_run
//! use memberdb::{config::Config, Registry};
//!
//! let registry = Registry::open(&Config::from_dir("/tmp/memberdb")).unwrap();
//! let commitment = format!("0x{}", "aa".repeat(32));
//! registry.register("owner-1", &commitment).unwrap();
//!
//! let proof = registry.prove(&commitment).unwrap();
//! assert!(proof.verify());
//! ```

pub mod commitments;
pub mod config;
pub mod def;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod merkletree;
pub mod registry;
pub mod store;
pub mod utils;

pub use commitments::Commitment;
pub use error::{RegistryError, Result};
pub use gate::{Verification, VerificationStatus};
pub use ledger::MerkleRoot;
pub use registry::{MembershipProof, Registration, Registry};
