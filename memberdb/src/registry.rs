use log::{info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::commitments::{check_owner_id, check_value, Commitment, CommitmentStore};
use crate::config::Config;
use crate::error::{RegistryError, Result};
use crate::gate::{PaymentConfirmer, TrustCaller, Verification, VerificationGate, VerificationStatus};
use crate::ledger::{MerkleRoot, RootHistory, RootLedger, Snapshot};
use crate::merkletree::{proof, ProofPath, Tree};
use crate::store::{FileStore, MemStore, Store};
use crate::utils::codec::{self, serde_hex32};
use crate::utils::hasher::Hash32;

/// Result of a successful registration.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Registration {
    pub commitment: Commitment,
    /// The root published for the set that includes `commitment`
    pub root: MerkleRoot,
}

/// An inclusion proof bound to the root it was computed against.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MembershipProof {
    #[serde(with = "serde_hex32")]
    pub commitment: Hash32,
    pub proof: ProofPath,
    #[serde(with = "serde_hex32")]
    pub root: Hash32,
    pub version: u64,
    pub leaf_count: u64,
}

impl MembershipProof {
    /// Recomputes the root from the commitment and the path.
    pub fn verify(&self) -> bool {
        proof::verify(&self.commitment, &self.proof, &self.root)
    }
}

/// The commitment registry.
///
/// Writers go through one critical section: store the commitment, rebuild
/// the tree from every stored commitment, publish the new root. Readers
/// (`latest_root`, `prove`, `lookup`) never take that lock; they see the
/// snapshot of the last completed publish.
pub struct Registry {
    commitments: CommitmentStore,
    ledger: RootLedger,
    gate: VerificationGate,
    write_lock: Mutex<()>,
}

impl Registry {
    /// Opens the registry described by `config`.
    pub fn open(config: &Config) -> Result<Self> {
        let store: Arc<dyn Store> = if config.in_memory {
            Arc::new(MemStore::new())
        } else {
            Arc::new(FileStore::open(&config.dir, config.sync_writes)?)
        };
        Self::with_store(store)
    }

    /// Opens a registry on an existing store handle.
    /// Payment claims are trusted, see [`crate::gate`].
    pub fn with_store(store: Arc<dyn Store>) -> Result<Self> {
        Self::with_confirmer(store, Arc::new(TrustCaller))
    }

    /// Opens a registry whose verification gate asks `confirmer` about
    /// every payment claim.
    pub fn with_confirmer(
        store: Arc<dyn Store>,
        confirmer: Arc<dyn PaymentConfirmer>,
    ) -> Result<Self> {
        let commitments = CommitmentStore::new(store.clone());
        let tree = Tree::build(commitments.values()?);
        let ledger = RootLedger::open(store.clone(), tree)?;
        let gate = VerificationGate::with_confirmer(store, confirmer);
        Ok(Self {
            commitments,
            ledger,
            gate,
            write_lock: Mutex::new(()),
        })
    }

    /// Registers `value` for `owner_id` and publishes the resulting root.
    ///
    /// A malformed value is rejected before anything is read or locked. If
    /// the rebuild or the publish fails the error is returned and the
    /// previous root stays current; the stored commitment is picked up by
    /// the next publish. Retrying such a registration still fails with
    /// [`RegistryError::AlreadyRegistered`], but only after the root covering
    /// the stored commitment has been published.
    pub fn register(&self, owner_id: &str, value: &str) -> Result<Registration> {
        let value = codec::parse_hash32(value)?;
        check_owner_id(owner_id)?;
        check_value(&value)?;

        let _guard = self.write_lock.lock();
        let commitment = match self.commitments.insert(owner_id, value) {
            Ok(commitment) => commitment,
            Err(RegistryError::AlreadyRegistered(existing)) => {
                self.republish_if_stale_locked(&existing)?;
                return Err(RegistryError::AlreadyRegistered(existing));
            }
            Err(e) => return Err(e),
        };
        let root = self.rebuild_locked()?;
        info!(
            "registered {} for {} ({} leaves)",
            commitment.value_hex(),
            owner_id,
            root.leaf_count
        );
        Ok(Registration { commitment, root })
    }

    /// Rebuilds the tree from the stored commitments and publishes it as a
    /// new version.
    pub fn rebuild(&self) -> Result<MerkleRoot> {
        let _guard = self.write_lock.lock();
        self.rebuild_locked()
    }

    // A commitment stored by a registration whose publish failed is not in
    // the published tree yet. Retrying that registration publishes it.
    fn republish_if_stale_locked(&self, existing: &Commitment) -> Result<()> {
        let snapshot = self.ledger.snapshot();
        let stored = self.commitments.len()? as u64;
        if snapshot.tree.contains(&existing.value) && snapshot.root.leaf_count == stored {
            return Ok(());
        }
        warn!(
            "latest root version {} covers {} of {} commitments, republishing",
            snapshot.root.version, snapshot.root.leaf_count, stored
        );
        self.rebuild_locked()?;
        Ok(())
    }

    fn rebuild_locked(&self) -> Result<MerkleRoot> {
        let tree = Tree::build(self.commitments.values()?);
        self.ledger.publish(Arc::new(tree))
    }

    /// The commitment registered by `owner_id`.
    pub fn lookup(&self, owner_id: &str) -> Result<Commitment> {
        self.commitments.lookup(owner_id)
    }

    /// Number of stored commitments, published or not.
    pub fn commitment_count(&self) -> Result<usize> {
        self.commitments.len()
    }

    /// The current root; the sentinel root with version 0 when empty.
    pub fn latest_root(&self) -> MerkleRoot {
        self.ledger.latest()
    }

    pub fn root_at(&self, version: u64) -> Result<MerkleRoot> {
        self.ledger.get(version)
    }

    pub fn history(&self) -> RootHistory {
        self.ledger.history()
    }

    /// The current root together with the tree it was built from.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.ledger.snapshot()
    }

    /// Inclusion proof of a wire-format commitment against the current root.
    pub fn prove(&self, value: &str) -> Result<MembershipProof> {
        let value = codec::parse_hash32(value)?;
        self.prove_value(&value)
    }

    /// Inclusion proof of the commitment registered by `owner_id`.
    pub fn prove_owner(&self, owner_id: &str) -> Result<MembershipProof> {
        let commitment = self.commitments.lookup(owner_id)?;
        self.prove_value(&commitment.value)
    }

    fn prove_value(&self, value: &Hash32) -> Result<MembershipProof> {
        let snapshot = self.ledger.snapshot();
        let proof = snapshot.tree.get_proof(value)?;
        Ok(MembershipProof {
            commitment: *value,
            proof,
            root: snapshot.root.root,
            version: snapshot.root.version,
            leaf_count: snapshot.root.leaf_count,
        })
    }

    /// Records that `owner_id` completed the payment-backed verification.
    pub fn record_verification(
        &self,
        owner_id: &str,
        transaction_ref: &str,
        amount: &str,
        payer_address: &str,
    ) -> Result<Verification> {
        self.gate
            .record_verification(owner_id, transaction_ref, amount, payer_address)
    }

    pub fn verification_status(&self, owner_id: &str) -> Result<VerificationStatus> {
        self.gate.status(owner_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::hasher::{hash_pair, ZERO_HASH32};

    fn hex_of(byte: u8) -> String {
        format!("0x{}", hex::encode([byte; 32]))
    }

    fn new_registry() -> Registry {
        Registry::open(&Config::in_memory()).unwrap()
    }

    #[test]
    fn test_fresh_registry() {
        let registry = new_registry();
        let latest = registry.latest_root();
        assert_eq!(latest.root, ZERO_HASH32);
        assert_eq!(latest.leaf_count, 0);
        assert_eq!(latest.version, 0);
        match registry.prove(&hex_of(0xaa)) {
            Err(RegistryError::NotInSet(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_two_owner_scenario() {
        let registry = new_registry();
        registry.register("A", &hex_of(0xaa)).unwrap();
        let reg = registry.register("B", &hex_of(0xbb)).unwrap();
        assert_eq!(reg.root.leaf_count, 2);
        assert_eq!(reg.root.root, hash_pair(&[0xaa; 32], &[0xbb; 32]));
        assert_eq!(registry.latest_root(), reg.root);

        let proof = registry.prove_owner("A").unwrap();
        assert_eq!(proof.proof.len(), 1);
        assert_eq!(proof.proof.nodes[0].sibling, [0xbb; 32]);
        assert!(proof.verify());
        assert!(proof::verify(&[0xaa; 32], &proof.proof, &registry.latest_root().root));
    }

    #[test]
    fn test_duplicate_owner_leaves_count() {
        let registry = new_registry();
        registry.register("A", &hex_of(1)).unwrap();
        let before = registry.latest_root();
        match registry.register("A", &hex_of(2)) {
            Err(RegistryError::AlreadyRegistered(existing)) => assert_eq!(existing.value, [1; 32]),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(registry.latest_root(), before);
        assert_eq!(registry.commitment_count().unwrap(), 1);
    }

    #[test]
    fn test_invalid_format_publishes_nothing() {
        let registry = new_registry();
        assert!(matches!(
            registry.register("A", "0xabc"),
            Err(RegistryError::InvalidFormat(_))
        ));
        assert!(matches!(
            registry.register("", &hex_of(1)),
            Err(RegistryError::InvalidFormat(_))
        ));
        assert!(registry.latest_root().is_empty_default());
        assert_eq!(registry.commitment_count().unwrap(), 0);
    }

    #[test]
    fn test_rebuild_publishes_new_version() {
        let registry = new_registry();
        registry.register("A", &hex_of(1)).unwrap();
        let first = registry.latest_root();
        let rebuilt = registry.rebuild().unwrap();
        assert_eq!(rebuilt.version, first.version + 1);
        assert_eq!(rebuilt.root, first.root);
        assert_eq!(rebuilt.leaf_count, first.leaf_count);
    }
}
