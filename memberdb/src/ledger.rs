//! The root ledger: an append-only history of published roots.
//!
//! Every publish persists a new [`MerkleRoot`] under the next version and
//! then swaps the `{root, tree}` snapshot readers see. The swap is the only
//! point where a new root becomes visible, so a reader either sees the old
//! pair or the new pair, never a root without its tree. If persisting the
//! record fails nothing is swapped and the previous root stays current.

use atomptr::{AtomPtr, Ref};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::def::{version_key, EMPTY_VERSION};
use crate::error::{RegistryError, Result};
use crate::merkletree::Tree;
use crate::store::{get_record, put_record, scan_records, Store, Table};
use crate::utils::codec::{self, serde_hex32};
use crate::utils::hasher::{Hash32, ZERO_HASH32};

/// One published version of the tree root.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MerkleRoot {
    #[serde(with = "serde_hex32")]
    pub root: Hash32,
    pub leaf_count: u64,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

impl MerkleRoot {
    /// What `latest` reports before anything was published.
    pub fn empty() -> Self {
        Self {
            root: ZERO_HASH32,
            leaf_count: 0,
            created_at: DateTime::<Utc>::default(),
            version: EMPTY_VERSION,
        }
    }

    pub fn is_empty_default(&self) -> bool {
        self.version == EMPTY_VERSION
    }

    pub fn root_hex(&self) -> String {
        codec::hash32_to_hex(&self.root)
    }

    /// Whether this record describes `tree`.
    pub fn matches(&self, tree: &Tree) -> bool {
        self.root == tree.root() && self.leaf_count == tree.leaf_count() as u64
    }
}

/// A published root together with the tree it was computed from.
#[derive(Debug)]
pub struct Snapshot {
    pub root: MerkleRoot,
    pub tree: Arc<Tree>,
}

impl Snapshot {
    fn empty() -> Self {
        Self {
            root: MerkleRoot::empty(),
            tree: Arc::new(Tree::default()),
        }
    }
}

pub struct RootLedger {
    store: Arc<dyn Store>,
    latest: AtomPtr<Arc<Snapshot>>,
    // serializes version assignment between publishers
    publish_lock: Mutex<()>,
}

impl RootLedger {
    /// Opens the ledger and installs `tree` as the current tree.
    ///
    /// When the newest persisted root does not describe `tree` (a crash
    /// between a commitment write and its publish), a new version is
    /// published for `tree` right away.
    pub fn open(store: Arc<dyn Store>, tree: Tree) -> Result<Self> {
        let persisted = scan_records::<MerkleRoot>(&*store, Table::Roots)?
            .pop()
            .map(|(_, root)| root);
        let ledger = Self {
            store,
            latest: AtomPtr::new(Arc::new(Snapshot::empty())),
            publish_lock: Mutex::new(()),
        };
        let tree = Arc::new(tree);
        match persisted {
            Some(root) if root.matches(&tree) => {
                info!(
                    "ledger at version {} root {} leaves {}",
                    root.version,
                    root.root_hex(),
                    root.leaf_count
                );
                ledger.install(Snapshot { root, tree });
            }
            Some(root) => {
                warn!(
                    "ledger version {} has {} leaves but the store holds {}, republishing",
                    root.version,
                    root.leaf_count,
                    tree.leaf_count()
                );
                ledger.append(root.version + 1, tree)?;
            }
            None if tree.is_empty() => {}
            None => {
                warn!(
                    "no root published for {} stored commitments, publishing",
                    tree.leaf_count()
                );
                ledger.append(EMPTY_VERSION + 1, tree)?;
            }
        }
        Ok(ledger)
    }

    /// Publishes `tree` as the next version and makes it current.
    ///
    /// Root and leaf count are read off the fully built tree, so they always
    /// agree with each other and with the tree proofs are served from.
    pub fn publish(&self, tree: Arc<Tree>) -> Result<MerkleRoot> {
        let _guard = self.publish_lock.lock();
        let next = self.latest().version + 1;
        self.append_locked(next, tree)
    }

    fn append(&self, version: u64, tree: Arc<Tree>) -> Result<MerkleRoot> {
        let _guard = self.publish_lock.lock();
        self.append_locked(version, tree)
    }

    fn append_locked(&self, version: u64, tree: Arc<Tree>) -> Result<MerkleRoot> {
        let root = MerkleRoot {
            root: tree.root(),
            leaf_count: tree.leaf_count() as u64,
            created_at: Utc::now(),
            version,
        };
        if let Err(e) = put_record(&*self.store, Table::Roots, &version_key(version), &root) {
            error!("failed to publish root version {}: {}", version, e);
            return Err(e.into());
        }
        info!(
            "published root {} version {} leaves {}",
            root.root_hex(),
            root.version,
            root.leaf_count
        );
        self.install(Snapshot {
            root: root.clone(),
            tree,
        });
        Ok(root)
    }

    fn install(&self, snapshot: Snapshot) {
        let old = self.latest.swap(Arc::new(snapshot));
        drop(old);
    }

    /// The current root and its tree.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        let arc: Ref<Arc<Snapshot>> = self.latest.get_ref();
        Arc::clone(&arc)
    }

    /// The current root, or [`MerkleRoot::empty`] before the first publish.
    pub fn latest(&self) -> MerkleRoot {
        self.snapshot().root.clone()
    }

    /// A past root by version.
    pub fn get(&self, version: u64) -> Result<MerkleRoot> {
        get_record(&*self.store, Table::Roots, &version_key(version))?
            .ok_or_else(|| RegistryError::NotFound(format!("no root with version {}", version)))
    }

    /// Every root published up to now, oldest first.
    ///
    /// The history is bounded by the version current at the time of the
    /// call and reads one record per step; iterating it again starts over.
    pub fn history(&self) -> RootHistory {
        RootHistory {
            store: self.store.clone(),
            upto: self.latest().version,
        }
    }
}

/// Lazy, restartable view over published roots.
#[derive(Clone)]
pub struct RootHistory {
    store: Arc<dyn Store>,
    upto: u64,
}

impl RootHistory {
    /// Number of versions the history covers.
    pub fn len(&self) -> usize {
        self.upto as usize
    }

    pub fn is_empty(&self) -> bool {
        self.upto == EMPTY_VERSION
    }

    pub fn iter(&self) -> RootHistoryIter {
        RootHistoryIter {
            store: self.store.clone(),
            next: EMPTY_VERSION + 1,
            upto: self.upto,
        }
    }
}

impl IntoIterator for &RootHistory {
    type Item = Result<MerkleRoot>;
    type IntoIter = RootHistoryIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct RootHistoryIter {
    store: Arc<dyn Store>,
    next: u64,
    upto: u64,
}

impl Iterator for RootHistoryIter {
    type Item = Result<MerkleRoot>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next > self.upto {
            return None;
        }
        let version = self.next;
        self.next += 1;
        let item = match get_record::<MerkleRoot>(&*self.store, Table::Roots, &version_key(version)) {
            Ok(Some(root)) => Ok(root),
            Ok(None) => Err(RegistryError::NotFound(format!(
                "root version {} missing from history",
                version
            ))),
            Err(e) => Err(e.into()),
        };
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.upto + 1).saturating_sub(self.next) as usize;
        (left, Some(left))
    }
}
