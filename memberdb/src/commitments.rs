//! The commitment store: one commitment per owner, never replaced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{RegistryError, Result};
use crate::store::{get_record, put_record, scan_records, Store, StoreError, Table};
use crate::utils::codec::{self, serde_hex32};
use crate::utils::hasher::{Hash32, ZERO_HASH32};

/// A registered commitment.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Commitment {
    /// Authenticated identity supplied by the caller, treated as opaque
    pub owner_id: String,
    /// The public 256-bit commitment
    #[serde(with = "serde_hex32")]
    pub value: Hash32,
    pub created_at: DateTime<Utc>,
}

impl Commitment {
    pub fn value_hex(&self) -> String {
        codec::hash32_to_hex(&self.value)
    }
}

pub(crate) fn check_owner_id(owner_id: &str) -> Result<()> {
    if owner_id.trim().is_empty() {
        return Err(RegistryError::InvalidFormat(
            "owner id must not be empty".to_owned(),
        ));
    }
    Ok(())
}

// The all-zero value is the root of the empty tree and cannot be a member.
pub(crate) fn check_value(value: &Hash32) -> Result<()> {
    if value == &ZERO_HASH32 {
        return Err(RegistryError::InvalidFormat(
            "the all-zero commitment is reserved".to_owned(),
        ));
    }
    Ok(())
}

/// Owner-keyed commitment records on top of a [`Store`] handle.
pub struct CommitmentStore {
    store: Arc<dyn Store>,
}

impl CommitmentStore {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Validates a wire-format commitment and registers it for `owner_id`.
    pub fn register(&self, owner_id: &str, value: &str) -> Result<Commitment> {
        let value = codec::parse_hash32(value)?;
        self.insert(owner_id, value)
    }

    /// Registers an already decoded commitment.
    ///
    /// Registration is not an upsert: if `owner_id` already holds a
    /// commitment the call fails with [`RegistryError::AlreadyRegistered`]
    /// carrying the existing record, and nothing is written.
    pub fn insert(&self, owner_id: &str, value: Hash32) -> Result<Commitment> {
        check_owner_id(owner_id)?;
        check_value(&value)?;
        if let Some(existing) = self.get(owner_id)? {
            return Err(RegistryError::AlreadyRegistered(Box::new(existing)));
        }
        let commitment = Commitment {
            owner_id: owner_id.to_owned(),
            value,
            created_at: Utc::now(),
        };
        match put_record(&*self.store, Table::Commitments, owner_id, &commitment) {
            Ok(()) => Ok(commitment),
            // lost a race with another writer for the same owner
            Err(StoreError::KeyExists { .. }) => match self.get(owner_id)? {
                Some(existing) => Err(RegistryError::AlreadyRegistered(Box::new(existing))),
                None => Err(RegistryError::NotFound(owner_id.to_owned())),
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the commitment registered by `owner_id`.
    pub fn lookup(&self, owner_id: &str) -> Result<Commitment> {
        self.get(owner_id)?
            .ok_or_else(|| RegistryError::NotFound(format!("no commitment for owner {}", owner_id)))
    }

    /// Every registered value, the input of a tree rebuild.
    pub fn values(&self) -> Result<Vec<Hash32>> {
        let records = scan_records::<Commitment>(&*self.store, Table::Commitments)?;
        Ok(records.into_iter().map(|(_, c)| c.value).collect())
    }

    /// Number of registered commitments.
    pub fn len(&self) -> Result<usize> {
        Ok(self.store.len(Table::Commitments)?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn get(&self, owner_id: &str) -> Result<Option<Commitment>> {
        Ok(get_record(&*self.store, Table::Commitments, owner_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;

    fn new_store() -> CommitmentStore {
        CommitmentStore::new(Arc::new(MemStore::new()))
    }

    fn hex_of(byte: u8) -> String {
        format!("0x{}", hex::encode([byte; 32]))
    }

    #[test]
    fn test_register_and_lookup() {
        let store = new_store();
        let c = store.register("alice", &hex_of(0xaa)).unwrap();
        assert_eq!(c.owner_id, "alice");
        assert_eq!(c.value, [0xaa; 32]);
        assert_eq!(store.lookup("alice").unwrap(), c);
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.values().unwrap(), vec![[0xaa; 32]]);
    }

    #[test]
    fn test_second_registration_returns_existing() {
        let store = new_store();
        let first = store.register("alice", &hex_of(0xaa)).unwrap();
        match store.register("alice", &hex_of(0xbb)) {
            Err(RegistryError::AlreadyRegistered(existing)) => assert_eq!(*existing, first),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.lookup("alice").unwrap().value, [0xaa; 32]);
    }

    #[test]
    fn test_malformed_value_touches_nothing() {
        let store = new_store();
        let zero = format!("0x{}", "0".repeat(64));
        for bad in ["0x1234", "zz", "", zero.as_str()] {
            match store.register("alice", bad) {
                Err(RegistryError::InvalidFormat(_)) => {}
                other => panic!("unexpected {:?}", other),
            }
        }
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_empty_owner_rejected() {
        let store = new_store();
        match store.register("  ", &hex_of(1)) {
            Err(RegistryError::InvalidFormat(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_lookup_missing_owner() {
        match new_store().lookup("nobody") {
            Err(RegistryError::NotFound(msg)) => assert!(msg.contains("nobody")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
