//! Persistence boundary for the registry.
//!
//! Every component receives an explicit [`Store`] handle; there is no
//! process-wide store. The trait asks only for get/put/scan over three
//! append-only tables. Two implementations ship with the crate:
//!
//! - [`MemStore`]: in-process tables, used by tests and ephemeral registries
//! - [`FileStore`]: one append-only log per table, replayed on open

pub mod filestore;
pub mod memstore;

pub use filestore::FileStore;
pub use memstore::MemStore;

use auto_impl::auto_impl;
use serde::{de::DeserializeOwned, Serialize};
use strum::{AsRefStr, Display, EnumCount, EnumIter};

/// Logical tables kept by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter, EnumCount)]
#[strum(serialize_all = "snake_case")]
pub enum Table {
    /// owner id -> `Commitment`
    Commitments,
    /// zero-padded version -> `MerkleRoot`
    Roots,
    /// owner id -> `Verification`
    Verifications,
}

impl Table {
    #[inline]
    pub fn slot(self) -> usize {
        self as usize
    }
}

/// Failures of the persistence collaborator.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("io error on table {table}: {source}")]
    Io {
        table: Table,
        #[source]
        source: std::io::Error,
    },

    #[error("codec error on table {table}: {source}")]
    Codec {
        table: Table,
        #[source]
        source: bincode::Error,
    },

    #[error("cannot open store directory {dir}: {source}")]
    Dir {
        dir: String,
        #[source]
        source: std::io::Error,
    },

    #[error("key {key} already exists in table {table}")]
    KeyExists { table: Table, key: String },

    #[error("frame of {len} bytes exceeds the limit on table {table}")]
    FrameTooLarge { table: Table, len: usize },

    #[error("{0}")]
    Other(String),
}

/// Key-value persistence with append-only tables.
///
/// Implementations must make `put` an atomic insert-if-absent: two racing
/// writers of the same key see exactly one success and one
/// [`StoreError::KeyExists`].
#[auto_impl(Arc, Box)]
pub trait Store: Send + Sync {
    /// Fetch the record stored under `key`.
    fn get(&self, table: Table, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Insert a new record. Records are never overwritten.
    fn put(&self, table: Table, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Every record of `table`, sorted by key.
    fn scan(&self, table: Table) -> Result<Vec<(String, Vec<u8>)>, StoreError>;

    /// Number of records in `table`.
    fn len(&self, table: Table) -> Result<usize, StoreError> {
        Ok(self.scan(table)?.len())
    }
}

pub fn encode_record<T: Serialize>(table: Table, record: &T) -> Result<Vec<u8>, StoreError> {
    bincode::serialize(record).map_err(|source| StoreError::Codec { table, source })
}

pub fn decode_record<T: DeserializeOwned>(table: Table, bz: &[u8]) -> Result<T, StoreError> {
    bincode::deserialize(bz).map_err(|source| StoreError::Codec { table, source })
}

/// Fetch and decode one typed record.
pub fn get_record<T: DeserializeOwned>(
    store: &dyn Store,
    table: Table,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(table, key)? {
        Some(bz) => decode_record(table, &bz).map(Some),
        None => Ok(None),
    }
}

/// Encode and insert one typed record.
pub fn put_record<T: Serialize>(
    store: &dyn Store,
    table: Table,
    key: &str,
    record: &T,
) -> Result<(), StoreError> {
    let bz = encode_record(table, record)?;
    store.put(table, key, &bz)
}

/// Decode every record of a table, in key order.
pub fn scan_records<T: DeserializeOwned>(
    store: &dyn Store,
    table: Table,
) -> Result<Vec<(String, T)>, StoreError> {
    store
        .scan(table)?
        .into_iter()
        .map(|(key, bz)| decode_record(table, &bz).map(|record| (key, record)))
        .collect()
}
