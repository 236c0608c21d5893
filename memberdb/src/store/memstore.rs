use dashmap::{mapref::entry::Entry, DashMap};
use strum::EnumCount;

use super::{Store, StoreError, Table};

/// In-process store. Nothing survives the process.
#[derive(Default)]
pub struct MemStore {
    tables: [DashMap<String, Vec<u8>>; Table::COUNT],
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemStore {
    fn get(&self, table: Table, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.tables[table.slot()].get(key).map(|v| v.value().clone()))
    }

    fn put(&self, table: Table, key: &str, value: &[u8]) -> Result<(), StoreError> {
        match self.tables[table.slot()].entry(key.to_owned()) {
            Entry::Occupied(_) => Err(StoreError::KeyExists {
                table,
                key: key.to_owned(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(value.to_vec());
                Ok(())
            }
        }
    }

    fn scan(&self, table: Table) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let mut out: Vec<(String, Vec<u8>)> = self.tables[table.slot()]
            .iter()
            .map(|kv| (kv.key().clone(), kv.value().clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    fn len(&self, table: Table) -> Result<usize, StoreError> {
        Ok(self.tables[table.slot()].len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_put_is_insert_only() {
        let store = MemStore::new();
        store.put(Table::Commitments, "alice", b"v1").unwrap();
        match store.put(Table::Commitments, "alice", b"v2") {
            Err(StoreError::KeyExists { table, key }) => {
                assert_eq!(table, Table::Commitments);
                assert_eq!(key, "alice");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            store.get(Table::Commitments, "alice").unwrap(),
            Some(b"v1".to_vec())
        );
    }

    #[test]
    fn test_scan_sorted_by_key() {
        let store = MemStore::new();
        for k in ["c", "a", "b"] {
            store.put(Table::Roots, k, k.as_bytes()).unwrap();
        }
        let keys: Vec<String> = store
            .scan(Table::Roots)
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(store.len(Table::Roots).unwrap(), 3);
        assert_eq!(store.len(Table::Verifications).unwrap(), 0);
    }

    #[test]
    fn test_racing_puts_have_one_winner() {
        let store = Arc::new(MemStore::new());
        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || store.put(Table::Verifications, "bob", &[i]).is_ok())
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(wins, 1);
    }
}
