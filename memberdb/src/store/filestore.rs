//! Append-only, file-backed store.
//!
//! Each table is a single log file `<dir>/<table>.log` made of frames:
//!
//! ```text
//! +----------------+-------------------------------------+
//! | len (4B, LE)   | bincode((key: String, value: bytes)) |
//! +----------------+-------------------------------------+
//! ```
//!
//! The log is replayed into an in-memory index on open. A frame cut short by
//! a crash can only sit at the tail; it is dropped and the file truncated back
//! to the last complete frame. A complete frame that fails to decode is
//! corruption and fails the open instead.

use byteorder::{ByteOrder, LittleEndian};
use dashmap::DashMap;
use log::{debug, error, warn};
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use strum::IntoEnumIterator;

use super::{Store, StoreError, Table};
use crate::def::{FRAME_HEADER_LEN, MAX_FRAME_LEN, TABLE_FILE_SUFFIX};

struct LogFile {
    file: File,
    size: u64,
}

struct TableLog {
    table: Table,
    file: Mutex<LogFile>,
    index: DashMap<String, Vec<u8>>,
    // set when a failed append could not be cut back; the log then ends in
    // a partial frame and takes no more appends until it is reopened
    poisoned: AtomicBool,
}

/// Store that keeps one append-only log per table under a directory.
pub struct FileStore {
    dir: String,
    sync_writes: bool,
    tables: Vec<TableLog>,
}

enum Frame {
    Complete {
        key: String,
        value: Vec<u8>,
        used: usize,
    },
    Torn,
}

fn decode_frame(table: Table, bz: &[u8]) -> Result<Frame, StoreError> {
    if bz.len() < FRAME_HEADER_LEN {
        return Ok(Frame::Torn);
    }
    let len = LittleEndian::read_u32(&bz[..FRAME_HEADER_LEN]) as usize;
    if len > MAX_FRAME_LEN {
        return Err(StoreError::FrameTooLarge { table, len });
    }
    let end = FRAME_HEADER_LEN + len;
    if bz.len() < end {
        return Ok(Frame::Torn);
    }
    let (key, value): (String, Vec<u8>) = bincode::deserialize(&bz[FRAME_HEADER_LEN..end])
        .map_err(|source| StoreError::Codec { table, source })?;
    Ok(Frame::Complete {
        key,
        value,
        used: end,
    })
}

fn encode_frame(table: Table, key: &str, value: &[u8]) -> Result<Vec<u8>, StoreError> {
    let payload =
        bincode::serialize(&(key, value)).map_err(|source| StoreError::Codec { table, source })?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(StoreError::FrameTooLarge {
            table,
            len: payload.len(),
        });
    }
    let mut frame = vec![0u8; FRAME_HEADER_LEN];
    LittleEndian::write_u32(&mut frame[..], payload.len() as u32);
    frame.extend_from_slice(&payload);
    Ok(frame)
}

impl TableLog {
    fn open(dir: &str, table: Table) -> Result<Self, StoreError> {
        let io = |source: std::io::Error| StoreError::Io { table, source };
        let name = format!("{}/{}.{}", dir, table, TABLE_FILE_SUFFIX);
        let mut file = File::options()
            .read(true)
            .append(true)
            .create(true)
            .open(&name)
            .map_err(io)?;
        let mut bz = Vec::new();
        file.read_to_end(&mut bz).map_err(io)?;

        let index = DashMap::new();
        let mut pos = 0usize;
        while pos < bz.len() {
            match decode_frame(table, &bz[pos..])? {
                Frame::Complete { key, value, used } => {
                    if index.insert(key.clone(), value).is_some() {
                        warn!("{}: duplicate key {} in log, keeping the last", name, key);
                    }
                    pos += used;
                }
                Frame::Torn => break,
            }
        }
        if pos < bz.len() {
            warn!(
                "{}: dropping {} bytes of a torn frame at offset {}",
                name,
                bz.len() - pos,
                pos
            );
            file.set_len(pos as u64).map_err(io)?;
        }
        debug!("replayed {} records from {}", index.len(), name);

        Ok(Self {
            table,
            file: Mutex::new(LogFile {
                file,
                size: pos as u64,
            }),
            index,
            poisoned: AtomicBool::new(false),
        })
    }
}

impl FileStore {
    /// Opens (creating if needed) the table logs under `dir`.
    ///
    /// # Arguments
    /// * `dir` - Directory holding the table logs
    /// * `sync_writes` - Whether every `put` waits for the data to reach disk
    pub fn open(dir: &str, sync_writes: bool) -> Result<Self, StoreError> {
        if !Path::new(dir).exists() {
            fs::create_dir_all(dir).map_err(|source| StoreError::Dir {
                dir: dir.to_owned(),
                source,
            })?;
        }
        let tables = Table::iter()
            .map(|table| TableLog::open(dir, table))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            dir: dir.to_owned(),
            sync_writes,
            tables,
        })
    }

    pub fn dir(&self) -> &str {
        &self.dir
    }

    fn log(&self, table: Table) -> &TableLog {
        &self.tables[table.slot()]
    }
}

impl Store for FileStore {
    fn get(&self, table: Table, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.log(table).index.get(key).map(|v| v.value().clone()))
    }

    fn put(&self, table: Table, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let log = self.log(table);
        let io = |source: std::io::Error| StoreError::Io {
            table: log.table,
            source,
        };
        // the file lock also serializes the existence check
        let mut guard = log.file.lock();
        if log.poisoned.load(Ordering::Acquire) {
            return Err(io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "log ends in a partial frame, reopen the store",
            )));
        }
        if log.index.contains_key(key) {
            return Err(StoreError::KeyExists {
                table,
                key: key.to_owned(),
            });
        }
        let frame = encode_frame(table, key, value)?;
        let written = guard.file.write_all(&frame).and_then(|_| {
            if self.sync_writes {
                guard.file.sync_data()
            } else {
                Ok(())
            }
        });
        if let Err(e) = written {
            // cut back a partial frame so later appends stay readable
            if let Err(trunc) = guard.file.set_len(guard.size) {
                error!(
                    "table {}: cannot truncate back to {} after a failed write: {}",
                    table, guard.size, trunc
                );
                log.poisoned.store(true, Ordering::Release);
            }
            return Err(io(e));
        }
        guard.size += frame.len() as u64;
        log.index.insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    fn scan(&self, table: Table) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let mut out: Vec<(String, Vec<u8>)> = self
            .log(table)
            .index
            .iter()
            .map(|kv| (kv.key().clone(), kv.value().clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    fn len(&self, table: Table) -> Result<usize, StoreError> {
        Ok(self.log(table).index.len())
    }
}
