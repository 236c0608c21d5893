//! Core definitions and constants for memberdb.
//!
//! This module contains the fixed parameters shared by the wire format,
//! the Merkle tree and the on-disk store:
//! - Hash and hex widths
//! - Proof codec sizes
//! - Store file layout

/// Length of a commitment, node or root in bytes.
pub const HASH_LEN: usize = 32;

/// Number of hex digits in a wire-encoded hash.
pub const HEX_HASH_LEN: usize = HASH_LEN * 2;

/// Optional prefix accepted on input and always emitted on output.
pub const HEX_PREFIX: &str = "0x";

/// Size of one encoded proof step: position byte followed by the sibling.
pub const PROOF_NODE_LEN: usize = 1 + HASH_LEN;

/// Longest proof the byte codec accepts.
/// A tree this deep would hold more leaves than can be addressed.
pub const MAX_PROOF_LEN: usize = 64;

/// Position byte for a sibling that sits to the left of the running node.
pub const POSITION_LEFT: u8 = 0;

/// Position byte for a sibling that sits to the right of the running node.
pub const POSITION_RIGHT: u8 = 1;

/// Version reported by the ledger before anything has been published.
pub const EMPTY_VERSION: u64 = 0;

/// Width of the zero-padded version keys in the roots table.
/// Padding keeps the lexical order of keys equal to the numeric order.
pub const VERSION_KEY_WIDTH: usize = 20;

/// Suffix of the append-only table logs written by the file store.
pub const TABLE_FILE_SUFFIX: &str = "log";

/// Length of the little-endian frame length that precedes every record.
pub const FRAME_HEADER_LEN: usize = 4;

/// Largest record frame the file store will write or replay (16MB).
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Formats a ledger version as a store key.
pub fn version_key(version: u64) -> String {
    format!("{:0width$}", version, width = VERSION_KEY_WIDTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_keys_sort_numerically() {
        let mut keys: Vec<String> = [10u64, 9, 100, 1].iter().map(|v| version_key(*v)).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![version_key(1), version_key(9), version_key(10), version_key(100)]
        );
        assert_eq!(version_key(u64::MAX).len(), VERSION_KEY_WIDTH);
    }
}
