//! Configuration module for memberdb.
//!
//! A registry either lives in memory or on disk under `dir`. On disk every
//! table is an append-only log; `sync_writes` decides whether each write
//! waits for the data to reach the device.
//!
//! # Usage Examples
//! ```no_run
//! use memberdb::config::Config;
//!
//! // Durable registry under a directory
//! let config = Config::from_dir("/var/lib/memberdb");
//!
//! // Throwaway registry for tests
//! let config = Config::in_memory();
//! ```

/// Default directory for the table logs.
pub const DEFAULT_DIR: &str = "memberdb";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base directory for the table logs
    pub dir: String,
    /// Keep everything in process memory and ignore `dir`
    pub in_memory: bool,
    /// Whether every write is synced to disk before it is acknowledged
    pub sync_writes: bool,
}

impl Default for Config {
    /// # Default Values
    /// - `dir`: `memberdb`
    /// - `in_memory`: false
    /// - `sync_writes`: true
    fn default() -> Self {
        Self {
            dir: DEFAULT_DIR.to_string(),
            in_memory: false,
            sync_writes: true,
        }
    }
}

impl Config {
    pub fn new(dir: &str, in_memory: bool, sync_writes: bool) -> Self {
        Self {
            dir: dir.to_string(),
            in_memory,
            sync_writes,
        }
    }

    /// Creates a new Config instance with default values except for the directory.
    pub fn from_dir(dir: &str) -> Self {
        Config {
            dir: dir.to_string(),
            ..Config::default()
        }
    }

    /// A registry that keeps nothing on disk.
    pub fn in_memory() -> Self {
        Config {
            in_memory: true,
            ..Config::default()
        }
    }

    pub fn set_sync_writes(&mut self, sync_writes: bool) {
        self.sync_writes = sync_writes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_agree() {
        assert_eq!(Config::new(DEFAULT_DIR, false, true), Config::default());
        assert_eq!(Config::new("/data", false, true), Config::from_dir("/data"));
        assert_eq!(Config::new(DEFAULT_DIR, true, true), Config::in_memory());
    }

    #[test]
    fn test_set_sync_writes() {
        let mut config = Config::from_dir("/data");
        config.set_sync_writes(false);
        assert_eq!(config, Config::new("/data", false, false));
    }
}
