use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Short, stable digest of the settings an entry was built from.
///
/// FNV-1a over the parts, each terminated by a zero byte so that
/// `["ab", "c"]` and `["a", "bc"]` differ.
pub fn fingerprint(parts: &[&str]) -> String {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;

    let hash = parts
        .iter()
        .flat_map(|part| part.bytes().chain(std::iter::once(0)))
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME));
    format!("{:08x}", hash >> 32)
}

/// Intermediate results stored as JSON files under one directory.
///
/// Entries are only read or written when the cache is enabled, so reuse is
/// an explicit run policy rather than a side effect of files lying around.
pub struct JsonCache {
    dir: PathBuf,
    enabled: bool,
}

impl JsonCache {
    pub fn new(dir: &Path, enabled: bool) -> Self {
        Self {
            dir: dir.to_path_buf(),
            enabled,
        }
    }

    pub fn entry_path(&self, prefix: &str, key: &str) -> PathBuf {
        self.dir.join(format!("{}_{}.json", prefix, key))
    }

    /// Cached value, or `None` when disabled, absent or unreadable
    pub fn load<T: DeserializeOwned>(&self, prefix: &str, key: &str) -> Option<T> {
        if !self.enabled {
            return None;
        }
        let path = self.entry_path(prefix, key);
        let file = File::open(&path).ok()?;

        match serde_json::from_reader(BufReader::new(file)) {
            Ok(value) => {
                debug!(path = %path.display(), "cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable cache entry");
                None
            }
        }
    }

    pub fn store<T: Serialize>(&self, prefix: &str, key: &str, value: &T) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        std::fs::create_dir_all(&self.dir)?;
        let path = self.entry_path(prefix, key);
        serde_json::to_writer(BufWriter::new(File::create(&path)?), value)?;
        debug!(path = %path.display(), "cache entry stored");
        Ok(())
    }
}
