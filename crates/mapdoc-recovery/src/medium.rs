//! Storage media: the string-keyed persistence surface the recovery store
//! writes through.
//!
//! The store treats the medium as synchronous and narrow: get, set, delete,
//! enumerate. Set is the only operation that can fail (capacity); a corrupt
//! *value* is the store's problem, not the medium's.

use std::fs;
use std::path::PathBuf;

use hashbrown::HashMap;
use tracing::warn;

use mapdoc_error::{MapdocError, Result};

/// A string-keyed get/set/delete/enumerate persistence surface.
pub trait StorageMedium {
    /// Read the value under `key`, if present.
    fn get(&self, key: &str) -> Option<String>;

    /// Write `value` under `key`, overwriting. May fail with
    /// [`MapdocError::StorageQuota`].
    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Remove `key` if present.
    fn delete(&mut self, key: &str);

    /// All current keys, in no particular order.
    fn keys(&self) -> Vec<String>;
}

// ---------------------------------------------------------------------------
// MemoryMedium
// ---------------------------------------------------------------------------

/// In-memory medium, with an optional byte quota over stored values.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    entries: HashMap<String, String>,
    quota_bytes: Option<usize>,
}

impl MemoryMedium {
    /// An unbounded in-memory medium.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A medium that refuses writes once stored values would exceed
    /// `quota_bytes` in total.
    #[must_use]
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self { entries: HashMap::new(), quota_bytes: Some(quota_bytes) }
    }

    fn used_bytes_excluding(&self, key: &str) -> usize {
        self.entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(_, v)| v.len())
            .sum()
    }
}

impl StorageMedium for MemoryMedium {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if let Some(quota) = self.quota_bytes {
            if self.used_bytes_excluding(key) + value.len() > quota {
                return Err(MapdocError::StorageQuota { key: key.to_owned() });
            }
        }
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn delete(&mut self, key: &str) {
        self.entries.remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// DirMedium
// ---------------------------------------------------------------------------

/// One-file-per-key medium under a directory.
///
/// Key characters outside `[A-Za-z0-9._-]` are percent-escaped so any
/// document id yields a valid file name.
#[derive(Debug)]
pub struct DirMedium {
    dir: PathBuf,
}

impl DirMedium {
    /// Open (creating if needed) a medium rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(escape_key(key))
    }
}

fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for b in key.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => {
                out.push(b as char);
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

fn unescape_key(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = name.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

impl StorageMedium for DirMedium {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        fs::write(self.path_for(key), value).map_err(|err| {
            // Treat any write refusal as a capacity-class fault; the caller
            // reacts the same way regardless of the OS-level cause.
            warn!(key, %err, "recovery medium write failed");
            MapdocError::StorageQuota { key: key.to_owned() }
        })
    }

    fn delete(&mut self, key: &str) {
        let _ = fs::remove_file(self.path_for(key));
    }

    fn keys(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        entries
            .filter_map(std::result::Result::ok)
            .filter_map(|e| e.file_name().into_string().ok())
            .filter_map(|name| unescape_key(&name))
            .collect()
    }
}
