//! Scratch backing-store directories.
//!
//! A `MapSheet` exclusively owns its backing-store directory, so every persistence-touching test needs its own throwaway one.
//! This wraps `tempfile::TempDir` rather than handing back a bare
//! `PathBuf` so the directory is still removed on drop even if a test
//! panics mid-assertion.

use std::path::Path;

use tempfile::TempDir;

/// A scratch directory for a single `MapSheet`'s backing store, deleted
/// when it drops.
pub struct ScratchStore {
    dir: TempDir,
}

impl ScratchStore {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create scratch backing-store directory"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

impl Default for ScratchStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Two independent scratch directories, for tests that copy or compare
/// a sheet against a second location (e.g. `save_as` round-trips).
pub fn scratch_pair() -> (ScratchStore, ScratchStore) {
    (ScratchStore::new(), ScratchStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_store_path_exists_until_dropped() {
        let store = ScratchStore::new();
        let path = store.path().to_path_buf();
        assert!(path.exists());
        drop(store);
        assert!(!path.exists());
    }
}
