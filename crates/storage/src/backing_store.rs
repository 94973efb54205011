//! Directory-backed persistence for a MapSheet.
//!
//! This crate owns only bytes and file layout; it has no knowledge of
//! what a tile or header *means* — `mapsheet-core` encodes its
//! `NodeEstimator` arrays and header fields into byte buffers and hands
//! them here. That keeps the dependency edge one-directional
//! (`mapsheet-core` depends on `storage`, never the reverse) while
//! still letting `storage` own the one place atomic-write and
//! partial-file-detection logic lives.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use mapsheet_common::error::{MapSheetError, Result};

/// What the PersistenceLayer's directory contract requires: a header, a parameters block,
/// one file per tile, and three optional auxiliary rasters.
pub trait BackingStore {
    fn read_header(&self) -> Result<Option<Vec<u8>>>;
    fn write_header(&self, bytes: &[u8]) -> Result<()>;

    fn read_params(&self) -> Result<Option<Vec<u8>>>;
    fn write_params(&self, bytes: &[u8]) -> Result<()>;

    fn read_tile(&self, tc: u32, tr: u32) -> Result<Option<Vec<u8>>>;
    fn write_tile(&self, tc: u32, tr: u32, bytes: &[u8]) -> Result<()>;

    fn read_nominations(&self) -> Result<Option<Vec<u8>>>;
    fn write_nominations(&self, bytes: &[u8]) -> Result<()>;

    fn read_hits(&self) -> Result<Option<Vec<u8>>>;
    fn write_hits(&self, bytes: &[u8]) -> Result<()>;

    fn read_backscatter(&self) -> Result<Option<Vec<u8>>>;
    fn write_backscatter(&self, bytes: &[u8]) -> Result<()>;
}

/// A MapSheet backing store rooted at a directory on the local
/// filesystem.
#[derive(Debug, Clone)]
pub struct DirectoryBackingStore {
    root: PathBuf,
}

impl DirectoryBackingStore {
    /// Open (creating if absent) a backing-store directory, including
    /// its `tiles/` subdirectory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("tiles"))?;
        let store = Self { root };
        store.discard_stray_tmp_files()?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn tile_path(&self, tc: u32, tr: u32) -> PathBuf {
        self.root.join("tiles").join(format!("{tc}_{tr}.tile"))
    }

    /// Copy the entire backing store (header, params, every tile, and
    /// the optional auxiliary files) to a fresh directory and mount it.
    /// Used by `save_v2` when the caller's target isn't already this
    /// store's root.
    pub fn copy_entire_to(&self, target: impl Into<PathBuf>) -> Result<DirectoryBackingStore> {
        let target = target.into();
        if target == self.root {
            return Ok(self.clone());
        }
        copy_dir_recursive(&self.root, &target)?;
        DirectoryBackingStore::open(target)
    }

    /// A crash mid-write always leaves either the previous generation
    /// of a file or nothing at its canonical name; any
    /// `.tmp` sibling left over from an interrupted write is simply
    /// orphaned data and is safe to discard on next open.
    fn discard_stray_tmp_files(&self) -> Result<()> {
        for dir in [self.root.clone(), self.root.join("tiles")] {
            if !dir.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("tmp") {
                    let _ = fs::remove_file(&path);
                }
            }
        }
        Ok(())
    }

    fn atomic_write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp = sibling_tmp(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn read_optional(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MapSheetError::from(e)),
        }
    }
}

fn sibling_tmp(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn copy_dir_recursive(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let path = entry.path();
        let dest = to.join(entry.file_name());
        if path.is_dir() {
            copy_dir_recursive(&path, &dest)?;
        } else if path.extension().and_then(|e| e.to_str()) != Some("tmp") {
            fs::copy(&path, &dest)?;
        }
    }
    Ok(())
}

impl BackingStore for DirectoryBackingStore {
    fn read_header(&self) -> Result<Option<Vec<u8>>> {
        self.read_optional(&self.root.join("header"))
    }

    fn write_header(&self, bytes: &[u8]) -> Result<()> {
        self.atomic_write(&self.root.join("header"), bytes)
    }

    fn read_params(&self) -> Result<Option<Vec<u8>>> {
        self.read_optional(&self.root.join("params"))
    }

    fn write_params(&self, bytes: &[u8]) -> Result<()> {
        self.atomic_write(&self.root.join("params"), bytes)
    }

    fn read_tile(&self, tc: u32, tr: u32) -> Result<Option<Vec<u8>>> {
        self.read_optional(&self.tile_path(tc, tr))
    }

    fn write_tile(&self, tc: u32, tr: u32, bytes: &[u8]) -> Result<()> {
        self.atomic_write(&self.tile_path(tc, tr), bytes)
    }

    fn read_nominations(&self) -> Result<Option<Vec<u8>>> {
        self.read_optional(&self.root.join("nominations"))
    }

    fn write_nominations(&self, bytes: &[u8]) -> Result<()> {
        self.atomic_write(&self.root.join("nominations"), bytes)
    }

    fn read_hits(&self) -> Result<Option<Vec<u8>>> {
        self.read_optional(&self.root.join("hits"))
    }

    fn write_hits(&self, bytes: &[u8]) -> Result<()> {
        self.atomic_write(&self.root.join("hits"), bytes)
    }

    fn read_backscatter(&self) -> Result<Option<Vec<u8>>> {
        self.read_optional(&self.root.join("backscatter"))
    }

    fn write_backscatter(&self, bytes: &[u8]) -> Result<()> {
        self.atomic_write(&self.root.join("backscatter"), bytes)
    }
}
