//! Snapshot Store
//!
//! Manages the snapshot files in the storage directory.
//!
//! ## Responsibilities
//! - Discover `*.db` files on startup and decode them
//! - Write snapshots atomically
//! - Delete snapshots of dropped databases

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{FuqlError, Result};
use crate::model::{is_storable_name, Database};

use super::snapshot::{decode, encode, Decoded};

/// File extension of snapshot files
pub const SNAPSHOT_EXTENSION: &str = "db";

/// Reads and writes `{dir}/{name}.db`
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Open or create the storage directory
    pub fn open(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)?;
        if !path.is_dir() {
            return Err(FuqlError::Persistence(format!(
                "{} is not a directory",
                path.display()
            )));
        }
        Ok(Self {
            dir: path.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load every snapshot in the directory, ordered by name
    ///
    /// A damaged snapshot is kept in its partially decoded form and the
    /// problem is logged; only I/O failures abort loading.
    pub fn load_all(&self) -> Result<Vec<Database>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if let Some(name) = Self::parse_database_name(&path) {
                names.push(name);
            }
        }
        names.sort();

        let mut databases = Vec::with_capacity(names.len());
        for name in names {
            let decoded = self.load(&name)?;
            if let Some(err) = &decoded.error {
                tracing::warn!("Snapshot '{}' is damaged ({}), keeping partial content", name, err);
            }
            tracing::info!(
                "Loaded database '{}' ({} tables)",
                name,
                decoded.database.tables().len()
            );
            databases.push(decoded.database);
        }
        Ok(databases)
    }

    /// Load one snapshot by database name
    pub fn load(&self, name: &str) -> Result<Decoded> {
        let path = self.snapshot_path(name)?;
        let text = fs::read_to_string(&path)?;
        Ok(decode(name, &text))
    }

    /// Write a snapshot, replacing the previous one atomically
    pub fn save(&self, database: &Database) -> Result<()> {
        let path = self.snapshot_path(&database.name)?;
        let tmp_path = path.with_extension(format!("{}.tmp", SNAPSHOT_EXTENSION));

        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(encode(database).as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    /// Delete a snapshot if it exists
    pub fn remove(&self, name: &str) -> Result<()> {
        let path = self.snapshot_path(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Path of the snapshot for `name`, refusing names that escape the directory
    pub fn snapshot_path(&self, name: &str) -> Result<PathBuf> {
        if !is_storable_name(name) {
            return Err(FuqlError::Persistence(format!(
                "database name '{}' cannot be used as a file name",
                name
            )));
        }
        Ok(self.dir.join(format!("{}.{}", name, SNAPSHOT_EXTENSION)))
    }

    /// "main.db" → Some("main")
    fn parse_database_name(path: &Path) -> Option<String> {
        if path.extension()? != SNAPSHOT_EXTENSION {
            return None;
        }
        Some(path.file_stem()?.to_string_lossy().into_owned())
    }
}
