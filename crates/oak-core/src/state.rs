//! Install ledger stored in `.oak/state.yaml`.
//!
//! Tracks which migrations have run and which files and directories oak
//! created or modified, so that `oak remove` only deletes what oak owns and
//! only while the user has not changed it.

use crate::error::Result;
use crate::{io, paths};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// A file oak created from scratch, with the hash of what it wrote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedFile {
    pub path: String,
    pub hash: String,
    pub created_at: String,
}

/// A pre-existing file oak appended to. Never removed automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifiedFile {
    pub path: String,
    #[serde(default = "default_modification_type")]
    pub modification_type: String,
    #[serde(default = "default_marker")]
    pub marker: String,
}

fn default_modification_type() -> String {
    "appended".to_string()
}

fn default_marker() -> String {
    "## Project Constitution".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManagedAssets {
    #[serde(default)]
    pub directories: Vec<String>,
    #[serde(default)]
    pub created_files: Vec<CreatedFile>,
    #[serde(default)]
    pub modified_files: Vec<ModifiedFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OakState {
    #[serde(default)]
    pub migrations: Vec<String>,
    #[serde(default)]
    pub managed_assets: ManagedAssets,
}

impl OakState {
    /// Load the state file. A missing or empty file yields an empty state.
    pub fn load(root: &Path) -> Result<Self> {
        let Some(data) = io::read_optional(&paths::state_path(root))? else {
            return Ok(Self::default());
        };
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&data)?)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        io::atomic_write(&paths::state_path(root), data.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Read-modify-write access to [`OakState`].
///
/// Every call reloads the file so that callers never act on a stale copy,
/// and every mutation is written back before returning.
#[derive(Debug, Clone)]
pub struct StateLedger {
    root: PathBuf,
}

impl StateLedger {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn load_state(&self) -> Result<OakState> {
        OakState::load(&self.root)
    }

    pub fn save_state(&self, state: &OakState) -> Result<()> {
        state.save(&self.root)
    }

    fn relative(&self, path: &Path) -> String {
        paths::relative_to(&self.root, path)
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    // -----------------------------------------------------------------------
    // Created / modified files
    // -----------------------------------------------------------------------

    /// Record a file oak just wrote. The first record for a path wins; later
    /// calls are no-ops so the original hash stays the drift baseline.
    pub fn record_created_file(&self, path: &Path, content: &str) -> Result<()> {
        let rel = self.relative(path);
        let mut state = self.load_state()?;
        if state
            .managed_assets
            .created_files
            .iter()
            .any(|f| f.path == rel)
        {
            return Ok(());
        }
        state.managed_assets.created_files.push(CreatedFile {
            path: rel,
            hash: io::content_hash(content.as_bytes()),
            created_at: Utc::now().to_rfc3339(),
        });
        self.save_state(&state)
    }

    /// Re-baseline a file oak deliberately rewrote during an upgrade. Adds
    /// the record when the path is not tracked yet.
    pub fn refresh_created_file(&self, path: &Path, content: &str) -> Result<()> {
        let rel = self.relative(path);
        let hash = io::content_hash(content.as_bytes());
        let mut state = self.load_state()?;
        let files = &mut state.managed_assets.created_files;
        match files.iter().position(|f| f.path == rel) {
            Some(i) if files[i].hash == hash => return Ok(()),
            Some(i) => files[i].hash = hash,
            None => files.push(CreatedFile {
                path: rel,
                hash,
                created_at: Utc::now().to_rfc3339(),
            }),
        }
        self.save_state(&state)
    }

    /// Drop ledger entries for files oak deleted itself.
    pub fn forget_created_files(&self, paths_to_forget: &[PathBuf]) -> Result<()> {
        if paths_to_forget.is_empty() {
            return Ok(());
        }
        let rels: Vec<String> = paths_to_forget.iter().map(|p| self.relative(p)).collect();
        let mut state = self.load_state()?;
        let before = state.managed_assets.created_files.len();
        state
            .managed_assets
            .created_files
            .retain(|f| !rels.contains(&f.path));
        if state.managed_assets.created_files.len() != before {
            self.save_state(&state)?;
        }
        Ok(())
    }

    /// True only when the file exists, is recorded, and still hashes to the
    /// recorded value.
    pub fn is_file_unchanged(&self, path: &Path) -> Result<bool> {
        let rel = self.relative(path);
        let state = self.load_state()?;
        let Some(recorded) = state
            .managed_assets
            .created_files
            .iter()
            .find(|f| f.path == rel)
        else {
            return Ok(false);
        };
        let abs = self.absolute(path);
        let current = match std::fs::read(&abs) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        Ok(io::content_hash(&current) == recorded.hash)
    }

    pub fn record_modified_file(
        &self,
        path: &Path,
        modification_type: &str,
        marker: &str,
    ) -> Result<()> {
        let rel = self.relative(path);
        let mut state = self.load_state()?;
        if state
            .managed_assets
            .modified_files
            .iter()
            .any(|f| f.path == rel)
        {
            return Ok(());
        }
        state.managed_assets.modified_files.push(ModifiedFile {
            path: rel,
            modification_type: modification_type.to_string(),
            marker: marker.to_string(),
        });
        self.save_state(&state)
    }

    pub fn record_created_directory(&self, path: &Path) -> Result<()> {
        let rel = self.relative(path);
        let mut state = self.load_state()?;
        if state.managed_assets.directories.contains(&rel) {
            return Ok(());
        }
        state.managed_assets.directories.push(rel);
        self.save_state(&state)
    }

    pub fn get_managed_assets(&self) -> Result<ManagedAssets> {
        Ok(self.load_state()?.managed_assets)
    }

    // -----------------------------------------------------------------------
    // Migrations
    // -----------------------------------------------------------------------

    pub fn get_applied_migrations(&self) -> Result<Vec<String>> {
        Ok(self.load_state()?.migrations)
    }

    /// Merge `ids` into the applied set. Stored deduplicated and sorted.
    pub fn add_applied_migrations(&self, ids: &[String]) -> Result<()> {
        let mut state = self.load_state()?;
        state.migrations.extend(ids.iter().cloned());
        state.migrations.sort();
        state.migrations.dedup();
        self.save_state(&state)
    }

    pub fn is_migration_applied(&self, id: &str) -> Result<bool> {
        Ok(self.get_applied_migrations()?.iter().any(|m| m == id))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
