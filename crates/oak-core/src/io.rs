use crate::error::Result;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` using a tempfile in the same directory.
/// Prevents partial writes from corrupting state files.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Create a directory and all parents, idempotent.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

/// Write a file only if it does not already exist. Returns true if written.
pub fn write_if_missing(path: &Path, data: &[u8]) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    atomic_write(path, data)?;
    Ok(true)
}

/// Read a file, returning `None` when it does not exist.
pub fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Append text to a file, creating it if it doesn't exist.
pub fn append_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut f = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    f.write_all(text.as_bytes())?;
    Ok(())
}

/// Remove a file if present. Returns true if something was removed.
pub fn remove_file_if_exists(path: &Path) -> Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Remove `dir` only when it exists and is empty. Returns true if removed.
pub fn remove_dir_if_empty(dir: &Path) -> Result<bool> {
    if !dir.is_dir() {
        return Ok(false);
    }
    if std::fs::read_dir(dir)?.next().is_some() {
        return Ok(false);
    }
    std::fs::remove_dir(dir)?;
    Ok(true)
}

/// Walk upward from `dir`, removing empty directories until `stop_at`
/// (exclusive) or the first non-empty directory.
pub fn prune_empty_dirs(dir: &Path, stop_at: &Path) -> Result<()> {
    let mut current = dir.to_path_buf();
    while current.starts_with(stop_at) && current != stop_at {
        if !remove_dir_if_empty(&current)? {
            break;
        }
        match current.parent() {
            Some(p) => current = p.to_path_buf(),
            None => break,
        }
    }
    Ok(())
}

/// SHA-256 of `data` as lowercase hex.
pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Add `entry` to `root/.gitignore` if it isn't already present.
///
/// Checks for an exact line match. Appends with a leading newline separator
/// if the file doesn't already end with one. Returns true if the file changed.
pub fn ensure_gitignore_entry(root: &Path, entry: &str) -> Result<bool> {
    let gitignore = root.join(crate::paths::GITIGNORE);
    let existing = read_optional(&gitignore)?.unwrap_or_default();
    if existing.lines().any(|l| l.trim() == entry) {
        return Ok(false);
    }
    let sep = if existing.is_empty() || existing.ends_with('\n') {
        ""
    } else {
        "\n"
    };
    append_text(&gitignore, &format!("{sep}{entry}\n"))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c/state.yaml");
        atomic_write(&path, b"migrations: []").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "migrations: []");
    }

    #[test]
    fn ensure_gitignore_entry_idempotent() {
        let dir = TempDir::new().unwrap();
        assert!(ensure_gitignore_entry(dir.path(), ".oak/state.yaml").unwrap());
        assert!(!ensure_gitignore_entry(dir.path(), ".oak/state.yaml").unwrap());
        let content = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(
            content.lines().filter(|l| *l == ".oak/state.yaml").count(),
            1
        );
    }

    #[test]
    fn ensure_gitignore_entry_appends_to_existing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "target").unwrap();
        ensure_gitignore_entry(dir.path(), "oak/issue/**/context.json").unwrap();
        let content = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(content, "target\noak/issue/**/context.json\n");
    }

    #[test]
    fn write_if_missing_skips_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("existing.txt");
        std::fs::write(&path, b"original").unwrap();
        assert!(!write_if_missing(&path, b"new").unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "original");
    }

    #[test]
    fn prune_stops_at_non_empty_parent() {
        let dir = TempDir::new().unwrap();
        let deep = dir.path().join(".claude/commands/nested");
        std::fs::create_dir_all(&deep).unwrap();
        std::fs::write(dir.path().join(".claude/CLAUDE.md"), "keep").unwrap();

        prune_empty_dirs(&deep, dir.path()).unwrap();

        assert!(!dir.path().join(".claude/commands").exists());
        assert!(dir.path().join(".claude").exists());
    }

    #[test]
    fn hash_is_stable_hex() {
        let h = content_hash(b"hello");
        assert_eq!(h.len(), 64);
        assert_eq!(h, content_hash(b"hello"));
        assert_ne!(h, content_hash(b"hello!"));
    }

    #[test]
    fn remove_file_if_exists_reports_absence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.md");
        assert!(!remove_file_if_exists(&path).unwrap());
        std::fs::write(&path, "x").unwrap();
        assert!(remove_file_if_exists(&path).unwrap());
    }
}
