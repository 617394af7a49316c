use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const OAK_DIR: &str = ".oak";
pub const CONFIG_FILE: &str = ".oak/config.yaml";
pub const STATE_FILE: &str = ".oak/state.yaml";
pub const IDE_ASSETS_DIR: &str = ".oak/ide";
pub const TEMPLATES_DIR: &str = ".oak/templates";
pub const LEGACY_FEATURES_DIR: &str = ".oak/features";

/// User-authored content (constitution, RFCs, issue plans). Never removed.
pub const USER_CONTENT_DIR: &str = "oak";
pub const CONSTITUTION_DIR: &str = "oak";
pub const CONSTITUTION_FILENAME: &str = "constitution.md";
pub const RFC_DIR: &str = "oak/rfc";

pub const VSCODE_SETTINGS_FILE: &str = ".vscode/settings.json";
pub const CURSOR_SETTINGS_FILE: &str = ".cursor/settings.json";

pub const GITIGNORE: &str = ".gitignore";
pub const SKILL_MANIFEST_FILE: &str = "SKILL.md";

/// Probe file used to check that the project root accepts writes.
pub const WRITE_PROBE_FILE: &str = ".oak_test_write";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn oak_dir(root: &Path) -> PathBuf {
    root.join(OAK_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn state_path(root: &Path) -> PathBuf {
    root.join(STATE_FILE)
}

pub fn ide_assets_dir(root: &Path) -> PathBuf {
    root.join(IDE_ASSETS_DIR)
}

pub fn user_content_dir(root: &Path) -> PathBuf {
    root.join(USER_CONTENT_DIR)
}

pub fn constitution_path(root: &Path, directory: &str) -> PathBuf {
    root.join(directory).join(CONSTITUTION_FILENAME)
}

/// Path of `path` relative to `root`, as a forward-slash string.
///
/// Paths outside `root` are returned as given.
pub fn relative_to(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.to_string_lossy().replace('\\', "/")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
