//! One-shot project migrations.
//!
//! Each migration is identified by a date-prefixed id and runs at most once
//! per project. Applied ids live in the state ledger; this module only knows
//! how to run the pending ones.

use crate::config::OakConfig;
use crate::error::Result;
use crate::{io, paths};
use std::collections::BTreeSet;
use std::path::Path;

pub struct Migration {
    pub id: &'static str,
    pub description: &'static str,
    pub run: fn(&Path) -> Result<()>,
}

/// All migrations in declaration order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        id: "2024.11.13_gitignore_issue_context",
        description: "Add issue context files to .gitignore",
        run: gitignore_issue_context,
    },
    Migration {
        id: "2024.11.18_copilot_agents_folder",
        description: "Move Copilot commands from .github/prompts to .github/agents",
        run: copilot_agents_folder,
    },
    Migration {
        id: "2025.11.28_features_restructure",
        description: "Record enabled features in config.yaml",
        run: features_restructure,
    },
    Migration {
        id: "2025.11.28_cleanup_old_templates",
        description: "Remove template copies from .oak/templates",
        run: cleanup_old_templates,
    },
    Migration {
        id: "2025.12.05_unify_plan_create",
        description: "Remove the retired plan-issue command",
        run: unify_plan_create,
    },
    Migration {
        id: "2026.01.05_remove_oak_features_dir",
        description: "Remove the unused .oak/features directory",
        run: remove_oak_features_dir,
    },
];

pub const ISSUE_CONTEXT_IGNORE: &str = "oak/issue/**/context.json";

const LEGACY_TEMPLATE_SUBDIRS: &[&str] = &["constitution", "rfc", "commands", "ide"];

/// Ids of every known migration, in order.
pub fn all_migration_ids() -> Vec<String> {
    MIGRATIONS.iter().map(|m| m.id.to_string()).collect()
}

/// Migrations whose id is not in `completed`, in declaration order.
pub fn pending_migrations(completed: &[String]) -> Vec<&'static Migration> {
    let done: BTreeSet<&str> = completed.iter().map(String::as_str).collect();
    MIGRATIONS.iter().filter(|m| !done.contains(m.id)).collect()
}

/// Run every pending migration. A failing migration does not stop the ones
/// after it.
///
/// Returns `(succeeded ids, (failed id, error message))`.
pub fn run_migrations(
    root: &Path,
    completed: &[String],
) -> (Vec<String>, Vec<(String, String)>) {
    let mut succeeded = Vec::new();
    let mut failed = Vec::new();
    for migration in pending_migrations(completed) {
        match (migration.run)(root) {
            Ok(()) => {
                tracing::debug!(id = migration.id, "migration applied");
                succeeded.push(migration.id.to_string());
            }
            Err(e) => {
                tracing::warn!(id = migration.id, error = %e, "migration failed");
                failed.push((migration.id.to_string(), e.to_string()));
            }
        }
    }
    (succeeded, failed)
}

// ---------------------------------------------------------------------------
// Individual migrations
// ---------------------------------------------------------------------------

fn gitignore_issue_context(root: &Path) -> Result<()> {
    io::ensure_gitignore_entry(root, ISSUE_CONTEXT_IGNORE)?;
    Ok(())
}

fn copilot_agents_folder(root: &Path) -> Result<()> {
    let prompts = root.join(".github/prompts");
    if !prompts.is_dir() {
        return Ok(());
    }
    for entry in std::fs::read_dir(&prompts)? {
        let path = entry?.path();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if name.starts_with("oak.") && name.ends_with(".prompt.md") {
            io::remove_file_if_exists(&path)?;
        }
    }
    io::remove_dir_if_empty(&prompts)?;
    Ok(())
}

fn features_restructure(root: &Path) -> Result<()> {
    if !paths::config_path(root).exists() {
        return Ok(());
    }
    let mut config = OakConfig::load(root)?;
    if config.features.enabled.is_empty() {
        config.features.enabled = ["constitution", "rfc", "issues"]
            .iter()
            .map(|f| f.to_string())
            .collect();
    } else if !config.features.enabled.iter().any(|f| f == "constitution")
        && config
            .features
            .enabled
            .iter()
            .any(|f| f == "rfc" || f == "issues")
    {
        config.features.enabled.insert(0, "constitution".to_string());
    }
    config.save(root)?;
    cleanup_old_templates(root)
}

fn cleanup_old_templates(root: &Path) -> Result<()> {
    let templates = root.join(paths::TEMPLATES_DIR);
    for sub in LEGACY_TEMPLATE_SUBDIRS {
        let dir = templates.join(sub);
        if dir.is_dir() {
            std::fs::remove_dir_all(&dir)?;
        }
    }
    io::remove_dir_if_empty(&templates)?;
    Ok(())
}

fn unify_plan_create(root: &Path) -> Result<()> {
    for retired in [
        ".claude/commands/oak.plan-issue.md",
        ".github/agents/oak.plan-issue.agent.md",
        ".github/agents/oak.plan-issue.md",
    ] {
        io::remove_file_if_exists(&root.join(retired))?;
    }
    Ok(())
}

fn remove_oak_features_dir(root: &Path) -> Result<()> {
    let dir = root.join(paths::LEGACY_FEATURES_DIR);
    if dir.is_dir() {
        std::fs::remove_dir_all(&dir)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn ids_are_unique_and_date_ordered() {
        let ids = all_migration_ids();
        let unique: BTreeSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
        let dates: Vec<&str> = ids.iter().map(|id| &id[..10]).collect();
        assert!(dates.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn completed_migrations_are_not_rerun() {
        let dir = TempDir::new().unwrap();
        let completed = all_migration_ids();
        let (ok, failed) = run_migrations(dir.path(), &completed);
        assert!(ok.is_empty());
        assert!(failed.is_empty());
        assert!(!dir.path().join(".gitignore").exists());
    }

    #[test]
    fn pending_migrations_run_in_order() {
        let dir = TempDir::new().unwrap();
        let completed = vec!["2024.11.18_copilot_agents_folder".to_string()];
        let (ok, failed) = run_migrations(dir.path(), &completed);
        assert!(failed.is_empty());
        assert_eq!(ok.len(), MIGRATIONS.len() - 1);
        assert_eq!(ok[0], "2024.11.13_gitignore_issue_context");
        let gitignore = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert!(gitignore.contains(ISSUE_CONTEXT_IGNORE));
    }

    #[test]
    fn copilot_prompts_are_removed() {
        let dir = TempDir::new().unwrap();
        let prompts = dir.path().join(".github/prompts");
        std::fs::create_dir_all(&prompts).unwrap();
        std::fs::write(prompts.join("oak.rfc-create.prompt.md"), "x").unwrap();
        copilot_agents_folder(dir.path()).unwrap();
        assert!(!prompts.exists());
    }

    #[test]
    fn copilot_migration_keeps_user_prompts() {
        let dir = TempDir::new().unwrap();
        let prompts = dir.path().join(".github/prompts");
        std::fs::create_dir_all(&prompts).unwrap();
        std::fs::write(prompts.join("mine.prompt.md"), "x").unwrap();
        copilot_agents_folder(dir.path()).unwrap();
        assert!(prompts.join("mine.prompt.md").exists());
    }

    #[test]
    fn features_restructure_adds_constitution() {
        let dir = TempDir::new().unwrap();
        let mut cfg = OakConfig::default();
        cfg.features.enabled = vec!["rfc".into()];
        cfg.save(dir.path()).unwrap();

        features_restructure(dir.path()).unwrap();

        let cfg = OakConfig::load(dir.path()).unwrap();
        assert_eq!(cfg.features.enabled, vec!["constitution", "rfc"]);
    }

    #[test]
    fn old_template_dirs_are_removed() {
        let dir = TempDir::new().unwrap();
        let rfc = dir.path().join(".oak/templates/rfc");
        std::fs::create_dir_all(&rfc).unwrap();
        std::fs::write(rfc.join("engineering.md"), "x").unwrap();
        cleanup_old_templates(dir.path()).unwrap();
        assert!(!dir.path().join(".oak/templates").exists());
    }
}
