//! Stages of `oak remove`.
//!
//! Only what the ledger says oak owns is touched. Files the user edited
//! after oak wrote them stay, files oak appended to are reported instead of
//! deleted, and the `oak/` content directory is never removed.

use super::hook_summary;
use crate::error::Result;
use crate::pipeline::context::{
    FlowType, ModifiedFileNotice, PipelineContext, RemovalPlan, StageData,
};
use crate::pipeline::ordering;
use crate::pipeline::stage::{Stage, StageLifecycle, StageOutcome};
use crate::services::agent::AGENTS;
use crate::services::ide::IDES;
use crate::{io, paths};
use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::path::PathBuf;

pub fn stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(ValidateRemoval),
        Box::new(PlanRemoval),
        Box::new(TriggerPreRemoveHooks),
        Box::new(RemoveSkills),
        Box::new(RemoveCreatedFiles),
        Box::new(RemoveIdeSettingsRemoval),
        Box::new(CleanupDirectories),
        Box::new(RemoveOakDir),
    ]
}

const REMOVE_FLOW: &[FlowType] = &[FlowType::Remove];

pub struct ValidateRemoval;

impl Stage for ValidateRemoval {
    fn name(&self) -> &str {
        "validate_removal"
    }

    fn display_name(&self) -> &str {
        "Validating environment"
    }

    fn order(&self) -> u32 {
        ordering::VALIDATE_REMOVAL
    }

    fn applicable_flows(&self) -> &[FlowType] {
        REMOVE_FLOW
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        if !ctx.oak_dir().is_dir() {
            return Ok(StageOutcome::failed(
                "open-agent-kit is not initialized in this project",
                "Nothing to remove",
            ));
        }
        Ok(StageOutcome::success("Environment validated"))
    }
}

/// Sorts everything in the ledger into delete, keep, or report.
pub struct PlanRemoval;

impl Stage for PlanRemoval {
    fn name(&self) -> &str {
        "plan_removal"
    }

    fn display_name(&self) -> &str {
        "Planning removal"
    }

    fn order(&self) -> u32 {
        ordering::PLAN_REMOVAL
    }

    fn applicable_flows(&self) -> &[FlowType] {
        REMOVE_FLOW
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let root = ctx.project_root().to_path_buf();
        let options = ctx.removal_options();
        let ledger = &ctx.services.ledger;
        let assets = ledger.get_managed_assets()?;

        let ide_files: Vec<&str> = IDES.iter().map(|(_, rel)| *rel).collect();
        let mut plan = RemovalPlan {
            keep_ide_settings: options.keep_ide_settings,
            ..RemovalPlan::default()
        };

        for file in &assets.created_files {
            let path = root.join(&file.path);
            if !path.exists() {
                continue;
            }
            if options.keep_ide_settings && ide_files.contains(&file.path.as_str()) {
                continue;
            }
            if ledger.is_file_unchanged(&path)? {
                plan.files_to_remove.push(file.path.clone());
            } else {
                plan.files_modified_by_user.push(file.path.clone());
            }
        }

        plan.files_to_inform_user = assets
            .modified_files
            .iter()
            .filter(|m| root.join(&m.path).exists())
            .map(|m| ModifiedFileNotice {
                path: m.path.clone(),
                marker: m.marker.clone(),
            })
            .collect();

        plan.directories_to_check = assets
            .directories
            .iter()
            .filter(|d| root.join(d).is_dir())
            .cloned()
            .collect();

        if !options.keep_ide_settings {
            plan.ide_settings_to_remove = ide_files
                .iter()
                .filter(|rel| root.join(rel).exists())
                .map(|rel| rel.to_string())
                .collect();
        }

        let content = paths::user_content_dir(&root);
        plan.has_user_content = content.is_dir() && std::fs::read_dir(&content)?.next().is_some();

        plan.installed_skills = match ctx.services.skills.list_installed_skills() {
            Ok(skills) => skills,
            Err(e) => {
                tracing::debug!(error = %e, "no readable config, assuming no skills");
                Vec::new()
            }
        };

        Ok(StageOutcome::success_with(
            format!("Planned removal of {} file(s)", plan.files_to_remove.len()),
            StageData::RemovalPlan(Box::new(plan)),
        ))
    }
}

pub struct TriggerPreRemoveHooks;

impl Stage for TriggerPreRemoveHooks {
    fn name(&self) -> &str {
        "trigger_pre_remove_hooks"
    }

    fn display_name(&self) -> &str {
        "Running pre-remove hooks"
    }

    fn order(&self) -> u32 {
        ordering::TRIGGER_PRE_REMOVE_HOOKS
    }

    fn applicable_flows(&self) -> &[FlowType] {
        REMOVE_FLOW
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let reports = ctx.services.features.on_pre_remove()?;
        Ok(StageOutcome::success_with(
            hook_summary(&reports, "pre-remove hooks"),
            StageData::HookReports(reports),
        ))
    }
}

pub struct RemoveSkills;

impl Stage for RemoveSkills {
    fn name(&self) -> &str {
        "remove_skills"
    }

    fn display_name(&self) -> &str {
        "Removing skills"
    }

    fn order(&self) -> u32 {
        ordering::REMOVE_SKILLS
    }

    fn applicable_flows(&self) -> &[FlowType] {
        REMOVE_FLOW
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn lifecycle(&self) -> StageLifecycle {
        StageLifecycle::Cleanup
    }

    fn counterpart_stage(&self) -> Option<&str> {
        Some("install_skills")
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let skills = ctx
            .removal_plan()
            .map(|p| p.installed_skills.clone())
            .unwrap_or_default();
        if skills.is_empty() {
            return Ok(StageOutcome::skipped("No skills to remove"));
        }

        let mut removed = 0;
        for skill in &skills {
            match ctx.services.skills.remove_skill(skill) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => ctx.add_warning(self.name(), format!("{skill}: {e}")),
            }
        }
        Ok(StageOutcome::success_with(
            format!("Removed {removed} skill(s)"),
            StageData::SkillsCleaned(removed),
        ))
    }
}

/// Deletes unchanged oak-created files and prunes the folders they leave
/// empty.
pub struct RemoveCreatedFiles;

impl Stage for RemoveCreatedFiles {
    fn name(&self) -> &str {
        "remove_created_files"
    }

    fn display_name(&self) -> &str {
        "Removing created files"
    }

    fn order(&self) -> u32 {
        ordering::REMOVE_CREATED_FILES
    }

    fn applicable_flows(&self) -> &[FlowType] {
        REMOVE_FLOW
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn lifecycle(&self) -> StageLifecycle {
        StageLifecycle::Cleanup
    }

    fn counterpart_stage(&self) -> Option<&str> {
        Some("install_features")
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let files = ctx
            .removal_plan()
            .map(|p| p.files_to_remove.clone())
            .unwrap_or_default();
        if files.is_empty() {
            return Ok(StageOutcome::skipped("No files to remove"));
        }

        let root = ctx.project_root().to_path_buf();
        let mut removed = Vec::new();
        for rel in files {
            let path = root.join(&rel);
            match io::remove_file_if_exists(&path) {
                Ok(true) => {
                    if let Some(parent) = path.parent() {
                        io::prune_empty_dirs(parent, &root)?;
                    }
                    removed.push(rel);
                }
                Ok(false) => {}
                Err(e) => ctx.add_warning(self.name(), format!("{rel}: {e}")),
            }
        }
        Ok(StageOutcome::success_with(
            format!("Removed {} file(s)", removed.len()),
            StageData::FilesRemoved(removed),
        ))
    }
}

/// Strips oak's keys from IDE settings files that survived file removal
/// because the user had edited them.
pub struct RemoveIdeSettingsRemoval;

impl Stage for RemoveIdeSettingsRemoval {
    fn name(&self) -> &str {
        "remove_ide_settings_removal"
    }

    fn display_name(&self) -> &str {
        "Removing IDE settings"
    }

    fn order(&self) -> u32 {
        ordering::REMOVE_IDE_SETTINGS_REMOVAL
    }

    fn applicable_flows(&self) -> &[FlowType] {
        REMOVE_FLOW
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn lifecycle(&self) -> StageLifecycle {
        StageLifecycle::Cleanup
    }

    fn counterpart_stage(&self) -> Option<&str> {
        Some("install_ide_settings")
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let planned = ctx
            .removal_plan()
            .map(|p| p.ide_settings_to_remove.clone())
            .unwrap_or_default();
        if planned.is_empty() {
            return Ok(StageOutcome::skipped("No IDE settings to remove"));
        }

        let mut removed = Vec::new();
        for (ide, rel) in IDES.iter().filter(|(_, rel)| planned.iter().any(|p| p == rel)) {
            match ctx.services.ides.remove_settings(ide) {
                Ok(true) => removed.push(rel.to_string()),
                Ok(false) => {}
                Err(e) => ctx.add_warning(self.name(), format!("Failed to clean {rel}: {e}")),
            }
        }
        Ok(StageOutcome::success_with(
            format!("Removed {} IDE setting(s)", removed.len()),
            StageData::IdeSettingsRemoved(removed),
        ))
    }
}

/// Removes empty directories oak created, plus every known agent folder
/// that ended up empty. Deepest paths go first.
pub struct CleanupDirectories;

impl Stage for CleanupDirectories {
    fn name(&self) -> &str {
        "cleanup_directories"
    }

    fn display_name(&self) -> &str {
        "Cleaning up directories"
    }

    fn order(&self) -> u32 {
        ordering::CLEANUP_DIRECTORIES
    }

    fn applicable_flows(&self) -> &[FlowType] {
        REMOVE_FLOW
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let root = ctx.project_root().to_path_buf();
        let mut candidates: BTreeSet<PathBuf> = ctx
            .removal_plan()
            .map(|p| p.directories_to_check.iter().map(|d| root.join(d)).collect())
            .unwrap_or_default();
        for agent in AGENTS {
            let folder = root.join(agent.folder);
            candidates.insert(folder.join(agent.commands_subdir));
            if let Some(skills) = agent.skills_subdir {
                candidates.insert(folder.join(skills));
            }
            candidates.insert(folder);
        }
        let mut dirs: Vec<PathBuf> = candidates.into_iter().collect();
        dirs.sort_by_key(|d| Reverse(d.components().count()));

        let mut removed = Vec::new();
        for dir in dirs {
            match io::remove_dir_if_empty(&dir) {
                Ok(true) => removed.push(paths::relative_to(&root, &dir)),
                Ok(false) => {}
                Err(e) => tracing::debug!(dir = %dir.display(), error = %e, "left directory in place"),
            }
        }
        Ok(StageOutcome::success_with(
            format!("Cleaned up {} empty directory(ies)", removed.len()),
            StageData::DirectoriesRemoved(removed),
        ))
    }
}

pub struct RemoveOakDir;

impl Stage for RemoveOakDir {
    fn name(&self) -> &str {
        "remove_oak_dir"
    }

    fn display_name(&self) -> &str {
        "Removing oak configuration"
    }

    fn order(&self) -> u32 {
        ordering::REMOVE_OAK_DIR
    }

    fn applicable_flows(&self) -> &[FlowType] {
        REMOVE_FLOW
    }

    fn lifecycle(&self) -> StageLifecycle {
        StageLifecycle::Cleanup
    }

    fn counterpart_stage(&self) -> Option<&str> {
        Some("create_oak_dir")
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let oak_dir = ctx.oak_dir();
        if !oak_dir.exists() {
            return Ok(StageOutcome::success(format!(
                "{}/ already removed",
                paths::OAK_DIR
            )));
        }
        std::fs::remove_dir_all(&oak_dir)?;
        Ok(StageOutcome::success_with(
            format!("Removed {}/", paths::OAK_DIR),
            StageData::OakDirRemoved,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::builder::build_remove_pipeline;
    use crate::pipeline::context::RemovalOptions;
    use crate::pipeline::stages::test_support::run_init;
    use tempfile::TempDir;

    fn remove(dir: &TempDir, options: RemovalOptions) -> PipelineContext {
        let mut ctx = PipelineContext::new(dir.path(), FlowType::Remove);
        ctx.set_result("removal_options", StageData::RemovalOptions(options));
        let result = build_remove_pipeline().execute(&mut ctx);
        assert!(result.success, "{:?}", result.stages_failed);
        ctx
    }

    #[test]
    fn nothing_to_remove_without_oak_dir() {
        let dir = TempDir::new().unwrap();
        let mut ctx = PipelineContext::new(dir.path(), FlowType::Remove);
        let result = build_remove_pipeline().execute(&mut ctx);
        assert!(!result.success);
        assert_eq!(
            result.stages_failed,
            vec![("validate_removal".to_string(), "Nothing to remove".to_string())]
        );
    }

    #[test]
    fn init_then_remove_leaves_a_clean_tree() {
        let dir = TempDir::new().unwrap();
        let (_ctx, result) = run_init(
            dir.path(),
            FlowType::FreshInit,
            &["claude", "copilot", "codex"],
            &["vscode"],
            &["constitution", "rfc", "issues"],
        );
        assert!(result.success);
        assert!(dir.path().join(".codex/skills/planning-workflow/SKILL.md").exists());

        let ctx = remove(&dir, RemovalOptions::default());
        for gone in [".oak", ".claude", ".github", ".codex", ".vscode"] {
            assert!(!dir.path().join(gone).exists(), "{gone} should be gone");
        }
        let plan = ctx.removal_plan().unwrap();
        assert_eq!(
            plan.installed_skills,
            vec!["planning-workflow", "research-synthesis"]
        );
        assert!(plan.files_modified_by_user.is_empty());
    }

    #[test]
    fn user_edits_and_content_survive() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("oak")).unwrap();
        std::fs::write(dir.path().join("oak/constitution.md"), "# Rules\n").unwrap();
        std::fs::write(dir.path().join("AGENTS.md"), "# Existing notes\n").unwrap();
        let (_ctx, result) = run_init(
            dir.path(),
            FlowType::FreshInit,
            &["codex"],
            &[],
            &["constitution"],
        );
        assert!(result.success);
        let edited = dir.path().join(".codex/prompts/oak.constitution-amend.md");
        std::fs::write(&edited, "my own version").unwrap();

        let ctx = remove(&dir, RemovalOptions::default());
        let plan = ctx.removal_plan().unwrap();
        assert_eq!(
            plan.files_modified_by_user,
            vec![".codex/prompts/oak.constitution-amend.md"]
        );
        assert_eq!(plan.files_to_inform_user.len(), 1);
        assert_eq!(plan.files_to_inform_user[0].path, "AGENTS.md");
        assert!(plan.has_user_content);

        assert!(edited.exists());
        assert!(!dir
            .path()
            .join(".codex/prompts/oak.constitution-create.md")
            .exists());
        assert!(dir.path().join("AGENTS.md").exists());
        assert!(dir.path().join("oak/constitution.md").exists());
        assert!(!dir.path().join(".oak").exists());
    }

    #[test]
    fn keep_ide_settings_leaves_settings_file() {
        let dir = TempDir::new().unwrap();
        let (_ctx, result) = run_init(
            dir.path(),
            FlowType::FreshInit,
            &["claude"],
            &["vscode", "cursor"],
            &["rfc"],
        );
        assert!(result.success);

        let ctx = remove(
            &dir,
            RemovalOptions {
                keep_ide_settings: true,
            },
        );
        assert!(ctx.removal_plan().unwrap().ide_settings_to_remove.is_empty());
        assert!(dir.path().join(paths::VSCODE_SETTINGS_FILE).exists());
        assert!(dir.path().join(paths::CURSOR_SETTINGS_FILE).exists());
        assert!(!dir.path().join(".claude/commands").exists());
    }

    #[test]
    fn edited_ide_settings_lose_only_oak_keys() {
        let dir = TempDir::new().unwrap();
        let (_ctx, result) =
            run_init(dir.path(), FlowType::FreshInit, &["claude"], &["vscode"], &["rfc"]);
        assert!(result.success);
        let settings = dir.path().join(paths::VSCODE_SETTINGS_FILE);
        let mut value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&settings).unwrap()).unwrap();
        value["editor.tabSize"] = serde_json::json!(2);
        std::fs::write(&settings, serde_json::to_string_pretty(&value).unwrap()).unwrap();

        remove(&dir, RemovalOptions::default());
        let after: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&settings).unwrap()).unwrap();
        assert_eq!(after, serde_json::json!({ "editor.tabSize": 2 }));
    }
}
