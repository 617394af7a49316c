//! Stages of `oak upgrade`.
//!
//! `plan_upgrade` stores an [`UpgradePlan`] and every later stage works off
//! its own slice of that plan. A dry run stops after planning. Item
//! failures inside a stage become warnings so one bad file does not stop
//! the rest of the upgrade.

use super::{hook_summary, upgrade_summary};
use crate::config::OAK_VERSION;
use crate::error::Result;
use crate::migrations;
use crate::pipeline::context::{FlowType, PipelineContext, StageData};
use crate::pipeline::ordering;
use crate::pipeline::stage::{Stage, StageOutcome};
use crate::services::UpgradePlan;

pub fn stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(ValidateUpgradeEnvironment),
        Box::new(PlanUpgrade),
        Box::new(TriggerPreUpgradeHooks),
        Box::new(UpgradeStructuralRepairs),
        Box::new(UpgradeCommands),
        Box::new(UpgradeIdeSettings),
        Box::new(UpgradeSkills),
        Box::new(RunMigrations),
        Box::new(UpdateUpgradeVersion),
        Box::new(TriggerPostUpgradeHooks),
    ]
}

const UPGRADE_FLOW: &[FlowType] = &[FlowType::Upgrade];

/// True outside dry runs when the stored plan satisfies `pred`.
fn plan_has(ctx: &PipelineContext, pred: impl FnOnce(&UpgradePlan) -> bool) -> bool {
    !ctx.dry_run && ctx.upgrade_plan().is_some_and(pred)
}

/// The stored plan, or an empty one when planning did not run.
fn plan(ctx: &PipelineContext) -> UpgradePlan {
    ctx.upgrade_plan().cloned().unwrap_or_default()
}

/// Record each failure as a warning and build the stage outcome.
fn finish(
    ctx: &mut PipelineContext,
    stage: &str,
    noun: &str,
    upgraded: Vec<String>,
    failed: Vec<String>,
) -> StageOutcome {
    for failure in &failed {
        ctx.add_warning(stage, failure.clone());
    }
    StageOutcome::success_with(
        upgrade_summary(upgraded.len(), failed.len(), noun),
        StageData::Upgraded { upgraded, failed },
    )
}

pub struct ValidateUpgradeEnvironment;

impl Stage for ValidateUpgradeEnvironment {
    fn name(&self) -> &str {
        "validate_upgrade_environment"
    }

    fn display_name(&self) -> &str {
        "Validating environment"
    }

    fn order(&self) -> u32 {
        ordering::VALIDATE_UPGRADE_ENVIRONMENT
    }

    fn applicable_flows(&self) -> &[FlowType] {
        UPGRADE_FLOW
    }

    // A plan supplied up front means the caller already checked.
    fn applies(&self, ctx: &PipelineContext) -> bool {
        !ctx.has_result("plan_upgrade")
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        if !ctx.services.upgrade.is_initialized() {
            return Ok(StageOutcome::failed("Not initialized", "Run 'oak init' first"));
        }
        Ok(StageOutcome::success("Environment validated"))
    }
}

pub struct PlanUpgrade;

impl Stage for PlanUpgrade {
    fn name(&self) -> &str {
        "plan_upgrade"
    }

    fn display_name(&self) -> &str {
        "Planning upgrade"
    }

    fn order(&self) -> u32 {
        ordering::PLAN_UPGRADE
    }

    fn applicable_flows(&self) -> &[FlowType] {
        UPGRADE_FLOW
    }

    fn applies(&self, ctx: &PipelineContext) -> bool {
        !ctx.has_result("plan_upgrade")
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let options = ctx.upgrade_options();
        let plan = ctx.services.upgrade.plan_upgrade(&options)?;
        let message = if plan.has_upgrades() {
            "Upgrade plan created"
        } else {
            "Already up to date"
        };
        Ok(StageOutcome::success_with(
            message,
            StageData::UpgradePlan(Box::new(plan)),
        ))
    }
}

pub struct TriggerPreUpgradeHooks;

impl Stage for TriggerPreUpgradeHooks {
    fn name(&self) -> &str {
        "trigger_pre_upgrade_hooks"
    }

    fn display_name(&self) -> &str {
        "Running pre-upgrade hooks"
    }

    fn order(&self) -> u32 {
        ordering::TRIGGER_PRE_UPGRADE_HOOKS
    }

    fn applicable_flows(&self) -> &[FlowType] {
        UPGRADE_FLOW
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn applies(&self, ctx: &PipelineContext) -> bool {
        plan_has(ctx, UpgradePlan::has_upgrades)
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let reports = ctx.services.features.on_pre_upgrade()?;
        Ok(StageOutcome::success_with(
            hook_summary(&reports, "pre-upgrade hooks"),
            StageData::HookReports(reports),
        ))
    }
}

pub struct UpgradeStructuralRepairs;

impl Stage for UpgradeStructuralRepairs {
    fn name(&self) -> &str {
        "upgrade_structural_repairs"
    }

    fn display_name(&self) -> &str {
        "Repairing structural issues"
    }

    fn order(&self) -> u32 {
        ordering::UPGRADE_STRUCTURAL_REPAIRS
    }

    fn applicable_flows(&self) -> &[FlowType] {
        UPGRADE_FLOW
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn applies(&self, ctx: &PipelineContext) -> bool {
        plan_has(ctx, |p| !p.structural_repairs.is_empty())
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let mut repaired = Vec::new();
        for repair in plan(ctx).structural_repairs {
            match ctx.services.upgrade.repair_structure(repair) {
                Ok(()) => repaired.push(repair.description().to_string()),
                Err(e) => ctx.add_warning(self.name(), format!("{}: {e}", repair.description())),
            }
        }
        Ok(StageOutcome::success_with(
            format!("Repaired {} structural issue(s)", repaired.len()),
            StageData::Repaired(repaired),
        ))
    }
}

pub struct UpgradeCommands;

impl Stage for UpgradeCommands {
    fn name(&self) -> &str {
        "upgrade_commands"
    }

    fn display_name(&self) -> &str {
        "Upgrading agent commands"
    }

    fn order(&self) -> u32 {
        ordering::UPGRADE_COMMANDS
    }

    fn applicable_flows(&self) -> &[FlowType] {
        UPGRADE_FLOW
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn applies(&self, ctx: &PipelineContext) -> bool {
        plan_has(ctx, |p| !p.commands.is_empty())
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let mut upgraded = Vec::new();
        let mut failed = Vec::new();
        for item in plan(ctx).commands {
            match ctx.services.upgrade.upgrade_command(&item) {
                Ok(()) => upgraded.push(item.installed_path),
                Err(e) => failed.push(format!("{}: {e}", item.installed_path)),
            }
        }
        Ok(finish(ctx, self.name(), "command", upgraded, failed))
    }
}

pub struct UpgradeIdeSettings;

impl Stage for UpgradeIdeSettings {
    fn name(&self) -> &str {
        "upgrade_ide_settings"
    }

    fn display_name(&self) -> &str {
        "Upgrading IDE settings"
    }

    fn order(&self) -> u32 {
        ordering::UPGRADE_IDE_SETTINGS
    }

    fn applicable_flows(&self) -> &[FlowType] {
        UPGRADE_FLOW
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn applies(&self, ctx: &PipelineContext) -> bool {
        plan_has(ctx, |p| !p.ide_settings.is_empty())
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let mut upgraded = Vec::new();
        let mut failed = Vec::new();
        for ide in plan(ctx).ide_settings {
            match ctx.services.ides.install_settings(&ide) {
                Ok(_) => upgraded.push(ide),
                Err(e) => failed.push(format!("{ide}: {e}")),
            }
        }
        Ok(finish(ctx, self.name(), "IDE setting", upgraded, failed))
    }
}

pub struct UpgradeSkills;

impl Stage for UpgradeSkills {
    fn name(&self) -> &str {
        "upgrade_skills"
    }

    fn display_name(&self) -> &str {
        "Upgrading skills"
    }

    fn order(&self) -> u32 {
        ordering::UPGRADE_SKILLS
    }

    fn applicable_flows(&self) -> &[FlowType] {
        UPGRADE_FLOW
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn applies(&self, ctx: &PipelineContext) -> bool {
        plan_has(ctx, |p| {
            !p.skills.install.is_empty() || !p.skills.upgrade.is_empty()
        })
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let skills = plan(ctx).skills;
        let mut upgraded = Vec::new();
        let mut failed = Vec::new();
        for item in skills.install {
            match ctx.services.skills.install_skill(&item.skill) {
                Ok(_) => upgraded.push(item.skill),
                Err(e) => failed.push(format!("{}: {e}", item.skill)),
            }
        }
        for skill in skills.upgrade {
            match ctx.services.skills.upgrade_skill(&skill) {
                Ok(()) => upgraded.push(skill),
                Err(e) => failed.push(format!("{skill}: {e}")),
            }
        }
        Ok(finish(ctx, self.name(), "skill", upgraded, failed))
    }
}

/// Runs pending migrations and records the ones that succeeded, so each
/// migration applies at most once.
pub struct RunMigrations;

impl Stage for RunMigrations {
    fn name(&self) -> &str {
        "run_migrations"
    }

    fn display_name(&self) -> &str {
        "Running migrations"
    }

    fn order(&self) -> u32 {
        ordering::RUN_MIGRATIONS
    }

    fn applicable_flows(&self) -> &[FlowType] {
        UPGRADE_FLOW
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn applies(&self, ctx: &PipelineContext) -> bool {
        plan_has(ctx, |p| !p.migrations.is_empty())
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let completed = ctx.services.ledger.get_applied_migrations()?;
        let (succeeded, failures) = migrations::run_migrations(ctx.project_root(), &completed);
        if !succeeded.is_empty() {
            ctx.services.ledger.add_applied_migrations(&succeeded)?;
        }
        let failed: Vec<String> = failures
            .into_iter()
            .map(|(id, error)| format!("{id}: {error}"))
            .collect();
        for failure in &failed {
            ctx.add_warning(self.name(), failure.clone());
        }
        let message = if failed.is_empty() {
            format!("Completed {} migration(s)", succeeded.len())
        } else {
            format!(
                "Ran {} migration(s), {} failed",
                succeeded.len(),
                failed.len()
            )
        };
        Ok(StageOutcome::success_with(
            message,
            StageData::Migrations { succeeded, failed },
        ))
    }
}

pub struct UpdateUpgradeVersion;

impl Stage for UpdateUpgradeVersion {
    fn name(&self) -> &str {
        "update_upgrade_version"
    }

    fn display_name(&self) -> &str {
        "Updating version"
    }

    fn order(&self) -> u32 {
        ordering::UPDATE_UPGRADE_VERSION
    }

    fn applicable_flows(&self) -> &[FlowType] {
        UPGRADE_FLOW
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn applies(&self, ctx: &PipelineContext) -> bool {
        plan_has(ctx, |p| p.version_outdated || p.has_upgrades())
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        ctx.services.config.set_version(OAK_VERSION)?;
        Ok(StageOutcome::success_with(
            format!("Updated to version {OAK_VERSION}"),
            StageData::Version(OAK_VERSION.to_string()),
        ))
    }
}

pub struct TriggerPostUpgradeHooks;

impl Stage for TriggerPostUpgradeHooks {
    fn name(&self) -> &str {
        "trigger_post_upgrade_hooks"
    }

    fn display_name(&self) -> &str {
        "Running post-upgrade hooks"
    }

    fn order(&self) -> u32 {
        ordering::TRIGGER_POST_UPGRADE_HOOKS
    }

    fn applicable_flows(&self) -> &[FlowType] {
        UPGRADE_FLOW
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn applies(&self, ctx: &PipelineContext) -> bool {
        plan_has(ctx, UpgradePlan::has_upgrades)
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let reports = ctx.services.features.on_post_upgrade()?;
        Ok(StageOutcome::success_with(
            hook_summary(&reports, "post-upgrade hooks"),
            StageData::HookReports(reports),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths;
    use crate::pipeline::builder::build_upgrade_pipeline;
    use crate::pipeline::stage::StageResult;
    use crate::pipeline::stages::test_support::run_init;
    use crate::services::{ConfigService, UpgradeOptions};
    use tempfile::TempDir;

    fn initialized() -> TempDir {
        let dir = TempDir::new().unwrap();
        let (_ctx, result) = run_init(
            dir.path(),
            FlowType::FreshInit,
            &["claude"],
            &["vscode"],
            &["rfc"],
        );
        assert!(result.success);
        dir
    }

    #[test]
    fn uninitialized_project_fails_validation() {
        let dir = TempDir::new().unwrap();
        let mut ctx = PipelineContext::new(dir.path(), FlowType::Upgrade);
        let result = build_upgrade_pipeline().execute(&mut ctx);
        assert!(!result.success);
        assert_eq!(
            result.stages_failed,
            vec![(
                "validate_upgrade_environment".to_string(),
                "Run 'oak init' first".to_string()
            )]
        );
        assert!(result.stages_run.is_empty());
    }

    #[test]
    fn fresh_install_is_up_to_date() {
        let dir = initialized();
        let mut ctx = PipelineContext::new(dir.path(), FlowType::Upgrade);
        let outcome = PlanUpgrade.execute(&mut ctx);
        assert_eq!(outcome.message, "Already up to date");
        ctx.set_result("plan_upgrade", outcome.data.unwrap());
        assert!(!UpgradeCommands.should_run(&ctx));
        assert!(!TriggerPostUpgradeHooks.should_run(&ctx));
    }

    #[test]
    fn drifted_command_and_stale_version_are_upgraded() {
        let dir = initialized();
        let command = dir.path().join(".claude/commands/oak.rfc-list.md");
        std::fs::write(&command, "stale").unwrap();
        ConfigService::new(dir.path()).set_version("0.0.1").unwrap();

        let mut ctx = planned(&dir);
        let result = build_upgrade_pipeline().execute(&mut ctx);
        assert!(result.success);
        assert!(result.stages_run.contains(&"upgrade_commands".to_string()));
        assert!(result.stages_run.contains(&"update_upgrade_version".to_string()));
        assert_ne!(std::fs::read_to_string(&command).unwrap(), "stale");
        assert!(ctx.services.ledger.is_file_unchanged(&command).unwrap());
        assert_eq!(ctx.services.config.load().unwrap().version, OAK_VERSION);
    }

    #[test]
    fn dry_run_stops_after_planning() {
        let dir = initialized();
        std::fs::write(dir.path().join(".claude/commands/oak.rfc-list.md"), "stale").unwrap();

        let mut ctx = PipelineContext::new(dir.path(), FlowType::Upgrade).with_dry_run(true);
        let result = build_upgrade_pipeline().execute(&mut ctx);
        assert!(result.success);
        assert_eq!(
            result.stages_run,
            vec!["validate_upgrade_environment", "plan_upgrade"]
        );
        assert_eq!(ctx.upgrade_plan().unwrap().commands.len(), 1);
        assert_eq!(
            std::fs::read_to_string(dir.path().join(".claude/commands/oak.rfc-list.md")).unwrap(),
            "stale"
        );
    }

    #[test]
    fn pending_migrations_run_once() {
        let dir = initialized();
        let ledger = crate::state::StateLedger::new(dir.path());
        let mut state = ledger.load_state().unwrap();
        state.migrations.retain(|m| m != "2024.11.13_gitignore_issue_context");
        ledger.save_state(&state).unwrap();
        std::fs::remove_file(dir.path().join(paths::GITIGNORE)).unwrap();

        let mut ctx = planned(&dir);
        let result = build_upgrade_pipeline().execute(&mut ctx);
        assert!(result.stages_run.contains(&"run_migrations".to_string()));
        assert!(ledger
            .is_migration_applied("2024.11.13_gitignore_issue_context")
            .unwrap());
        assert!(dir.path().join(paths::GITIGNORE).exists());

        let mut ctx = PipelineContext::new(dir.path(), FlowType::Upgrade);
        build_upgrade_pipeline().execute(&mut ctx);
        assert!(ctx.upgrade_plan().unwrap().migrations.is_empty());
    }

    #[test]
    fn preset_plan_skips_validation_and_planning() {
        let dir = initialized();
        let mut ctx = PipelineContext::new(dir.path(), FlowType::Upgrade);
        ctx.set_result("plan_upgrade", StageData::UpgradePlan(Box::default()));
        assert!(!ValidateUpgradeEnvironment.should_run(&ctx));
        assert!(!PlanUpgrade.should_run(&ctx));
        assert!(!UpgradeSkills.should_run(&ctx));
        assert_eq!(build_upgrade_pipeline().get_stage_count(&ctx), 0);
    }

    #[test]
    fn options_limit_the_plan() {
        let dir = initialized();
        std::fs::write(dir.path().join(".claude/commands/oak.rfc-list.md"), "stale").unwrap();
        let mut ctx = PipelineContext::new(dir.path(), FlowType::Upgrade);
        ctx.set_result(
            "upgrade_options",
            StageData::UpgradeOptions(UpgradeOptions {
                commands: false,
                ..UpgradeOptions::default()
            }),
        );
        let outcome = PlanUpgrade.execute(&mut ctx);
        assert_eq!(outcome.result, StageResult::Success);
        ctx.set_result("plan_upgrade", outcome.data.unwrap());
        assert!(ctx.upgrade_plan().unwrap().commands.is_empty());
    }

    #[test]
    fn item_failures_become_warnings() {
        let dir = initialized();
        let mut ctx = PipelineContext::new(dir.path(), FlowType::Upgrade);
        let mut plan = UpgradePlan::default();
        plan.ide_settings.push("emacs".to_string());
        ctx.set_result("plan_upgrade", StageData::UpgradePlan(Box::new(plan)));

        let outcome = UpgradeIdeSettings.execute(&mut ctx);
        assert!(outcome.is_success());
        assert_eq!(outcome.message, "Upgraded 0 IDE setting(s), 1 failed");
        assert_eq!(ctx.warnings.len(), 1);
        assert!(ctx.warnings[0].1.starts_with("emacs: "));
    }

    /// Upgrade context with the plan stored up front, as `oak upgrade` does.
    fn planned(dir: &TempDir) -> PipelineContext {
        let mut ctx = PipelineContext::new(dir.path(), FlowType::Upgrade);
        let plan = ctx
            .services
            .upgrade
            .plan_upgrade(&UpgradeOptions::default())
            .unwrap();
        ctx.set_result("plan_upgrade", StageData::UpgradePlan(Box::new(plan)));
        ctx
    }
}
