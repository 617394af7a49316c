use super::{confirm, is_interactive};
use crate::output;
use anyhow::Context;
use oak_core::pipeline::{FlowType, PipelineBuilder, PipelineContext, StageData};
use oak_core::services::{UpgradeOptions, UpgradePlan};
use std::path::Path;

pub struct UpgradeArgs {
    pub commands: bool,
    pub templates: bool,
    pub dry_run: bool,
    pub force: bool,
}

/// `--commands` narrows to agent commands, `--templates` to IDE settings
/// and skills. Neither flag (or both) means everything.
pub fn upgrade_options(commands: bool, templates: bool) -> UpgradeOptions {
    if commands == templates {
        return UpgradeOptions::default();
    }
    UpgradeOptions {
        commands,
        ide_settings: templates,
        skills: templates,
    }
}

/// `oak upgrade`: plan, show the plan, then apply it through the upgrade
/// pipeline.
pub fn run(root: &Path, args: UpgradeArgs, json: bool) -> anyhow::Result<()> {
    let options = upgrade_options(args.commands, args.templates);
    let mut ctx = PipelineContext::new(root, FlowType::Upgrade);
    if !ctx.services.upgrade.is_initialized() {
        anyhow::bail!(
            "not initialized: run 'oak init' first (no .oak/ found in {})",
            root.display()
        );
    }

    let plan = ctx
        .services
        .upgrade
        .plan_upgrade(&options)
        .context("failed to plan upgrade")?;

    if !plan.has_upgrades() || args.dry_run {
        if json {
            return output::print_json(&plan);
        }
        print_plan(&plan);
        if args.dry_run && plan.has_upgrades() {
            println!("\nDry run: no changes made.");
        }
        return Ok(());
    }

    if !json {
        print_plan(&plan);
        if !args.force && is_interactive() && !confirm("\nApply these upgrades?")? {
            println!("Upgrade cancelled.");
            return Ok(());
        }
        println!();
    }

    // The pipeline decides which stages run from the plan, so it has to be
    // in place before execution starts.
    ctx.set_result("upgrade_options", StageData::UpgradeOptions(options));
    ctx.set_result("plan_upgrade", StageData::UpgradePlan(Box::new(plan)));

    let mut pipeline = output::with_progress(PipelineBuilder::upgrade(), json).build(false);
    let result = pipeline.execute(&mut ctx);
    output::print_run(&ctx, &result, json)?;
    if !result.success {
        let reason = result
            .stages_failed
            .last()
            .map(|(stage, reason)| format!("{stage}: {reason}"))
            .unwrap_or_default();
        anyhow::bail!("upgrade failed ({reason})");
    }
    if !json {
        println!("\nUpgrade complete.");
    }
    Ok(())
}

fn print_plan(plan: &UpgradePlan) {
    if !plan.has_upgrades() {
        println!("Already up to date ({}).", plan.package_version);
        return;
    }
    println!("Upgrade plan ({} item(s)):", plan.total_items());
    if plan.version_outdated {
        println!(
            "  version:  {} -> {}",
            if plan.current_version.is_empty() {
                "unversioned"
            } else {
                plan.current_version.as_str()
            },
            plan.package_version
        );
    }
    for repair in &plan.structural_repairs {
        println!("  repair:   {}", repair.description());
    }
    for cmd in &plan.commands {
        println!("  command:  {} ({})", cmd.file, cmd.agent);
    }
    for ide in &plan.ide_settings {
        println!("  ide:      {ide}");
    }
    for skill in &plan.skills.install {
        println!("  skill:    {} (new, from {})", skill.skill, skill.feature);
    }
    for skill in &plan.skills.upgrade {
        println!("  skill:    {skill}");
    }
    for migration in &plan.migrations {
        println!("  migrate:  {} ({})", migration.id, migration.description);
    }
}
