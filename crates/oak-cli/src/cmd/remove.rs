use super::{confirm, is_interactive};
use crate::output;
use oak_core::paths;
use oak_core::pipeline::{FlowType, PipelineBuilder, PipelineContext, RemovalOptions, RemovalPlan, StageData};
use std::path::Path;

/// `oak remove`: delete what oak installed. Files the user changed and the
/// `oak/` content directory are left in place.
pub fn run(root: &Path, force: bool, keep_ide_settings: bool, json: bool) -> anyhow::Result<()> {
    if !paths::oak_dir(root).is_dir() {
        anyhow::bail!("oak is not installed in {}", root.display());
    }
    if !force {
        if !is_interactive() {
            anyhow::bail!("refusing to remove without --force in a non-interactive session");
        }
        if !confirm("Remove oak from this project?")? {
            println!("Removal cancelled.");
            return Ok(());
        }
    }

    let mut ctx = PipelineContext::new(root, FlowType::Remove)
        .with_force(force)
        .with_interactive(!force);
    ctx.set_result(
        "removal_options",
        StageData::RemovalOptions(RemovalOptions { keep_ide_settings }),
    );

    let mut pipeline = output::with_progress(PipelineBuilder::remove(), json).build(false);
    let result = pipeline.execute(&mut ctx);
    output::print_run(&ctx, &result, json)?;
    if !result.success {
        let reason = result
            .stages_failed
            .last()
            .map(|(stage, reason)| format!("{stage}: {reason}"))
            .unwrap_or_default();
        anyhow::bail!("remove failed ({reason})");
    }
    if !json {
        if let Some(plan) = ctx.removal_plan() {
            print_leftovers(plan);
        }
        println!("\noak removed.");
    }
    Ok(())
}

fn print_leftovers(plan: &RemovalPlan) {
    if !plan.files_modified_by_user.is_empty() {
        println!("\nKept files you changed:");
        for file in &plan.files_modified_by_user {
            println!("  {file}");
        }
    }
    if !plan.files_to_inform_user.is_empty() {
        println!("\nRemove oak's additions from these files by hand:");
        for notice in &plan.files_to_inform_user {
            println!("  {} (section starting '{}')", notice.path, notice.marker);
        }
    }
    if plan.has_user_content {
        println!("\nYour documents in {}/ were kept.", paths::USER_CONTENT_DIR);
    }
}
