use crate::error::Result;
use crate::pipeline::context::{FlowType, PipelineContext, StageData};
use crate::pipeline::ordering;
use crate::pipeline::stage::{Stage, StageLifecycle, StageOutcome};

pub fn stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(InstallCoreIdeAssets),
        Box::new(RemoveIdeSettings),
        Box::new(InstallIdeSettings),
    ]
}

/// Writes the IDE templates into `.oak/ide/`. `oak remove` deletes them
/// with the rest of `.oak/`, so there is no cleanup stage.
pub struct InstallCoreIdeAssets;

impl Stage for InstallCoreIdeAssets {
    fn name(&self) -> &str {
        "install_core_ide_assets"
    }

    fn display_name(&self) -> &str {
        "Installing core IDE assets"
    }

    fn order(&self) -> u32 {
        ordering::INSTALL_CORE_IDE_ASSETS
    }

    fn applicable_flows(&self) -> &[FlowType] {
        FlowType::INIT_FLOWS
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn lifecycle(&self) -> StageLifecycle {
        StageLifecycle::Install
    }

    fn applies(&self, ctx: &PipelineContext) -> bool {
        ctx.is_fresh_install() || ctx.is_force_reinit() || ctx.selections.has_ide_changes()
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let written = ctx.services.ides.install_core_assets()?;
        tracing::debug!(written, "core IDE assets installed");
        Ok(StageOutcome::success("Installed core IDE assets"))
    }
}

pub struct RemoveIdeSettings;

impl Stage for RemoveIdeSettings {
    fn name(&self) -> &str {
        "remove_ide_settings"
    }

    fn display_name(&self) -> &str {
        "Removing deselected IDE settings"
    }

    fn order(&self) -> u32 {
        ordering::REMOVE_IDE_SETTINGS
    }

    fn applicable_flows(&self) -> &[FlowType] {
        &[FlowType::Update]
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

    fn applies(&self, ctx: &PipelineContext) -> bool {
        !ctx.selections.ides_removed().is_empty()
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let mut removed = Vec::new();
        for ide in ctx.selections.ides_removed() {
            if ctx.services.ides.remove_settings(&ide)? {
                removed.push(ide);
            }
        }
        Ok(StageOutcome::success_with(
            format!("Removed settings for {} IDE(s)", removed.len()),
            StageData::IdeSettingsRemoved(removed),
        ))
    }
}

pub struct InstallIdeSettings;

impl Stage for InstallIdeSettings {
    fn name(&self) -> &str {
        "install_ide_settings"
    }

    fn display_name(&self) -> &str {
        "Installing IDE settings"
    }

    fn order(&self) -> u32 {
        ordering::INSTALL_IDE_SETTINGS
    }

    fn applicable_flows(&self) -> &[FlowType] {
        FlowType::INIT_FLOWS
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn lifecycle(&self) -> StageLifecycle {
        StageLifecycle::Install
    }

    fn counterpart_stage(&self) -> Option<&str> {
        Some("remove_ide_settings")
    }

    fn applies(&self, ctx: &PipelineContext) -> bool {
        !ctx.selections.ides.is_empty()
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let mut changed = 0;
        for ide in &ctx.selections.ides {
            if ctx.services.ides.install_settings(ide)? {
                changed += 1;
            }
        }
        if changed == 0 {
            return Ok(StageOutcome::success("IDE settings already up to date"));
        }
        Ok(StageOutcome::success(format!(
            "Installed settings for {changed} IDE(s)"
        )))
    }
}
