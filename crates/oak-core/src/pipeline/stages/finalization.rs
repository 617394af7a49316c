use crate::config::OAK_VERSION;
use crate::error::Result;
use crate::pipeline::context::{FlowType, PipelineContext, StageData};
use crate::pipeline::ordering;
use crate::pipeline::stage::{Stage, StageOutcome};
use crate::{io, migrations};

pub fn stages() -> Vec<Box<dyn Stage>> {
    vec![Box::new(UpdateVersion), Box::new(EnsureGitignore)]
}

pub struct UpdateVersion;

impl Stage for UpdateVersion {
    fn name(&self) -> &str {
        "update_version"
    }

    fn display_name(&self) -> &str {
        "Updating configuration version"
    }

    fn order(&self) -> u32 {
        ordering::UPDATE_VERSION
    }

    fn applicable_flows(&self) -> &[FlowType] {
        &[FlowType::Update, FlowType::Upgrade]
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn applies(&self, ctx: &PipelineContext) -> bool {
        ctx.selections.has_any_changes()
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        ctx.services.config.set_version(OAK_VERSION)?;
        Ok(StageOutcome::success_with(
            format!("Updated to version {OAK_VERSION}"),
            StageData::Version(OAK_VERSION.to_string()),
        ))
    }
}

/// Keeps per-issue context files out of version control.
pub struct EnsureGitignore;

impl Stage for EnsureGitignore {
    fn name(&self) -> &str {
        "ensure_gitignore"
    }

    fn display_name(&self) -> &str {
        "Updating .gitignore"
    }

    fn order(&self) -> u32 {
        ordering::ENSURE_GITIGNORE
    }

    fn applicable_flows(&self) -> &[FlowType] {
        &[FlowType::FreshInit, FlowType::ForceReinit]
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        match io::ensure_gitignore_entry(ctx.project_root(), migrations::ISSUE_CONTEXT_IGNORE) {
            Ok(_) => Ok(StageOutcome::success("Updated .gitignore")),
            Err(e) => {
                ctx.add_warning(self.name(), e.to_string());
                Ok(StageOutcome::success("Skipped .gitignore update"))
            }
        }
    }
}
