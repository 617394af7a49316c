use crate::error::Result;
use crate::pipeline::context::{FlowType, PipelineContext, StageData};
use crate::pipeline::ordering;
use crate::pipeline::stage::{Stage, StageLifecycle, StageOutcome};

pub fn stages() -> Vec<Box<dyn Stage>> {
    vec![Box::new(InstallAgentCommands), Box::new(RemoveAgentCommands)]
}

/// Gives newly selected agents the commands of every feature already enabled.
/// Features added in the same run are installed later by `install_features`.
pub struct InstallAgentCommands;

impl Stage for InstallAgentCommands {
    fn name(&self) -> &str {
        "install_agent_commands"
    }

    fn display_name(&self) -> &str {
        "Installing agent commands"
    }

    fn order(&self) -> u32 {
        ordering::INSTALL_AGENT_COMMANDS
    }

    fn applicable_flows(&self) -> &[FlowType] {
        &[FlowType::Update]
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn lifecycle(&self) -> StageLifecycle {
        StageLifecycle::Install
    }

    fn counterpart_stage(&self) -> Option<&str> {
        Some("remove_agent_commands")
    }

    fn applies(&self, ctx: &PipelineContext) -> bool {
        !ctx.selections.agents_added().is_empty()
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let added: Vec<String> = ctx.selections.agents_added().into_iter().collect();
        let enabled = ctx.services.config.features()?;
        let mut files = 0;
        for feature in &enabled {
            files += ctx
                .services
                .features
                .install_feature_commands(feature, &added)?;
        }
        tracing::debug!(agents = ?added, files, "agent commands installed");
        Ok(StageOutcome::success_with(
            format!("Installed commands for {} new agent(s)", added.len()),
            StageData::AgentCommandsInstalled(added),
        ))
    }
}

pub struct RemoveAgentCommands;

impl Stage for RemoveAgentCommands {
    fn name(&self) -> &str {
        "remove_agent_commands"
    }

    fn display_name(&self) -> &str {
        "Removing deselected agent commands"
    }

    fn order(&self) -> u32 {
        ordering::REMOVE_AGENT_COMMANDS
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
        Some("install_agent_commands")
    }

    fn applies(&self, ctx: &PipelineContext) -> bool {
        !ctx.selections.agents_removed().is_empty()
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let removed: Vec<String> = ctx.selections.agents_removed().into_iter().collect();
        let mut files = 0;
        for agent in &removed {
            files += ctx.services.agents.remove_agent_commands(agent)?;
        }
        Ok(StageOutcome::success_with(
            format!(
                "Removed {files} command(s) for {} agent(s)",
                removed.len()
            ),
            StageData::AgentCommandsRemoved {
                agents: removed,
                files,
            },
        ))
    }
}
