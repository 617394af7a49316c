use crate::error::Result;
use crate::pipeline::context::{FlowType, PipelineContext, StageData};
use crate::pipeline::ordering;
use crate::pipeline::stage::{Stage, StageLifecycle, StageOutcome};

pub fn stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(CleanupAgentSkills),
        Box::new(InstallSkills),
        Box::new(RefreshSkills),
    ]
}

/// Drops oak skills from the skills directory of deselected agents. Runs
/// just before their commands are removed.
pub struct CleanupAgentSkills;

impl Stage for CleanupAgentSkills {
    fn name(&self) -> &str {
        "cleanup_agent_skills"
    }

    fn display_name(&self) -> &str {
        "Removing skills for deselected agents"
    }

    fn order(&self) -> u32 {
        ordering::CLEANUP_AGENT_SKILLS
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
        Some("refresh_skills")
    }

    fn applies(&self, ctx: &PipelineContext) -> bool {
        !ctx.selections.agents_removed().is_empty()
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let removed = ctx.selections.agents_removed();
        let count = ctx
            .services
            .skills
            .cleanup_skills_for_removed_agents(&removed)?;
        let message = if count == 0 {
            "No skills to clean up".to_string()
        } else {
            format!("Removed {count} skill(s) for {} agent(s)", removed.len())
        };
        Ok(StageOutcome::success_with(
            message,
            StageData::SkillsCleaned(count),
        ))
    }
}

/// Skills normally arrive with their feature; this stage catches features
/// whose skills are still missing and reports what is installed.
pub struct InstallSkills;

impl Stage for InstallSkills {
    fn name(&self) -> &str {
        "install_skills"
    }

    fn display_name(&self) -> &str {
        "Installing skills"
    }

    fn order(&self) -> u32 {
        ordering::INSTALL_SKILLS
    }

    fn applicable_flows(&self) -> &[FlowType] {
        &[FlowType::FreshInit, FlowType::ForceReinit]
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn lifecycle(&self) -> StageLifecycle {
        StageLifecycle::Install
    }

    fn applies(&self, ctx: &PipelineContext) -> bool {
        !ctx.selections.features.is_empty()
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let skills = &ctx.services.skills;
        if !skills.has_skills_capable_agent()? {
            return Ok(StageOutcome::skipped("No skills-capable agents configured"));
        }

        let config = ctx.services.config.load()?;
        if config.skills.auto_install {
            for feature in &config.features.enabled {
                let missing = skills
                    .skills_for_feature(feature)?
                    .into_iter()
                    .any(|s| !config.skills.installed.iter().any(|i| i == s));
                if missing {
                    skills.install_skills_for_feature(feature)?;
                }
            }
        }

        let installed = skills.list_installed_skills()?;
        Ok(StageOutcome::success_with(
            format!("Skills ready ({} installed)", installed.len()),
            StageData::SkillsReady(installed),
        ))
    }
}

/// Copies installed skills to newly selected skills-capable agents.
pub struct RefreshSkills;

impl Stage for RefreshSkills {
    fn name(&self) -> &str {
        "refresh_skills"
    }

    fn display_name(&self) -> &str {
        "Installing skills for new agents"
    }

    fn order(&self) -> u32 {
        ordering::REFRESH_SKILLS
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
        Some("cleanup_agent_skills")
    }

    fn applies(&self, ctx: &PipelineContext) -> bool {
        !ctx.selections.agents_added().is_empty()
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        if !ctx.services.skills.has_skills_capable_agent()? {
            return Ok(StageOutcome::skipped("No skills-capable agents configured"));
        }
        let count = ctx.services.skills.refresh_skills()?;
        let message = if count == 0 {
            "No skills to refresh".to_string()
        } else {
            format!("Installed {count} skill(s) for new agent(s)")
        };
        Ok(StageOutcome::success_with(
            message,
            StageData::SkillsRefreshed(count),
        ))
    }
}
