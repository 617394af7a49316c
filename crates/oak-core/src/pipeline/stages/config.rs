use crate::error::Result;
use crate::migrations;
use crate::pipeline::context::{FlowType, PipelineContext, StageData};
use crate::pipeline::ordering;
use crate::pipeline::stage::{Stage, StageOutcome};

pub fn stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(LoadExistingConfig),
        Box::new(CreateConfig),
        Box::new(UpdateConfigAgents),
        Box::new(UpdateConfigIdes),
        Box::new(MarkMigrationsComplete),
    ]
}

/// Seeds the `previous_*` selections from the installed config.
pub struct LoadExistingConfig;

impl Stage for LoadExistingConfig {
    fn name(&self) -> &str {
        "load_existing_config"
    }

    fn display_name(&self) -> &str {
        "Loading existing configuration"
    }

    fn order(&self) -> u32 {
        ordering::LOAD_EXISTING_CONFIG
    }

    fn applicable_flows(&self) -> &[FlowType] {
        &[FlowType::Update, FlowType::Upgrade]
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        if !ctx.services.config.exists() {
            return Ok(StageOutcome::failed(
                "No existing configuration found",
                "Run 'oak init' first",
            ));
        }
        let config = ctx.seed_previous_selections()?;
        Ok(StageOutcome::success_with(
            format!(
                "Loaded configuration ({} agent(s), {} IDE(s), {} feature(s))",
                config.agents.len(),
                config.ides.len(),
                config.features.enabled.len()
            ),
            StageData::ExistingConfig {
                agents: config.agents,
                ides: config.ides,
                features: config.features.enabled,
            },
        ))
    }
}

pub struct CreateConfig;

impl Stage for CreateConfig {
    fn name(&self) -> &str {
        "create_config"
    }

    fn display_name(&self) -> &str {
        "Creating configuration"
    }

    fn order(&self) -> u32 {
        ordering::CREATE_CONFIG
    }

    fn applicable_flows(&self) -> &[FlowType] {
        &[FlowType::FreshInit, FlowType::ForceReinit]
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        // Features are enabled one by one as install_features installs them.
        let sel = &ctx.selections;
        ctx.services
            .config
            .create_default(&sel.agents, &sel.ides, &[])?;
        Ok(StageOutcome::success("Created .oak/config.yaml"))
    }
}

pub struct UpdateConfigAgents;

impl Stage for UpdateConfigAgents {
    fn name(&self) -> &str {
        "update_config_agents"
    }

    fn display_name(&self) -> &str {
        "Updating agent configuration"
    }

    fn order(&self) -> u32 {
        ordering::UPDATE_CONFIG_AGENTS
    }

    fn applicable_flows(&self) -> &[FlowType] {
        &[FlowType::Update]
    }

    fn applies(&self, ctx: &PipelineContext) -> bool {
        ctx.selections.has_agent_changes()
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let config = ctx.services.config.update_agents(&ctx.selections.agents)?;
        Ok(StageOutcome::success(format!(
            "Agents: {}",
            display_list(&config.agents)
        )))
    }
}

pub struct UpdateConfigIdes;

impl Stage for UpdateConfigIdes {
    fn name(&self) -> &str {
        "update_config_ides"
    }

    fn display_name(&self) -> &str {
        "Updating IDE configuration"
    }

    fn order(&self) -> u32 {
        ordering::UPDATE_CONFIG_IDES
    }

    fn applicable_flows(&self) -> &[FlowType] {
        &[FlowType::Update]
    }

    fn applies(&self, ctx: &PipelineContext) -> bool {
        ctx.selections.has_ide_changes()
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let config = ctx.services.config.update_ides(&ctx.selections.ides)?;
        Ok(StageOutcome::success(format!(
            "IDEs: {}",
            display_list(&config.ides)
        )))
    }
}

/// A fresh install already has the current layout, so every known
/// migration is recorded as applied.
pub struct MarkMigrationsComplete;

impl Stage for MarkMigrationsComplete {
    fn name(&self) -> &str {
        "mark_migrations_complete"
    }

    fn display_name(&self) -> &str {
        "Marking migrations complete"
    }

    fn order(&self) -> u32 {
        ordering::MARK_MIGRATIONS_COMPLETE
    }

    fn applicable_flows(&self) -> &[FlowType] {
        &[FlowType::FreshInit]
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let ids = migrations::all_migration_ids();
        ctx.services.ledger.add_applied_migrations(&ids)?;
        Ok(StageOutcome::success(format!(
            "Marked {} migrations complete",
            ids.len()
        )))
    }
}

fn display_list(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}
