//! Feature lifecycle hooks fired at the end of init and update runs.
//!
//! Hooks never block the pipeline: a failing handler shows up in its
//! [`HookReport`](crate::services::HookReport), not as a stage failure.

use super::hook_summary;
use crate::error::Result;
use crate::pipeline::context::{FlowType, PipelineContext, StageData};
use crate::pipeline::ordering;
use crate::pipeline::stage::{Stage, StageOutcome};

pub fn stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(TriggerAgentsChanged),
        Box::new(TriggerIdesChanged),
        Box::new(TriggerInitComplete),
    ]
}

pub struct TriggerAgentsChanged;

impl Stage for TriggerAgentsChanged {
    fn name(&self) -> &str {
        "trigger_agents_changed"
    }

    fn display_name(&self) -> &str {
        "Running agent change hooks"
    }

    fn order(&self) -> u32 {
        ordering::TRIGGER_AGENTS_CHANGED
    }

    fn applicable_flows(&self) -> &[FlowType] {
        &[FlowType::Update]
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn applies(&self, ctx: &PipelineContext) -> bool {
        ctx.selections.has_agent_changes()
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let reports = ctx.services.features.on_agents_changed()?;
        Ok(StageOutcome::success_with(
            hook_summary(&reports, "agent change hooks"),
            StageData::HookReports(reports),
        ))
    }
}

pub struct TriggerIdesChanged;

impl Stage for TriggerIdesChanged {
    fn name(&self) -> &str {
        "trigger_ides_changed"
    }

    fn display_name(&self) -> &str {
        "Running IDE change hooks"
    }

    fn order(&self) -> u32 {
        ordering::TRIGGER_IDES_CHANGED
    }

    fn applicable_flows(&self) -> &[FlowType] {
        &[FlowType::Update]
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn applies(&self, ctx: &PipelineContext) -> bool {
        ctx.selections.has_ide_changes()
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let reports = ctx.services.features.on_ides_changed()?;
        Ok(StageOutcome::success_with(
            hook_summary(&reports, "IDE change hooks"),
            StageData::HookReports(reports),
        ))
    }
}

pub struct TriggerInitComplete;

impl Stage for TriggerInitComplete {
    fn name(&self) -> &str {
        "trigger_init_complete"
    }

    fn display_name(&self) -> &str {
        "Running initialization hooks"
    }

    fn order(&self) -> u32 {
        ordering::TRIGGER_INIT_COMPLETE
    }

    fn applicable_flows(&self) -> &[FlowType] {
        FlowType::INIT_FLOWS
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let reports = ctx.services.features.on_init_complete()?;
        Ok(StageOutcome::success_with(
            hook_summary(&reports, "init hooks"),
            StageData::HookReports(reports),
        ))
    }
}
