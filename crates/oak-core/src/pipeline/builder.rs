use crate::pipeline::executor::{Pipeline, StageCompleteHook, StageStartHook};
use crate::pipeline::stage::{Stage, StageLifecycle, StageOutcome};
use crate::pipeline::stages;
use std::collections::BTreeSet;

/// Collects stages and progress callbacks, then produces a [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<Box<dyn Stage>>,
    on_stage_start: Option<StageStartHook>,
    on_stage_complete: Option<StageCompleteHook>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn add_all(mut self, stages: impl IntoIterator<Item = Box<dyn Stage>>) -> Self {
        self.stages.extend(stages);
        self
    }

    pub fn with_setup_stages(self) -> Self {
        self.add_all(stages::setup::stages())
    }

    pub fn with_config_stages(self) -> Self {
        self.add_all(stages::config::stages())
    }

    pub fn with_agent_stages(self) -> Self {
        self.add_all(stages::agents::stages())
    }

    pub fn with_feature_stages(self) -> Self {
        self.add_all(stages::features::stages())
    }

    pub fn with_ide_stages(self) -> Self {
        self.add_all(stages::ide::stages())
    }

    pub fn with_skill_stages(self) -> Self {
        self.add_all(stages::skills::stages())
    }

    pub fn with_hook_stages(self) -> Self {
        self.add_all(stages::hooks::stages())
    }

    pub fn with_finalization_stages(self) -> Self {
        self.add_all(stages::finalization::stages())
    }

    pub fn with_upgrade_stages(self) -> Self {
        self.add_all(stages::upgrade::stages())
    }

    pub fn with_removal_stages(self) -> Self {
        self.add_all(stages::removal::stages())
    }

    pub fn on_stage_start(mut self, f: impl FnMut(&dyn Stage) + 'static) -> Self {
        self.on_stage_start = Some(Box::new(f));
        self
    }

    pub fn on_stage_complete(
        mut self,
        f: impl FnMut(&dyn Stage, &StageOutcome) + 'static,
    ) -> Self {
        self.on_stage_complete = Some(Box::new(f));
        self
    }

    /// Warnings for install stages without a cleanup counterpart and for
    /// counterparts that are not registered in this builder.
    pub fn validate_lifecycle_pairs(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self.stages.iter().map(|s| s.name()).collect();
        let mut warnings = Vec::new();
        for stage in &self.stages {
            match (stage.lifecycle(), stage.counterpart_stage()) {
                (StageLifecycle::Install, None) => warnings.push(format!(
                    "Stage '{}' has INSTALL lifecycle but no counterpart_stage defined",
                    stage.name()
                )),
                (_, Some(counterpart)) if !names.contains(counterpart) => {
                    warnings.push(format!(
                        "Stage '{}' has counterpart '{counterpart}' but it's not in the pipeline",
                        stage.name()
                    ))
                }
                _ => {}
            }
        }
        warnings
    }

    /// Produce the pipeline. Lifecycle problems are logged, never fatal.
    pub fn build(self, validate_pairs: bool) -> Pipeline {
        if validate_pairs {
            for warning in self.validate_lifecycle_pairs() {
                tracing::warn!("{warning}");
            }
        }
        Pipeline::new(self.stages, self.on_stage_start, self.on_stage_complete)
    }

    // -----------------------------------------------------------------------
    // Named pipelines
    // -----------------------------------------------------------------------

    /// Every stage used by `oak init`, for fresh, update and forced runs.
    pub fn init() -> Self {
        Self::new()
            .with_setup_stages()
            .with_config_stages()
            .with_agent_stages()
            .with_feature_stages()
            .with_ide_stages()
            .with_skill_stages()
            .with_hook_stages()
            .with_finalization_stages()
    }

    pub fn upgrade() -> Self {
        Self::new().with_upgrade_stages()
    }

    pub fn remove() -> Self {
        Self::new().with_removal_stages()
    }
}

pub fn build_init_pipeline() -> Pipeline {
    PipelineBuilder::init().build(true)
}

pub fn build_upgrade_pipeline() -> Pipeline {
    PipelineBuilder::upgrade().build(false)
}

pub fn build_remove_pipeline() -> Pipeline {
    PipelineBuilder::remove().build(false)
}
