use crate::pipeline::context::PipelineContext;
use crate::pipeline::stage::{Stage, StageOutcome, StageResult};
use serde::Serialize;

pub type StageStartHook = Box<dyn FnMut(&dyn Stage)>;
pub type StageCompleteHook = Box<dyn FnMut(&dyn Stage, &StageOutcome)>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineResult {
    pub success: bool,
    pub stages_run: Vec<String>,
    pub stages_skipped: Vec<String>,
    /// `(stage, error or message)`.
    pub stages_failed: Vec<(String, String)>,
}

/// Runs a fixed, ordered set of stages against a context.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    on_stage_start: Option<StageStartHook>,
    on_stage_complete: Option<StageCompleteHook>,
}

impl Pipeline {
    /// Sort `stages` by order. The sort is stable, so stages sharing an
    /// order keep their registration order; such ties are logged.
    pub fn new(
        mut stages: Vec<Box<dyn Stage>>,
        on_stage_start: Option<StageStartHook>,
        on_stage_complete: Option<StageCompleteHook>,
    ) -> Self {
        stages.sort_by_key(|s| s.order());
        for pair in stages.windows(2) {
            if pair[0].order() == pair[1].order() {
                tracing::warn!(
                    order = pair[0].order(),
                    first = pair[0].name(),
                    second = pair[1].name(),
                    "stages share an order; running in registration order"
                );
            }
        }
        Self {
            stages,
            on_stage_start,
            on_stage_complete,
        }
    }

    /// Stage names in execution order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Number of stages that would run for `ctx` right now.
    pub fn get_stage_count(&self, ctx: &PipelineContext) -> usize {
        self.stages.iter().filter(|s| s.should_run(ctx)).count()
    }

    pub fn execute(&mut self, ctx: &mut PipelineContext) -> PipelineResult {
        let mut result = PipelineResult {
            success: true,
            ..PipelineResult::default()
        };

        let (runnable, idle): (Vec<&dyn Stage>, Vec<&dyn Stage>) = self
            .stages
            .iter()
            .map(|s| s.as_ref())
            .partition(|s| s.should_run(ctx));
        result
            .stages_skipped
            .extend(idle.iter().map(|s| s.name().to_string()));

        for stage in runnable {
            if let Some(cb) = self.on_stage_start.as_mut() {
                cb(stage);
            }
            tracing::debug!(stage = stage.name(), "stage start");

            let mut outcome = stage.execute(ctx);
            if outcome.is_success() {
                if let Some(data) = outcome.data.take() {
                    ctx.set_result(stage.name(), data);
                }
            }
            tracing::debug!(
                stage = stage.name(),
                result = ?outcome.result,
                message = %outcome.message,
                "stage complete"
            );
            if let Some(cb) = self.on_stage_complete.as_mut() {
                cb(stage, &outcome);
            }

            match outcome.result {
                StageResult::Success => result.stages_run.push(stage.name().to_string()),
                StageResult::Skipped => result.stages_skipped.push(stage.name().to_string()),
                StageResult::Failed => {
                    let reason = outcome
                        .error
                        .as_ref()
                        .map(|e| e.detail.clone())
                        .unwrap_or_else(|| outcome.message.clone());
                    result
                        .stages_failed
                        .push((stage.name().to_string(), reason));
                    if stage.is_critical() {
                        result.success = false;
                        break;
                    }
                }
            }
        }
        result
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
