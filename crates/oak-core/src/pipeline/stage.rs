use crate::error::OakError;
use crate::pipeline::context::{FlowType, PipelineContext, StageData};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageResult {
    Success,
    Skipped,
    Failed,
}

/// Whether a stage creates artifacts, removes them, or neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageLifecycle {
    Install,
    Cleanup,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageErrorKind {
    PermissionDenied,
    NotFound,
    InvalidValue,
    Uncategorized,
}

impl StageErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            StageErrorKind::PermissionDenied => "Permission denied",
            StageErrorKind::NotFound => "File not found",
            StageErrorKind::InvalidValue => "Invalid value",
            StageErrorKind::Uncategorized => "Failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageError {
    pub kind: StageErrorKind,
    pub detail: String,
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.detail)
    }
}

#[derive(Debug, Clone)]
pub struct StageOutcome {
    pub result: StageResult,
    pub message: String,
    pub error: Option<StageError>,
    pub data: Option<StageData>,
}

impl StageOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            result: StageResult::Success,
            message: message.into(),
            error: None,
            data: None,
        }
    }

    pub fn success_with(message: impl Into<String>, data: StageData) -> Self {
        Self {
            data: Some(data),
            ..Self::success(message)
        }
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            result: StageResult::Skipped,
            ..Self::success(message)
        }
    }

    pub fn failed(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            result: StageResult::Failed,
            message: message.into(),
            error: Some(StageError {
                kind: StageErrorKind::Uncategorized,
                detail: detail.into(),
            }),
            data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result == StageResult::Success
    }
}

/// One idempotent step of a pipeline.
///
/// Stages never call each other; anything a later stage needs is returned
/// as [`StageData`] and read back through [`PipelineContext::result`].
pub trait Stage {
    /// Unique across all pipelines; also the key for the stage's result.
    fn name(&self) -> &str;

    fn display_name(&self) -> &str;

    fn order(&self) -> u32;

    fn applicable_flows(&self) -> &[FlowType] {
        FlowType::WRITE_FLOWS
    }

    /// A failing critical stage halts the pipeline.
    fn is_critical(&self) -> bool {
        true
    }

    fn lifecycle(&self) -> StageLifecycle {
        StageLifecycle::Neutral
    }

    /// The stage that undoes (or redoes) this one.
    fn counterpart_stage(&self) -> Option<&str> {
        None
    }

    /// Stage-specific precondition, checked after the flow gate.
    fn applies(&self, _ctx: &PipelineContext) -> bool {
        true
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome, OakError>;

    fn should_run(&self, ctx: &PipelineContext) -> bool {
        self.applicable_flows().contains(&ctx.flow_type()) && self.applies(ctx)
    }

    /// Run the stage, turning an error into a `Failed` outcome and recording
    /// it on the context.
    fn execute(&self, ctx: &mut PipelineContext) -> StageOutcome {
        match self.run(ctx) {
            Ok(outcome) => outcome,
            Err(e) => {
                let kind = e.kind();
                let detail = format!("{}: {e}", kind.label());
                ctx.add_error(self.name(), detail.clone());
                StageOutcome {
                    result: StageResult::Failed,
                    message: format!("{}: {}", kind.label(), self.display_name()),
                    error: Some(StageError { kind, detail }),
                    data: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Broken(OakError);

    impl Stage for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        fn display_name(&self) -> &str {
            "Breaking things"
        }
        fn order(&self) -> u32 {
            1
        }
        fn run(&self, _ctx: &mut PipelineContext) -> Result<StageOutcome, OakError> {
            Err(OakError::NotWritable(self.0.to_string()))
        }
    }

    struct Gated;

    impl Stage for Gated {
        fn name(&self) -> &str {
            "gated"
        }
        fn display_name(&self) -> &str {
            "Gated"
        }
        fn order(&self) -> u32 {
            1
        }
        fn applicable_flows(&self) -> &[FlowType] {
            &[FlowType::Update]
        }
        fn applies(&self, ctx: &PipelineContext) -> bool {
            ctx.selections.has_agent_changes()
        }
        fn run(&self, _ctx: &mut PipelineContext) -> Result<StageOutcome, OakError> {
            Ok(StageOutcome::success("ok"))
        }
    }

    #[test]
    fn errors_become_failed_outcomes() {
        let dir = TempDir::new().unwrap();
        let mut ctx = PipelineContext::new(dir.path(), FlowType::FreshInit);
        let stage = Broken(OakError::RootMissing("x".into()));
        let outcome = stage.execute(&mut ctx);

        assert_eq!(outcome.result, StageResult::Failed);
        assert_eq!(outcome.message, "Permission denied: Breaking things");
        let error = outcome.error.unwrap();
        assert_eq!(error.kind, StageErrorKind::PermissionDenied);
        assert!(error.detail.starts_with("Permission denied: "));
        assert_eq!(ctx.errors.len(), 1);
        assert_eq!(ctx.errors[0].0, "broken");
    }

    #[test]
    fn flow_gate_comes_before_predicate() {
        let dir = TempDir::new().unwrap();
        let mut ctx = PipelineContext::new(dir.path(), FlowType::FreshInit);
        ctx.selections.agents = vec!["claude".into()];
        assert!(!Gated.should_run(&ctx));

        let mut ctx = PipelineContext::new(dir.path(), FlowType::Update);
        assert!(!Gated.should_run(&ctx));
        ctx.selections.agents = vec!["claude".into()];
        assert!(Gated.should_run(&ctx));
    }

    #[test]
    fn failed_constructor_is_uncategorized() {
        let outcome = StageOutcome::failed("Nope", "Run 'oak init' first");
        assert_eq!(outcome.error.unwrap().kind, StageErrorKind::Uncategorized);
        assert!(StageOutcome::skipped("x").error.is_none());
    }
}
