//! Stage-based pipeline that drives `init`, `upgrade` and `remove`.

pub mod builder;
pub mod context;
pub mod executor;
pub mod ordering;
pub mod stage;
pub mod stages;

pub use builder::{build_init_pipeline, build_remove_pipeline, build_upgrade_pipeline, PipelineBuilder};
pub use context::{FlowType, PipelineContext, RemovalOptions, RemovalPlan, SelectionState, StageData};
pub use executor::{Pipeline, PipelineResult};
pub use stage::{Stage, StageError, StageErrorKind, StageLifecycle, StageOutcome, StageResult};
