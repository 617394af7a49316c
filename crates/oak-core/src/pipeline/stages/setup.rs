use crate::error::Result;
use crate::io;
use crate::paths;
use crate::pipeline::context::{FlowType, PipelineContext};
use crate::pipeline::ordering;
use crate::pipeline::stage::{Stage, StageOutcome};

pub fn stages() -> Vec<Box<dyn Stage>> {
    vec![Box::new(ValidateEnvironment), Box::new(CreateOakDir)]
}

/// Project root exists and accepts writes.
pub struct ValidateEnvironment;

impl Stage for ValidateEnvironment {
    fn name(&self) -> &str {
        "validate_environment"
    }

    fn display_name(&self) -> &str {
        "Validating environment"
    }

    fn order(&self) -> u32 {
        ordering::VALIDATE_ENVIRONMENT
    }

    fn applicable_flows(&self) -> &[FlowType] {
        FlowType::INIT_FLOWS
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let root = ctx.project_root();
        if !root.is_dir() {
            return Ok(StageOutcome::failed(
                "Project directory does not exist",
                root.display().to_string(),
            ));
        }
        let probe = root.join(paths::WRITE_PROBE_FILE);
        if let Err(e) = std::fs::write(&probe, b"") {
            return Ok(StageOutcome::failed(
                "Cannot write to project directory",
                e.to_string(),
            ));
        }
        io::remove_file_if_exists(&probe)?;
        Ok(StageOutcome::success("Environment OK"))
    }
}

pub struct CreateOakDir;

impl Stage for CreateOakDir {
    fn name(&self) -> &str {
        "create_oak_dir"
    }

    fn display_name(&self) -> &str {
        "Creating .oak directory"
    }

    fn order(&self) -> u32 {
        ordering::CREATE_OAK_DIR
    }

    fn applicable_flows(&self) -> &[FlowType] {
        &[FlowType::FreshInit, FlowType::ForceReinit]
    }

    fn applies(&self, ctx: &PipelineContext) -> bool {
        ctx.is_force_reinit() || !ctx.oak_dir().is_dir()
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        io::ensure_dir(&ctx.oak_dir())?;
        Ok(StageOutcome::success("Created .oak/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stage::StageResult;
    use tempfile::TempDir;

    #[test]
    fn missing_root_fails() {
        let dir = TempDir::new().unwrap();
        let mut ctx = PipelineContext::new(&dir.path().join("nope"), FlowType::FreshInit);
        let outcome = ValidateEnvironment.execute(&mut ctx);
        assert_eq!(outcome.result, StageResult::Failed);
        assert_eq!(outcome.message, "Project directory does not exist");
    }

    #[test]
    fn writable_root_passes_and_leaves_no_probe() {
        let dir = TempDir::new().unwrap();
        let mut ctx = PipelineContext::new(dir.path(), FlowType::FreshInit);
        assert!(ValidateEnvironment.execute(&mut ctx).is_success());
        assert!(!dir.path().join(paths::WRITE_PROBE_FILE).exists());
    }

    #[test]
    fn oak_dir_is_created_once_unless_forced() {
        let dir = TempDir::new().unwrap();
        let mut ctx = PipelineContext::new(dir.path(), FlowType::FreshInit);
        assert!(CreateOakDir.should_run(&ctx));
        CreateOakDir.execute(&mut ctx);
        assert!(dir.path().join(".oak").is_dir());
        assert!(!CreateOakDir.should_run(&ctx));

        let forced = PipelineContext::new(dir.path(), FlowType::ForceReinit);
        assert!(CreateOakDir.should_run(&forced));
    }
}
