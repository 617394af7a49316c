//! Concrete stages, one module per group. Each module exposes `stages()`
//! returning its stages in registration order.

pub mod agents;
pub mod config;
pub mod features;
pub mod finalization;
pub mod hooks;
pub mod ide;
pub mod removal;
pub mod setup;
pub mod skills;
pub mod upgrade;

use crate::services::HookReport;

/// `"Ran ok/total <what>"` for a batch of hook reports.
pub(crate) fn hook_summary(reports: &[HookReport], what: &str) -> String {
    let ok = reports.iter().filter(|r| r.success).count();
    format!("Ran {ok}/{} {what}", reports.len())
}

/// `"Upgraded N <noun>(s)"` with a failure count when there were failures.
pub(crate) fn upgrade_summary(upgraded: usize, failed: usize, noun: &str) -> String {
    if failed == 0 {
        format!("Upgraded {upgraded} {noun}(s)")
    } else {
        format!("Upgraded {upgraded} {noun}(s), {failed} failed")
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{run_init, strings};
    use crate::paths;
    use crate::pipeline::context::{FlowType, StageData};
    use tempfile::TempDir;

    #[test]
    fn fresh_init_creates_oak_dir_and_config() {
        let dir = TempDir::new().unwrap();
        let (ctx, result) = run_init(
            dir.path(),
            FlowType::FreshInit,
            &["claude"],
            &[],
            &["constitution"],
        );
        assert!(result.success, "{result:?}");
        assert!(result.stages_failed.is_empty());
        assert!(paths::oak_dir(dir.path()).is_dir());
        assert!(paths::config_path(dir.path()).is_file());
        assert!(dir
            .path()
            .join(".claude/commands/oak.constitution-create.md")
            .exists());
        let config = ctx.services.config.load().unwrap();
        assert_eq!(config.agents, strings(&["claude"]));
        assert_eq!(config.features.enabled, strings(&["constitution"]));
    }

    #[test]
    fn adding_an_agent_installs_only_its_commands() {
        let dir = TempDir::new().unwrap();
        let (_, result) = run_init(
            dir.path(),
            FlowType::FreshInit,
            &["claude"],
            &[],
            &["constitution"],
        );
        assert!(result.success);

        let (ctx, result) = run_init(
            dir.path(),
            FlowType::Update,
            &["claude", "codex"],
            &[],
            &["constitution"],
        );
        assert!(result.success, "{result:?}");
        assert!(result.stages_run.iter().any(|s| s == "install_agent_commands"));
        assert!(result.stages_skipped.iter().any(|s| s == "remove_agent_commands"));
        assert!(result.stages_skipped.iter().any(|s| s == "install_features"));
        match ctx.result("install_agent_commands") {
            Some(StageData::AgentCommandsInstalled(agents)) => {
                assert_eq!(agents, &strings(&["codex"]))
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert!(dir
            .path()
            .join(".codex/prompts/oak.constitution-create.md")
            .exists());
        assert_eq!(
            ctx.services.config.load().unwrap().agents,
            strings(&["claude", "codex"])
        );
    }

    #[test]
    fn rerun_without_changes_touches_nothing() {
        let dir = TempDir::new().unwrap();
        run_init(dir.path(), FlowType::FreshInit, &["claude"], &[], &["constitution"]);
        let (_, result) = run_init(
            dir.path(),
            FlowType::Update,
            &["claude"],
            &[],
            &["constitution"],
        );
        assert!(result.success);
        for stage in [
            "install_agent_commands",
            "remove_agent_commands",
            "install_features",
            "remove_features",
            "update_version",
        ] {
            assert!(!result.stages_run.iter().any(|s| s == stage), "{stage} ran");
        }
    }

    #[test]
    fn dropping_a_feature_removes_its_commands() {
        let dir = TempDir::new().unwrap();
        run_init(
            dir.path(),
            FlowType::FreshInit,
            &["claude"],
            &[],
            &["constitution", "rfc"],
        );
        assert!(dir.path().join(".claude/commands/oak.rfc-create.md").exists());

        let (ctx, result) = run_init(
            dir.path(),
            FlowType::Update,
            &["claude"],
            &[],
            &["constitution"],
        );
        assert!(result.success, "{result:?}");
        assert!(result.stages_run.iter().any(|s| s == "remove_features"));
        assert!(!dir.path().join(".claude/commands/oak.rfc-create.md").exists());
        assert!(dir
            .path()
            .join(".claude/commands/oak.constitution-create.md")
            .exists());
        assert_eq!(
            ctx.services.config.load().unwrap().features.enabled,
            strings(&["constitution"])
        );
    }
}
