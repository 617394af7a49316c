#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const CLAUDE_COMMAND: &str = ".claude/commands/oak.constitution-create.md";

fn oak(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("oak").unwrap();
    cmd.current_dir(dir.path()).env("OAK_ROOT", dir.path());
    cmd
}

fn init_project(dir: &TempDir) {
    oak(dir)
        .args(["init", "--agent", "claude", "--no-interactive"])
        .assert()
        .success();
}

fn read(dir: &TempDir, rel: &str) -> String {
    std::fs::read_to_string(dir.path().join(rel)).unwrap()
}

fn config(dir: &TempDir) -> serde_yaml::Value {
    serde_yaml::from_str(&read(dir, ".oak/config.yaml")).unwrap()
}

fn yaml_list(value: &serde_yaml::Value, key: &str) -> Vec<String> {
    value[key]
        .as_sequence()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// oak init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_oak_tree() {
    let dir = TempDir::new().unwrap();
    oak(&dir)
        .args(["init", "--agent", "claude", "--feature", "constitution", "--no-interactive"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initializing oak in:"))
        .stdout(predicate::str::contains("✓ Creating configuration"));

    assert!(dir.path().join(".oak").is_dir());
    assert!(dir.path().join(".oak/config.yaml").exists());
    assert!(dir.path().join(".oak/state.yaml").exists());
    assert!(dir.path().join(CLAUDE_COMMAND).exists());
    assert!(!dir.path().join(".claude/commands/oak.rfc-create.md").exists());

    let cfg = config(&dir);
    assert_eq!(yaml_list(&cfg, "agents"), vec!["claude"]);
    assert_eq!(yaml_list(&cfg["features"], "enabled"), vec!["constitution"]);
}

#[test]
fn fresh_init_enables_every_feature_by_default() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    let cfg = config(&dir);
    assert_eq!(
        yaml_list(&cfg["features"], "enabled"),
        vec!["constitution", "rfc", "issues"]
    );
    assert!(dir.path().join(".claude/commands/oak.issue-plan.md").exists());
    assert!(dir
        .path()
        .join(".claude/skills/planning-workflow/SKILL.md")
        .exists());
    let gitignore = read(&dir, ".gitignore");
    assert!(gitignore.contains("oak/issue/**/context.json"));
}

#[test]
fn second_init_is_an_update() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    oak(&dir)
        .args(["init", "--no-interactive"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Updating oak in:"))
        .stdout(predicate::str::contains("oak configuration updated."));

    assert_eq!(yaml_list(&config(&dir), "agents"), vec!["claude"]);
}

#[test]
fn init_adds_and_drops_agents() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    oak(&dir)
        .args(["init", "--agent", "claude", "--agent", "codex", "--no-interactive"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Installed commands for 1 new agent(s)"));
    assert!(dir
        .path()
        .join(".codex/prompts/oak.constitution-create.md")
        .exists());
    assert_eq!(yaml_list(&config(&dir), "agents"), vec!["claude", "codex"]);

    oak(&dir)
        .args(["init", "--agent", "codex", "--no-interactive"])
        .assert()
        .success();
    assert!(!dir.path().join(CLAUDE_COMMAND).exists());
    assert!(dir
        .path()
        .join(".codex/prompts/oak.constitution-create.md")
        .exists());
}

#[test]
fn init_with_ide_writes_settings() {
    let dir = TempDir::new().unwrap();
    oak(&dir)
        .args(["init", "--agent", "claude", "--ide", "vscode", "--no-interactive"])
        .assert()
        .success();
    let settings: serde_json::Value =
        serde_json::from_str(&read(&dir, ".vscode/settings.json")).unwrap();
    assert!(settings.get("chat.promptFilesRecommendations").is_some());
}

#[test]
fn init_rejects_unknown_names() {
    let dir = TempDir::new().unwrap();
    oak(&dir)
        .args(["init", "--agent", "vim"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("unknown agent 'vim'"));
    oak(&dir)
        .args(["init", "--ide", "emacs"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown IDE 'emacs'"));
    assert!(!dir.path().join(".oak").exists());
}

#[test]
fn init_json_reports_pipeline_result() {
    let dir = TempDir::new().unwrap();
    let out = oak(&dir)
        .args(["--json", "init", "--agent", "claude"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(report["success"], true);
    assert!(report["stages_failed"].as_array().unwrap().is_empty());
    let run = report["stages_run"].as_array().unwrap();
    assert!(run.iter().any(|s| s == "create_oak_dir"));
}

#[test]
fn init_finishes_an_interrupted_install() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join(".oak")).unwrap();

    oak(&dir)
        .args(["init", "--agent", "claude", "--feature", "constitution", "--no-interactive"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initializing oak in:"))
        .stdout(predicate::str::contains("oak initialized successfully."));

    assert!(dir.path().join(".oak/config.yaml").exists());
    assert!(dir.path().join(".oak/state.yaml").exists());
    assert!(dir.path().join(CLAUDE_COMMAND).exists());
    assert_eq!(yaml_list(&config(&dir), "agents"), vec!["claude"]);
}

#[test]
fn force_reinit_restores_deleted_commands() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    std::fs::remove_file(dir.path().join(CLAUDE_COMMAND)).unwrap();
    oak(&dir)
        .args(["init", "--force", "--no-interactive"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reinstalling oak in:"));
    assert!(dir.path().join(CLAUDE_COMMAND).exists());
}

// ---------------------------------------------------------------------------
// oak status
// ---------------------------------------------------------------------------

#[test]
fn status_requires_init() {
    let dir = TempDir::new().unwrap();
    oak(&dir)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

#[test]
fn status_lists_selections_and_counts() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    oak(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("claude"))
        .stdout(predicate::str::contains("constitution, rfc, issues"))
        .stdout(predicate::str::contains("applied migrations"));

    let out = oak(&dir)
        .args(["status", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let status: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(status["agents"][0], "claude");
    assert!(status["created_files"].as_u64().unwrap() > 0);
    assert_eq!(status["migrations"], 6);
}

// ---------------------------------------------------------------------------
// oak upgrade
// ---------------------------------------------------------------------------

#[test]
fn upgrade_requires_init() {
    let dir = TempDir::new().unwrap();
    oak(&dir)
        .arg("upgrade")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

#[test]
fn upgrade_on_fresh_install_is_a_no_op() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    oak(&dir)
        .arg("upgrade")
        .assert()
        .success()
        .stdout(predicate::str::contains("Already up to date"));
}

#[test]
fn upgrade_dry_run_changes_nothing() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    std::fs::write(dir.path().join(CLAUDE_COMMAND), "stale\n").unwrap();

    oak(&dir)
        .args(["upgrade", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("oak.constitution-create.md"))
        .stdout(predicate::str::contains("Dry run: no changes made."));
    assert_eq!(read(&dir, CLAUDE_COMMAND), "stale\n");
}

#[test]
fn upgrade_rewrites_drifted_commands() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    std::fs::write(dir.path().join(CLAUDE_COMMAND), "stale\n").unwrap();

    oak(&dir)
        .args(["upgrade", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Upgrade complete."));
    assert_ne!(read(&dir, CLAUDE_COMMAND), "stale\n");

    oak(&dir)
        .arg("upgrade")
        .assert()
        .success()
        .stdout(predicate::str::contains("Already up to date"));
}

#[test]
fn upgrade_templates_only_leaves_commands_alone() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    std::fs::write(dir.path().join(CLAUDE_COMMAND), "stale\n").unwrap();

    oak(&dir)
        .args(["upgrade", "--templates"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Already up to date"));
    assert_eq!(read(&dir, CLAUDE_COMMAND), "stale\n");
}

// ---------------------------------------------------------------------------
// oak remove
// ---------------------------------------------------------------------------

#[test]
fn remove_without_force_refuses_when_not_interactive() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    oak(&dir)
        .arg("remove")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
    assert!(dir.path().join(".oak").is_dir());
}

#[test]
fn remove_cleans_up_installed_files() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    oak(&dir)
        .args(["remove", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("oak removed."));

    assert!(!dir.path().join(".oak").exists());
    assert!(!dir.path().join(CLAUDE_COMMAND).exists());
    assert!(!dir.path().join(".claude").exists());
}

#[test]
fn remove_keeps_files_the_user_changed() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    std::fs::write(dir.path().join(CLAUDE_COMMAND), "my own version\n").unwrap();

    oak(&dir)
        .args(["remove", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Kept files you changed:"));
    assert_eq!(read(&dir, CLAUDE_COMMAND), "my own version\n");
    assert!(!dir.path().join(".oak").exists());
}

#[test]
fn remove_keep_ide_settings() {
    let dir = TempDir::new().unwrap();
    oak(&dir)
        .args(["init", "--agent", "claude", "--ide", "vscode", "--no-interactive"])
        .assert()
        .success();
    oak(&dir)
        .args(["remove", "--force", "--keep-ide-settings"])
        .assert()
        .success();
    assert!(dir.path().join(".vscode/settings.json").exists());
}

#[test]
fn remove_when_not_installed_fails() {
    let dir = TempDir::new().unwrap();
    oak(&dir)
        .args(["remove", "--force"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not installed"));
}
