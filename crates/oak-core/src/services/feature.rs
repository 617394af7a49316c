use crate::error::{OakError, Result};
use crate::services::agent::{agent_definition, AgentService};
use crate::services::config::ConfigService;
use crate::services::skill::SkillService;
use crate::services::template::TemplateRenderer;
use crate::state::StateLedger;
use crate::{io, migrations, paths, templates};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Lifecycle events a feature can react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Hook {
    AgentsChanged,
    IdesChanged,
    InitComplete,
    PreRemove,
    PreUpgrade,
    PostUpgrade,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Hook::AgentsChanged => "on_agents_changed",
            Hook::IdesChanged => "on_ides_changed",
            Hook::InitComplete => "on_init_complete",
            Hook::PreRemove => "on_pre_remove",
            Hook::PreUpgrade => "on_pre_upgrade",
            Hook::PostUpgrade => "on_post_upgrade",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureManifest {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub dependencies: &'static [&'static str],
    pub commands: &'static [&'static str],
    pub skills: &'static [&'static str],
    pub hooks: &'static [Hook],
}

pub const FEATURES: &[FeatureManifest] = &[
    FeatureManifest {
        name: "constitution",
        display_name: "Constitution",
        description: "Engineering standards every agent reads first",
        dependencies: &[],
        commands: &[
            "constitution-create",
            "constitution-validate",
            "constitution-amend",
        ],
        skills: &[],
        hooks: &[Hook::AgentsChanged, Hook::InitComplete, Hook::PostUpgrade],
    },
    FeatureManifest {
        name: "rfc",
        display_name: "RFCs",
        description: "Draft, list and validate RFCs",
        dependencies: &["constitution"],
        commands: &["rfc-create", "rfc-list", "rfc-validate"],
        skills: &[],
        hooks: &[],
    },
    FeatureManifest {
        name: "issues",
        display_name: "Issues",
        description: "Plan, implement and validate tracked issues",
        dependencies: &["constitution"],
        commands: &["issue-plan", "issue-implement", "issue-validate"],
        skills: &["planning-workflow", "research-synthesis"],
        hooks: &[Hook::InitComplete],
    },
];

pub fn feature_manifest(name: &str) -> Result<&'static FeatureManifest> {
    FEATURES
        .iter()
        .find(|f| f.name == name)
        .ok_or_else(|| OakError::UnknownFeature(name.to_string()))
}

pub fn feature_names() -> Vec<&'static str> {
    FEATURES.iter().map(|f| f.name).collect()
}

/// Outcome of one feature's hook handler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HookReport {
    pub feature: String,
    pub hook: Hook,
    pub success: bool,
    pub message: String,
}

// ---------------------------------------------------------------------------
// FeatureService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FeatureService {
    root: PathBuf,
    config: ConfigService,
    agents: AgentService,
    skills: SkillService,
    renderer: TemplateRenderer,
    ledger: StateLedger,
}

impl FeatureService {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            config: ConfigService::new(root),
            agents: AgentService::new(root),
            skills: SkillService::new(root),
            renderer: TemplateRenderer,
            ledger: StateLedger::new(root),
        }
    }

    pub fn manifest(&self, name: &str) -> Result<&'static FeatureManifest> {
        feature_manifest(name)
    }

    /// Transitive dependencies of `name`, dependencies first, excluding `name`.
    pub fn all_dependencies(&self, name: &str) -> Result<Vec<String>> {
        let mut out = Vec::new();
        let mut visiting = BTreeSet::new();
        visit(name, &mut visiting, &mut out)?;
        out.retain(|f| f != name);
        Ok(out)
    }

    /// Expand `names` with their dependencies. Each feature appears once and
    /// after everything it depends on. Unknown names are rejected.
    pub fn resolve_dependencies(&self, names: &[String]) -> Result<Vec<String>> {
        let mut out = Vec::new();
        let mut visiting = BTreeSet::new();
        for name in names {
            visit(name, &mut visiting, &mut out)?;
        }
        Ok(out)
    }

    /// Members of `among` that depend on `name`, directly or transitively.
    pub fn features_requiring(&self, name: &str, among: &[String]) -> Result<Vec<String>> {
        let mut dependents = Vec::new();
        for other in among.iter().filter(|f| *f != name) {
            if self.all_dependencies(other)?.iter().any(|d| d == name) {
                dependents.push(other.clone());
            }
        }
        Ok(dependents)
    }

    /// Whether `name` can go while `remaining` stay enabled, with the blockers.
    pub fn can_remove_feature(
        &self,
        name: &str,
        remaining: &[String],
    ) -> Result<(bool, Vec<String>)> {
        let blockers = self.features_requiring(name, remaining)?;
        Ok((blockers.is_empty(), blockers))
    }

    pub fn render_command(&self, feature: &str, command: &str, agent: &str) -> Result<String> {
        let manifest = feature_manifest(feature)?;
        if !manifest.commands.contains(&command) {
            return Err(OakError::InvalidValue {
                field: "command".to_string(),
                reason: format!("'{command}' is not part of feature '{feature}'"),
            });
        }
        let template = templates::command_template(command).ok_or_else(|| {
            OakError::InvalidValue {
                field: "command".to_string(),
                reason: format!("no template for '{command}'"),
            }
        })?;
        let config = self.config.load()?;
        let def = agent_definition(agent)?;
        let caps = self.agents.capabilities(agent, &config)?;
        let vars = self.renderer.agent_context(def, &caps);
        Ok(self.renderer.render(template, &vars))
    }

    /// Render and write the feature's command files for each agent.
    pub fn install_feature_commands(&self, name: &str, agents: &[String]) -> Result<usize> {
        let manifest = feature_manifest(name)?;
        let mut written = 0;
        for agent in agents {
            for command in manifest.commands {
                let content = self.render_command(name, command, agent)?;
                self.agents.install_command(agent, command, &content)?;
                written += 1;
            }
        }
        Ok(written)
    }

    /// Write the feature's commands for each agent, enable it in the config,
    /// and install its skills. Returns the number of command files written.
    pub fn install_feature(&self, name: &str, agents: &[String]) -> Result<usize> {
        let manifest = feature_manifest(name)?;
        let written = self.install_feature_commands(name, agents)?;
        self.config.enable_feature(name)?;
        if !manifest.skills.is_empty() && self.config.load()?.skills.auto_install {
            self.skills.install_skills_for_feature(name)?;
        }
        tracing::debug!(feature = name, files = written, "feature installed");
        Ok(written)
    }

    /// Delete the feature's command files, disable it, and drop its skills.
    /// Returns the number of command files removed.
    pub fn remove_feature(&self, name: &str, agents: &[String]) -> Result<usize> {
        let manifest = feature_manifest(name)?;
        let mut removed = Vec::new();
        for agent in agents {
            let dir = self.agents.commands_dir(agent)?;
            for command in manifest.commands {
                let path = self.agents.command_path(agent, command)?;
                if io::remove_file_if_exists(&path)? {
                    removed.push(path);
                }
            }
            io::prune_empty_dirs(&dir, &self.root)?;
        }
        self.ledger.forget_created_files(&removed)?;
        self.config.disable_feature(name)?;
        self.skills.remove_skills_for_feature(name)?;
        tracing::debug!(feature = name, files = removed.len(), "feature removed");
        Ok(removed.len())
    }

    // -----------------------------------------------------------------------
    // Hooks
    // -----------------------------------------------------------------------

    pub fn on_agents_changed(&self) -> Result<Vec<HookReport>> {
        self.trigger(Hook::AgentsChanged)
    }

    pub fn on_ides_changed(&self) -> Result<Vec<HookReport>> {
        self.trigger(Hook::IdesChanged)
    }

    pub fn on_init_complete(&self) -> Result<Vec<HookReport>> {
        self.trigger(Hook::InitComplete)
    }

    pub fn on_pre_remove(&self) -> Result<Vec<HookReport>> {
        self.trigger(Hook::PreRemove)
    }

    pub fn on_pre_upgrade(&self) -> Result<Vec<HookReport>> {
        self.trigger(Hook::PreUpgrade)
    }

    pub fn on_post_upgrade(&self) -> Result<Vec<HookReport>> {
        self.trigger(Hook::PostUpgrade)
    }

    /// Run `hook` for each enabled feature that declares it. A failing
    /// handler is reported, not propagated.
    fn trigger(&self, hook: Hook) -> Result<Vec<HookReport>> {
        let config = self.config.load()?;
        let mut reports = Vec::new();
        for name in &config.features.enabled {
            let Ok(manifest) = feature_manifest(name) else {
                tracing::warn!(feature = %name, "enabled feature is not registered");
                continue;
            };
            if !manifest.hooks.contains(&hook) {
                continue;
            }
            let report = match self.run_hook(manifest.name, hook, &config.agents) {
                Ok(message) => HookReport {
                    feature: name.clone(),
                    hook,
                    success: true,
                    message,
                },
                Err(e) => {
                    tracing::warn!(feature = %name, %hook, error = %e, "hook failed");
                    HookReport {
                        feature: name.clone(),
                        hook,
                        success: false,
                        message: e.to_string(),
                    }
                }
            };
            reports.push(report);
        }
        Ok(reports)
    }

    fn run_hook(&self, feature: &str, hook: Hook, agents: &[String]) -> Result<String> {
        match (feature, hook) {
            ("constitution", Hook::AgentsChanged | Hook::InitComplete | Hook::PostUpgrade) => {
                let config = self.config.load()?;
                let constitution = paths::constitution_path(&self.root, &config.constitution.directory);
                if !constitution.is_file() {
                    return Ok("No constitution yet".to_string());
                }
                let touched = self.agents.update_instruction_files(agents, &constitution)?;
                Ok(format!("Updated {} instruction file(s)", touched.len()))
            }
            ("issues", Hook::InitComplete) => {
                let changed = io::ensure_gitignore_entry(&self.root, migrations::ISSUE_CONTEXT_IGNORE)?;
                Ok(if changed {
                    "Added issue context to .gitignore".to_string()
                } else {
                    ".gitignore already covers issue context".to_string()
                })
            }
            _ => Ok(format!("{hook}: nothing to do")),
        }
    }
}

fn visit(name: &str, visiting: &mut BTreeSet<String>, out: &mut Vec<String>) -> Result<()> {
    if out.iter().any(|f| f == name) {
        return Ok(());
    }
    let manifest = feature_manifest(name)?;
    if !visiting.insert(name.to_string()) {
        return Err(OakError::InvalidValue {
            field: "features".to_string(),
            reason: format!("dependency cycle through '{name}'"),
        });
    }
    for dep in manifest.dependencies {
        visit(dep, visiting, out)?;
    }
    visiting.remove(name);
    out.push(name.to_string());
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn setup(agents: &[&str]) -> (TempDir, FeatureService) {
        let dir = TempDir::new().unwrap();
        ConfigService::new(dir.path())
            .create_default(&strings(agents), &[], &[])
            .unwrap();
        let svc = FeatureService::new(dir.path());
        (dir, svc)
    }

    #[test]
    fn dependencies_come_first() {
        let (_dir, svc) = setup(&[]);
        assert_eq!(
            svc.resolve_dependencies(&strings(&["rfc"])).unwrap(),
            vec!["constitution", "rfc"]
        );
        assert_eq!(
            svc.resolve_dependencies(&strings(&["issues", "rfc", "constitution"]))
                .unwrap(),
            vec!["constitution", "issues", "rfc"]
        );
    }

    #[test]
    fn unknown_feature_is_rejected() {
        let (_dir, svc) = setup(&[]);
        assert!(matches!(
            svc.resolve_dependencies(&strings(&["nope"])),
            Err(OakError::UnknownFeature(_))
        ));
    }

    #[test]
    fn constitution_is_blocked_by_dependents() {
        let (_dir, svc) = setup(&[]);
        let (ok, blockers) = svc
            .can_remove_feature("constitution", &strings(&["rfc", "issues"]))
            .unwrap();
        assert!(!ok);
        assert_eq!(blockers, vec!["rfc", "issues"]);
        let (ok, _) = svc.can_remove_feature("rfc", &strings(&["constitution"])).unwrap();
        assert!(ok);
    }

    #[test]
    fn render_fills_agent_details() {
        let (_dir, svc) = setup(&["codex"]);
        let body = svc.render_command("rfc", "rfc-create", "codex").unwrap();
        assert!(body.contains("Codex CLI"));
        assert!(body.contains("/prompts:oak.rfc-validate"));
        assert!(svc.render_command("rfc", "issue-plan", "codex").is_err());
    }

    #[test]
    fn install_and_remove_feature() {
        let (dir, svc) = setup(&["claude", "copilot"]);
        assert_eq!(svc.install_feature("issues", &strings(&["claude", "copilot"])).unwrap(), 6);
        assert!(dir.path().join(".claude/commands/oak.issue-plan.md").exists());
        assert!(dir.path().join(".github/agents/oak.issue-plan.agent.md").exists());
        assert!(dir.path().join(".claude/skills/planning-workflow/SKILL.md").exists());
        let config = ConfigService::new(dir.path()).load().unwrap();
        assert_eq!(config.features.enabled, vec!["issues"]);
        assert_eq!(config.skills.installed.len(), 2);

        assert_eq!(svc.remove_feature("issues", &strings(&["claude", "copilot"])).unwrap(), 6);
        assert!(!dir.path().join(".claude").exists());
        assert!(!dir.path().join(".github").exists());
        let config = ConfigService::new(dir.path()).load().unwrap();
        assert!(config.features.enabled.is_empty());
        assert!(config.skills.installed.is_empty());
    }

    #[test]
    fn hooks_run_only_for_declaring_features() {
        let (dir, svc) = setup(&["claude"]);
        ConfigService::new(dir.path())
            .update_features(&strings(&["constitution", "issues"]))
            .unwrap();

        let reports = svc.on_init_complete().unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.success));
        assert_eq!(reports[0].message, "No constitution yet");
        let gitignore = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert!(gitignore.contains("oak/issue/**/context.json"));

        assert!(svc.on_ides_changed().unwrap().is_empty());
    }

    #[test]
    fn constitution_hook_links_instruction_files() {
        let (dir, svc) = setup(&["claude"]);
        ConfigService::new(dir.path())
            .update_features(&strings(&["constitution"]))
            .unwrap();
        std::fs::create_dir_all(dir.path().join("oak")).unwrap();
        std::fs::write(dir.path().join("oak/constitution.md"), "# Constitution").unwrap();

        let reports = svc.on_agents_changed().unwrap();
        assert_eq!(reports[0].message, "Updated 1 instruction file(s)");
        let claude_md = std::fs::read_to_string(dir.path().join(".claude/CLAUDE.md")).unwrap();
        assert!(claude_md.contains("[oak/constitution.md](oak/constitution.md)"));
    }
}
