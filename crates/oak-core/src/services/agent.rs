use crate::config::{AgentCapabilitiesConfig, OakConfig};
use crate::error::{OakError, Result};
use crate::state::StateLedger;
use crate::{io, paths, templates};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Static description of a supported coding agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentDefinition {
    pub name: &'static str,
    pub display_name: &'static str,
    /// Top-level folder the agent reads, e.g. `.claude`.
    pub folder: &'static str,
    /// Commands directory relative to `folder`.
    pub commands_subdir: &'static str,
    pub file_extension: &'static str,
    /// Instruction file relative to the project root.
    pub instruction_file: &'static str,
    /// Skills directory relative to `folder`, for agents that load skills.
    pub skills_subdir: Option<&'static str>,
    pub has_background_agents: bool,
    pub has_native_web: bool,
    pub has_mcp: bool,
    /// How a user invokes an installed command, prefixed to `oak.<cmd>`.
    pub command_prefix: &'static str,
}

pub const AGENTS: &[AgentDefinition] = &[
    AgentDefinition {
        name: "claude",
        display_name: "Claude Code",
        folder: ".claude",
        commands_subdir: "commands",
        file_extension: ".md",
        instruction_file: ".claude/CLAUDE.md",
        skills_subdir: Some("skills"),
        has_background_agents: true,
        has_native_web: true,
        has_mcp: true,
        command_prefix: "/",
    },
    AgentDefinition {
        name: "copilot",
        display_name: "GitHub Copilot",
        folder: ".github",
        commands_subdir: "agents",
        file_extension: ".agent.md",
        instruction_file: ".github/copilot-instructions.md",
        skills_subdir: None,
        has_background_agents: false,
        has_native_web: false,
        has_mcp: true,
        command_prefix: "@",
    },
    AgentDefinition {
        name: "codex",
        display_name: "Codex CLI",
        folder: ".codex",
        commands_subdir: "prompts",
        file_extension: ".md",
        instruction_file: "AGENTS.md",
        skills_subdir: Some("skills"),
        has_background_agents: false,
        has_native_web: false,
        has_mcp: true,
        command_prefix: "/prompts:",
    },
    AgentDefinition {
        name: "cursor",
        display_name: "Cursor",
        folder: ".cursor",
        commands_subdir: "commands",
        file_extension: ".md",
        instruction_file: "AGENTS.md",
        skills_subdir: None,
        has_background_agents: true,
        has_native_web: true,
        has_mcp: true,
        command_prefix: "/",
    },
    AgentDefinition {
        name: "gemini",
        display_name: "Gemini CLI",
        folder: ".gemini",
        commands_subdir: "commands",
        file_extension: ".md",
        instruction_file: "GEMINI.md",
        skills_subdir: None,
        has_background_agents: false,
        has_native_web: true,
        has_mcp: true,
        command_prefix: "/",
    },
    AgentDefinition {
        name: "windsurf",
        display_name: "Windsurf",
        folder: ".windsurf",
        commands_subdir: "commands",
        file_extension: ".md",
        instruction_file: ".windsurf/rules/rules.md",
        skills_subdir: None,
        has_background_agents: false,
        has_native_web: true,
        has_mcp: true,
        command_prefix: "/",
    },
];

pub const CONSTITUTION_MARKER: &str = "## Project Constitution";

pub fn agent_definition(name: &str) -> Result<&'static AgentDefinition> {
    AGENTS
        .iter()
        .find(|a| a.name == name)
        .ok_or_else(|| OakError::UnknownAgent(name.to_string()))
}

pub fn agent_names() -> Vec<&'static str> {
    AGENTS.iter().map(|a| a.name).collect()
}

/// Resolved capabilities: catalog defaults overlaid with config overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentCapabilities {
    pub has_skills: bool,
    pub has_background_agents: bool,
    pub has_native_web: bool,
    pub has_mcp: bool,
    pub research_strategy: String,
}

impl AgentDefinition {
    pub fn has_skills(&self) -> bool {
        self.skills_subdir.is_some()
    }

    pub fn default_capabilities(&self) -> AgentCapabilities {
        let research_strategy = if self.has_background_agents && self.has_native_web {
            "Research in parallel with background agents and web search, then synthesise."
        } else if self.has_native_web {
            "Use web search to gather background before writing."
        } else if self.has_mcp {
            "Use configured MCP tools to gather background before writing."
        } else {
            "Rely on the repository contents and ask the user for missing context."
        };
        AgentCapabilities {
            has_skills: self.has_skills(),
            has_background_agents: self.has_background_agents,
            has_native_web: self.has_native_web,
            has_mcp: self.has_mcp,
            research_strategy: research_strategy.to_string(),
        }
    }

    /// Capabilities block written into `config.yaml` for a newly selected agent.
    pub fn capabilities_config(&self) -> AgentCapabilitiesConfig {
        let caps = self.default_capabilities();
        AgentCapabilitiesConfig {
            has_skills: None,
            has_background_agents: Some(caps.has_background_agents),
            has_native_web: Some(caps.has_native_web),
            has_mcp: Some(caps.has_mcp),
            research_strategy: Some(caps.research_strategy),
        }
    }
}

// ---------------------------------------------------------------------------
// AgentService
// ---------------------------------------------------------------------------

/// Manages per-agent command files and instruction files.
#[derive(Debug, Clone)]
pub struct AgentService {
    root: PathBuf,
    ledger: StateLedger,
}

impl AgentService {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            ledger: StateLedger::new(root),
        }
    }

    pub fn commands_dir(&self, agent: &str) -> Result<PathBuf> {
        let def = agent_definition(agent)?;
        Ok(self.root.join(def.folder).join(def.commands_subdir))
    }

    pub fn skills_dir(&self, agent: &str) -> Result<Option<PathBuf>> {
        let def = agent_definition(agent)?;
        Ok(def.skills_subdir.map(|sub| self.root.join(def.folder).join(sub)))
    }

    pub fn command_filename(&self, agent: &str, command: &str) -> Result<String> {
        let def = agent_definition(agent)?;
        Ok(format!("oak.{command}{}", def.file_extension))
    }

    pub fn command_path(&self, agent: &str, command: &str) -> Result<PathBuf> {
        Ok(self
            .commands_dir(agent)?
            .join(self.command_filename(agent, command)?))
    }

    pub fn create_commands_dir(&self, agent: &str) -> Result<PathBuf> {
        let dir = self.commands_dir(agent)?;
        if !dir.is_dir() {
            io::ensure_dir(&dir)?;
            self.ledger.record_created_directory(&dir)?;
        }
        Ok(dir)
    }

    /// Write `oak.<command>` for `agent` and record it in the ledger.
    pub fn install_command(&self, agent: &str, command: &str, content: &str) -> Result<PathBuf> {
        self.create_commands_dir(agent)?;
        let path = self.command_path(agent, command)?;
        io::atomic_write(&path, content.as_bytes())?;
        self.ledger.record_created_file(&path, content)?;
        Ok(path)
    }

    /// Names of the oak command files currently present for `agent`.
    pub fn list_agent_commands(&self, agent: &str) -> Result<Vec<String>> {
        let def = agent_definition(agent)?;
        let dir = self.commands_dir(agent)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if name.starts_with("oak.") && name.ends_with(def.file_extension) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Delete every oak command file for `agent` and prune the directories
    /// left empty. Returns the number of files removed.
    pub fn remove_agent_commands(&self, agent: &str) -> Result<usize> {
        let dir = self.commands_dir(agent)?;
        let removed: Vec<PathBuf> = self
            .list_agent_commands(agent)?
            .into_iter()
            .map(|name| dir.join(name))
            .collect();
        for path in &removed {
            io::remove_file_if_exists(path)?;
        }
        self.ledger.forget_created_files(&removed)?;
        io::prune_empty_dirs(&dir, &self.root)?;
        Ok(removed.len())
    }

    pub fn capabilities(&self, agent: &str, config: &OakConfig) -> Result<AgentCapabilities> {
        let def = agent_definition(agent)?;
        let mut caps = def.default_capabilities();
        if let Some(over) = config.agent_capabilities.get(agent) {
            if let Some(v) = over.has_skills {
                caps.has_skills = v && def.has_skills();
            }
            if let Some(v) = over.has_background_agents {
                caps.has_background_agents = v;
            }
            if let Some(v) = over.has_native_web {
                caps.has_native_web = v;
            }
            if let Some(v) = over.has_mcp {
                caps.has_mcp = v;
            }
            if let Some(v) = &over.research_strategy {
                caps.research_strategy = v.clone();
            }
        }
        Ok(caps)
    }

    /// Point each agent's instruction file at the constitution.
    ///
    /// Existing files get a reference section appended and are recorded as
    /// modified; missing files are created and recorded as created. Files
    /// that already mention the constitution are left alone. Agents sharing
    /// an instruction file are handled once. Returns the files touched.
    pub fn update_instruction_files(
        &self,
        agents: &[String],
        constitution: &Path,
    ) -> Result<Vec<PathBuf>> {
        let reference = templates::constitution_reference(&paths::relative_to(
            &self.root,
            constitution,
        ));
        let mut seen = BTreeSet::new();
        let mut touched = Vec::new();
        for agent in agents {
            let def = agent_definition(agent)?;
            if !seen.insert(def.instruction_file) {
                continue;
            }
            let path = self.root.join(def.instruction_file);
            match io::read_optional(&path)? {
                Some(existing) => {
                    if existing.contains(CONSTITUTION_MARKER) || existing.contains("constitution.md") {
                        continue;
                    }
                    let sep = if existing.ends_with('\n') { "\n" } else { "\n\n" };
                    io::append_text(&path, &format!("{sep}{reference}"))?;
                    self.ledger
                        .record_modified_file(&path, "appended", CONSTITUTION_MARKER)?;
                }
                None => {
                    let content = format!("# {} Instructions\n\n{reference}", def.display_name);
                    io::atomic_write(&path, content.as_bytes())?;
                    self.ledger.record_created_file(&path, &content)?;
                }
            }
            touched.push(path);
        }
        Ok(touched)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn service() -> (TempDir, AgentService) {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".oak")).unwrap();
        let svc = AgentService::new(dir.path());
        (dir, svc)
    }

    #[test]
    fn unknown_agent_is_rejected() {
        assert!(matches!(
            agent_definition("emacs"),
            Err(OakError::UnknownAgent(_))
        ));
    }

    #[test]
    fn command_paths_follow_catalog() {
        let (dir, svc) = service();
        assert_eq!(
            svc.command_path("copilot", "rfc-create").unwrap(),
            dir.path().join(".github/agents/oak.rfc-create.agent.md")
        );
        assert_eq!(
            svc.command_path("codex", "issue-plan").unwrap(),
            dir.path().join(".codex/prompts/oak.issue-plan.md")
        );
    }

    #[test]
    fn install_and_remove_commands() {
        let (dir, svc) = service();
        svc.install_command("claude", "rfc-create", "body").unwrap();
        svc.install_command("claude", "rfc-list", "body").unwrap();
        std::fs::write(dir.path().join(".claude/commands/mine.md"), "keep").unwrap();

        assert_eq!(
            svc.list_agent_commands("claude").unwrap(),
            vec!["oak.rfc-create.md", "oak.rfc-list.md"]
        );
        let ledger = StateLedger::new(dir.path());
        assert_eq!(ledger.get_managed_assets().unwrap().created_files.len(), 2);

        assert_eq!(svc.remove_agent_commands("claude").unwrap(), 2);
        assert!(dir.path().join(".claude/commands/mine.md").exists());
        assert!(ledger.get_managed_assets().unwrap().created_files.is_empty());
    }

    #[test]
    fn removing_all_commands_prunes_empty_folders() {
        let (dir, svc) = service();
        svc.install_command("gemini", "rfc-create", "body").unwrap();
        svc.remove_agent_commands("gemini").unwrap();
        assert!(!dir.path().join(".gemini").exists());
    }

    #[test]
    fn config_overrides_capabilities() {
        let (_dir, svc) = service();
        let mut cfg = OakConfig::default();
        cfg.agent_capabilities.insert(
            "claude".into(),
            AgentCapabilitiesConfig {
                has_skills: Some(false),
                research_strategy: Some("ask".into()),
                ..Default::default()
            },
        );
        let caps = svc.capabilities("claude", &cfg).unwrap();
        assert!(!caps.has_skills);
        assert_eq!(caps.research_strategy, "ask");

        let copilot = svc.capabilities("copilot", &cfg).unwrap();
        assert!(!copilot.has_skills);
    }

    #[test]
    fn instruction_files_are_appended_once() {
        let (dir, svc) = service();
        std::fs::write(dir.path().join("AGENTS.md"), "# Team rules\n").unwrap();
        let constitution = dir.path().join("oak/constitution.md");
        let agents = vec!["codex".to_string(), "cursor".to_string(), "claude".to_string()];

        let touched = svc.update_instruction_files(&agents, &constitution).unwrap();
        assert_eq!(touched.len(), 2);

        let agents_md = std::fs::read_to_string(dir.path().join("AGENTS.md")).unwrap();
        assert!(agents_md.starts_with("# Team rules\n"));
        assert_eq!(agents_md.matches(CONSTITUTION_MARKER).count(), 1);
        let claude_md = std::fs::read_to_string(dir.path().join(".claude/CLAUDE.md")).unwrap();
        assert!(claude_md.starts_with("# Claude Code Instructions"));

        let again = svc.update_instruction_files(&agents, &constitution).unwrap();
        assert!(again.is_empty());

        let assets = StateLedger::new(dir.path()).get_managed_assets().unwrap();
        assert_eq!(assets.modified_files.len(), 1);
        assert_eq!(assets.modified_files[0].path, "AGENTS.md");
        assert_eq!(assets.created_files[0].path, ".claude/CLAUDE.md");
    }
}
