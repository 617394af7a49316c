use crate::config::OakConfig;
use crate::error::{OakError, Result};
use crate::services::agent::{agent_definition, AgentService, AGENTS};
use crate::services::config::ConfigService;
use crate::services::feature::{feature_manifest, FEATURES};
use crate::state::StateLedger;
use crate::{io, paths, templates};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Installs feature skills into the skills directory of every configured
/// agent that supports them.
#[derive(Debug, Clone)]
pub struct SkillService {
    root: PathBuf,
    config: ConfigService,
    agents: AgentService,
    ledger: StateLedger,
}

impl SkillService {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            config: ConfigService::new(root),
            agents: AgentService::new(root),
            ledger: StateLedger::new(root),
        }
    }

    /// Skills directories of configured agents whose capabilities include skills.
    fn skill_dirs(&self, config: &OakConfig) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for agent in &config.agents {
            if !self.agents.capabilities(agent, config)?.has_skills {
                continue;
            }
            if let Some(dir) = self.agents.skills_dir(agent)? {
                dirs.push(dir);
            }
        }
        Ok(dirs)
    }

    pub fn has_skills_capable_agent(&self) -> Result<bool> {
        let config = self.config.load()?;
        Ok(!self.skill_dirs(&config)?.is_empty())
    }

    pub fn list_installed_skills(&self) -> Result<Vec<String>> {
        Ok(self.config.load()?.skills.installed)
    }

    pub fn skills_for_feature(&self, feature: &str) -> Result<Vec<&'static str>> {
        Ok(feature_manifest(feature)?.skills.to_vec())
    }

    /// Feature a skill ships with.
    pub fn feature_for_skill(&self, skill: &str) -> Option<&'static str> {
        FEATURES
            .iter()
            .find(|f| f.skills.contains(&skill))
            .map(|f| f.name)
    }

    fn skill_file(dir: &Path, skill: &str) -> PathBuf {
        dir.join(skill).join(paths::SKILL_MANIFEST_FILE)
    }

    fn write_skill(&self, skill: &str, body: &str, dirs: &[PathBuf]) -> Result<()> {
        for dir in dirs {
            let skill_dir = dir.join(skill);
            if !skill_dir.is_dir() {
                io::ensure_dir(&skill_dir)?;
                self.ledger.record_created_directory(&skill_dir)?;
            }
            let file = Self::skill_file(dir, skill);
            io::atomic_write(&file, body.as_bytes())?;
            self.ledger.record_created_file(&file, body)?;
        }
        Ok(())
    }

    /// Write `skill` for every skills-capable agent. Returns false when no
    /// configured agent takes skills.
    pub fn install_skill(&self, skill: &str) -> Result<bool> {
        let body = templates::skill_template(skill)
            .ok_or_else(|| OakError::UnknownSkill(skill.to_string()))?;
        let config = self.config.load()?;
        let dirs = self.skill_dirs(&config)?;
        if dirs.is_empty() {
            return Ok(false);
        }
        self.write_skill(skill, body, &dirs)?;
        self.config.add_installed_skill(skill)?;
        tracing::debug!(skill, agents = dirs.len(), "skill installed");
        Ok(true)
    }

    pub fn install_skills_for_feature(&self, feature: &str) -> Result<Vec<String>> {
        let mut installed = Vec::new();
        for skill in self.skills_for_feature(feature)? {
            if self.install_skill(skill)? {
                installed.push(skill.to_string());
            }
        }
        Ok(installed)
    }

    /// Remove `skill` from every agent that can hold skills, configured or
    /// not, and forget it in the config.
    pub fn remove_skill(&self, skill: &str) -> Result<bool> {
        let mut removed = false;
        for def in AGENTS.iter().filter(|a| a.has_skills()) {
            if let Some(dir) = self.agents.skills_dir(def.name)? {
                removed |= self.remove_skill_dir(&dir, skill)?;
            }
        }
        if self.config.exists() {
            self.config.remove_installed_skill(skill)?;
        }
        Ok(removed)
    }

    fn remove_skill_dir(&self, skills_dir: &Path, skill: &str) -> Result<bool> {
        let dir = skills_dir.join(skill);
        if !dir.is_dir() {
            return Ok(false);
        }
        std::fs::remove_dir_all(&dir)?;
        self.ledger
            .forget_created_files(&[Self::skill_file(skills_dir, skill)])?;
        io::prune_empty_dirs(skills_dir, &self.root)?;
        Ok(true)
    }

    pub fn remove_skills_for_feature(&self, feature: &str) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for skill in self.skills_for_feature(feature)? {
            if self.remove_skill(skill)? {
                removed.push(skill.to_string());
            }
        }
        Ok(removed)
    }

    /// Delete oak skills from the skills directory of each deselected agent.
    /// Returns the number of skill directories removed.
    pub fn cleanup_skills_for_removed_agents(&self, removed: &BTreeSet<String>) -> Result<usize> {
        let known: BTreeSet<&str> = FEATURES.iter().flat_map(|f| f.skills.iter().copied()).collect();
        let mut count = 0;
        for agent in removed {
            let def = agent_definition(agent)?;
            if !def.has_skills() {
                continue;
            }
            let Some(dir) = self.agents.skills_dir(agent)? else {
                continue;
            };
            for skill in &known {
                if self.remove_skill_dir(&dir, skill)? {
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    /// Rewrite every installed skill for every skills-capable agent, so
    /// newly selected agents receive them. Returns the number of skills
    /// written.
    pub fn refresh_skills(&self) -> Result<usize> {
        let config = self.config.load()?;
        let dirs = self.skill_dirs(&config)?;
        if dirs.is_empty() {
            return Ok(0);
        }
        let mut count = 0;
        for skill in &config.skills.installed {
            let Some(body) = templates::skill_template(skill) else {
                tracing::warn!(skill = %skill, "installed skill has no template, skipping");
                continue;
            };
            self.write_skill(skill, body, &dirs)?;
            count += 1;
        }
        Ok(count)
    }

    /// True when any skills-capable agent is missing the skill or holds a
    /// copy that differs from the bundled template.
    pub fn skill_needs_upgrade(&self, skill: &str) -> Result<bool> {
        let body = templates::skill_template(skill)
            .ok_or_else(|| OakError::UnknownSkill(skill.to_string()))?;
        let config = self.config.load()?;
        for dir in self.skill_dirs(&config)? {
            match io::read_optional(&Self::skill_file(&dir, skill))? {
                Some(current) if current == body => {}
                _ => return Ok(true),
            }
        }
        Ok(false)
    }

    pub fn upgrade_skill(&self, skill: &str) -> Result<()> {
        let body = templates::skill_template(skill)
            .ok_or_else(|| OakError::UnknownSkill(skill.to_string()))?;
        let config = self.config.load()?;
        let dirs = self.skill_dirs(&config)?;
        self.write_skill(skill, body, &dirs)?;
        for dir in &dirs {
            let file = Self::skill_file(dir, skill);
            self.ledger.refresh_created_file(&file, body)?;
        }
        Ok(())
    }
}
