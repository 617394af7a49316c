use crate::config::{OakConfig, OAK_VERSION};
use crate::error::{OakError, Result};
use crate::paths;
use crate::services::agent::agent_definition;
use std::path::{Path, PathBuf};

/// Load-modify-save access to `.oak/config.yaml`.
///
/// Each mutating call reloads the file and writes it back, returning the
/// saved config.
#[derive(Debug, Clone)]
pub struct ConfigService {
    root: PathBuf,
}

impl ConfigService {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn exists(&self) -> bool {
        paths::config_path(&self.root).is_file()
    }

    pub fn load(&self) -> Result<OakConfig> {
        if !self.exists() {
            return Err(OakError::NotInitialized);
        }
        OakConfig::load(&self.root)
    }

    pub fn save(&self, config: &OakConfig) -> Result<()> {
        config.save(&self.root)
    }

    fn modify(&self, f: impl FnOnce(&mut OakConfig) -> Result<()>) -> Result<OakConfig> {
        let mut config = self.load()?;
        f(&mut config)?;
        self.save(&config)?;
        Ok(config)
    }

    /// Write a new config for the given selections, replacing any existing one.
    pub fn create_default(
        &self,
        agents: &[String],
        ides: &[String],
        features: &[String],
    ) -> Result<OakConfig> {
        let mut config = OakConfig {
            version: OAK_VERSION.to_string(),
            agents: agents.to_vec(),
            ides: ides.to_vec(),
            ..OakConfig::default()
        };
        config.features.enabled = features.to_vec();
        for agent in agents {
            let def = agent_definition(agent)?;
            config
                .agent_capabilities
                .insert(agent.clone(), def.capabilities_config());
        }
        self.save(&config)?;
        Ok(config)
    }

    /// Replace the agent list and keep `agent_capabilities` in step: entries
    /// for dropped agents go, newly selected agents get catalog defaults.
    pub fn update_agents(&self, agents: &[String]) -> Result<OakConfig> {
        self.modify(|config| {
            config.agents = agents.to_vec();
            config
                .agent_capabilities
                .retain(|name, _| agents.contains(name));
            for agent in agents {
                if !config.agent_capabilities.contains_key(agent) {
                    let def = agent_definition(agent)?;
                    config
                        .agent_capabilities
                        .insert(agent.clone(), def.capabilities_config());
                }
            }
            config.version = OAK_VERSION.to_string();
            Ok(())
        })
    }

    pub fn update_ides(&self, ides: &[String]) -> Result<OakConfig> {
        self.modify(|config| {
            config.ides = ides.to_vec();
            config.version = OAK_VERSION.to_string();
            Ok(())
        })
    }

    pub fn update_features(&self, features: &[String]) -> Result<OakConfig> {
        self.modify(|config| {
            config.features.enabled = features.to_vec();
            Ok(())
        })
    }

    pub fn enable_feature(&self, feature: &str) -> Result<OakConfig> {
        self.modify(|config| {
            if !config.features.enabled.iter().any(|f| f == feature) {
                config.features.enabled.push(feature.to_string());
            }
            Ok(())
        })
    }

    pub fn disable_feature(&self, feature: &str) -> Result<OakConfig> {
        self.modify(|config| {
            config.features.enabled.retain(|f| f != feature);
            Ok(())
        })
    }

    pub fn agents(&self) -> Result<Vec<String>> {
        Ok(self.load()?.agents)
    }

    pub fn ides(&self) -> Result<Vec<String>> {
        Ok(self.load()?.ides)
    }

    pub fn features(&self) -> Result<Vec<String>> {
        Ok(self.load()?.features.enabled)
    }

    pub fn set_version(&self, version: &str) -> Result<OakConfig> {
        self.modify(|config| {
            config.version = version.to_string();
            Ok(())
        })
    }

    pub fn add_installed_skill(&self, skill: &str) -> Result<OakConfig> {
        self.modify(|config| {
            if !config.skills.installed.iter().any(|s| s == skill) {
                config.skills.installed.push(skill.to_string());
            }
            Ok(())
        })
    }

    pub fn remove_installed_skill(&self, skill: &str) -> Result<OakConfig> {
        self.modify(|config| {
            config.skills.installed.retain(|s| s != skill);
            Ok(())
        })
    }
}
