use crate::config::OAK_VERSION;
use crate::error::Result;
use crate::services::agent::AgentService;
use crate::services::config::ConfigService;
use crate::services::feature::{feature_manifest, FeatureService, FEATURES};
use crate::services::ide::IdeSettingsService;
use crate::services::skill::SkillService;
use crate::state::StateLedger;
use crate::{io, migrations, paths};
use serde::Serialize;
use std::path::{Path, PathBuf};

const LEGACY_TEMPLATE_SUBDIRS: &[&str] = &["constitution", "rfc", "commands", "ide"];

/// Which asset groups an upgrade should consider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpgradeOptions {
    pub commands: bool,
    pub ide_settings: bool,
    pub skills: bool,
}

impl Default for UpgradeOptions {
    fn default() -> Self {
        Self {
            commands: true,
            ide_settings: true,
            skills: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandUpgrade {
    pub agent: String,
    pub feature: String,
    pub command: String,
    pub file: String,
    pub installed_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillInstall {
    pub skill: String,
    pub feature: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SkillUpgrades {
    pub install: Vec<SkillInstall>,
    pub upgrade: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingMigration {
    pub id: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuralRepair {
    /// `.oak/ide/` is missing and the core IDE assets must be reinstalled.
    MissingIdeAssets,
    /// Template copies from older layouts still sit in `.oak/templates/`.
    LegacyTemplates,
}

impl StructuralRepair {
    pub fn description(&self) -> &'static str {
        match self {
            StructuralRepair::MissingIdeAssets => "Reinstall core IDE assets in .oak/ide",
            StructuralRepair::LegacyTemplates => "Remove legacy template copies from .oak/templates",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpgradePlan {
    pub commands: Vec<CommandUpgrade>,
    pub ide_settings: Vec<String>,
    pub skills: SkillUpgrades,
    pub migrations: Vec<PendingMigration>,
    pub structural_repairs: Vec<StructuralRepair>,
    pub version_outdated: bool,
    pub current_version: String,
    pub package_version: String,
}

impl UpgradePlan {
    pub fn has_upgrades(&self) -> bool {
        !self.commands.is_empty()
            || !self.ide_settings.is_empty()
            || !self.skills.install.is_empty()
            || !self.skills.upgrade.is_empty()
            || !self.migrations.is_empty()
            || !self.structural_repairs.is_empty()
            || self.version_outdated
    }

    pub fn total_items(&self) -> usize {
        self.commands.len()
            + self.ide_settings.len()
            + self.skills.install.len()
            + self.skills.upgrade.len()
            + self.migrations.len()
            + self.structural_repairs.len()
    }
}

/// Works out what an existing install is missing relative to this binary.
#[derive(Debug, Clone)]
pub struct UpgradeService {
    root: PathBuf,
    config: ConfigService,
    agents: AgentService,
    features: FeatureService,
    ides: IdeSettingsService,
    skills: SkillService,
    ledger: StateLedger,
}

impl UpgradeService {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            config: ConfigService::new(root),
            agents: AgentService::new(root),
            features: FeatureService::new(root),
            ides: IdeSettingsService::new(root),
            skills: SkillService::new(root),
            ledger: StateLedger::new(root),
        }
    }

    pub fn is_initialized(&self) -> bool {
        paths::oak_dir(&self.root).is_dir() && self.config.exists()
    }

    pub fn plan_upgrade(&self, options: &UpgradeOptions) -> Result<UpgradePlan> {
        let config = self.config.load()?;
        let enabled: Vec<String> = if config.features.enabled.is_empty() {
            FEATURES.iter().map(|f| f.name.to_string()).collect()
        } else {
            config.features.enabled.clone()
        };

        let mut plan = UpgradePlan {
            current_version: config.version.clone(),
            package_version: OAK_VERSION.to_string(),
            version_outdated: config.version != OAK_VERSION,
            ..UpgradePlan::default()
        };

        if options.commands {
            for agent in &config.agents {
                for feature in &enabled {
                    for command in feature_manifest(feature)?.commands {
                        let path = self.agents.command_path(agent, command)?;
                        let rendered = self.features.render_command(feature, command, agent)?;
                        if io::read_optional(&path)?.as_deref() == Some(rendered.as_str()) {
                            continue;
                        }
                        plan.commands.push(CommandUpgrade {
                            agent: agent.clone(),
                            feature: feature.clone(),
                            command: command.to_string(),
                            file: self.agents.command_filename(agent, command)?,
                            installed_path: paths::relative_to(&self.root, &path),
                        });
                    }
                }
            }
        }

        if options.ide_settings {
            for ide in &config.ides {
                if self.ides.needs_upgrade(ide)? {
                    plan.ide_settings.push(ide.clone());
                }
            }
        }

        if options.skills && self.skills.has_skills_capable_agent()? {
            for feature in &enabled {
                for skill in feature_manifest(feature)?.skills {
                    if !config.skills.installed.iter().any(|s| s == skill) {
                        plan.skills.install.push(SkillInstall {
                            skill: skill.to_string(),
                            feature: feature.clone(),
                        });
                    } else if self.skills.skill_needs_upgrade(skill)? {
                        plan.skills.upgrade.push(skill.to_string());
                    }
                }
            }
        }

        let applied = self.ledger.get_applied_migrations()?;
        plan.migrations = migrations::pending_migrations(&applied)
            .into_iter()
            .map(|m| PendingMigration {
                id: m.id.to_string(),
                description: m.description.to_string(),
            })
            .collect();

        plan.structural_repairs = self.structural_repairs();
        Ok(plan)
    }

    fn structural_repairs(&self) -> Vec<StructuralRepair> {
        let mut repairs = Vec::new();
        if !paths::ide_assets_dir(&self.root).is_dir() {
            repairs.push(StructuralRepair::MissingIdeAssets);
        }
        let templates = self.root.join(paths::TEMPLATES_DIR);
        if LEGACY_TEMPLATE_SUBDIRS
            .iter()
            .any(|sub| templates.join(sub).is_dir())
        {
            repairs.push(StructuralRepair::LegacyTemplates);
        }
        repairs
    }

    /// Re-render one command file and re-baseline it in the ledger.
    pub fn upgrade_command(&self, item: &CommandUpgrade) -> Result<()> {
        let content = self
            .features
            .render_command(&item.feature, &item.command, &item.agent)?;
        let path = self.agents.install_command(&item.agent, &item.command, &content)?;
        self.ledger.refresh_created_file(&path, &content)
    }

    pub fn repair_structure(&self, repair: StructuralRepair) -> Result<()> {
        match repair {
            StructuralRepair::MissingIdeAssets => {
                self.ides.install_core_assets()?;
            }
            StructuralRepair::LegacyTemplates => {
                let templates = self.root.join(paths::TEMPLATES_DIR);
                for sub in LEGACY_TEMPLATE_SUBDIRS {
                    let dir = templates.join(sub);
                    if dir.is_dir() {
                        std::fs::remove_dir_all(&dir)?;
                    }
                }
                io::remove_dir_if_empty(&templates)?;
            }
        }
        Ok(())
    }
}
