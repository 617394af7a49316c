//! Collaborators the pipeline stages call into.
//!
//! Every service is a thin handle over the project root; state lives on disk
//! in `.oak/config.yaml`, `.oak/state.yaml` and the installed files.

pub mod agent;
pub mod config;
pub mod feature;
pub mod ide;
pub mod skill;
pub mod template;
pub mod upgrade;

pub use agent::{AgentCapabilities, AgentDefinition, AgentService};
pub use config::ConfigService;
pub use feature::{FeatureManifest, FeatureService, Hook, HookReport};
pub use ide::IdeSettingsService;
pub use skill::SkillService;
pub use template::TemplateRenderer;
pub use upgrade::{UpgradeOptions, UpgradePlan, UpgradeService};

use crate::state::StateLedger;
use std::path::Path;

/// The service bundle built once per command and carried by the pipeline
/// context.
#[derive(Debug, Clone)]
pub struct Services {
    pub config: ConfigService,
    pub agents: AgentService,
    pub features: FeatureService,
    pub ides: IdeSettingsService,
    pub skills: SkillService,
    pub upgrade: UpgradeService,
    pub ledger: StateLedger,
}

impl Services {
    pub fn new(root: &Path) -> Self {
        Self {
            config: ConfigService::new(root),
            agents: AgentService::new(root),
            features: FeatureService::new(root),
            ides: IdeSettingsService::new(root),
            skills: SkillService::new(root),
            upgrade: UpgradeService::new(root),
            ledger: StateLedger::new(root),
        }
    }
}
