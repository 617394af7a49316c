use crate::error::Result;
use crate::{io, paths};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Version of the binary, stamped into `config.yaml` on init and upgrade.
pub const OAK_VERSION: &str = env!("CARGO_PKG_VERSION");

// ---------------------------------------------------------------------------
// AgentCapabilitiesConfig
// ---------------------------------------------------------------------------

/// Per-agent capability overrides. `None` means "use the catalog default".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentCapabilitiesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_skills: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_background_agents: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_native_web: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_mcp: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_strategy: Option<String>,
}

// ---------------------------------------------------------------------------
// RfcConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfcConfig {
    #[serde(default = "default_rfc_directory")]
    pub directory: String,
    #[serde(default = "default_rfc_template")]
    pub template: String,
    #[serde(default = "default_true")]
    pub auto_number: bool,
    #[serde(default = "default_number_format")]
    pub number_format: String,
    #[serde(default = "default_true")]
    pub validate_on_create: bool,
}

fn default_rfc_directory() -> String {
    paths::RFC_DIR.to_string()
}

fn default_rfc_template() -> String {
    "engineering".to_string()
}

fn default_number_format() -> String {
    "sequential".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for RfcConfig {
    fn default() -> Self {
        Self {
            directory: default_rfc_directory(),
            template: default_rfc_template(),
            auto_number: true,
            number_format: default_number_format(),
            validate_on_create: true,
        }
    }
}

// ---------------------------------------------------------------------------
// IssueConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AzureDevOpsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pat_env: Option<String>,
    #[serde(default = "default_branch")]
    pub default_branch: String,
}

impl Default for AzureDevOpsConfig {
    fn default() -> Self {
        Self {
            organization: None,
            project: None,
            team: None,
            area_path: None,
            pat_env: None,
            default_branch: default_branch(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitHubIssuesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,
    #[serde(default = "default_branch")]
    pub default_branch: String,
}

impl Default for GitHubIssuesConfig {
    fn default() -> Self {
        Self {
            owner: None,
            repo: None,
            token_env: None,
            default_branch: default_branch(),
        }
    }
}

fn default_branch() -> String {
    "main".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueConfig {
    /// Active provider key: `ado` or `github`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default)]
    pub azure_devops: AzureDevOpsConfig,
    #[serde(default)]
    pub github: GitHubIssuesConfig,
}

// ---------------------------------------------------------------------------
// Constitution / features / skills
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstitutionConfig {
    #[serde(default = "default_constitution_dir")]
    pub directory: String,
}

fn default_constitution_dir() -> String {
    paths::CONSTITUTION_DIR.to_string()
}

impl Default for ConstitutionConfig {
    fn default() -> Self {
        Self {
            directory: default_constitution_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default)]
    pub enabled: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillsConfig {
    #[serde(default)]
    pub installed: Vec<String>,
    #[serde(default = "default_true")]
    pub auto_install: bool,
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            installed: Vec::new(),
            auto_install: true,
        }
    }
}

// ---------------------------------------------------------------------------
// OakConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OakConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub agents: Vec<String>,
    #[serde(default)]
    pub ides: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub agent_capabilities: BTreeMap<String, AgentCapabilitiesConfig>,
    #[serde(default)]
    pub rfc: RfcConfig,
    #[serde(default)]
    pub issue: IssueConfig,
    #[serde(default)]
    pub constitution: ConstitutionConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub skills: SkillsConfig,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

impl Default for OakConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            agents: Vec::new(),
            ides: Vec::new(),
            agent_capabilities: BTreeMap::new(),
            rfc: RfcConfig::default(),
            issue: IssueConfig::default(),
            constitution: ConstitutionConfig::default(),
            features: FeaturesConfig::default(),
            skills: SkillsConfig::default(),
        }
    }
}

/// Command file prefixes used to infer features for configs written before
/// the `features` section existed.
const LEGACY_COMMAND_PREFIXES: &[(&str, &str)] = &[
    ("oak.rfc-", "rfc"),
    ("oak.constitution-", "constitution"),
    ("oak.issue-", "issues"),
];

impl OakConfig {
    /// Load `.oak/config.yaml`. A missing or empty file yields defaults.
    ///
    /// Older layouts are upgraded in memory: a scalar `agent:` becomes
    /// `agents: [..]`, and a missing `features` section is inferred from the
    /// command files present under `.claude/commands/`.
    pub fn load(root: &Path) -> Result<Self> {
        let Some(data) = io::read_optional(&paths::config_path(root))? else {
            return Ok(Self::default());
        };
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut value: serde_yaml::Value = serde_yaml::from_str(&data)?;
        if let serde_yaml::Value::Mapping(map) = &mut value {
            let agents_key = serde_yaml::Value::from("agents");
            if !map.contains_key(&agents_key) {
                if let Some(legacy) = map.remove("agent") {
                    let agents: Vec<serde_yaml::Value> = match legacy.as_str() {
                        Some(a) if a != "none" => vec![serde_yaml::Value::from(a)],
                        _ => Vec::new(),
                    };
                    map.insert(agents_key, serde_yaml::Value::Sequence(agents));
                }
            }
            let features_key = serde_yaml::Value::from("features");
            if !map.contains_key(&features_key) {
                let enabled = infer_legacy_features(root)?;
                let mut features = serde_yaml::Mapping::new();
                features.insert(
                    serde_yaml::Value::from("enabled"),
                    serde_yaml::Value::Sequence(
                        enabled.into_iter().map(serde_yaml::Value::from).collect(),
                    ),
                );
                map.insert(features_key, serde_yaml::Value::Mapping(features));
            }
        }
        Ok(serde_yaml::from_value(value)?)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        let body = format!("# Open Agent Kit (OAK) configuration\n{data}");
        io::atomic_write(&paths::config_path(root), body.as_bytes())
    }
}

fn infer_legacy_features(root: &Path) -> Result<Vec<String>> {
    let commands_dir = root.join(".claude/commands");
    let mut enabled = std::collections::BTreeSet::new();
    if commands_dir.is_dir() {
        for entry in std::fs::read_dir(&commands_dir)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if let Some((_, feature)) = LEGACY_COMMAND_PREFIXES
                .iter()
                .find(|(prefix, _)| name.starts_with(prefix))
            {
                enabled.insert(feature.to_string());
            }
        }
    }
    if enabled.contains("rfc") || enabled.contains("issues") {
        enabled.insert("constitution".to_string());
    }
    Ok(enabled.into_iter().collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
