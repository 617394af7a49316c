use crate::config::OakConfig;
use crate::error::Result;
use crate::paths;
use crate::services::{HookReport, Services, UpgradeOptions, UpgradePlan};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// FlowType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
    FreshInit,
    Update,
    Upgrade,
    ForceReinit,
    Remove,
}

impl FlowType {
    /// Every flow that installs or updates, i.e. all but `Remove`.
    pub const WRITE_FLOWS: &'static [FlowType] = &[
        FlowType::FreshInit,
        FlowType::Update,
        FlowType::Upgrade,
        FlowType::ForceReinit,
    ];

    /// Flows driven by `oak init`.
    pub const INIT_FLOWS: &'static [FlowType] = &[
        FlowType::FreshInit,
        FlowType::Update,
        FlowType::ForceReinit,
    ];
}

// ---------------------------------------------------------------------------
// SelectionState
// ---------------------------------------------------------------------------

/// Desired selections for this run next to what was installed before.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    pub agents: Vec<String>,
    pub ides: Vec<String>,
    pub features: Vec<String>,
    pub previous_agents: Vec<String>,
    pub previous_ides: Vec<String>,
    pub previous_features: Vec<String>,
}

fn difference(current: &[String], previous: &[String]) -> BTreeSet<String> {
    let previous: BTreeSet<&String> = previous.iter().collect();
    current
        .iter()
        .filter(|item| !previous.contains(item))
        .cloned()
        .collect()
}

fn same_set(a: &[String], b: &[String]) -> bool {
    a.iter().collect::<BTreeSet<_>>() == b.iter().collect::<BTreeSet<_>>()
}

/// Drop repeats, keeping the first occurrence.
pub fn dedup_ordered(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

impl SelectionState {
    pub fn new(agents: Vec<String>, ides: Vec<String>, features: Vec<String>) -> Self {
        Self {
            agents: dedup_ordered(agents),
            ides: dedup_ordered(ides),
            features: dedup_ordered(features),
            ..Self::default()
        }
    }

    pub fn agents_added(&self) -> BTreeSet<String> {
        difference(&self.agents, &self.previous_agents)
    }

    pub fn agents_removed(&self) -> BTreeSet<String> {
        difference(&self.previous_agents, &self.agents)
    }

    pub fn ides_added(&self) -> BTreeSet<String> {
        difference(&self.ides, &self.previous_ides)
    }

    pub fn ides_removed(&self) -> BTreeSet<String> {
        difference(&self.previous_ides, &self.ides)
    }

    pub fn features_added(&self) -> BTreeSet<String> {
        difference(&self.features, &self.previous_features)
    }

    pub fn features_removed(&self) -> BTreeSet<String> {
        difference(&self.previous_features, &self.features)
    }

    pub fn has_agent_changes(&self) -> bool {
        !same_set(&self.agents, &self.previous_agents)
    }

    pub fn has_ide_changes(&self) -> bool {
        !same_set(&self.ides, &self.previous_ides)
    }

    pub fn has_feature_changes(&self) -> bool {
        !same_set(&self.features, &self.previous_features)
    }

    pub fn has_any_changes(&self) -> bool {
        self.has_agent_changes() || self.has_ide_changes() || self.has_feature_changes()
    }
}

// ---------------------------------------------------------------------------
// Stage data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RemovalOptions {
    pub keep_ide_settings: bool,
}

/// A file oak appended to, reported to the user instead of removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModifiedFileNotice {
    pub path: String,
    pub marker: String,
}

/// What `oak remove` will touch, computed before anything is deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemovalPlan {
    pub files_to_remove: Vec<String>,
    pub files_modified_by_user: Vec<String>,
    pub files_to_inform_user: Vec<ModifiedFileNotice>,
    pub directories_to_check: Vec<String>,
    pub ide_settings_to_remove: Vec<String>,
    pub installed_skills: Vec<String>,
    pub has_user_content: bool,
    pub keep_ide_settings: bool,
}

/// Result payload of a stage, keyed by stage name in the context.
#[derive(Debug, Clone)]
pub enum StageData {
    ExistingConfig {
        agents: Vec<String>,
        ides: Vec<String>,
        features: Vec<String>,
    },
    ResolvedFeatures(Vec<String>),
    AgentCommandsRemoved {
        agents: Vec<String>,
        files: usize,
    },
    AgentCommandsInstalled(Vec<String>),
    FeaturesRemoved(Vec<String>),
    FeaturesInstalled(Vec<String>),
    IdeSettingsRemoved(Vec<String>),
    SkillsCleaned(usize),
    SkillsReady(Vec<String>),
    SkillsRefreshed(usize),
    HookReports(Vec<HookReport>),
    RemovalOptions(RemovalOptions),
    RemovalPlan(Box<RemovalPlan>),
    FilesRemoved(Vec<String>),
    DirectoriesRemoved(Vec<String>),
    OakDirRemoved,
    UpgradeOptions(UpgradeOptions),
    UpgradePlan(Box<UpgradePlan>),
    Upgraded {
        upgraded: Vec<String>,
        failed: Vec<String>,
    },
    Migrations {
        succeeded: Vec<String>,
        failed: Vec<String>,
    },
    Version(String),
    Repaired(Vec<String>),
}

// ---------------------------------------------------------------------------
// PipelineContext
// ---------------------------------------------------------------------------

/// Everything a stage can see or change during one run.
#[derive(Debug)]
pub struct PipelineContext {
    project_root: PathBuf,
    flow_type: FlowType,
    pub force: bool,
    pub interactive: bool,
    pub dry_run: bool,
    pub selections: SelectionState,
    stage_results: BTreeMap<String, StageData>,
    /// `(stage, message)` pairs, append-only.
    pub errors: Vec<(String, String)>,
    pub warnings: Vec<(String, String)>,
    pub services: Services,
}

impl PipelineContext {
    pub fn new(project_root: &Path, flow_type: FlowType) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            flow_type,
            force: false,
            interactive: false,
            dry_run: false,
            selections: SelectionState::default(),
            stage_results: BTreeMap::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            services: Services::new(project_root),
        }
    }

    pub fn with_selections(mut self, selections: SelectionState) -> Self {
        self.selections = selections;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn flow_type(&self) -> FlowType {
        self.flow_type
    }

    pub fn oak_dir(&self) -> PathBuf {
        paths::oak_dir(&self.project_root)
    }

    pub fn is_fresh_install(&self) -> bool {
        self.flow_type == FlowType::FreshInit
    }

    pub fn is_update(&self) -> bool {
        self.flow_type == FlowType::Update
    }

    pub fn is_upgrade(&self) -> bool {
        self.flow_type == FlowType::Upgrade
    }

    pub fn is_force_reinit(&self) -> bool {
        self.flow_type == FlowType::ForceReinit
    }

    pub fn is_remove(&self) -> bool {
        self.flow_type == FlowType::Remove
    }

    /// Load the installed config and copy its selections into the
    /// `previous_*` fields. Stage gating is decided before the first stage
    /// runs, so update runs call this before executing.
    pub fn seed_previous_selections(&mut self) -> Result<OakConfig> {
        let config = self.services.config.load()?;
        self.selections.previous_agents = config.agents.clone();
        self.selections.previous_ides = config.ides.clone();
        self.selections.previous_features = config.features.enabled.clone();
        Ok(config)
    }

    pub fn add_error(&mut self, stage: &str, message: impl Into<String>) {
        self.errors.push((stage.to_string(), message.into()));
    }

    pub fn add_warning(&mut self, stage: &str, message: impl Into<String>) {
        self.warnings.push((stage.to_string(), message.into()));
    }

    /// Store a stage's result. The first write for a name wins.
    pub fn set_result(&mut self, stage: &str, data: StageData) {
        if self.stage_results.contains_key(stage) {
            tracing::warn!(stage, "stage result already set, ignoring second write");
            return;
        }
        self.stage_results.insert(stage.to_string(), data);
    }

    pub fn result(&self, stage: &str) -> Option<&StageData> {
        self.stage_results.get(stage)
    }

    pub fn has_result(&self, stage: &str) -> bool {
        self.stage_results.contains_key(stage)
    }

    // Typed lookups for results other stages depend on.

    pub fn resolved_features(&self) -> Option<&[String]> {
        match self.result("resolve_dependencies") {
            Some(StageData::ResolvedFeatures(features)) => Some(features.as_slice()),
            _ => None,
        }
    }

    pub fn upgrade_plan(&self) -> Option<&UpgradePlan> {
        match self.result("plan_upgrade") {
            Some(StageData::UpgradePlan(plan)) => Some(&**plan),
            _ => None,
        }
    }

    pub fn upgrade_options(&self) -> UpgradeOptions {
        match self.result("upgrade_options") {
            Some(StageData::UpgradeOptions(options)) => *options,
            _ => UpgradeOptions::default(),
        }
    }

    pub fn removal_options(&self) -> RemovalOptions {
        match self.result("removal_options") {
            Some(StageData::RemovalOptions(options)) => *options,
            _ => RemovalOptions::default(),
        }
    }

    pub fn removal_plan(&self) -> Option<&RemovalPlan> {
        match self.result("plan_removal") {
            Some(StageData::RemovalPlan(plan)) => Some(&**plan),
            _ => None,
        }
    }
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

    #[test]
    fn selection_deltas_are_set_based() {
        let mut sel = SelectionState::new(strings(&["copilot", "claude"]), vec![], vec![]);
        sel.previous_agents = strings(&["claude", "codex"]);

        assert_eq!(sel.agents_added(), BTreeSet::from(["copilot".to_string()]));
        assert_eq!(sel.agents_removed(), BTreeSet::from(["codex".to_string()]));
        assert!(sel.has_agent_changes());
        assert!(!sel.has_ide_changes());
        assert!(sel.has_any_changes());

        sel.ides = strings(&["vscode"]);
        assert_eq!(sel.ides_added(), BTreeSet::from(["vscode".to_string()]));
        assert!(sel.ides_removed().is_empty());
    }

    #[test]
    fn flow_predicates() {
        let dir = TempDir::new().unwrap();
        let update = PipelineContext::new(dir.path(), FlowType::Update);
        assert!(update.is_update() && !update.is_fresh_install());
        let upgrade = PipelineContext::new(dir.path(), FlowType::Upgrade);
        assert!(upgrade.is_upgrade() && !upgrade.is_force_reinit());
    }

    #[test]
    fn reordering_is_not_a_change() {
        let mut sel = SelectionState::new(vec![], vec![], strings(&["rfc", "constitution"]));
        sel.previous_features = strings(&["constitution", "rfc"]);
        assert!(!sel.has_feature_changes());
        assert!(sel.features_added().is_empty());
        assert!(sel.features_removed().is_empty());
        assert!(!sel.has_any_changes());
    }

    #[test]
    fn new_selection_drops_duplicates() {
        let sel = SelectionState::new(strings(&["claude", "claude", "codex"]), vec![], vec![]);
        assert_eq!(sel.agents, vec!["claude", "codex"]);
    }

    #[test]
    fn results_are_write_once() {
        let dir = TempDir::new().unwrap();
        let mut ctx = PipelineContext::new(dir.path(), FlowType::FreshInit);
        ctx.set_result("resolve_dependencies", StageData::ResolvedFeatures(strings(&["a"])));
        ctx.set_result("resolve_dependencies", StageData::ResolvedFeatures(strings(&["b"])));
        assert_eq!(ctx.resolved_features(), Some(&strings(&["a"])[..]));
    }

    #[test]
    fn option_lookups_fall_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let mut ctx = PipelineContext::new(dir.path(), FlowType::Remove);
        assert!(!ctx.removal_options().keep_ide_settings);
        ctx.set_result(
            "removal_options",
            StageData::RemovalOptions(RemovalOptions {
                keep_ide_settings: true,
            }),
        );
        assert!(ctx.removal_options().keep_ide_settings);
        assert!(ctx.upgrade_options().commands);
        assert!(ctx.is_remove());
        assert_eq!(ctx.oak_dir(), dir.path().join(".oak"));
    }
}
