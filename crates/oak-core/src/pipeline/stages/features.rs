use crate::error::Result;
use crate::pipeline::context::{FlowType, PipelineContext, StageData};
use crate::pipeline::ordering;
use crate::pipeline::stage::{Stage, StageLifecycle, StageOutcome};

pub fn stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(ResolveDependencies),
        Box::new(RemoveFeatures),
        Box::new(InstallFeatures),
    ]
}

/// Features this run asks for: the full selection on fresh or forced
/// installs, only the additions on update.
fn requested_features(ctx: &PipelineContext) -> Vec<String> {
    if ctx.is_fresh_install() || ctx.is_force_reinit() {
        ctx.selections.features.clone()
    } else {
        ctx.selections.features_added().into_iter().collect()
    }
}

fn has_requested_features(ctx: &PipelineContext) -> bool {
    if ctx.is_fresh_install() || ctx.is_force_reinit() {
        !ctx.selections.features.is_empty()
    } else {
        !ctx.selections.features_added().is_empty()
    }
}

/// Expands the requested features with their dependencies, dependencies
/// first.
pub struct ResolveDependencies;

impl Stage for ResolveDependencies {
    fn name(&self) -> &str {
        "resolve_dependencies"
    }

    fn display_name(&self) -> &str {
        "Resolving feature dependencies"
    }

    fn order(&self) -> u32 {
        ordering::RESOLVE_DEPENDENCIES
    }

    fn applicable_flows(&self) -> &[FlowType] {
        FlowType::INIT_FLOWS
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn applies(&self, ctx: &PipelineContext) -> bool {
        has_requested_features(ctx)
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let resolved = ctx
            .services
            .features
            .resolve_dependencies(&requested_features(ctx))?;
        Ok(StageOutcome::success_with(
            format!("Resolved {} features", resolved.len()),
            StageData::ResolvedFeatures(resolved),
        ))
    }
}

/// Removes deselected features unless a remaining feature still needs them.
pub struct RemoveFeatures;

impl Stage for RemoveFeatures {
    fn name(&self) -> &str {
        "remove_features"
    }

    fn display_name(&self) -> &str {
        "Removing deselected features"
    }

    fn order(&self) -> u32 {
        ordering::REMOVE_FEATURES
    }

    fn applicable_flows(&self) -> &[FlowType] {
        &[FlowType::Update]
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn lifecycle(&self) -> StageLifecycle {
        StageLifecycle::Cleanup
    }

    fn counterpart_stage(&self) -> Option<&str> {
        Some("install_features")
    }

    fn applies(&self, ctx: &PipelineContext) -> bool {
        !ctx.selections.features_removed().is_empty()
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let deselected: Vec<String> = ctx.selections.features_removed().into_iter().collect();
        // Dependents go before the features they depend on.
        let mut order = ctx.services.features.resolve_dependencies(&deselected)?;
        order.retain(|f| deselected.contains(f));
        order.reverse();

        let mut remaining = ctx.selections.features.clone();
        let mut removed = Vec::new();
        for feature in order {
            let (removable, blockers) = ctx
                .services
                .features
                .can_remove_feature(&feature, &remaining)?;
            if !removable {
                ctx.add_warning(
                    self.name(),
                    format!(
                        "Cannot remove '{feature}' - required by: {}",
                        blockers.join(", ")
                    ),
                );
                remaining.push(feature);
                continue;
            }
            ctx.services
                .features
                .remove_feature(&feature, &ctx.selections.agents)?;
            removed.push(feature);
        }

        Ok(StageOutcome::success_with(
            format!("Removed {} feature(s)", removed.len()),
            StageData::FeaturesRemoved(removed),
        ))
    }
}

pub struct InstallFeatures;

impl Stage for InstallFeatures {
    fn name(&self) -> &str {
        "install_features"
    }

    fn display_name(&self) -> &str {
        "Installing features"
    }

    fn order(&self) -> u32 {
        ordering::INSTALL_FEATURES
    }

    fn applicable_flows(&self) -> &[FlowType] {
        FlowType::INIT_FLOWS
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn lifecycle(&self) -> StageLifecycle {
        StageLifecycle::Install
    }

    fn counterpart_stage(&self) -> Option<&str> {
        Some("remove_features")
    }

    fn applies(&self, ctx: &PipelineContext) -> bool {
        has_requested_features(ctx)
    }

    fn run(&self, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let resolved = match ctx.resolved_features() {
            Some(resolved) => resolved.to_vec(),
            None => requested_features(ctx),
        };
        let fresh = ctx.is_fresh_install() || ctx.is_force_reinit();

        let mut installed = Vec::new();
        for feature in resolved {
            if !fresh && ctx.selections.previous_features.contains(&feature) {
                continue;
            }
            ctx.services
                .features
                .install_feature(&feature, &ctx.selections.agents)?;
            installed.push(feature);
        }

        let message = if installed.is_empty() {
            "No new features to install".to_string()
        } else {
            format!(
                "Installed {} feature(s): {}",
                installed.len(),
                installed.join(", ")
            )
        };
        Ok(StageOutcome::success_with(
            message,
            StageData::FeaturesInstalled(installed),
        ))
    }
}
