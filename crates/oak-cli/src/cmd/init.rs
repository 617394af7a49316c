use crate::output;
use anyhow::Context;
use oak_core::{
    config::OakConfig,
    paths,
    pipeline::{FlowType, PipelineBuilder, PipelineContext, PipelineResult, SelectionState},
    services::{
        agent::agent_names,
        feature::{feature_manifest, feature_names},
        ide::ide_names,
    },
};
use std::path::Path;

pub struct InitArgs {
    pub force: bool,
    pub agents: Vec<String>,
    pub ides: Vec<String>,
    pub features: Vec<String>,
    pub interactive: bool,
}

/// `oak init`: fresh install, update of an existing install, or forced
/// reinstall with `--force`.
pub fn run(root: &Path, args: InitArgs, json: bool) -> anyhow::Result<()> {
    validate_names(&args)?;

    let existing = if paths::config_path(root).exists() {
        Some(OakConfig::load(root).context("failed to load .oak/config.yaml")?)
    } else {
        None
    };
    let flow = choose_flow(existing.is_some(), args.force);
    let selections = build_selections(&args, existing.as_ref(), flow);

    let mut ctx = PipelineContext::new(root, flow)
        .with_selections(selections)
        .with_force(args.force)
        .with_interactive(args.interactive);
    if flow == FlowType::Update {
        ctx.seed_previous_selections()
            .context("failed to read the installed selections")?;
    }

    if !json {
        let verb = match flow {
            FlowType::Update => "Updating",
            FlowType::ForceReinit => "Reinstalling",
            _ => "Initializing",
        };
        println!("{verb} oak in: {}", root.display());
    }

    let mut pipeline = output::with_progress(PipelineBuilder::init(), json).build(true);
    let result = pipeline.execute(&mut ctx);
    output::print_run(&ctx, &result, json)?;
    finish(&result, flow, json)
}

/// An install counts once config.yaml exists. A `.oak/` left behind by an
/// interrupted init is finished as a fresh install.
fn choose_flow(config_exists: bool, force: bool) -> FlowType {
    if force {
        FlowType::ForceReinit
    } else if config_exists {
        FlowType::Update
    } else {
        FlowType::FreshInit
    }
}

/// Unspecified lists keep the installed values. With nothing installed
/// and no features given, every feature is selected.
fn build_selections(
    args: &InitArgs,
    existing: Option<&OakConfig>,
    flow: FlowType,
) -> SelectionState {
    let pick = |given: &[String], current: Option<&Vec<String>>| -> Vec<String> {
        if given.is_empty() {
            current.cloned().unwrap_or_default()
        } else {
            given.to_vec()
        }
    };
    let agents = pick(&args.agents, existing.map(|c| &c.agents));
    let ides = pick(&args.ides, existing.map(|c| &c.ides));
    let mut features = pick(&args.features, existing.map(|c| &c.features.enabled));
    if features.is_empty() && args.features.is_empty() && flow != FlowType::Update {
        features = feature_names().into_iter().map(String::from).collect();
    }
    SelectionState::new(agents, ides, features)
}

fn validate_names(args: &InitArgs) -> anyhow::Result<()> {
    check_known("agent", &args.agents, &agent_names())?;
    check_known("IDE", &args.ides, &ide_names())?;
    for feature in &args.features {
        feature_manifest(feature)?;
    }
    Ok(())
}

fn check_known(kind: &str, given: &[String], known: &[&str]) -> anyhow::Result<()> {
    if let Some(bad) = given.iter().find(|name| !known.contains(&name.as_str())) {
        anyhow::bail!("unknown {kind} '{bad}' (expected one of: {})", known.join(", "));
    }
    Ok(())
}

fn finish(result: &PipelineResult, flow: FlowType, json: bool) -> anyhow::Result<()> {
    if !result.success {
        let (stage, reason) = result
            .stages_failed
            .last()
            .cloned()
            .unwrap_or_else(|| ("unknown".to_string(), "no reason given".to_string()));
        anyhow::bail!("init failed at stage '{stage}': {reason}");
    }
    if !json {
        match flow {
            FlowType::Update => println!("\noak configuration updated."),
            _ => {
                println!("\noak initialized successfully.");
                println!("Next: run the oak commands from your agent, e.g. /oak.constitution-create");
            }
        }
    }
    Ok(())
}
