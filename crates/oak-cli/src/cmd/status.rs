use crate::output::{print_json, print_table};
use anyhow::Context;
use oak_core::{config::OakConfig, config::OAK_VERSION, paths, state::OakState};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct StatusOutput<'a> {
    root: String,
    version: &'a str,
    binary_version: &'a str,
    agents: &'a [String],
    ides: &'a [String],
    features: &'a [String],
    skills: &'a [String],
    created_files: usize,
    modified_files: usize,
    directories: usize,
    migrations: usize,
}

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    if !paths::config_path(root).exists() {
        anyhow::bail!(
            "not initialized: run 'oak init' first (no .oak/config.yaml found in {})",
            root.display()
        );
    }
    let config = OakConfig::load(root).context("failed to load .oak/config.yaml")?;
    let state = OakState::load(root).context("failed to load .oak/state.yaml")?;
    let assets = &state.managed_assets;

    let status = StatusOutput {
        root: root.display().to_string(),
        version: &config.version,
        binary_version: OAK_VERSION,
        agents: &config.agents,
        ides: &config.ides,
        features: &config.features.enabled,
        skills: &config.skills.installed,
        created_files: assets.created_files.len(),
        modified_files: assets.modified_files.len(),
        directories: assets.directories.len(),
        migrations: state.migrations.len(),
    };

    if json {
        return print_json(&status);
    }

    println!("Project: {}", status.root);
    if status.version == OAK_VERSION {
        println!("Version: {}", status.version);
    } else {
        println!(
            "Version: {} (binary is {OAK_VERSION}, run 'oak upgrade')",
            status.version
        );
    }
    println!();

    let list = |items: &[String]| {
        if items.is_empty() {
            "(none)".to_string()
        } else {
            items.join(", ")
        }
    };
    print_table(
        &["SELECTION", "VALUES"],
        vec![
            vec!["agents".into(), list(status.agents)],
            vec!["ides".into(), list(status.ides)],
            vec!["features".into(), list(status.features)],
            vec!["skills".into(), list(status.skills)],
        ],
    );
    println!();
    print_table(
        &["TRACKED", "COUNT"],
        vec![
            vec!["created files".into(), status.created_files.to_string()],
            vec!["modified files".into(), status.modified_files.to_string()],
            vec!["directories".into(), status.directories.to_string()],
            vec!["applied migrations".into(), status.migrations.to_string()],
        ],
    );
    Ok(())
}
