use crate::services::agent::{AgentCapabilities, AgentDefinition};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();

fn placeholder_re() -> &'static Regex {
    PLACEHOLDER_RE.get_or_init(|| Regex::new(r"\{\{\s*([a-z_]+)\s*\}\}").unwrap())
}

/// Fills `{{ name }}` slots in command and skill templates.
///
/// Placeholders without a value are left in place so a missing variable is
/// visible in the output rather than silently blank.
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer;

impl TemplateRenderer {
    pub fn render(&self, template: &str, vars: &BTreeMap<&'static str, String>) -> String {
        placeholder_re()
            .replace_all(template, |caps: &regex::Captures<'_>| match vars.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Variables describing one agent.
    pub fn agent_context(
        &self,
        agent: &AgentDefinition,
        capabilities: &AgentCapabilities,
    ) -> BTreeMap<&'static str, String> {
        let flag = |b: bool| if b { "true" } else { "false" }.to_string();
        BTreeMap::from([
            ("agent_name", agent.name.to_string()),
            ("agent_display_name", agent.display_name.to_string()),
            ("command_prefix", agent.command_prefix.to_string()),
            ("has_skills", flag(capabilities.has_skills)),
            ("has_background_agents", flag(capabilities.has_background_agents)),
            ("has_native_web", flag(capabilities.has_native_web)),
            ("has_mcp", flag(capabilities.has_mcp)),
            ("research_strategy", capabilities.research_strategy.clone()),
        ])
    }
}
