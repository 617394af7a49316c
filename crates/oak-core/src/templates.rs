//! Embedded command, skill and IDE templates.
//!
//! Command and skill bodies use `{{ placeholder }}` slots that are filled
//! per agent by [`crate::services::TemplateRenderer`].

/// Command template for `oak.<command>` by command name.
pub fn command_template(command: &str) -> Option<&'static str> {
    let body = match command {
        "constitution-create" => CONSTITUTION_CREATE,
        "constitution-validate" => CONSTITUTION_VALIDATE,
        "constitution-amend" => CONSTITUTION_AMEND,
        "rfc-create" => RFC_CREATE,
        "rfc-list" => RFC_LIST,
        "rfc-validate" => RFC_VALIDATE,
        "issue-plan" => ISSUE_PLAN,
        "issue-validate" => ISSUE_VALIDATE,
        "issue-implement" => ISSUE_IMPLEMENT,
        _ => return None,
    };
    Some(body)
}

/// `SKILL.md` body by skill name.
pub fn skill_template(skill: &str) -> Option<&'static str> {
    match skill {
        "planning-workflow" => Some(PLANNING_WORKFLOW_SKILL),
        "research-synthesis" => Some(RESEARCH_SYNTHESIS_SKILL),
        _ => None,
    }
}

/// Settings template by IDE name, with the file name it is stored under in
/// `.oak/ide/`.
pub fn ide_template(ide: &str) -> Option<(&'static str, &'static str)> {
    match ide {
        "vscode" => Some(("vscode-settings.json", VSCODE_SETTINGS)),
        "cursor" => Some(("cursor-settings.json", CURSOR_SETTINGS)),
        _ => None,
    }
}

/// Section appended to agent instruction files once a constitution exists.
pub fn constitution_reference(relative_path: &str) -> String {
    format!(
        r#"---
## Project Constitution

This project follows engineering standards and conventions defined in the project constitution.

**Read the constitution first:** [{relative_path}]({relative_path})

The constitution defines:
- Architecture principles and patterns
- Code standards and best practices
- Testing requirements
- Documentation standards
- Governance and decision-making processes

All suggestions and code generated must align with the constitution.
"#
    )
}

// ---------------------------------------------------------------------------
// Constitution commands
// ---------------------------------------------------------------------------

const CONSTITUTION_CREATE: &str = r#"---
description: Create the project constitution from the codebase and team decisions.
---

# Create Constitution

You are {{ agent_display_name }}, drafting `oak/constitution.md` for this project.

1. Survey the repository: languages, build tooling, test layout, CI configuration.
2. Ask the user for decisions you cannot infer (testing strategy, review policy,
   documentation level).
3. Write the constitution with the sections Metadata, Principles, Architecture,
   Code Standards, Testing, Documentation and Governance.
4. Use declarative MUST / SHOULD / MAY language. Avoid vague wording.

{{ research_strategy }}

When finished, suggest `{{ command_prefix }}oak.constitution-validate`.
"#;

const CONSTITUTION_VALIDATE: &str = r#"---
description: Validate the project constitution for structure and quality.
---

# Validate Constitution

Check `oak/constitution.md`:

- Every required section is present and non-empty.
- Metadata carries a semantic version and ISO ratification date.
- No template tokens such as `{PROJECT_NAME}` remain.
- Normative sections use declarative language.

Report findings grouped by priority (high, medium, low) and offer fixes.
"#;

const CONSTITUTION_AMEND: &str = r#"---
description: Amend the project constitution and bump its version.
---

# Amend Constitution

Ask the user for the change and classify it:

- **major**: breaking change to an existing rule
- **minor**: new requirement
- **patch**: clarification only

Apply the change to `oak/constitution.md`, bump the version accordingly, set
`last_amendment` to today, and append an entry to the amendment log.
"#;

// ---------------------------------------------------------------------------
// RFC commands
// ---------------------------------------------------------------------------

const RFC_CREATE: &str = r#"---
description: Draft a new RFC in oak/rfc/.
---

# Create RFC

You are {{ agent_display_name }}. Draft a Request for Comments for the change
the user describes.

1. Read `oak/constitution.md` and keep the proposal consistent with it.
2. Pick the next RFC number in `oak/rfc/`.
3. Fill in Summary, Motivation, Detailed Design, Alternatives, Risks and
   Open Questions.

{{ research_strategy }}

Finish by running `{{ command_prefix }}oak.rfc-validate` on the new file.
"#;

const RFC_LIST: &str = r#"---
description: List RFCs with their status.
---

# List RFCs

List every RFC under `oak/rfc/` as a table of number, title, status and last
modified date. Flag drafts older than 60 days as stale.
"#;

const RFC_VALIDATE: &str = r#"---
description: Validate an RFC for completeness and constitution alignment.
---

# Validate RFC

For the RFC the user names (or the most recent one):

- Confirm every required section has real content, not placeholder prompts.
- Check the proposal against `oak/constitution.md`.
- List open questions that block approval.
"#;

// ---------------------------------------------------------------------------
// Issue commands
// ---------------------------------------------------------------------------

const ISSUE_PLAN: &str = r#"---
description: Plan implementation of a tracked issue.
---

# Plan Issue

You are {{ agent_display_name }}. Fetch the issue the user references and write
`oak/issue/<provider>/<id>/plan.md` with the sections Objectives,
Environment / Constraints, Risks & Mitigations, Dependencies and
Definition of Done.

{{ research_strategy }}

Keep raw API payloads in `context.json`; that file is ignored by git.
"#;

const ISSUE_VALIDATE: &str = r#"---
description: Validate an issue plan before implementation.
---

# Validate Issue Plan

Check the plan for the referenced issue:

- All plan sections are present and specific.
- Definition of Done items are testable.
- The plan follows `oak/constitution.md`.
"#;

const ISSUE_IMPLEMENT: &str = r#"---
description: Implement a planned issue.
---

# Implement Issue

Work through `plan.md` for the referenced issue task by task. Run the project
tests after each task and record decisions in `notes.md`.

When done, run `{{ command_prefix }}oak.issue-validate` again and summarise the
changes for review.
"#;

// ---------------------------------------------------------------------------
// Skills
// ---------------------------------------------------------------------------

const PLANNING_WORKFLOW_SKILL: &str = r#"---
name: planning-workflow
description: Break an issue or idea into an ordered, testable implementation plan.
version: 1.0.0
---

# Planning Workflow

1. Restate the goal in one sentence.
2. List constraints from `oak/constitution.md`.
3. Split the work into tasks that each end in a passing test.
4. Order tasks by dependency and call out risks.
"#;

const RESEARCH_SYNTHESIS_SKILL: &str = r#"---
name: research-synthesis
description: Collect and condense background research before planning.
version: 1.0.0
---

# Research Synthesis

Gather prior art from the codebase, linked issues and documentation. Summarise
findings as bullet points with a source for each, then list the open questions
that remain.
"#;

// ---------------------------------------------------------------------------
// IDE settings
// ---------------------------------------------------------------------------

const VSCODE_SETTINGS: &str = r#"{
  "chat.promptFilesRecommendations": {
    "oak.constitution-create": true,
    "oak.constitution-validate": true,
    "oak.constitution-amend": true,
    "oak.rfc-create": true,
    "oak.rfc-list": true,
    "oak.rfc-validate": true,
    "oak.issue-plan": true,
    "oak.issue-validate": true,
    "oak.issue-implement": true
  },
  "chat.tools.terminal.autoApprove": {
    "oak": true
  }
}
"#;

const CURSOR_SETTINGS: &str = r#"{
  "chat.promptFilesRecommendations": {
    "oak.constitution-create": true,
    "oak.constitution-validate": true,
    "oak.constitution-amend": true,
    "oak.rfc-create": true,
    "oak.rfc-list": true,
    "oak.rfc-validate": true,
    "oak.issue-plan": true,
    "oak.issue-validate": true,
    "oak.issue-implement": true
  },
  "chat.tools.terminal.autoApprove": {
    "oak": true
  }
}
"#;
