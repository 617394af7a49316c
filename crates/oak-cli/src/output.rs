use oak_core::pipeline::{
    PipelineBuilder, PipelineContext, PipelineResult, Stage, StageOutcome, StageResult,
};
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    // Calculate column widths
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let header_row: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
        .collect();
    println!("{}", header_row.join("  "));

    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep.join("  "));

    for row in &rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:width$}", cell, width = w)
            })
            .collect();
        println!("{}", cells.join("  "));
    }
}

fn marker(result: StageResult) -> &'static str {
    match result {
        StageResult::Success => "✓",
        StageResult::Skipped => "-",
        StageResult::Failed => "✗",
    }
}

pub fn stage_line(display_name: &str, outcome: &StageOutcome) -> String {
    let mark = marker(outcome.result);
    if outcome.message.is_empty() {
        format!("  {mark} {display_name}")
    } else {
        format!("  {mark} {display_name} — {}", outcome.message)
    }
}

/// Attach a progress printer unless the run reports as JSON.
pub fn with_progress(builder: PipelineBuilder, json: bool) -> PipelineBuilder {
    if json {
        return builder;
    }
    builder.on_stage_complete(|stage: &dyn Stage, outcome: &StageOutcome| {
        println!("{}", stage_line(stage.display_name(), outcome));
    })
}

#[derive(Serialize)]
struct RunReport<'a> {
    #[serde(flatten)]
    result: &'a PipelineResult,
    warnings: Vec<StageMessage<'a>>,
    errors: Vec<StageMessage<'a>>,
}

#[derive(Serialize)]
struct StageMessage<'a> {
    stage: &'a str,
    message: &'a str,
}

fn messages(pairs: &[(String, String)]) -> Vec<StageMessage<'_>> {
    pairs
        .iter()
        .map(|(stage, message)| StageMessage { stage, message })
        .collect()
}

/// Print the outcome of a pipeline run: the JSON report, or the warnings
/// and failures after the progress lines.
pub fn print_run(ctx: &PipelineContext, result: &PipelineResult, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&RunReport {
            result,
            warnings: messages(&ctx.warnings),
            errors: messages(&ctx.errors),
        });
    }
    if !ctx.warnings.is_empty() {
        println!("\nWarnings:");
        for (stage, message) in &ctx.warnings {
            println!("  {stage}: {message}");
        }
    }
    if !result.stages_failed.is_empty() {
        println!("\nFailed:");
        for (stage, reason) in &result.stages_failed {
            println!("  {stage}: {reason}");
        }
    }
    Ok(())
}
