//! Output formatting for the CLI.
//!
//! Renders change sets and run reports as colored text tables or JSON.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::error::SyncError;
use crate::planner::{ChangeOperation, ExecutionReport, OpKind, Outcome, SyncMode};
use crate::reconciler::SyncOutcome;

use super::commands::OutputFormat;

/// Maximum width of the changes column.
const CHANGES_WIDTH: usize = 60;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Operation row for table display.
#[derive(Tabled)]
struct OperationRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Identity")]
    identity: String,
    #[tabled(rename = "Changes")]
    changes: String,
    #[tabled(rename = "Result")]
    result: String,
}

/// JSON view of a run.
#[derive(Serialize)]
struct OutcomeJson<'a> {
    run_id: String,
    source: String,
    target: String,
    branch: &'a str,
    mode: SyncMode,
    digest: &'a str,
    summary: SummaryJson,
    cancelled: bool,
    operations: Vec<OperationJson<'a>>,
}

#[derive(Serialize)]
struct SummaryJson {
    creates: usize,
    updates: usize,
    deletes: usize,
    unchanged: usize,
    applied: usize,
    failed: usize,
    skipped: usize,
}

#[derive(Serialize)]
struct OperationJson<'a> {
    #[serde(flatten)]
    operation: &'a ChangeOperation,
    #[serde(flatten)]
    outcome: &'a Outcome,
    attempts: u32,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the result of a run.
    #[must_use]
    pub fn format_outcome(&self, outcome: &SyncOutcome) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&Self::outcome_json(outcome)).unwrap_or_default(),
            OutputFormat::Text => Self::format_outcome_text(outcome),
        }
    }

    /// Formats a fatal error.
    #[must_use]
    pub fn format_error(&self, error: &SyncError) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                "error": error.to_string(),
                "branch_not_found": error.is_branch_not_found(),
            }))
            .unwrap_or_default(),
            OutputFormat::Text => format!("{} {error}", "error:".red().bold()),
        }
    }

    fn outcome_json(outcome: &SyncOutcome) -> OutcomeJson<'_> {
        let report = &outcome.report;
        OutcomeJson {
            run_id: outcome.run_id.to_string(),
            source: outcome.source.to_string(),
            target: outcome.target.to_string(),
            branch: &report.branch.name,
            mode: report.mode,
            digest: &outcome.digest,
            summary: SummaryJson {
                creates: outcome.change_set.count(OpKind::Create),
                updates: outcome.change_set.count(OpKind::Update),
                deletes: outcome.change_set.count(OpKind::Delete),
                unchanged: outcome.change_set.unchanged(),
                applied: report.applied(),
                failed: report.failed(),
                skipped: report.skipped(),
            },
            cancelled: report.cancelled,
            operations: report
                .entries
                .iter()
                .map(|e| OperationJson {
                    operation: &e.operation,
                    outcome: &e.outcome,
                    attempts: e.attempts,
                })
                .collect(),
        }
    }

    fn format_outcome_text(outcome: &SyncOutcome) -> String {
        let report = &outcome.report;
        let mut output = String::new();

        let _ = writeln!(
            output,
            "\n{} {} -> {} on branch {} ({})",
            "Sync".bold(),
            outcome.source,
            outcome.target,
            report.branch.to_string().cyan(),
            report.mode
        );
        let _ = writeln!(output, "   Run: {}", outcome.run_id);

        if outcome.change_set.is_empty() {
            let _ = writeln!(
                output,
                "\n{} No changes required ({} resources in sync).",
                "ok".green(),
                outcome.change_set.unchanged()
            );
            return output;
        }

        let _ = writeln!(output, "   Digest: {}\n", outcome.change_set.short_digest());
        output.push_str(&Self::operations_table(report));
        output.push('\n');

        let _ = writeln!(
            output,
            "\nPlan: {} to create, {} to update, {} to delete, {} unchanged",
            outcome.change_set.count(OpKind::Create).to_string().green(),
            outcome.change_set.count(OpKind::Update).to_string().yellow(),
            outcome.change_set.count(OpKind::Delete).to_string().red(),
            outcome.change_set.unchanged()
        );

        match report.mode {
            SyncMode::DryRun => {
                let _ = writeln!(
                    output,
                    "\nDry run: nothing was changed. Re-run with --sync --expect-digest {} to apply exactly this plan.",
                    outcome.change_set.short_digest()
                );
            }
            SyncMode::Commit => {
                let summary = report.to_string();
                let line = if report.has_failures() || report.cancelled {
                    summary.yellow().to_string()
                } else {
                    summary.green().to_string()
                };
                let _ = writeln!(output, "\n{line}");
                if report.cancelled {
                    let _ = writeln!(output, "{} Run was cancelled; remaining operations were not applied.", "warning:".yellow());
                }
            }
        }

        output
    }

    fn operations_table(report: &ExecutionReport) -> String {
        let rows: Vec<OperationRow> = report
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let op = &entry.operation;
                OperationRow {
                    index: i + 1,
                    action: Self::format_op_kind(op.op_kind),
                    kind: op.kind.to_string(),
                    identity: op.identity_key.clone(),
                    changes: Self::truncate(&Self::changes(op), CHANGES_WIDTH),
                    result: Self::format_result(&entry.outcome),
                }
            })
            .collect();

        Table::new(rows).to_string()
    }

    fn changes(op: &ChangeOperation) -> String {
        match op.op_kind {
            OpKind::Update => op.changes_summary(),
            OpKind::Create => op
                .desired
                .as_ref()
                .map(|r| {
                    r.attributes
                        .iter()
                        .map(|(k, v)| format!("{k}={v}"))
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default(),
            OpKind::Delete => op.native_id().map(|id| format!("id {id}")).unwrap_or_default(),
        }
    }

    /// Formats an operation kind with color.
    fn format_op_kind(op_kind: OpKind) -> String {
        let label = format!("{}{}", op_kind.symbol(), op_kind.as_str());
        match op_kind {
            OpKind::Create => label.green().to_string(),
            OpKind::Update => label.yellow().to_string(),
            OpKind::Delete => label.red().to_string(),
        }
    }

    fn format_result(outcome: &Outcome) -> String {
        match outcome {
            Outcome::Applied => "applied".green().to_string(),
            Outcome::Failed(reason) => format!("{}: {}", "failed".red(), Self::truncate(reason, 40)),
            Outcome::Skipped(reason) => format!("skipped ({reason})").dimmed().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}
