use mailrule_domain::{EmailRecord, RuleSet};
use mailrule_error::MailError;

use crate::actions::{ActionReport, ActionStatus};
use crate::loader::RuleWarning;
use crate::service::{BatchReport, RecordOutcome, SyncReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Compact,
    Expanded,
    Full,
}

impl Format {
    pub fn parse(s: Option<&str>) -> Result<Self, MailError> {
        match s.map(|v| v.trim().to_lowercase()).as_deref() {
            None | Some("compact") => Ok(Self::Compact),
            Some("expanded") => Ok(Self::Expanded),
            Some("full") | Some("json") => Ok(Self::Full),
            Some(other) => Err(MailError::invalid_input(format!(
                "unknown format: {other} (expected compact, expanded or full)"
            ))),
        }
    }

    fn max_subject(self) -> usize {
        if self == Self::Expanded {
            0
        } else {
            60
        }
    }
}

pub fn format_sync(report: &SyncReport, fmt: Format) -> String {
    match fmt {
        Format::Compact | Format::Expanded => sync_lines(report).join("\n"),
        Format::Full => to_json(report),
    }
}

pub fn format_batch(report: &BatchReport, fmt: Format) -> String {
    match fmt {
        Format::Compact | Format::Expanded => {
            let mut lines: Vec<String> = Vec::with_capacity(report.records.len() + 4);
            if let Some(ref sync) = report.sync {
                lines.extend(sync_lines(sync));
            }
            lines.push(format!(
                "{} records: {} matched, {} failed, {} action failures",
                report.records.len(),
                report.matched(),
                report.failed(),
                report.action_failures()
            ));
            let max = fmt.max_subject();
            for rec in &report.records {
                let subject = if max > 0 {
                    truncate(&rec.subject, max)
                } else {
                    clean_text(&rec.subject)
                };
                let detail = match &rec.outcome {
                    RecordOutcome::NoMatch => "no match".to_string(),
                    RecordOutcome::Matched { actions } if actions.is_empty() => {
                        "matched, no actions".to_string()
                    }
                    RecordOutcome::Matched { actions } => actions
                        .iter()
                        .map(format_action_report)
                        .collect::<Vec<_>>()
                        .join(", "),
                    RecordOutcome::Failed { error } => format!("FAILED {}", error.to_compact()),
                };
                lines.push(format!("  [{}] {subject}: {detail}", rec.id));
            }
            lines.join("\n")
        }
        Format::Full => to_json(report),
    }
}

pub fn format_records(records: &[EmailRecord], fmt: Format) -> String {
    match fmt {
        Format::Compact | Format::Expanded => {
            let max = fmt.max_subject();
            let mut lines: Vec<String> = Vec::with_capacity(records.len() + 1);
            lines.push(format!("{} stored records:", records.len()));
            for r in records {
                let subject = if max > 0 {
                    truncate(&r.subject, max)
                } else {
                    clean_text(&r.subject)
                };
                lines.push(format!("  [{}] {} | {} | {subject}", r.id, r.date, r.sender));
                if fmt == Format::Expanded && !r.snippet.is_empty() {
                    lines.push(format!("      {}", clean_text(&r.snippet)));
                }
            }
            lines.join("\n")
        }
        Format::Full => to_json(records),
    }
}

pub fn format_rule_check(rule_set: &RuleSet, warnings: &[RuleWarning], fmt: Format) -> String {
    match fmt {
        Format::Compact | Format::Expanded => {
            let mut lines = vec![format!(
                "{} of {} conditions -> {}",
                rule_set.predicate,
                rule_set.conditions.len(),
                rule_set
                    .actions
                    .iter()
                    .map(|a| a.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )];
            for (i, cond) in rule_set.conditions.iter().enumerate() {
                lines.push(format!("  {i}: {cond}"));
            }
            if warnings.is_empty() {
                lines.push("ok".to_string());
            } else {
                lines.push(format!("{} warnings:", warnings.len()));
                for w in warnings {
                    lines.push(format!("  {w}"));
                }
            }
            lines.join("\n")
        }
        Format::Full => to_json(&serde_json::json!({
            "rules": rule_set,
            "warnings": warnings,
        })),
    }
}

fn sync_lines(report: &SyncReport) -> Vec<String> {
    let mut lines = Vec::with_capacity(report.failed.len() + 2);
    match report.error {
        Some(ref e) => lines.push(format!("sync failed: {}", e.to_compact())),
        None => lines.push(format!(
            "synced {} of {} messages",
            report.stored, report.listed
        )),
    }
    for f in &report.failed {
        lines.push(format!("  [{}] {}", f.id, f.error.to_compact()));
    }
    lines
}

fn format_action_report(report: &ActionReport) -> String {
    match &report.status {
        ActionStatus::Done => report.action.to_string(),
        ActionStatus::Ignored => format!("{} (ignored)", report.action),
        ActionStatus::Failed { error } => format!("{} FAILED [{}]", report.action, error.code),
    }
}

fn clean_text(s: &str) -> String {
    let clean: String = s.chars().filter(|c| *c != '\r').collect();
    clean.replace('\n', " ")
}

fn truncate(s: &str, max: usize) -> String {
    let oneline = clean_text(s);
    if oneline.chars().count() > max {
        let truncated: String = oneline.chars().take(max).collect();
        format!("{truncated}...")
    } else {
        oneline
    }
}

fn to_json<T: serde::Serialize + ?Sized>(val: &T) -> String {
    serde_json::to_string_pretty(val).unwrap_or_else(|e| format!("serialization error: {e}"))
}
