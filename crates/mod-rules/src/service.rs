use std::str::FromStr;
use std::sync::Arc;

use mailrule_domain::{MailboxPort, RecordStore, RuleSet};
use mailrule_error::{ErrorResponse, MailError};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::actions::{apply_actions, ActionReport};
use crate::engine::evaluate;

const DEFAULT_FETCH_LIMIT: usize = 10;
const MAX_FETCH_LIMIT: usize = 500;

/// What to do with a record whose date (or a rule's date) cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DateErrorPolicy {
    /// Report the record as failed and continue with the next one.
    Skip,
    /// Stop the batch and return the error.
    Abort,
}

impl FromStr for DateErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "abort" => Ok(Self::Abort),
            _ => Err(format!("unknown date error policy: {s} (expected skip or abort)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub fetch_limit: usize,
    pub on_date_error: DateErrorPolicy,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            fetch_limit: DEFAULT_FETCH_LIMIT,
            on_date_error: DateErrorPolicy::Skip,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncFailure {
    pub id: String,
    pub error: ErrorResponse,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub listed: usize,
    pub stored: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<SyncFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecordOutcome {
    NoMatch,
    Matched { actions: Vec<ActionReport> },
    Failed { error: ErrorResponse },
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordReport {
    pub id: String,
    pub subject: String,
    #[serde(flatten)]
    pub outcome: RecordOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncReport>,
    pub records: Vec<RecordReport>,
}

impl BatchReport {
    pub fn matched(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, RecordOutcome::Matched { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, RecordOutcome::Failed { .. }))
            .count()
    }

    pub fn action_failures(&self) -> usize {
        self.records
            .iter()
            .map(|r| match &r.outcome {
                RecordOutcome::Matched { actions } => {
                    actions.iter().filter(|a| a.is_failed()).count()
                }
                _ => 0,
            })
            .sum()
    }
}

/// Fetches mail into the store and applies one rule set to what is stored.
///
/// Records and their actions are handled strictly one after another.
pub struct RuleService {
    mailbox: Arc<dyn MailboxPort>,
    store: Arc<dyn RecordStore>,
    settings: ServiceSettings,
}

impl RuleService {
    pub fn new(
        mailbox: Arc<dyn MailboxPort>,
        store: Arc<dyn RecordStore>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            mailbox,
            store,
            settings,
        }
    }

    /// Copies the newest inbox messages into the store.
    ///
    /// A message that cannot be fetched or stored is logged and counted; the
    /// rest are still synced. Failing to list the inbox is an error.
    pub async fn sync_inbox(&self) -> Result<SyncReport, MailError> {
        let limit = clamp(self.settings.fetch_limit, 1, MAX_FETCH_LIMIT, DEFAULT_FETCH_LIMIT);
        let ids = self.mailbox.fetch_message_ids(limit).await?;

        let mut report = SyncReport {
            listed: ids.len(),
            ..SyncReport::default()
        };

        for id in ids {
            let stored = match self.mailbox.get_message_metadata(&id).await {
                Ok(record) => self.store.upsert(&record).await,
                Err(e) => Err(e),
            };
            match stored {
                Ok(()) => {
                    debug!(message_id = %id, "stored");
                    report.stored += 1;
                }
                Err(e) => {
                    warn!(message_id = %id, error = %e, "sync failed for message");
                    report.failed.push(SyncFailure {
                        id,
                        error: ErrorResponse::from(&e),
                    });
                }
            }
        }

        info!(
            listed = report.listed,
            stored = report.stored,
            failed = report.failed.len(),
            "inbox synced"
        );
        Ok(report)
    }

    /// Evaluates every stored record and applies the actions of matches.
    pub async fn process_stored(&self, rule_set: &RuleSet) -> Result<BatchReport, MailError> {
        let records = self.store.fetch_all().await?;
        let mut report = BatchReport::default();

        for record in &records {
            let outcome = match evaluate(record, rule_set) {
                Ok(false) => RecordOutcome::NoMatch,
                Ok(true) => {
                    let actions =
                        apply_actions(record, &rule_set.actions, self.mailbox.as_ref()).await;
                    RecordOutcome::Matched { actions }
                }
                Err(e) if e.is_date_parse() && self.skips_bad_dates() => {
                    warn!(record_id = %record.id, error = %e, "record skipped");
                    RecordOutcome::Failed {
                        error: ErrorResponse::from(&e),
                    }
                }
                Err(e) => {
                    error!(record_id = %record.id, error = %e, "batch aborted");
                    return Err(e);
                }
            };
            debug!(record_id = %record.id, ?outcome, "evaluated");
            report.records.push(RecordReport {
                id: record.id.clone(),
                subject: record.subject.clone(),
                outcome,
            });
        }

        info!(
            records = report.records.len(),
            matched = report.matched(),
            failed = report.failed(),
            action_failures = report.action_failures(),
            "rules applied"
        );
        Ok(report)
    }

    /// Syncs, then processes. A failed sync is reported and processing goes
    /// ahead over whatever is already stored.
    pub async fn run(&self, rule_set: &RuleSet) -> Result<BatchReport, MailError> {
        let sync = match self.sync_inbox().await {
            Ok(sync) => sync,
            Err(e) => {
                warn!(error = %e, "sync failed, processing stored records");
                SyncReport {
                    error: Some(ErrorResponse::from(&e)),
                    ..SyncReport::default()
                }
            }
        };

        let mut report = self.process_stored(rule_set).await?;
        report.sync = Some(sync);
        Ok(report)
    }

    fn skips_bad_dates(&self) -> bool {
        self.settings.on_date_error == DateErrorPolicy::Skip
    }

    /// Closes both collaborators; both are attempted even if the first fails.
    pub async fn shutdown(&self) -> Result<(), MailError> {
        let mailbox = self.mailbox.close().await;
        let store = self.store.close().await;
        mailbox.and(store)
    }
}

fn clamp(val: usize, min: usize, max: usize, default: usize) -> usize {
    if val == 0 {
        default
    } else {
        val.max(min).min(max)
    }
}
