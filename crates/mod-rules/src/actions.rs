//! Action dispatch against the mailbox port.

use mailrule_domain::{Action, EmailRecord, MailboxPort};
use mailrule_error::{ErrorResponse, MailError};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionStatus {
    Done,
    Ignored,
    Failed { error: ErrorResponse },
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionReport {
    pub action: Action,
    #[serde(flatten)]
    pub status: ActionStatus,
}

impl ActionReport {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, ActionStatus::Failed { .. })
    }
}

/// Runs `actions` in order for one record.
///
/// A failing action is logged and reported; the remaining actions still run.
pub async fn apply_actions(
    record: &EmailRecord,
    actions: &[Action],
    mailbox: &dyn MailboxPort,
) -> Vec<ActionReport> {
    let mut reports = Vec::with_capacity(actions.len());

    for action in actions {
        let status = match run_action(record, action, mailbox).await {
            Ok(true) => {
                info!(record_id = %record.id, %action, "action applied");
                ActionStatus::Done
            }
            Ok(false) => {
                debug!(record_id = %record.id, %action, "unknown action ignored");
                ActionStatus::Ignored
            }
            Err(e) => {
                warn!(record_id = %record.id, %action, error = %e, "action failed");
                ActionStatus::Failed {
                    error: ErrorResponse::from(&e),
                }
            }
        };
        reports.push(ActionReport {
            action: action.clone(),
            status,
        });
    }

    reports
}

async fn run_action(
    record: &EmailRecord,
    action: &Action,
    mailbox: &dyn MailboxPort,
) -> Result<bool, MailError> {
    match action {
        Action::MarkRead => mailbox.mark_read(&record.id).await?,
        Action::MarkUnread => mailbox.mark_unread(&record.id).await?,
        Action::Move(label) => {
            let label_id = resolve_label(mailbox, label).await?;
            mailbox.apply_label(&record.id, &label_id).await?;
        }
        Action::Other(_) => return Ok(false),
    }
    Ok(true)
}

/// Finds `name` among the provider's labels, creating it when absent.
pub async fn resolve_label(mailbox: &dyn MailboxPort, name: &str) -> Result<String, MailError> {
    let wanted = name.to_lowercase();
    let existing = mailbox
        .list_labels()
        .await?
        .into_iter()
        .find(|l| l.name.to_lowercase() == wanted);

    if let Some(label) = existing {
        return Ok(label.id);
    }

    let created = mailbox.create_label(name).await?;
    info!(label = name, label_id = %created.id, "label created");
    Ok(created.id)
}
