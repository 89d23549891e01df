use async_trait::async_trait;
use mailrule_error::MailError;

use crate::entities::{EmailRecord, Label};

/// Read and mutate operations of a mail provider.
///
/// Message ids are whatever the provider hands out from
/// [`fetch_message_ids`](MailboxPort::fetch_message_ids); label ids come from
/// [`list_labels`](MailboxPort::list_labels) or
/// [`create_label`](MailboxPort::create_label).
#[async_trait]
pub trait MailboxPort: Send + Sync {
    async fn fetch_message_ids(&self, limit: usize) -> Result<Vec<String>, MailError>;

    async fn get_message_metadata(&self, id: &str) -> Result<EmailRecord, MailError>;

    async fn mark_read(&self, id: &str) -> Result<(), MailError>;

    async fn mark_unread(&self, id: &str) -> Result<(), MailError>;

    async fn list_labels(&self) -> Result<Vec<Label>, MailError>;

    async fn create_label(&self, name: &str) -> Result<Label, MailError>;

    async fn apply_label(&self, id: &str, label_id: &str) -> Result<(), MailError>;

    async fn close(&self) -> Result<(), MailError>;
}

/// Persistence for fetched records, keyed by provider message id.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or replace; storing an existing id overwrites it.
    async fn upsert(&self, record: &EmailRecord) -> Result<(), MailError>;

    async fn fetch_all(&self) -> Result<Vec<EmailRecord>, MailError>;

    async fn close(&self) -> Result<(), MailError>;
}
