//! In-memory port fakes for unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use mailrule_domain::{EmailRecord, Label, MailboxPort, RecordStore};
use mailrule_error::MailError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FetchIds(usize),
    Metadata(String),
    MarkRead(String),
    MarkUnread(String),
    ListLabels,
    CreateLabel(String),
    ApplyLabel(String, String),
    Close,
}

/// Mailbox that records every call. Operations named in `failing` (either
/// `"op"` or `"op:id"`) return an api error after being recorded.
#[derive(Default)]
pub struct RecordingMailbox {
    calls: Mutex<Vec<Call>>,
    labels: Mutex<Vec<Label>>,
    messages: Vec<EmailRecord>,
    failing: Vec<String>,
}

impl RecordingMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_labels(self, names: &[&str]) -> Self {
        *self.labels.lock().unwrap() = names
            .iter()
            .enumerate()
            .map(|(i, n)| Label {
                id: format!("Label_{i}"),
                name: n.to_string(),
            })
            .collect();
        self
    }

    pub fn with_messages(mut self, messages: Vec<EmailRecord>) -> Self {
        self.messages = messages;
        self
    }

    pub fn failing(mut self, op: &str) -> Self {
        self.failing.push(op.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call, op: &str, id: Option<&str>) -> Result<(), MailError> {
        self.calls.lock().unwrap().push(call);
        let keyed = id.map(|id| format!("{op}:{id}"));
        if self
            .failing
            .iter()
            .any(|f| f == op || Some(f) == keyed.as_ref())
        {
            return Err(MailError::api(format!("{op} rejected")));
        }
        Ok(())
    }
}

#[async_trait]
impl MailboxPort for RecordingMailbox {
    async fn fetch_message_ids(&self, limit: usize) -> Result<Vec<String>, MailError> {
        self.record(Call::FetchIds(limit), "fetch_ids", None)?;
        Ok(self
            .messages
            .iter()
            .take(limit)
            .map(|m| m.id.clone())
            .collect())
    }

    async fn get_message_metadata(&self, id: &str) -> Result<EmailRecord, MailError> {
        self.record(Call::Metadata(id.to_string()), "metadata", Some(id))?;
        self.messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| MailError::not_found(id.to_string()))
    }

    async fn mark_read(&self, id: &str) -> Result<(), MailError> {
        self.record(Call::MarkRead(id.to_string()), "mark_read", Some(id))
    }

    async fn mark_unread(&self, id: &str) -> Result<(), MailError> {
        self.record(Call::MarkUnread(id.to_string()), "mark_unread", Some(id))
    }

    async fn list_labels(&self) -> Result<Vec<Label>, MailError> {
        self.record(Call::ListLabels, "list_labels", None)?;
        Ok(self.labels.lock().unwrap().clone())
    }

    async fn create_label(&self, name: &str) -> Result<Label, MailError> {
        self.record(Call::CreateLabel(name.to_string()), "create_label", None)?;
        let mut labels = self.labels.lock().unwrap();
        let label = Label {
            id: format!("Label_{}", labels.len()),
            name: name.to_string(),
        };
        labels.push(label.clone());
        Ok(label)
    }

    async fn apply_label(&self, id: &str, label_id: &str) -> Result<(), MailError> {
        self.record(
            Call::ApplyLabel(id.to_string(), label_id.to_string()),
            "apply_label",
            Some(id),
        )
    }

    async fn close(&self) -> Result<(), MailError> {
        self.record(Call::Close, "close", None)
    }
}

/// Store backed by a vector; `failing_ids` reject upserts.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<EmailRecord>>,
    failing_ids: Vec<String>,
    closed: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<EmailRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    pub fn failing_on(mut self, id: &str) -> Self {
        self.failing_ids.push(id.to_string());
        self
    }

    pub fn records(&self) -> Vec<EmailRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn upsert(&self, record: &EmailRecord) -> Result<(), MailError> {
        if self.failing_ids.contains(&record.id) {
            return Err(MailError::storage(format!("disk full writing {}", record.id)));
        }
        let mut records = self.records.lock().unwrap();
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<EmailRecord>, MailError> {
        Ok(self.records())
    }

    async fn close(&self) -> Result<(), MailError> {
        *self.closed.lock().unwrap() = true;
        Ok(())
    }
}

pub fn record(id: &str, subject: &str, sender: &str, date: &str) -> EmailRecord {
    EmailRecord {
        id: id.to_string(),
        subject: subject.to_string(),
        sender: sender.to_string(),
        snippet: format!("snippet of {subject}"),
        date: date.to_string(),
    }
}
