//! Rule evaluation and dispatch for fetched mail.

pub mod actions;
pub mod condition;
pub mod date;
pub mod engine;
pub mod format;
pub mod loader;
pub mod service;

#[cfg(test)]
mod testing;

pub use actions::{apply_actions, resolve_label, ActionReport, ActionStatus};
pub use condition::evaluate_condition;
pub use engine::evaluate;
pub use loader::{load_rules, parse_rules, validate, RuleWarning};
pub use service::{
    BatchReport, DateErrorPolicy, RecordOutcome, RecordReport, RuleService, ServiceSettings,
    SyncFailure, SyncReport,
};
