//! Rule-file loading and validation.

use std::fmt;
use std::path::Path;

use mailrule_domain::{
    Action, Condition, ConditionField, ConditionPredicate, MatchPredicate, RuleSet,
};
use mailrule_error::MailError;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::date::parse_rule_date;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleFile {
    predicate: String,
    #[serde(alias = "conditions")]
    rules: Vec<RawCondition>,
    #[serde(default)]
    actions: Vec<RawAction>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCondition {
    field: String,
    predicate: String,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAction {
    Token(String),
    Move {
        #[serde(rename = "move")]
        label: String,
    },
    Unknown(serde_json::Value),
}

/// Parses a JSON rule document. A bare `move` action targets `default_label`.
pub fn parse_rules(text: &str, default_label: &str) -> Result<RuleSet, MailError> {
    let file: RuleFile = serde_json::from_str(text)
        .map_err(|e| MailError::config(format!("rule file is not valid: {e}")))?;

    let predicate = file.predicate.parse::<MatchPredicate>().map_err(MailError::config)?;

    let conditions = file
        .rules
        .into_iter()
        .map(|raw| Condition {
            field: ConditionField::from_token(&raw.field),
            predicate: ConditionPredicate::from_token(&raw.predicate),
            value: raw.value,
        })
        .collect();

    let actions = file
        .actions
        .into_iter()
        .map(|raw| match raw {
            RawAction::Token(token) => match token.trim().to_lowercase().as_str() {
                "mark_as_read" => Action::MarkRead,
                "mark_as_unread" => Action::MarkUnread,
                "move" => Action::Move(default_label.to_string()),
                _ => Action::Other(token),
            },
            RawAction::Move { label } => Action::Move(label),
            RawAction::Unknown(value) => Action::Other(value.to_string()),
        })
        .collect();

    Ok(RuleSet {
        predicate,
        conditions,
        actions,
    })
}

/// Reads and parses the rule file at `path`, logging validation warnings.
pub fn load_rules(path: impl AsRef<Path>, default_label: &str) -> Result<RuleSet, MailError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| MailError::config(format!("read {}: {e}", path.display())))?;

    let rule_set = parse_rules(&text, default_label).map_err(|e| match e {
        MailError::Config(msg) => MailError::config(format!("{}: {msg}", path.display())),
        other => other,
    })?;

    for warning in validate(&rule_set) {
        warn!(path = %path.display(), %warning, "rule warning");
    }
    info!(
        path = %path.display(),
        predicate = %rule_set.predicate,
        conditions = rule_set.conditions.len(),
        actions = rule_set.actions.len(),
        "rules loaded"
    );

    Ok(rule_set)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleWarning {
    NoConditions,
    UnknownField { index: usize, token: String },
    UnknownPredicate { index: usize, token: String },
    MismatchedPredicate { index: usize, field: String, predicate: String },
    BadDateValue { index: usize, value: String },
    UnknownAction { token: String },
}

impl fmt::Display for RuleWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoConditions => write!(f, "no conditions"),
            Self::UnknownField { index, token } => {
                write!(f, "rule {index}: unknown field {token:?}, never matches")
            }
            Self::UnknownPredicate { index, token } => {
                write!(f, "rule {index}: unknown predicate {token:?}, never matches")
            }
            Self::MismatchedPredicate {
                index,
                field,
                predicate,
            } => write!(
                f,
                "rule {index}: {predicate:?} does not apply to field {field:?}, never matches"
            ),
            Self::BadDateValue { index, value } => {
                write!(f, "rule {index}: {value:?} is not a YYYY-MM-DD date")
            }
            Self::UnknownAction { token } => write!(f, "unknown action {token:?} is ignored"),
        }
    }
}

/// Lists likely authoring mistakes. None of them stop a run; unknown
/// combinations evaluate to false and unknown actions are skipped.
pub fn validate(rule_set: &RuleSet) -> Vec<RuleWarning> {
    let mut warnings = Vec::new();

    if rule_set.conditions.is_empty() {
        warnings.push(RuleWarning::NoConditions);
    }

    for (index, cond) in rule_set.conditions.iter().enumerate() {
        if let ConditionField::Other(token) = &cond.field {
            warnings.push(RuleWarning::UnknownField {
                index,
                token: token.clone(),
            });
            continue;
        }
        if let ConditionPredicate::Other(token) = &cond.predicate {
            warnings.push(RuleWarning::UnknownPredicate {
                index,
                token: token.clone(),
            });
            continue;
        }

        let is_date_field = cond.field == ConditionField::ReceivedDate;
        if is_date_field != cond.predicate.is_date() {
            warnings.push(RuleWarning::MismatchedPredicate {
                index,
                field: cond.field.to_string(),
                predicate: cond.predicate.to_string(),
            });
        } else if is_date_field && parse_rule_date(&cond.value).is_err() {
            warnings.push(RuleWarning::BadDateValue {
                index,
                value: cond.value.clone(),
            });
        }
    }

    for action in &rule_set.actions {
        if let Action::Other(token) = action {
            warnings.push(RuleWarning::UnknownAction {
                token: token.clone(),
            });
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "predicate": "All",
        "rules": [
            {"field": "from", "predicate": "contains", "value": "newsletter"},
            {"field": "subject", "predicate": "does not contain", "value": "urgent"},
            {"field": "received", "predicate": "less than", "value": "2024-10-02"}
        ],
        "actions": ["mark_as_read", "move"]
    }"#;

    #[test]
    fn parses_sample_rule_file() {
        let rules = parse_rules(SAMPLE, "Processed").unwrap();

        assert_eq!(rules.predicate, MatchPredicate::All);
        assert_eq!(
            rules.conditions,
            vec![
                Condition::new(
                    ConditionField::Sender,
                    ConditionPredicate::Contains,
                    "newsletter",
                ),
                Condition::new(
                    ConditionField::Subject,
                    ConditionPredicate::NotContains,
                    "urgent",
                ),
                Condition::new(
                    ConditionField::ReceivedDate,
                    ConditionPredicate::LessThan,
                    "2024-10-02",
                ),
            ]
        );
        assert_eq!(
            rules.actions,
            vec![Action::MarkRead, Action::Move("Processed".into())]
        );
        assert!(validate(&rules).is_empty());
    }

    #[test]
    fn move_object_overrides_default_label() {
        let rules = parse_rules(
            r#"{"predicate": "any", "conditions": [],
                "actions": [{"move": "Receipts"}, "MARK_AS_UNREAD"]}"#,
            "Processed",
        )
        .unwrap();

        assert_eq!(rules.predicate, MatchPredicate::Any);
        assert_eq!(
            rules.actions,
            vec![Action::Move("Receipts".into()), Action::MarkUnread]
        );
    }

    #[test]
    fn unknown_actions_are_kept_and_flagged() {
        let rules = parse_rules(
            r#"{"predicate": "All",
                "rules": [{"field": "subject", "predicate": "equals", "value": "x"}],
                "actions": ["star", {"forward": "boss@example.com"}]}"#,
            "Processed",
        )
        .unwrap();

        assert_eq!(
            rules.actions,
            vec![
                Action::Other("star".into()),
                Action::Other(r#"{"forward":"boss@example.com"}"#.into()),
            ]
        );
        assert_eq!(
            validate(&rules),
            vec![
                RuleWarning::UnknownAction { token: "star".into() },
                RuleWarning::UnknownAction {
                    token: r#"{"forward":"boss@example.com"}"#.into()
                },
            ]
        );
    }

    #[test]
    fn rejects_bad_structure() {
        for text in [
            "not json",
            r#"{"rules": []}"#,
            r#"{"predicate": "All", "rules": [{"field": "from"}]}"#,
            r#"{"predicate": "Most", "rules": []}"#,
            r#"{"predicate": "All", "actions": ["mark_as_read"]}"#,
        ] {
            let err = parse_rules(text, "Processed").unwrap_err();
            assert!(matches!(err, MailError::Config(_)), "{text}: {err}");
        }
    }

    #[test]
    fn validation_flags_authoring_mistakes() {
        let rules = parse_rules(
            r#"{"predicate": "Any", "rules": [
                {"field": "to", "predicate": "contains", "value": "me"},
                {"field": "subject", "predicate": "matches", "value": "x"},
                {"field": "subject", "predicate": "less than", "value": "2024-01-01"},
                {"field": "received", "predicate": "contains", "value": "2024"},
                {"field": "received", "predicate": "greater than", "value": "01/02/2024"}
            ]}"#,
            "Processed",
        )
        .unwrap();

        assert_eq!(
            validate(&rules),
            vec![
                RuleWarning::UnknownField { index: 0, token: "to".into() },
                RuleWarning::UnknownPredicate { index: 1, token: "matches".into() },
                RuleWarning::MismatchedPredicate {
                    index: 2,
                    field: "subject".into(),
                    predicate: "less than".into()
                },
                RuleWarning::MismatchedPredicate {
                    index: 3,
                    field: "received".into(),
                    predicate: "contains".into()
                },
                RuleWarning::BadDateValue { index: 4, value: "01/02/2024".into() },
            ]
        );
    }

    #[test]
    fn misspelled_keys_are_rejected() {
        for text in [
            r#"{"predicate": "All",
                "rule": [{"field": "from", "predicate": "contains", "value": "news"}],
                "actions": ["move"]}"#,
            r#"{"predicate": "All", "actions": ["move"],
                "rules": [{"field": "from", "predicat": "contains", "value": "news"}]}"#,
        ] {
            let err = parse_rules(text, "Processed").unwrap_err();
            assert!(matches!(err, MailError::Config(_)), "{text}: {err}");
        }
    }

    #[test]
    fn empty_rule_list_is_flagged() {
        let rules = parse_rules(r#"{"predicate": "All", "rules": []}"#, "Processed").unwrap();
        assert_eq!(validate(&rules), vec![RuleWarning::NoConditions]);
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let rules = load_rules(file.path(), "Later").unwrap();
        assert_eq!(rules.actions[1], Action::Move("Later".into()));
    }

    #[test]
    fn missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_rules(dir.path().join("rules.json"), "Processed").unwrap_err();
        assert!(matches!(err, MailError::Config(_)));
    }
}
