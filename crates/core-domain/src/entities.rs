use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Evaluable attributes of one mailbox item, as fetched from the provider.
///
/// `date` is kept as the provider wrote it and only parsed when a rule
/// compares against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRecord {
    pub id: String,
    pub subject: String,
    pub sender: String,
    pub snippet: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Label {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionField {
    Sender,
    Subject,
    Snippet,
    ReceivedDate,
    Other(String),
}

impl ConditionField {
    pub fn from_token(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "from" | "sender" => Self::Sender,
            "subject" => Self::Subject,
            "snippet" | "message" => Self::Snippet,
            "received" | "received_date" => Self::ReceivedDate,
            _ => Self::Other(s.to_string()),
        }
    }
}

impl fmt::Display for ConditionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sender => write!(f, "from"),
            Self::Subject => write!(f, "subject"),
            Self::Snippet => write!(f, "snippet"),
            Self::ReceivedDate => write!(f, "received"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionPredicate {
    Contains,
    NotContains,
    Equals,
    NotEquals,
    LessThan,
    GreaterThan,
    Other(String),
}

impl ConditionPredicate {
    pub fn from_token(s: &str) -> Self {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_lowercase().as_str() {
            "contains" => Self::Contains,
            "does not contain" => Self::NotContains,
            "equals" => Self::Equals,
            "does not equal" => Self::NotEquals,
            "less than" => Self::LessThan,
            "greater than" => Self::GreaterThan,
            _ => Self::Other(s.to_string()),
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(self, Self::LessThan | Self::GreaterThan)
    }
}

impl fmt::Display for ConditionPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contains => write!(f, "contains"),
            Self::NotContains => write!(f, "does not contain"),
            Self::Equals => write!(f, "equals"),
            Self::NotEquals => write!(f, "does not equal"),
            Self::LessThan => write!(f, "less than"),
            Self::GreaterThan => write!(f, "greater than"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Condition {
    pub field: ConditionField,
    pub predicate: ConditionPredicate,
    pub value: String,
}

impl Condition {
    pub fn new(
        field: ConditionField,
        predicate: ConditionPredicate,
        value: impl Into<String>,
    ) -> Self {
        Self {
            field,
            predicate,
            value: value.into(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {:?}", self.field, self.predicate, self.value)
    }
}

/// How the conditions of a rule set combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchPredicate {
    All,
    Any,
}

impl fmt::Display for MatchPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "All"),
            Self::Any => write!(f, "Any"),
        }
    }
}

impl FromStr for MatchPredicate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "any" => Ok(Self::Any),
            _ => Err(format!("unknown predicate: {s} (expected All or Any)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Action {
    #[serde(rename = "mark_as_read")]
    MarkRead,
    #[serde(rename = "mark_as_unread")]
    MarkUnread,
    #[serde(rename = "move")]
    Move(String),
    #[serde(rename = "other")]
    Other(String),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MarkRead => write!(f, "mark_as_read"),
            Self::MarkUnread => write!(f, "mark_as_unread"),
            Self::Move(label) => write!(f, "move({label})"),
            Self::Other(token) => write!(f, "{token}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSet {
    pub predicate: MatchPredicate,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
}
