use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("api error: {0}")]
    Api(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("unparseable date: {0}")]
    DateParse(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MailError {
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    pub fn api(msg: impl Into<String>) -> Self {
        Self::Api(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn date_parse(msg: impl Into<String>) -> Self {
        Self::DateParse(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn is_date_parse(&self) -> bool {
        matches!(self, Self::DateParse(_))
    }
}

/// Serializable view of a [`MailError`], used in reports and CLI output.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<&'static str>,
    pub retryable: bool,
}

impl From<&MailError> for ErrorResponse {
    fn from(err: &MailError) -> Self {
        let (code, suggestion, retryable) = match err {
            MailError::Auth(_) => (
                "AUTH_ERROR",
                Some("Check GMAIL_ADDRESS and GMAIL_APP_PASSWORD env vars"),
                false,
            ),
            MailError::Api(_) => ("API_ERROR", None, false),
            MailError::Network(_) => (
                "NETWORK_ERROR",
                Some("Check internet connection and try again"),
                true,
            ),
            MailError::NotFound(_) => ("NOT_FOUND", None, false),
            MailError::InvalidInput(_) => ("INVALID_INPUT", None, false),
            MailError::Config(_) => (
                "CONFIG_ERROR",
                Some("Run `mailrule check` to validate the rule file"),
                false,
            ),
            MailError::DateParse(_) => (
                "DATE_PARSE_ERROR",
                Some("Rule dates must be YYYY-MM-DD"),
                false,
            ),
            MailError::Storage(_) => (
                "STORAGE_ERROR",
                Some("Check MAILRULE_DB points at a writable location"),
                false,
            ),
            MailError::Internal(_) => ("INTERNAL_ERROR", Some("Unexpected error"), true),
        };
        Self {
            code,
            message: err.to_string(),
            suggestion,
            retryable,
        }
    }
}

impl From<MailError> for ErrorResponse {
    fn from(err: MailError) -> Self {
        Self::from(&err)
    }
}

impl ErrorResponse {
    pub fn to_compact(&self) -> String {
        let mut parts = vec![format!("[{}] {}", self.code, self.message)];
        if let Some(s) = self.suggestion {
            parts.push(format!("Suggestion: {s}"));
        }
        if self.retryable {
            parts.push("(retryable)".to_string());
        }
        parts.join(" | ")
    }
}
