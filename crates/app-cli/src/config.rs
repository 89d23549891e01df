use std::path::PathBuf;

use mailrule_error::MailError;
use mailrule_google::GmailConfig;
use mailrule_rules::{DateErrorPolicy, ServiceSettings};

const DEFAULT_RULES: &str = "rules.json";
const DEFAULT_LABEL: &str = "Processed";
const DEFAULT_FETCH_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub email: Option<String>,
    pub app_password: Option<String>,
    pub rules_path: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub default_label: String,
    pub fetch_limit: usize,
    pub on_date_error: DateErrorPolicy,
}

/// Where the rules live and how a bare `move` resolves. Needs no mailbox or
/// store settings, so an offline check never trips over them.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSource {
    pub path: PathBuf,
    pub default_label: String,
}

impl RuleSource {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            path: value(&lookup, "MAILRULE_RULES")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RULES)),
            default_label: value(&lookup, "MAILRULE_LABEL")
                .unwrap_or_else(|| DEFAULT_LABEL.to_string()),
        }
    }
}

// Empty values count as unset.
fn value(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AppConfig {
    pub fn from_env() -> Result<Self, MailError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, MailError> {
        let get = |key: &str| value(&lookup, key);
        let rules = RuleSource::from_lookup(&lookup);

        let data_dir = get("MAILRULE_DATA_DIR").map(PathBuf::from).unwrap_or_else(|| {
            let home = get("HOME").unwrap_or_else(|| "/tmp".to_string());
            PathBuf::from(home).join(".mailrule")
        });

        let db_path = get("MAILRULE_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("emails.db"));

        let fetch_limit = match get("MAILRULE_FETCH_LIMIT") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(MailError::config(format!(
                        "invalid MAILRULE_FETCH_LIMIT: {raw:?} (expected a positive integer)"
                    )))
                }
            },
            None => DEFAULT_FETCH_LIMIT,
        };

        let on_date_error = match get("MAILRULE_ON_DATE_ERROR") {
            Some(raw) => raw
                .parse::<DateErrorPolicy>()
                .map_err(|e| MailError::config(format!("invalid MAILRULE_ON_DATE_ERROR: {e}")))?,
            None => DateErrorPolicy::Skip,
        };

        Ok(Self {
            email: get("GMAIL_ADDRESS"),
            app_password: get("GMAIL_APP_PASSWORD"),
            rules_path: rules.path,
            data_dir,
            db_path,
            default_label: rules.default_label,
            fetch_limit,
            on_date_error,
        })
    }

    pub fn gmail(&self) -> Result<GmailConfig, MailError> {
        let email = self
            .email
            .clone()
            .ok_or_else(|| MailError::config("GMAIL_ADDRESS env var not set"))?;
        let app_password = self
            .app_password
            .clone()
            .ok_or_else(|| MailError::config("GMAIL_APP_PASSWORD env var not set"))?;
        Ok(GmailConfig {
            email,
            app_password,
        })
    }

    pub fn settings(&self) -> ServiceSettings {
        ServiceSettings {
            fetch_limit: self.fetch_limit,
            on_date_error: self.on_date_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, MailError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[("HOME", "/home/ada")]).unwrap();

        assert_eq!(
            cfg,
            AppConfig {
                email: None,
                app_password: None,
                rules_path: PathBuf::from("rules.json"),
                data_dir: PathBuf::from("/home/ada/.mailrule"),
                db_path: PathBuf::from("/home/ada/.mailrule/emails.db"),
                default_label: "Processed".into(),
                fetch_limit: 10,
                on_date_error: DateErrorPolicy::Skip,
            }
        );
    }

    #[test]
    fn overrides() {
        let cfg = config(&[
            ("GMAIL_ADDRESS", "ada@example.com"),
            ("GMAIL_APP_PASSWORD", "abcd efgh"),
            ("MAILRULE_RULES", "/etc/mailrule/rules.json"),
            ("MAILRULE_DATA_DIR", "/var/lib/mailrule"),
            ("MAILRULE_LABEL", "Triage"),
            ("MAILRULE_FETCH_LIMIT", "50"),
            ("MAILRULE_ON_DATE_ERROR", "Abort"),
        ])
        .unwrap();

        assert_eq!(cfg.db_path, PathBuf::from("/var/lib/mailrule/emails.db"));
        assert_eq!(cfg.default_label, "Triage");
        assert_eq!(cfg.fetch_limit, 50);
        assert_eq!(cfg.on_date_error, DateErrorPolicy::Abort);

        let gmail = cfg.gmail().unwrap();
        assert_eq!(gmail.email, "ada@example.com");
        assert_eq!(gmail.app_password, "abcd efgh");
    }

    #[test]
    fn rule_source_ignores_unrelated_settings() {
        let vars: HashMap<&str, &str> = [
            ("MAILRULE_FETCH_LIMIT", "ten"),
            ("MAILRULE_LABEL", "Triage"),
        ]
        .into_iter()
        .collect();

        let source = RuleSource::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(
            source,
            RuleSource {
                path: PathBuf::from("rules.json"),
                default_label: "Triage".into(),
            }
        );
    }

    #[test]
    fn explicit_db_path_wins() {
        let cfg = config(&[("MAILRULE_DATA_DIR", "/data"), ("MAILRULE_DB", "/tmp/x.db")]).unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/x.db"));
    }

    #[test]
    fn rejects_invalid_values() {
        for vars in [
            [("MAILRULE_FETCH_LIMIT", "ten")],
            [("MAILRULE_FETCH_LIMIT", "0")],
            [("MAILRULE_ON_DATE_ERROR", "ignore")],
        ] {
            let err = config(&vars).unwrap_err();
            assert!(matches!(err, MailError::Config(_)), "{vars:?}: {err}");
        }
    }

    #[test]
    fn missing_credentials_are_config_errors() {
        let cfg = config(&[
            ("GMAIL_ADDRESS", "ada@example.com"),
            ("GMAIL_APP_PASSWORD", " "),
        ])
        .unwrap();
        let err = cfg.gmail().unwrap_err();
        assert_eq!(err.to_string(), "config error: GMAIL_APP_PASSWORD env var not set");
    }
}
