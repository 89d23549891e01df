use std::sync::Arc;

use async_trait::async_trait;
use imap_proto::types::Address as ImapAddress;
use mailparse::MailHeaderMap;
use mailrule_domain::{EmailRecord, Label, MailboxPort};
use mailrule_error::MailError;
use tracing::{debug, info, warn};

const INBOX: &str = "INBOX";
const SNIPPET_CHARS: usize = 200;

pub struct GmailConfig {
    pub email: String,
    pub app_password: String,
}

impl std::fmt::Debug for GmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GmailConfig")
            .field("email", &self.email)
            .field("app_password", &"<redacted>")
            .finish()
    }
}

/// Gmail mailbox over IMAP.
///
/// Message ids are INBOX UIDs; label ids are IMAP mailbox names, since Gmail
/// exposes each label as a mailbox.
pub struct GmailAdapter {
    config: Arc<GmailConfig>,
    session: Arc<std::sync::Mutex<Option<ImapSession>>>,
}

impl GmailAdapter {
    pub fn new(config: GmailConfig) -> Self {
        Self {
            config: Arc::new(config),
            session: Arc::new(std::sync::Mutex::new(None)),
        }
    }

    fn take_session(&self) -> Option<ImapSession> {
        self.session
            .lock()
            .ok()
            .and_then(|mut guard| guard.take())
    }

    async fn with_session<F, R>(&self, f: F) -> Result<R, MailError>
    where
        F: FnOnce(&mut ImapSession) -> Result<R, MailError> + Send + 'static,
        R: Send + 'static,
    {
        let config = self.config.clone();
        let cached = self.take_session();
        let pool = self.session.clone();
        tokio::task::spawn_blocking(move || {
            let mut session = get_or_connect(cached, &config)?;
            let result = f(&mut session);
            if let Ok(mut guard) = pool.lock() {
                *guard = Some(session);
            }
            result
        })
        .await
        .map_err(|e| MailError::internal(format!("spawn: {e}")))?
    }
}

fn get_or_connect(
    cached: Option<ImapSession>,
    config: &GmailConfig,
) -> Result<ImapSession, MailError> {
    if let Some(mut s) = cached {
        if s.noop().is_ok() {
            return Ok(s);
        }
        debug!("cached IMAP session stale, reconnecting");
    }
    imap_connect(config)
}

type ImapSession = imap::Session<native_tls::TlsStream<std::net::TcpStream>>;

fn imap_connect(config: &GmailConfig) -> Result<ImapSession, MailError> {
    let tls = native_tls::TlsConnector::builder()
        .build()
        .map_err(|e| MailError::network(format!("TLS init: {e}")))?;

    let client = imap::connect(("imap.gmail.com", 993), "imap.gmail.com", &tls)
        .map_err(|e| MailError::network(format!("IMAP connect: {e}")))?;

    let session = client
        .login(&config.email, &config.app_password)
        .map_err(|(e, _)| MailError::auth(format!("IMAP login: {e}")))?;

    info!(account = %config.email, "IMAP session opened");
    Ok(session)
}

fn select_inbox(session: &mut ImapSession) -> Result<(), MailError> {
    session
        .select(INBOX)
        .map_err(|e| MailError::network(format!("IMAP SELECT {INBOX}: {e}")))?;
    Ok(())
}

fn parse_uid(id: &str) -> Result<u32, MailError> {
    id.trim()
        .parse::<u32>()
        .map_err(|_| MailError::invalid_input(format!("not an IMAP UID: {id:?}")))
}

fn decode_mime_str(raw: &[u8]) -> String {
    let raw_str = String::from_utf8_lossy(raw).to_string();
    if !raw_str.contains("=?") {
        return raw_str;
    }
    let fake = format!("X: {raw_str}");
    match mailparse::parse_header(fake.as_bytes()) {
        Ok((hdr, _)) => hdr.get_value(),
        Err(_) => raw_str,
    }
}

fn format_imap_addr(addr: &ImapAddress) -> String {
    let name = addr
        .name
        .as_ref()
        .map(|n| decode_mime_str(n))
        .unwrap_or_default();
    let mailbox = addr
        .mailbox
        .as_ref()
        .and_then(|m| std::str::from_utf8(m).ok())
        .unwrap_or("");
    let host = addr
        .host
        .as_ref()
        .and_then(|h| std::str::from_utf8(h).ok())
        .unwrap_or("");

    let email = if mailbox.is_empty() && host.is_empty() {
        return name;
    } else if host.is_empty() {
        mailbox.to_string()
    } else {
        format!("{mailbox}@{host}")
    };

    if name.is_empty() {
        email
    } else {
        format!("{name} <{email}>")
    }
}

fn snippet_from_body(raw: &[u8]) -> String {
    let text = match mailparse::parse_mail(raw) {
        Ok(parsed) => extract_text_from_parsed(&parsed),
        Err(e) => {
            warn!("mailparse error: {e}");
            String::from_utf8_lossy(raw).to_string()
        }
    };
    make_snippet(&text)
}

fn make_snippet(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(SNIPPET_CHARS)
        .collect()
}

fn extract_text_from_parsed(parsed: &mailparse::ParsedMail<'_>) -> String {
    if let Some(text) = find_text_part(parsed, "text/plain") {
        return text;
    }
    if let Some(html) = find_text_part(parsed, "text/html") {
        return strip_html(&html);
    }
    parsed.get_body().unwrap_or_default()
}

fn find_text_part(parsed: &mailparse::ParsedMail<'_>, target: &str) -> Option<String> {
    if parsed.subparts.is_empty() {
        let ct = parsed
            .get_headers()
            .get_first_value("Content-Type")
            .unwrap_or_default();
        if ct.to_lowercase().starts_with(target) {
            return parsed.get_body().ok();
        }
        return None;
    }
    parsed
        .subparts
        .iter()
        .find_map(|part| find_text_part(part, target))
}

fn strip_html(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                result.push(' ');
            }
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result
}

fn fetch_to_record(fetch: &imap::types::Fetch) -> Option<EmailRecord> {
    let uid = fetch.uid?;
    let envelope = fetch.envelope()?;

    let sender = envelope
        .from
        .as_ref()
        .and_then(|list| list.first())
        .map(format_imap_addr)
        .unwrap_or_default();

    let subject = envelope
        .subject
        .as_ref()
        .map(|b| decode_mime_str(b))
        .unwrap_or_default();

    let date = envelope
        .date
        .as_ref()
        .map(|b| String::from_utf8_lossy(b).trim().to_string())
        .filter(|d| !d.is_empty())
        .or_else(|| fetch.internal_date().map(|d| d.to_rfc2822()))
        .unwrap_or_default();

    let snippet = fetch.body().map(snippet_from_body).unwrap_or_default();

    Some(EmailRecord {
        id: uid.to_string(),
        subject,
        sender,
        snippet,
        date,
    })
}

fn display_label_name(raw: &str) -> String {
    match raw {
        "INBOX" => "Inbox".to_string(),
        other => other
            .strip_prefix("[Gmail]/")
            .unwrap_or(other)
            .to_string(),
    }
}

fn folder_to_label(name: &imap::types::Name) -> Option<Label> {
    let no_select = name
        .attributes()
        .iter()
        .any(|a| matches!(a, imap::types::NameAttribute::NoSelect));
    if no_select || name.name() == "[Gmail]" {
        return None;
    }
    Some(Label {
        id: name.name().to_string(),
        name: display_label_name(name.name()),
    })
}

#[async_trait]
impl MailboxPort for GmailAdapter {
    async fn fetch_message_ids(&self, limit: usize) -> Result<Vec<String>, MailError> {
        self.with_session(move |session| {
            select_inbox(session)?;

            let found = session
                .uid_search("ALL")
                .map_err(|e| MailError::network(format!("IMAP UID SEARCH: {e}")))?;

            let mut uids: Vec<u32> = found.into_iter().collect();
            uids.sort_unstable_by(|a, b| b.cmp(a));
            uids.truncate(limit);

            debug!(count = uids.len(), "listed inbox uids");
            Ok(uids.iter().map(|u| u.to_string()).collect())
        })
        .await
    }

    async fn get_message_metadata(&self, id: &str) -> Result<EmailRecord, MailError> {
        let uid = parse_uid(id)?;

        self.with_session(move |session| {
            select_inbox(session)?;

            let fetches = session
                .uid_fetch(uid.to_string(), "(UID ENVELOPE INTERNALDATE BODY.PEEK[])")
                .map_err(|e| MailError::network(format!("IMAP UID FETCH: {e}")))?;

            fetches
                .iter()
                .find(|f| f.uid == Some(uid))
                .and_then(fetch_to_record)
                .ok_or_else(|| MailError::not_found(format!("message uid {uid}")))
        })
        .await
    }

    async fn mark_read(&self, id: &str) -> Result<(), MailError> {
        let uid = parse_uid(id)?;

        self.with_session(move |session| {
            select_inbox(session)?;
            session
                .uid_store(uid.to_string(), "+FLAGS (\\Seen)")
                .map_err(|e| MailError::network(format!("IMAP UID STORE: {e}")))?;

            info!(uid, "marked as read");
            Ok(())
        })
        .await
    }

    async fn mark_unread(&self, id: &str) -> Result<(), MailError> {
        let uid = parse_uid(id)?;

        self.with_session(move |session| {
            select_inbox(session)?;
            session
                .uid_store(uid.to_string(), "-FLAGS (\\Seen)")
                .map_err(|e| MailError::network(format!("IMAP UID STORE: {e}")))?;

            info!(uid, "marked as unread");
            Ok(())
        })
        .await
    }

    async fn list_labels(&self) -> Result<Vec<Label>, MailError> {
        self.with_session(|session| {
            let names = session
                .list(Some(""), Some("*"))
                .map_err(|e| MailError::network(format!("IMAP LIST: {e}")))?;

            Ok(names.iter().filter_map(folder_to_label).collect())
        })
        .await
    }

    async fn create_label(&self, name: &str) -> Result<Label, MailError> {
        let name = name.to_string();

        self.with_session(move |session| {
            session
                .create(&name)
                .map_err(|e| MailError::api(format!("IMAP CREATE '{name}': {e}")))?;

            info!(label = %name, "label created");
            Ok(Label {
                id: name.clone(),
                name: display_label_name(&name),
            })
        })
        .await
    }

    async fn apply_label(&self, id: &str, label_id: &str) -> Result<(), MailError> {
        let uid = parse_uid(id)?;
        let label_id = label_id.to_string();

        self.with_session(move |session| {
            select_inbox(session)?;
            session
                .uid_copy(uid.to_string(), &label_id)
                .map_err(|e| MailError::network(format!("IMAP UID COPY to '{label_id}': {e}")))?;

            info!(uid, label = %label_id, "label applied");
            Ok(())
        })
        .await
    }

    async fn close(&self) -> Result<(), MailError> {
        let Some(mut session) = self.take_session() else {
            return Ok(());
        };

        tokio::task::spawn_blocking(move || session.logout())
            .await
            .map_err(|e| MailError::internal(format!("spawn: {e}")))?
            .map_err(|e| MailError::network(format!("IMAP LOGOUT: {e}")))?;

        info!(account = %self.config.email, "IMAP session closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn snippet_prefers_plain_text_and_collapses_whitespace() {
        let raw = b"Subject: hi\r\n\
Content-Type: multipart/alternative; boundary=\"b\"\r\n\
\r\n\
--b\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Hello   there,\r\n\r\nyour order shipped.\r\n\
--b\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>Hello there</p>\r\n\
--b--\r\n";

        assert_eq!(snippet_from_body(raw), "Hello there, your order shipped.");
    }

    #[test]
    fn snippet_falls_back_to_stripped_html() {
        let raw = b"Content-Type: text/html\r\n\r\n<div><b>Sale</b> ends<br>today</div>\r\n";
        assert_eq!(snippet_from_body(raw), "Sale ends today");
    }

    #[test]
    fn snippet_is_bounded() {
        let long = "word ".repeat(100);
        assert_eq!(make_snippet(&long).chars().count(), SNIPPET_CHARS);
    }

    #[test]
    fn decodes_encoded_words() {
        assert_eq!(decode_mime_str(b"=?UTF-8?Q?Caf=C3=A9_menu?="), "Café menu");
        assert_eq!(decode_mime_str(b"plain subject"), "plain subject");
    }

    #[test]
    fn label_display_names() {
        assert_eq!(display_label_name("INBOX"), "Inbox");
        assert_eq!(display_label_name("[Gmail]/Spam"), "Spam");
        assert_eq!(display_label_name("Receipts/2024"), "Receipts/2024");
    }

    #[test]
    fn debug_output_hides_app_password() {
        let config = GmailConfig {
            email: "ada@example.com".into(),
            app_password: "abcd efgh ijkl".into(),
        };
        let shown = format!("{config:?}");
        assert!(shown.contains("ada@example.com"));
        assert!(!shown.contains("abcd"), "{shown}");
    }

    #[test]
    fn uids_must_be_numeric() {
        assert_eq!(parse_uid(" 42 ").unwrap(), 42);
        assert!(matches!(parse_uid("abc"), Err(MailError::InvalidInput(_))));
    }
}
