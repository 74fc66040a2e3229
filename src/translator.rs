//! Converts an `imap::types::Email` into the canonical wire message (spec §4.4).
//!
//! Grounded on `app/utils/message_utils.py`'s `convert_to_nylas_format` — the
//! 1-indexed `att_N` attachment-id scheme, snippet truncation, and
//! references/thread-id derivation all mirror that function, adapted to
//! consume the teacher's already MIME-parsed `Email`/`Envelope`/`MimePart`
//! rather than re-parsing raw RFC 822 bytes.

use crate::imap::types::{Address, Email, MimePart};
use crate::models::{CanonicalMessage, EmailAddress, MessageAttachment};

const SNIPPET_LEN: usize = 100;

/// `folder` is the mailbox the message was fetched from; the canonical
/// message's `folders` field is always this single element, matching the
/// original's per-folder fetch model (a message is never presented as
/// belonging to more than one folder at once).
pub fn to_canonical(email: &Email, grant_id: &str, folder: &str) -> CanonicalMessage {
    let envelope = email.envelope.as_ref();

    let subject = envelope.and_then(|e| e.subject.clone()).unwrap_or_default();
    let message_id = envelope
        .and_then(|e| e.message_id.clone())
        .unwrap_or_else(|| format!("<generated-{}@local>", email.uid));

    let from_ = envelope.map(|e| convert_addresses(&e.from)).unwrap_or_default();
    let to = envelope.map(|e| convert_addresses(&e.to)).unwrap_or_default();
    let cc = envelope.map(|e| convert_addresses(&e.cc)).unwrap_or_default();
    let bcc = envelope.map(|e| convert_addresses(&e.bcc)).unwrap_or_default();
    let reply_to = envelope.map(|e| convert_addresses(&e.reply_to)).unwrap_or_default();

    let date = envelope
        .and_then(|e| e.date.as_deref())
        .and_then(parse_envelope_date)
        .or_else(|| email.internal_date.map(|d| d.timestamp()))
        .unwrap_or_else(|| chrono::Utc::now().timestamp());

    let body = email
        .html_body
        .clone()
        .or_else(|| email.text_body.clone())
        .unwrap_or_default();
    let snippet = make_snippet(&body);

    let references = extract_references(email);
    let thread_id = references
        .first()
        .cloned()
        .unwrap_or_else(|| message_id.clone());

    let attachments = convert_attachments(&email.attachments);

    CanonicalMessage {
        id: message_id.clone(),
        object: "message",
        grant_id: grant_id.to_string(),
        subject,
        from_,
        to,
        cc,
        bcc,
        reply_to,
        date,
        body,
        snippet,
        thread_id,
        folders: vec![folder.to_string()],
        starred: false,
        unread: true,
        attachments,
    }
}

fn convert_addresses(addrs: &[Address]) -> Vec<EmailAddress> {
    addrs
        .iter()
        .map(|a| EmailAddress {
            name: a.name.clone().unwrap_or_default(),
            email: match (&a.mailbox, &a.host) {
                (Some(m), Some(h)) => format!("{m}@{h}"),
                (Some(m), None) => m.clone(),
                _ => String::new(),
            },
        })
        .collect()
}

/// IMAP `ENVELOPE` dates are RFC 2822-ish strings; `DateTime::parse_from_rfc2822`
/// handles the common cases. Unparsable dates fall through to
/// `internal_date`, matching the original's `parsedate_tz`-then-`time.time()`
/// fallback chain.
fn parse_envelope_date(raw: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc2822(raw.trim())
        .ok()
        .map(|d| d.timestamp())
}

fn make_snippet(body: &str) -> String {
    let plain = strip_html_tags(body);
    let trimmed = plain.trim();
    if trimmed.chars().count() > SNIPPET_LEN {
        let truncated: String = trimmed.chars().take(SNIPPET_LEN).collect();
        format!("{truncated}...")
    } else {
        trimmed.to_string()
    }
}

fn strip_html_tags(input: &str) -> String {
    if !input.contains('<') {
        return input.to_string();
    }
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// The `References` header lives on the top-level message, not on any
/// attachment `MimePart`, so it's read off the envelope (populated by
/// re-parsing the raw body with `mail_parser`; see `Email::parse_mime_content`).
fn extract_references(email: &Email) -> Vec<String> {
    email
        .envelope
        .as_ref()
        .map(|e| e.references.clone())
        .unwrap_or_default()
}

/// Attachment ids are assigned `att_1`, `att_2`, ... in MIME-part order,
/// 1-indexed per the canonical (not the older 0-indexed) Python implementation.
fn convert_attachments(parts: &[MimePart]) -> Vec<MessageAttachment> {
    parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            let filename = part
                .content_disposition
                .as_ref()
                .and_then(|d| d.filename())
                .cloned()
                .unwrap_or_else(|| format!("attachment_{}", i + 1));
            let is_inline = part
                .content_disposition
                .as_ref()
                .map(|d| !d.is_attachment())
                .unwrap_or(false);

            MessageAttachment {
                id: format!("att_{}", i + 1),
                filename,
                size: part.body.len(),
                content_type: part.content_type.mime_type(),
                is_inline,
            }
        })
        .collect()
}
