//! Outbound SMTP send and reply-threading (spec §4.10).
//!
//! Message composition and Sent-folder append follow
//! `app/controllers/smtp/smtp_controller.py`'s `_create_message`/
//! `_save_to_sent_folder`; the lettre transport setup follows
//! `dashboard/services/smtp.rs`'s `SmtpService::send_email`.

use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use uuid::Uuid;

use crate::imap::session::AsyncImapOps;
use crate::imap::ImapClient;
use crate::models::{Account, CanonicalMessage, EmailAddress, SendMessageResult};

#[derive(Debug, Error)]
pub enum SmtpSendError {
    #[error("invalid address {0}: {1}")]
    InvalidAddress(String, String),
    #[error("message build error: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("smtp transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
    #[error("smtp relay configuration error: {0}")]
    Config(String),
}

/// Folder names tried, in order, for the post-send IMAP append — the first
/// one that exists (intersected with the account's discovered folders) wins.
/// A failure to append anywhere is swallowed (logged), never surfaced as a
/// send failure, matching the original.
const SENT_FOLDER_CANDIDATES: &[&str] =
    &["Sent", "SENT", "Sent Items", "Sent Mail", "Sent Messages"];

pub struct OutgoingMessage {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
    pub attachments: Vec<OutgoingAttachment>,
    /// Present when this send is a reply: carries the parent's Message-ID
    /// and its References chain, so `References`/`In-Reply-To` thread correctly.
    pub reply_to: Option<ReplyContext>,
}

pub struct OutgoingAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

pub struct ReplyContext {
    pub message_id: String,
    pub references: Vec<String>,
    /// The replied message's own `thread_id`, so the reply joins the same
    /// thread rather than starting one keyed off a bare reference.
    pub thread_id: String,
}

fn parse_mailbox(addr: &str) -> Result<Mailbox, SmtpSendError> {
    addr.parse()
        .map_err(|e: lettre::address::AddressError| SmtpSendError::InvalidAddress(addr.to_string(), e.to_string()))
}

/// Domain part of `account.email`, used to synthesize a `Message-ID` the way
/// the original does: `<uuid4()@domain>`.
fn email_domain(email: &str) -> &str {
    email.split('@').nth(1).unwrap_or("localhost")
}

fn build_message(
    account: &Account,
    outgoing: &OutgoingMessage,
) -> Result<(Message, String), SmtpSendError> {
    let mut builder = Message::builder()
        .from(parse_mailbox(&account.email)?)
        .subject(&outgoing.subject);

    for addr in &outgoing.to {
        builder = builder.to(parse_mailbox(addr)?);
    }
    for addr in &outgoing.cc {
        builder = builder.cc(parse_mailbox(addr)?);
    }
    for addr in &outgoing.bcc {
        builder = builder.bcc(parse_mailbox(addr)?);
    }

    let message_id = format!("<{}@{}>", Uuid::new_v4(), email_domain(&account.email));
    builder = builder.message_id(Some(message_id.clone()));

    if let Some(reply) = &outgoing.reply_to {
        builder = builder.in_reply_to(reply.message_id.clone());
        let mut references = reply.references.clone();
        references.push(reply.message_id.clone());
        builder = builder.references(references.join(" "));
    }

    let body = build_body(outgoing)?;

    let message = match body {
        Body::Plain(part) => builder.singlepart(part)?,
        Body::MixedWithAttachments(mixed) => builder.multipart(mixed)?,
    };

    Ok((message, message_id))
}

enum Body {
    Plain(SinglePart),
    MixedWithAttachments(MultiPart),
}

/// Mirrors `_create_message`: with attachments, wrap the text/HTML body in a
/// nested `multipart/alternative` inside an outer `multipart/mixed`; without
/// attachments, a bare part (no nesting) is enough.
fn build_body(outgoing: &OutgoingMessage) -> Result<Body, SmtpSendError> {
    let text_part = SinglePart::builder()
        .header(ContentType::TEXT_PLAIN)
        .body(outgoing.body_text.clone());

    let alternative_or_plain = if let Some(html) = &outgoing.body_html {
        MultiPart::alternative()
            .singlepart(text_part)
            .singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_HTML)
                    .body(html.clone()),
            )
    } else if outgoing.attachments.is_empty() {
        return Ok(Body::Plain(text_part));
    } else {
        MultiPart::alternative().singlepart(text_part)
    };

    if outgoing.attachments.is_empty() {
        return Err(SmtpSendError::Config(
            "internal: body without attachments should use the Plain branch".into(),
        ));
    }

    let mut mixed = MultiPart::mixed().multipart(alternative_or_plain);
    for attachment in &outgoing.attachments {
        let content_type = ContentType::parse(&attachment.content_type)
            .map_err(|_| SmtpSendError::Config(format!("invalid content type for {}", attachment.filename)))?;
        mixed = mixed.singlepart(
            lettre::message::Attachment::new(attachment.filename.clone())
                .body(attachment.data.clone(), content_type),
        );
    }

    Ok(Body::MixedWithAttachments(mixed))
}

#[derive(Default)]
pub struct SmtpSender;

impl SmtpSender {
    pub fn new() -> Self {
        Self
    }

    /// Sends `outgoing` from `account`, then best-effort appends the sent
    /// message to the account's Sent folder via `imap_client`.
    pub async fn send<T: AsyncImapOps + Send + Sync + std::fmt::Debug + 'static>(
        &self,
        account: &Account,
        password: &str,
        outgoing: OutgoingMessage,
        imap_client: Option<&ImapClient<T>>,
        discovered_folders: &[String],
    ) -> Result<SendMessageResult, SmtpSendError> {
        let (message, message_id) = build_message(account, &outgoing)?;

        let creds = Credentials::new(account.email.clone(), password.to_string());
        // Port 587 is conventionally STARTTLS; anything else (465, 993-ish
        // custom ports) is treated as implicit TLS, mirroring the teacher's
        // `use_starttls` branch in `dashboard/services/smtp.rs`.
        let use_starttls = account.smtp_port == 587;
        let builder = if use_starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&account.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&account.smtp_host)
        };
        let mailer = builder
            .map_err(|e| SmtpSendError::Config(e.to_string()))?
            .port(account.smtp_port)
            .credentials(creds)
            .build();

        mailer.send(message.clone()).await?;

        if let Some(client) = imap_client {
            let raw = message.formatted();
            let folder = append_to_sent_folder(client, &raw, discovered_folders).await;
            if folder.is_none() {
                log::warn!(
                    "could not save sent message {message_id} to any Sent-like folder for account {}",
                    account.id
                );
            }

            let canonical = canonical_for_sent(account, &outgoing, &message_id, folder.as_deref());
            return Ok(SendMessageResult {
                message_id: message_id.clone(),
                thread_id: outgoing
                    .reply_to
                    .as_ref()
                    .map(|r| r.thread_id.clone())
                    .unwrap_or_else(|| message_id.clone()),
                folder,
                message: canonical,
            });
        }

        let canonical = canonical_for_sent(account, &outgoing, &message_id, None);
        Ok(SendMessageResult {
            thread_id: outgoing
                .reply_to
                .as_ref()
                .map(|r| r.thread_id.clone())
                .unwrap_or_else(|| message_id.clone()),
            message_id,
            folder: None,
            message: canonical,
        })
    }
}

async fn append_to_sent_folder<T: AsyncImapOps + Send + Sync + std::fmt::Debug + 'static>(
    client: &ImapClient<T>,
    raw_message: &[u8],
    discovered_folders: &[String],
) -> Option<String> {
    for candidate in SENT_FOLDER_CANDIDATES {
        if !discovered_folders.iter().any(|f| f.eq_ignore_ascii_case(candidate)) {
            continue;
        }
        match client.append(candidate, raw_message, &[]).await {
            Ok(()) => return Some(candidate.to_string()),
            Err(e) => log::debug!("append to '{candidate}' failed: {e}"),
        }
    }
    None
}

fn canonical_for_sent(
    account: &Account,
    outgoing: &OutgoingMessage,
    message_id: &str,
    folder: Option<&str>,
) -> CanonicalMessage {
    let to_addrs = |addrs: &[String]| {
        addrs
            .iter()
            .map(|a| EmailAddress { name: String::new(), email: a.clone() })
            .collect::<Vec<_>>()
    };

    CanonicalMessage {
        id: message_id.to_string(),
        object: "message",
        grant_id: account.grant_id().to_string(),
        subject: outgoing.subject.clone(),
        from_: vec![EmailAddress { name: String::new(), email: account.email.clone() }],
        to: to_addrs(&outgoing.to),
        cc: to_addrs(&outgoing.cc),
        bcc: to_addrs(&outgoing.bcc),
        reply_to: vec![],
        date: chrono::Utc::now().timestamp(),
        body: outgoing.body_html.clone().unwrap_or_else(|| outgoing.body_text.clone()),
        snippet: outgoing.body_text.chars().take(100).collect(),
        thread_id: outgoing
            .reply_to
            .as_ref()
            .map(|r| r.thread_id.clone())
            .unwrap_or_else(|| message_id.to_string()),
        folders: folder.map(|f| vec![f.to_string()]).unwrap_or_default(),
        starred: false,
        unread: false,
        attachments: vec![],
    }
}
