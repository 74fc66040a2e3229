use serde::{Deserialize, Serialize};

/// Canonical wire representation of a message, the translator's output
/// (spec §4.4). Field names/shape mirror `app/api/models/messages.py`'s
/// `Message` (the "Nylas format" the original system emits).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalMessage {
    pub id: String,
    pub object: &'static str,
    pub grant_id: String,
    pub subject: String,
    #[serde(rename = "from")]
    pub from_: Vec<EmailAddress>,
    pub to: Vec<EmailAddress>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<EmailAddress>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<EmailAddress>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reply_to: Vec<EmailAddress>,
    pub date: i64,
    pub body: String,
    pub snippet: String,
    pub thread_id: String,
    pub folders: Vec<String>,
    pub starred: bool,
    pub unread: bool,
    pub attachments: Vec<MessageAttachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailAddress {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageAttachment {
    pub id: String,
    pub filename: String,
    pub size: usize,
    pub content_type: String,
    pub is_inline: bool,
}

/// The immediate result of sending a message, returned by the SMTP sender
/// (spec §4.10, `SendMessageResult`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageResult {
    pub message_id: String,
    pub thread_id: String,
    pub folder: Option<String>,
    pub message: CanonicalMessage,
}
