use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Local dedup/lookup index over ingested messages. `(account_id, message_id)`
/// is unique; it is also consulted by `folder`+`uid` for the fast path in
/// `MessageController::get_message_by_id`.
///
/// Mirrors `app/models/email.py`'s `Email` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailIndexRecord {
    pub id: i64,
    pub account_id: i64,
    pub message_id: String,
    pub thread_id: String,
    pub folder: String,
    pub uid: Option<u32>,
    pub created_at: DateTime<Utc>,
}
