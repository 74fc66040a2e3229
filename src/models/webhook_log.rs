use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only audit row for one webhook delivery attempt, mirroring
/// `app/models/webhook_log.py`. `delivered_at` is set only on a 2xx receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookLog {
    pub id: i64,
    pub uuid: Uuid,
    pub app_id: i64,
    pub account_id: i64,
    pub folder: String,
    pub uid: u32,
    pub webhook_url: String,
    pub status_code: Option<u16>,
    pub response_body: Option<String>,
    pub attempts: u32,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
