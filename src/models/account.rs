use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Pending,
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Pending => "pending",
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "active" => AccountStatus::Active,
            "inactive" => AccountStatus::Inactive,
            _ => AccountStatus::Pending,
        }
    }
}

/// A single mailbox grant: the credentials and endpoints for one IMAP/SMTP
/// account belonging to an [`App`](super::App).
///
/// `credentials` stores the AES-GCM ciphertext produced by
/// [`crate::credentials::encrypt_password`], never the plaintext password.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub uuid: Uuid,
    pub app_id: i64,
    pub email: String,
    pub credentials: String,
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// The grant identifier exposed over the HTTP API (§3: `grant_id=uuid`).
    pub fn grant_id(&self) -> Uuid {
        self.uuid
    }
}
