use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationStatus {
    Pending,
    Authorized,
    Denied,
    Expired,
}

/// A one-shot OAuth2-style authorization code exchange, modeled on
/// `OAuth2AuthorizationRequest` in `app/models/oauth2.py`.
///
/// Expiry is fixed at 10 minutes from creation per spec §3; `code_used`
/// makes the code one-shot even if requested again before expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub id: i64,
    pub uuid: Uuid,
    pub app_id: i64,
    pub account_id: Option<i64>,
    pub client_id: String,
    pub redirect_uri: String,
    pub state: String,
    pub scope: Option<String>,
    pub status: AuthorizationStatus,
    pub code: String,
    pub code_used: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl AuthorizationRequest {
    pub const TTL_MINUTES: i64 = 10;

    pub fn expires_at_from_now() -> DateTime<Utc> {
        Utc::now() + Duration::minutes(Self::TTL_MINUTES)
    }

    /// A code is redeemable exactly once, before it expires.
    pub fn is_valid(&self) -> bool {
        !self.code_used && Utc::now() < self.expires_at
    }
}
