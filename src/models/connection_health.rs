use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rolling connection health per (account, folder). `is_active` flips false
/// after [`ConnectionHealth::MAX_CONSECUTIVE_FAILURES`] consecutive failures,
/// matching `ConnectionHealthRepo.record_failure` in `app/repos/connection_health.py`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionHealth {
    pub account_id: i64,
    pub folder: String,
    pub last_success_at: DateTime<Utc>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub is_active: bool,
}

impl ConnectionHealth {
    pub const MAX_CONSECUTIVE_FAILURES: u32 = 5;

    pub fn fresh(account_id: i64, folder: impl Into<String>) -> Self {
        Self {
            account_id,
            folder: folder.into(),
            last_success_at: Utc::now(),
            consecutive_failures: 0,
            last_error: None,
            is_active: true,
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.last_error = None;
        self.is_active = true;
        self.last_success_at = Utc::now();
    }

    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.consecutive_failures += 1;
        self.last_error = Some(error.into());
        self.is_active = self.consecutive_failures < Self::MAX_CONSECUTIVE_FAILURES;
    }
}
