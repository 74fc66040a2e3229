use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-(account, folder) high-water mark. Never decreases: callers must go
/// through [`UidTracking::advance`] so the `max(old, new)` invariant from
/// spec §3 holds even under concurrent or out-of-order updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UidTracking {
    pub account_id: i64,
    pub folder: String,
    pub last_seen_uid: u32,
    pub last_checked_at: DateTime<Utc>,
}

impl UidTracking {
    pub fn advance(&mut self, uid: u32) {
        if uid > self.last_seen_uid {
            self.last_seen_uid = uid;
        }
        self.last_checked_at = Utc::now();
    }
}
