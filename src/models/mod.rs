//! Domain/persistence models for the mail-bridge local index.
//!
//! These mirror the six durable entities plus the `App` collaborator record,
//! modeled directly on `levco/nolas`'s SQLAlchemy models (`app/models/*.py`).

pub mod account;
pub mod app;
pub mod authorization;
pub mod connection_health;
pub mod email_index;
pub mod message;
pub mod uid_tracking;
pub mod webhook_log;

pub use account::{Account, AccountStatus};
pub use app::App;
pub use authorization::{AuthorizationRequest, AuthorizationStatus};
pub use connection_health::ConnectionHealth;
pub use email_index::EmailIndexRecord;
pub use message::{CanonicalMessage, EmailAddress, MessageAttachment, SendMessageResult};
pub use uid_tracking::UidTracking;
pub use webhook_log::WebhookLog;
