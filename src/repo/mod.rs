//! Narrow repository interfaces over the local metadata store (spec §4.5).
//!
//! Each trait is consumed by exactly the components that need it — the
//! listener supervisor never sees `AppRepo`, the authorization controller
//! never sees `WebhookLogRepo` — so callers are constructor-injected with
//! only the interfaces they use, the "dynamic dispatch via narrow
//! interfaces" pattern spec §9 calls for.

pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Account, AccountStatus, App, AuthorizationRequest, ConnectionHealth, EmailIndexRecord,
    UidTracking, WebhookLog,
};

/// Errors surfaced by the metadata store. Kept separate from
/// [`crate::imap::error::ImapError`] per spec §1.A's thiserror-per-component rule.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("record not found")]
    NotFound,
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait AppRepo: Send + Sync {
    async fn get_by_id(&self, id: i64) -> Result<Option<App>, RepoError>;
    async fn get_by_api_key(&self, api_key: &str) -> Result<Option<App>, RepoError>;
}

#[async_trait]
pub trait AccountRepo: Send + Sync {
    async fn get_by_id(&self, id: i64) -> Result<Option<Account>, RepoError>;
    async fn get_by_uuid(&self, uuid: Uuid) -> Result<Option<Account>, RepoError>;
    async fn get_by_email(&self, email: &str) -> Result<Option<Account>, RepoError>;
    async fn get_all_active(&self) -> Result<Vec<Account>, RepoError>;
    async fn create(&self, account: NewAccount) -> Result<Account, RepoError>;
    async fn update_credentials_and_context(
        &self,
        account_id: i64,
        credentials: &str,
        imap_host: &str,
        imap_port: u16,
        smtp_host: &str,
        smtp_port: u16,
        status: AccountStatus,
    ) -> Result<Account, RepoError>;
    async fn set_status(&self, account_id: i64, status: AccountStatus) -> Result<(), RepoError>;
    async fn delete(&self, uuid: Uuid) -> Result<bool, RepoError>;
}

pub struct NewAccount {
    pub app_id: i64,
    pub email: String,
    pub credentials: String,
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub status: AccountStatus,
}

#[async_trait]
pub trait UidTrackingRepo: Send + Sync {
    async fn get_last_seen_uid(&self, account_id: i64, folder: &str) -> Result<u32, RepoError>;
    /// Advances the watermark to `max(current, uid)` and persists it. Must be
    /// called exactly once per delivered UID, in ascending order, per spec §8
    /// invariant 1 (monotonic watermark) and invariant 2 (no-skip delivery).
    async fn advance(&self, account_id: i64, folder: &str, uid: u32) -> Result<UidTracking, RepoError>;
    async fn get_all_for_account(&self, account_id: i64) -> Result<Vec<UidTracking>, RepoError>;
    /// Deletes every watermark row for `account_id`, run on grant deletion
    /// (spec §3 "Ownership") so reactivation restarts from a clean watermark
    /// rather than replaying old mail.
    async fn delete_all_for_account(&self, account_id: i64) -> Result<(), RepoError>;
}

#[async_trait]
pub trait ConnectionHealthRepo: Send + Sync {
    async fn record_success(&self, account_id: i64, folder: &str) -> Result<ConnectionHealth, RepoError>;
    async fn record_failure(
        &self,
        account_id: i64,
        folder: &str,
        error_message: &str,
    ) -> Result<ConnectionHealth, RepoError>;
    async fn get_by_account_folder(
        &self,
        account_id: i64,
        folder: &str,
    ) -> Result<Option<ConnectionHealth>, RepoError>;
}

#[async_trait]
pub trait EmailRepo: Send + Sync {
    async fn get_by_account_and_message_id(
        &self,
        account_id: i64,
        message_id: &str,
    ) -> Result<Option<EmailIndexRecord>, RepoError>;
    async fn get_by_account_and_uid_or_message_id(
        &self,
        account_id: i64,
        folder: &str,
        uid: u32,
        message_id: &str,
    ) -> Result<Option<EmailIndexRecord>, RepoError>;
    async fn upsert(
        &self,
        account_id: i64,
        message_id: &str,
        thread_id: &str,
        folder: &str,
        uid: u32,
    ) -> Result<EmailIndexRecord, RepoError>;
}

#[async_trait]
pub trait WebhookLogRepo: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    async fn persist(
        &self,
        webhook_uuid: Uuid,
        app_id: i64,
        account_id: i64,
        folder: &str,
        uid: u32,
        webhook_url: &str,
        status_code: Option<u16>,
        response_body: Option<&str>,
        attempts: u32,
        delivered: bool,
    ) -> Result<WebhookLog, RepoError>;
}

#[async_trait]
pub trait AuthorizationRepo: Send + Sync {
    async fn add(&self, request: NewAuthorizationRequest) -> Result<AuthorizationRequest, RepoError>;
    async fn get_by_code(&self, code: &str) -> Result<Option<AuthorizationRequest>, RepoError>;
    async fn mark_used(&self, id: i64) -> Result<(), RepoError>;
}

pub struct NewAuthorizationRequest {
    pub app_id: i64,
    pub account_id: Option<i64>,
    pub client_id: String,
    pub redirect_uri: String,
    pub state: String,
    pub scope: Option<String>,
    pub code: String,
}
