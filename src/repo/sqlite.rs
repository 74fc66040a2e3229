//! `sqlx::SqlitePool`-backed implementation of the repository traits.
//!
//! Follows the runtime-query idiom used throughout
//! `dashboard/services/cache.rs` — manual `.bind()` chains and
//! `ON CONFLICT ... DO UPDATE ... RETURNING` upserts — rather than the
//! `sqlx::query!` compile-time macro, since that macro needs a live
//! `DATABASE_URL` at build time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{
    AccountRepo, AppRepo, AuthorizationRepo, ConnectionHealthRepo, EmailRepo, NewAccount,
    NewAuthorizationRequest, RepoError, UidTrackingRepo, WebhookLogRepo,
};
use crate::models::{
    Account, AccountStatus, App, AuthorizationRequest, AuthorizationStatus, ConnectionHealth,
    EmailIndexRecord, UidTracking, WebhookLog,
};

#[derive(Clone)]
pub struct SqliteRepos {
    pool: SqlitePool,
}

impl SqliteRepos {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Applies `./migrations` (spec §6 persisted tables), mirroring how
    /// `dashboard/services/cache.rs` runs `sqlx::migrate!` at startup.
    pub async fn migrate(&self) -> Result<(), RepoError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RepoError::Constraint(e.to_string()))?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn account_status_str(status: AccountStatus) -> &'static str {
    status.as_str()
}

fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Result<Account, RepoError> {
    let uuid_str: String = row.try_get("uuid")?;
    let status_str: String = row.try_get("status")?;
    Ok(Account {
        id: row.try_get("id")?,
        uuid: Uuid::parse_str(&uuid_str).map_err(|e| RepoError::Constraint(e.to_string()))?,
        app_id: row.try_get("app_id")?,
        email: row.try_get("email")?,
        credentials: row.try_get("credentials")?,
        imap_host: row.try_get("imap_host")?,
        imap_port: row.try_get::<i64, _>("imap_port")? as u16,
        smtp_host: row.try_get("smtp_host")?,
        smtp_port: row.try_get::<i64, _>("smtp_port")? as u16,
        status: AccountStatus::from_str(&status_str),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl AccountRepo for SqliteRepos {
    async fn get_by_id(&self, id: i64) -> Result<Option<Account>, RepoError> {
        let row = sqlx::query("SELECT * FROM accounts WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_account).transpose()
    }

    async fn get_by_uuid(&self, uuid: Uuid) -> Result<Option<Account>, RepoError> {
        let row = sqlx::query("SELECT * FROM accounts WHERE uuid = ?1")
            .bind(uuid.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_account).transpose()
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Account>, RepoError> {
        let row = sqlx::query("SELECT * FROM accounts WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_account).transpose()
    }

    async fn get_all_active(&self) -> Result<Vec<Account>, RepoError> {
        let rows = sqlx::query("SELECT * FROM accounts WHERE status = 'active'")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_account).collect()
    }

    async fn create(&self, account: NewAccount) -> Result<Account, RepoError> {
        let uuid = Uuid::new_v4();
        let now = Utc::now();
        let id: i64 = sqlx::query_scalar(
            r#"INSERT INTO accounts
                (uuid, app_id, email, credentials, imap_host, imap_port, smtp_host, smtp_port, status, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
               RETURNING id"#,
        )
        .bind(uuid.to_string())
        .bind(account.app_id)
        .bind(&account.email)
        .bind(&account.credentials)
        .bind(&account.imap_host)
        .bind(account.imap_port as i64)
        .bind(&account.smtp_host)
        .bind(account.smtp_port as i64)
        .bind(account_status_str(account.status))
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        self.get_by_uuid(uuid)
            .await?
            .ok_or(RepoError::NotFound)
            .map(|a| Account { id, ..a })
    }

    async fn update_credentials_and_context(
        &self,
        account_id: i64,
        credentials: &str,
        imap_host: &str,
        imap_port: u16,
        smtp_host: &str,
        smtp_port: u16,
        status: AccountStatus,
    ) -> Result<Account, RepoError> {
        sqlx::query(
            r#"UPDATE accounts
               SET credentials = ?1, imap_host = ?2, imap_port = ?3, smtp_host = ?4, smtp_port = ?5,
                   status = ?6, updated_at = ?7
               WHERE id = ?8"#,
        )
        .bind(credentials)
        .bind(imap_host)
        .bind(imap_port as i64)
        .bind(smtp_host)
        .bind(smtp_port as i64)
        .bind(account_status_str(status))
        .bind(Utc::now())
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query("SELECT * FROM accounts WHERE id = ?1")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref()
            .map(row_to_account)
            .transpose()?
            .ok_or(RepoError::NotFound)
    }

    async fn set_status(&self, account_id: i64, status: AccountStatus) -> Result<(), RepoError> {
        sqlx::query("UPDATE accounts SET status = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(account_status_str(status))
            .bind(Utc::now())
            .bind(account_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, uuid: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM accounts WHERE uuid = ?1")
            .bind(uuid.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AppRepo for SqliteRepos {
    async fn get_by_id(&self, id: i64) -> Result<Option<App>, RepoError> {
        let row = sqlx::query("SELECT * FROM apps WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_app).transpose()
    }

    async fn get_by_api_key(&self, api_key: &str) -> Result<Option<App>, RepoError> {
        let row = sqlx::query("SELECT * FROM apps WHERE api_key = ?1")
            .bind(api_key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_app).transpose()
    }
}

fn row_to_app(row: sqlx::sqlite::SqliteRow) -> Result<App, RepoError> {
    let uuid_str: String = row.try_get("uuid")?;
    Ok(App {
        id: row.try_get("id")?,
        uuid: Uuid::parse_str(&uuid_str).map_err(|e| RepoError::Constraint(e.to_string()))?,
        name: row.try_get("name")?,
        api_key: row.try_get("api_key")?,
        webhook_url: row.try_get("webhook_url")?,
        webhook_secret: row.try_get("webhook_secret")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl UidTrackingRepo for SqliteRepos {
    async fn get_last_seen_uid(&self, account_id: i64, folder: &str) -> Result<u32, RepoError> {
        let uid: Option<i64> = sqlx::query_scalar(
            "SELECT last_seen_uid FROM uid_tracking WHERE account_id = ?1 AND folder = ?2",
        )
        .bind(account_id)
        .bind(folder)
        .fetch_optional(&self.pool)
        .await?;
        Ok(uid.unwrap_or(0) as u32)
    }

    async fn advance(
        &self,
        account_id: i64,
        folder: &str,
        uid: u32,
    ) -> Result<UidTracking, RepoError> {
        let now = Utc::now();
        sqlx::query(
            r#"INSERT INTO uid_tracking (account_id, folder, last_seen_uid, last_checked_at)
               VALUES (?1, ?2, ?3, ?4)
               ON CONFLICT(account_id, folder) DO UPDATE SET
                   last_seen_uid = MAX(last_seen_uid, excluded.last_seen_uid),
                   last_checked_at = excluded.last_checked_at"#,
        )
        .bind(account_id)
        .bind(folder)
        .bind(uid as i64)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            "SELECT account_id, folder, last_seen_uid, last_checked_at FROM uid_tracking WHERE account_id = ?1 AND folder = ?2",
        )
        .bind(account_id)
        .bind(folder)
        .fetch_one(&self.pool)
        .await?;

        Ok(UidTracking {
            account_id: row.try_get("account_id")?,
            folder: row.try_get("folder")?,
            last_seen_uid: row.try_get::<i64, _>("last_seen_uid")? as u32,
            last_checked_at: row.try_get("last_checked_at")?,
        })
    }

    async fn get_all_for_account(&self, account_id: i64) -> Result<Vec<UidTracking>, RepoError> {
        let rows = sqlx::query(
            "SELECT account_id, folder, last_seen_uid, last_checked_at FROM uid_tracking WHERE account_id = ?1",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(UidTracking {
                    account_id: row.try_get("account_id")?,
                    folder: row.try_get("folder")?,
                    last_seen_uid: row.try_get::<i64, _>("last_seen_uid")? as u32,
                    last_checked_at: row.try_get("last_checked_at")?,
                })
            })
            .collect()
    }

    async fn delete_all_for_account(&self, account_id: i64) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM uid_tracking WHERE account_id = ?1")
            .bind(account_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_health(row: sqlx::sqlite::SqliteRow) -> Result<ConnectionHealth, RepoError> {
    Ok(ConnectionHealth {
        account_id: row.try_get("account_id")?,
        folder: row.try_get("folder")?,
        last_success_at: row.try_get("last_success_at")?,
        consecutive_failures: row.try_get::<i64, _>("consecutive_failures")? as u32,
        last_error: row.try_get("last_error")?,
        is_active: row.try_get::<i64, _>("is_active")? != 0,
    })
}

#[async_trait]
impl ConnectionHealthRepo for SqliteRepos {
    async fn record_success(
        &self,
        account_id: i64,
        folder: &str,
    ) -> Result<ConnectionHealth, RepoError> {
        let now = Utc::now();
        sqlx::query(
            r#"INSERT INTO connection_health (account_id, folder, last_success_at, consecutive_failures, last_error, is_active)
               VALUES (?1, ?2, ?3, 0, NULL, 1)
               ON CONFLICT(account_id, folder) DO UPDATE SET
                   last_success_at = excluded.last_success_at,
                   consecutive_failures = 0,
                   last_error = NULL,
                   is_active = 1"#,
        )
        .bind(account_id)
        .bind(folder)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get_by_account_folder(account_id, folder)
            .await?
            .ok_or(RepoError::NotFound)
    }

    async fn record_failure(
        &self,
        account_id: i64,
        folder: &str,
        error_message: &str,
    ) -> Result<ConnectionHealth, RepoError> {
        let existing = self.get_by_account_folder(account_id, folder).await?;
        let next_failures = existing.map(|h| h.consecutive_failures).unwrap_or(0) + 1;
        let is_active = next_failures < ConnectionHealth::MAX_CONSECUTIVE_FAILURES;

        sqlx::query(
            r#"INSERT INTO connection_health (account_id, folder, last_success_at, consecutive_failures, last_error, is_active)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)
               ON CONFLICT(account_id, folder) DO UPDATE SET
                   consecutive_failures = excluded.consecutive_failures,
                   last_error = excluded.last_error,
                   is_active = excluded.is_active"#,
        )
        .bind(account_id)
        .bind(folder)
        .bind(Utc::now())
        .bind(next_failures as i64)
        .bind(error_message)
        .bind(is_active as i64)
        .execute(&self.pool)
        .await?;

        self.get_by_account_folder(account_id, folder)
            .await?
            .ok_or(RepoError::NotFound)
    }

    async fn get_by_account_folder(
        &self,
        account_id: i64,
        folder: &str,
    ) -> Result<Option<ConnectionHealth>, RepoError> {
        let row = sqlx::query(
            "SELECT * FROM connection_health WHERE account_id = ?1 AND folder = ?2",
        )
        .bind(account_id)
        .bind(folder)
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_health).transpose()
    }
}

fn row_to_email_index(row: sqlx::sqlite::SqliteRow) -> Result<EmailIndexRecord, RepoError> {
    Ok(EmailIndexRecord {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        message_id: row.try_get("message_id")?,
        thread_id: row.try_get("thread_id")?,
        folder: row.try_get("folder")?,
        uid: row.try_get::<Option<i64>, _>("uid")?.map(|v| v as u32),
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl EmailRepo for SqliteRepos {
    async fn get_by_account_and_message_id(
        &self,
        account_id: i64,
        message_id: &str,
    ) -> Result<Option<EmailIndexRecord>, RepoError> {
        let row = sqlx::query("SELECT * FROM email_index WHERE account_id = ?1 AND message_id = ?2")
            .bind(account_id)
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_email_index).transpose()
    }

    async fn get_by_account_and_uid_or_message_id(
        &self,
        account_id: i64,
        folder: &str,
        uid: u32,
        message_id: &str,
    ) -> Result<Option<EmailIndexRecord>, RepoError> {
        let row = sqlx::query(
            "SELECT * FROM email_index WHERE account_id = ?1 AND ((folder = ?2 AND uid = ?3) OR message_id = ?4) LIMIT 1",
        )
        .bind(account_id)
        .bind(folder)
        .bind(uid as i64)
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_email_index).transpose()
    }

    async fn upsert(
        &self,
        account_id: i64,
        message_id: &str,
        thread_id: &str,
        folder: &str,
        uid: u32,
    ) -> Result<EmailIndexRecord, RepoError> {
        let now = Utc::now();
        sqlx::query(
            r#"INSERT INTO email_index (account_id, message_id, thread_id, folder, uid, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)
               ON CONFLICT(account_id, message_id) DO UPDATE SET
                   folder = excluded.folder,
                   uid = excluded.uid"#,
        )
        .bind(account_id)
        .bind(message_id)
        .bind(thread_id)
        .bind(folder)
        .bind(uid as i64)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get_by_account_and_message_id(account_id, message_id)
            .await?
            .ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl WebhookLogRepo for SqliteRepos {
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
    ) -> Result<WebhookLog, RepoError> {
        let now = Utc::now();
        let delivered_at: Option<DateTime<Utc>> = if delivered { Some(now) } else { None };

        let id: i64 = sqlx::query_scalar(
            r#"INSERT INTO webhook_log
                (uuid, app_id, account_id, folder, uid, webhook_url, status_code, response_body, attempts, delivered_at, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
               RETURNING id"#,
        )
        .bind(webhook_uuid.to_string())
        .bind(app_id)
        .bind(account_id)
        .bind(folder)
        .bind(uid as i64)
        .bind(webhook_url)
        .bind(status_code.map(|c| c as i64))
        .bind(response_body)
        .bind(attempts as i64)
        .bind(delivered_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(WebhookLog {
            id,
            uuid: webhook_uuid,
            app_id,
            account_id,
            folder: folder.to_string(),
            uid,
            webhook_url: webhook_url.to_string(),
            status_code,
            response_body: response_body.map(|s| s.to_string()),
            attempts,
            delivered_at,
            created_at: now,
        })
    }
}

fn auth_status_str(status: AuthorizationStatus) -> &'static str {
    match status {
        AuthorizationStatus::Pending => "pending",
        AuthorizationStatus::Authorized => "authorized",
        AuthorizationStatus::Denied => "denied",
        AuthorizationStatus::Expired => "expired",
    }
}

fn auth_status_from_str(s: &str) -> AuthorizationStatus {
    match s {
        "authorized" => AuthorizationStatus::Authorized,
        "denied" => AuthorizationStatus::Denied,
        "expired" => AuthorizationStatus::Expired,
        _ => AuthorizationStatus::Pending,
    }
}

fn row_to_authorization(row: sqlx::sqlite::SqliteRow) -> Result<AuthorizationRequest, RepoError> {
    let uuid_str: String = row.try_get("uuid")?;
    let status_str: String = row.try_get("status")?;
    Ok(AuthorizationRequest {
        id: row.try_get("id")?,
        uuid: Uuid::parse_str(&uuid_str).map_err(|e| RepoError::Constraint(e.to_string()))?,
        app_id: row.try_get("app_id")?,
        account_id: row.try_get("account_id")?,
        client_id: row.try_get("client_id")?,
        redirect_uri: row.try_get("redirect_uri")?,
        state: row.try_get("state")?,
        scope: row.try_get("scope")?,
        status: auth_status_from_str(&status_str),
        code: row.try_get("code")?,
        code_used: row.try_get::<i64, _>("code_used")? != 0,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl AuthorizationRepo for SqliteRepos {
    async fn add(
        &self,
        request: NewAuthorizationRequest,
    ) -> Result<AuthorizationRequest, RepoError> {
        let uuid = Uuid::new_v4();
        let now = Utc::now();
        let expires_at = AuthorizationRequest::expires_at_from_now();

        sqlx::query(
            r#"INSERT INTO authorization_requests
                (uuid, app_id, account_id, client_id, redirect_uri, state, scope, status, code, code_used, expires_at, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8, 0, ?9, ?10)"#,
        )
        .bind(uuid.to_string())
        .bind(request.app_id)
        .bind(request.account_id)
        .bind(&request.client_id)
        .bind(&request.redirect_uri)
        .bind(&request.state)
        .bind(&request.scope)
        .bind(&request.code)
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get_by_code(&request.code)
            .await?
            .ok_or(RepoError::NotFound)
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<AuthorizationRequest>, RepoError> {
        let row = sqlx::query("SELECT * FROM authorization_requests WHERE code = ?1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_authorization).transpose()
    }

    async fn mark_used(&self, id: i64) -> Result<(), RepoError> {
        sqlx::query(
            "UPDATE authorization_requests SET code_used = 1, status = 'authorized' WHERE id = ?1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
