//! OAuth2-style authorization flow (spec §4.8, §6), grounded on
//! `app/controllers/grant/authorization_controller.py`.
//!
//! A submission is validated by actually logging in to both IMAP and SMTP
//! with the presented credentials before anything is persisted — an account
//! never enters the store on the strength of an unverified password.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL, Engine as _};
use lettre::transport::smtp::authentication::Credentials as SmtpCredentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use rand::RngCore;
use thiserror::Error;
use uuid::Uuid;

use crate::credentials::CredentialCipher;
use crate::imap::{AsyncImapSessionWrapper, ImapClient};
use crate::models::AccountStatus;
use crate::repo::{AccountRepo, AppRepo, AuthorizationRepo, NewAccount, NewAuthorizationRequest, RepoError};

#[derive(Debug, Error)]
pub enum AuthorizationError {
    #[error("unknown application")]
    UnknownApp,
    #[error("imap login failed: {0}")]
    ImapLoginFailed(String),
    #[error("smtp login failed: {0}")]
    SmtpLoginFailed(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Credential(#[from] crate::credentials::CredentialError),
    #[error("invalid_request_error: {0}")]
    InvalidRequest(String),
    #[error("code has expired or already been used")]
    CodeNotValid,
}

/// Fields submitted on `POST /v3/connect/process` (spec §6).
pub struct AuthorizationSubmission {
    pub app_id: i64,
    pub client_id: String,
    pub redirect_uri: String,
    pub state: String,
    pub scope: Option<String>,
    pub email: String,
    pub password: String,
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
}

pub struct ProcessOutcome {
    pub authorization_code: String,
    pub redirect_uri: String,
    pub state: String,
}

/// Fields submitted on `POST /v3/connect/token`.
pub struct TokenExchange {
    pub app_id: i64,
    pub client_id: String,
    pub redirect_uri: String,
    pub code: String,
}

pub struct TokenExchangeResult {
    pub request_id: Uuid,
    pub grant_id: Uuid,
}

pub struct AuthorizationController {
    app_repo: std::sync::Arc<dyn AppRepo>,
    account_repo: std::sync::Arc<dyn AccountRepo>,
    authorization_repo: std::sync::Arc<dyn AuthorizationRepo>,
    cipher: std::sync::Arc<CredentialCipher>,
}

impl AuthorizationController {
    pub fn new(
        app_repo: std::sync::Arc<dyn AppRepo>,
        account_repo: std::sync::Arc<dyn AccountRepo>,
        authorization_repo: std::sync::Arc<dyn AuthorizationRepo>,
        cipher: std::sync::Arc<CredentialCipher>,
    ) -> Self {
        Self { app_repo, account_repo, authorization_repo, cipher }
    }

    /// Validates IMAP and SMTP login, upserts the `Account` (status
    /// `pending`, or `active` again if it already was), and issues a fresh
    /// one-time authorization code.
    pub async fn process(&self, submission: AuthorizationSubmission) -> Result<ProcessOutcome, AuthorizationError> {
        if self.app_repo.get_by_id(submission.app_id).await?.is_none() {
            return Err(AuthorizationError::UnknownApp);
        }

        test_imap_login(&submission.imap_host, submission.imap_port, &submission.email, &submission.password)
            .await
            .map_err(AuthorizationError::ImapLoginFailed)?;
        test_smtp_login(&submission.smtp_host, submission.smtp_port, &submission.email, &submission.password)
            .await
            .map_err(AuthorizationError::SmtpLoginFailed)?;

        let encrypted = self.cipher.encrypt(&submission.password)?;

        let existing = self.account_repo.get_by_email(&submission.email).await?;
        let account = match existing {
            Some(existing) => {
                // An already-active account stays active through re-authorization;
                // any other prior status goes back to pending until the token
                // exchange below completes.
                let status = if existing.status == AccountStatus::Active {
                    AccountStatus::Active
                } else {
                    AccountStatus::Pending
                };
                self.account_repo
                    .update_credentials_and_context(
                        existing.id,
                        &encrypted,
                        &submission.imap_host,
                        submission.imap_port,
                        &submission.smtp_host,
                        submission.smtp_port,
                        status,
                    )
                    .await?
            }
            None => {
                self.account_repo
                    .create(NewAccount {
                        app_id: submission.app_id,
                        email: submission.email.clone(),
                        credentials: encrypted,
                        imap_host: submission.imap_host.clone(),
                        imap_port: submission.imap_port,
                        smtp_host: submission.smtp_host.clone(),
                        smtp_port: submission.smtp_port,
                        status: AccountStatus::Pending,
                    })
                    .await?
            }
        };

        let code = generate_authorization_code();
        self.authorization_repo
            .add(NewAuthorizationRequest {
                app_id: submission.app_id,
                account_id: Some(account.id),
                client_id: submission.client_id.clone(),
                redirect_uri: submission.redirect_uri.clone(),
                state: submission.state.clone(),
                scope: submission.scope.clone(),
                code: code.clone(),
            })
            .await?;

        Ok(ProcessOutcome {
            authorization_code: code,
            redirect_uri: submission.redirect_uri,
            state: submission.state,
        })
    }

    /// Redeems a code minted by [`Self::process`]: validates
    /// `grant_type=authorization_code`, the code's unused/not-expired/
    /// redirect-uri/app/client-id match (spec §3, §8 scenario F), flips
    /// `code_used`, and activates the bound account.
    pub async fn exchange_token(&self, exchange: TokenExchange) -> Result<TokenExchangeResult, AuthorizationError> {
        let request = self
            .authorization_repo
            .get_by_code(&exchange.code)
            .await?
            .ok_or(AuthorizationError::CodeNotValid)?;

        if !request.is_valid() {
            return Err(AuthorizationError::CodeNotValid);
        }
        if request.app_id != exchange.app_id {
            return Err(AuthorizationError::CodeNotValid);
        }
        if request.client_id != exchange.client_id {
            return Err(AuthorizationError::InvalidRequest("client_id mismatch".into()));
        }
        if request.redirect_uri != exchange.redirect_uri {
            return Err(AuthorizationError::InvalidRequest("Invalid redirect_uri".into()));
        }

        let account_id = request
            .account_id
            .ok_or(AuthorizationError::CodeNotValid)?;

        self.authorization_repo.mark_used(request.id).await?;
        self.account_repo.set_status(account_id, AccountStatus::Active).await?;

        let account = self
            .account_repo
            .get_by_id(account_id)
            .await?
            .ok_or(AuthorizationError::CodeNotValid)?;

        Ok(TokenExchangeResult {
            request_id: request.uuid,
            grant_id: account.grant_id(),
        })
    }
}

fn generate_authorization_code() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE64_URL.encode(bytes)
}

async fn test_imap_login(host: &str, port: u16, email: &str, password: &str) -> Result<(), String> {
    ImapClient::<AsyncImapSessionWrapper>::connect(host, port, email, password)
        .await
        .map(|_| ())
        .map_err(|e| e.to_string())
}

async fn test_smtp_login(host: &str, port: u16, email: &str, password: &str) -> Result<(), String> {
    let creds = SmtpCredentials::new(email.to_string(), password.to_string());
    let use_starttls = port == 587;
    let builder = if use_starttls {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::relay(host)
    };
    let mailer = builder
        .map_err(|e| e.to_string())?
        .port(port)
        .credentials(creds)
        .build();
    mailer.test_connection().await.map_err(|e| e.to_string())?;
    Ok(())
}
