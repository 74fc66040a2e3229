//! Unit tests for [`mailbridge::authorization::AuthorizationController::exchange_token`],
//! mocking the repo traits the way `tests/unit_tests/imap_client_tests.rs` mocks
//! `ImapSessionTrait` in the teacher.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use mockall::mock;
use uuid::Uuid;

use mailbridge::authorization::{AuthorizationController, AuthorizationError, TokenExchange};
use mailbridge::credentials::CredentialCipher;
use mailbridge::models::{Account, AccountStatus, App, AuthorizationRequest, AuthorizationStatus};
use mailbridge::repo::{AccountRepo, AppRepo, AuthorizationRepo, NewAccount, NewAuthorizationRequest, RepoError};

fn cipher() -> Arc<CredentialCipher> {
    // 64 hex chars = 32 bytes; value is irrelevant, exchange_token never
    // touches the cipher.
    let key: String = "ab".repeat(32);
    Arc::new(CredentialCipher::from_hex_key(&key).expect("fixed test key is valid"))
}

mock! {
    pub App_ {}

    #[async_trait]
    impl AppRepo for App_ {
        async fn get_by_id(&self, id: i64) -> Result<Option<App>, RepoError>;
        async fn get_by_api_key(&self, api_key: &str) -> Result<Option<App>, RepoError>;
    }
}

mock! {
    pub Account_ {}

    #[async_trait]
    impl AccountRepo for Account_ {
        async fn get_by_id(&self, id: i64) -> Result<Option<Account>, RepoError>;
        async fn get_by_uuid(&self, uuid: Uuid) -> Result<Option<Account>, RepoError>;
        async fn get_by_email(&self, email: &str) -> Result<Option<Account>, RepoError>;
        async fn get_all_active(&self) -> Result<Vec<Account>, RepoError>;
        async fn create(&self, account: NewAccount) -> Result<Account, RepoError>;
        #[allow(clippy::too_many_arguments)]
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
}

mock! {
    pub Authorization_ {}

    #[async_trait]
    impl AuthorizationRepo for Authorization_ {
        async fn add(&self, request: NewAuthorizationRequest) -> Result<AuthorizationRequest, RepoError>;
        async fn get_by_code(&self, code: &str) -> Result<Option<AuthorizationRequest>, RepoError>;
        async fn mark_used(&self, id: i64) -> Result<(), RepoError>;
    }
}

fn sample_account(id: i64) -> Account {
    Account {
        id,
        uuid: Uuid::new_v4(),
        app_id: 1,
        email: "mailbox@example.com".into(),
        credentials: "ENC:v1:unused-in-this-test".into(),
        imap_host: "imap.example.com".into(),
        imap_port: 993,
        smtp_host: "smtp.example.com".into(),
        smtp_port: 587,
        status: AccountStatus::Pending,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn sample_request(code_used: bool, expires_in_minutes: i64) -> AuthorizationRequest {
    AuthorizationRequest {
        id: 42,
        uuid: Uuid::new_v4(),
        app_id: 1,
        account_id: Some(7),
        client_id: "client-abc".into(),
        redirect_uri: "https://app.example.com/callback".into(),
        state: "xyz".into(),
        scope: None,
        status: AuthorizationStatus::Pending,
        code: "a-one-time-code".into(),
        code_used,
        expires_at: Utc::now() + Duration::minutes(expires_in_minutes),
        created_at: Utc::now(),
    }
}

fn controller(
    app_repo: MockApp_,
    account_repo: MockAccount_,
    authorization_repo: MockAuthorization_,
) -> AuthorizationController {
    AuthorizationController::new(Arc::new(app_repo), Arc::new(account_repo), Arc::new(authorization_repo), cipher())
}

#[tokio::test]
async fn exchange_token_activates_account_and_marks_code_used() {
    let request = sample_request(false, 10);
    let request_uuid = request.uuid;
    let account_uuid = Uuid::new_v4();

    let app_repo = MockApp_::new();
    let mut account_repo = MockAccount_::new();
    let mut authorization_repo = MockAuthorization_::new();

    authorization_repo.expect_get_by_code().returning(move |_| Ok(Some(request.clone())));
    authorization_repo.expect_mark_used().withf(|id| *id == 42).returning(|_| Ok(()));
    account_repo
        .expect_set_status()
        .withf(|id, status| *id == 7 && *status == AccountStatus::Active)
        .returning(|_, _| Ok(()));
    account_repo.expect_get_by_id().withf(|id| *id == 7).returning(move |id| {
        let mut account = sample_account(id);
        account.uuid = account_uuid;
        Ok(Some(account))
    });

    let controller = controller(app_repo, account_repo, authorization_repo);
    let result = controller
        .exchange_token(TokenExchange {
            app_id: 1,
            client_id: "client-abc".into(),
            redirect_uri: "https://app.example.com/callback".into(),
            code: "a-one-time-code".into(),
        })
        .await
        .expect("valid exchange succeeds");

    assert_eq!(result.request_id, request_uuid);
    assert_eq!(result.grant_id, account_uuid);
}

#[tokio::test]
async fn a_used_code_cannot_be_redeemed_twice() {
    let app_repo = MockApp_::new();
    let account_repo = MockAccount_::new();
    let mut authorization_repo = MockAuthorization_::new();

    authorization_repo.expect_get_by_code().returning(|_| Ok(Some(sample_request(true, 10))));

    let controller = controller(app_repo, account_repo, authorization_repo);
    let err = controller
        .exchange_token(TokenExchange {
            app_id: 1,
            client_id: "client-abc".into(),
            redirect_uri: "https://app.example.com/callback".into(),
            code: "a-one-time-code".into(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AuthorizationError::CodeNotValid));
}

#[tokio::test]
async fn an_expired_code_cannot_be_redeemed() {
    let app_repo = MockApp_::new();
    let account_repo = MockAccount_::new();
    let mut authorization_repo = MockAuthorization_::new();

    authorization_repo.expect_get_by_code().returning(|_| Ok(Some(sample_request(false, -1))));

    let controller = controller(app_repo, account_repo, authorization_repo);
    let err = controller
        .exchange_token(TokenExchange {
            app_id: 1,
            client_id: "client-abc".into(),
            redirect_uri: "https://app.example.com/callback".into(),
            code: "a-one-time-code".into(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AuthorizationError::CodeNotValid));
}

/// Spec §8 scenario F: a redirect_uri mismatch on token exchange is an
/// `invalid_request_error`, not a generic failure.
#[tokio::test]
async fn redirect_uri_mismatch_is_an_invalid_request_error() {
    let app_repo = MockApp_::new();
    let account_repo = MockAccount_::new();
    let mut authorization_repo = MockAuthorization_::new();

    authorization_repo.expect_get_by_code().returning(|_| Ok(Some(sample_request(false, 10))));

    let controller = controller(app_repo, account_repo, authorization_repo);
    let err = controller
        .exchange_token(TokenExchange {
            app_id: 1,
            client_id: "client-abc".into(),
            redirect_uri: "https://attacker.example.com/callback".into(),
            code: "a-one-time-code".into(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AuthorizationError::InvalidRequest(_)));
}

#[tokio::test]
async fn client_id_mismatch_is_an_invalid_request_error() {
    let app_repo = MockApp_::new();
    let account_repo = MockAccount_::new();
    let mut authorization_repo = MockAuthorization_::new();

    authorization_repo.expect_get_by_code().returning(|_| Ok(Some(sample_request(false, 10))));

    let controller = controller(app_repo, account_repo, authorization_repo);
    let err = controller
        .exchange_token(TokenExchange {
            app_id: 1,
            client_id: "someone-else".into(),
            redirect_uri: "https://app.example.com/callback".into(),
            code: "a-one-time-code".into(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AuthorizationError::InvalidRequest(_)));
}

#[tokio::test]
async fn app_id_mismatch_is_treated_as_an_unknown_code() {
    let app_repo = MockApp_::new();
    let account_repo = MockAccount_::new();
    let mut authorization_repo = MockAuthorization_::new();

    authorization_repo.expect_get_by_code().returning(|_| Ok(Some(sample_request(false, 10))));

    let controller = controller(app_repo, account_repo, authorization_repo);
    let err = controller
        .exchange_token(TokenExchange {
            app_id: 999,
            client_id: "client-abc".into(),
            redirect_uri: "https://app.example.com/callback".into(),
            code: "a-one-time-code".into(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AuthorizationError::CodeNotValid));
}

#[tokio::test]
async fn unknown_code_is_rejected() {
    let app_repo = MockApp_::new();
    let account_repo = MockAccount_::new();
    let mut authorization_repo = MockAuthorization_::new();

    authorization_repo.expect_get_by_code().returning(|_| Ok(None));

    let controller = controller(app_repo, account_repo, authorization_repo);
    let err = controller
        .exchange_token(TokenExchange {
            app_id: 1,
            client_id: "client-abc".into(),
            redirect_uri: "https://app.example.com/callback".into(),
            code: "never-issued".into(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AuthorizationError::CodeNotValid));
}
