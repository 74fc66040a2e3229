//! HTTP-level tests for the `/v3/grants/{grant_id}` surface, spun up with
//! `actix_web::test::init_service` the way `tests/unit/dashboard_api_handlers.rs`
//! spins up the teacher's dashboard handlers, but wired against mocked repo
//! traits instead of the teacher's concrete services.

use std::sync::Arc;

use actix_web::{http::StatusCode, test, web, App};
use async_trait::async_trait;
use chrono::Utc;
use mockall::mock;
use serde_json::Value;
use uuid::Uuid;

use mailbridge::api::v3::{self, V3State};
use mailbridge::connection_manager::{AccountEndpoint, ConnectionFactory, ConnectionManager};
use mailbridge::credentials::CredentialCipher;
use mailbridge::imap::{AsyncImapSessionWrapper, ImapClient, ImapError};
use mailbridge::message_controller::MessageController;
use mailbridge::models::{
    Account, AccountStatus, App as MbApp, EmailIndexRecord,
};
use mailbridge::ratelimit::HostRateLimiter;
use mailbridge::repo::{AccountRepo, AppRepo, AuthorizationRepo, EmailRepo, NewAccount, NewAuthorizationRequest, RepoError, UidTrackingRepo};
use mailbridge::smtp_sender::SmtpSender;

mock! {
    pub App_ {}
    #[async_trait]
    impl AppRepo for App_ {
        async fn get_by_id(&self, id: i64) -> Result<Option<MbApp>, RepoError>;
        async fn get_by_api_key(&self, api_key: &str) -> Result<Option<MbApp>, RepoError>;
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
        async fn add(&self, request: NewAuthorizationRequest) -> Result<mailbridge::models::AuthorizationRequest, RepoError>;
        async fn get_by_code(&self, code: &str) -> Result<Option<mailbridge::models::AuthorizationRequest>, RepoError>;
        async fn mark_used(&self, id: i64) -> Result<(), RepoError>;
    }
}

mock! {
    pub UidTracking_ {}
    #[async_trait]
    impl UidTrackingRepo for UidTracking_ {
        async fn get_last_seen_uid(&self, account_id: i64, folder: &str) -> Result<u32, RepoError>;
        async fn advance(&self, account_id: i64, folder: &str, uid: u32) -> Result<mailbridge::models::UidTracking, RepoError>;
        async fn get_all_for_account(&self, account_id: i64) -> Result<Vec<mailbridge::models::UidTracking>, RepoError>;
        async fn delete_all_for_account(&self, account_id: i64) -> Result<(), RepoError>;
    }
}

mock! {
    pub Email_ {}
    #[async_trait]
    impl EmailRepo for Email_ {
        async fn get_by_account_and_message_id(&self, account_id: i64, message_id: &str) -> Result<Option<EmailIndexRecord>, RepoError>;
        async fn get_by_account_and_uid_or_message_id(&self, account_id: i64, folder: &str, uid: u32, message_id: &str) -> Result<Option<EmailIndexRecord>, RepoError>;
        async fn upsert(&self, account_id: i64, message_id: &str, thread_id: &str, folder: &str, uid: u32) -> Result<EmailIndexRecord, RepoError>;
    }
}

/// A [`ConnectionFactory`] that always fails to connect; fine for tests that
/// never exercise IMAP, since `ConnectionManager::acquire` is only reached by
/// `get_folder`/`send_message`, not `delete_grant`.
struct NeverConnects;

#[async_trait]
impl ConnectionFactory for NeverConnects {
    async fn create(&self, _endpoint: &AccountEndpoint) -> Result<Arc<ImapClient<AsyncImapSessionWrapper>>, ImapError> {
        Err(ImapError::Connection("test factory never connects".into()))
    }
}

fn sample_app(id: i64) -> MbApp {
    MbApp {
        id,
        uuid: Uuid::new_v4(),
        name: "demo app".into(),
        api_key: "test-api-key".into(),
        webhook_url: Some("https://example.com/webhooks".into()),
        webhook_secret: Some("shh".into()),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn sample_account(id: i64, app_id: i64, uuid: Uuid) -> Account {
    Account {
        id,
        uuid,
        app_id,
        email: "mailbox@example.com".into(),
        credentials: "ENC:v1:unused".into(),
        imap_host: "imap.example.com".into(),
        imap_port: 993,
        smtp_host: "smtp.example.com".into(),
        smtp_port: 587,
        status: AccountStatus::Active,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn test_cipher() -> Arc<CredentialCipher> {
    let key: String = "cd".repeat(32);
    Arc::new(CredentialCipher::from_hex_key(&key).expect("fixed test key is valid"))
}

fn test_state(
    app_repo: MockApp_,
    account_repo: MockAccount_,
    authorization_repo: MockAuthorization_,
    uid_tracking_repo: MockUidTracking_,
) -> web::Data<V3State> {
    let connection_manager = ConnectionManager::new(Arc::new(NeverConnects), Arc::new(HostRateLimiter::new()), 4);
    let email_repo: Arc<dyn EmailRepo> = Arc::new(MockEmail_::new());
    let message_controller = Arc::new(MessageController::new(connection_manager.clone(), email_repo));
    let smtp_sender = Arc::new(SmtpSender::new());

    web::Data::new(V3State {
        app_repo: Arc::new(app_repo),
        account_repo: Arc::new(account_repo),
        authorization_repo: Arc::new(authorization_repo),
        uid_tracking_repo: Arc::new(uid_tracking_repo),
        cipher: test_cipher(),
        connection_manager,
        message_controller,
        smtp_sender,
    })
}

#[actix_web::test]
async fn deleting_a_grant_twice_is_idempotent() {
    let app_id = 1;
    let account_id = 7;
    let grant_id = Uuid::new_v4();

    let mut app_repo = MockApp_::new();
    app_repo.expect_get_by_api_key().returning(move |_| Ok(Some(sample_app(app_id))));

    let mut account_repo = MockAccount_::new();
    account_repo
        .expect_get_by_uuid()
        .withf(move |uuid| *uuid == grant_id)
        .returning(move |_| Ok(Some(sample_account(account_id, app_id, grant_id))));
    account_repo
        .expect_set_status()
        .withf(move |id, status| *id == account_id && *status == AccountStatus::Inactive)
        .times(2)
        .returning(|_, _| Ok(()));

    let authorization_repo = MockAuthorization_::new();

    let mut uid_tracking_repo = MockUidTracking_::new();
    uid_tracking_repo
        .expect_delete_all_for_account()
        .withf(move |id| *id == account_id)
        .times(2)
        .returning(|_| Ok(()));

    let state = test_state(app_repo, account_repo, authorization_repo, uid_tracking_repo);
    let service = test::init_service(App::new().app_data(state.clone()).configure(v3::configure)).await;

    for _ in 0..2 {
        let req = test::TestRequest::delete()
            .uri(&format!("/v3/grants/{grant_id}"))
            .insert_header(("Authorization", "Bearer test-api-key"))
            .to_request();
        let resp = test::call_service(&service, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], Value::Bool(true));
    }
}

#[actix_web::test]
async fn deleting_an_unknown_grant_returns_not_found() {
    let app_id = 1;

    let mut app_repo = MockApp_::new();
    app_repo.expect_get_by_api_key().returning(move |_| Ok(Some(sample_app(app_id))));

    let mut account_repo = MockAccount_::new();
    account_repo.expect_get_by_uuid().returning(|_| Ok(None));

    let authorization_repo = MockAuthorization_::new();
    let uid_tracking_repo = MockUidTracking_::new();

    let state = test_state(app_repo, account_repo, authorization_repo, uid_tracking_repo);
    let service = test::init_service(App::new().app_data(state.clone()).configure(v3::configure)).await;

    let req = test::TestRequest::delete()
        .uri(&format!("/v3/grants/{}", Uuid::new_v4()))
        .insert_header(("Authorization", "Bearer test-api-key"))
        .to_request();
    let resp = test::call_service(&service, req).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["type"], "not_found_error");
}

/// A grant that belongs to a different app must not be visible, even with a
/// valid API key for *some* app (tenant isolation).
#[actix_web::test]
async fn deleting_another_apps_grant_returns_not_found() {
    let authenticated_app_id = 1;
    let owning_app_id = 2;
    let grant_id = Uuid::new_v4();

    let mut app_repo = MockApp_::new();
    app_repo.expect_get_by_api_key().returning(move |_| Ok(Some(sample_app(authenticated_app_id))));

    let mut account_repo = MockAccount_::new();
    account_repo
        .expect_get_by_uuid()
        .returning(move |_| Ok(Some(sample_account(9, owning_app_id, grant_id))));

    let authorization_repo = MockAuthorization_::new();
    let uid_tracking_repo = MockUidTracking_::new();

    let state = test_state(app_repo, account_repo, authorization_repo, uid_tracking_repo);
    let service = test::init_service(App::new().app_data(state.clone()).configure(v3::configure)).await;

    let req = test::TestRequest::delete()
        .uri(&format!("/v3/grants/{grant_id}"))
        .insert_header(("Authorization", "Bearer test-api-key"))
        .to_request();
    let resp = test::call_service(&service, req).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn missing_credentials_are_rejected() {
    let app_repo = MockApp_::new();
    let account_repo = MockAccount_::new();
    let authorization_repo = MockAuthorization_::new();
    let uid_tracking_repo = MockUidTracking_::new();

    let state = test_state(app_repo, account_repo, authorization_repo, uid_tracking_repo);
    let service = test::init_service(App::new().app_data(state.clone()).configure(v3::configure)).await;

    let req = test::TestRequest::delete().uri(&format!("/v3/grants/{}", Uuid::new_v4())).to_request();
    let resp = test::call_service(&service, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["type"], "invalid_request_error");
}
