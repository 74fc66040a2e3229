//! Exercises [`mailbridge::webhook::WebhookDispatcher::deliver`] against a
//! real HTTP server (spec §8 scenario E: two 500s then a 200), using a
//! hand-written in-memory `WebhookLogRepo` fake rather than a mock, since the
//! assertions care about the full sequence of persisted rows rather than
//! individual call expectations.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use actix_web::{web, App, HttpResponse, HttpServer};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use mailbridge::models::{CanonicalMessage, EmailAddress, WebhookLog};
use mailbridge::repo::{RepoError, WebhookLogRepo};
use mailbridge::webhook::WebhookDispatcher;

#[derive(Default)]
struct InMemoryWebhookLogRepo {
    rows: Mutex<Vec<WebhookLog>>,
}

#[async_trait]
impl WebhookLogRepo for InMemoryWebhookLogRepo {
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
        let row = WebhookLog {
            id: 0,
            uuid: webhook_uuid,
            app_id,
            account_id,
            folder: folder.to_string(),
            uid,
            webhook_url: webhook_url.to_string(),
            status_code,
            response_body: response_body.map(str::to_string),
            attempts,
            delivered_at: delivered.then(Utc::now),
            created_at: Utc::now(),
        };
        self.rows.lock().unwrap().push(row.clone());
        Ok(row)
    }
}

fn sample_message() -> CanonicalMessage {
    CanonicalMessage {
        id: "<msg-1@example.com>".into(),
        object: "message",
        grant_id: Uuid::new_v4().to_string(),
        subject: "hello".into(),
        from_: vec![EmailAddress { name: "Alice".into(), email: "alice@example.com".into() }],
        to: vec![EmailAddress { name: "Bob".into(), email: "bob@example.com".into() }],
        cc: vec![],
        bcc: vec![],
        reply_to: vec![],
        date: Utc::now().timestamp(),
        body: "body text".into(),
        snippet: "body text".into(),
        thread_id: "thread-1".into(),
        folders: vec!["INBOX".into()],
        starred: false,
        unread: true,
        attachments: vec![],
    }
}

async fn flaky_endpoint(counter: web::Data<Arc<AtomicUsize>>) -> HttpResponse {
    let attempt = counter.fetch_add(1, Ordering::SeqCst);
    if attempt < 2 {
        HttpResponse::InternalServerError().finish()
    } else {
        HttpResponse::Ok().finish()
    }
}

/// Scenario E: attempt 1 -> 500, attempt 2 -> 500, attempt 3 -> 200. Every
/// attempt persists its own `WebhookLog` row; only the last has `delivered_at`.
#[actix_web::test]
async fn retries_twice_then_succeeds_and_logs_every_attempt() {
    let counter = Arc::new(AtomicUsize::new(0));
    let counter_data = web::Data::new(counter.clone());

    let server = HttpServer::new(move || {
        App::new()
            .app_data(counter_data.clone())
            .route("/webhook", web::post().to(flaky_endpoint))
    })
    .bind(("127.0.0.1", 0))
    .expect("binds an ephemeral port");
    let addr = server.addrs()[0];
    let server_handle = tokio::spawn(server.run());

    let url = format!("http://{addr}/webhook");
    let dispatcher = WebhookDispatcher::new(reqwest::Client::new());
    let repo = InMemoryWebhookLogRepo::default();
    let message = sample_message();

    let delivered = dispatcher
        .deliver(&repo, 1, 7, "INBOX", 42, &url, Some("shared-secret"), &message)
        .await;

    server_handle.abort();

    assert!(delivered);
    let rows = repo.rows.lock().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].status_code, Some(500));
    assert!(rows[0].delivered_at.is_none());
    assert_eq!(rows[0].attempts, 1);
    assert_eq!(rows[1].status_code, Some(500));
    assert!(rows[1].delivered_at.is_none());
    assert_eq!(rows[1].attempts, 2);
    assert_eq!(rows[2].status_code, Some(200));
    assert!(rows[2].delivered_at.is_some());
    assert_eq!(rows[2].attempts, 3);
}

/// A 4xx response aborts immediately: one logged attempt, no retry.
#[actix_web::test]
async fn a_4xx_response_is_not_retried() {
    async fn rejecting_endpoint() -> HttpResponse {
        HttpResponse::BadRequest().finish()
    }

    let server = HttpServer::new(|| App::new().route("/webhook", web::post().to(rejecting_endpoint)))
        .bind(("127.0.0.1", 0))
        .expect("binds an ephemeral port");
    let addr = server.addrs()[0];
    let server_handle = tokio::spawn(server.run());

    let url = format!("http://{addr}/webhook");
    let dispatcher = WebhookDispatcher::new(reqwest::Client::new());
    let repo = InMemoryWebhookLogRepo::default();
    let message = sample_message();

    let delivered = dispatcher.deliver(&repo, 1, 7, "INBOX", 43, &url, None, &message).await;

    server_handle.abort();

    assert!(!delivered);
    let rows = repo.rows.lock().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status_code, Some(400));
}
