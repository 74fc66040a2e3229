//! Webhook delivery, grounded on `app/controllers/imap/email_processor.py`'s
//! `send_webhook_with_retry`/`_generate_signature`.
//!
//! Envelope shape, retry/backoff timing, and signature header all mirror the
//! original: a CloudEvents-ish envelope, `x-nylas-signature` HMAC-SHA256
//! over the raw JSON body (present only when the app has a webhook secret),
//! 4xx responses abort immediately, 5xx/timeout retry with
//! `1.0 * 2^(attempt-1)` second backoff, no jitter.

use hmac::{Hmac, Mac};
use log::{info, warn};
use serde::Serialize;
use sha2::Sha256;
use uuid::Uuid;

use crate::models::CanonicalMessage;
use crate::repo::WebhookLogRepo;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_HEADER: &str = "x-nylas-signature";

#[derive(Debug, Serialize)]
struct WebhookEnvelope<'a> {
    specversion: &'static str,
    #[serde(rename = "type")]
    event_type: &'static str,
    source: &'static str,
    id: Uuid,
    time: i64,
    webhook_delivery_attempt: u32,
    data: WebhookData<'a>,
}

#[derive(Debug, Serialize)]
struct WebhookData<'a> {
    application_id: i64,
    object: &'a CanonicalMessage,
}

pub struct WebhookDispatcher {
    http: reqwest::Client,
    max_retries: u32,
}

impl WebhookDispatcher {
    /// `max_retries` is `settings.webhook_max_retries` (spec §6
    /// `WEBHOOK_MAX_RETRIES`, default 3).
    pub fn new(http: reqwest::Client, max_retries: u32) -> Self {
        Self { http, max_retries }
    }

    /// Signs `body` with `secret` if present; an app with no configured
    /// webhook secret gets no signature header at all (matching the
    /// original's "empty signature -> no header" behavior).
    fn sign(secret: Option<&str>, body: &str) -> Option<String> {
        let secret = secret.filter(|s| !s.is_empty())?;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
        mac.update(body.as_bytes());
        Some(hex::encode(mac.finalize().into_bytes()))
    }

    /// Attempts delivery up to `self.max_retries` times, persisting one
    /// [`crate::models::WebhookLog`] row per attempt via `repo` (spec §8
    /// scenario E: a 500-then-500-then-200 sequence writes three rows).
    /// Returns `true` if a 2xx response was received.
    pub async fn deliver(
        &self,
        repo: &dyn WebhookLogRepo,
        app_id: i64,
        account_id: i64,
        folder: &str,
        uid: u32,
        webhook_url: &str,
        webhook_secret: Option<&str>,
        message: &CanonicalMessage,
    ) -> bool {
        for attempt in 1..=self.max_retries {
            let envelope = WebhookEnvelope {
                specversion: "1.0",
                event_type: "message.created",
                source: "imap",
                id: Uuid::new_v4(),
                time: chrono::Utc::now().timestamp(),
                webhook_delivery_attempt: attempt,
                data: WebhookData {
                    application_id: app_id,
                    object: message,
                },
            };

            let body = match serde_json::to_string(&envelope) {
                Ok(b) => b,
                Err(e) => {
                    warn!("failed to serialize webhook envelope: {e}");
                    return false;
                }
            };

            let mut request = self
                .http
                .post(webhook_url)
                .header("content-type", "application/json");
            if let Some(sig) = Self::sign(webhook_secret, &body) {
                request = request.header(SIGNATURE_HEADER, sig);
            }

            let result = request.body(body).send().await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    let response_text = response.text().await.unwrap_or_default();
                    let status_code = Some(status.as_u16());
                    let response_body = Some(truncate(&response_text, 2000));

                    if status.is_success() {
                        persist(repo, app_id, account_id, folder, uid, webhook_url, status_code, response_body, attempt, true).await;
                        return true;
                    }
                    persist(repo, app_id, account_id, folder, uid, webhook_url, status_code, response_body, attempt, false).await;
                    if status.is_client_error() {
                        info!("webhook to {webhook_url} rejected with {status}, not retrying");
                        return false;
                    }
                    warn!("webhook to {webhook_url} failed with {status}, attempt {attempt}/{}", self.max_retries);
                }
                Err(e) => {
                    let response_body = Some(truncate(&e.to_string(), 2000));
                    persist(repo, app_id, account_id, folder, uid, webhook_url, None, response_body, attempt, false).await;
                    warn!("webhook to {webhook_url} errored: {e}, attempt {attempt}/{}", self.max_retries);
                }
            }

            if attempt < self.max_retries {
                let delay_secs = 1.0_f64 * 2f64.powi(attempt as i32 - 1);
                tokio::time::sleep(std::time::Duration::from_secs_f64(delay_secs)).await;
            }
        }

        false
    }
}

#[allow(clippy::too_many_arguments)]
async fn persist(
    repo: &dyn WebhookLogRepo,
    app_id: i64,
    account_id: i64,
    folder: &str,
    uid: u32,
    webhook_url: &str,
    status_code: Option<u16>,
    response_body: Option<String>,
    attempts: u32,
    delivered: bool,
) {
    if let Err(e) = repo
        .persist(
            Uuid::new_v4(),
            app_id,
            account_id,
            folder,
            uid,
            webhook_url,
            status_code,
            response_body.as_deref(),
            attempts,
            delivered,
        )
        .await
    {
        warn!("failed to persist webhook log for account {account_id} uid {uid}: {e}");
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
