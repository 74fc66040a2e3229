//! Thin HTTP surface for the endpoints named in spec §6, adapted from the
//! teacher's `api::rest`/`api::errors` conventions but scoped to the
//! multi-tenant App/Account model instead of the teacher's single-mailbox one.
//!
//! CORS and the bearer/`X-Api-Key` lookup are grounded on `api::auth`'s
//! header-parsing convention, trimmed to resolving an [`App`] by API key
//! rather than the teacher's per-key-scopes model (spec §3's `App` has no
//! scopes, just a webhook URL/secret).

use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::authorization::{
    AuthorizationController, AuthorizationError, AuthorizationSubmission, TokenExchange,
};
use crate::connection_manager::ConnectionManager;
use crate::credentials::CredentialCipher;
use crate::message_controller::{MessageController, MessageControllerError};
use crate::models::{Account, AccountStatus, App};
use crate::repo::{AccountRepo, AppRepo, AuthorizationRepo, RepoError, UidTrackingRepo};
use crate::smtp_sender::{OutgoingAttachment, OutgoingMessage, ReplyContext, SmtpSender};

#[derive(Debug, Error)]
pub enum V3Error {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("Authentication required")]
    Unauthorized,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Provider(String),
    #[error("{0}")]
    Internal(String),
}

impl From<RepoError> for V3Error {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => V3Error::NotFound("resource not found".into()),
            other => V3Error::Internal(other.to_string()),
        }
    }
}

impl From<AuthorizationError> for V3Error {
    fn from(e: AuthorizationError) -> Self {
        match &e {
            AuthorizationError::UnknownApp => V3Error::Unauthorized,
            AuthorizationError::CodeNotValid => V3Error::InvalidRequest(e.to_string()),
            AuthorizationError::InvalidRequest(_) => V3Error::InvalidRequest(e.to_string()),
            AuthorizationError::ImapLoginFailed(_) | AuthorizationError::SmtpLoginFailed(_) => {
                V3Error::Provider(e.to_string())
            }
            _ => V3Error::Internal(e.to_string()),
        }
    }
}

impl From<MessageControllerError> for V3Error {
    fn from(e: MessageControllerError) -> Self {
        match e {
            MessageControllerError::NotFound => V3Error::NotFound("message not found".into()),
            other => V3Error::Provider(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    error_type: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider_error: Option<String>,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    request_id: Uuid,
    error: ErrorBody,
}

impl actix_web::ResponseError for V3Error {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            V3Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            V3Error::Unauthorized => StatusCode::UNAUTHORIZED,
            V3Error::NotFound(_) => StatusCode::NOT_FOUND,
            V3Error::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
            V3Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_type = match self {
            V3Error::InvalidRequest(_) => "invalid_request_error",
            V3Error::Unauthorized => "invalid_request_error",
            V3Error::NotFound(_) => "not_found_error",
            V3Error::Provider(_) => "provider_error",
            V3Error::Internal(_) => "internal_error",
        };
        HttpResponse::build(self.status_code()).json(ErrorEnvelope {
            request_id: Uuid::new_v4(),
            error: ErrorBody {
                error_type,
                message: self.to_string(),
                provider_error: None,
            },
        })
    }
}

/// Shared state for the `/v3` handlers. Narrow-trait-object fields, same
/// constructor-injection style as [`crate::listener::ListenerDeps`].
pub struct V3State {
    pub app_repo: Arc<dyn AppRepo>,
    pub account_repo: Arc<dyn AccountRepo>,
    pub authorization_repo: Arc<dyn AuthorizationRepo>,
    pub uid_tracking_repo: Arc<dyn UidTrackingRepo>,
    pub cipher: Arc<CredentialCipher>,
    pub connection_manager: Arc<ConnectionManager>,
    pub message_controller: Arc<MessageController>,
    pub smtp_sender: Arc<SmtpSender>,
}

impl V3State {
    fn authorization_controller(&self) -> AuthorizationController {
        AuthorizationController::new(
            self.app_repo.clone(),
            self.account_repo.clone(),
            self.authorization_repo.clone(),
            self.cipher.clone(),
        )
    }

    async fn authenticate(&self, req: &HttpRequest) -> Result<App, V3Error> {
        let key = bearer_or_api_key(req).ok_or(V3Error::Unauthorized)?;
        self.app_repo
            .get_by_api_key(&key)
            .await?
            .ok_or(V3Error::Unauthorized)
    }

    async fn account_for_grant(&self, app: &App, grant_id: Uuid) -> Result<Account, V3Error> {
        let account = self
            .account_repo
            .get_by_uuid(grant_id)
            .await?
            .ok_or_else(|| V3Error::NotFound("unknown grant".into()))?;
        if account.app_id != app.id {
            return Err(V3Error::NotFound("unknown grant".into()));
        }
        Ok(account)
    }
}

fn bearer_or_api_key(req: &HttpRequest) -> Option<String> {
    if let Some(key) = req.headers().get("X-Api-Key").and_then(|h| h.to_str().ok()) {
        return Some(key.to_string());
    }
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.strip_prefix("Bearer ").unwrap_or(s).to_string())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/v3/connect/auth", web::post().to(connect_auth_form))
        .route("/v3/connect/process", web::post().to(connect_process))
        .route("/v3/connect/token", web::post().to(connect_token))
        .route("/v3/grants/{grant_id}", web::delete().to(delete_grant))
        .route("/v3/grants/{grant_id}/messages/{message_id}", web::get().to(get_message))
        .route("/v3/grants/{grant_id}/messages", web::get().to(list_messages))
        .route("/v3/grants/{grant_id}/messages/send", web::post().to(send_message))
        .route("/v3/grants/{grant_id}/attachments/{attachment_id}", web::get().to(get_attachment))
        .route(
            "/v3/grants/{grant_id}/attachments/{attachment_id}/download",
            web::get().to(download_attachment),
        )
        .route("/v3/grants/{grant_id}/folders/{folder_id}", web::get().to(get_folder));
}

async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

async fn connect_auth_form(form: web::Query<ConnectAuthQuery>) -> impl Responder {
    let html = format!(
        r#"<!doctype html><html><body>
<form method="post" action="/v3/connect/process">
  <input type="hidden" name="client_id" value="{client_id}">
  <input type="hidden" name="redirect_uri" value="{redirect_uri}">
  <input type="hidden" name="state" value="{state}">
  <input type="hidden" name="scope" value="{scope}">
  <label>Email <input name="email" type="email"></label>
  <label>Password <input name="password" type="password"></label>
  <button type="submit">Authorize</button>
</form>
</body></html>"#,
        client_id = html_escape(&form.client_id),
        redirect_uri = html_escape(&form.redirect_uri),
        state = html_escape(&form.state),
        scope = html_escape(form.scope.as_deref().unwrap_or("")),
    );
    HttpResponse::Ok().content_type("text/html").body(html)
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

#[derive(Deserialize)]
struct ConnectAuthQuery {
    client_id: String,
    redirect_uri: String,
    state: String,
    scope: Option<String>,
}

#[derive(Deserialize)]
struct ConnectProcessForm {
    client_id: String,
    redirect_uri: String,
    state: String,
    scope: Option<String>,
    email: String,
    password: String,
    imap_host: String,
    imap_port: u16,
    smtp_host: String,
    smtp_port: u16,
}

async fn connect_process(
    state: web::Data<V3State>,
    req: HttpRequest,
    form: web::Form<ConnectProcessForm>,
) -> Result<HttpResponse, V3Error> {
    let app = state.authenticate(&req).await?;
    let form = form.into_inner();

    let outcome = state
        .authorization_controller()
        .process(AuthorizationSubmission {
            app_id: app.id,
            client_id: form.client_id,
            redirect_uri: form.redirect_uri,
            state: form.state,
            scope: form.scope,
            email: form.email,
            password: form.password,
            imap_host: form.imap_host,
            imap_port: form.imap_port,
            smtp_host: form.smtp_host,
            smtp_port: form.smtp_port,
        })
        .await?;

    let location = format!(
        "{}?code={}&state={}&source=nolas",
        outcome.redirect_uri,
        urlencoding_encode(&outcome.authorization_code),
        urlencoding_encode(&outcome.state),
    );
    Ok(HttpResponse::Found().append_header(("Location", location)).finish())
}

fn urlencoding_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

#[derive(Deserialize)]
struct TokenExchangeBody {
    grant_type: String,
    code: String,
    redirect_uri: String,
    client_id: String,
}

#[derive(Serialize)]
struct TokenExchangeResponse {
    request_id: Uuid,
    grant_id: Uuid,
}

async fn connect_token(
    state: web::Data<V3State>,
    req: HttpRequest,
    body: web::Json<TokenExchangeBody>,
) -> Result<HttpResponse, V3Error> {
    let app = state.authenticate(&req).await?;
    if body.grant_type != "authorization_code" {
        return Err(V3Error::InvalidRequest("Unsupported grant_type".into()));
    }

    let result = state
        .authorization_controller()
        .exchange_token(TokenExchange {
            app_id: app.id,
            client_id: body.client_id.clone(),
            redirect_uri: body.redirect_uri.clone(),
            code: body.code.clone(),
        })
        .await?;

    Ok(HttpResponse::Ok().json(TokenExchangeResponse {
        request_id: result.request_id,
        grant_id: result.grant_id,
    }))
}

#[derive(Serialize)]
struct DeleteGrantResponse {
    request_id: Uuid,
    success: bool,
}

async fn delete_grant(
    state: web::Data<V3State>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, V3Error> {
    let app = state.authenticate(&req).await?;
    let account = state.account_for_grant(&app, path.into_inner()).await?;

    state.account_repo.set_status(account.id, AccountStatus::Inactive).await?;
    state.uid_tracking_repo.delete_all_for_account(account.id).await?;
    state.connection_manager.forget_endpoint(account.id);

    Ok(HttpResponse::Ok().json(DeleteGrantResponse { request_id: Uuid::new_v4(), success: true }))
}

async fn get_message(
    state: web::Data<V3State>,
    req: HttpRequest,
    path: web::Path<(Uuid, String)>,
) -> Result<HttpResponse, V3Error> {
    let app = state.authenticate(&req).await?;
    let (grant_id, message_id) = path.into_inner();
    let account = state.account_for_grant(&app, grant_id).await?;

    let (canonical, _raw, _uid) = state.message_controller.get_by_message_id(&account, &message_id).await?;
    Ok(HttpResponse::Ok().json(canonical))
}

#[derive(Deserialize)]
struct ListMessagesQuery {
    #[serde(default)]
    folder: Option<String>,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

fn default_limit() -> usize {
    25
}

async fn list_messages(
    state: web::Data<V3State>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    query: web::Query<ListMessagesQuery>,
) -> Result<HttpResponse, V3Error> {
    let app = state.authenticate(&req).await?;
    let account = state.account_for_grant(&app, path.into_inner()).await?;

    if query.limit == 0 || query.limit > 100 {
        return Err(V3Error::InvalidRequest("limit must be in [1, 100]".into()));
    }

    let folder = query.folder.clone().unwrap_or_else(|| "INBOX".to_string());
    let messages = state
        .message_controller
        .list_messages(&account, &folder, query.limit, query.offset)
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "request_id": Uuid::new_v4(), "data": messages })))
}

#[derive(Deserialize)]
struct SendMessageBody {
    to: Vec<String>,
    #[serde(default)]
    cc: Vec<String>,
    #[serde(default)]
    bcc: Vec<String>,
    subject: String,
    body: String,
    #[serde(default)]
    body_html: Option<String>,
    #[serde(default)]
    reply_to_message_id: Option<String>,
    #[serde(default)]
    attachments: Vec<SendAttachmentBody>,
}

#[derive(Deserialize)]
struct SendAttachmentBody {
    filename: String,
    content_type: String,
    content_base64: String,
}

/// Pulls the `References` message-ids out of a raw RFC-822 message, the way
/// `translator::extract_references` does for inbound messages — the replied
/// message's own References chain, so the outgoing `References` header
/// threads `<r1> <r2> ... <replied_id>` rather than just `<replied_id>`.
fn extract_references_header(raw: &[u8]) -> Vec<String> {
    let Some(message) = mail_parser::Message::parse(raw) else {
        return Vec::new();
    };
    message
        .references()
        .as_text()
        .map(|text| {
            text.split_whitespace()
                .filter(|tok| tok.starts_with('<') && tok.ends_with('>'))
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

async fn send_message(
    state: web::Data<V3State>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<SendMessageBody>,
) -> Result<HttpResponse, V3Error> {
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    let app = state.authenticate(&req).await?;
    let account = state.account_for_grant(&app, path.into_inner()).await?;
    let body = body.into_inner();

    let reply_to = match &body.reply_to_message_id {
        Some(id) => {
            let (canonical, raw, _uid) = state.message_controller.get_by_message_id(&account, id).await?;
            Some(ReplyContext {
                message_id: canonical.id.clone(),
                references: extract_references_header(&raw),
                thread_id: canonical.thread_id.clone(),
            })
        }
        None => None,
    };

    let mut attachments = Vec::with_capacity(body.attachments.len());
    for a in &body.attachments {
        let data = STANDARD
            .decode(&a.content_base64)
            .map_err(|e| V3Error::InvalidRequest(format!("invalid attachment base64: {e}")))?;
        attachments.push(OutgoingAttachment {
            filename: a.filename.clone(),
            content_type: a.content_type.clone(),
            data,
        });
    }

    let password = state
        .cipher
        .decrypt(&account.credentials)
        .map_err(|e| V3Error::Internal(e.to_string()))?;

    let outgoing = OutgoingMessage {
        to: body.to,
        cc: body.cc,
        bcc: body.bcc,
        subject: body.subject,
        body_text: body.body,
        body_html: body.body_html,
        attachments,
        reply_to,
    };

    let handle = state.connection_manager.acquire(account.id).await.ok();
    let client = handle.as_ref().map(|h| h.client().as_ref());
    let discovered = if let Some(c) = client {
        crate::folders::discover_watched_folders(c).await
    } else {
        Vec::new()
    };

    let result = state
        .smtp_sender
        .send(&account, &password, outgoing, client, &discovered)
        .await
        .map_err(|e| V3Error::Provider(e.to_string()))?;

    Ok(HttpResponse::Ok().json(result))
}

async fn get_attachment(
    state: web::Data<V3State>,
    req: HttpRequest,
    path: web::Path<(Uuid, String)>,
    query: web::Query<AttachmentQuery>,
) -> Result<HttpResponse, V3Error> {
    let app = state.authenticate(&req).await?;
    let (grant_id, attachment_id) = path.into_inner();
    let account = state.account_for_grant(&app, grant_id).await?;

    let (canonical, _raw, _uid) = state
        .message_controller
        .get_by_message_id(&account, &query.message_id)
        .await?;

    let attachment = canonical
        .attachments
        .into_iter()
        .find(|a| a.id == attachment_id)
        .ok_or_else(|| V3Error::NotFound("attachment not found".into()))?;

    Ok(HttpResponse::Ok().json(attachment))
}

async fn download_attachment(
    state: web::Data<V3State>,
    req: HttpRequest,
    path: web::Path<(Uuid, String)>,
    query: web::Query<AttachmentQuery>,
) -> Result<HttpResponse, V3Error> {
    let app = state.authenticate(&req).await?;
    let (grant_id, attachment_id) = path.into_inner();
    let account = state.account_for_grant(&app, grant_id).await?;

    let (canonical, raw, _uid) = state
        .message_controller
        .get_by_message_id(&account, &query.message_id)
        .await?;

    let meta = canonical
        .attachments
        .iter()
        .find(|a| a.id == attachment_id)
        .ok_or_else(|| V3Error::NotFound("attachment not found".into()))?;
    let index: usize = attachment_id
        .strip_prefix("att_")
        .and_then(|n| n.parse::<usize>().ok())
        .ok_or_else(|| V3Error::InvalidRequest("malformed attachment id".into()))?;

    let message = mail_parser::Message::parse(&raw)
        .ok_or_else(|| V3Error::Provider("failed to parse message for attachment extraction".into()))?;
    let part = message
        .attachment(index - 1)
        .ok_or_else(|| V3Error::NotFound("attachment not found".into()))?;

    Ok(HttpResponse::Ok()
        .content_type(meta.content_type.clone())
        .append_header(("Content-Disposition", format!("attachment; filename=\"{}\"", meta.filename)))
        .body(part.contents().to_vec()))
}

#[derive(Deserialize)]
struct AttachmentQuery {
    message_id: String,
}

#[derive(Serialize)]
struct FolderResponse {
    id: String,
    name: String,
}

async fn get_folder(
    state: web::Data<V3State>,
    req: HttpRequest,
    path: web::Path<(Uuid, String)>,
) -> Result<HttpResponse, V3Error> {
    let app = state.authenticate(&req).await?;
    let (grant_id, folder_id) = path.into_inner();
    let account = state.account_for_grant(&app, grant_id).await?;

    let handle = state
        .connection_manager
        .acquire(account.id)
        .await
        .map_err(|e| V3Error::Provider(e.to_string()))?;
    let folders = crate::folders::discover_watched_folders(handle.client()).await;

    if !folders.iter().any(|f| f == &folder_id) {
        return Err(V3Error::NotFound(format!("folder '{folder_id}' not found")));
    }

    Ok(HttpResponse::Ok().json(FolderResponse { id: folder_id.clone(), name: folder_id }))
}
