// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use dotenvy::dotenv;
use log::{error, info, warn};
use sqlx::sqlite::SqlitePoolOptions;

use mailbridge::api::v3::{self, V3State};
use mailbridge::config::Settings;
use mailbridge::connection_manager::{AccountEndpoint, ConnectionManager, ImapConnectionFactory};
use mailbridge::credentials::CredentialCipher;
use mailbridge::listener::{ListenerDeps, ListenerSupervisor};
use mailbridge::message_controller::MessageController;
use mailbridge::ratelimit::HostRateLimiter;
use mailbridge::repo::sqlite::SqliteRepos;
use mailbridge::repo::AppRepo;
use mailbridge::smtp_sender::SmtpSender;
use mailbridge::webhook::WebhookDispatcher;

// jemalloc releases memory back to the OS more readily than the system
// allocator, which matters here since long-lived IMAP sessions churn through
// large MIME buffers.
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let settings = Settings::load().map_err(|e| {
        error!("failed to load configuration: {e}");
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;

    let pool = SqlitePoolOptions::new()
        .min_connections(settings.database_min_pool_size)
        .max_connections(settings.database_max_pool_size)
        .connect(&format!("sqlite://{}?mode=rwc", settings.database_host))
        .await
        .map_err(|e| {
            error!("failed to open database '{}': {e}", settings.database_host);
            std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
        })?;

    let repos = SqliteRepos::new(pool);
    repos.migrate().await.map_err(|e| {
        error!("failed to run migrations: {e}");
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;
    let repos = Arc::new(repos);

    let cipher = Arc::new(
        CredentialCipher::from_hex_key(&settings.password_encryption_key).map_err(|e| {
            error!("invalid PASSWORD_ENCRYPTION_KEY: {e}");
            std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
        })?,
    );

    let host_limiter = Arc::new(HostRateLimiter::new());
    let connection_manager = ConnectionManager::new(
        Arc::new(ImapConnectionFactory),
        host_limiter,
        settings.workers_num * settings.worker_max_connections_per_provider,
    );

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.webhook_timeout))
        .build()
        .expect("reqwest client builds with a fixed timeout");
    let dispatcher = Arc::new(WebhookDispatcher::new(http_client, settings.webhook_max_retries));

    let listener_deps = Arc::new(ListenerDeps {
        connection_manager: connection_manager.clone(),
        uid_tracking: repos.clone(),
        connection_health: repos.clone(),
        email_repo: repos.clone(),
        webhook_log: repos.clone(),
        dispatcher,
        poll_interval: Duration::from_secs(settings.imap_poll_interval),
        poll_jitter: Duration::from_secs(settings.imap_poll_jitter),
    });
    let supervisor = ListenerSupervisor::new(listener_deps);

    let message_controller = Arc::new(MessageController::new(connection_manager.clone(), repos.clone()));
    let smtp_sender = Arc::new(SmtpSender::new());

    restart_active_accounts(&repos, &connection_manager, &supervisor, &cipher).await;

    let state = web::Data::new(V3State {
        app_repo: repos.clone(),
        account_repo: repos.clone(),
        authorization_repo: repos.clone(),
        uid_tracking_repo: repos.clone(),
        cipher,
        connection_manager,
        message_controller,
        smtp_sender,
    });

    info!("mailbridge listening on {}:{}", settings.bind_host, settings.bind_port);
    let bind_host = settings.bind_host.clone();
    let bind_port = settings.bind_port;

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Cors::permissive())
            .configure(v3::configure)
    })
    .bind((bind_host.as_str(), bind_port))?
    .run()
    .await
}

/// Registers every currently-active account's endpoint with the connection
/// manager and starts its per-folder listener coverage, the startup-time
/// counterpart to `start_account` being called again on re-authorization.
async fn restart_active_accounts(
    repos: &Arc<SqliteRepos>,
    connection_manager: &Arc<ConnectionManager>,
    supervisor: &Arc<ListenerSupervisor>,
    cipher: &Arc<CredentialCipher>,
) {
    use mailbridge::repo::AccountRepo;

    let accounts = match repos.get_all_active().await {
        Ok(accounts) => accounts,
        Err(e) => {
            warn!("failed to load active accounts at startup: {e}");
            return;
        }
    };

    for account in accounts {
        let app = match AppRepo::get_by_id(repos.as_ref(), account.app_id).await {
            Ok(Some(app)) => app,
            Ok(None) => {
                warn!("account {} references unknown app {}, skipping", account.id, account.app_id);
                continue;
            }
            Err(e) => {
                warn!("failed to load app {} for account {}: {e}", account.app_id, account.id);
                continue;
            }
        };
        let Some(webhook_url) = app.webhook_url.clone() else {
            warn!("app {} has no webhook_url configured, skipping account {}", app.id, account.id);
            continue;
        };

        let password = match cipher.decrypt(&account.credentials) {
            Ok(password) => password,
            Err(e) => {
                warn!("failed to decrypt credentials for account {}: {e}", account.id);
                continue;
            }
        };

        connection_manager.register_endpoint(AccountEndpoint {
            account_id: account.id,
            host: account.imap_host.clone(),
            port: account.imap_port,
            username: account.email.clone(),
            password,
        });

        let folders = match connection_manager.acquire(account.id).await {
            Ok(mut handle) => {
                let folders = mailbridge::folders::discover_watched_folders(handle.client()).await;
                handle.poison();
                folders
            }
            Err(e) => {
                warn!("could not connect account {} at startup, deferring folder discovery: {e}", account.id);
                vec!["INBOX".to_string()]
            }
        };

        supervisor
            .start_account(account.clone(), app.id, webhook_url, app.webhook_secret.clone(), folders)
            .await;
    }
}
