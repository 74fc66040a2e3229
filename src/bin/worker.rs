//! Account worker / cluster manager binary (spec §4.8).
//!
//! Each worker process owns a fixed, contiguous slice of the active-account
//! set — sharded by `WORKER_INDEX`/`WORKER_COUNT`, with the last worker
//! absorbing any remainder — and starts one listener supervisor task per
//! (account, folder) for its slice. Workers share no in-memory state; the
//! only cross-worker coordination is the shared connection manager's
//! semaphore/rate limiter and the database.
//!
//! Grounded on `rustymail::dashboard::services::sync::SyncService`'s
//! per-account sweep loop, generalized here into a dedicated process per
//! shard rather than one sweep inside the HTTP server process.

use std::sync::Arc;
use std::time::Duration;

use dotenvy::dotenv;
use log::{error, info, warn};
use sqlx::sqlite::SqlitePoolOptions;

use mailbridge::config::Settings;
use mailbridge::connection_manager::{AccountEndpoint, ConnectionManager, ImapConnectionFactory};
use mailbridge::credentials::CredentialCipher;
use mailbridge::listener::{ListenerDeps, ListenerSupervisor};
use mailbridge::ratelimit::HostRateLimiter;
use mailbridge::repo::sqlite::SqliteRepos;
use mailbridge::repo::{AccountRepo, AppRepo};
use mailbridge::webhook::WebhookDispatcher;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let settings = Settings::load().map_err(|e| {
        error!("failed to load configuration: {e}");
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;

    let worker_index: usize = std::env::var("WORKER_INDEX")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let worker_count = settings.workers_num.max(1);

    let pool = SqlitePoolOptions::new()
        .min_connections(settings.database_min_pool_size)
        .max_connections(settings.database_max_pool_size)
        .connect(&format!("sqlite://{}?mode=rwc", settings.database_host))
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    let repos = Arc::new(SqliteRepos::new(pool));

    let cipher = CredentialCipher::from_hex_key(&settings.password_encryption_key)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    let host_limiter = Arc::new(HostRateLimiter::new());
    let connection_manager = ConnectionManager::new(
        Arc::new(ImapConnectionFactory),
        host_limiter,
        settings.worker_max_connections_per_provider,
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

    let all_accounts = repos.get_all_active().await.map_err(|e| {
        error!("failed to load active accounts: {e}");
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;
    let shard = shard_for_worker(all_accounts.len(), worker_count, worker_index);
    info!(
        "worker {worker_index}/{worker_count} owns accounts [{}, {})",
        shard.start, shard.end
    );

    let mut owned_ids = Vec::new();
    for account in &all_accounts[shard] {
        let app = match AppRepo::get_by_id(repos.as_ref(), account.app_id).await {
            Ok(Some(app)) => app,
            Ok(None) => {
                warn!("account {} references unknown app, skipping", account.id);
                continue;
            }
            Err(e) => {
                warn!("failed to load app for account {}: {e}", account.id);
                continue;
            }
        };
        let Some(webhook_url) = app.webhook_url.clone() else {
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
                warn!("could not connect account {} at startup: {e}", account.id);
                vec!["INBOX".to_string()]
            }
        };

        owned_ids.push(account.id);
        supervisor
            .start_account(account.clone(), app.id, webhook_url, app.webhook_secret.clone(), folders)
            .await;
    }

    tokio::signal::ctrl_c().await.ok();
    info!("worker {worker_index} received shutdown signal, draining supervisors");

    let drain = async {
        for account_id in &owned_ids {
            supervisor.stop_account(*account_id).await;
        }
    };
    if tokio::time::timeout(Duration::from_secs(30), drain).await.is_err() {
        warn!("worker {worker_index} drain exceeded 30s, force-exiting");
    }

    // Connection manager has no open sockets of its own to close explicitly —
    // every per-account session was already poisoned or returned by its
    // supervisor; dropping `connection_manager` here releases the slots map.
    drop(connection_manager);
    info!("worker {worker_index} shut down");
    Ok(())
}

/// Contiguous `[start, end)` slice of `total` accounts owned by `index` of
/// `worker_count` workers; the last worker absorbs any remainder.
fn shard_for_worker(total: usize, worker_count: usize, index: usize) -> std::ops::Range<usize> {
    if index >= worker_count {
        return total..total;
    }
    let base = total / worker_count;
    let remainder = total % worker_count;
    let start = index * base + index.min(remainder);
    let extra = if index < remainder { 1 } else { 0 };
    let end = (start + base + extra).min(total);
    start..end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shards_are_contiguous_and_cover_the_whole_range() {
        let shards: Vec<_> = (0..3).map(|i| shard_for_worker(10, 3, i)).collect();
        assert_eq!(shards[0], 0..4);
        assert_eq!(shards[1], 4..7);
        assert_eq!(shards[2], 7..10);
    }

    #[test]
    fn last_worker_absorbs_remainder_with_even_split() {
        let shards: Vec<_> = (0..2).map(|i| shard_for_worker(4, 2, i)).collect();
        assert_eq!(shards[0], 0..2);
        assert_eq!(shards[1], 2..4);
    }

    #[test]
    fn out_of_range_index_gets_empty_shard() {
        assert_eq!(shard_for_worker(10, 3, 5), 10..10);
    }
}
