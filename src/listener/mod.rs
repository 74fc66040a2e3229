//! Per-(account, folder) listener supervisor (spec §4.7), grounded on
//! `app/controllers/imap/listener.py`'s `IMAPListener`.
//!
//! One task per watched folder polls for new UIDs in strict ascending order,
//! translates and dispatches each one, and advances the UID watermark only
//! after a successful webhook attempt — so a crash between delivery and
//! watermark-advance causes at most a duplicate delivery, never a skip
//! (spec §8 invariant 2). A folder is retired (its task exits, not to be
//! restarted) after [`MAX_CONSECUTIVE_FAILURES`] consecutive connection
//! failures, mirroring the original's per-folder give-up threshold.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::task::JoinHandle;

use crate::connection_manager::ConnectionManager;
use crate::models::Account;
use crate::repo::{ConnectionHealthRepo, EmailRepo, UidTrackingRepo, WebhookLogRepo};
use crate::translator;
use crate::webhook::WebhookDispatcher;

const MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// Granularity of the cooperative sleeps below — both the normal poll
/// interval and the error backoff are slept in slices this short so `stop`
/// is checked often enough that shutdown never blocks past spec §5's 30s
/// supervisor drain budget.
const POLL_SLEEP_SLICE: Duration = Duration::from_millis(500);
const BACKOFF_SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Shared dependencies injected into every per-folder listener task. Grouped
/// into one struct (rather than threaded individually) since every task
/// needs the same set — narrow-trait-object fields, not a god object.
pub struct ListenerDeps {
    pub connection_manager: Arc<ConnectionManager>,
    pub uid_tracking: Arc<dyn UidTrackingRepo>,
    pub connection_health: Arc<dyn ConnectionHealthRepo>,
    pub email_repo: Arc<dyn EmailRepo>,
    pub webhook_log: Arc<dyn WebhookLogRepo>,
    pub dispatcher: Arc<WebhookDispatcher>,
    /// `IMAP_POLL_INTERVAL` (spec §4.7(a), default 60s).
    pub poll_interval: Duration,
    /// `IMAP_POLL_JITTER` (spec §4.7(a), default 30s) — the upper bound of
    /// the uniform startup jitter, itself further capped at half the poll
    /// interval.
    pub poll_jitter: Duration,
}

/// Sleeps `total`, in `slice`-sized increments, returning early (before the
/// full duration has elapsed) as soon as `stop` is set.
async fn sleep_cooperatively(total: Duration, slice: Duration, stop: &AtomicBool) {
    let mut remaining = total;
    while remaining > Duration::ZERO {
        if stop.load(Ordering::SeqCst) {
            return;
        }
        let chunk = remaining.min(slice);
        tokio::time::sleep(chunk).await;
        remaining -= chunk;
    }
}

struct FolderTask {
    handle: JoinHandle<()>,
    stop: Arc<AtomicBool>,
}

/// Owns the set of live per-(account, folder) tasks and lets callers start
/// or stop coverage for an account as it's authorized or deauthorized.
pub struct ListenerSupervisor {
    deps: Arc<ListenerDeps>,
    tasks: tokio::sync::Mutex<HashMap<String, FolderTask>>,
}

impl ListenerSupervisor {
    pub fn new(deps: Arc<ListenerDeps>) -> Arc<Self> {
        Arc::new(Self {
            deps,
            tasks: tokio::sync::Mutex::new(HashMap::new()),
        })
    }

    fn task_key(account_id: i64, folder: &str) -> String {
        format!("{account_id}:{folder}")
    }

    /// Spawns one listener task per folder. Already-running (account, folder)
    /// pairs are left untouched.
    pub async fn start_account(
        self: &Arc<Self>,
        account: Account,
        app_id: i64,
        webhook_url: String,
        webhook_secret: Option<String>,
        folders: Vec<String>,
    ) {
        let mut tasks = self.tasks.lock().await;
        for folder in folders {
            let key = Self::task_key(account.id, &folder);
            if tasks.contains_key(&key) {
                continue;
            }

            let stop = Arc::new(AtomicBool::new(false));
            let supervisor = Arc::clone(self);
            let account = account.clone();
            let webhook_url = webhook_url.clone();
            let webhook_secret = webhook_secret.clone();
            let stop_clone = Arc::clone(&stop);
            let folder_clone = folder.clone();

            let handle = tokio::spawn(async move {
                supervisor
                    .run_folder(account, app_id, webhook_url, webhook_secret, folder_clone, stop_clone)
                    .await;
            });

            tasks.insert(key, FolderTask { handle, stop });
        }
    }

    /// Cooperatively stops every task for `account_id` and waits for them to exit.
    pub async fn stop_account(&self, account_id: i64) {
        let mut tasks = self.tasks.lock().await;
        let keys: Vec<String> = tasks
            .keys()
            .filter(|k| k.starts_with(&format!("{account_id}:")))
            .cloned()
            .collect();
        for key in keys {
            if let Some(task) = tasks.remove(&key) {
                task.stop.store(true, Ordering::SeqCst);
                let _ = task.handle.await;
            }
        }
    }

    async fn run_folder(
        self: Arc<Self>,
        account: Account,
        app_id: i64,
        webhook_url: String,
        webhook_secret: Option<String>,
        folder: String,
        stop: Arc<AtomicBool>,
    ) {
        let mut consecutive_failures = 0u32;

        // Spec §4.7(a).1: spread concurrent supervisor startups out over a
        // uniform random jitter instead of all polling in lockstep.
        let jitter_cap = self.deps.poll_jitter.min(self.deps.poll_interval / 2);
        if jitter_cap > Duration::ZERO {
            let jitter = Duration::from_secs_f64(rand::random::<f64>() * jitter_cap.as_secs_f64());
            sleep_cooperatively(jitter, POLL_SLEEP_SLICE, &stop).await;
        }

        loop {
            if stop.load(Ordering::SeqCst) {
                info!("listener for account {} folder {folder} stopping on request", account.id);
                return;
            }

            match self.poll_once(&account, app_id, &webhook_url, webhook_secret.as_deref(), &folder).await {
                Ok(()) => {
                    consecutive_failures = 0;
                    let _ = self.deps.connection_health.record_success(account.id, &folder).await;
                }
                Err(e) => {
                    consecutive_failures += 1;
                    warn!(
                        "listener poll failed for account {} folder {folder} ({consecutive_failures}/{MAX_CONSECUTIVE_FAILURES}): {e}",
                        account.id
                    );
                    let _ = self
                        .deps
                        .connection_health
                        .record_failure(account.id, &folder, &e.to_string())
                        .await;

                    if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                        warn!(
                            "retiring listener for account {} folder {folder} after {MAX_CONSECUTIVE_FAILURES} consecutive failures",
                            account.id
                        );
                        return;
                    }

                    let backoff = Duration::from_secs((10u64 * consecutive_failures as u64).min(120));
                    sleep_cooperatively(backoff, BACKOFF_SLEEP_SLICE, &stop).await;
                    continue;
                }
            }

            sleep_cooperatively(self.deps.poll_interval, POLL_SLEEP_SLICE, &stop).await;
        }
    }

    async fn poll_once(
        &self,
        account: &Account,
        app_id: i64,
        webhook_url: &str,
        webhook_secret: Option<&str>,
        folder: &str,
    ) -> Result<(), crate::connection_manager::ConnectionManagerError> {
        let mut handle = self.deps.connection_manager.acquire(account.id).await?;

        let result = self.process_new_messages(account, app_id, webhook_url, webhook_secret, folder, handle.client()).await;
        if result.is_err() {
            handle.poison();
        }
        result.map_err(|e| crate::connection_manager::ConnectionManagerError::ConnectionFailed(e.to_string()))
    }

    async fn process_new_messages(
        &self,
        account: &Account,
        app_id: i64,
        webhook_url: &str,
        webhook_secret: Option<&str>,
        folder: &str,
        client: &crate::imap::ImapClient<crate::imap::session::AsyncImapSessionWrapper>,
    ) -> Result<(), crate::imap::ImapError> {
        client.select_folder(folder).await?;

        let last_seen = self
            .deps
            .uid_tracking
            .get_last_seen_uid(account.id, folder)
            .await
            .unwrap_or(0);

        let mut uids = client
            .search_emails(&format!("UID {}:*", last_seen + 1))
            .await?;
        uids.retain(|&uid| uid > last_seen);
        uids.sort_unstable();

        if uids.is_empty() {
            return Ok(());
        }

        let emails = client.fetch_emails(&uids).await?;
        let mut emails_by_uid: HashMap<u32, crate::imap::types::Email> =
            emails.into_iter().map(|e| (e.uid, e)).collect();

        for uid in uids {
            let Some(email) = emails_by_uid.remove(&uid) else {
                warn!("account {} folder {folder}: UID {uid} was searched but not fetched", account.id);
                continue;
            };

            let message = translator::to_canonical(&email, &account.grant_id().to_string(), folder);
            let message_id = message.id.clone();
            let thread_id = message.thread_id.clone();

            let already_seen = self
                .deps
                .email_repo
                .get_by_account_and_uid_or_message_id(account.id, folder, uid, &message_id)
                .await
                .ok()
                .flatten()
                .is_some();

            if !already_seen {
                self.deps
                    .dispatcher
                    .deliver(
                        self.deps.webhook_log.as_ref(),
                        app_id,
                        account.id,
                        folder,
                        uid,
                        webhook_url,
                        webhook_secret,
                        &message,
                    )
                    .await;
            }

            // Reconcile the index row even when the webhook was suppressed as
            // a self-send: its folder/UID still needs to reflect where the
            // message now actually lives (spec §4.7 cache upsert, §8 invariant 3).
            if let Err(e) = self
                .deps
                .email_repo
                .upsert(account.id, &message_id, &thread_id, folder, uid)
                .await
            {
                warn!("failed to index email {message_id} for account {}: {e}", account.id);
            }

            // Advance the watermark only after the delivery attempt above, so a
            // crash before this point causes a re-delivery next poll rather than
            // a silently skipped message.
            if let Err(e) = self.deps.uid_tracking.advance(account.id, folder, uid).await {
                warn!("failed to advance UID watermark for account {} folder {folder}: {e}", account.id);
            }
        }

        Ok(())
    }
}
