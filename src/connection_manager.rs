//! Per-account IMAP connection lifecycle management (spec §4.2).
//!
//! Generalizes `connection_pool.rs`'s `ConnectionPool`/`SessionHandle`/
//! `ConnectionFactory` pattern from "N interchangeable connections to one
//! mailbox" to "at most one live connection per tenant account, created
//! lazily and shared across the listener supervisor, message controller, and
//! SMTP sender for that account." A connection that errors is poisoned
//! rather than returned, per spec §9's always-close-on-error decision —
//! there is no connection-level health scoring to salvage, only reconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::{Mutex as TokioMutex, Semaphore};

use crate::imap::{AsyncImapSessionWrapper, ImapClient, ImapError};
use crate::ratelimit::HostRateLimiter;

#[derive(Debug, Error, Clone)]
pub enum ConnectionManagerError {
    #[error("connection pool exhausted")]
    Exhausted,
    #[error("failed to connect: {0}")]
    ConnectionFailed(String),
    #[error("manager is shutting down")]
    ShuttingDown,
}

impl From<ImapError> for ConnectionManagerError {
    fn from(e: ImapError) -> Self {
        ConnectionManagerError::ConnectionFailed(e.to_string())
    }
}

/// Per-account IMAP connection parameters, sourced from an `Account`'s
/// decrypted credentials.
#[derive(Clone)]
pub struct AccountEndpoint {
    pub account_id: i64,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn create(
        &self,
        endpoint: &AccountEndpoint,
    ) -> Result<Arc<ImapClient<AsyncImapSessionWrapper>>, ImapError>;
}

pub struct ImapConnectionFactory;

#[async_trait]
impl ConnectionFactory for ImapConnectionFactory {
    async fn create(
        &self,
        endpoint: &AccountEndpoint,
    ) -> Result<Arc<ImapClient<AsyncImapSessionWrapper>>, ImapError> {
        let client = ImapClient::<AsyncImapSessionWrapper>::connect(
            &endpoint.host,
            endpoint.port,
            &endpoint.username,
            &endpoint.password,
        )
        .await?;
        Ok(Arc::new(client))
    }
}

struct Slot {
    client: Option<Arc<ImapClient<AsyncImapSessionWrapper>>>,
    last_used: Instant,
}

/// A checked-out connection. Call [`SessionHandle::poison`] before dropping
/// if the operation that used it failed — that discards the cached client so
/// the next `acquire` for this account reconnects from scratch, rather than
/// risking a half-broken IMAP session being handed out again.
pub struct SessionHandle {
    account_id: i64,
    client: Arc<ImapClient<AsyncImapSessionWrapper>>,
    manager: Arc<ConnectionManager>,
    poisoned: bool,
}

impl SessionHandle {
    pub fn client(&self) -> &Arc<ImapClient<AsyncImapSessionWrapper>> {
        &self.client
    }

    pub fn poison(&mut self) {
        self.poisoned = true;
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        let manager = Arc::clone(&self.manager);
        let account_id = self.account_id;
        let poisoned = self.poisoned;
        let client = self.client.clone();
        tokio::spawn(async move {
            manager.release(account_id, client, poisoned).await;
        });
    }
}

pub struct ConnectionManager {
    slots: DashMap<i64, Arc<TokioMutex<Slot>>>,
    endpoints: DashMap<i64, AccountEndpoint>,
    factory: Arc<dyn ConnectionFactory>,
    host_limiter: Arc<HostRateLimiter>,
    semaphore: Arc<Semaphore>,
    idle_timeout: Duration,
}

impl ConnectionManager {
    pub fn new(factory: Arc<dyn ConnectionFactory>, host_limiter: Arc<HostRateLimiter>, max_connections: usize) -> Arc<Self> {
        Arc::new(Self {
            slots: DashMap::new(),
            endpoints: DashMap::new(),
            factory,
            host_limiter,
            semaphore: Arc::new(Semaphore::new(max_connections)),
            idle_timeout: Duration::from_secs(300),
        })
    }

    pub fn register_endpoint(&self, endpoint: AccountEndpoint) {
        self.endpoints.insert(endpoint.account_id, endpoint);
    }

    pub fn forget_endpoint(&self, account_id: i64) {
        self.endpoints.remove(&account_id);
        self.slots.remove(&account_id);
    }

    /// Acquires the (possibly freshly-connected) IMAP session for `account_id`.
    pub async fn acquire(
        self: &Arc<Self>,
        account_id: i64,
    ) -> Result<SessionHandle, ConnectionManagerError> {
        let endpoint = self
            .endpoints
            .get(&account_id)
            .map(|e| e.clone())
            .ok_or_else(|| ConnectionManagerError::ConnectionFailed("unknown account".into()))?;

        let slot = self
            .slots
            .entry(account_id)
            .or_insert_with(|| {
                Arc::new(TokioMutex::new(Slot {
                    client: None,
                    last_used: Instant::now(),
                }))
            })
            .clone();

        let mut guard = slot.lock().await;

        if let Some(client) = &guard.client {
            if guard.last_used.elapsed() < self.idle_timeout {
                let client = client.clone();
                guard.last_used = Instant::now();
                return Ok(SessionHandle {
                    account_id,
                    client,
                    manager: Arc::clone(self),
                    poisoned: false,
                });
            }
            debug!("idle connection for account {account_id} expired, reconnecting");
            guard.client = None;
        }

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| ConnectionManagerError::ShuttingDown)?;

        self.host_limiter.acquire(&endpoint.host).await;

        let client = self.factory.create(&endpoint).await.map_err(|e| {
            warn!("failed to connect account {account_id} to {}: {e}", endpoint.host);
            ConnectionManagerError::from(e)
        })?;

        guard.client = Some(client.clone());
        guard.last_used = Instant::now();
        info!("established IMAP connection for account {account_id}");

        Ok(SessionHandle {
            account_id,
            client,
            manager: Arc::clone(self),
            poisoned: false,
        })
    }

    async fn release(
        &self,
        account_id: i64,
        client: Arc<ImapClient<AsyncImapSessionWrapper>>,
        poisoned: bool,
    ) {
        if !poisoned {
            return;
        }
        if let Some(slot) = self.slots.get(&account_id) {
            let mut guard = slot.lock().await;
            if let Some(current) = &guard.client {
                if Arc::ptr_eq(current, &client) {
                    guard.client = None;
                    debug!("poisoned connection for account {account_id} discarded");
                }
            }
        }

        // Spec §4.2: a poisoned handle still gets a best-effort LOGOUT, bounded
        // by a hard 5s timeout. Whether it completes, errors, or times out, the
        // socket goes away when `client` is dropped at the end of this
        // function — a timed-out LOGOUT forces the underlying stream closed
        // rather than leaving it lingering half-open.
        match tokio::time::timeout(Duration::from_secs(5), client.logout()).await {
            Ok(Ok(())) => debug!("logged out poisoned connection for account {account_id}"),
            Ok(Err(e)) => debug!("logout errored for poisoned connection on account {account_id}: {e}"),
            Err(_) => warn!("logout timed out after 5s for account {account_id}, forcing socket closed"),
        }
    }
}
