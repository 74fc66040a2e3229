//! On-demand message reader (spec §4.9), grounded on
//! `app/controllers/imap/message_controller.py`'s `MessageController`.
//!
//! Every lookup here closes its IMAP session rather than returning it to the
//! connection manager's cache — a deliberate anti-leak measure carried over
//! from the original (`ConnectionManager::acquire` followed unconditionally
//! by `handle.poison()`), since on-demand reads are not the hot path the
//! connection cache is sized for.

use thiserror::Error;

use crate::connection_manager::{ConnectionManager, ConnectionManagerError};
use crate::folders;
use crate::imap::ImapError;
use crate::models::{Account, CanonicalMessage};
use crate::repo::EmailRepo;
use crate::translator;

#[derive(Debug, Error)]
pub enum MessageControllerError {
    #[error("message not found")]
    NotFound,
    #[error(transparent)]
    Connection(#[from] ConnectionManagerError),
    #[error(transparent)]
    Imap(#[from] ImapError),
}

pub struct MessageController {
    connection_manager: std::sync::Arc<ConnectionManager>,
    email_repo: std::sync::Arc<dyn EmailRepo>,
}

impl MessageController {
    pub fn new(connection_manager: std::sync::Arc<ConnectionManager>, email_repo: std::sync::Arc<dyn EmailRepo>) -> Self {
        Self { connection_manager, email_repo }
    }

    /// URL-decodes `raw_id` and wraps it in angle brackets if it isn't
    /// already, matching the original's normalization before use in a
    /// `HEADER Message-ID "<...>"` search term.
    fn normalize_message_id(raw_id: &str) -> String {
        let decoded = percent_decode(raw_id);
        if decoded.starts_with('<') && decoded.ends_with('>') {
            decoded
        } else {
            format!("<{decoded}>")
        }
    }

    /// Fast path via the local index's folder/UID hint, falling back to a
    /// per-folder `HEADER Message-ID` search. Returns the canonical message,
    /// the raw RFC-822 bytes, and the UID it was found at.
    pub async fn get_by_message_id(
        &self,
        account: &Account,
        raw_message_id: &str,
    ) -> Result<(CanonicalMessage, Vec<u8>, u32), MessageControllerError> {
        let message_id = Self::normalize_message_id(raw_message_id);

        let hint = self
            .email_repo
            .get_by_account_and_message_id(account.id, &message_id)
            .await
            .ok()
            .flatten();

        let mut handle = self.connection_manager.acquire(account.id).await?;
        let client = handle.client().clone();

        let result = async {
            if let Some(hint) = hint.as_ref().and_then(|h| h.uid.map(|uid| (h.folder.clone(), uid))) {
                let (hint_folder, hint_uid) = hint;
                client.select_folder(&hint_folder).await?;
                if let Some(email) = client.fetch_emails(&[hint_uid]).await?.into_iter().next() {
                    if email.envelope.as_ref().and_then(|e| e.message_id.as_deref()) == Some(message_id.as_str()) {
                        let raw = client.fetch_raw_message(hint_uid).await?;
                        let canonical = translator::to_canonical(&email, &account.grant_id().to_string(), &hint_folder);
                        return Ok(Some((canonical, raw, hint_uid)));
                    }
                }
            }

            let folders = folders::discover_watched_folders(&client).await;
            let already_tried_folder = hint.as_ref().filter(|h| h.uid.is_some()).map(|h| h.folder.clone());

            for folder in folders {
                if Some(&folder) == already_tried_folder.as_ref() {
                    continue;
                }
                client.select_folder(&folder).await?;
                let search = format!("HEADER Message-ID \"{message_id}\"");
                let uids = client.search_emails(&search).await?;
                let Some(&uid) = uids.first() else { continue };

                if let Some(email) = client.fetch_emails(&[uid]).await?.into_iter().next() {
                    let raw = client.fetch_raw_message(uid).await?;
                    let canonical = translator::to_canonical(&email, &account.grant_id().to_string(), &folder);
                    return Ok(Some((canonical, raw, uid)));
                }
            }

            Ok(None)
        }
        .await;

        // Always close this session rather than caching it, per spec §4.9.
        handle.poison();
        drop(handle);

        match result {
            Ok(Some(found)) => Ok(found),
            Ok(None) => Err(MessageControllerError::NotFound),
            Err(e) => Err(e),
        }
    }

    /// `SEARCH ALL` on `folder`, sliced to `[offset, offset+limit)`, each
    /// fetched and translated in UID order.
    pub async fn list_messages(
        &self,
        account: &Account,
        folder: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CanonicalMessage>, MessageControllerError> {
        let mut handle = self.connection_manager.acquire(account.id).await?;
        let client = handle.client().clone();

        let result = async {
            client.select_folder(folder).await?;
            let mut uids = client.search_emails("ALL").await?;
            uids.sort_unstable();

            let page: Vec<u32> = uids.into_iter().skip(offset).take(limit).collect();
            if page.is_empty() {
                return Ok(Vec::new());
            }

            let emails = client.fetch_emails(&page).await?;
            Ok(emails
                .iter()
                .map(|e| translator::to_canonical(e, &account.grant_id().to_string(), folder))
                .collect())
        }
        .await;

        handle.poison();
        drop(handle);
        result
    }
}

/// Minimal percent-decoder for the `message_id` path parameter — IMAP
/// Message-IDs contain no reserved characters beyond `%`, `<`, `>`.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(hex) = std::str::from_utf8(&bytes[i + 1..i + 3]) {
                if let Ok(byte) = u8::from_str_radix(hex, 16) {
                    out.push(byte);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
