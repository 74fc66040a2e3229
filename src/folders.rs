//! Folder discovery, grounded on `app/controllers/imap/folder_utils.py`.
//!
//! Maps a raw `LIST` response into the set of folders the listener/
//! translator/message-controller operate on, applying the same
//! ignore-list and safety cap as the original, and falling back to a fixed
//! two-folder set if discovery fails for any reason — an account that can't
//! enumerate its mailbox still gets inbox coverage.

use log::warn;

use crate::imap::session::AsyncImapOps;
use crate::imap::{ImapClient, ImapError};

/// Folder name fragments excluded from listener coverage, checked
/// case-insensitively against the full folder path (spec §4.3).
const IGNORED_SUBSTRINGS: &[&str] = &["drafts", "junk", "archive", "trash", "spam"];

/// Hard cap on folders watched per account — a mailbox with more than this
/// many folders only has the first `MAX_FOLDERS` (by LIST order) watched,
/// with a warning logged for the rest.
const MAX_FOLDERS: usize = 15;

const FALLBACK_FOLDERS: &[&str] = &["INBOX", "Sent"];

fn is_ignored(folder_path: &str) -> bool {
    let lower = folder_path.to_lowercase();
    IGNORED_SUBSTRINGS.iter().any(|frag| lower.contains(frag))
}

/// Returns the folders an account's listener should watch: all folders from
/// `LIST` minus the ignore-list, capped at [`MAX_FOLDERS`]. On any IMAP
/// error, logs and falls back to `["INBOX", "Sent"]` rather than propagating
/// the failure — mirrors `FolderUtils.get_account_folders`'s blanket
/// `except Exception` fallback.
pub async fn discover_watched_folders<T: AsyncImapOps + Send + Sync + std::fmt::Debug + 'static>(
    client: &ImapClient<T>,
) -> Vec<String> {
    match list_all_folder_paths(client).await {
        Ok(mut paths) => {
            let before = paths.len();
            paths.retain(|p| !is_ignored(p));
            if paths.len() > MAX_FOLDERS {
                warn!(
                    "account has {} eligible folders, capping to {MAX_FOLDERS}",
                    paths.len()
                );
                paths.truncate(MAX_FOLDERS);
            }
            if before != paths.len() {
                warn!("ignored {} folder(s) matching the ignore list", before - paths.len());
            }
            if paths.is_empty() {
                warn!("no eligible folders discovered, falling back to default set");
                return fallback();
            }
            paths
        }
        Err(e) => {
            warn!("folder discovery failed ({e}), falling back to default set");
            fallback()
        }
    }
}

fn fallback() -> Vec<String> {
    FALLBACK_FOLDERS.iter().map(|s| s.to_string()).collect()
}

async fn list_all_folder_paths<T: AsyncImapOps + Send + Sync + std::fmt::Debug + 'static>(
    client: &ImapClient<T>,
) -> Result<Vec<String>, ImapError> {
    client.list_folders().await
}
