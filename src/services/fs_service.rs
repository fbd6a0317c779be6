//! src/services/fs_service.rs
//!
//! FsService — the path-emulation layer. Presents a hierarchical file/folder
//! tree over the flat `BlobStore` and implements every mutation (create,
//! rename, move, copy, delete) as sequences of the store's flat primitives.
//!
//! The store offers no multi-key transaction, so subtree mutations are
//! sequential copy/delete loops and are not atomic: a fault partway through
//! leaves some keys migrated and some not. Batch operations therefore report
//! a per-item outcome (keys copied/deleted plus an optional error) instead
//! of pretending to be all-or-nothing.

use crate::{
    models::{
        blob::Blob,
        item::{Item, ItemKind},
    },
    services::{
        blob_store::{BlobStore, StoreError},
        paths,
    },
};
use bytes::Bytes;
use chrono::Utc;
use futures::Stream;
use serde::Serialize;
use std::{collections::BTreeMap, io};
use thiserror::Error;
use tokio::fs::File;
use tracing::warn;

/// Enumeration cap per prefix scan. Keys beyond this are reported through
/// `has_more` on listings; a mutation hitting the cap only migrates the
/// first page and logs a warning.
pub const LIST_LIMIT: usize = 1000;

/// Placeholder blob written when a folder is created explicitly, so the
/// otherwise key-less folder is visible to enumeration.
const SENTINEL_NAME: &str = ".keep";
const SENTINEL_CONTENT: &[u8] = b"folder";

// Dummy capacity stats: 10 GiB, half used.
const STATS_TOTAL: i64 = 10 * 1024 * 1024 * 1024;
const STATS_FREE: i64 = STATS_TOTAL / 2;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("invalid name: {reason}")]
    InvalidName { reason: &'static str },
    #[error("`{0}` not found")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type FsResult<T> = Result<T, FsError>;

/// What an identifier resolves to in the flat key space.
///
/// Folders are not first-class in the store, so every mutating operation
/// goes through this one probe-then-fallback rule: an identifier is a folder
/// if any key lives under `clean_id + "/"`, else a file if the exact key
/// exists, else missing.
#[derive(Debug)]
pub enum Target {
    /// `root` is the clean identifier; `blobs` every key under `root + "/"`.
    Folder { root: String, blobs: Vec<Blob> },
    File(Blob),
    Missing,
}

/// Direction of a batch transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferMode {
    Move,
    Copy,
}

/// One folder listing page.
#[derive(Serialize, Debug)]
pub struct Listing {
    pub items: Vec<Item>,
    pub has_more: bool,
}

/// Per-item result of a batch mutation. `copied`/`deleted` count store keys,
/// not items; on failure they reflect how far the item got before stopping.
#[derive(Serialize, Debug)]
pub struct BatchOutcome {
    pub id: String,
    pub copied: usize,
    pub deleted: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchOutcome {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            copied: 0,
            deleted: 0,
            error: None,
        }
    }
}

/// Result of a rename: the new identifier plus the number of store keys
/// that were migrated under it.
#[derive(Serialize, Debug)]
pub struct RenameOutcome {
    pub id: String,
    pub moved: usize,
}

/// Static capacity stats for the UI's info panel.
#[derive(Serialize, Debug)]
pub struct CapacityStats {
    pub total: i64,
    pub free: i64,
    pub used: i64,
}

#[derive(Clone)]
pub struct FsService {
    pub store: BlobStore,
}

impl FsService {
    pub fn new(store: BlobStore) -> Self {
        Self { store }
    }

    pub fn info(&self) -> CapacityStats {
        CapacityStats {
            total: STATS_TOTAL,
            free: STATS_FREE,
            used: STATS_TOTAL - STATS_FREE,
        }
    }

    /// Resolve an identifier to a folder, a file, or nothing.
    ///
    /// The root (`""`/`"/"`) is never a mutation target and classifies as
    /// `Missing`.
    pub async fn classify(&self, id: &str) -> FsResult<Target> {
        let clean = paths::clean_id(id);
        if clean.is_empty() {
            return Ok(Target::Missing);
        }

        let prefix = format!("{}/", clean);
        let (blobs, truncated) = self.store.list(&prefix, LIST_LIMIT).await?;
        if !blobs.is_empty() {
            if truncated {
                warn!(id, "folder holds more than {LIST_LIMIT} keys; only the first page is affected");
            }
            return Ok(Target::Folder {
                root: clean.to_string(),
                blobs,
            });
        }

        match self.store.head(clean).await? {
            Some(blob) => Ok(Target::File(blob)),
            None => Ok(Target::Missing),
        }
    }

    /// Enumerate the direct children of a folder.
    ///
    /// Scans every key under the folder's prefix and classifies each
    /// remainder: no further separator means a direct child file; a
    /// separator means some subfolder, recorded once under its immediate
    /// name with synthesized metadata. A key equal to the prefix itself (a
    /// self-referential placeholder) is skipped.
    pub async fn list_children(&self, id: &str) -> FsResult<Listing> {
        let prefix = paths::normalize_prefix(id);
        let (blobs, truncated) = self.store.list(&prefix, LIST_LIMIT).await?;

        let mut children: BTreeMap<String, Item> = BTreeMap::new();
        for blob in &blobs {
            let Some(remainder) = blob.pathname.strip_prefix(prefix.as_str()) else {
                continue;
            };
            if remainder.is_empty() {
                continue;
            }
            match remainder.split_once('/') {
                None => {
                    children.insert(blob.pathname.clone(), item_from_blob(blob));
                }
                Some((folder_name, _)) => {
                    // Keyed with the trailing slash so a file and a folder
                    // sharing a name stay distinct entries.
                    let key = format!("{}{}/", prefix, folder_name);
                    children.entry(key).or_insert_with(|| {
                        folder_item(&format!("{}{}", prefix, folder_name))
                    });
                }
            }
        }

        Ok(Listing {
            items: children.into_values().collect(),
            has_more: truncated,
        })
    }

    /// Create an empty file or an explicit folder under `parent_id`.
    ///
    /// A folder is made visible by writing a sentinel `.keep` blob under its
    /// prefix. Returns the synthesized identifier without re-reading the
    /// store.
    pub async fn create(
        &self,
        parent_id: &str,
        raw_name: &str,
        kind: ItemKind,
    ) -> FsResult<String> {
        let name = validate(raw_name)?;
        let prefix = paths::normalize_prefix(parent_id);
        match kind {
            ItemKind::Folder => {
                let sentinel = format!("{}{}/{}", prefix, name, SENTINEL_NAME);
                self.store
                    .put_bytes(&sentinel, Some("text/plain".into()), SENTINEL_CONTENT)
                    .await?;
            }
            ItemKind::File => {
                let pathname = format!("{}{}", prefix, name);
                self.store.put_bytes(&pathname, None, b"").await?;
            }
        }
        Ok(paths::child_id(parent_id, &name))
    }

    /// Store an uploaded payload as `parent_prefix + filename`.
    ///
    /// The browser-supplied filename goes through the same validation gate
    /// as created names.
    pub async fn upload<S>(
        &self,
        parent_id: &str,
        file_name: &str,
        content_type: Option<String>,
        payload: S,
    ) -> FsResult<Item>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let name = validate(file_name)?;
        let pathname = format!("{}{}", paths::normalize_prefix(parent_id), name);
        let blob = self.store.put_stream(&pathname, content_type, payload).await?;
        Ok(item_from_blob(&blob))
    }

    /// Open a file payload for streaming out (the `/raw` route).
    ///
    /// A missing blob is a proper not-found here, unlike the mutating
    /// operations where absent targets are no-ops.
    pub async fn read_file(&self, id: &str) -> FsResult<(Blob, File)> {
        let pathname = paths::clean_id(id);
        match self.store.reader(pathname).await {
            Ok(pair) => Ok(pair),
            Err(StoreError::NotFound(path)) => Err(FsError::NotFound(path)),
            Err(err) => Err(err.into()),
        }
    }

    /// Rename the item at `id` to `raw_name` within the same parent.
    ///
    /// File and folder renames both resolve through `classify`, then migrate
    /// each affected key with copy + delete. Not transactional: a failure
    /// mid-loop leaves a partial set of keys migrated (and surfaces as an
    /// error with the count so far lost).
    pub async fn rename(&self, id: &str, raw_name: &str) -> FsResult<RenameOutcome> {
        let name = validate(raw_name)?;
        let clean = paths::clean_id(id);
        let parent = paths::parent_of(clean);
        let new_root = if parent.is_empty() {
            name
        } else {
            format!("{}/{}", parent, name)
        };

        let moved = match self.classify(id).await? {
            Target::File(blob) => {
                self.migrate_key(&blob.pathname, &new_root).await?
            }
            Target::Folder { root, blobs } => {
                let mut moved = 0;
                for blob in &blobs {
                    let suffix = &blob.pathname[root.len()..];
                    let dst = format!("{}{}", new_root, suffix);
                    moved += self.migrate_key(&blob.pathname, &dst).await?;
                }
                moved
            }
            // Nothing lives under the old identifier; renaming nothing is a
            // no-op that still reports the would-be identifier.
            Target::Missing => 0,
        };

        Ok(RenameOutcome {
            id: format!("/{}", new_root),
            moved,
        })
    }

    /// Move or copy a batch of identifiers into a destination folder.
    ///
    /// Items are processed independently: one item's failure is recorded in
    /// its outcome and the batch continues. Destination collisions are
    /// silently overwritten (store-native copy semantics).
    pub async fn transfer_items(
        &self,
        ids: &[String],
        target_id: &str,
        mode: TransferMode,
    ) -> FsResult<Vec<BatchOutcome>> {
        let target_prefix = paths::normalize_prefix(target_id);
        let mut outcomes = Vec::with_capacity(ids.len());
        for id in ids {
            outcomes.push(self.transfer_one(id, &target_prefix, mode).await);
        }
        Ok(outcomes)
    }

    async fn transfer_one(&self, id: &str, target_prefix: &str, mode: TransferMode) -> BatchOutcome {
        let mut out = BatchOutcome::new(id);

        let target = match self.classify(id).await {
            Ok(target) => target,
            Err(err) => {
                warn!(id, %err, "failed to resolve transfer source");
                out.error = Some(err.to_string());
                return out;
            }
        };
        let (src_root, blobs) = match target {
            Target::Folder { root, blobs } => (root, blobs),
            Target::File(blob) => (blob.pathname.clone(), vec![blob]),
            // Already gone; treated as a zero-key success.
            Target::Missing => return out,
        };

        let dst_root = format!("{}{}", target_prefix, paths::leaf_name(id));
        for blob in &blobs {
            let suffix = &blob.pathname[src_root.len()..];
            let dst = format!("{}{}", dst_root, suffix);
            if dst == blob.pathname {
                // Transfer into the item's own parent; copying a key onto
                // itself would truncate the payload.
                continue;
            }
            if let Err(err) = self.store.copy(&blob.pathname, &dst).await {
                warn!(src = %blob.pathname, %dst, %err, "copy failed, stopping this item");
                out.error = Some(err.to_string());
                return out;
            }
            out.copied += 1;
            if mode == TransferMode::Move {
                match self.store.delete(&blob.pathname).await {
                    Ok(_) => out.deleted += 1,
                    Err(err) => {
                        warn!(src = %blob.pathname, %err, "delete after copy failed, stopping this item");
                        out.error = Some(err.to_string());
                        return out;
                    }
                }
            }
        }
        out
    }

    /// Delete a batch of identifiers. Missing identifiers count as zero-key
    /// successes, so repeated deletes are idempotent.
    pub async fn delete_items(&self, ids: &[String]) -> Vec<BatchOutcome> {
        let mut outcomes = Vec::with_capacity(ids.len());
        for id in ids {
            outcomes.push(self.delete_one(id).await);
        }
        outcomes
    }

    async fn delete_one(&self, id: &str) -> BatchOutcome {
        let mut out = BatchOutcome::new(id);

        let target = match self.classify(id).await {
            Ok(target) => target,
            Err(err) => {
                warn!(id, %err, "failed to resolve delete target");
                out.error = Some(err.to_string());
                return out;
            }
        };
        let pathnames: Vec<String> = match target {
            Target::Folder { blobs, .. } => {
                blobs.into_iter().map(|b| b.pathname).collect()
            }
            Target::File(blob) => vec![blob.pathname],
            Target::Missing => return out,
        };

        for pathname in &pathnames {
            match self.store.delete(pathname).await {
                Ok(existed) => {
                    if existed {
                        out.deleted += 1;
                    }
                }
                Err(err) => {
                    warn!(%pathname, %err, "delete failed, stopping this item");
                    out.error = Some(err.to_string());
                    return out;
                }
            }
        }
        out
    }

    /// Copy one key to `dst` and delete the original. Returns how many keys
    /// actually moved (0 when source and destination coincide).
    async fn migrate_key(&self, src: &str, dst: &str) -> FsResult<usize> {
        if src == dst {
            return Ok(0);
        }
        self.store.copy(src, dst).await?;
        self.store.delete(src).await?;
        Ok(1)
    }
}

fn validate(raw_name: &str) -> FsResult<String> {
    paths::validate_name(raw_name).map_err(|reason| FsError::InvalidName { reason })
}

fn item_from_blob(blob: &Blob) -> Item {
    Item {
        id: format!("/{}", blob.pathname),
        name: paths::leaf_name(&blob.pathname).to_string(),
        kind: ItemKind::File,
        size: blob.size_bytes,
        date: blob.uploaded_at.timestamp(),
        url: format!("/raw/{}", blob.pathname),
    }
}

/// Synthesize an item for a folder inferred from a prefix scan. No blob
/// backs it, so size is zero and the date is simply "now".
fn folder_item(pathname: &str) -> Item {
    let trimmed = pathname.trim_end_matches('/');
    Item {
        id: format!("/{}", trimmed),
        name: paths::leaf_name(trimmed).to_string(),
        kind: ItemKind::Folder,
        size: 0,
        date: Utc::now().timestamp(),
        url: String::new(),
    }
}
