//! Represents one object in the flat blob store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Metadata for a single stored blob.
///
/// The store is flat: a blob is addressed only by its `pathname`, an opaque
/// string in which `/` is a conventional separator. Folders are not rows in
/// this table; they exist only as shared pathname prefixes (or via a sentinel
/// `.keep` blob written when a folder is created explicitly).
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Blob {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Unique pathname, no leading slash (e.g. `photos/2025/img.jpg`).
    pub pathname: String,

    /// Content type (MIME type), if known at upload time.
    pub content_type: Option<String>,

    /// Payload size in bytes.
    pub size_bytes: i64,

    /// MD5 checksum of the payload.
    pub etag: Option<String>,

    /// Timestamp of the last upload or overwrite.
    pub uploaded_at: DateTime<Utc>,
}
