//! src/services/blob_store.rs
//!
//! BlobStore — the flat object store underneath the file manager. Metadata
//! lives in SQLite, payloads on local disk sharded beneath
//! `base_path/{shard}/{shard}/`. The store knows nothing about directories:
//! its whole surface is put / head / copy / delete / list-by-prefix over
//! opaque pathnames. The hierarchy the UI sees is emulated one level up, in
//! `fs_service`.

use crate::models::blob::Blob;
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut};
use md5::Context;
use sqlx::SqlitePool;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("blob `{0}` not found")]
    NotFound(String),
    #[error("invalid pathname")]
    InvalidPathname,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

const MAX_PATHNAME_LEN: usize = 1024;

const INIT_SQL: &str = include_str!("../../migrations/0001_init.sql");

/// Flat key-value blob store.
///
/// Pathnames are unique opaque strings with no leading slash. There is no
/// rename or move primitive; callers that need one compose copy + delete.
#[derive(Clone)]
pub struct BlobStore {
    /// Shared SQLite pool holding the metadata rows.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where payloads are stored.
    pub base_path: PathBuf,
}

impl BlobStore {
    pub fn new(db: Arc<SqlitePool>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            db,
            base_path: base_path.into(),
        }
    }

    /// Apply the embedded schema. Used by the `--migrate` flag and by tests
    /// running against in-memory databases.
    pub async fn apply_migrations(&self) -> StoreResult<()> {
        // Drop `--` comment lines before splitting: a semicolon inside a
        // comment would otherwise break a statement in two.
        let sql: String = INIT_SQL
            .lines()
            .filter(|line| !line.trim_start().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        for stmt in sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(())
    }

    /// Basic pathname validation to avoid trivial path traversal vectors.
    ///
    /// Rejects empty or oversized pathnames, leading `/`, dot segments, and
    /// control bytes. Dots are only rejected as complete `/`-separated
    /// segments: names like `a..b` or `...` are legal filenames. The
    /// emulation layer validates leaf names separately; this is the store's
    /// own last line of defence since payloads land on a real filesystem.
    fn ensure_pathname_safe(&self, pathname: &str) -> StoreResult<()> {
        if pathname.is_empty() || pathname.len() > MAX_PATHNAME_LEN {
            return Err(StoreError::InvalidPathname);
        }
        if pathname.starts_with('/') || pathname.split('/').any(|seg| seg == "." || seg == "..") {
            return Err(StoreError::InvalidPathname);
        }
        if pathname
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(StoreError::InvalidPathname);
        }
        Ok(())
    }

    /// Two-level shard identifiers for a pathname.
    ///
    /// First two bytes of MD5(pathname) as lowercase hex. Keeps the file
    /// count per directory bounded.
    fn shards(pathname: &str) -> (String, String) {
        let digest = md5::compute(pathname);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// Fully-qualified payload path: `base_path/{shard}/{shard}/{pathname}`.
    /// Parent directories may not exist yet.
    fn payload_path(&self, pathname: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::shards(pathname);
        let mut path = self.base_path.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(pathname);
        path
    }

    /// Exact-match probe. Returns `None` when no blob has this pathname.
    pub async fn head(&self, pathname: &str) -> StoreResult<Option<Blob>> {
        self.ensure_pathname_safe(pathname)?;
        let blob = sqlx::query_as::<_, Blob>(
            "SELECT id, pathname, content_type, size_bytes, etag, uploaded_at
             FROM blobs WHERE pathname = ?",
        )
        .bind(pathname)
        .fetch_optional(&*self.db)
        .await?;
        Ok(blob)
    }

    /// List blobs whose pathname starts with `prefix`, in pathname order.
    ///
    /// Fetches `limit + 1` rows to detect truncation; the boolean is true
    /// when more keys exist beyond the returned page. An empty prefix lists
    /// the whole store.
    pub async fn list(&self, prefix: &str, limit: usize) -> StoreResult<(Vec<Blob>, bool)> {
        let fetch_limit = limit + 1;
        let pattern = format!("{}%", escape_like(prefix));
        let mut rows = sqlx::query_as::<_, Blob>(
            "SELECT id, pathname, content_type, size_bytes, etag, uploaded_at
             FROM blobs WHERE pathname LIKE ? ESCAPE '\\'
             ORDER BY pathname ASC LIMIT ?",
        )
        .bind(pattern)
        .bind(fetch_limit as i64)
        .fetch_all(&*self.db)
        .await?;

        let truncated = rows.len() == fetch_limit;
        if truncated {
            rows.pop();
        }
        Ok((rows, truncated))
    }

    /// Store a small payload in one shot. Overwrites any existing blob at
    /// this pathname.
    pub async fn put_bytes(
        &self,
        pathname: &str,
        content_type: Option<String>,
        payload: &[u8],
    ) -> StoreResult<Blob> {
        let chunk = Bytes::copy_from_slice(payload);
        let stream = futures::stream::iter([Ok::<_, io::Error>(chunk)]);
        self.put_stream(pathname, content_type, stream).await
    }

    /// Stream a payload to disk and upsert its metadata row.
    ///
    /// - Writes bytes incrementally to a temporary file.
    /// - Computes MD5/etag and size while streaming.
    /// - Atomically renames into final location.
    /// - Upserts the metadata row (last write wins).
    ///
    /// Ensures durable writes (fsync) and cleans up temp files on errors.
    pub async fn put_stream<S>(
        &self,
        pathname: &str,
        content_type: Option<String>,
        stream: S,
    ) -> StoreResult<Blob>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        self.ensure_pathname_safe(pathname)?;

        let file_path = self.payload_path(pathname);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StoreError::Io(io::Error::other("payload path missing parent directory"))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: i64 = 0;
        let mut digest = Context::new();
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(StoreError::Io(err));
                }
            };
            size_bytes += chunk.len() as i64;
            digest.consume(&chunk);
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StoreError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StoreError::Io(err));
            }
        }

        let etag = format!("{:x}", digest.compute());
        match self
            .upsert_meta(pathname, content_type, size_bytes, Some(etag))
            .await
        {
            Ok(blob) => Ok(blob),
            Err(err) => {
                let _ = fs::remove_file(&file_path).await;
                Err(err)
            }
        }
    }

    /// Copy one blob to another pathname, overwriting any existing blob
    /// there. The store has no rename; rename/move are copy + delete in the
    /// emulation layer.
    pub async fn copy(&self, src: &str, dst: &str) -> StoreResult<Blob> {
        self.ensure_pathname_safe(src)?;
        self.ensure_pathname_safe(dst)?;

        let meta = self
            .head(src)
            .await?
            .ok_or_else(|| StoreError::NotFound(src.to_string()))?;

        let src_path = self.payload_path(src);
        let dst_path = self.payload_path(dst);
        if let Some(parent) = dst_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(&src_path, &dst_path).await?;

        self.upsert_meta(dst, meta.content_type, meta.size_bytes, meta.etag)
            .await
    }

    /// Delete a blob. Missing pathnames are not an error: returns `false`
    /// when nothing existed, so repeated deletes stay idempotent.
    pub async fn delete(&self, pathname: &str) -> StoreResult<bool> {
        self.ensure_pathname_safe(pathname)?;

        let result = sqlx::query("DELETE FROM blobs WHERE pathname = ?")
            .bind(pathname)
            .execute(&*self.db)
            .await?;
        let existed = result.rows_affected() > 0;

        let file_path = self.payload_path(pathname);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed payload {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("payload {} already missing", file_path.display());
            }
            Err(err) => return Err(StoreError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent).await;
        }

        Ok(existed)
    }

    /// Fetch a blob for reading: metadata plus an opened payload handle.
    ///
    /// Returns NotFound if metadata exists but the physical file is missing.
    pub async fn reader(&self, pathname: &str) -> StoreResult<(Blob, File)> {
        let meta = self
            .head(pathname)
            .await?
            .ok_or_else(|| StoreError::NotFound(pathname.to_string()))?;

        let file_path = self.payload_path(pathname);
        let file = File::open(&file_path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::NotFound(pathname.to_string())
            } else {
                StoreError::Io(err)
            }
        })?;

        Ok((meta, file))
    }

    async fn upsert_meta(
        &self,
        pathname: &str,
        content_type: Option<String>,
        size_bytes: i64,
        etag: Option<String>,
    ) -> StoreResult<Blob> {
        let blob = sqlx::query_as::<_, Blob>(
            r#"
            INSERT INTO blobs (id, pathname, content_type, size_bytes, etag, uploaded_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(pathname) DO UPDATE SET
                content_type = excluded.content_type,
                size_bytes = excluded.size_bytes,
                etag = excluded.etag,
                uploaded_at = excluded.uploaded_at
            RETURNING id, pathname, content_type, size_bytes, etag, uploaded_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(pathname)
        .bind(content_type)
        .bind(size_bytes)
        .bind(etag)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await?;
        Ok(blob)
    }

    /// Recursively remove empty shard directories up to the base path.
    ///
    /// Stops on non-empty or missing directories and on unexpected I/O
    /// errors.
    async fn prune_empty_dirs(&self, start: &Path) {
        let stop = self.base_path.as_path();
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

/// Escape `%` and `_` so a pathname prefix matches literally in LIKE.
fn escape_like(prefix: &str) -> String {
    prefix
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
