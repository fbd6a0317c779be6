use file_manager::services::{blob_store::BlobStore, fs_service::FsService};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tempfile::TempDir;

/// Fresh service over an in-memory SQLite database and a temp payload dir.
/// The TempDir must stay alive for the duration of the test.
pub async fn service() -> (FsService, TempDir) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    let dir = tempfile::tempdir().expect("temp dir");
    let store = BlobStore::new(Arc::new(pool), dir.path());
    store.apply_migrations().await.expect("schema");
    (FsService::new(store), dir)
}
