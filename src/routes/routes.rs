//! Defines routes for the file-manager command surface.
//!
//! ## Structure
//! - `GET    /info` — static capacity stats
//! - `GET    /files[/{*path}]` — list direct children of a folder
//! - `POST   /files[/{*path}]` — create a file or folder
//! - `PUT    /files[/{*path}]` — rename / move / copy (operation in body)
//! - `POST   /upload?id=<parentId>` — multipart file upload
//! - `DELETE /` — batch delete by id list
//! - `GET    /raw/{*path}` — stream a blob payload
//!
//! The wildcard `{*path}` carries the nested identifier, so `/files/a/b/c`
//! addresses the emulated folder `a/b/c`. The bare `/files` routes cover
//! the store root, which the wildcard cannot match.

use crate::{
    handlers::{
        fs_handlers::{
            create_in_folder, create_in_root, delete_items, download, info, list_folder,
            list_root, update_item, update_root, upload,
        },
        health_handlers::{healthz, readyz},
    },
    services::fs_service::FsService,
};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Build the router for the whole API. Shared state (`FsService`) is carried
/// to every handler.
pub fn routes() -> Router<FsService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // command surface
        .route("/info", get(info))
        .route("/upload", post(upload))
        .route(
            "/files",
            get(list_root).post(create_in_root).put(update_root),
        )
        .route(
            "/files/{*path}",
            get(list_folder).post(create_in_folder).put(update_item),
        )
        .route("/raw/{*path}", get(download))
        .route("/", delete(delete_items))
}
