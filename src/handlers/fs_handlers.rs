//! HTTP handlers for the file-manager command surface.
//!
//! Thin translation between the REST contract and `FsService`; all path
//! emulation and store access lives in the service layer.

use crate::{
    errors::AppError,
    models::item::ItemKind,
    services::fs_service::{FsService, TransferMode},
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::io;
use tokio_util::io::ReaderStream;

/// Body of `POST /files[/{*path}]`.
#[derive(Debug, Deserialize)]
pub struct CreateReq {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
}

/// Body of `PUT /files[/{*path}]`, discriminated by `operation`.
#[derive(Debug, Deserialize)]
#[serde(tag = "operation", rename_all = "lowercase")]
pub enum UpdateReq {
    Rename { name: String },
    Move { ids: Vec<String>, target: String },
    Copy { ids: Vec<String>, target: String },
}

/// Body of `DELETE /`.
#[derive(Debug, Deserialize)]
pub struct DeleteReq {
    pub ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub id: Option<String>,
}

/// GET `/info` — static capacity stats.
pub async fn info(State(service): State<FsService>) -> Json<Value> {
    Json(json!({ "stats": service.info() }))
}

/// GET `/files` — list the store root.
pub async fn list_root(State(service): State<FsService>) -> Result<Json<Value>, AppError> {
    list(service, "").await
}

/// GET `/files/{*path}` — list direct children of a folder.
pub async fn list_folder(
    State(service): State<FsService>,
    Path(path): Path<String>,
) -> Result<Json<Value>, AppError> {
    list(service, &path).await
}

async fn list(service: FsService, path: &str) -> Result<Json<Value>, AppError> {
    let listing = service.list_children(path).await?;
    Ok(Json(json!({
        "status": "success",
        "items": listing.items,
        "has_more": listing.has_more,
    })))
}

/// POST `/files` — create a file or folder under the root.
pub async fn create_in_root(
    State(service): State<FsService>,
    Json(req): Json<CreateReq>,
) -> Result<Json<Value>, AppError> {
    create(service, "", req).await
}

/// POST `/files/{*path}` — create a file or folder under a folder.
pub async fn create_in_folder(
    State(service): State<FsService>,
    Path(path): Path<String>,
    Json(req): Json<CreateReq>,
) -> Result<Json<Value>, AppError> {
    create(service, &path, req).await
}

async fn create(service: FsService, parent: &str, req: CreateReq) -> Result<Json<Value>, AppError> {
    let id = service.create(parent, &req.name, req.kind).await?;
    Ok(Json(json!({ "status": "success", "id": id })))
}

/// PUT `/files` — move/copy with a root-level body (rename of the root is a
/// no-op by construction).
pub async fn update_root(
    State(service): State<FsService>,
    Json(req): Json<UpdateReq>,
) -> Result<Json<Value>, AppError> {
    update(service, "", req).await
}

/// PUT `/files/{*path}` — rename the item at the path, or move/copy the ids
/// named in the body.
pub async fn update_item(
    State(service): State<FsService>,
    Path(path): Path<String>,
    Json(req): Json<UpdateReq>,
) -> Result<Json<Value>, AppError> {
    update(service, &path, req).await
}

async fn update(service: FsService, path: &str, req: UpdateReq) -> Result<Json<Value>, AppError> {
    match req {
        UpdateReq::Rename { name } => {
            let outcome = service.rename(path, &name).await?;
            Ok(Json(json!({
                "status": "success",
                "id": outcome.id,
                "moved": outcome.moved,
            })))
        }
        UpdateReq::Move { ids, target } => {
            let result = service
                .transfer_items(&ids, &target, TransferMode::Move)
                .await?;
            Ok(Json(json!({ "status": "success", "result": result })))
        }
        UpdateReq::Copy { ids, target } => {
            let result = service
                .transfer_items(&ids, &target, TransferMode::Copy)
                .await?;
            Ok(Json(json!({ "status": "success", "result": result })))
        }
    }
}

/// POST `/upload?id=<parentId>` — multipart upload into a parent folder.
///
/// The payload streams straight through to the store; the blob's pathname is
/// the parent prefix plus the (validated) original filename.
pub async fn upload(
    State(service): State<FsService>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let parent_id = query.id.unwrap_or_else(|| "/".into());

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::bad_request("Upload field is missing a filename"))?;
        let content_type = field.content_type().map(str::to_string);

        let stream = futures::stream::try_unfold(field, |mut field| async move {
            match field.chunk().await {
                Ok(Some(bytes)) => Ok(Some((bytes, field))),
                Ok(None) => Ok(None),
                Err(err) => Err(io::Error::other(err)),
            }
        });
        let item = service
            .upload(&parent_id, &file_name, content_type, stream)
            .await?;
        return Ok(Json(json!({ "status": "success", "id": item.id })));
    }

    Err(AppError::bad_request("No file provided"))
}

/// DELETE `/` — delete every identifier in the body. Already-absent ids are
/// zero-key successes.
pub async fn delete_items(
    State(service): State<FsService>,
    Json(req): Json<DeleteReq>,
) -> Result<Json<Value>, AppError> {
    let result = service.delete_items(&req.ids).await;
    Ok(Json(json!({ "status": "success", "result": result })))
}

/// GET `/raw/{*path}` — stream a blob payload (the target of `Item.url`).
pub async fn download(
    State(service): State<FsService>,
    Path(path): Path<String>,
) -> Result<Response, AppError> {
    let (meta, file) = service.read_file(&path).await?;

    let body = Body::from_stream(ReaderStream::new(file));
    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let content_type = meta
        .content_type
        .unwrap_or_else(|| "application/octet-stream".into());
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&meta.size_bytes.max(0).to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
    if let Some(etag) = meta.etag.as_deref() {
        if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", etag)) {
            headers.insert(header::ETAG, value);
        }
    }

    Ok(response)
}
