//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks DB connectivity and disk I/O

use crate::services::fs_service::FsService;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;
use tokio::fs;
use uuid::Uuid;

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// `GET /healthz`
///
/// Cheap liveness probe; never performs I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Runs a lightweight query against SQLite and a write/read/delete round
/// trip under the payload directory. 200 when both pass, 503 otherwise.
pub async fn readyz(State(service): State<FsService>) -> impl IntoResponse {
    let sqlite = sqlite_check(&service).await;
    let disk = disk_check(&service).await;
    let overall_ok = sqlite.ok && disk.ok;

    let mut checks = HashMap::new();
    checks.insert("sqlite", sqlite);
    checks.insert("disk", disk);

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = ReadyResponse {
        status: if overall_ok { "ok" } else { "error" }.into(),
        checks,
    };
    (status, Json(body))
}

async fn sqlite_check(service: &FsService) -> CheckStatus {
    match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&*service.store.db)
        .await
    {
        Ok(1) => CheckStatus {
            ok: true,
            error: None,
        },
        Ok(v) => CheckStatus {
            ok: false,
            error: Some(format!("unexpected result: {}", v)),
        },
        Err(e) => CheckStatus {
            ok: false,
            error: Some(format!("error: {}", e)),
        },
    }
}

async fn disk_check(service: &FsService) -> CheckStatus {
    let tmp_path = service
        .store
        .base_path
        .join(format!(".readyz-{}", Uuid::new_v4()));

    let outcome = async {
        fs::write(&tmp_path, b"readyz").await?;
        let bytes = fs::read(&tmp_path).await?;
        if bytes != b"readyz" {
            return Err(std::io::Error::other("file content mismatch"));
        }
        fs::remove_file(&tmp_path).await
    }
    .await;

    match outcome {
        Ok(()) => CheckStatus {
            ok: true,
            error: None,
        },
        Err(e) => {
            let _ = fs::remove_file(&tmp_path).await;
            CheckStatus {
                ok: false,
                error: Some(e.to_string()),
            }
        }
    }
}
