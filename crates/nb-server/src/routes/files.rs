//! Artifact listing and the storage liveness probe.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::context::AppContext;
use crate::error::AppError;
use crate::jobs::FileEntry;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct FilesResponse {
    pub files: Vec<FileEntry>,
    pub total: usize,
}

/// GET /api/files
#[utoipa::path(
    get,
    path = "/api/files",
    responses((status = 200, description = "All recorded artifacts", body = FilesResponse))
)]
pub async fn list_files(State(ctx): State<AppContext>) -> Result<Json<FilesResponse>, AppError> {
    let files = ctx.jobs.list_files().await?;
    Ok(Json(FilesResponse {
        total: files.len(),
        files,
    }))
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct StorageExists {
    pub input: bool,
    pub output: bool,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TestResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub storage_exists: StorageExists,
}

/// GET /api/test
#[utoipa::path(
    get,
    path = "/api/test",
    responses((status = 200, description = "API liveness", body = TestResponse))
)]
pub async fn api_test(State(ctx): State<AppContext>) -> Json<TestResponse> {
    let storage = &ctx.config.storage;
    Json(TestResponse {
        status: "working",
        message: "NodeBlack API is running",
        storage_exists: StorageExists {
            input: tokio::fs::try_exists(&storage.input_dir).await.unwrap_or(false),
            output: tokio::fs::try_exists(&storage.output_dir).await.unwrap_or(false),
        },
    })
}
