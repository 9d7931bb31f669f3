//! Artifact download.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use tokio_util::io::ReaderStream;

use crate::context::AppContext;
use crate::error::AppError;
use crate::routes::parse_task_id;

/// GET /api/download/{task_id}
#[utoipa::path(
    get,
    path = "/api/download/{task_id}",
    params(("task_id" = String, Path, description = "Task ID returned by /api/convert")),
    responses(
        (status = 200, description = "Converted file", content_type = "application/octet-stream"),
        (status = 404, description = "Unknown task, or output file missing"),
        (status = 410, description = "Download window has passed; file removed")
    )
)]
pub async fn download(
    State(ctx): State<AppContext>,
    Path(task_id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_task_id(&task_id).ok_or_else(|| nb_core::Error::not_found("file", &task_id))?;
    let download = ctx.jobs.download(id).await?;

    let file = match tokio::fs::File::open(&download.path).await {
        Ok(f) => f,
        // Removed between lookup and open.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(nb_core::Error::FileMissing { id: task_id }.into());
        }
        Err(e) => return Err(nb_core::Error::from(e).into()),
    };
    let len = file.metadata().await.map(|m| m.len()).ok();

    tracing::info!(job_id = %id, filename = %download.filename, "Serving download");

    let disposition = format!("attachment; filename=\"{}\"", download.filename);
    let mut response = (
        [
            (header::CONTENT_TYPE, download.content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response();
    if let Some(len) = len {
        response
            .headers_mut()
            .insert(header::CONTENT_LENGTH, header::HeaderValue::from(len));
    }
    Ok(response)
}
