//! Conversion submission.

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::context::AppContext;
use crate::error::AppError;

/// Query parameters for `POST /api/convert`.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ConvertParams {
    /// Desired output format, e.g. `jpg`. May also be sent as a form field.
    pub target_format: Option<String>,
}

/// Returned as soon as the job is queued.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SubmitResponse {
    pub task_id: String,
}

struct Upload {
    filename: String,
    bytes: Vec<u8>,
}

/// POST /api/convert
#[utoipa::path(
    post,
    path = "/api/convert",
    params(ConvertParams),
    request_body(content_type = "multipart/form-data", description = "Form field `file`"),
    responses(
        (status = 202, description = "Job queued", body = SubmitResponse),
        (status = 400, description = "Malformed upload or target format"),
        (status = 401, description = "Missing or invalid X-API-Key"),
        (status = 413, description = "Upload too large"),
        (status = 429, description = "Rate limit exceeded"),
        (status = 503, description = "Work queue full")
    ),
    security(("api_key" = []))
)]
pub async fn submit_conversion(
    State(ctx): State<AppContext>,
    Query(params): Query<ConvertParams>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let limit = ctx.config.server.max_upload_bytes;
    let mut upload: Option<Upload> = None;
    let mut form_target: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
                upload = Some(Upload {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            Some("target_format") => {
                form_target = Some(field.text().await.map_err(|e| multipart_error(e, limit))?);
            }
            _ => {}
        }
    }

    let upload = upload
        .ok_or_else(|| nb_core::Error::Validation("multipart field `file` is required".into()))?;
    if upload.bytes.len() as u64 > limit {
        return Err(nb_core::Error::PayloadTooLarge { limit }.into());
    }
    let target = params
        .target_format
        .or(form_target)
        .ok_or_else(|| nb_core::Error::Validation("target_format is required".into()))?;

    let id = ctx
        .jobs
        .submit(&upload.bytes, &upload.filename, &target)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            task_id: id.to_string(),
        }),
    ))
}

fn multipart_error(e: MultipartError, limit: u64) -> nb_core::Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        nb_core::Error::PayloadTooLarge { limit }
    } else {
        nb_core::Error::Validation(format!("malformed upload: {}", e.body_text()))
    }
}
