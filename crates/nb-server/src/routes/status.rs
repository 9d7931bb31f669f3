//! Job status polling.

use axum::extract::{Path, State};
use axum::Json;
use serde_json::Value;

use crate::context::AppContext;
use crate::error::AppError;
use crate::jobs::JobView;
use crate::routes::parse_task_id;

/// GET /api/status/{task_id}
///
/// Always 200; the outcome is in `status`.
#[utoipa::path(
    get,
    path = "/api/status/{task_id}",
    params(("task_id" = String, Path, description = "Task ID returned by /api/convert")),
    responses(
        (status = 200, description = "not_found | expired | ready | processing | failed", body = JobView)
    )
)]
pub async fn get_status(
    State(ctx): State<AppContext>,
    Path(task_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let view = match parse_task_id(&task_id) {
        Some(id) => ctx.jobs.status(id).await?,
        None => JobView::NotFound,
    };

    let mut body = serde_json::to_value(&view)
        .map_err(|e| nb_core::Error::Internal(format!("status serialization: {e}")))?;
    if let Value::Object(map) = &mut body {
        map.insert("task_id".into(), Value::String(task_id));
        map.insert("message".into(), Value::String(view.message().to_string()));
    }
    Ok(Json(body))
}
