//! Supported conversions and their availability on this host.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use nb_convert::{Availability, Capability, SUPPORT_MATRIX};

use crate::context::AppContext;

/// One row of the support matrix.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ConversionEntry {
    pub capability: String,
    pub input_formats: Vec<&'static str>,
    pub output_formats: Vec<&'static str>,
    pub available: bool,
}

/// Availability of one capability.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CapabilityStatus {
    pub capability: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct FormatsResponse {
    pub conversions: Vec<ConversionEntry>,
    pub capabilities: Vec<CapabilityStatus>,
}

/// GET /api/formats
#[utoipa::path(
    get,
    path = "/api/formats",
    responses((status = 200, description = "Support matrix and availability", body = FormatsResponse))
)]
pub async fn list_formats(State(ctx): State<AppContext>) -> Json<FormatsResponse> {
    Json(formats_response(&ctx))
}

pub(crate) fn capability_statuses(ctx: &AppContext) -> Vec<CapabilityStatus> {
    Capability::ALL
        .iter()
        .map(|&cap| {
            let reason = match ctx.registry.availability(cap) {
                Availability::Available => None,
                Availability::Unavailable { reason } => Some(reason.clone()),
            };
            CapabilityStatus {
                capability: cap.to_string(),
                available: reason.is_none(),
                reason,
            }
        })
        .collect()
}

fn formats_response(ctx: &AppContext) -> FormatsResponse {
    let conversions = SUPPORT_MATRIX
        .iter()
        .map(|route| ConversionEntry {
            capability: route.capability.to_string(),
            input_formats: route.sources.to_vec(),
            output_formats: route.targets.to_vec(),
            available: ctx.registry.is_available(route.capability),
        })
        .collect();

    FormatsResponse {
        conversions,
        capabilities: capability_statuses(ctx),
    }
}
