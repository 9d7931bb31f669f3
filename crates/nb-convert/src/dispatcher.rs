//! Routing from (source extension, target format) to a capability.
//!
//! [`route`] is a pure lookup over [`SUPPORT_MATRIX`]. [`Dispatcher`] adds
//! the runtime availability check, which turns a routable pair into
//! [`Error::CapabilityUnavailable`] when its capability is switched off.

use std::sync::Arc;

use nb_core::{Error, Result};

use crate::capability::Capability;
use crate::registry::{Availability, CapabilityRegistry};

/// One row of the support matrix.
#[derive(Debug, Clone, Copy)]
pub struct Route {
    pub capability: Capability,
    pub sources: &'static [&'static str],
    pub targets: &'static [&'static str],
}

const IMAGE_IN: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp", "tiff", "gif"];
const IMAGE_OUT: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp", "tiff"];
const AUDIO_IN: &[&str] = &["mp3", "wav", "ogg", "flac", "aac", "m4a", "wma"];
const AUDIO_OUT: &[&str] = &["mp3", "wav", "ogg", "flac", "aac", "m4a"];
const SHEET_IN: &[&str] = &["csv", "xlsx", "xls"];
const SHEET_OUT: &[&str] = &["csv", "xlsx", "xls", "json", "html"];
const VIDEO_IN: &[&str] = &["mp4", "avi", "mov", "webm", "mkv", "flv"];
const VIDEO_OUT: &[&str] = &["mp4", "avi", "mov", "webm", "gif"];

/// Every supported conversion. Rows never overlap on a (source, target) pair.
pub const SUPPORT_MATRIX: &[Route] = &[
    Route { capability: Capability::Image, sources: IMAGE_IN, targets: IMAGE_OUT },
    Route { capability: Capability::Document, sources: &["pdf"], targets: &["docx"] },
    Route { capability: Capability::Document, sources: &["txt"], targets: &["docx"] },
    Route { capability: Capability::Presentation, sources: &["txt"], targets: &["pptx"] },
    Route { capability: Capability::Document, sources: &["docx"], targets: &["txt"] },
    Route { capability: Capability::Presentation, sources: &["docx"], targets: &["pptx"] },
    Route { capability: Capability::Audio, sources: AUDIO_IN, targets: AUDIO_OUT },
    Route { capability: Capability::Spreadsheet, sources: SHEET_IN, targets: SHEET_OUT },
    Route { capability: Capability::Presentation, sources: &["pptx"], targets: &["txt", "json"] },
    Route { capability: Capability::Video, sources: VIDEO_IN, targets: VIDEO_OUT },
    Route { capability: Capability::AudioExtract, sources: VIDEO_IN, targets: &["mp3", "wav"] },
];

/// Lowercased text after the last `.` of `filename`, or `""` if there is none.
pub fn extension_of(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => String::new(),
    }
}

/// Pure matrix lookup. Both sides are compared case-insensitively.
pub fn route(extension: &str, target: &str) -> Option<Capability> {
    if extension.is_empty() {
        return None;
    }
    let extension = extension.to_ascii_lowercase();
    let target = target.to_ascii_lowercase();
    SUPPORT_MATRIX
        .iter()
        .find(|r| r.sources.contains(&extension.as_str()) && r.targets.contains(&target.as_str()))
        .map(|r| r.capability)
}

/// Resolves conversions against the matrix and the host's capabilities.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<CapabilityRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn shared_registry(&self) -> Arc<CapabilityRegistry> {
        Arc::clone(&self.registry)
    }

    /// Resolve a (source extension, target) pair.
    ///
    /// # Errors
    ///
    /// - [`Error::Unsupported`] if no matrix row covers the pair.
    /// - [`Error::CapabilityUnavailable`] if the row's capability is disabled.
    pub fn resolve(&self, extension: &str, target: &str) -> Result<Capability> {
        let capability = route(extension, target).ok_or_else(|| {
            Error::unsupported(extension.to_ascii_lowercase(), target.to_ascii_lowercase())
        })?;

        match self.registry.availability(capability) {
            Availability::Available => Ok(capability),
            Availability::Unavailable { reason } => Err(Error::CapabilityUnavailable {
                capability: capability.to_string(),
                reason: reason.clone(),
            }),
        }
    }
}
