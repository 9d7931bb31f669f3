//! The conversion seam between job orchestration and format backends.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use nb_core::{Error, Result};

use crate::backends;
use crate::capability::Capability;
use crate::tools::ToolRegistry;

/// A validated conversion: the capability has already been resolved and the
/// output directory exists.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Lowercased source extension.
    pub source_extension: String,
    /// Lowercased target format; also the output file's extension.
    pub target_format: String,
}

/// Performs the byte transformation for one capability.
///
/// Implementations write `request.output` and return `Ok(())`. Whether the
/// file was actually produced is checked by the caller.
#[async_trait]
pub trait Converter: Send + Sync {
    async fn convert(&self, capability: Capability, request: &ConversionRequest) -> Result<()>;
}

/// Converter backed by the `image` crate, ffmpeg and LibreOffice.
#[derive(Debug, Clone)]
pub struct SystemConverter {
    tools: Arc<ToolRegistry>,
}

impl SystemConverter {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl Converter for SystemConverter {
    async fn convert(&self, capability: Capability, request: &ConversionRequest) -> Result<()> {
        let result = match capability {
            Capability::Image => backends::image::convert(request).await,
            Capability::Audio => backends::ffmpeg::convert_audio(&self.tools, request).await,
            Capability::Video => backends::ffmpeg::convert_video(&self.tools, request).await,
            Capability::AudioExtract => backends::ffmpeg::extract_audio(&self.tools, request).await,
            Capability::Document => backends::office::convert_document(&self.tools, request).await,
            Capability::Spreadsheet => {
                backends::office::convert_spreadsheet(&self.tools, request).await
            }
            Capability::Presentation => {
                backends::office::convert_presentation(&self.tools, request).await
            }
        };

        result.map_err(|e| match e {
            Error::ConversionFailed { .. } | Error::Timeout { .. } => e,
            other => Error::conversion(capability, other),
        })
    }
}
