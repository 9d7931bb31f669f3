//! Conversion capability families.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A family of conversions served by one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Image,
    Document,
    Presentation,
    Audio,
    Spreadsheet,
    Video,
    AudioExtract,
}

impl Capability {
    pub const ALL: [Capability; 7] = [
        Capability::Image,
        Capability::Document,
        Capability::Presentation,
        Capability::Audio,
        Capability::Spreadsheet,
        Capability::Video,
        Capability::AudioExtract,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Document => "document",
            Self::Presentation => "presentation",
            Self::Audio => "audio",
            Self::Spreadsheet => "spreadsheet",
            Self::Video => "video",
            Self::AudioExtract => "audio_extract",
        }
    }

    /// External tool the capability needs, if any.
    pub fn required_tool(&self) -> Option<&'static str> {
        match self {
            Self::Image => None,
            Self::Audio | Self::Video | Self::AudioExtract => Some("ffmpeg"),
            Self::Document | Self::Presentation | Self::Spreadsheet => Some("soffice"),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = nb_core::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| nb_core::Error::Validation(format!("unknown capability '{s}'")))
    }
}
