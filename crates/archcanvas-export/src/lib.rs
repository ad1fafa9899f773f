//! Exporters that turn a finished diagram into interchange documents.

pub mod drawio;

use std::fmt;
use std::str::FromStr;

use archcanvas_core::config::LayoutConfig;
use archcanvas_core::Diagram;
use thiserror::Error;

pub use drawio::to_drawio;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExportError {
    #[error("unknown export format '{0}' (expected \"drawio\" or \"json\")")]
    UnknownFormat(String),

    #[error("failed to serialize diagram: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write document: {0}")]
    Write(#[from] fmt::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Drawio,
    Json,
}

impl Format {
    pub fn extension(self) -> &'static str {
        match self {
            Format::Drawio => "drawio",
            Format::Json => "json",
        }
    }
}

impl FromStr for Format {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drawio" | "draw.io" | "mxgraph" => Ok(Format::Drawio),
            "json" => Ok(Format::Json),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

/// The diagram verbatim, as pretty-printed JSON.
pub fn to_json(diagram: &Diagram) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(diagram)?)
}

pub fn export(diagram: &Diagram, format: Format, config: &LayoutConfig) -> Result<String, ExportError> {
    tracing::debug!(format = format.extension(), title = %diagram.title, "exporting diagram");
    match format {
        Format::Drawio => to_drawio(diagram, config),
        Format::Json => to_json(diagram),
    }
}
