//! Ingestion error types.

use std::fmt;

use thiserror::Error;

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Source format recognised by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    /// GeoJSON `FeatureCollection` text.
    GeoJson,
    /// Delimited text with a header row.
    Csv,
    /// Arrow IPC file or stream.
    Arrow,
    /// KML (XML) document.
    Kml,
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatKind::GeoJson => write!(f, "GeoJSON"),
            FormatKind::Csv => write!(f, "CSV"),
            FormatKind::Arrow => write!(f, "Arrow"),
            FormatKind::Kml => write!(f, "KML"),
        }
    }
}

/// Ingestion error types.
///
/// The first four variants are the structural failures that abort an
/// ingestion. Record-level defects are never errors; they surface as
/// [`geocluster_core::DecodeWarning`]s.
#[derive(Error, Debug)]
pub enum Error {
    /// Filename extension not handled by any registered parser.
    #[error("unsupported format for '{hint}'")]
    UnsupportedFormat { hint: String },

    /// Top-level structure could not be parsed.
    #[error(
        "malformed {format} input at {}: {message}",
        .location.as_deref().unwrap_or("unknown position")
    )]
    MalformedInput {
        format: FormatKind,
        location: Option<String>,
        message: String,
    },

    /// Tabular input without a resolvable longitude or latitude column.
    #[error("missing required {column} column (found: {})", .available.join(", "))]
    MissingRequiredColumn {
        column: &'static str,
        available: Vec<String>,
    },

    /// Columnar payload corrupt or using an unsupported encoding.
    #[error("decode error: {message}")]
    DecodeError { message: String },

    /// Assignment does not cover the collection it is written with.
    #[error("assignment has {labels} labels for {features} features")]
    LabelMismatch { features: usize, labels: usize },

    /// Acquisition abandoned by the caller.
    #[error("acquisition cancelled")]
    Cancelled,

    /// Background worker thread is gone.
    #[error("cluster worker disconnected")]
    WorkerDisconnected,

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error while writing output.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV serialization error while writing output.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// XML serialization error while writing output.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] geocluster_core::Error),
}

impl Error {
    /// Create a malformed-input error.
    pub fn malformed(
        format: FormatKind,
        location: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::MalformedInput {
            format,
            location,
            message: message.into(),
        }
    }

    /// Create a decode error.
    pub fn decode(message: impl fmt::Display) -> Self {
        Self::DecodeError {
            message: message.to_string(),
        }
    }

    /// True for the structural failures that abort an ingestion.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat { .. }
                | Self::MalformedInput { .. }
                | Self::MissingRequiredColumn { .. }
                | Self::DecodeError { .. }
        )
    }
}
