// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for Comparator

use thiserror::Error;

/// Result type alias for Comparator operations
pub type Result<T> = std::result::Result<T, ComparatorError>;

/// Comparator error types
#[derive(Error, Debug)]
pub enum ComparatorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("{0} environment variable not set")]
    MissingApiKey(String),

    #[error("Invalid model name: '{0}'")]
    InvalidModel(String),

    #[error("Permission denied by API: {0}")]
    PermissionDenied(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Prompt blocked. Reason: {0}")]
    Blocked(String),

    #[error("Received no content or empty response")]
    EmptyResponse,

    #[error("API returned status {status}: {message}")]
    ApiStatus { status: u16, message: String },

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

impl ComparatorError {
    /// Whether the active model and chat must be dropped after this error.
    pub fn resets_model(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::Blocked(_) | Self::EmptyResponse | Self::InvalidModel(_)
        )
    }

    /// Whether the API key should be treated as unusable after this error.
    pub fn revokes_key(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }
}
