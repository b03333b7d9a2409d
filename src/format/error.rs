//! Error types for label file operations.

use thiserror::Error;

/// Errors caused by malformed input bytes, unreadable files, or missing
/// required fields.
///
/// Always recoverable by the caller: report, skip the entry, or abort the
/// current operation. A `FormatError` never corrupts coordinator state.
#[derive(Error, Debug)]
pub enum FormatError {
    /// I/O error during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image bytes could not be decoded
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Base64 field could not be decoded
    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Invalid format structure or content
    #[error("invalid format: {message}")]
    InvalidFormat {
        /// Description of the format error
        message: String,
    },

    /// Required field is missing
    #[error("missing required field: {field}")]
    MissingField {
        /// Name of the missing field
        field: String,
    },

    /// A passthrough key collides with a reserved key at encode time.
    /// This guards against programmer error, not bad input data.
    #[error("passthrough key collides with reserved key '{key}'")]
    ReservedKey {
        /// The colliding key
        key: String,
    },

    /// Operation not supported by this format
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
}

impl FormatError {
    /// Create an invalid format error with a message.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Create a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}

/// A label could not be mapped to a class id under a fail-fast legend policy.
///
/// Distinct from [`FormatError`]: the file is fine, the legend configuration
/// is not, and the caller can remediate by supplying or generating a legend.
/// Mid-batch this triggers rollback of the batch's dirty bookkeeping, which a
/// `FormatError` does not.
#[derive(Error, Debug)]
pub enum LegendError {
    /// Label absent from the active legend
    #[error("label '{label}' not found in the active legend")]
    UnknownLabel {
        /// The unresolvable label
        label: String,
    },
}

/// Either error kind a save path can produce.
///
/// Keeping the two kinds distinct lets batch callers tell "stop, no rollback"
/// (`Format`) apart from "stop, roll back batch bookkeeping" (`Legend`).
#[derive(Error, Debug)]
pub enum SaveError {
    /// Malformed data or I/O failure
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Unresolvable label under a fail-fast legend
    #[error(transparent)]
    Legend(#[from] LegendError),
}

impl SaveError {
    /// Whether this error triggers batch rollback.
    pub fn is_legend_error(&self) -> bool {
        matches!(self, SaveError::Legend(_))
    }
}
