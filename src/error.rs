//! Error types for the pixel stream pipeline.
//!
//! Errors only surface from construction, configuration and frame source
//! operations. The per-cycle update loop never returns them: every failure
//! inside it is logged and degrades to "do nothing this cycle".
//!
//! ## Error Categories
//!
//! - **Source Errors**: the network-side frame source failed or disconnected
//! - **Decode Errors**: a compressed segment could not be decoded
//! - **Segment Errors**: a segment's geometry or payload is inconsistent
//! - **Texture Errors**: uploading decoded pixels to a renderer failed
//! - **Cluster Errors**: the wall-to-wall agreement primitive is unusable
//! - **Config Errors**: invalid or unparseable wall configuration
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use pixelwall::WallError;
//!
//! let error = WallError::source_failed("stream server unreachable");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

use crate::types::StreamId;

/// Result type alias for pipeline operations.
pub type Result<T, E = WallError> = std::result::Result<T, E>;

/// Main error type for the pixel stream pipeline.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum WallError {
    #[error("Frame source failed: {reason}")]
    Source {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Failed to decode segment at ({x}, {y}): {details}")]
    Decode { x: u32, y: u32, details: String },

    #[error("Invalid segment: {details}")]
    InvalidSegment { details: String },

    #[error("Texture upload failed: {reason}")]
    Texture { reason: String },

    #[error("Cluster agreement failed: {reason}")]
    Cluster { reason: String },

    #[error("Invalid configuration: {details}")]
    Config {
        details: String,
        #[source]
        source: Option<serde_yaml_ng::Error>,
    },

    #[error("No pixel stream registered for '{stream}'")]
    StreamNotFound { stream: StreamId },

    #[error("{operation} requires a running tokio runtime")]
    Runtime { operation: String },

    #[error("I/O error: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WallError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            WallError::Source { .. } => true,
            WallError::Decode { .. } => true,
            WallError::Texture { .. } => true,
            WallError::InvalidSegment { .. } => false,
            WallError::Cluster { .. } => false,
            WallError::Config { .. } => false,
            WallError::StreamNotFound { .. } => false,
            WallError::Runtime { .. } => false,
            WallError::Io { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            WallError::Source { .. } => vec![
                "Check the streaming client is still connected",
                "Verify the network path to the stream server",
                "Restart the stream from the client side",
            ],
            WallError::Decode { .. } => vec![
                "Check the client's segment compression settings",
                "Verify segment payloads are not truncated in transit",
                "Send the segment uncompressed",
            ],
            WallError::InvalidSegment { .. } => vec![
                "Check segment geometry against the payload size",
                "Verify the client tiles the full stream extent",
            ],
            WallError::Texture { .. } => vec![
                "Check the rendering backend is still initialised",
                "Verify decoded image dimensions match the segment",
            ],
            WallError::Cluster { .. } => vec![
                "Check every wall process joined the same process group",
                "Restart the wall so all processes rejoin together",
            ],
            WallError::Config { .. } => vec![
                "Check the YAML syntax of the wall configuration",
                "Ensure wall and screen sizes are positive",
            ],
            WallError::StreamNotFound { .. } => vec![
                "Open the stream before addressing it",
                "Check the stream identifier spelling",
            ],
            WallError::Runtime { .. } => vec![
                "Create the pipeline from within a tokio runtime",
                "Pass an explicit runtime handle to the decode executor",
            ],
            WallError::Io { .. } => vec![
                "Check the file exists and is readable",
                "Check file permissions",
            ],
        }
    }

    /// Helper constructor for frame source failures.
    pub fn source_failed(reason: impl Into<String>) -> Self {
        WallError::Source { reason: reason.into(), source: None }
    }

    /// Helper constructor for frame source failures with an underlying cause.
    pub fn source_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        WallError::Source { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for segment decode failures.
    pub fn decode_failed(x: u32, y: u32, details: impl Into<String>) -> Self {
        WallError::Decode { x, y, details: details.into() }
    }

    /// Helper constructor for inconsistent segments.
    pub fn invalid_segment(details: impl Into<String>) -> Self {
        WallError::InvalidSegment { details: details.into() }
    }

    /// Helper constructor for texture upload failures.
    pub fn texture_failed(reason: impl Into<String>) -> Self {
        WallError::Texture { reason: reason.into() }
    }

    /// Helper constructor for cluster agreement failures.
    pub fn cluster_failed(reason: impl Into<String>) -> Self {
        WallError::Cluster { reason: reason.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(details: impl Into<String>) -> Self {
        WallError::Config { details: details.into(), source: None }
    }

    /// Helper constructor for I/O errors with path context.
    pub fn io_error(path: PathBuf, source: std::io::Error) -> Self {
        WallError::Io { path, source }
    }
}

impl From<std::io::Error> for WallError {
    fn from(err: std::io::Error) -> Self {
        WallError::Io { path: PathBuf::from("<unknown>"), source: err }
    }
}

impl From<serde_yaml_ng::Error> for WallError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        WallError::Config { details: err.to_string(), source: Some(err) }
    }
}
