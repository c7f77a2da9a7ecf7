//! Error types and handlers for the fake push pipeline
//!
//! Every failure is terminal: components propagate the first error upward,
//! optionally prefixed with the operation that raised it, and the runner
//! maps the variant to a process exit code.

pub mod handlers;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PusherError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PusherError {
    /// Challenge parsing or token exchange failed
    #[error("Authentication error: {0}")]
    Auth(String),
    /// Manifest could not be fetched or decoded
    #[error("Manifest load error: {0}")]
    ManifestLoad(String),
    /// Registry rejected the signed manifest
    #[error("Manifest push error: {0}")]
    ManifestPush(String),
    /// A layer's v1Compatibility blob is not valid image config JSON
    #[error("Config parse error: {0}")]
    ConfigParse(String),
    /// Blob download or two-phase upload failed
    #[error("Blob transfer error: {0}")]
    BlobTransfer(String),
    /// Key generation or signature computation failed
    #[error("Signing error: {0}")]
    Signing(String),
    /// Neither https nor http answered for a registry
    #[error("Endpoint unreachable: {0}")]
    EndpointUnreachable(String),
    /// Invalid arguments or unreadable credential file
    #[error("Configuration error: {0}")]
    Config(String),
    /// More layers requested than the source manifest holds
    #[error("Layer index {index} out of range: manifest has {count} layers")]
    LayerOutOfRange { index: usize, count: usize },
}

impl PusherError {
    /// Prefix the message with the operation name, keeping the variant.
    pub fn with_context(self, context: &str) -> Self {
        match self {
            PusherError::Auth(msg) => PusherError::Auth(format!("{}: {}", context, msg)),
            PusherError::ManifestLoad(msg) => {
                PusherError::ManifestLoad(format!("{}: {}", context, msg))
            }
            PusherError::ManifestPush(msg) => {
                PusherError::ManifestPush(format!("{}: {}", context, msg))
            }
            PusherError::ConfigParse(msg) => {
                PusherError::ConfigParse(format!("{}: {}", context, msg))
            }
            PusherError::BlobTransfer(msg) => {
                PusherError::BlobTransfer(format!("{}: {}", context, msg))
            }
            PusherError::Signing(msg) => PusherError::Signing(format!("{}: {}", context, msg)),
            PusherError::EndpointUnreachable(msg) => {
                PusherError::EndpointUnreachable(format!("{}: {}", context, msg))
            }
            PusherError::Config(msg) => PusherError::Config(format!("{}: {}", context, msg)),
            other @ PusherError::LayerOutOfRange { .. } => other,
        }
    }

    /// Failures before the pipeline starts exit with 1, pipeline failures with 2.
    pub fn exit_code(&self) -> i32 {
        match self {
            PusherError::Config(_) | PusherError::EndpointUnreachable(_) => 1,
            _ => 2,
        }
    }
}
