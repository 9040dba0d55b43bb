//! Error types shared across Reelcut crates.

use std::path::PathBuf;

/// Top-level error type for Reelcut operations.
///
/// Probe and locator-tier failures are absorbed by the render pipeline and
/// degrade to defaults; graph-construction and encode failures are returned
/// to the caller verbatim.
#[derive(Debug, thiserror::Error)]
pub enum ReelcutError {
    #[error("Probe error: {message}")]
    Probe { message: String },

    #[error("Subject locator tier '{tier}' failed: {message}")]
    LocatorTier { tier: String, message: String },

    #[error("Graph construction error: {message}")]
    GraphConstruction { message: String },

    #[error("Encode error: {message}: {diagnostics}")]
    Encode {
        message: String,
        diagnostics: String,
    },

    #[error("Failed to remove temporary file {path}: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Render cancelled")]
    Cancelled,

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ReelcutError.
pub type ReelcutResult<T> = Result<T, ReelcutError>;

impl ReelcutError {
    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe {
            message: msg.into(),
        }
    }

    pub fn locator_tier(tier: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::LocatorTier {
            tier: tier.into(),
            message: msg.into(),
        }
    }

    pub fn graph(msg: impl Into<String>) -> Self {
        Self::GraphConstruction {
            message: msg.into(),
        }
    }

    pub fn encode(msg: impl Into<String>, diagnostics: impl Into<String>) -> Self {
        Self::Encode {
            message: msg.into(),
            diagnostics: diagnostics.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether a job queue may reasonably retry the failed render.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Encode { .. } | Self::Io(_) | Self::Probe { .. } => true,
            Self::LocatorTier { .. } | Self::Cleanup { .. } => true,
            Self::GraphConstruction { .. }
            | Self::Cancelled
            | Self::Config { .. }
            | Self::FileNotFound { .. }
            | Self::Json(_)
            | Self::Other(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(ReelcutError::encode("ffmpeg exited with 1", "broken pipe").is_retryable());
        assert!(!ReelcutError::graph("trim end must be after trim start").is_retryable());
        assert!(!ReelcutError::config("vision credential missing").is_retryable());
        assert!(!ReelcutError::Cancelled.is_retryable());
    }

    #[test]
    fn test_encode_message_includes_diagnostics() {
        let err = ReelcutError::encode("ffmpeg exited with status 1", "Invalid argument");
        let msg = err.to_string();
        assert!(msg.contains("status 1"));
        assert!(msg.contains("Invalid argument"));
    }
}
