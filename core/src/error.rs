use std::path::PathBuf;
use thiserror::Error;

/// Failures raised while constructing or synthesizing a resource graph
///
/// All of them are fatal and surface before anything is handed to the provisioning engine.
#[derive(Error, Debug)]
pub enum GraphError {
    /// A required parameter is missing or malformed
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The container build context cannot be used to build the image
    #[error("Build context error at {path:?}: {reason}")]
    BuildContext { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GraphError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        GraphError::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn build_context(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        GraphError::BuildContext {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, GraphError::Configuration { .. })
    }

    pub fn is_build_context(&self) -> bool {
        matches!(self, GraphError::BuildContext { .. })
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
