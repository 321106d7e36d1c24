use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Runtime config block is missing")]
    MissingConfig,

    #[error("Invalid runtime config: {0}")]
    InvalidConfig(#[source] serde_json::Error),

    #[error("Failed to load overlay '{path}': {message}")]
    ArtifactLoad { path: String, message: String },

    #[error("Invalid overlay artifact: {0}")]
    ArtifactParse(#[source] serde_json::Error),
}

impl RuntimeError {
    pub fn artifact_load(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ArtifactLoad {
            path: path.into(),
            message: message.into(),
        }
    }
}
