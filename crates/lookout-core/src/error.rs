use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookoutError {
    #[error("{kind} '{name}' is invalid: {reason}")]
    Invalid {
        kind: &'static str,
        name: String,
        reason: String,
    },

    #[error("{kind} '{name}' conflicts with '{other}'")]
    Conflict {
        kind: &'static str,
        name: String,
        other: String,
    },

    #[error("failed to parse spec: {0}")]
    Parse(String),

    #[error("{0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{message}")]
    Execution {
        message: String,
        stdout: String,
        stderr: String,
        exit_code: Option<i32>,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to download '{url}': {reason}")]
    Download { url: String, reason: String },

    #[error("home directory not found: set HOME environment variable")]
    HomeNotFound,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl LookoutError {
    /// Stdout and stderr captured before the failure, if any.
    pub fn captured(&self) -> (&str, &str) {
        match self {
            LookoutError::Execution { stdout, stderr, .. } => (stdout, stderr),
            _ => ("", ""),
        }
    }
}

pub type Result<T> = std::result::Result<T, LookoutError>;
