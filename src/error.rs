use thiserror::Error;

// Unified error type for commkit

#[derive(Error, Debug)]
pub enum CommError {
    #[error("out of resources: {0}")]
    OutOfResources(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid value {value:?} for environment variable {var}")]
    InvalidEnv { var: String, value: String },
    #[error("failed to read selector tuning file: {0}")]
    TuningIo(#[from] std::io::Error),
    #[error("malformed selector tuning file: {0}")]
    Tuning(#[from] serde_json::Error),
    #[error("hook `{hook}` failed: {reason}")]
    Hook { hook: String, reason: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("communicator {0} is not registered")]
    NotRegistered(u32),
    /// Also returned for a communicator whose creation failed.
    #[error("communicator {0} is already committed or failed creation")]
    AlreadyCommitted(u32),
}

pub type Result<T> = std::result::Result<T, CommError>;

impl CommError {
    /// Convenience constructor for hook implementations.
    pub fn hook(hook: impl Into<String>, reason: impl Into<String>) -> Self {
        CommError::Hook { hook: hook.into(), reason: reason.into() }
    }
}
