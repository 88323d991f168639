//! Domain error types.

/// Top-level error type for ebuiss.
#[derive(Debug, thiserror::Error)]
pub enum EbuissError {
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("alignment error: {reason}")]
    Alignment { reason: String },

    #[error("degenerate input: {reason}")]
    Degenerate { reason: String },

    #[error("unknown strategy: {name}")]
    UnknownStrategy { name: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EbuissError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        EbuissError::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn degenerate(reason: impl Into<String>) -> Self {
        EbuissError::Degenerate {
            reason: reason.into(),
        }
    }
}

impl From<&EbuissError> for std::process::ExitCode {
    fn from(err: &EbuissError) -> Self {
        let code: u8 = match err {
            EbuissError::Io(_) => 1,
            EbuissError::ConfigParse { .. }
            | EbuissError::ConfigMissing { .. }
            | EbuissError::ConfigInvalid { .. } => 2,
            EbuissError::Data { .. } => 3,
            EbuissError::UnknownStrategy { .. } => 4,
            EbuissError::InvalidInput { .. }
            | EbuissError::Alignment { .. }
            | EbuissError::Degenerate { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
