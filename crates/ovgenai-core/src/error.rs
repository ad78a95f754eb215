use thiserror::Error;

use crate::status::{ErrorCategory, StatusCode};

/// Failure to make the native library callable. Raised on first use and
/// cached for the rest of the process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("native library '{library}' not found: {detail}")]
    NotFound { library: String, detail: String },

    #[error("native library '{library}' is not a valid binary for this target: {detail}")]
    BadFormat { library: String, detail: String },

    #[error("native library '{library}' does not export '{symbol}': {detail}")]
    MissingSymbol {
        library: String,
        symbol: String,
        detail: String,
    },

    #[error("failed to load native library '{library}': {detail}")]
    Other { library: String, detail: String },

    #[error("dynamic library loading is unavailable on this target")]
    Unavailable,

    #[error("library search paths can only be configured once, before first use")]
    AlreadyConfigured,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenAiError {
    /// A native call returned a non-`Ok` status.
    #[error("{status} (code {code}): {message}")]
    Status {
        status: StatusCode,
        /// Raw value as returned, kept so unrecognized codes stay visible.
        code: i32,
        message: String,
    },

    #[error("native handle used after dispose")]
    Disposed,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unexpected native output: {0}")]
    UnexpectedOutput(String),

    #[error(transparent)]
    Load(#[from] LoadError),
}

impl GenAiError {
    /// A successful call handed back a null pointer where an object was promised.
    pub fn null_handle(what: &str) -> Self {
        Self::Status {
            status: StatusCode::PtrNull,
            code: StatusCode::PtrNull.as_raw(),
            message: format!("{what} returned a null pointer"),
        }
    }

    /// Categorical code of the failure, if it has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Coarse grouping of the failure. Load failures have none.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            Self::Status { status, .. } => status.category(),
            Self::Disposed | Self::InvalidArgument(_) => Some(ErrorCategory::CallerMisuse),
            Self::UnexpectedOutput(_) => Some(ErrorCategory::BoundaryFault),
            Self::Load(_) => None,
        }
    }

    pub fn is_load_error(&self) -> bool {
        matches!(self, Self::Load(_))
    }
}

pub type Result<T> = std::result::Result<T, GenAiError>;

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn misuse_outside_native_calls_is_caller_misuse() {
        assert_eq!(GenAiError::Disposed.category(), Some(ErrorCategory::CallerMisuse));
        assert_eq!(
            GenAiError::InvalidArgument("nul byte".into()).category(),
            Some(ErrorCategory::CallerMisuse)
        );
        assert_eq!(GenAiError::Disposed.status(), None);
    }

    #[test]
    fn status_errors_use_their_code_category() {
        assert_eq!(
            GenAiError::null_handle("tokenizer").category(),
            Some(ErrorCategory::CallerMisuse)
        );
        assert_eq!(
            GenAiError::UnexpectedOutput("bad shape".into()).category(),
            Some(ErrorCategory::BoundaryFault)
        );
        assert_eq!(GenAiError::from(LoadError::Unavailable).category(), None);
    }
}
