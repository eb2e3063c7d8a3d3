//! Domain error types.

/// Top-level error type for indexpool.
#[derive(Debug, thiserror::Error)]
pub enum IndexpoolError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

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

    #[error("{reason}")]
    Validation { reason: String },

    #[error("{what} {id} not found")]
    NotFound { what: &'static str, id: String },

    #[error("csv import error: {reason}")]
    CsvImport { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl IndexpoolError {
    /// Shorthand constructor for caller-fault validation failures.
    pub fn validation(reason: impl Into<String>) -> Self {
        IndexpoolError::Validation {
            reason: reason.into(),
        }
    }

    pub fn not_found(what: &'static str, id: impl ToString) -> Self {
        IndexpoolError::NotFound {
            what,
            id: id.to_string(),
        }
    }

    /// True when the error is the caller's fault rather than an internal failure.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            IndexpoolError::Validation { .. } | IndexpoolError::NotFound { .. }
        )
    }
}

impl From<&IndexpoolError> for std::process::ExitCode {
    fn from(err: &IndexpoolError) -> Self {
        let code: u8 = match err {
            IndexpoolError::Io(_) => 1,
            IndexpoolError::ConfigParse { .. }
            | IndexpoolError::ConfigMissing { .. }
            | IndexpoolError::ConfigInvalid { .. } => 2,
            IndexpoolError::Database { .. } | IndexpoolError::DatabaseQuery { .. } => 3,
            IndexpoolError::Validation { .. } | IndexpoolError::NotFound { .. } => 4,
            IndexpoolError::CsvImport { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_shorthand_formats_reason_only() {
        let err = IndexpoolError::validation("index is not in DRAFT status");
        assert_eq!(err.to_string(), "index is not in DRAFT status");
        assert!(err.is_validation());
    }

    #[test]
    fn not_found_names_the_entity() {
        let err = IndexpoolError::not_found("investment", 42);
        assert_eq!(err.to_string(), "investment 42 not found");
        assert!(err.is_validation());
    }

    #[test]
    fn internal_errors_are_not_validation() {
        let err = IndexpoolError::Database {
            reason: "pool exhausted".into(),
        };
        assert!(!err.is_validation());
    }
}
