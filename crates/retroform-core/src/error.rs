//! Errors for the retroform core.
//!
//! Every failure a caller can observe is one of these variants; services never
//! retry internally except for code generation's bounded loop.

/// Errors that can occur in core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A parent aggregate, or a child identity referenced by an edit, does
    /// not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// A mutation was attempted by someone other than the owner.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Request content failed validation (empty title, empty question text,
    /// malformed edit).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Code generation hit its retry bound without finding a free code.
    #[error("code generation exhausted after {0} attempts")]
    CodeGenerationExhausted(u32),
    /// Underlying SQLite failure.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error is a uniqueness-constraint violation on the given
    /// column (e.g. `"forms.code"`). Used to turn a code-uniqueness race into
    /// a regenerate-and-retry instead of a hard failure.
    pub fn is_unique_violation(&self, column: &str) -> bool {
        match self {
            Error::Storage(rusqlite::Error::SqliteFailure(e, Some(msg))) => {
                e.code == rusqlite::ErrorCode::ConstraintViolation && msg.contains(column)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            Error::NotFound("form code aaaaaaaa".into()).to_string(),
            "not found: form code aaaaaaaa"
        );
        assert_eq!(
            Error::CodeGenerationExhausted(100).to_string(),
            "code generation exhausted after 100 attempts"
        );
    }

    #[test]
    fn test_unique_violation_detection() {
        let err = Error::Storage(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE),
            Some("UNIQUE constraint failed: forms.code".into()),
        ));
        assert!(err.is_unique_violation("forms.code"));
        assert!(!err.is_unique_violation("members.social_id"));
        assert!(!Error::NotFound("x".into()).is_unique_violation("forms.code"));
    }
}
