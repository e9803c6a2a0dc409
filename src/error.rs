//! Error types for the user store.
//!
//! This module defines the unified error enum used throughout the crate. All fallible
//! operations return `Result<T, Error>`. The dispatcher maps these variants to
//! structured response payloads:
//!
//! - `Io` -> error payload (operation failed, not retried)
//! - `CorruptState` -> error payload (persisted file unusable, never auto-reset)
//! - `InvalidArgument` -> error payload (rejected before any store access)
//! - `UnknownOperation` -> error payload (name not in the registry)
//!
//! "Not found" is deliberately absent: the store expresses it in its return
//! types (`Option<User>` / `bool`) and the dispatcher formats it as a normal,
//! distinct, non-error payload.

/// Unified error type for all user-store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O error occurred during a file operation.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted file exists but is not a well-formed JSON collection.
    #[error("corrupt store file: {detail}")]
    CorruptState {
        /// Human-readable description of what failed to parse.
        detail: String,
    },

    /// A request argument is missing or has the wrong primitive type.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation name is not in the dispatcher's registry.
    #[error("unrecognized operation: {name}")]
    UnknownOperation {
        /// The operation name as received from the transport.
        name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_from_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io(_)));
        let msg = err.to_string();
        assert!(msg.contains("I/O error"), "expected 'I/O error' in: {msg}");
    }

    #[test]
    fn io_error_question_mark_coercion() {
        fn fallible() -> Result<(), Error> {
            let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
            Err(io_err)?
        }

        let result = fallible();
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), Error::Io(_)));
    }

    #[test]
    fn corrupt_state_display() {
        let err = Error::CorruptState {
            detail: "expected value at line 1 column 1".into(),
        };
        let msg = err.to_string();
        assert!(
            msg.contains("corrupt store file"),
            "expected 'corrupt store file' in: {msg}"
        );
        assert!(msg.contains("line 1 column 1"), "expected detail in: {msg}");
    }

    #[test]
    fn invalid_argument_display() {
        let err = Error::InvalidArgument("field \"name\" must be a string".into());
        let msg = err.to_string();
        assert!(
            msg.contains("field \"name\" must be a string"),
            "expected argument description in: {msg}"
        );
    }

    #[test]
    fn unknown_operation_display() {
        let err = Error::UnknownOperation {
            name: "dropAllUsers".into(),
        };
        let msg = err.to_string();
        assert!(
            msg.contains("unrecognized operation"),
            "expected 'unrecognized operation' in: {msg}"
        );
        assert!(msg.contains("dropAllUsers"), "expected name in: {msg}");
    }

    #[test]
    fn all_variants_debug_non_empty() {
        let variants: Vec<Error> = vec![
            Error::Io(std::io::Error::other("test")),
            Error::CorruptState {
                detail: "truncated".into(),
            },
            Error::InvalidArgument("empty".into()),
            Error::UnknownOperation { name: "x".into() },
        ];

        for (i, variant) in variants.iter().enumerate() {
            let debug_str = format!("{variant:?}");
            assert!(
                !debug_str.is_empty(),
                "variant {i} produced empty Debug output"
            );
        }
    }
}
