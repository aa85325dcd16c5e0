//! Storage Errors
//!
//! TigerStyle: A missing record is never confused with a broken medium.

use std::fmt;

use thiserror::Error;

use super::user::UserId;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// What part of a medium round trip failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediumFailureKind {
    /// Could not reach or authenticate with the medium
    Connection,
    /// A query or lookup failed
    Read,
    /// An insert, update or delete failed
    Write,
    /// A record could not be encoded or decoded
    Serialization,
}

impl fmt::Display for MediumFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connection => "connection",
            Self::Read => "read",
            Self::Write => "write",
            Self::Serialization => "serialization",
        };
        f.write_str(s)
    }
}

/// Errors surfaced by every storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested id is absent from the medium.
    #[error("user {id} not found")]
    NotFound {
        /// The id that was looked up
        id: UserId,
    },

    /// The medium failed to complete the operation.
    #[error("{kind} failure: {message}")]
    Medium {
        /// Which stage failed
        kind: MediumFailureKind,
        /// Medium-reported detail
        message: String,
    },

    /// The backend selection or its parameters are invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// Record `id` does not exist.
    #[must_use]
    pub fn not_found(id: UserId) -> Self {
        Self::NotFound { id }
    }

    /// The medium could not be reached.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::medium(MediumFailureKind::Connection, message)
    }

    /// A query against the medium failed.
    pub fn read(message: impl Into<String>) -> Self {
        Self::medium(MediumFailureKind::Read, message)
    }

    /// A mutation against the medium failed.
    pub fn write(message: impl Into<String>) -> Self {
        Self::medium(MediumFailureKind::Write, message)
    }

    /// A record failed to encode or decode.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::medium(MediumFailureKind::Serialization, message)
    }

    fn medium(kind: MediumFailureKind, message: impl Into<String>) -> Self {
        Self::Medium {
            kind,
            message: message.into(),
        }
    }

    /// True if the record was absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True if the medium itself failed.
    #[must_use]
    pub fn is_medium_failure(&self) -> bool {
        matches!(self, Self::Medium { .. })
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_distinct_from_medium_failure() {
        let missing = StorageError::not_found(4);
        assert!(missing.is_not_found());
        assert!(!missing.is_medium_failure());
        assert_eq!(missing.to_string(), "user 4 not found");

        let broken = StorageError::connection("refused");
        assert!(broken.is_medium_failure());
        assert!(!broken.is_not_found());
        assert_eq!(broken.to_string(), "connection failure: refused");
    }

    #[test]
    fn test_serde_error_maps_to_serialization() {
        let err: StorageError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(
            err,
            StorageError::Medium {
                kind: MediumFailureKind::Serialization,
                ..
            }
        ));
    }
}
