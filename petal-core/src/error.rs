use thiserror::Error;

/// Failure kinds surfaced to clients, mapped onto HTTP statuses and the
/// `X-Reason` header by the server crate.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed or unacceptable input: hash/size/type mismatch, empty body,
    /// duplicate blob, bad query parameters.
    #[error("{0}")]
    BadRequest(String),

    /// Any capability-layer failure.
    #[error("{0}")]
    Unauthorized(String),

    /// The requested descriptor does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Route/verb mismatch.
    #[error("method not allowed")]
    MethodNotAllowed,

    /// A sink failed after compensation ran.
    #[error("{0}")]
    Internal(String),
}

/// Errors from the streaming ingest into the object store.
///
/// The `payload` constructors are client faults (the orchestrator maps them
/// to 400); everything else is a sink fault (500).
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("read error: empty file")]
    EmptyBody,

    #[error("file size mismatch: read {actual} bytes, expected {expected}")]
    SizeMismatch { expected: i64, actual: i64 },

    #[error("file hash mismatch: computed {computed}, expected {expected}")]
    HashMismatch { expected: String, computed: String },

    #[error("invalid file type: detected {detected}, expected {declared}")]
    TypeMismatch { declared: String, detected: String },

    #[error("failed to read file content: {0}")]
    Read(String),

    #[error(transparent)]
    Store(#[from] ObjectStoreError),
}

impl IngestError {
    /// Whether this failure is the client's fault (400) rather than a sink
    /// fault (500).
    pub fn is_payload_fault(&self) -> bool {
        matches!(
            self,
            Self::EmptyBody
                | Self::SizeMismatch { .. }
                | Self::HashMismatch { .. }
                | Self::TypeMismatch { .. }
                | Self::Read(_)
        )
    }
}

/// Errors from individual object-store operations.
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object store operation timed out")]
    Timeout,

    #[error("object store error: {0}")]
    Backend(String),
}

/// Errors from the metadata store.
#[derive(Debug, Error)]
pub enum MetaError {
    /// A record with the same id already exists.
    #[error("a blob with the same hash already exists")]
    Duplicate,

    #[error("metadata operation timed out")]
    Timeout,

    #[error("metadata store error: {0}")]
    Backend(String),
}

/// Errors from the broker publisher.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker publish timed out")]
    Timeout,

    #[error("broker error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_faults_are_classified() {
        assert!(IngestError::EmptyBody.is_payload_fault());
        assert!(
            IngestError::HashMismatch {
                expected: "aa".into(),
                computed: "bb".into()
            }
            .is_payload_fault()
        );
        assert!(!IngestError::Store(ObjectStoreError::Timeout).is_payload_fault());
    }

    #[test]
    fn messages_are_single_phrases() {
        let e = IngestError::SizeMismatch {
            expected: 10,
            actual: 7,
        };
        assert_eq!(e.to_string(), "file size mismatch: read 7 bytes, expected 10");
        assert_eq!(
            MetaError::Duplicate.to_string(),
            "a blob with the same hash already exists"
        );
    }
}
