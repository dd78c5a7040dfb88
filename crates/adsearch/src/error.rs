//! Search engine error types
//!
//! Error definitions with transient/permanent classification; the search
//! executor consults the classification to decide whether a failed exchange
//! is eligible for reconnect-and-retry.

use thiserror::Error;

/// Error that can occur while executing a directory search.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Invalid input when constructing a policy or configuration.
    #[error("invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// Failed to establish a connection (or bind) to the directory server.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The server rejected the bind credentials.
    #[error("authentication failed: invalid credentials")]
    AuthenticationFailed,

    /// Send/receive failure on an established connection.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The directory returned a non-zero operation result code.
    ///
    /// Distinct from a server-side code embedded in a VLV response control,
    /// which is never surfaced as an error (see `VlvSnapshot`).
    #[error("directory operation failed with code {rc}: {text}")]
    Directory { rc: u32, text: String },

    /// A response control was missing or could not be decoded.
    ///
    /// `recoverable` marks whether reissuing the request can help: a paged
    /// search with an ambiguous cookie cannot be safely resumed, while a
    /// windowed query can simply be asked again.
    #[error("protocol parse error: {message}")]
    ProtocolParse { message: String, recoverable: bool },

    /// Result processing failed (caller callback or page merge).
    ///
    /// Always fatal: a partially merged result set is unsafe to resume.
    #[error("processing failed: {message}")]
    Processing {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal error (control encoding and other programming errors).
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl SearchError {
    /// Check if this error is transient and the exchange may be reissued.
    ///
    /// Transient errors are connection-level conditions that a reconnect may
    /// resolve. Anything touching accumulated state or caller input is
    /// permanent.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SearchError::ConnectionFailed { .. }
                | SearchError::Transport { .. }
                | SearchError::Directory { .. }
                | SearchError::ProtocolParse {
                    recoverable: true,
                    ..
                }
        )
    }

    /// Check if this error is permanent and retry won't help.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            SearchError::InvalidParameter { .. } => "INVALID_PARAMETER",
            SearchError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            SearchError::AuthenticationFailed => "AUTH_FAILED",
            SearchError::Transport { .. } => "TRANSPORT_ERROR",
            SearchError::Directory { .. } => "DIRECTORY_ERROR",
            SearchError::ProtocolParse { .. } => "PROTOCOL_PARSE_ERROR",
            SearchError::Processing { .. } => "PROCESSING_FAILED",
            SearchError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    // Convenience constructors

    /// Create an invalid parameter error.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        SearchError::InvalidParameter {
            message: message.into(),
        }
    }

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        SearchError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection failed error with source.
    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        SearchError::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        SearchError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Create a transport error with source.
    pub fn transport_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        SearchError::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a non-recoverable protocol parse error.
    pub fn protocol_parse(message: impl Into<String>) -> Self {
        SearchError::ProtocolParse {
            message: message.into(),
            recoverable: false,
        }
    }

    /// Create a protocol parse error that the retry layer may reissue.
    pub fn protocol_parse_recoverable(message: impl Into<String>) -> Self {
        SearchError::ProtocolParse {
            message: message.into(),
            recoverable: true,
        }
    }

    /// Create a processing error.
    pub fn processing(message: impl Into<String>) -> Self {
        SearchError::Processing {
            message: message.into(),
            source: None,
        }
    }

    /// Create a processing error with source.
    pub fn processing_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        SearchError::Processing {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        SearchError::Internal {
            message: message.into(),
        }
    }
}

/// Result type for search operations.
pub type SearchResult<T> = Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        let transient = vec![
            SearchError::connection_failed("refused"),
            SearchError::transport("broken pipe"),
            SearchError::Directory {
                rc: 51,
                text: "busy".to_string(),
            },
            SearchError::protocol_parse_recoverable("no vlv response control"),
        ];

        for err in transient {
            assert!(
                err.is_transient(),
                "expected {} to be transient",
                err.error_code()
            );
        }
    }

    #[test]
    fn test_permanent_errors() {
        let permanent = vec![
            SearchError::invalid_parameter("count is 0"),
            SearchError::AuthenticationFailed,
            SearchError::protocol_parse("missing paged results control"),
            SearchError::processing("merge failed"),
            SearchError::internal("control encoding failed"),
        ];

        for err in permanent {
            assert!(
                err.is_permanent(),
                "expected {} to be permanent",
                err.error_code()
            );
        }
    }

    #[test]
    fn test_error_display() {
        let err = SearchError::Directory {
            rc: 53,
            text: "unwilling to perform".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "directory operation failed with code 53: unwilling to perform"
        );

        let err = SearchError::invalid_parameter("from is 0 - this API is 1-based");
        assert_eq!(
            err.to_string(),
            "invalid parameter: from is 0 - this API is 1-based"
        );
    }

    #[test]
    fn test_error_with_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "underlying");
        let err = SearchError::transport_with_source("receive failed", io);

        assert!(err.is_transient());
        if let SearchError::Transport { source, .. } = &err {
            assert!(source.is_some());
        } else {
            panic!("expected Transport variant");
        }
    }
}
