//! Application error types.
//!
//! Every failure that crosses the service boundary carries the originating
//! status code plus, when the translator could resolve it, a message.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::status::StatusCode;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// A failed remote (or runtime) call: what was attempted and what it returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub operation: String,
    pub code: StatusCode,
    pub message: Option<String>,
}

impl Failure {
    pub fn new(operation: impl Into<String>, code: StatusCode) -> Self {
        Self {
            operation: operation.into(),
            code,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        self.message = if message.is_empty() {
            None
        } else {
            Some(message)
        };
        self
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {} ({})", self.operation, message, self.code),
            None => write!(f, "{}: {}", self.operation, self.code),
        }
    }
}

/// Error categories, one per failure family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Initialization,
    Connection,
    Security,
    Query,
    TypeMismatch,
    MalformedData,
    MethodInvocation,
    Translation,
    RecursionLimit,
    Exhausted,
    Timeout,
    Cancelled,
    Config,
    Serialization,
    Io,
}

/// Flattened view of a code-carrying error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub code: StatusCode,
    pub message: Option<String>,
}

/// Main error enum for the access layer.
#[derive(Error, Debug)]
pub enum Error {
    /// Runtime, security profile or translator could not be set up.
    #[error("initialization error: {0}")]
    Initialization(Failure),

    /// The namespace could not be resolved to a connection.
    #[error("connection error: {0}")]
    Connection(Failure),

    /// The call-authorization profile could not be applied.
    #[error("security error: {0}")]
    Security(Failure),

    /// Object retrieval, enumeration or property fetch failed.
    #[error("query error: {0}")]
    Query(Failure),

    /// A value or array did not have the expected element type.
    #[error("type mismatch: {0}")]
    TypeMismatch(Failure),

    /// Structurally invalid data (bad bounds, short buffers, oversized batches).
    #[error("malformed data: {0}")]
    MalformedData(Failure),

    /// A method call could not be issued or completed with a failure status.
    #[error("method invocation error: {0}")]
    MethodInvocation(Failure),

    /// A status code could not be translated to text.
    #[error("translation error: {0}")]
    Translation(Failure),

    /// Recursive property traversal went deeper than allowed.
    #[error("recursion limit of {limit} exceeded at {path}")]
    RecursionLimit { limit: usize, path: String },

    /// The enumeration has no current element.
    #[error("enumeration of {0} is exhausted")]
    Exhausted(String),

    /// Waiting for an asynchronous completion timed out.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Waiting for an asynchronous completion was cancelled.
    #[error("operation cancelled: {0}")]
    Cancelled(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Initialization(_) => ErrorKind::Initialization,
            Error::Connection(_) => ErrorKind::Connection,
            Error::Security(_) => ErrorKind::Security,
            Error::Query(_) => ErrorKind::Query,
            Error::TypeMismatch(_) => ErrorKind::TypeMismatch,
            Error::MalformedData(_) => ErrorKind::MalformedData,
            Error::MethodInvocation(_) => ErrorKind::MethodInvocation,
            Error::Translation(_) => ErrorKind::Translation,
            Error::RecursionLimit { .. } => ErrorKind::RecursionLimit,
            Error::Exhausted(_) => ErrorKind::Exhausted,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Cancelled(_) => ErrorKind::Cancelled,
            Error::Config(_) => ErrorKind::Config,
            Error::Serialization(_) => ErrorKind::Serialization,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Error::Initialization(f)
            | Error::Connection(f)
            | Error::Security(f)
            | Error::Query(f)
            | Error::TypeMismatch(f)
            | Error::MalformedData(f)
            | Error::MethodInvocation(f)
            | Error::Translation(f) => Some(f),
            _ => None,
        }
    }

    fn failure_mut(&mut self) -> Option<&mut Failure> {
        match self {
            Error::Initialization(f)
            | Error::Connection(f)
            | Error::Security(f)
            | Error::Query(f)
            | Error::TypeMismatch(f)
            | Error::MalformedData(f)
            | Error::MethodInvocation(f)
            | Error::Translation(f) => Some(f),
            _ => None,
        }
    }

    /// Originating status code, if the error came from a call.
    pub fn code(&self) -> Option<StatusCode> {
        self.failure().map(|f| f.code)
    }

    pub fn info(&self) -> Option<ErrorInfo> {
        self.failure().map(|f| ErrorInfo {
            kind: self.kind(),
            code: f.code,
            message: f.message.clone(),
        })
    }

    /// Attach a resolved message to a code-carrying error. Other errors are
    /// returned untouched.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        if let Some(failure) = self.failure_mut() {
            let message = message.into();
            if !message.is_empty() {
                failure.message = Some(message);
            }
        }
        self
    }
}

// Convenience constructors
impl Error {
    pub fn initialization(operation: impl Into<String>, code: StatusCode) -> Self {
        Self::Initialization(Failure::new(operation, code))
    }

    pub fn connection(operation: impl Into<String>, code: StatusCode) -> Self {
        Self::Connection(Failure::new(operation, code))
    }

    pub fn security(operation: impl Into<String>, code: StatusCode) -> Self {
        Self::Security(Failure::new(operation, code))
    }

    pub fn query(operation: impl Into<String>, code: StatusCode) -> Self {
        Self::Query(Failure::new(operation, code))
    }

    pub fn type_mismatch(operation: impl Into<String>, code: StatusCode) -> Self {
        Self::TypeMismatch(Failure::new(operation, code))
    }

    pub fn malformed_data(operation: impl Into<String>, code: StatusCode) -> Self {
        Self::MalformedData(Failure::new(operation, code))
    }

    pub fn method_invocation(operation: impl Into<String>, code: StatusCode) -> Self {
        Self::MethodInvocation(Failure::new(operation, code))
    }

    pub fn translation(operation: impl Into<String>, code: StatusCode) -> Self {
        Self::Translation(Failure::new(operation, code))
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_display_with_and_without_message() {
        let bare = Failure::new("GetObject", StatusCode::NOT_FOUND);
        assert_eq!(bare.to_string(), "GetObject: 0x80041002");

        let resolved = bare.with_message("Not found");
        assert_eq!(resolved.to_string(), "GetObject: Not found (0x80041002)");
    }

    #[test]
    fn test_empty_message_is_not_recorded() {
        let err = Error::query("Next", StatusCode::FAILED).with_message("");
        assert_eq!(err.failure().unwrap().message, None);
    }

    #[test]
    fn test_info_carries_kind_and_code() {
        let err = Error::type_mismatch("GetNames", StatusCode::UNEXPECTED).with_message("bad");
        let info = err.info().unwrap();
        assert_eq!(info.kind, ErrorKind::TypeMismatch);
        assert_eq!(info.code, StatusCode::UNEXPECTED);
        assert_eq!(info.message.as_deref(), Some("bad"));
    }

    #[test]
    fn test_codeless_errors_have_no_info() {
        let err = Error::timeout("ExecMethodAsync after 10ms");
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.code().is_none());
        assert!(err.info().is_none());
        // with_message leaves codeless errors alone
        assert!(err.with_message("ignored").to_string().starts_with("timeout"));
    }
}
