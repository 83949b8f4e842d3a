//! Core types for the access layer.
//!
//! This module provides foundational types used throughout the crate:
//! - **Status codes**: the integer results of remote calls
//! - **IDs**: Strongly-typed names (namespace, class, method, object path)
//! - **Errors**: Application error types with thiserror derives
//! - **Config**: Configuration for security, enumeration and invocation

mod config;
mod errors;
mod ids;
mod status;

pub use config::{
    Config, EnumerationConfig, InvocationConfig, ObservabilityConfig, ReflectionConfig,
};
pub use errors::{Error, ErrorInfo, ErrorKind, Failure, Result};
pub use ids::{CallId, ClassName, MethodName, NamespacePath, ObjectPath};
pub use status::StatusCode;
