//! Boundary to the remote management service.
//!
//! The access layer talks to the service only through these traits. Every
//! call reports failure as a raw [`StatusCode`]; translating codes into
//! [`crate::Error`] variants is the caller's job, because the same code
//! means different things depending on which step produced it.
//!
//! [`memory`] is an in-process implementation with call journaling and
//! fault injection.

use std::sync::Arc;
use std::time::Duration;

use crate::bridge::CallbackSink;
use crate::client::MethodParameters;
use crate::object::{ManagementObject, VarType, Variant};
use crate::runtime::security::{CallAuthorization, SecurityProfile};
use crate::types::{ClassName, EnumerationConfig, MethodName, NamespacePath, ObjectPath, StatusCode};

pub mod memory;

/// Result of a backend call.
pub type CallResult<T> = std::result::Result<T, StatusCode>;

/// Process-level runtime of the remote-object system.
pub trait Platform: Send + Sync {
    /// Initialize the runtime for the calling scope.
    fn initialize(&self) -> CallResult<()>;

    /// Apply the process-wide default security profile.
    fn initialize_security(&self, profile: &SecurityProfile) -> CallResult<()>;

    /// Tear the runtime down. Paired with a successful `initialize`.
    fn uninitialize(&self);

    fn create_locator(&self) -> CallResult<Box<dyn Locator>>;

    fn create_status_text(&self) -> CallResult<Box<dyn StatusText>>;
}

/// Resolves namespace paths to connection handles.
pub trait Locator: Send + Sync {
    fn connect_server(&self, namespace: &NamespacePath) -> CallResult<Arc<dyn Services>>;
}

/// A connection handle to one namespace.
#[cfg_attr(test, mockall::automock)]
pub trait Services: Send + Sync {
    /// Set the per-call authentication and impersonation profile.
    fn set_call_authorization(&self, authorization: &CallAuthorization) -> CallResult<()>;

    fn get_object(&self, path: &ObjectPath) -> CallResult<ManagementObject>;

    fn create_instance_enum(
        &self,
        class: &ClassName,
        flags: EnumFlags,
    ) -> CallResult<Box<dyn RemoteCursor>>;

    /// Synchronous method execution. Empty `in_params` means none.
    fn exec_method(
        &self,
        path: &ObjectPath,
        method: &MethodName,
        in_params: &MethodParameters,
    ) -> CallResult<Option<ManagementObject>>;

    /// Start a method whose results arrive through `sink`.
    ///
    /// On `Err` the implementation must not retain `sink`. On `Ok` it calls
    /// `sink.deliver_batch` zero or more times and then
    /// `sink.deliver_completion` exactly once, from any thread.
    fn exec_method_async(
        &self,
        path: &ObjectPath,
        method: &MethodName,
        in_params: &MethodParameters,
        sink: Arc<CallbackSink>,
    ) -> CallResult<()>;

    /// Ask the service to abandon a call started with `exec_method_async`.
    fn cancel_async_call(&self, sink: &Arc<CallbackSink>) -> CallResult<()>;
}

/// Remote forward-only cursor over query results.
pub trait RemoteCursor: Send {
    /// Fetch up to `count` objects, waiting at most `timeout` (`None` waits
    /// without bound).
    fn next(&mut self, timeout: Option<Duration>, count: u32) -> CallResult<Fetched>;

    /// Rewind to the first result.
    fn reset(&mut self) -> CallResult<()>;
}

/// Objects returned by one cursor fetch, with the call's success code.
#[derive(Debug, Default)]
pub struct Fetched {
    pub objects: Vec<ManagementObject>,
    pub status: StatusCode,
}

/// One retrieved schema instance or class definition.
pub trait ClassObject: Send + Sync {
    fn class_name(&self) -> &str;

    /// Full object path; class definitions and embedded objects may have none.
    fn path(&self) -> Option<&str>;

    fn get(&self, name: &str) -> CallResult<Variant>;

    /// Fetch a fresh array holding the object's property names. The caller
    /// owns the array and must `destroy` it.
    fn names(&self) -> CallResult<Arc<dyn RawArray>>;

    /// Input-parameter signature of a method declared by this class.
    /// `Ok(None)` for methods without input parameters.
    fn method_signature(&self, method: &str) -> CallResult<Option<ManagementObject>>;
}

/// Bounded one-dimensional array owned by the runtime.
///
/// Bounds are half-open: `upper_bound` is one past the last element.
pub trait RawArray: Send + Sync {
    fn element_type(&self) -> CallResult<VarType>;

    fn lower_bound(&self) -> CallResult<i32>;

    fn upper_bound(&self) -> CallResult<i32>;

    /// Lock the buffer and expose its elements. Paired with `unaccess_data`.
    fn access_data(&self) -> CallResult<Arc<[Variant]>>;

    fn unaccess_data(&self);

    /// Free the backing storage. Called once, after every access is released.
    fn destroy(&self);
}

/// Translates status codes into descriptive text.
#[cfg_attr(test, mockall::automock)]
pub trait StatusText: Send + Sync {
    fn text(&self, code: StatusCode) -> CallResult<String>;
}

/// Flags sent with an instance enumeration request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnumFlags {
    pub forward_only: bool,
    pub return_immediately: bool,
    pub use_amended_qualifiers: bool,
}

impl EnumFlags {
    const RETURN_IMMEDIATELY: u32 = 0x10;
    const FORWARD_ONLY: u32 = 0x20;
    const USE_AMENDED_QUALIFIERS: u32 = 0x2_0000;

    /// Wire representation of the flags.
    pub fn bits(self) -> u32 {
        let mut bits = 0;
        if self.forward_only {
            bits |= Self::FORWARD_ONLY;
        }
        if self.return_immediately {
            bits |= Self::RETURN_IMMEDIATELY;
        }
        if self.use_amended_qualifiers {
            bits |= Self::USE_AMENDED_QUALIFIERS;
        }
        bits
    }
}

impl From<&EnumerationConfig> for EnumFlags {
    fn from(config: &EnumerationConfig) -> Self {
        Self {
            forward_only: config.forward_only,
            return_immediately: config.return_immediately,
            use_amended_qualifiers: config.use_amended_qualifiers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_enumeration_flags() {
        let flags = EnumFlags::from(&EnumerationConfig::default());
        assert!(flags.forward_only);
        assert!(!flags.return_immediately);
        assert_eq!(flags.bits(), 0x2_0020);
    }

    #[test]
    fn test_no_flags() {
        assert_eq!(EnumFlags::default().bits(), 0);
    }
}
