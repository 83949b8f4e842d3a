//! Strongly-typed identifiers.
//!
//! Names crossing the service boundary are validated at construction time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to define a strongly-typed name newtype wrapper.
///
/// Generates: struct, `new()` (rejects empty input), `as_str()`, Display,
/// `TryFrom<&str>`, Serialize, Deserialize.
/// `CallId` is a UUID v4 and built by hand below.
macro_rules! define_name {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Result<Self, &'static str> {
                let s = s.into();
                if s.is_empty() {
                    return Err(concat!(stringify!($name), " cannot be empty"));
                }
                Ok(Self(s))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<&str> for $name {
            type Error = &'static str;

            fn try_from(s: &str) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// Hierarchical namespace path, e.g. `ROOT\CIMV2`.
define_name!(NamespacePath);
// Schema class, e.g. `Win32_BIOS`.
define_name!(ClassName);
define_name!(MethodName);
// Object path: a class name or a keyed instance path.
define_name!(ObjectPath);

impl NamespacePath {
    /// Path segments, split on either separator.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(['\\', '/']).filter(|s| !s.is_empty())
    }
}

/// Identifier attached to one asynchronous invocation for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(uuid::Uuid);

impl CallId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
