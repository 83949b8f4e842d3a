//! # wmi-access - Management Service Client Access Layer
//!
//! Client-side access to a remote management/object-query service:
//! - Process runtime setup and teardown with a default security profile
//! - Authorized connections to a namespace
//! - Lazy, forward-only enumeration of class instances
//! - Scoped reflection over an object's property names
//! - Method calls, synchronous or bridged from asynchronous delivery
//! - Status-code translation for error messages
//!
//! ## Architecture
//!
//! ```text
//!   ProcessContext ──► ServiceConnection ──► ClassInstanceEnumerator ──► InstanceIter
//!        │                    │                                              │
//!        │                    └──► MethodInvoker ──► CallbackSink ◄── service threads
//!        │                                                                   │
//!        └── ErrorCategory (status text)          PropertyReflector ◄── ManagementObject
//! ```
//!
//! The remote service is reached only through the traits in [`backend`];
//! [`backend::memory`] implements them in-process.

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod backend;
pub mod bridge;
pub mod client;
pub mod object;
pub mod runtime;
pub mod types;

// Internal utilities
pub mod observability;

pub use client::{
    ClassInstanceEnumerator, CompletionReport, InstanceIter, IterState, Method, MethodInvoker,
    MethodParameters, ResettableInstances, ServiceConnection,
};
pub use object::{ManagementObject, PropertyNameView, PropertyReflector, Variant};
pub use runtime::{ErrorCategory, ProcessContext};
pub use types::{Config, Error, ErrorKind, Result, StatusCode};
