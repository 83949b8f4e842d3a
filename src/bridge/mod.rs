//! Asynchronous-delivery to synchronous-call bridge.
//!
//! The service reports results of long-running calls by calling back into a
//! [`CallbackSink`] from its own threads. The invoking thread blocks on the
//! sink's completion primitive and keeps its own strong reference for the
//! entire wait, so the sink cannot be freed before the completion runs.

mod sink;

pub use sink::{BatchCallback, CallbackSink, Completion, Delivery, WaitAbort};
