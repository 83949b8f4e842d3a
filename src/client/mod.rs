//! Client surface: connections, enumeration and method calls.

mod connection;
mod enumerator;
mod method;

pub use connection::ServiceConnection;
pub use enumerator::{ClassInstanceEnumerator, InstanceIter, IterState, ResettableInstances};
pub use method::{CompletionReport, Method, MethodInvoker, MethodParameters};
