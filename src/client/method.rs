//! Method invocation, synchronous and through the async bridge.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::connection::{parse_target, ServiceConnection};
use crate::bridge::{CallbackSink, Delivery, WaitAbort};
use crate::object::{ManagementObject, Variant};
use crate::types::{
    CallId, ClassName, Error, InvocationConfig, MethodName, ObjectPath, Result, StatusCode,
};

/// Named input parameters for a method call, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MethodParameters {
    values: Vec<(String, Variant)>,
}

impl MethodParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name`, replacing an earlier value (names compare case-insensitively).
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Variant>) {
        let name = name.into();
        let value = value.into();
        match self
            .values
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(slot) => slot.1 = value,
            None => self.values.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Variant>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Variant> {
        self.values
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Variant)> + '_ {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Outcome of an asynchronous invocation that completed successfully.
#[derive(Debug, Clone)]
pub struct CompletionReport {
    pub call_id: CallId,
    pub status: StatusCode,
    pub batches: usize,
    pub delivered: usize,
    pub error_object: Option<ManagementObject>,
}

/// Issues method calls on one connection.
///
/// Asynchronous calls block the caller until the service reports
/// completion, the configured timeout passes, or the cancellation token
/// fires. In the last two cases the call is cancelled on the service side
/// and the item callback is never invoked again.
pub struct MethodInvoker<'c> {
    connection: &'c ServiceConnection,
    config: InvocationConfig,
    cancel: Option<CancellationToken>,
}

impl<'c> MethodInvoker<'c> {
    pub fn new(connection: &'c ServiceConnection) -> Self {
        Self {
            connection,
            config: connection.config().invocation.clone(),
            cancel: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn invoke(
        &self,
        path: &ObjectPath,
        method: &MethodName,
        in_params: &MethodParameters,
    ) -> Result<Option<ManagementObject>> {
        self.connection.ensure_live("invoke method")?;
        let out = self
            .connection
            .services()
            .exec_method(path, method, in_params)
            .map_err(|code| {
                self.connection
                    .errors()
                    .enrich(Error::method_invocation(format!("{path}::{method}"), code))
            })?;
        tracing::debug!(%path, %method, has_output = out.is_some(), "method executed");
        Ok(out)
    }

    /// Start `method` asynchronously and wait for its completion.
    ///
    /// Every delivered object reaches `on_item` before this returns.
    ///
    /// Start and completion failures are `MethodInvocation` errors. Giving up
    /// on the wait is reported by its own kind so callers can tell it apart
    /// from a service failure: `Timeout` once `invocation.timeout` elapses,
    /// `Cancelled` once the cancellation token fires. In both cases the call
    /// is cancelled on the service and the sink refuses further deliveries.
    pub fn invoke_with<F>(
        &self,
        path: &ObjectPath,
        method: &MethodName,
        in_params: &MethodParameters,
        on_item: F,
    ) -> Result<CompletionReport>
    where
        F: FnMut(&Delivery<'_>) + Send + 'static,
    {
        self.connection.ensure_live("invoke method")?;
        let call_id = CallId::new();
        let span = tracing::info_span!("invoke_async", %call_id, %path, %method);
        let _entered = span.enter();

        let services = self.connection.services();
        let errors = self.connection.errors();
        let operation = format!("{path}::{method}");

        // The caller's own reference keeps the sink alive for the whole wait.
        let sink = CallbackSink::new(call_id, Box::new(on_item));
        services
            .exec_method_async(path, method, in_params, Arc::clone(&sink))
            .map_err(|code| {
                tracing::warn!(%code, "asynchronous call was not started");
                errors.enrich(Error::method_invocation(operation.clone(), code))
            })?;

        let waited = sink.wait(
            self.config.timeout,
            self.cancel.as_ref(),
            self.config.cancel_poll_interval,
        );
        let completion = match waited {
            Ok(completion) => completion,
            Err(abort) => {
                sink.close();
                if let Err(code) = services.cancel_async_call(&sink) {
                    tracing::warn!(%code, "service refused cancellation");
                }
                return Err(match abort {
                    WaitAbort::TimedOut => Error::timeout(format!(
                        "{operation} after {:?}",
                        self.config.timeout.unwrap_or_default()
                    )),
                    WaitAbort::Cancelled => Error::cancelled(operation),
                });
            }
        };

        if completion.status.is_failure() {
            let err = Error::method_invocation(operation, completion.status);
            let detail = completion
                .error_object
                .as_ref()
                .and_then(|detail| detail.get("Description").ok())
                .and_then(|value| value.coerce_to_string());
            return Err(match detail {
                Some(description) => err.with_message(description),
                None => errors.enrich(err),
            });
        }

        tracing::info!(
            batches = completion.batches,
            delivered = completion.delivered,
            "asynchronous call completed"
        );
        Ok(CompletionReport {
            call_id,
            status: completion.status,
            batches: completion.batches,
            delivered: completion.delivered,
            error_object: completion.error_object,
        })
    }
}

impl fmt::Debug for MethodInvoker<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodInvoker")
            .field("namespace", self.connection.namespace())
            .field("config", &self.config)
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

/// A prepared call: the method's declared input parameters are known, so
/// arguments are checked as they are set.
#[derive(Debug)]
pub struct Method<'c> {
    connection: &'c ServiceConnection,
    class: ClassName,
    method: MethodName,
    target: ObjectPath,
    accepted: Vec<String>,
    params: MethodParameters,
}

impl<'c> Method<'c> {
    pub(crate) fn prepare(connection: &'c ServiceConnection, class: &str, method: &str) -> Result<Self> {
        let class_name = ClassName::new(class).map_err(|reason| {
            Error::query(format!("prepare method: {reason}"), StatusCode::INVALID_CLASS)
        })?;
        let (target, method) = parse_target(class, method)?;
        let class = class_name;

        let definition = connection.get_object(class.as_str())?;
        let signature = definition
            .inner()
            .method_signature(method.as_str())
            .map_err(|code| {
                connection
                    .errors()
                    .enrich(Error::method_invocation(format!("{class}::{method}"), code))
            })?;
        let accepted = match signature {
            Some(signature) => signature.property_names()?.to_vec(),
            None => Vec::new(),
        };

        Ok(Self {
            connection,
            class,
            method,
            target,
            accepted,
            params: MethodParameters::new(),
        })
    }

    /// Call on an instance instead of the class itself.
    pub fn with_target(mut self, object_path: &str) -> Result<Self> {
        self.target = ObjectPath::new(object_path).map_err(|reason| {
            Error::method_invocation(format!("target: {reason}"), StatusCode::INVALID_PARAMETER)
        })?;
        Ok(self)
    }

    /// Set an input parameter. The method must declare it.
    pub fn set(&mut self, name: &str, value: impl Into<Variant>) -> Result<&mut Self> {
        if !self.accepted.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            return Err(Error::method_invocation(
                format!("{}::{} has no parameter {name}", self.class, self.method),
                StatusCode::INVALID_METHOD_PARAMETERS,
            ));
        }
        self.params.set(name, value);
        Ok(self)
    }

    pub fn parameters(&self) -> &MethodParameters {
        &self.params
    }

    pub fn exec(&self) -> Result<Option<ManagementObject>> {
        self.connection
            .invoker()
            .invoke(&self.target, &self.method, &self.params)
    }

    pub fn exec_with<F>(&self, on_item: F) -> Result<CompletionReport>
    where
        F: FnMut(&Delivery<'_>) + Send + 'static,
    {
        self.connection
            .invoker()
            .invoke_with(&self.target, &self.method, &self.params, on_item)
    }
}
