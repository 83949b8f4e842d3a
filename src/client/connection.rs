//! Connection to one namespace of the remote service.

use std::fmt;
use std::sync::Arc;

use super::enumerator::{ClassInstanceEnumerator, ResettableInstances};
use super::method::{CompletionReport, Method, MethodInvoker, MethodParameters};
use crate::backend::{EnumFlags, Services};
use crate::bridge::Delivery;
use crate::object::ManagementObject;
use crate::runtime::{ErrorCategory, ProcessContext};
use crate::types::{
    ClassName, Config, Error, MethodName, NamespacePath, ObjectPath, Result, StatusCode,
};

/// Authorized connection handle to a namespace.
///
/// The call-authorization profile is applied before `connect` returns; a
/// handle whose profile could not be applied is dropped, never handed out.
pub struct ServiceConnection {
    context: Arc<ProcessContext>,
    namespace: NamespacePath,
    services: Arc<dyn Services>,
    config: Config,
}

impl ServiceConnection {
    /// Resolve `namespace` and authorize the resulting handle.
    ///
    /// Fails with `Connection` if the namespace cannot be reached and with
    /// `Security` if the authorization profile is rejected.
    pub fn connect(context: &Arc<ProcessContext>, namespace: &str, config: &Config) -> Result<Self> {
        context.ensure_live("connect")?;
        let errors = context.errors();

        let namespace = NamespacePath::new(namespace).map_err(|reason| {
            Error::connection(format!("connect: {reason}"), StatusCode::INVALID_NAMESPACE)
        })?;

        let locator = context
            .platform()
            .create_locator()
            .map_err(|code| errors.enrich(Error::connection("create locator", code)))?;

        let services = locator.connect_server(&namespace).map_err(|code| {
            errors.enrich(Error::connection(format!("connect to {namespace}"), code))
        })?;

        if let Err(code) = services.set_call_authorization(&config.authorization) {
            tracing::warn!(%namespace, %code, "call authorization rejected");
            return Err(errors.enrich(Error::security(
                format!("authorize connection to {namespace}"),
                code,
            )));
        }

        tracing::info!(%namespace, "connected");
        Ok(Self {
            context: Arc::clone(context),
            namespace,
            services,
            config: config.clone(),
        })
    }

    pub fn namespace(&self) -> &NamespacePath {
        &self.namespace
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn context(&self) -> &Arc<ProcessContext> {
        &self.context
    }

    pub(crate) fn services(&self) -> &Arc<dyn Services> {
        &self.services
    }

    pub(crate) fn errors(&self) -> &ErrorCategory {
        self.context.errors()
    }

    /// Refuse work once the runtime behind this connection was released.
    pub(crate) fn ensure_live(&self, operation: &str) -> Result<()> {
        self.context.ensure_live(operation)
    }

    pub(crate) fn enum_flags(&self) -> EnumFlags {
        EnumFlags::from(&self.config.enumeration)
    }

    /// Retrieve a single object (class definition or keyed instance).
    pub fn get_object(&self, path: &str) -> Result<ManagementObject> {
        self.ensure_live("get object")?;
        let path = ObjectPath::new(path)
            .map_err(|reason| Error::query(format!("get object: {reason}"), StatusCode::INVALID_PARAMETER))?;
        self.services
            .get_object(&path)
            .map_err(|code| self.errors().enrich(Error::query(format!("get object {path}"), code)))
    }

    /// Lazy, single-pass enumeration of the instances of `class`. The query
    /// is issued by [`ClassInstanceEnumerator::begin`].
    pub fn enumerate_instances(&self, class: &str) -> Result<ClassInstanceEnumerator<'_>> {
        let class = ClassName::new(class).map_err(|reason| {
            Error::query(format!("enumerate instances: {reason}"), StatusCode::INVALID_CLASS)
        })?;
        Ok(ClassInstanceEnumerator::new(self, class))
    }

    /// Enumeration over one shared cursor that is rewound for every pass.
    /// See [`ResettableInstances`] for why this is not the default.
    pub fn resettable_instances(&self, class: &str) -> Result<ResettableInstances<'_>> {
        let class = ClassName::new(class).map_err(|reason| {
            Error::query(format!("enumerate instances: {reason}"), StatusCode::INVALID_CLASS)
        })?;
        ResettableInstances::open(self, class)
    }

    /// Prepare a call of `method` declared by `class`.
    pub fn method(&self, class: &str, method: &str) -> Result<Method<'_>> {
        Method::prepare(self, class, method)
    }

    /// Invoker using this connection's invocation settings.
    pub fn invoker(&self) -> MethodInvoker<'_> {
        MethodInvoker::new(self)
    }

    /// Synchronous method call.
    pub fn invoke_method(
        &self,
        object_path: &str,
        method: &str,
        in_params: &MethodParameters,
    ) -> Result<Option<ManagementObject>> {
        let (path, method) = parse_target(object_path, method)?;
        self.invoker().invoke(&path, &method, in_params)
    }

    /// Method call whose results arrive asynchronously, presented as a
    /// blocking call. `on_item` sees every delivered object before this
    /// returns.
    pub fn invoke_method_async<F>(
        &self,
        object_path: &str,
        method: &str,
        in_params: &MethodParameters,
        on_item: F,
    ) -> Result<CompletionReport>
    where
        F: FnMut(&Delivery<'_>) + Send + 'static,
    {
        let (path, method) = parse_target(object_path, method)?;
        self.invoker().invoke_with(&path, &method, in_params, on_item)
    }
}

pub(crate) fn parse_target(object_path: &str, method: &str) -> Result<(ObjectPath, MethodName)> {
    let path = ObjectPath::new(object_path).map_err(|reason| {
        Error::method_invocation(format!("invoke: {reason}"), StatusCode::INVALID_PARAMETER)
    })?;
    let method = MethodName::new(method).map_err(|reason| {
        Error::method_invocation(format!("invoke: {reason}"), StatusCode::INVALID_METHOD)
    })?;
    Ok((path, method))
}

impl fmt::Debug for ServiceConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConnection")
            .field("namespace", &self.namespace)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}
