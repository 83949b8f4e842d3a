//! In-process backend.
//!
//! Holds namespaces, classes and instances in memory, records every call in
//! a journal and lets tests inject failures at each step. Asynchronous
//! methods can complete inline, from a worker thread, or not at all until
//! cancelled.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::{
    CallResult, ClassObject, EnumFlags, Fetched, Locator, Platform, RawArray, RemoteCursor,
    Services, StatusText,
};
use crate::bridge::CallbackSink;
use crate::client::MethodParameters;
use crate::object::{ManagementObject, VarType, Variant};
use crate::runtime::security::{CallAuthorization, SecurityProfile};
use crate::types::{ClassName, MethodName, NamespacePath, ObjectPath, StatusCode};

/// Longest a stalled fetch sleeps before reporting `TIMED_OUT`.
const STALL_CAP: Duration = Duration::from_millis(50);

fn key(name: &str) -> String {
    name.to_ascii_uppercase()
}

fn fail_with(fault: Option<StatusCode>) -> CallResult<()> {
    match fault {
        Some(code) => Err(code),
        None => Ok(()),
    }
}

/// Ordered record of backend calls, shared by everything a platform creates.
#[derive(Debug, Clone, Default)]
struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn record(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }
}

// =============================================================================
// Platform
// =============================================================================

#[derive(Debug, Default, Clone, Copy)]
struct PlatformFaults {
    initialize: Option<StatusCode>,
    security: Option<StatusCode>,
    locator: Option<StatusCode>,
    status_text: Option<StatusCode>,
}

#[derive(Default)]
struct PlatformShared {
    journal: Journal,
    faults: Mutex<PlatformFaults>,
    namespaces: Mutex<HashMap<String, Arc<NamespaceState>>>,
    registered: Mutex<HashMap<String, Arc<dyn Services>>>,
    live: Arc<AtomicUsize>,
}

/// In-memory runtime. Clones share all state.
#[derive(Clone, Default)]
pub struct MemoryPlatform {
    shared: Arc<PlatformShared>,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the namespace at `path`, created on first use.
    pub fn namespace(&self, path: &str) -> MemoryNamespace {
        let state = self
            .shared
            .namespaces
            .lock()
            .entry(key(path))
            .or_default()
            .clone();
        MemoryNamespace { state }
    }

    /// Serve `namespace` with `services` instead of the in-memory store.
    pub fn register_services(&self, namespace: NamespacePath, services: Arc<dyn Services>) {
        self.shared
            .registered
            .lock()
            .insert(key(namespace.as_str()), services);
    }

    pub fn journal(&self) -> Vec<String> {
        self.shared.journal.0.lock().clone()
    }

    /// Journal entries whose first word is `call`.
    pub fn count(&self, call: &str) -> usize {
        self.shared
            .journal
            .0
            .lock()
            .iter()
            .filter(|entry| entry.split_whitespace().next() == Some(call))
            .count()
    }

    pub fn fail_initialize(&self, code: Option<StatusCode>) {
        self.shared.faults.lock().initialize = code;
    }

    pub fn fail_security(&self, code: Option<StatusCode>) {
        self.shared.faults.lock().security = code;
    }

    pub fn fail_locator(&self, code: Option<StatusCode>) {
        self.shared.faults.lock().locator = code;
    }

    pub fn fail_status_text(&self, code: Option<StatusCode>) {
        self.shared.faults.lock().status_text = code;
    }

    /// Connection handles handed out by `connect_server` and not yet dropped.
    pub fn live_connections(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    fn faults(&self) -> PlatformFaults {
        *self.shared.faults.lock()
    }
}

impl Platform for MemoryPlatform {
    fn initialize(&self) -> CallResult<()> {
        self.shared.journal.record("initialize");
        fail_with(self.faults().initialize)
    }

    fn initialize_security(&self, _profile: &SecurityProfile) -> CallResult<()> {
        self.shared.journal.record("initialize_security");
        fail_with(self.faults().security)
    }

    fn uninitialize(&self) {
        self.shared.journal.record("uninitialize");
    }

    fn create_locator(&self) -> CallResult<Box<dyn Locator>> {
        fail_with(self.faults().locator)?;
        Ok(Box::new(MemoryLocator {
            shared: Arc::clone(&self.shared),
        }))
    }

    fn create_status_text(&self) -> CallResult<Box<dyn StatusText>> {
        self.shared.journal.record("create_status_text");
        fail_with(self.faults().status_text)?;
        Ok(Box::new(MemoryStatusText))
    }
}

impl fmt::Debug for MemoryPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryPlatform")
            .field("namespaces", &self.shared.namespaces.lock().len())
            .field("journal", &self.shared.journal.0.lock().len())
            .field("live_connections", &self.live_connections())
            .finish()
    }
}

struct MemoryLocator {
    shared: Arc<PlatformShared>,
}

impl Locator for MemoryLocator {
    fn connect_server(&self, namespace: &NamespacePath) -> CallResult<Arc<dyn Services>> {
        self.shared
            .journal
            .record(format!("connect_server {namespace}"));

        let key = key(namespace.as_str());
        if let Some(services) = self.shared.registered.lock().get(&key) {
            return Ok(Arc::clone(services));
        }
        let state = self
            .shared
            .namespaces
            .lock()
            .get(&key)
            .cloned()
            .ok_or(StatusCode::INVALID_NAMESPACE)?;

        self.shared.live.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryServices {
            namespace: state,
            journal: self.shared.journal.clone(),
            authorized: AtomicBool::new(false),
            live: Arc::clone(&self.shared.live),
        }))
    }
}

struct MemoryStatusText;

impl StatusText for MemoryStatusText {
    fn text(&self, code: StatusCode) -> CallResult<String> {
        let text = match code {
            StatusCode::OK => "The operation completed successfully.",
            StatusCode::FAILED => "Generic failure",
            StatusCode::NOT_FOUND => "Not found",
            StatusCode::ACCESS_DENIED => "Access denied",
            StatusCode::TYPE_MISMATCH => "Type mismatch",
            StatusCode::INVALID_PARAMETER => "Invalid parameter",
            StatusCode::INVALID_NAMESPACE => "Invalid namespace",
            StatusCode::INVALID_CLASS => "Invalid class",
            StatusCode::TRANSPORT_FAILURE => "Transport failure",
            StatusCode::INVALID_METHOD => "Invalid method",
            StatusCode::INVALID_METHOD_PARAMETERS => "Invalid method Parameter(s)",
            StatusCode::CALL_CANCELLED => "Call cancelled",
            StatusCode::E_FAIL => "Unspecified error",
            _ => return Err(StatusCode::NOT_FOUND),
        };
        Ok(format!("{text}\r\n"))
    }
}

// =============================================================================
// Namespaces
// =============================================================================

#[derive(Debug, Default)]
struct NamespaceFaults {
    authorization: Option<StatusCode>,
    enumeration: HashMap<String, StatusCode>,
    fetch: HashMap<String, (usize, StatusCode)>,
    stalled: HashSet<String>,
    oversized: HashSet<String>,
}

#[derive(Default)]
struct NamespaceState {
    classes: Mutex<HashMap<String, Arc<MemoryClass>>>,
    instances: Mutex<Vec<ManagementObject>>,
    faults: Mutex<NamespaceFaults>,
    /// Asynchronous calls waiting for `cancel_async_call`.
    pending: Mutex<Vec<Arc<CallbackSink>>>,
}

impl NamespaceState {
    fn class(&self, name: &str) -> Option<Arc<MemoryClass>> {
        self.classes.lock().get(&key(name)).cloned()
    }
}

/// Handle for populating a namespace and injecting faults into it.
#[derive(Clone)]
pub struct MemoryNamespace {
    state: Arc<NamespaceState>,
}

impl MemoryNamespace {
    pub fn add_class(&self, class: MemoryClass) -> &Self {
        self.state
            .classes
            .lock()
            .insert(key(&class.name), Arc::new(class));
        self
    }

    pub fn add_instance(&self, object: MemoryObject) -> &Self {
        self.state.instances.lock().push(object.into_handle());
        self
    }

    pub fn fail_authorization(&self, code: Option<StatusCode>) -> &Self {
        self.state.faults.lock().authorization = code;
        self
    }

    pub fn fail_enumeration(&self, class: &str, code: Option<StatusCode>) -> &Self {
        let mut faults = self.state.faults.lock();
        match code {
            Some(code) => faults.enumeration.insert(key(class), code),
            None => faults.enumeration.remove(&key(class)),
        };
        self
    }

    /// Fail the fetch that would return the instance at `position`.
    pub fn fail_fetch(&self, class: &str, position: usize, code: StatusCode) -> &Self {
        self.state
            .faults
            .lock()
            .fetch
            .insert(key(class), (position, code));
        self
    }

    /// Fetches return nothing with `TIMED_OUT`.
    pub fn stall_fetches(&self, class: &str, stalled: bool) -> &Self {
        let mut faults = self.state.faults.lock();
        if stalled {
            faults.stalled.insert(key(class));
        } else {
            faults.stalled.remove(&key(class));
        }
        self
    }

    /// Fetches return one object more than requested.
    pub fn oversize_fetches(&self, class: &str, oversized: bool) -> &Self {
        let mut faults = self.state.faults.lock();
        if oversized {
            faults.oversized.insert(key(class));
        } else {
            faults.oversized.remove(&key(class));
        }
        self
    }

    pub fn pending_calls(&self) -> usize {
        self.state.pending.lock().len()
    }
}

impl fmt::Debug for MemoryNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryNamespace")
            .field("classes", &self.state.classes.lock().len())
            .field("instances", &self.state.instances.lock().len())
            .field("pending_calls", &self.pending_calls())
            .finish()
    }
}

// =============================================================================
// Services
// =============================================================================

struct MemoryServices {
    namespace: Arc<NamespaceState>,
    journal: Journal,
    authorized: AtomicBool,
    live: Arc<AtomicUsize>,
}

impl MemoryServices {
    fn require_authorization(&self) -> CallResult<()> {
        if self.authorized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StatusCode::ACCESS_DENIED)
        }
    }

    /// Class and method addressed by an object path such as `Job` or `Job.Id=1`.
    fn resolve_method(
        &self,
        path: &ObjectPath,
        method: &MethodName,
        in_params: &MethodParameters,
    ) -> CallResult<MemoryMethod> {
        let relative = path.as_str().rsplit(':').next().unwrap_or_default();
        let class_name = relative.split('.').next().unwrap_or_default();
        let class = self
            .namespace
            .class(class_name)
            .ok_or(StatusCode::INVALID_CLASS)?;
        let found = class
            .method(method.as_str())
            .ok_or(StatusCode::INVALID_METHOD)?;

        let undeclared = in_params
            .iter()
            .any(|(name, _)| !found.params.iter().any(|p| p.eq_ignore_ascii_case(name)));
        if undeclared {
            return Err(StatusCode::INVALID_METHOD_PARAMETERS);
        }
        Ok(found.clone())
    }
}

impl Drop for MemoryServices {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Services for MemoryServices {
    fn set_call_authorization(&self, authorization: &CallAuthorization) -> CallResult<()> {
        self.journal.record(format!(
            "set_call_authorization {}/{}/{}",
            authorization.authentication_service.as_str(),
            authorization.authentication_level.as_str(),
            authorization.impersonation_level.as_str(),
        ));
        fail_with(self.namespace.faults.lock().authorization)?;
        self.authorized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn get_object(&self, path: &ObjectPath) -> CallResult<ManagementObject> {
        self.journal.record(format!("get_object {path}"));
        self.require_authorization()?;

        if let Some(class) = self.namespace.class(path.as_str()) {
            return Ok(ManagementObject::new(Arc::new(ClassDefinition(class))));
        }
        self.namespace
            .instances
            .lock()
            .iter()
            .find(|object| {
                object
                    .path()
                    .is_some_and(|p| p.eq_ignore_ascii_case(path.as_str()))
            })
            .cloned()
            .ok_or(StatusCode::NOT_FOUND)
    }

    fn create_instance_enum(
        &self,
        class: &ClassName,
        flags: EnumFlags,
    ) -> CallResult<Box<dyn RemoteCursor>> {
        self.journal.record(format!(
            "create_instance_enum {class} 0x{:X}",
            flags.bits()
        ));
        self.require_authorization()?;
        if let Some(code) = self.namespace.faults.lock().enumeration.get(&key(class.as_str())) {
            return Err(*code);
        }
        if self.namespace.class(class.as_str()).is_none() {
            return Err(StatusCode::INVALID_CLASS);
        }

        let items = self
            .namespace
            .instances
            .lock()
            .iter()
            .filter(|object| object.class_name().eq_ignore_ascii_case(class.as_str()))
            .cloned()
            .collect();
        Ok(Box::new(MemoryCursor {
            class: class.to_string(),
            items,
            position: 0,
            namespace: Arc::clone(&self.namespace),
            journal: self.journal.clone(),
        }))
    }

    fn exec_method(
        &self,
        path: &ObjectPath,
        method: &MethodName,
        in_params: &MethodParameters,
    ) -> CallResult<Option<ManagementObject>> {
        self.journal.record(format!("exec_method {path} {method}"));
        self.require_authorization()?;
        let found = self.resolve_method(path, method, in_params)?;
        fail_with(found.start_failure)?;
        if found.status.is_failure() {
            return Err(found.status);
        }

        let out = found
            .outs
            .iter()
            .fold(
                MemoryObject::new("__PARAMETERS").with("ReturnValue", 0i32),
                |out, (name, value)| out.with(name.clone(), value.clone()),
            );
        Ok(Some(out.into_handle()))
    }

    fn exec_method_async(
        &self,
        path: &ObjectPath,
        method: &MethodName,
        in_params: &MethodParameters,
        sink: Arc<CallbackSink>,
    ) -> CallResult<()> {
        self.journal
            .record(format!("exec_method_async {path} {method}"));
        self.require_authorization()?;
        let found = self.resolve_method(path, method, in_params)?;
        fail_with(found.start_failure)?;

        match found.dispatch {
            Dispatch::Inline => found.run(&sink, Duration::ZERO),
            Dispatch::Threaded(delay) => {
                thread::spawn(move || found.run(&sink, delay));
            }
            Dispatch::Never => self.namespace.pending.lock().push(sink),
        }
        Ok(())
    }

    fn cancel_async_call(&self, sink: &Arc<CallbackSink>) -> CallResult<()> {
        self.journal.record("cancel_async_call");
        let cancelled = {
            let mut pending = self.namespace.pending.lock();
            let index = pending.iter().position(|p| Arc::ptr_eq(p, sink));
            index.map(|index| pending.swap_remove(index))
        };
        match cancelled {
            Some(sink) => {
                sink.deliver_completion(StatusCode::CALL_CANCELLED, None);
                Ok(())
            }
            None => Err(StatusCode::NOT_FOUND),
        }
    }
}

struct MemoryCursor {
    class: String,
    items: Vec<ManagementObject>,
    position: usize,
    namespace: Arc<NamespaceState>,
    journal: Journal,
}

impl RemoteCursor for MemoryCursor {
    fn next(&mut self, timeout: Option<Duration>, count: u32) -> CallResult<Fetched> {
        self.journal.record(format!("next {}", self.class));

        let class = key(&self.class);
        let (failure, stalled, oversized) = {
            let faults = self.namespace.faults.lock();
            (
                faults.fetch.get(&class).copied(),
                faults.stalled.contains(&class),
                faults.oversized.contains(&class),
            )
        };

        if let Some((position, code)) = failure {
            if position == self.position {
                return Err(code);
            }
        }
        if stalled {
            thread::sleep(timeout.unwrap_or(STALL_CAP).min(STALL_CAP));
            return Ok(Fetched {
                objects: Vec::new(),
                status: StatusCode::TIMED_OUT,
            });
        }

        let wanted = count as usize + usize::from(oversized);
        let end = (self.position + wanted).min(self.items.len());
        let objects = self.items[self.position..end].to_vec();
        self.position = end;

        let status = if objects.len() < count as usize {
            StatusCode::FALSE
        } else {
            StatusCode::OK
        };
        Ok(Fetched { objects, status })
    }

    fn reset(&mut self) -> CallResult<()> {
        self.journal.record(format!("reset {}", self.class));
        self.position = 0;
        Ok(())
    }
}

impl Drop for MemoryCursor {
    fn drop(&mut self) {
        self.journal.record(format!("cursor_released {}", self.class));
    }
}

// =============================================================================
// Classes and methods
// =============================================================================

/// How an asynchronous method reports its results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dispatch {
    /// Batches and completion are delivered before `exec_method_async` returns.
    #[default]
    Inline,
    /// Delivered from a worker thread, pausing before each batch.
    Threaded(Duration),
    /// Never delivered; the call completes only through `cancel_async_call`.
    Never,
}

/// A method declared by a [`MemoryClass`].
#[derive(Debug, Clone)]
pub struct MemoryMethod {
    name: String,
    params: Vec<String>,
    outs: Vec<(String, Variant)>,
    batches: Vec<Vec<ManagementObject>>,
    status: StatusCode,
    error_object: Option<ManagementObject>,
    start_failure: Option<StatusCode>,
    dispatch: Dispatch,
}

impl MemoryMethod {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            outs: Vec::new(),
            batches: Vec::new(),
            status: StatusCode::OK,
            error_object: None,
            start_failure: None,
            dispatch: Dispatch::Inline,
        }
    }

    /// Declare an input parameter.
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(name.into());
        self
    }

    /// Add an output parameter to synchronous results.
    pub fn out(mut self, name: impl Into<String>, value: impl Into<Variant>) -> Self {
        self.outs.push((name.into(), value.into()));
        self
    }

    pub fn batch(mut self, objects: Vec<ManagementObject>) -> Self {
        self.batches.push(objects);
        self
    }

    /// Final status of every call.
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn error_object(mut self, object: MemoryObject) -> Self {
        self.error_object = Some(object.into_handle());
        self
    }

    /// Refuse to start calls with `code`.
    pub fn refuse_start(mut self, code: StatusCode) -> Self {
        self.start_failure = Some(code);
        self
    }

    pub fn dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    fn run(&self, sink: &CallbackSink, delay: Duration) {
        for batch in &self.batches {
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            if sink.deliver_batch(batch) != StatusCode::OK {
                break;
            }
        }
        sink.deliver_completion(self.status, self.error_object.clone());
    }
}

/// A class definition with its methods.
#[derive(Debug, Clone)]
pub struct MemoryClass {
    name: String,
    methods: Vec<MemoryMethod>,
}

impl MemoryClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    pub fn with_method(mut self, method: MemoryMethod) -> Self {
        self.methods.push(method);
        self
    }

    fn method(&self, name: &str) -> Option<&MemoryMethod> {
        self.methods
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }
}

/// Class definition as returned by `get_object`.
struct ClassDefinition(Arc<MemoryClass>);

impl ClassObject for ClassDefinition {
    fn class_name(&self) -> &str {
        &self.0.name
    }

    fn path(&self) -> Option<&str> {
        Some(&self.0.name)
    }

    fn get(&self, name: &str) -> CallResult<Variant> {
        if name.eq_ignore_ascii_case("__CLASS") {
            Ok(Variant::from(self.0.name.as_str()))
        } else {
            Err(StatusCode::NOT_FOUND)
        }
    }

    fn names(&self) -> CallResult<Arc<dyn RawArray>> {
        Ok(Arc::new(MemoryArray::new(
            ArrayShape::strings(["__CLASS"]),
            None,
            ArrayLedger::default(),
        )))
    }

    fn method_signature(&self, method: &str) -> CallResult<Option<ManagementObject>> {
        let found = self.0.method(method).ok_or(StatusCode::INVALID_METHOD)?;
        if found.params.is_empty() {
            return Ok(None);
        }
        let signature = found
            .params
            .iter()
            .fold(MemoryObject::new("__PARAMETERS"), |signature, name| {
                signature.with(name.clone(), Variant::Null)
            });
        Ok(Some(signature.into_handle()))
    }
}

// =============================================================================
// Objects and arrays
// =============================================================================

/// Shape of a property-name array, for building malformed ones.
#[derive(Debug, Clone)]
pub struct ArrayShape {
    pub element_type: VarType,
    pub lower_bound: i32,
    pub upper_bound: i32,
    pub data: Vec<Variant>,
}

impl ArrayShape {
    /// Well-formed zero-based string array.
    pub fn strings<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let data: Vec<Variant> = names
            .into_iter()
            .map(|name| Variant::String(name.into()))
            .collect();
        Self {
            element_type: VarType::BSTR,
            lower_bound: 0,
            upper_bound: i32::try_from(data.len()).unwrap_or(i32::MAX),
            data,
        }
    }
}

/// Counts of array lifecycle calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub accessed: usize,
    pub released: usize,
    pub destroyed: usize,
    /// Every access had been released when the array was last destroyed.
    pub released_before_destroy: bool,
}

/// Shared record of what happened to the arrays an object handed out.
#[derive(Debug, Clone, Default)]
pub struct ArrayLedger(Arc<Mutex<LedgerSnapshot>>);

impl ArrayLedger {
    pub fn snapshot(&self) -> LedgerSnapshot {
        *self.0.lock()
    }
}

struct MemoryArray {
    shape: ArrayShape,
    data: Arc<[Variant]>,
    access_failure: Option<StatusCode>,
    ledger: ArrayLedger,
}

impl MemoryArray {
    fn new(shape: ArrayShape, access_failure: Option<StatusCode>, ledger: ArrayLedger) -> Self {
        let data = shape.data.clone().into();
        Self {
            shape,
            data,
            access_failure,
            ledger,
        }
    }
}

impl RawArray for MemoryArray {
    fn element_type(&self) -> CallResult<VarType> {
        Ok(self.shape.element_type)
    }

    fn lower_bound(&self) -> CallResult<i32> {
        Ok(self.shape.lower_bound)
    }

    fn upper_bound(&self) -> CallResult<i32> {
        Ok(self.shape.upper_bound)
    }

    fn access_data(&self) -> CallResult<Arc<[Variant]>> {
        fail_with(self.access_failure)?;
        self.ledger.0.lock().accessed += 1;
        Ok(Arc::clone(&self.data))
    }

    fn unaccess_data(&self) {
        self.ledger.0.lock().released += 1;
    }

    fn destroy(&self) {
        let mut ledger = self.ledger.0.lock();
        ledger.destroyed += 1;
        ledger.released_before_destroy = ledger.accessed == ledger.released;
    }
}

/// Builder for an instance (or embedded object).
#[derive(Debug, Clone)]
pub struct MemoryObject {
    class: String,
    path: Option<String>,
    properties: Vec<(String, Variant)>,
    name_array: Option<ArrayShape>,
    names_failure: Option<StatusCode>,
    access_failure: Option<StatusCode>,
    ledger: ArrayLedger,
}

impl MemoryObject {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            path: None,
            properties: Vec::new(),
            name_array: None,
            names_failure: None,
            access_failure: None,
            ledger: ArrayLedger::default(),
        }
    }

    /// Add a property; declaration order is kept.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Variant>) -> Self {
        self.properties.push((name.into(), value.into()));
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Hand out this array for property names instead of one built from
    /// the declared properties.
    pub fn with_name_array(mut self, shape: ArrayShape) -> Self {
        self.name_array = Some(shape);
        self
    }

    pub fn fail_names(mut self, code: StatusCode) -> Self {
        self.names_failure = Some(code);
        self
    }

    pub fn fail_access(mut self, code: StatusCode) -> Self {
        self.access_failure = Some(code);
        self
    }

    pub fn array_ledger(&self) -> ArrayLedger {
        self.ledger.clone()
    }

    pub fn into_handle(self) -> ManagementObject {
        ManagementObject::new(Arc::new(self))
    }
}

impl ClassObject for MemoryObject {
    fn class_name(&self) -> &str {
        &self.class
    }

    fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    fn get(&self, name: &str) -> CallResult<Variant> {
        self.properties
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
            .ok_or(StatusCode::NOT_FOUND)
    }

    fn names(&self) -> CallResult<Arc<dyn RawArray>> {
        fail_with(self.names_failure)?;
        let shape = match &self.name_array {
            Some(shape) => shape.clone(),
            None => ArrayShape::strings(self.properties.iter().map(|(name, _)| name.clone())),
        };
        Ok(Arc::new(MemoryArray::new(
            shape,
            self.access_failure,
            self.ledger.clone(),
        )))
    }

    fn method_signature(&self, _method: &str) -> CallResult<Option<ManagementObject>> {
        Err(StatusCode::INVALID_METHOD)
    }
}
