//! Lazy, forward-only instance enumeration.
//!
//! State machine of an [`InstanceIter`]:
//! ```text
//! CREATED --fetch 1--> HAS_CURRENT --fetch 1--> HAS_CURRENT
//!    |                      |
//!    +---- fetch 0 -------> EXHAUSTED (cursor released; advancing is a no-op)
//! ```
//! A failed fetch also lands in EXHAUSTED after reporting its error.

use std::fmt;
use std::time::Duration;

use super::connection::ServiceConnection;
use crate::backend::RemoteCursor;
use crate::object::ManagementObject;
use crate::runtime::ProcessContext;
use crate::types::{ClassName, Error, Result, StatusCode};

/// Instances of one class, enumerated through a fresh cursor per pass.
#[derive(Debug)]
pub struct ClassInstanceEnumerator<'c> {
    connection: &'c ServiceConnection,
    class: ClassName,
}

impl<'c> ClassInstanceEnumerator<'c> {
    pub(crate) fn new(connection: &'c ServiceConnection, class: ClassName) -> Self {
        Self { connection, class }
    }

    pub fn class(&self) -> &ClassName {
        &self.class
    }

    /// Issue the query and fetch the first instance.
    ///
    /// Every call opens a new remote cursor, so each pass is independent.
    pub fn begin(&self) -> Result<InstanceIter<'c>> {
        let connection = self.connection;
        connection.ensure_live("enumerate instances")?;
        let cursor = connection
            .services()
            .create_instance_enum(&self.class, connection.enum_flags())
            .map_err(|code| {
                connection
                    .errors()
                    .enrich(Error::query(format!("enumerate {}", self.class), code))
            })?;
        tracing::debug!(class = %self.class, namespace = %connection.namespace(), "instance query issued");

        let mut iter = InstanceIter::new(
            self.class.clone(),
            CursorSlot::Owned(cursor),
            connection.config().enumeration.fetch_timeout,
            connection.context(),
        );
        iter.advance()?;
        Ok(iter)
    }
}

/// Where an iteration is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterState {
    Created,
    HasCurrent,
    Exhausted,
}

enum Position {
    Created,
    Current(ManagementObject),
    Exhausted,
}

enum CursorSlot<'a> {
    Owned(Box<dyn RemoteCursor>),
    Shared(&'a mut dyn RemoteCursor),
}

impl CursorSlot<'_> {
    fn get(&mut self) -> &mut dyn RemoteCursor {
        match self {
            CursorSlot::Owned(cursor) => cursor.as_mut(),
            CursorSlot::Shared(cursor) => &mut **cursor,
        }
    }
}

/// One forward pass over query results.
///
/// Besides the cursor-style API ([`InstanceIter::current`],
/// [`InstanceIter::advance`]) this is an [`Iterator`] yielding every
/// instance once. A fetch error is yielded once, then iteration ends.
pub struct InstanceIter<'a> {
    class: ClassName,
    cursor: Option<CursorSlot<'a>>,
    position: Position,
    fetch_timeout: Option<Duration>,
    context: &'a ProcessContext,
    /// The current element has been handed out by `next`.
    yielded: bool,
    advances: usize,
}

impl<'a> InstanceIter<'a> {
    fn new(
        class: ClassName,
        cursor: CursorSlot<'a>,
        fetch_timeout: Option<Duration>,
        context: &'a ProcessContext,
    ) -> Self {
        Self {
            class,
            cursor: Some(cursor),
            position: Position::Created,
            fetch_timeout,
            context,
            yielded: false,
            advances: 0,
        }
    }

    pub fn state(&self) -> IterState {
        match self.position {
            Position::Created => IterState::Created,
            Position::Current(_) => IterState::HasCurrent,
            Position::Exhausted => IterState::Exhausted,
        }
    }

    /// Equality-to-end.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.position, Position::Exhausted)
    }

    /// Number of fetches that produced an instance.
    pub fn advances(&self) -> usize {
        self.advances
    }

    /// The current instance. Fails with `Exhausted` when there is none.
    pub fn current(&self) -> Result<&ManagementObject> {
        match &self.position {
            Position::Current(object) => Ok(object),
            Position::Created | Position::Exhausted => {
                Err(Error::Exhausted(self.class.to_string()))
            }
        }
    }

    /// Fetch exactly one more instance. A no-op once exhausted.
    ///
    /// Fetch failures are `Query` errors. A fetch that outlives
    /// `enumeration.fetch_timeout` is reported as `Timeout` instead, so
    /// callers can retry it; a released runtime is `Initialization`. Every
    /// error ends the pass.
    pub fn advance(&mut self) -> Result<()> {
        if self.cursor.is_none() {
            self.position = Position::Exhausted;
            return Ok(());
        }
        self.yielded = false;
        if let Err(err) = self.context.ensure_live("fetch") {
            // the cursor is not touched again; it goes with the iterator
            self.position = Position::Exhausted;
            return Err(err);
        }
        let Some(slot) = self.cursor.as_mut() else {
            return Ok(());
        };

        let fetched = match slot.get().next(self.fetch_timeout, 1) {
            Ok(fetched) => fetched,
            Err(code) => {
                self.finish();
                return Err(self
                    .context
                    .errors()
                    .enrich(Error::query(format!("fetch {}", self.class), code)));
            }
        };

        let mut objects = fetched.objects;
        match objects.len() {
            0 if fetched.status == StatusCode::TIMED_OUT => {
                self.finish();
                Err(Error::timeout(format!(
                    "fetch {} exceeded {:?}",
                    self.class,
                    self.fetch_timeout.unwrap_or_default()
                )))
            }
            0 => {
                tracing::debug!(class = %self.class, items = self.advances, "enumeration exhausted");
                self.finish();
                Ok(())
            }
            1 => {
                if let Some(object) = objects.pop() {
                    self.position = Position::Current(object);
                    self.advances += 1;
                }
                Ok(())
            }
            n => {
                self.finish();
                Err(Error::malformed_data(
                    format!("fetch {} returned {n} objects for a request of 1", self.class),
                    StatusCode::UNEXPECTED,
                ))
            }
        }
    }

    /// Enter EXHAUSTED and let go of the cursor.
    fn finish(&mut self) {
        self.position = Position::Exhausted;
        self.cursor = None;
    }
}

impl Iterator for InstanceIter<'_> {
    type Item = Result<ManagementObject>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.yielded {
            if let Err(err) = self.advance() {
                return Some(Err(err));
            }
        }
        match &self.position {
            Position::Current(object) => {
                self.yielded = true;
                Some(Ok(object.clone()))
            }
            Position::Created | Position::Exhausted => None,
        }
    }
}

impl fmt::Debug for InstanceIter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceIter")
            .field("class", &self.class)
            .field("state", &self.state())
            .field("advances", &self.advances)
            .finish()
    }
}

/// Enumeration over a single cursor that is rewound before each pass.
///
/// Not the default: passes share one remote cursor, so they cannot overlap.
/// [`ResettableInstances::pass`] takes `&mut self`, which rules out a second
/// pass (or another thread) while one is in progress. Use
/// [`ClassInstanceEnumerator`] for independent or concurrent iteration.
pub struct ResettableInstances<'c> {
    connection: &'c ServiceConnection,
    class: ClassName,
    cursor: Box<dyn RemoteCursor>,
    passes: usize,
}

impl<'c> ResettableInstances<'c> {
    pub(crate) fn open(connection: &'c ServiceConnection, class: ClassName) -> Result<Self> {
        connection.ensure_live("enumerate instances")?;
        let cursor = connection
            .services()
            .create_instance_enum(&class, connection.enum_flags())
            .map_err(|code| {
                connection
                    .errors()
                    .enrich(Error::query(format!("enumerate {class}"), code))
            })?;
        Ok(Self {
            connection,
            class,
            cursor,
            passes: 0,
        })
    }

    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Rewind the shared cursor (after the first pass) and start a pass.
    pub fn pass(&mut self) -> Result<InstanceIter<'_>> {
        let connection = self.connection;
        connection.ensure_live("enumerate instances")?;
        let errors = connection.errors();
        if self.passes > 0 {
            self.cursor
                .reset()
                .map_err(|code| errors.enrich(Error::query(format!("reset {}", self.class), code)))?;
        }
        self.passes += 1;

        let mut iter = InstanceIter::new(
            self.class.clone(),
            CursorSlot::Shared(self.cursor.as_mut()),
            connection.config().enumeration.fetch_timeout,
            connection.context(),
        );
        iter.advance()?;
        Ok(iter)
    }
}

impl fmt::Debug for ResettableInstances<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResettableInstances")
            .field("class", &self.class)
            .field("passes", &self.passes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryClass, MemoryObject, MemoryPlatform};
    use crate::runtime::{ProcessContext, SecurityProfile};
    use crate::types::{Config, ErrorKind};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::sync::Arc;

    const NS: &str = r"ROOT\Test";

    fn seeded(count: usize) -> MemoryPlatform {
        let platform = MemoryPlatform::new();
        let ns = platform.namespace(NS);
        ns.add_class(MemoryClass::new("Widget"));
        for i in 0..count {
            ns.add_instance(MemoryObject::new("Widget").with("Id", i as i32));
        }
        platform
    }

    fn connect(platform: &MemoryPlatform, config: &Config) -> ServiceConnection {
        let context =
            ProcessContext::acquire(Arc::new(platform.clone()), &SecurityProfile::default()).unwrap();
        ServiceConnection::connect(&context, NS, config).unwrap()
    }

    fn ids(iter: InstanceIter<'_>) -> Vec<i32> {
        iter.map(|o| match o.unwrap().get("Id").unwrap() {
            crate::object::Variant::I32(id) => id,
            other => panic!("unexpected id {other:?}"),
        })
        .collect()
    }

    #[test]
    fn test_begin_fetches_first_instance() {
        let platform = seeded(2);
        let connection = connect(&platform, &Config::default());
        let widgets = connection.enumerate_instances("Widget").unwrap();
        assert_eq!(platform.count("create_instance_enum"), 0);

        let iter = widgets.begin().unwrap();
        assert_eq!(iter.state(), IterState::HasCurrent);
        assert_eq!(iter.current().unwrap().class_name(), "Widget");
        assert_eq!(platform.count("next"), 1);
    }

    #[test]
    fn test_cursor_api_walks_to_exhaustion() {
        let platform = seeded(2);
        let connection = connect(&platform, &Config::default());
        let mut iter = connection.enumerate_instances("Widget").unwrap().begin().unwrap();

        iter.advance().unwrap();
        assert_eq!(iter.state(), IterState::HasCurrent);
        iter.advance().unwrap();
        assert!(iter.is_exhausted());
        assert_eq!(iter.advances(), 2);
        assert_eq!(platform.count("cursor_released"), 1);

        // exhaustion is idempotent and dereferencing fails fast
        iter.advance().unwrap();
        assert!(iter.is_exhausted());
        assert_eq!(platform.count("next"), 3);
        assert_eq!(iter.current().unwrap_err().kind(), ErrorKind::Exhausted);
    }

    #[test]
    fn test_zero_instances() {
        let platform = seeded(0);
        let connection = connect(&platform, &Config::default());
        let mut iter = connection.enumerate_instances("Widget").unwrap().begin().unwrap();
        assert!(iter.is_exhausted());
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_each_begin_is_a_fresh_pass() {
        let platform = seeded(3);
        let connection = connect(&platform, &Config::default());
        let widgets = connection.enumerate_instances("Widget").unwrap();

        assert_eq!(ids(widgets.begin().unwrap()), vec![0, 1, 2]);
        assert_eq!(ids(widgets.begin().unwrap()), vec![0, 1, 2]);
        assert_eq!(platform.count("create_instance_enum"), 2);
    }

    #[test]
    fn test_overlapping_passes_are_independent() {
        let platform = seeded(2);
        let connection = connect(&platform, &Config::default());
        let widgets = connection.enumerate_instances("Widget").unwrap();

        let mut first = widgets.begin().unwrap();
        let mut second = widgets.begin().unwrap();
        assert!(first.next().is_some());
        assert!(first.next().is_some());
        assert!(first.next().is_none());
        assert_eq!(second.by_ref().count(), 2);
    }

    #[test]
    fn test_unknown_class_fails_at_begin() {
        let platform = seeded(0);
        let connection = connect(&platform, &Config::default());
        let err = connection
            .enumerate_instances("Gadget")
            .unwrap()
            .begin()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Query);
        assert_eq!(err.code(), Some(StatusCode::INVALID_CLASS));
    }

    #[test]
    fn test_rejected_query_fails_at_begin() {
        let platform = seeded(3);
        let ns = platform.namespace(NS);
        ns.fail_enumeration("Widget", Some(StatusCode::ACCESS_DENIED));
        let connection = connect(&platform, &Config::default());
        let widgets = connection.enumerate_instances("Widget").unwrap();

        let err = widgets.begin().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Query);
        assert_eq!(err.code(), Some(StatusCode::ACCESS_DENIED));
        assert_eq!(platform.count("next"), 0);

        ns.fail_enumeration("Widget", None);
        assert_eq!(ids(widgets.begin().unwrap()), vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_class_name_is_query_error() {
        let platform = seeded(0);
        let connection = connect(&platform, &Config::default());
        let err = connection.enumerate_instances("").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Query);
    }

    #[test]
    fn test_fetch_failure_aborts_pass() {
        let platform = seeded(4);
        platform
            .namespace(NS)
            .fail_fetch("Widget", 2, StatusCode::TRANSPORT_FAILURE);
        let connection = connect(&platform, &Config::default());
        let mut iter = connection.enumerate_instances("Widget").unwrap().begin().unwrap();

        assert!(iter.next().unwrap().is_ok());
        assert!(iter.next().unwrap().is_ok());
        let err = iter.next().unwrap().unwrap_err();
        assert_eq!(err.code(), Some(StatusCode::TRANSPORT_FAILURE));
        assert!(iter.next().is_none());
        assert_eq!(platform.count("cursor_released"), 1);
    }

    #[test]
    fn test_fetch_timeout() {
        let platform = seeded(1);
        platform.namespace(NS).stall_fetches("Widget", true);
        let mut config = Config::default();
        config.enumeration.fetch_timeout = Some(Duration::from_millis(5));
        let connection = connect(&platform, &config);

        let err = connection.enumerate_instances("Widget").unwrap().begin().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn test_oversized_batch_is_malformed() {
        let platform = seeded(3);
        platform.namespace(NS).oversize_fetches("Widget", true);
        let connection = connect(&platform, &Config::default());

        let err = connection.enumerate_instances("Widget").unwrap().begin().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedData);
    }

    #[test]
    fn test_objects_outlive_the_iteration() {
        let platform = seeded(1);
        let connection = connect(&platform, &Config::default());
        let mut iter = connection.enumerate_instances("Widget").unwrap().begin().unwrap();
        let held = iter.current().unwrap().clone();
        let yielded = iter.next().unwrap().unwrap();
        assert!(held.ptr_eq(&yielded));
        drop(iter);
        assert_eq!(held.class_name(), "Widget");
    }

    #[test]
    fn test_resettable_rewinds_one_cursor() {
        let platform = seeded(2);
        let connection = connect(&platform, &Config::default());
        let mut shared = connection.resettable_instances("Widget").unwrap();

        assert_eq!(ids(shared.pass().unwrap()), vec![0, 1]);
        assert_eq!(ids(shared.pass().unwrap()), vec![0, 1]);
        assert_eq!(shared.passes(), 2);
        assert_eq!(platform.count("create_instance_enum"), 1);
        assert_eq!(platform.count("reset"), 1);
    }

    proptest! {
        #[test]
        fn prop_advances_match_delivered_items(count in 0usize..40, extra in 0usize..4) {
            let platform = seeded(count);
            let connection = connect(&platform, &Config::default());
            let mut iter = connection.enumerate_instances("Widget").unwrap().begin().unwrap();

            let mut seen = 0;
            for item in iter.by_ref() {
                item.unwrap();
                seen += 1;
            }
            prop_assert_eq!(seen, count);
            prop_assert_eq!(iter.advances(), count);

            for _ in 0..extra {
                iter.advance().unwrap();
                prop_assert!(iter.is_exhausted());
                prop_assert!(iter.next().is_none());
            }
            prop_assert_eq!(iter.advances(), count);
        }
    }
}
