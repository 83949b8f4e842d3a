//! Management objects and reflection over their properties.
//!
//! A [`ManagementObject`] is a shared, read-only handle: cloning it bumps an
//! atomic reference count, so an iterator and any number of consumers can
//! hold the same instance at once.

use std::fmt;
use std::sync::Arc;

use crate::backend::ClassObject;
use crate::types::{Error, Result};

pub mod dump;
mod properties;
mod value;

pub use properties::{PropertyNameView, PropertyReflector};
pub use value::{parse_cim_datetime, ValueText, VarType, Variant};

/// Shared handle to one retrieved instance.
#[derive(Clone)]
pub struct ManagementObject(Arc<dyn ClassObject>);

impl ManagementObject {
    pub fn new(inner: Arc<dyn ClassObject>) -> Self {
        Self(inner)
    }

    pub fn class_name(&self) -> &str {
        self.0.class_name()
    }

    pub fn path(&self) -> Option<&str> {
        self.0.path()
    }

    /// Read one property.
    pub fn get(&self, name: &str) -> Result<Variant> {
        self.0
            .get(name)
            .map_err(|code| Error::query(format!("get {}.{}", self.class_name(), name), code))
    }

    /// Ordered property names of this object.
    pub fn property_names(&self) -> Result<PropertyNameView> {
        PropertyReflector::names_of(self)
    }

    /// Whether both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &ManagementObject) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn inner(&self) -> &dyn ClassObject {
        self.0.as_ref()
    }
}

impl fmt::Debug for ManagementObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagementObject")
            .field("class", &self.class_name())
            .field("path", &self.path())
            .finish()
    }
}
