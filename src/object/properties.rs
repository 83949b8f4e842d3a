//! Scoped access to an object's property-name array.
//!
//! The runtime hands out names in a lockable array. A view keeps the array
//! locked for as long as it lives; on drop the lock is released first and
//! the storage is freed second, on success and failure paths alike.

use std::fmt;
use std::sync::Arc;

use super::{ManagementObject, VarType, Variant};
use crate::backend::RawArray;
use crate::types::{Error, Result, StatusCode};

/// Reflection over declared properties.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertyReflector;

impl PropertyReflector {
    /// Fetch and validate the ordered property names of `object`.
    ///
    /// Fails with `Query` if the names cannot be fetched, `TypeMismatch` if the
    /// array does not hold strings, and `MalformedData` on inverted bounds, a
    /// short buffer or an empty name.
    pub fn names_of(object: &ManagementObject) -> Result<PropertyNameView> {
        let class = object.class_name();
        let storage = OwnedArray(
            object
                .inner()
                .names()
                .map_err(|code| Error::query(format!("get names of {class}"), code))?,
        );

        let element_type = storage
            .0
            .element_type()
            .map_err(|code| Error::malformed_data("read element type", code))?;
        if element_type != VarType::BSTR {
            tracing::debug!(class, %element_type, "property-name array is not a string array");
            return Err(Error::type_mismatch(
                format!("property names of {class} have element type {element_type}"),
                StatusCode::UNEXPECTED,
            ));
        }

        let lower = storage
            .0
            .lower_bound()
            .map_err(|code| Error::malformed_data("read lower bound", code))?;
        let upper = storage
            .0
            .upper_bound()
            .map_err(|code| Error::malformed_data("read upper bound", code))?;
        if lower > upper {
            return Err(Error::malformed_data(
                format!("property names of {class} have bounds {lower}..{upper}"),
                StatusCode::UNEXPECTED,
            ));
        }
        let count = (i64::from(upper) - i64::from(lower)) as usize;

        let data = storage
            .0
            .access_data()
            .map_err(|code| Error::query(format!("access names of {class}"), code))?;
        let access = DataAccess {
            array: Arc::clone(&storage.0),
            data,
        };

        if access.data.len() < count {
            return Err(Error::malformed_data(
                format!(
                    "property names of {class}: {} elements for a count of {count}",
                    access.data.len()
                ),
                StatusCode::UNEXPECTED,
            ));
        }
        for element in &access.data[..count] {
            match element {
                Variant::String(name) if !name.is_empty() => {}
                Variant::String(_) => {
                    return Err(Error::malformed_data(
                        format!("empty property name on {class}"),
                        StatusCode::UNEXPECTED,
                    ))
                }
                other => {
                    return Err(Error::type_mismatch(
                        format!("property name of {class} has type {}", other.var_type()),
                        StatusCode::UNEXPECTED,
                    ))
                }
            }
        }

        Ok(PropertyNameView {
            access,
            storage,
            count,
        })
    }
}

/// Frees the array's storage when dropped.
struct OwnedArray(Arc<dyn RawArray>);

impl Drop for OwnedArray {
    fn drop(&mut self) {
        self.0.destroy();
    }
}

/// Holds the array's data lock; releases it when dropped.
struct DataAccess {
    array: Arc<dyn RawArray>,
    data: Arc<[Variant]>,
}

impl Drop for DataAccess {
    fn drop(&mut self) {
        self.array.unaccess_data();
    }
}

/// Ordered, forward-only sequence of property names.
///
/// Names are unique per object, but the view is a sequence, not a set.
pub struct PropertyNameView {
    // Field order is drop order: unlock before free.
    access: DataAccess,
    #[allow(dead_code)]
    storage: OwnedArray,
    count: usize,
}

impl PropertyNameView {
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.access.data[..self.count]
            .iter()
            .filter_map(Variant::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.iter().map(str::to_string).collect()
    }
}

impl<'a> IntoIterator for &'a PropertyNameView {
    type Item = &'a str;
    type IntoIter = Box<dyn Iterator<Item = &'a str> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

impl fmt::Debug for PropertyNameView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
