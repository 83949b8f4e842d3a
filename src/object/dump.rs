//! Recursive textual rendering of an object's properties.
//!
//! Output lines look like `Win32_BIOS[0].Name = Default System BIOS`. Nulls
//! render as `= null`; values that do not coerce to text render their type
//! tag instead, as `Name(13)`. Embedded objects are descended into up to a
//! fixed depth.

use std::io::Write;

use super::{ManagementObject, PropertyReflector, ValueText, Variant};
use crate::types::{Error, ReflectionConfig, Result};

/// Renders objects line by line.
#[derive(Debug, Clone)]
pub struct Dumper {
    max_depth: usize,
}

impl Dumper {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn from_config(config: &ReflectionConfig) -> Self {
        Self::new(config.max_depth)
    }

    /// Render every property of `object`, prefixing lines with `label[index]`.
    pub fn lines(&self, label: &str, index: usize, object: &ManagementObject) -> Result<Vec<String>> {
        let mut out = Vec::new();
        self.walk(&format!("{label}[{index}]"), object, 0, &mut out)?;
        Ok(out)
    }

    /// Like [`Dumper::lines`], writing each line to `out`.
    pub fn write_to<W: Write>(
        &self,
        out: &mut W,
        label: &str,
        index: usize,
        object: &ManagementObject,
    ) -> Result<()> {
        for line in self.lines(label, index, object)? {
            writeln!(out, "{line}")?;
        }
        Ok(())
    }

    fn walk(
        &self,
        prefix: &str,
        object: &ManagementObject,
        depth: usize,
        out: &mut Vec<String>,
    ) -> Result<()> {
        let names = PropertyReflector::names_of(object)?;
        for name in &names {
            let value = object.get(name)?;
            let path = format!("{prefix}.{name}");
            match &value {
                Variant::Object(child) => {
                    out.push(format!("{path} = {}", child.class_name()));
                    self.descend(&path, child, depth, out)?;
                }
                Variant::ObjectArray(children) => {
                    out.push(format!("{path} = {}[{}]", object_array_class(children), children.len()));
                    for (i, child) in children.iter().enumerate() {
                        self.descend(&format!("{path}[{i}]"), child, depth, out)?;
                    }
                }
                _ => out.push(match value.text() {
                    ValueText::Null => format!("{path} = null"),
                    ValueText::Text(text) => format!("{path} = {text}"),
                    ValueText::Raw(var_type) => format!("{path}({var_type})"),
                }),
            }
        }
        Ok(())
    }

    fn descend(
        &self,
        path: &str,
        child: &ManagementObject,
        depth: usize,
        out: &mut Vec<String>,
    ) -> Result<()> {
        if depth + 1 > self.max_depth {
            return Err(Error::RecursionLimit {
                limit: self.max_depth,
                path: path.to_string(),
            });
        }
        self.walk(path, child, depth + 1, out)
    }
}

fn object_array_class(children: &[ManagementObject]) -> &str {
    children.first().map_or("object", ManagementObject::class_name)
}
