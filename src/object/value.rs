//! Typed property values.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ManagementObject;

/// Raw type tag of a value, as the remote runtime reports it (`VT_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VarType(pub u16);

impl VarType {
    pub const EMPTY: VarType = VarType(0);
    pub const NULL: VarType = VarType(1);
    pub const I4: VarType = VarType(3);
    pub const R8: VarType = VarType(5);
    pub const BSTR: VarType = VarType(8);
    pub const BOOL: VarType = VarType(11);
    pub const UNKNOWN: VarType = VarType(13);
    pub const I8: VarType = VarType(20);
    pub const UI8: VarType = VarType(21);
    pub const ARRAY: u16 = 0x2000;

    pub fn array_of(element: VarType) -> VarType {
        VarType(element.0 | Self::ARRAY)
    }

    pub fn is_array(self) -> bool {
        self.0 & Self::ARRAY != 0
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A property value.
#[derive(Debug, Clone)]
pub enum Variant {
    Null,
    String(String),
    Bool(bool),
    I32(i32),
    I64(i64),
    U64(u64),
    F64(f64),
    /// Embedded (referenced) sub-object.
    Object(ManagementObject),
    /// Array of sub-object references.
    ObjectArray(Vec<ManagementObject>),
    /// Any other type; only its tag is known.
    Other { var_type: VarType },
}

/// Display form of a value after best-effort coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueText {
    Null,
    Text(String),
    /// Coercion failed; the raw type tag is all there is to show.
    Raw(VarType),
}

impl Variant {
    pub fn var_type(&self) -> VarType {
        match self {
            Variant::Null => VarType::NULL,
            Variant::String(_) => VarType::BSTR,
            Variant::Bool(_) => VarType::BOOL,
            Variant::I32(_) => VarType::I4,
            Variant::I64(_) => VarType::I8,
            Variant::U64(_) => VarType::UI8,
            Variant::F64(_) => VarType::R8,
            Variant::Object(_) => VarType::UNKNOWN,
            Variant::ObjectArray(_) => VarType::array_of(VarType::UNKNOWN),
            Variant::Other { var_type } => *var_type,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Variant::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ManagementObject> {
        match self {
            Variant::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Best-effort conversion to text. Booleans render as `True`/`False`.
    /// Null, sub-objects and unknown types do not coerce.
    pub fn coerce_to_string(&self) -> Option<String> {
        match self {
            Variant::String(s) => Some(s.clone()),
            Variant::Bool(true) => Some("True".to_string()),
            Variant::Bool(false) => Some("False".to_string()),
            Variant::I32(v) => Some(v.to_string()),
            Variant::I64(v) => Some(v.to_string()),
            Variant::U64(v) => Some(v.to_string()),
            Variant::F64(v) => Some(v.to_string()),
            Variant::Null
            | Variant::Object(_)
            | Variant::ObjectArray(_)
            | Variant::Other { .. } => None,
        }
    }

    pub fn text(&self) -> ValueText {
        if self.is_null() {
            return ValueText::Null;
        }
        match self.coerce_to_string() {
            Some(text) => ValueText::Text(text),
            None => ValueText::Raw(self.var_type()),
        }
    }

    /// Interpret a string value as a CIM datetime.
    pub fn as_datetime(&self) -> Option<DateTime<FixedOffset>> {
        self.as_str().and_then(parse_cim_datetime)
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::String(value.to_string())
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Variant::String(value)
    }
}

impl From<bool> for Variant {
    fn from(value: bool) -> Self {
        Variant::Bool(value)
    }
}

impl From<i32> for Variant {
    fn from(value: i32) -> Self {
        Variant::I32(value)
    }
}

impl From<i64> for Variant {
    fn from(value: i64) -> Self {
        Variant::I64(value)
    }
}

impl From<u64> for Variant {
    fn from(value: u64) -> Self {
        Variant::U64(value)
    }
}

impl From<f64> for Variant {
    fn from(value: f64) -> Self {
        Variant::F64(value)
    }
}

impl From<ManagementObject> for Variant {
    fn from(value: ManagementObject) -> Self {
        Variant::Object(value)
    }
}

impl<T: Into<Variant>> From<Option<T>> for Variant {
    fn from(value: Option<T>) -> Self {
        value.map_or(Variant::Null, Into::into)
    }
}

/// Parse the fixed-width CIM datetime form `yyyymmddHHMMSS.mmmmmmsUUU`,
/// where `sUUU` is a signed UTC offset in minutes.
pub fn parse_cim_datetime(raw: &str) -> Option<DateTime<FixedOffset>> {
    if raw.len() != 25 || !raw.is_ascii() || raw.as_bytes()[14] != b'.' {
        return None;
    }
    let field = |range: std::ops::Range<usize>| raw[range].parse::<u32>().ok();

    let date = NaiveDate::from_ymd_opt(field(0..4)? as i32, field(4..6)?, field(6..8)?)?;
    let time = date.and_hms_micro_opt(field(8..10)?, field(10..12)?, field(12..14)?, field(15..21)?)?;

    let minutes = field(22..25)? as i32;
    let offset = match &raw[21..22] {
        "+" => minutes,
        "-" => -minutes,
        _ => return None,
    };
    let zone = FixedOffset::east_opt(offset * 60)?;
    zone.from_local_datetime(&time).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_coercion() {
        assert_eq!(Variant::from("x").coerce_to_string().as_deref(), Some("x"));
        assert_eq!(Variant::from(true).coerce_to_string().as_deref(), Some("True"));
        assert_eq!(Variant::from(42i32).coerce_to_string().as_deref(), Some("42"));
        assert_eq!(Variant::from(7u64).coerce_to_string().as_deref(), Some("7"));
        assert_eq!(Variant::Null.coerce_to_string(), None);
    }

    #[test]
    fn test_text_falls_back_to_type_tag() {
        assert_eq!(Variant::Null.text(), ValueText::Null);
        assert_eq!(Variant::from(false).text(), ValueText::Text("False".into()));

        let opaque = Variant::Other { var_type: VarType(36) };
        assert_eq!(opaque.text(), ValueText::Raw(VarType(36)));
        assert_eq!(Variant::ObjectArray(vec![]).text(), ValueText::Raw(VarType(0x200D)));
    }

    #[test]
    fn test_embedded_object_access() {
        let child = crate::backend::memory::MemoryObject::new("CIM_Setting")
            .with("Caption", "inner")
            .into_handle();
        let value = Variant::from(child);
        let inner = value.as_object().unwrap();
        assert_eq!(inner.class_name(), "CIM_Setting");
        assert_eq!(value.as_str(), None);
        assert!(Variant::from("x").as_object().is_none());
    }

    #[test]
    fn test_option_conversion() {
        assert!(Variant::from(None::<&str>).is_null());
        assert_eq!(Variant::from(Some("a")).as_str(), Some("a"));
    }

    #[test]
    fn test_parse_cim_datetime() {
        let dt = parse_cim_datetime("20231016123005.250000+060").unwrap();
        assert_eq!(dt.year(), 2023);
        assert_eq!(dt.month(), 10);
        assert_eq!(dt.day(), 16);
        assert_eq!(dt.hour(), 12);
        assert_eq!(dt.second(), 5);
        assert_eq!(dt.nanosecond(), 250_000_000);
        assert_eq!(dt.offset().local_minus_utc(), 3600);

        let west = parse_cim_datetime("20000101000000.000000-300").unwrap();
        assert_eq!(west.offset().local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn test_parse_cim_datetime_rejects_garbage() {
        assert!(parse_cim_datetime("").is_none());
        assert!(parse_cim_datetime("2023101612300.250000+060").is_none());
        assert!(parse_cim_datetime("20231316123005.250000+060").is_none());
        assert!(parse_cim_datetime("20231016123005.250000*060").is_none());
        assert!(Variant::from("not a date").as_datetime().is_none());
    }
}
