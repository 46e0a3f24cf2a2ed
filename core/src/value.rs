//! Dynamic values and the bridge between them and typed settings fields.
//!
//! Raw tokens are converted into [`Value`]s by the type conversion layer and
//! accumulated per parameter. When the binder writes a value into a settings
//! instance, the property's accessor turns the [`Value`] back into the typed
//! field through [`BindValue`].

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeDelta, Utc};
use serde::ser::{SerializeMap, SerializeSeq, SerializeStruct};
use serde::{Serialize, Serializer};
use url::Url;
use uuid::Uuid;

use crate::convert::format_duration;
use crate::error::ValueError;
use crate::types::{ParameterType, ScalarType, TypeKey};

/// A value produced from command-line input.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Char(char),
    String(String),
    /// Any signed integer.
    Int(i128),
    /// Any unsigned integer.
    UInt(u128),
    Float(f64),
    DateTime(DateTime<FixedOffset>),
    Date(NaiveDate),
    Time(NaiveTime),
    Duration(TimeDelta),
    Uuid(Uuid),
    Url(Url),
    Path(PathBuf),
    Enum(EnumValue),
    Array(Vec<Value>),
    /// Ordered key/value entries; keys may repeat.
    Map(Vec<(Value, Value)>),
    /// A switch with an optional attached value.
    Flag {
        is_set: bool,
        value: Option<Box<Value>>,
    },
    Custom(CustomValue),
}

impl Value {
    /// Short name of the variant, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Char(_) => "char",
            Self::String(_) => "string",
            Self::Int(_) => "signed integer",
            Self::UInt(_) => "unsigned integer",
            Self::Float(_) => "float",
            Self::DateTime(_) => "date-time",
            Self::Date(_) => "date",
            Self::Time(_) => "time",
            Self::Duration(_) => "duration",
            Self::Uuid(_) => "uuid",
            Self::Url(_) => "url",
            Self::Path(_) => "path",
            Self::Enum(_) => "enum",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
            Self::Flag { .. } => "flag",
            Self::Custom(_) => "custom",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => i64::try_from(*value).ok(),
            Self::UInt(value) => i64::try_from(*value).ok(),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Char(value) => write!(f, "{value}"),
            Self::String(value) => f.write_str(value),
            Self::Int(value) => write!(f, "{value}"),
            Self::UInt(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::DateTime(value) => f.write_str(&value.to_rfc3339()),
            Self::Date(value) => write!(f, "{}", value.format("%Y-%m-%d")),
            Self::Time(value) => write!(f, "{value}"),
            Self::Duration(value) => f.write_str(&format_duration(*value)),
            Self::Uuid(value) => write!(f, "{value}"),
            Self::Url(value) => write!(f, "{value}"),
            Self::Path(value) => write!(f, "{}", value.display()),
            Self::Enum(value) => f.write_str(&value.member),
            Self::Array(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                f.write_str(&parts.join(", "))
            }
            Self::Map(entries) => {
                let parts: Vec<String> = entries.iter().map(|(k, v)| format!("{k}={v}")).collect();
                f.write_str(&parts.join(", "))
            }
            Self::Flag { is_set, value } => match value {
                Some(value) => write!(f, "{value}"),
                None => write!(f, "{is_set}"),
            },
            Self::Custom(value) => f.write_str(&value.display),
        }
    }
}

/// JSON shape: scalars serialize naturally, maps group repeated keys into
/// arrays, flags become `{ "is_set": .., "value": .. }`.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Bool(value) => serializer.serialize_bool(*value),
            Self::Int(value) => match i64::try_from(*value) {
                Ok(small) => serializer.serialize_i64(small),
                Err(_) => serializer.serialize_i128(*value),
            },
            Self::UInt(value) => match u64::try_from(*value) {
                Ok(small) => serializer.serialize_u64(small),
                Err(_) => serializer.serialize_u128(*value),
            },
            Self::Float(value) => serializer.serialize_f64(*value),
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(entries) => {
                let mut groups: Vec<(String, Vec<&Value>)> = Vec::new();
                for (key, value) in entries {
                    let key = key.to_string();
                    match groups.iter_mut().find(|(existing, _)| *existing == key) {
                        Some((_, values)) => values.push(value),
                        None => groups.push((key, vec![value])),
                    }
                }
                let mut map = serializer.serialize_map(Some(groups.len()))?;
                for (key, values) in &groups {
                    match values.as_slice() {
                        [single] => map.serialize_entry(key, single)?,
                        many => map.serialize_entry(key, many)?,
                    }
                }
                map.end()
            }
            Self::Flag { is_set, value } => {
                let mut flag = serializer.serialize_struct("FlagValue", 2)?;
                flag.serialize_field("is_set", is_set)?;
                flag.serialize_field("value", value)?;
                flag.end()
            }
            other => serializer.serialize_str(&other.to_string()),
        }
    }
}

/// A converted enumeration member.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumValue {
    pub enum_type: TypeKey,
    /// Canonical member name as declared.
    pub member: String,
    pub index: usize,
}

/// A value produced by a custom converter.
#[derive(Clone)]
pub struct CustomValue {
    type_key: TypeKey,
    display: String,
    inner: Arc<dyn Any + Send + Sync>,
}

impl CustomValue {
    pub fn new<T: Any + Send + Sync + fmt::Display>(value: T) -> Self {
        Self {
            type_key: TypeKey::of::<T>(),
            display: value.to_string(),
            inner: Arc::new(value),
        }
    }

    pub fn type_key(&self) -> &TypeKey {
        &self.type_key
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Debug for CustomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomValue")
            .field("type_key", &self.type_key)
            .field("display", &self.display)
            .finish()
    }
}

impl PartialEq for CustomValue {
    fn eq(&self, other: &Self) -> bool {
        self.type_key == other.type_key && self.display == other.display
    }
}

/// A switch that may carry a value, such as `--port` or `--port 8080`.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagValue<T> {
    /// `true` when the option appeared on the command line.
    pub is_set: bool,
    /// The attached value, if one was given.
    pub value: Option<T>,
}

impl<T> Default for FlagValue<T> {
    fn default() -> Self {
        Self {
            is_set: false,
            value: None,
        }
    }
}

/// A map that keeps every value given for a key.
///
/// Reading through [`get`](MultiMap::get) gives dictionary semantics (the
/// last value wins); [`get_all`](MultiMap::get_all) gives lookup semantics.
///
/// # Examples
///
/// ```
/// use command_bind_core::MultiMap;
///
/// let mut map = MultiMap::new();
/// map.insert("env", "dev");
/// map.insert("env", "prod");
/// map.insert("region", "eu");
///
/// assert_eq!(map.len(), 2);
/// assert_eq!(map.get(&"env"), Some(&"prod"));
/// assert_eq!(map.get_all(&"env").collect::<Vec<_>>(), vec![&"dev", &"prod"]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MultiMap<K, V> {
    entries: Vec<(K, V)>,
}

impl<K, V> Default for MultiMap<K, V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<K: PartialEq, V> MultiMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.entries.push((key, value));
    }

    /// Returns the most recent value for `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Returns every value for `key` in insertion order.
    pub fn get_all<'a>(&'a self, key: &'a K) -> impl Iterator<Item = &'a V> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Distinct keys in first-seen order.
    pub fn keys(&self) -> Vec<&K> {
        let mut keys: Vec<&K> = Vec::new();
        for (key, _) in &self.entries {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every value stored for `key`.
    pub fn remove(&mut self, key: &K) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(k, _)| k != key);
        before != self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

/// A type that can appear as a single converted value.
pub trait ScalarValue: Sized + 'static {
    fn scalar_type() -> ScalarType;
    fn from_scalar(value: Value) -> Result<Self, ValueError>;
    fn to_scalar(&self) -> Value;
}

/// A type that can back a settings property.
pub trait BindValue: Sized + 'static {
    fn parameter_type() -> ParameterType;
    fn from_value(value: Value) -> Result<Self, ValueError>;
    fn to_value(&self) -> Value;
}

pub(crate) fn mismatch(expected: impl Into<String>, found: &Value) -> ValueError {
    ValueError::TypeMismatch {
        expected: expected.into(),
        found: found.kind_name(),
    }
}

/// Implements [`BindValue`] for types that already implement
/// [`ScalarValue`].
#[macro_export]
macro_rules! bind_scalar {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::BindValue for $ty {
            fn parameter_type() -> $crate::ParameterType {
                $crate::ParameterType::Scalar(<$ty as $crate::ScalarValue>::scalar_type())
            }

            fn from_value(value: $crate::Value) -> ::std::result::Result<Self, $crate::ValueError> {
                <$ty as $crate::ScalarValue>::from_scalar(value)
            }

            fn to_value(&self) -> $crate::Value {
                <$ty as $crate::ScalarValue>::to_scalar(self)
            }
        }
    )+};
}

/// Makes a fieldless enum bindable; conversion matches member names without
/// regard to case.
///
/// # Examples
///
/// ```
/// use command_bind_core::{bind_enum, BindValue, ScalarType, ParameterType};
///
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// enum Priority { Low, Normal, High }
/// bind_enum!(Priority { Low, Normal, High });
///
/// match Priority::parameter_type() {
///     ParameterType::Scalar(ScalarType::Enum(ty)) => assert_eq!(ty.members.len(), 3),
///     other => panic!("unexpected {other:?}"),
/// }
/// assert_eq!(Priority::from_value(Priority::High.to_value()).unwrap(), Priority::High);
/// ```
#[macro_export]
macro_rules! bind_enum {
    ($ty:ident { $($variant:ident),+ $(,)? }) => {
        impl $crate::ScalarValue for $ty {
            fn scalar_type() -> $crate::ScalarType {
                $crate::ScalarType::Enum($crate::EnumType::new(
                    $crate::TypeKey::of::<$ty>(),
                    [$(stringify!($variant)),+],
                ))
            }

            fn from_scalar(value: $crate::Value) -> ::std::result::Result<Self, $crate::ValueError> {
                match value {
                    $crate::Value::Enum(member) => match member.member.as_str() {
                        $(stringify!($variant) => Ok($ty::$variant),)+
                        _ => Err($crate::ValueError::TypeMismatch {
                            expected: stringify!($ty).to_string(),
                            found: "enum",
                        }),
                    },
                    other => Err($crate::ValueError::TypeMismatch {
                        expected: stringify!($ty).to_string(),
                        found: other.kind_name(),
                    }),
                }
            }

            fn to_scalar(&self) -> $crate::Value {
                let members = [$(stringify!($variant)),+];
                let member = match self {
                    $($ty::$variant => stringify!($variant),)+
                };
                $crate::Value::Enum($crate::EnumValue {
                    enum_type: $crate::TypeKey::of::<$ty>(),
                    member: member.to_string(),
                    index: members.iter().position(|m| *m == member).unwrap_or_default(),
                })
            }
        }

        $crate::bind_scalar!($ty);
    };
}

/// Makes a `Clone + Display` type bindable through a custom converter.
///
/// The converter itself is registered with the metadata provider or attached
/// to the property; this macro only bridges [`Value::Custom`] and the type.
#[macro_export]
macro_rules! bind_custom {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::ScalarValue for $ty {
            fn scalar_type() -> $crate::ScalarType {
                $crate::ScalarType::Custom($crate::TypeKey::of::<$ty>())
            }

            fn from_scalar(value: $crate::Value) -> ::std::result::Result<Self, $crate::ValueError> {
                match value {
                    $crate::Value::Custom(custom) => custom
                        .downcast_ref::<$ty>()
                        .cloned()
                        .ok_or_else(|| $crate::ValueError::TypeMismatch {
                            expected: $crate::TypeKey::of::<$ty>().short_name().to_string(),
                            found: "custom",
                        }),
                    other => Err($crate::ValueError::TypeMismatch {
                        expected: $crate::TypeKey::of::<$ty>().short_name().to_string(),
                        found: other.kind_name(),
                    }),
                }
            }

            fn to_scalar(&self) -> $crate::Value {
                $crate::Value::Custom($crate::CustomValue::new(self.clone()))
            }
        }

        $crate::bind_scalar!($ty);
    )+};
}

macro_rules! signed_scalar {
    ($($ty:ty => $variant:ident),+ $(,)?) => {$(
        impl ScalarValue for $ty {
            fn scalar_type() -> ScalarType {
                ScalarType::$variant
            }

            fn from_scalar(value: Value) -> Result<Self, ValueError> {
                let out_of_range = |value: String| ValueError::OutOfRange {
                    value,
                    target: stringify!($ty),
                };
                match value {
                    Value::Int(v) => <$ty>::try_from(v).map_err(|_| out_of_range(v.to_string())),
                    Value::UInt(v) => <$ty>::try_from(v).map_err(|_| out_of_range(v.to_string())),
                    other => Err(mismatch(stringify!($ty), &other)),
                }
            }

            fn to_scalar(&self) -> Value {
                Value::Int(i128::from(*self))
            }
        }
    )+};
}

macro_rules! unsigned_scalar {
    ($($ty:ty => $variant:ident),+ $(,)?) => {$(
        impl ScalarValue for $ty {
            fn scalar_type() -> ScalarType {
                ScalarType::$variant
            }

            fn from_scalar(value: Value) -> Result<Self, ValueError> {
                let out_of_range = |value: String| ValueError::OutOfRange {
                    value,
                    target: stringify!($ty),
                };
                match value {
                    Value::Int(v) => <$ty>::try_from(v).map_err(|_| out_of_range(v.to_string())),
                    Value::UInt(v) => <$ty>::try_from(v).map_err(|_| out_of_range(v.to_string())),
                    other => Err(mismatch(stringify!($ty), &other)),
                }
            }

            fn to_scalar(&self) -> Value {
                Value::UInt(u128::from(*self))
            }
        }
    )+};
}

signed_scalar!(i8 => I8, i16 => I16, i32 => I32, i64 => I64, i128 => I128);
unsigned_scalar!(u8 => U8, u16 => U16, u32 => U32, u64 => U64, u128 => U128);

impl ScalarValue for f64 {
    fn scalar_type() -> ScalarType {
        ScalarType::F64
    }

    fn from_scalar(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float(v) => Ok(v),
            Value::Int(v) => Ok(v as f64),
            Value::UInt(v) => Ok(v as f64),
            other => Err(mismatch("f64", &other)),
        }
    }

    fn to_scalar(&self) -> Value {
        Value::Float(*self)
    }
}

impl ScalarValue for f32 {
    fn scalar_type() -> ScalarType {
        ScalarType::F32
    }

    fn from_scalar(value: Value) -> Result<Self, ValueError> {
        let wide = f64::from_scalar(value).map_err(|err| match err {
            ValueError::TypeMismatch { found, .. } => ValueError::TypeMismatch {
                expected: "f32".to_string(),
                found,
            },
            other => other,
        })?;
        if wide.is_finite() && wide.abs() > f64::from(f32::MAX) {
            return Err(ValueError::OutOfRange {
                value: wide.to_string(),
                target: "f32",
            });
        }
        Ok(wide as f32)
    }

    fn to_scalar(&self) -> Value {
        Value::Float(f64::from(*self))
    }
}

impl ScalarValue for bool {
    fn scalar_type() -> ScalarType {
        ScalarType::Bool
    }

    fn from_scalar(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bool(v) => Ok(v),
            Value::Flag { is_set, .. } => Ok(is_set),
            other => Err(mismatch("bool", &other)),
        }
    }

    fn to_scalar(&self) -> Value {
        Value::Bool(*self)
    }
}

impl ScalarValue for char {
    fn scalar_type() -> ScalarType {
        ScalarType::Char
    }

    fn from_scalar(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Char(v) => Ok(v),
            other => Err(mismatch("char", &other)),
        }
    }

    fn to_scalar(&self) -> Value {
        Value::Char(*self)
    }
}

impl ScalarValue for String {
    fn scalar_type() -> ScalarType {
        ScalarType::String
    }

    fn from_scalar(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::String(v) => Ok(v),
            Value::Null => Ok(String::new()),
            other => Err(mismatch("String", &other)),
        }
    }

    fn to_scalar(&self) -> Value {
        Value::String(self.clone())
    }
}

impl ScalarValue for PathBuf {
    fn scalar_type() -> ScalarType {
        ScalarType::Path
    }

    fn from_scalar(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Path(v) => Ok(v),
            Value::String(v) => Ok(PathBuf::from(v)),
            other => Err(mismatch("PathBuf", &other)),
        }
    }

    fn to_scalar(&self) -> Value {
        Value::Path(self.clone())
    }
}

impl ScalarValue for Uuid {
    fn scalar_type() -> ScalarType {
        ScalarType::Uuid
    }

    fn from_scalar(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Uuid(v) => Ok(v),
            other => Err(mismatch("Uuid", &other)),
        }
    }

    fn to_scalar(&self) -> Value {
        Value::Uuid(*self)
    }
}

impl ScalarValue for Url {
    fn scalar_type() -> ScalarType {
        ScalarType::Url
    }

    fn from_scalar(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Url(v) => Ok(v),
            other => Err(mismatch("Url", &other)),
        }
    }

    fn to_scalar(&self) -> Value {
        Value::Url(self.clone())
    }
}

impl ScalarValue for DateTime<FixedOffset> {
    fn scalar_type() -> ScalarType {
        ScalarType::DateTime
    }

    fn from_scalar(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::DateTime(v) => Ok(v),
            other => Err(mismatch("DateTime", &other)),
        }
    }

    fn to_scalar(&self) -> Value {
        Value::DateTime(*self)
    }
}

impl ScalarValue for DateTime<Utc> {
    fn scalar_type() -> ScalarType {
        ScalarType::DateTime
    }

    fn from_scalar(value: Value) -> Result<Self, ValueError> {
        DateTime::<FixedOffset>::from_scalar(value).map(|v| v.with_timezone(&Utc))
    }

    fn to_scalar(&self) -> Value {
        Value::DateTime(self.fixed_offset())
    }
}

impl ScalarValue for NaiveDate {
    fn scalar_type() -> ScalarType {
        ScalarType::Date
    }

    fn from_scalar(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Date(v) => Ok(v),
            Value::DateTime(v) => Ok(v.date_naive()),
            other => Err(mismatch("Date", &other)),
        }
    }

    fn to_scalar(&self) -> Value {
        Value::Date(*self)
    }
}

impl ScalarValue for NaiveTime {
    fn scalar_type() -> ScalarType {
        ScalarType::Time
    }

    fn from_scalar(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Time(v) => Ok(v),
            other => Err(mismatch("Time", &other)),
        }
    }

    fn to_scalar(&self) -> Value {
        Value::Time(*self)
    }
}

impl ScalarValue for TimeDelta {
    fn scalar_type() -> ScalarType {
        ScalarType::Duration
    }

    fn from_scalar(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Duration(v) => Ok(v),
            other => Err(mismatch("Duration", &other)),
        }
    }

    fn to_scalar(&self) -> Value {
        Value::Duration(*self)
    }
}

bind_scalar!(
    i8,
    i16,
    i32,
    i64,
    i128,
    u8,
    u16,
    u32,
    u64,
    u128,
    f32,
    f64,
    bool,
    char,
    String,
    PathBuf,
    Uuid,
    Url,
    DateTime<FixedOffset>,
    DateTime<Utc>,
    NaiveDate,
    NaiveTime,
    TimeDelta,
);

impl<T: ScalarValue> BindValue for Option<T> {
    fn parameter_type() -> ParameterType {
        ParameterType::Nullable(T::scalar_type())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_scalar(other).map(Some),
        }
    }

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, ScalarValue::to_scalar)
    }
}

impl<T: ScalarValue> BindValue for Vec<T> {
    fn parameter_type() -> ParameterType {
        ParameterType::Array(T::scalar_type())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Array(items) => items.into_iter().map(T::from_scalar).collect(),
            Value::Null => Ok(Vec::new()),
            other => Err(mismatch("array", &other)),
        }
    }

    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(ScalarValue::to_scalar).collect())
    }
}

impl<T: ScalarValue> BindValue for FlagValue<T> {
    fn parameter_type() -> ParameterType {
        ParameterType::FlagValue(T::scalar_type())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Flag { is_set, value } => Ok(Self {
                is_set,
                value: value.map(|v| T::from_scalar(*v)).transpose()?,
            }),
            Value::Null => Ok(Self::default()),
            other => Err(mismatch("flag", &other)),
        }
    }

    fn to_value(&self) -> Value {
        Value::Flag {
            is_set: self.is_set,
            value: self.value.as_ref().map(|v| Box::new(v.to_scalar())),
        }
    }
}

fn map_entries(value: Value) -> Result<Vec<(Value, Value)>, ValueError> {
    match value {
        Value::Map(entries) => Ok(entries),
        Value::Null => Ok(Vec::new()),
        other => Err(mismatch("map", &other)),
    }
}

impl<K, V> BindValue for HashMap<K, V>
where
    K: ScalarValue + Eq + Hash,
    V: ScalarValue,
{
    fn parameter_type() -> ParameterType {
        ParameterType::Map {
            key: K::scalar_type(),
            value: V::scalar_type(),
        }
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        map_entries(value)?
            .into_iter()
            .map(|(k, v)| Ok((K::from_scalar(k)?, V::from_scalar(v)?)))
            .collect()
    }

    fn to_value(&self) -> Value {
        Value::Map(
            self.iter()
                .map(|(k, v)| (k.to_scalar(), v.to_scalar()))
                .collect(),
        )
    }
}

impl<K, V> BindValue for BTreeMap<K, V>
where
    K: ScalarValue + Ord,
    V: ScalarValue,
{
    fn parameter_type() -> ParameterType {
        ParameterType::Map {
            key: K::scalar_type(),
            value: V::scalar_type(),
        }
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        map_entries(value)?
            .into_iter()
            .map(|(k, v)| Ok((K::from_scalar(k)?, V::from_scalar(v)?)))
            .collect()
    }

    fn to_value(&self) -> Value {
        Value::Map(
            self.iter()
                .map(|(k, v)| (k.to_scalar(), v.to_scalar()))
                .collect(),
        )
    }
}

impl<K, V> BindValue for MultiMap<K, V>
where
    K: ScalarValue + PartialEq,
    V: ScalarValue,
{
    fn parameter_type() -> ParameterType {
        ParameterType::Map {
            key: K::scalar_type(),
            value: V::scalar_type(),
        }
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        let mut map = MultiMap::new();
        for (k, v) in map_entries(value)? {
            map.insert(K::from_scalar(k)?, V::from_scalar(v)?);
        }
        Ok(map)
    }

    fn to_value(&self) -> Value {
        Value::Map(
            self.iter()
                .map(|(k, v)| (k.to_scalar(), v.to_scalar()))
                .collect(),
        )
    }
}
