//! Type identities and the semantic type model for settings parameters.
//!
//! Settings properties are described in terms of [`ParameterType`], a
//! language-independent view of the backing field's type. The binding
//! engine only ever reasons about these descriptions; the typed Rust fields
//! are reached through the accessor closures captured in the metadata.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identity of a Rust type or a runtime-declared type.
///
/// Used as the key for dependency resolution, settings metadata lookups and
/// declaring-type comparisons when detecting shadowed parameters.
///
/// # Examples
///
/// ```
/// use command_bind_core::TypeKey;
///
/// let key = TypeKey::of::<String>();
/// assert_eq!(key.short_name(), "String");
///
/// let dynamic = TypeKey::named("deploy-settings");
/// assert_eq!(dynamic.full_name(), "deploy-settings");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeKey(Cow<'static, str>);

impl TypeKey {
    /// Returns the key for a compile-time type.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(Cow::Borrowed(std::any::type_name::<T>()))
    }

    /// Returns the key for a type declared at runtime.
    pub fn named(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// Fully qualified name, including the module path for Rust types.
    pub fn full_name(&self) -> &str {
        &self.0
    }

    /// Name without module path or generic arguments.
    pub fn short_name(&self) -> &str {
        let base = self.0.split('<').next().unwrap_or(&self.0);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An enumeration type with its declared member names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumType {
    /// Identity of the enumeration.
    pub name: TypeKey,
    /// Member names in declaration order.
    pub members: Vec<String>,
}

impl EnumType {
    pub fn new(name: TypeKey, members: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name,
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    /// Finds a member by name, ignoring ASCII case.
    pub fn find_member(&self, name: &str) -> Option<(usize, &str)> {
        self.members
            .iter()
            .enumerate()
            .find(|(_, member)| member.eq_ignore_ascii_case(name))
            .map(|(index, member)| (index, member.as_str()))
    }
}

/// Semantic type of a single (non-collection) value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Bool,
    Char,
    String,
    I8,
    I16,
    I32,
    I64,
    I128,
    U8,
    U16,
    U32,
    U64,
    U128,
    F32,
    F64,
    /// Date and time with an offset.
    DateTime,
    Date,
    Time,
    /// Time span (`[d.]hh:mm[:ss[.fff]]`).
    Duration,
    Uuid,
    Url,
    /// File or directory path.
    Path,
    Enum(EnumType),
    /// A type converted by a registered or attribute-specified converter.
    Custom(TypeKey),
}

impl ScalarType {
    /// Returns `true` for types that have a meaningful default instance.
    ///
    /// Pair deconstruction uses the string form of that default instance when
    /// the value part of a `key=value` token is omitted.
    pub fn is_value_type(&self) -> bool {
        !matches!(
            self,
            Self::String | Self::Url | Self::Path | Self::Custom(_)
        )
    }

    /// Returns `true` for integral and floating point types.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::I8
                | Self::I16
                | Self::I32
                | Self::I64
                | Self::I128
                | Self::U8
                | Self::U16
                | Self::U32
                | Self::U64
                | Self::U128
                | Self::F32
                | Self::F64
        )
    }

    /// Display name used in diagnostics.
    pub fn name(&self) -> &str {
        match self {
            Self::Bool => "bool",
            Self::Char => "char",
            Self::String => "String",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::I128 => "i128",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::U128 => "u128",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::DateTime => "DateTime",
            Self::Date => "Date",
            Self::Time => "Time",
            Self::Duration => "Duration",
            Self::Uuid => "Uuid",
            Self::Url => "Url",
            Self::Path => "Path",
            Self::Enum(ty) => ty.name.short_name(),
            Self::Custom(key) => key.short_name(),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolved semantic type of a settings property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParameterType {
    /// A single required-by-type value.
    Scalar(ScalarType),
    /// A single value that may be absent.
    Nullable(ScalarType),
    /// A sequence; every occurrence appends one element.
    Array(ScalarType),
    /// A dictionary or lookup filled from `key=value` tokens.
    Map { key: ScalarType, value: ScalarType },
    /// A switch that may carry a value.
    FlagValue(ScalarType),
}

impl ParameterType {
    /// Returns `true` for `bool` and `Option<bool>` properties.
    pub fn is_bool(&self) -> bool {
        matches!(
            self,
            Self::Scalar(ScalarType::Bool) | Self::Nullable(ScalarType::Bool)
        )
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    /// Returns `true` when values are deconstructed into key/value pairs.
    pub fn is_pair_deconstructable(&self) -> bool {
        matches!(self, Self::Map { .. })
    }

    pub fn is_flag_value(&self) -> bool {
        matches!(self, Self::FlagValue(_))
    }

    /// The type a single raw token converts into.
    ///
    /// For arrays this is the element type, for flag values the wrapped type
    /// and for maps the value type.
    pub fn element_type(&self) -> &ScalarType {
        match self {
            Self::Scalar(ty) | Self::Nullable(ty) | Self::Array(ty) | Self::FlagValue(ty) => ty,
            Self::Map { value, .. } => value,
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(ty) => write!(f, "{ty}"),
            Self::Nullable(ty) => write!(f, "Option<{ty}>"),
            Self::Array(ty) => write!(f, "Vec<{ty}>"),
            Self::Map { key, value } => write!(f, "Map<{key}, {value}>"),
            Self::FlagValue(ty) => write!(f, "FlagValue<{ty}>"),
        }
    }
}

/// How raw occurrences of a parameter accumulate into its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    /// Boolean switch.
    Flag,
    /// Sequence; each occurrence appends.
    Vector,
    /// Key/value accumulation into a map.
    Pair,
    /// Switch with an optional attached value.
    FlagWithValue,
    /// Single value; last occurrence wins.
    Scalar,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_key_short_name_strips_path_and_generics() {
        let key = TypeKey::of::<Vec<String>>();
        assert_eq!(key.short_name(), "Vec");

        let key = TypeKey::of::<std::path::PathBuf>();
        assert_eq!(key.short_name(), "PathBuf");
    }

    #[test]
    fn test_enum_member_lookup_ignores_case() {
        let days = EnumType::new(TypeKey::named("Day"), ["Monday", "Tuesday"]);
        assert_eq!(days.find_member("MONDAY"), Some((0, "Monday")));
        assert_eq!(days.find_member("tuesday"), Some((1, "Tuesday")));
        assert_eq!(days.find_member("friday"), None);
    }

    #[test]
    fn test_element_type() {
        let map = ParameterType::Map {
            key: ScalarType::String,
            value: ScalarType::I32,
        };
        assert_eq!(map.element_type(), &ScalarType::I32);
        assert!(map.is_pair_deconstructable());
        assert_eq!(
            ParameterType::Array(ScalarType::String).element_type(),
            &ScalarType::String
        );
    }

    #[test]
    fn test_value_types() {
        assert!(ScalarType::I32.is_value_type());
        assert!(ScalarType::Bool.is_value_type());
        assert!(!ScalarType::String.is_value_type());
        assert!(!ScalarType::Path.is_value_type());
    }
}
