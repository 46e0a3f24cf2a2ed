//! Type conversion from raw command-line text to [`Value`]s.
//!
//! Converters are looked up per [`ScalarType`]: the intrinsic table covers
//! primitives, chrono date/time types, identifiers, URLs, paths and
//! enumerations. Everything else is converted by a converter attached to the
//! property, one registered with the metadata provider, or (for runtime
//! metadata only) a `FromStr` fallback.

use std::fmt;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use url::Url;
use uuid::Uuid;

use crate::error::BindError;
use crate::types::{EnumType, ScalarType};
use crate::value::{CustomValue, EnumValue, Value};

/// Converts raw text into a [`Value`].
pub trait TypeConverter: Send + Sync {
    fn convert_from(&self, input: &str) -> Result<Value, String>;

    /// The finite set of accepted inputs, if there is one.
    fn standard_values(&self) -> Vec<String> {
        Vec::new()
    }
}

impl fmt::Debug for dyn TypeConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TypeConverter")
    }
}

/// Converts `input` and maps failures to [`BindError::ConversionFailed`].
pub fn convert(
    converter: &dyn TypeConverter,
    input: &str,
    target: &ScalarType,
) -> Result<Value, BindError> {
    converter
        .convert_from(input)
        .map_err(|reason| BindError::ConversionFailed {
            value: input.to_string(),
            target: target.name().to_string(),
            valid_values: converter.standard_values(),
            reason,
        })
}

/// Returns the built-in converter for `ty`, if there is one.
pub fn intrinsic_converter(ty: &ScalarType) -> Option<Arc<dyn TypeConverter>> {
    match ty {
        ScalarType::Enum(enum_type) => Some(Arc::new(EnumConverter::new(enum_type.clone()))),
        ScalarType::Custom(_) => None,
        other => Some(Arc::new(IntrinsicConverter(other.clone()))),
    }
}

/// Converter for the built-in scalar types.
#[derive(Debug, Clone)]
pub struct IntrinsicConverter(ScalarType);

impl TypeConverter for IntrinsicConverter {
    fn convert_from(&self, input: &str) -> Result<Value, String> {
        match &self.0 {
            ScalarType::Bool => parse_bool(input).map(Value::Bool),
            ScalarType::Char => {
                let mut chars = input.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Value::Char(c)),
                    _ => Err("expected a single character".to_string()),
                }
            }
            ScalarType::String => Ok(Value::String(input.to_string())),
            ScalarType::I8 => parse_signed::<i8>(input),
            ScalarType::I16 => parse_signed::<i16>(input),
            ScalarType::I32 => parse_signed::<i32>(input),
            ScalarType::I64 => parse_signed::<i64>(input),
            ScalarType::I128 => parse_signed::<i128>(input),
            ScalarType::U8 => parse_unsigned::<u8>(input),
            ScalarType::U16 => parse_unsigned::<u16>(input),
            ScalarType::U32 => parse_unsigned::<u32>(input),
            ScalarType::U64 => parse_unsigned::<u64>(input),
            ScalarType::U128 => parse_unsigned::<u128>(input),
            ScalarType::F32 => input
                .trim()
                .parse::<f32>()
                .map(|v| Value::Float(f64::from(v)))
                .map_err(|err| err.to_string()),
            ScalarType::F64 => input
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|err| err.to_string()),
            ScalarType::DateTime => parse_date_time(input).map(Value::DateTime),
            ScalarType::Date => NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|err| err.to_string()),
            ScalarType::Time => parse_time(input).map(Value::Time),
            ScalarType::Duration => parse_duration(input).map(Value::Duration),
            ScalarType::Uuid => Uuid::parse_str(input.trim())
                .map(Value::Uuid)
                .map_err(|err| err.to_string()),
            ScalarType::Url => Url::parse(input.trim())
                .map(Value::Url)
                .map_err(|err| err.to_string()),
            ScalarType::Path => Ok(Value::Path(PathBuf::from(input))),
            ScalarType::Enum(enum_type) => EnumConverter::new(enum_type.clone()).convert_from(input),
            ScalarType::Custom(key) => Err(format!("no intrinsic conversion for '{key}'")),
        }
    }
}

fn parse_bool(input: &str) -> Result<bool, String> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if input.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err("expected 'true' or 'false'".to_string())
    }
}

/// Splits a `0x` / `#` prefixed hexadecimal literal.
fn hex_digits(input: &str) -> Option<&str> {
    input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .or_else(|| input.strip_prefix('#'))
}

fn parse_signed<T>(input: &str) -> Result<Value, String>
where
    T: FromStr + Into<i128> + TryFrom<i128>,
    T::Err: fmt::Display,
{
    let input = input.trim();
    if let Some(digits) = hex_digits(input) {
        let wide = i128::from_str_radix(digits, 16).map_err(|err| err.to_string())?;
        return T::try_from(wide)
            .map(|v| Value::Int(v.into()))
            .map_err(|_| "value is out of range".to_string());
    }
    input
        .parse::<T>()
        .map(|v| Value::Int(v.into()))
        .map_err(|err| err.to_string())
}

fn parse_unsigned<T>(input: &str) -> Result<Value, String>
where
    T: FromStr + Into<u128> + TryFrom<u128>,
    T::Err: fmt::Display,
{
    let input = input.trim();
    if let Some(digits) = hex_digits(input) {
        let wide = u128::from_str_radix(digits, 16).map_err(|err| err.to_string())?;
        return T::try_from(wide)
            .map(|v| Value::UInt(v.into()))
            .map_err(|_| "value is out of range".to_string());
    }
    input
        .parse::<T>()
        .map(|v| Value::UInt(v.into()))
        .map_err(|err| err.to_string())
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM[:SS]` (UTC) and `YYYY-MM-DD` (UTC
/// midnight).
fn parse_date_time(input: &str) -> Result<DateTime<FixedOffset>, String> {
    let input = input.trim();
    if let Ok(value) = DateTime::parse_from_rfc3339(input) {
        return Ok(value);
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(naive.and_utc().fixed_offset());
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::default()).and_utc().fixed_offset())
        .map_err(|_| "expected an RFC 3339 date and time".to_string())
}

fn parse_time(input: &str) -> Result<NaiveTime, String> {
    let input = input.trim();
    NaiveTime::parse_from_str(input, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(input, "%H:%M"))
        .map_err(|err| err.to_string())
}

/// Parses a time span in `[-][d.]hh:mm[:ss[.fffffff]]` form.
///
/// A bare integer is a number of days.
///
/// # Examples
///
/// ```
/// use chrono::TimeDelta;
/// use command_bind_core::convert::parse_duration;
///
/// assert_eq!(parse_duration("00:30:00"), Ok(TimeDelta::minutes(30)));
/// assert_eq!(parse_duration("1.02:00"), Ok(TimeDelta::hours(26)));
/// assert_eq!(parse_duration("3"), Ok(TimeDelta::days(3)));
/// ```
pub fn parse_duration(input: &str) -> Result<TimeDelta, String> {
    let invalid = || format!("'{input}' is not a valid time span");
    let trimmed = input.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    if body.is_empty() {
        return Err(invalid());
    }

    let span = if !body.contains(':') {
        let days: i64 = body.parse().map_err(|_| invalid())?;
        TimeDelta::try_days(days).ok_or_else(invalid)?
    } else {
        let parts: Vec<&str> = body.split(':').collect();
        if parts.len() > 3 {
            return Err(invalid());
        }
        let (days, hours) = match parts[0].split_once('.') {
            Some((days, hours)) => (days, hours),
            None => ("0", parts[0]),
        };
        let days: i64 = days.parse().map_err(|_| invalid())?;
        let hours: i64 = hours.parse().map_err(|_| invalid())?;
        let minutes: i64 = parts[1].parse().map_err(|_| invalid())?;
        let (seconds, nanos) = match parts.get(2) {
            Some(seconds) => parse_seconds(seconds).ok_or_else(invalid)?,
            None => (0, 0),
        };
        if hours > 23 || minutes > 59 || seconds > 59 {
            return Err(invalid());
        }
        TimeDelta::try_days(days)
            .and_then(|span| span.checked_add(&TimeDelta::hours(hours)))
            .and_then(|span| span.checked_add(&TimeDelta::minutes(minutes)))
            .and_then(|span| span.checked_add(&TimeDelta::seconds(seconds)))
            .and_then(|span| span.checked_add(&TimeDelta::nanoseconds(nanos)))
            .ok_or_else(invalid)?
    };
    Ok(if negative { -span } else { span })
}

fn parse_seconds(text: &str) -> Option<(i64, i64)> {
    match text.split_once('.') {
        Some((whole, fraction)) => {
            if fraction.is_empty() || fraction.len() > 9 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let padded = format!("{fraction:0<9}");
            Some((whole.parse().ok()?, padded.parse().ok()?))
        }
        None => Some((text.parse().ok()?, 0)),
    }
}

/// Formats a time span in the form [`parse_duration`] accepts.
pub fn format_duration(span: TimeDelta) -> String {
    let sign = if span < TimeDelta::zero() { "-" } else { "" };
    let span = span.abs();
    let days = span.num_days();
    let hours = span.num_hours() % 24;
    let minutes = span.num_minutes() % 60;
    let seconds = span.num_seconds() % 60;
    let nanos = span.subsec_nanos();

    let mut text = String::from(sign);
    if days > 0 {
        text.push_str(&format!("{days}."));
    }
    text.push_str(&format!("{hours:02}:{minutes:02}:{seconds:02}"));
    if nanos > 0 {
        // Seven fractional digits, trailing zeros trimmed.
        let ticks = format!("{:07}", nanos / 100);
        text.push('.');
        text.push_str(ticks.trim_end_matches('0'));
    }
    text
}

/// Case-insensitive enumeration converter.
#[derive(Debug, Clone)]
pub struct EnumConverter {
    enum_type: EnumType,
}

impl EnumConverter {
    pub fn new(enum_type: EnumType) -> Self {
        Self { enum_type }
    }
}

impl TypeConverter for EnumConverter {
    fn convert_from(&self, input: &str) -> Result<Value, String> {
        let input = input.trim();
        if let Some((index, member)) = self.enum_type.find_member(input) {
            return Ok(Value::Enum(EnumValue {
                enum_type: self.enum_type.name.clone(),
                member: member.to_string(),
                index,
            }));
        }
        // Numeric input selects a member by declaration index.
        if let Ok(index) = input.parse::<usize>() {
            if let Some(member) = self.enum_type.members.get(index) {
                return Ok(Value::Enum(EnumValue {
                    enum_type: self.enum_type.name.clone(),
                    member: member.clone(),
                    index,
                }));
            }
        }
        Err(format!("'{input}' is not a member of {}", self.enum_type.name.short_name()))
    }

    fn standard_values(&self) -> Vec<String> {
        self.enum_type.members.clone()
    }
}

/// Converter backed by a closure.
///
/// # Examples
///
/// ```
/// use command_bind_core::{FnConverter, TypeConverter, Value};
///
/// let level = FnConverter::new(|input| match input {
///     "low" => Ok(Value::Int(1)),
///     "high" => Ok(Value::Int(9)),
///     _ => Err("unknown level".to_string()),
/// })
/// .with_standard_values(["low", "high"]);
///
/// assert_eq!(level.convert_from("high"), Ok(Value::Int(9)));
/// assert_eq!(level.standard_values(), vec!["low", "high"]);
/// ```
#[derive(Clone)]
pub struct FnConverter {
    convert: Arc<dyn Fn(&str) -> Result<Value, String> + Send + Sync>,
    standard_values: Vec<String>,
}

impl FnConverter {
    pub fn new(convert: impl Fn(&str) -> Result<Value, String> + Send + Sync + 'static) -> Self {
        Self {
            convert: Arc::new(convert),
            standard_values: Vec::new(),
        }
    }

    pub fn with_standard_values(
        mut self,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.standard_values = values.into_iter().map(Into::into).collect();
        self
    }
}

impl TypeConverter for FnConverter {
    fn convert_from(&self, input: &str) -> Result<Value, String> {
        (self.convert)(input)
    }

    fn standard_values(&self) -> Vec<String> {
        self.standard_values.clone()
    }
}

/// Converts through a type's [`FromStr`] implementation, producing
/// [`Value::Custom`].
pub struct FromStrConverter<T>(PhantomData<fn() -> T>);

impl<T> FromStrConverter<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for FromStrConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TypeConverter for FromStrConverter<T>
where
    T: FromStr + fmt::Display + Send + Sync + 'static,
    T::Err: fmt::Display,
{
    fn convert_from(&self, input: &str) -> Result<Value, String> {
        input
            .parse::<T>()
            .map(|value| Value::Custom(CustomValue::new(value)))
            .map_err(|err| err.to_string())
    }
}

/// The default instance of a value type, used when a pair omits its value.
///
/// Returns `None` for types without one (strings, URLs, paths, custom
/// types).
pub fn default_instance(ty: &ScalarType) -> Option<Value> {
    let value = match ty {
        ScalarType::Bool => Value::Bool(false),
        ScalarType::Char => Value::Char('\0'),
        ScalarType::I8 | ScalarType::I16 | ScalarType::I32 | ScalarType::I64 | ScalarType::I128 => {
            Value::Int(0)
        }
        ScalarType::U8 | ScalarType::U16 | ScalarType::U32 | ScalarType::U64 | ScalarType::U128 => {
            Value::UInt(0)
        }
        ScalarType::F32 | ScalarType::F64 => Value::Float(0.0),
        ScalarType::DateTime => Value::DateTime(
            NaiveDate::from_ymd_opt(1, 1, 1)?
                .and_time(NaiveTime::default())
                .and_utc()
                .fixed_offset(),
        ),
        ScalarType::Date => Value::Date(NaiveDate::from_ymd_opt(1, 1, 1)?),
        ScalarType::Time => Value::Time(NaiveTime::default()),
        ScalarType::Duration => Value::Duration(TimeDelta::zero()),
        ScalarType::Uuid => Value::Uuid(Uuid::nil()),
        ScalarType::Enum(enum_type) => Value::Enum(EnumValue {
            enum_type: enum_type.name.clone(),
            member: enum_type.members.first()?.clone(),
            index: 0,
        }),
        ScalarType::String | ScalarType::Url | ScalarType::Path | ScalarType::Custom(_) => {
            return None;
        }
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeKey;

    fn intrinsic(ty: ScalarType) -> Arc<dyn TypeConverter> {
        intrinsic_converter(&ty).unwrap()
    }

    #[test]
    fn test_integer_conversion_respects_width() {
        let byte = intrinsic(ScalarType::U8);
        assert_eq!(byte.convert_from("255"), Ok(Value::UInt(255)));
        assert!(byte.convert_from("256").is_err());
        assert!(byte.convert_from("-1").is_err());

        let int = intrinsic(ScalarType::I32);
        assert_eq!(int.convert_from("-5"), Ok(Value::Int(-5)));
        assert_eq!(int.convert_from("0x1F"), Ok(Value::Int(31)));
        assert!(int.convert_from("five").is_err());
    }

    #[test]
    fn test_bool_conversion_ignores_case() {
        let flag = intrinsic(ScalarType::Bool);
        assert_eq!(flag.convert_from("TRUE"), Ok(Value::Bool(true)));
        assert_eq!(flag.convert_from("false"), Ok(Value::Bool(false)));
        assert!(flag.convert_from("yes").is_err());
    }

    #[test]
    fn test_enum_conversion_is_case_insensitive() {
        let days = EnumType::new(TypeKey::named("Day"), ["Monday", "Friday"]);
        let converter = intrinsic(ScalarType::Enum(days));
        for input in ["monday", "MONDAY", "Monday"] {
            match converter.convert_from(input) {
                Ok(Value::Enum(value)) => assert_eq!(value.member, "Monday"),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(converter.standard_values(), vec!["Monday", "Friday"]);
    }

    #[test]
    fn test_conversion_error_carries_valid_values() {
        let days = ScalarType::Enum(EnumType::new(TypeKey::named("Day"), ["Monday", "Friday"]));
        let converter = intrinsic(days.clone());
        let err = convert(converter.as_ref(), "someday", &days).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to convert 'someday' to Day. Valid values are 'Monday', 'Friday'"
        );
    }

    #[test]
    fn test_duration_round_trip_text() {
        let span = parse_duration("-1.02:03:04.5").unwrap();
        assert_eq!(format_duration(span), "-1.02:03:04.5");
        assert_eq!(format_duration(TimeDelta::zero()), "00:00:00");
        assert!(parse_duration("25:00").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn test_date_time_accepts_several_layouts() {
        let converter = intrinsic(ScalarType::DateTime);
        assert!(converter.convert_from("2024-05-01T10:00:00+02:00").is_ok());
        assert!(converter.convert_from("2024-05-01 10:00").is_ok());
        assert!(converter.convert_from("2024-05-01").is_ok());
        assert!(converter.convert_from("May 1st").is_err());
    }

    #[test]
    fn test_default_instance_text_converts_back() {
        for ty in [
            ScalarType::I32,
            ScalarType::Bool,
            ScalarType::F64,
            ScalarType::DateTime,
            ScalarType::Duration,
            ScalarType::Uuid,
        ] {
            let text = default_instance(&ty).unwrap().to_string();
            assert!(intrinsic(ty.clone()).convert_from(&text).is_ok(), "{ty}: {text}");
        }
        assert_eq!(default_instance(&ScalarType::String), None);
    }
}
