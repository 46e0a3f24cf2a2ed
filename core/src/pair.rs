//! Deconstruction of raw `key=value` tokens for map-backed parameters.

use std::fmt;
use std::sync::Arc;

use crate::convert::TypeConverter;
use crate::error::ParseError;
use crate::types::{ScalarType, TypeKey};
use crate::value::Value;

/// What a deconstructor needs to turn text into a typed key and value.
pub struct PairContext<'a> {
    pub key_type: &'a ScalarType,
    pub value_type: &'a ScalarType,
    pub key_converter: &'a dyn TypeConverter,
    pub value_converter: &'a dyn TypeConverter,
    /// Default instance of `value_type` from the metadata provider; a bare
    /// key receives its text.
    pub value_default: Option<Value>,
}

impl PairContext<'_> {
    pub fn convert_key(&self, raw: &str) -> Result<Value, ParseError> {
        self.key_converter
            .convert_from(raw)
            .map_err(|_| ParseError::ValueNotInValidFormat(raw.to_string()))
    }

    pub fn convert_value(&self, raw: &str) -> Result<Value, ParseError> {
        self.value_converter
            .convert_from(raw)
            .map_err(|_| ParseError::ValueNotInValidFormat(raw.to_string()))
    }
}

/// Splits one raw occurrence of a pair parameter into a key and a value.
///
/// A returned key of [`Value::Null`] drops the occurrence.
pub trait PairDeconstructor: Send + Sync {
    fn deconstruct(&self, context: &PairContext<'_>, input: &str) -> Result<(Value, Value), ParseError>;
}

impl fmt::Debug for dyn PairDeconstructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PairDeconstructor")
    }
}

/// Splits on the first `=`; a bare key receives the value type's default.
///
/// # Examples
///
/// ```
/// use command_bind_core::convert::intrinsic_converter;
/// use command_bind_core::{DefaultPairDeconstructor, PairContext, PairDeconstructor, ScalarType, Value};
///
/// let key = intrinsic_converter(&ScalarType::String).unwrap();
/// let value = intrinsic_converter(&ScalarType::I32).unwrap();
/// let context = PairContext {
///     key_type: &ScalarType::String,
///     value_type: &ScalarType::I32,
///     key_converter: key.as_ref(),
///     value_converter: value.as_ref(),
///     value_default: Some(Value::Int(0)),
/// };
///
/// let pair = DefaultPairDeconstructor.deconstruct(&context, "port=80").unwrap();
/// assert_eq!(pair, (Value::String("port".into()), Value::Int(80)));
///
/// let bare = DefaultPairDeconstructor.deconstruct(&context, "port").unwrap();
/// assert_eq!(bare.1, Value::Int(0));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPairDeconstructor;

impl PairDeconstructor for DefaultPairDeconstructor {
    fn deconstruct(&self, context: &PairContext<'_>, input: &str) -> Result<(Value, Value), ParseError> {
        let parts: Vec<&str> = input.split('=').collect();
        if parts.len() > 2 {
            return Err(ParseError::ValueNotInValidFormat(input.to_string()));
        }

        let key = context.convert_key(parts[0]).map_err(|_| ParseError::ValueNotInValidFormat(input.to_string()))?;
        let raw_value = match parts.get(1) {
            Some(value) => (*value).to_string(),
            None => context
                .value_default
                .as_ref()
                .map(Value::to_string)
                .unwrap_or_default(),
        };
        let value = context
            .convert_value(&raw_value)
            .map_err(|_| ParseError::ValueNotInValidFormat(input.to_string()))?;
        Ok((key, value))
    }
}

type DeconstructFn = dyn Fn(&PairContext<'_>, &str) -> Result<(Value, Value), ParseError> + Send + Sync;

/// Deconstructor backed by a closure.
#[derive(Clone)]
pub struct FnPairDeconstructor(Arc<DeconstructFn>);

impl FnPairDeconstructor {
    pub fn new(
        deconstruct: impl Fn(&PairContext<'_>, &str) -> Result<(Value, Value), ParseError> + Send + Sync + 'static,
    ) -> Self {
        Self(Arc::new(deconstruct))
    }

    /// Splits on the first `separator` and converts both halves.
    pub fn split_on(separator: char) -> Self {
        Self::new(move |context, input| {
            let (key, value) = input
                .split_once(separator)
                .ok_or_else(|| ParseError::ValueNotInValidFormat(input.to_string()))?;
            Ok((context.convert_key(key)?, context.convert_value(value)?))
        })
    }
}

impl PairDeconstructor for FnPairDeconstructor {
    fn deconstruct(&self, context: &PairContext<'_>, input: &str) -> Result<(Value, Value), ParseError> {
        (self.0)(context, input)
    }
}

/// Reference from a property to its custom pair deconstructor.
///
/// The deconstructor is resolved from the type resolver under `type_key`
/// (stored as `Arc<dyn PairDeconstructor>`) and otherwise created through the
/// metadata provider.
#[derive(Clone)]
pub struct PairDeconstructorRef {
    pub type_key: TypeKey,
    create: fn() -> Arc<dyn PairDeconstructor>,
}

impl PairDeconstructorRef {
    pub fn of<D: PairDeconstructor + Default + 'static>() -> Self {
        fn create<D: PairDeconstructor + Default + 'static>() -> Arc<dyn PairDeconstructor> {
            Arc::new(D::default())
        }
        Self {
            type_key: TypeKey::of::<D>(),
            create: create::<D>,
        }
    }

    pub fn create(&self) -> Arc<dyn PairDeconstructor> {
        (self.create)()
    }
}

impl fmt::Debug for PairDeconstructorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PairDeconstructorRef").field(&self.type_key).finish()
    }
}
