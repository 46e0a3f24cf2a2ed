//! Turns mapped raw values into typed [`Value`]s.

use std::sync::Arc;

use command_bind_core::convert::convert;
use command_bind_core::{
    BindError, DefaultPairDeconstructor, MetadataProvider, PairContext, PairDeconstructor,
    ParameterContext, ParameterKind, ParameterType, ParseError, PropertyAccessor, ScalarType,
    TypeConverter, TypeResolver, ValidationResult, Value,
};
use tracing::debug;

use super::lookup::ValueLookup;
use crate::error::Result;
use crate::model::{CommandInfo, CommandModel, CommandParameter};
use crate::parser::CommandTree;

/// Resolves the value of every parameter of every command in `tree`.
///
/// Mapped parameters are converted and accumulated by kind, then checked by
/// their validators. Unmapped parameters take a provided value, their
/// default, or (for switches with an optional value) an unset flag.
///
/// # Errors
///
/// Fails on missing required options, malformed pairs, conversion failures
/// and rejected values.
pub fn resolve_values(
    model: &CommandModel,
    tree: &CommandTree,
    provider: &dyn MetadataProvider,
    resolver: &dyn TypeResolver,
) -> Result<ValueLookup> {
    // A shadowed option and its ancestor twin share one property; whichever
    // of them was given on the command line is the only one bound.
    let mapped: Vec<&PropertyAccessor> = tree
        .nodes
        .iter()
        .flat_map(|node| {
            model
                .command(node.command)
                .parameters
                .iter()
                .filter(|parameter| node.is_mapped(parameter.id))
                .map(|parameter| parameter.property.as_ref())
        })
        .collect();

    let mut lookup = ValueLookup::new();
    for node in &tree.nodes {
        let command = model.command(node.command);
        for parameter in &command.parameters {
            if node.is_mapped(parameter.id) {
                let value = resolve_mapped(provider, resolver, parameter, node.values(parameter.id))?;
                validate_value(parameter, &value)?;
                lookup.set(parameter, value);
            } else if mapped
                .iter()
                .any(|property| property.is_same_backing_property(&parameter.property))
            {
                continue;
            } else if let Some(value) = resolve_unmapped(provider, command, parameter)? {
                lookup.set(parameter, value);
            }
        }
    }
    debug!(values = lookup.len(), "resolved parameter values");
    Ok(lookup)
}

fn resolve_mapped<'v>(
    provider: &dyn MetadataProvider,
    resolver: &dyn TypeResolver,
    parameter: &CommandParameter,
    raw_values: impl Iterator<Item = Option<&'v str>>,
) -> Result<Value> {
    let property = &parameter.property;
    let value = match parameter.kind {
        ParameterKind::Pair => {
            let ParameterType::Map { key, value } = &property.property_type else {
                return Err(BindError::NoPairDeconstructor(property.name.clone()).into());
            };
            let key_converter = provider
                .type_converter(key)
                .ok_or_else(|| BindError::NoConverterFound(key.name().to_string()))?;
            let value_converter = property
                .converter
                .clone()
                .or_else(|| provider.type_converter(value))
                .ok_or_else(|| BindError::NoConverterFound(value.name().to_string()))?;
            let context = PairContext {
                key_type: key,
                value_type: value,
                key_converter: key_converter.as_ref(),
                value_converter: value_converter.as_ref(),
                value_default: provider.create_default_value(value),
            };

            let deconstructor = pair_deconstructor(provider, resolver, property);
            let mut entries = match provider.create_multi_map(key, value) {
                Value::Map(entries) => entries,
                _ => Vec::new(),
            };
            for raw in raw_values {
                let (key, value) = deconstructor.deconstruct(&context, raw.unwrap_or_default())?;
                if !key.is_null() {
                    entries.push((key, value));
                }
            }
            Value::Map(entries)
        }
        ParameterKind::Vector => Value::Array(
            raw_values
                .map(|raw| convert_raw(provider, property, raw.unwrap_or_default()))
                .collect::<std::result::Result<_, _>>()?,
        ),
        ParameterKind::FlagWithValue => {
            let mut flag = provider.create_flag_value(property.property_type.element_type());
            if let Value::Flag { is_set, value } = &mut flag {
                *is_set = true;
                for raw in raw_values.flatten() {
                    *value = Some(Box::new(convert_raw(provider, property, raw)?));
                }
            }
            flag
        }
        ParameterKind::Flag | ParameterKind::Scalar => {
            let mut result = Value::Null;
            for raw in raw_values {
                result = match raw {
                    Some(raw) => convert_raw(provider, property, raw)?,
                    None => Value::Bool(true),
                };
            }
            result
        }
    };
    Ok(value)
}

fn resolve_unmapped(
    provider: &dyn MetadataProvider,
    command: &CommandInfo,
    parameter: &CommandParameter,
) -> Result<Option<Value>> {
    if parameter.is_required && parameter.is_option() {
        return Err(ParseError::MissingRequiredOption {
            command: (!command.is_default_command).then(|| command.name.clone()),
            option: parameter.display_name(),
        }
        .into());
    }

    let property = &parameter.property;
    if let Some(value_provider) = &property.value_provider {
        let context = ParameterContext {
            parameter: &property.name,
            value: &Value::Null,
        };
        if let Some(value) = value_provider.try_get_value(&context) {
            return Ok(Some(convert_default(provider, parameter, value)?));
        }
    }

    if let Some(default) = &parameter.default_value {
        return Ok(Some(convert_default(provider, parameter, default.clone())?));
    }

    if parameter.kind == ParameterKind::FlagWithValue {
        return Ok(Some(
            provider.create_flag_value(property.property_type.element_type()),
        ));
    }
    Ok(None)
}

/// Converts a declared or provided value into the property's shape.
fn convert_default(
    provider: &dyn MetadataProvider,
    parameter: &CommandParameter,
    value: Value,
) -> std::result::Result<Value, BindError> {
    let property = &parameter.property;
    match (parameter.kind, value) {
        (_, Value::Null) => Ok(Value::Null),
        (ParameterKind::FlagWithValue, flag @ Value::Flag { .. }) => Ok(flag),
        (ParameterKind::FlagWithValue, value) => Ok(Value::Flag {
            is_set: false,
            value: Some(Box::new(convert_text(provider, property, value)?)),
        }),
        (_, Value::Array(items)) => items
            .into_iter()
            .map(|item| convert_text(provider, property, item))
            .collect::<std::result::Result<_, _>>()
            .map(Value::Array),
        (_, value) => convert_text(provider, property, value),
    }
}

/// Text given for a non-string type goes through conversion.
fn convert_text(
    provider: &dyn MetadataProvider,
    property: &PropertyAccessor,
    value: Value,
) -> std::result::Result<Value, BindError> {
    match value {
        Value::String(text) if property.property_type.element_type() != &ScalarType::String => {
            convert_raw(provider, property, &text)
        }
        other => Ok(other),
    }
}

/// Converts one raw token to the property's element type.
fn convert_raw(
    provider: &dyn MetadataProvider,
    property: &PropertyAccessor,
    raw: &str,
) -> std::result::Result<Value, BindError> {
    let target = property.property_type.element_type();
    let converter: Option<Arc<dyn TypeConverter>> = property
        .converter
        .clone()
        .or_else(|| provider.type_converter(target));
    if let Some(converter) = converter {
        return convert(converter.as_ref(), raw, target);
    }

    match provider.convert_with_constructor_fallback(target, raw) {
        Some(result) => result.map_err(|reason| BindError::ConversionFailed {
            value: raw.to_string(),
            target: target.name().to_string(),
            valid_values: Vec::new(),
            reason,
        }),
        None => Err(BindError::NoConverterFound(target.name().to_string())),
    }
}

/// A registered deconstructor instance wins over creating one.
fn pair_deconstructor(
    provider: &dyn MetadataProvider,
    resolver: &dyn TypeResolver,
    property: &PropertyAccessor,
) -> Arc<dyn PairDeconstructor> {
    let Some(reference) = &property.pair_deconstructor else {
        return Arc::new(DefaultPairDeconstructor);
    };
    resolver
        .resolve(&reference.type_key)
        .and_then(|instance| instance.downcast::<Arc<dyn PairDeconstructor>>().ok())
        .map(|shared| shared.as_ref().clone())
        .unwrap_or_else(|| provider.create_pair_deconstructor(reference))
}

fn validate_value(parameter: &CommandParameter, value: &Value) -> std::result::Result<(), BindError> {
    let context = ParameterContext {
        parameter: &parameter.property.name,
        value,
    };
    for validator in &parameter.property.validators {
        if let ValidationResult::Error(message) = validator.validate(&context) {
            return Err(BindError::ValidationFailed(message));
        }
    }
    Ok(())
}
