use std::sync::Arc;

use command_bind_core::{ParameterKind, PropertyAccessor, Value};
use indexmap::IndexMap;

use crate::model::{CommandParameter, ParameterId};

/// A resolved value for one parameter.
#[derive(Debug, Clone)]
pub struct LookupEntry {
    pub parameter: ParameterId,
    pub property: Arc<PropertyAccessor>,
    pub kind: ParameterKind,
    pub value: Value,
}

/// Resolved values of every parameter along a matched command path, in
/// resolution order.
#[derive(Debug, Clone, Default)]
pub struct ValueLookup {
    entries: IndexMap<ParameterId, LookupEntry>,
}

impl ValueLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, parameter: ParameterId) -> Option<&LookupEntry> {
        self.entries.get(&parameter)
    }

    /// Replaces the value of `parameter`.
    pub fn set(&mut self, parameter: &CommandParameter, value: Value) {
        self.entries.insert(
            parameter.id,
            LookupEntry {
                parameter: parameter.id,
                property: parameter.property.clone(),
                kind: parameter.kind,
                value,
            },
        );
    }

    /// Returns `true` when a parameter backed by a property called `name`
    /// (ignoring case) has a value.
    pub fn has_parameter_with_name(&self, name: &str) -> bool {
        self.value_for_name(name).is_some()
    }

    pub fn value_for_name(&self, name: &str) -> Option<&LookupEntry> {
        self.entries
            .values()
            .find(|entry| entry.property.name.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &LookupEntry> {
        self.entries.values()
    }
}
