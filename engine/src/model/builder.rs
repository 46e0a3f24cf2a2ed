//! Builds the [`CommandModel`] from a configuration and settings metadata.

use std::sync::Arc;

use command_bind_core::{
    ArgumentAttribute, MetadataProvider, OptionAttribute, ParameterAttribute, ParameterKind,
    ParameterType, PropertyAccessor, ScalarType, SettingsLevel, Value,
};
use tracing::debug;

use super::template::{parse_argument_template, parse_option_template};
use super::{
    CommandArgument, CommandId, CommandInfo, CommandModel, CommandOption, CommandParameter,
    ParameterDetail, ParameterId,
};
use crate::configuration::{ConfiguredCommand, Configurator};
use crate::error::ModelError;

/// Builds the command model for `configurator`.
///
/// Parameters of each command come from its settings type's inheritance
/// levels, base-most first. Options already exposed by an ancestor command
/// are dropped unless they may shadow it; arguments already exposed by an
/// ancestor are dropped.
///
/// # Errors
///
/// Returns [`ModelError::Metadata`] when a settings type is unknown to the
/// provider and the template errors for malformed option or argument
/// templates.
pub fn build_model(
    configurator: &Configurator,
    provider: &dyn MetadataProvider,
) -> Result<CommandModel, ModelError> {
    let mut builder = ModelBuilder {
        provider,
        model: CommandModel {
            application_name: configurator.settings.application_name.clone(),
            examples: configurator.examples.clone(),
            ..CommandModel::default()
        },
    };

    if let Some(default) = &configurator.default_command {
        let id = builder.build_command(None, default)?;
        builder.model.default_command = Some(id);
    }
    for command in &configurator.commands {
        let id = builder.build_command(None, command)?;
        builder.model.roots.push(id);
    }

    let model = builder.model;
    debug!(
        commands = model.commands.len(),
        roots = model.roots.len(),
        parameters = model.parameters.len(),
        has_default = model.default_command.is_some(),
        "built command model"
    );
    Ok(model)
}

struct ModelBuilder<'a> {
    provider: &'a dyn MetadataProvider,
    model: CommandModel,
}

/// A parameter before its final position is known.
struct PendingParameter {
    parameter: CommandParameter,
    declared_position: i32,
}

impl ModelBuilder<'_> {
    fn build_command(
        &mut self,
        parent: Option<CommandId>,
        configured: &ConfiguredCommand,
    ) -> Result<CommandId, ModelError> {
        let id = CommandId(self.model.commands.len());
        self.model.commands.push(CommandInfo {
            id,
            name: configured.name.clone(),
            aliases: configured.aliases.clone(),
            parent,
            children: Vec::new(),
            settings_type: configured.settings_type.clone(),
            command_type: configured.command_type.clone(),
            description: configured.description.clone(),
            parameters: Vec::new(),
            examples: configured.examples.clone(),
            is_default_command: configured.is_default,
            is_hidden: configured.is_hidden,
            data: configured.data.clone(),
            factory: configured.factory.clone(),
        });

        let mut parameters = self.build_parameters(id, configured)?;
        for (index, parameter) in parameters.iter_mut().enumerate() {
            parameter.id = ParameterId(self.model.parameters.len());
            self.model.parameters.push((id, index));
        }
        self.model.commands[id.0].parameters = parameters;

        for child in &configured.children {
            let child_id = self.build_command(Some(id), child)?;
            self.model.commands[id.0].children.push(child_id);
        }
        Ok(id)
    }

    fn build_parameters(
        &self,
        command: CommandId,
        configured: &ConfiguredCommand,
    ) -> Result<Vec<CommandParameter>, ModelError> {
        let metadata = self.provider.settings_metadata(&configured.settings_type)?;

        // A level whose type is an ancestor command's settings type sorts
        // before the levels in between.
        let mut groups: Vec<(i32, i32, &SettingsLevel)> = Vec::new();
        let mut level = 0;
        let mut sort_order = 0;
        for (index, settings_level) in metadata.levels.iter().enumerate() {
            groups.push((level, sort_order, settings_level));
            if let Some(next) = metadata.levels.get(index + 1) {
                if self
                    .model
                    .ancestors(command)
                    .any(|ancestor| ancestor.settings_type == next.settings_type)
                {
                    level -= 1;
                }
            }
            sort_order -= 1;
        }
        groups.sort_by_key(|(level, sort_order, _)| (*level, *sort_order));

        let mut result = Vec::new();
        let mut argument_position = 0;
        for (_, _, settings_level) in groups {
            let mut pending = Vec::new();
            for property in &settings_level.properties {
                match &property.attribute {
                    Some(ParameterAttribute::Option(attribute)) => {
                        let mut parameter = build_option(property, attribute)?;
                        if self.ancestor_has_option(command, property) {
                            if !attribute.allow_shadowing {
                                continue;
                            }
                            if let ParameterDetail::Option(option) = &mut parameter.detail {
                                option.is_shadowed = true;
                            }
                        }
                        pending.push(PendingParameter {
                            parameter,
                            declared_position: 0,
                        });
                    }
                    Some(ParameterAttribute::Argument(attribute)) => {
                        if self.ancestor_has_argument(command, property) {
                            continue;
                        }
                        pending.push(PendingParameter {
                            parameter: build_argument(property, attribute)?,
                            declared_position: attribute.position,
                        });
                    }
                    None => {}
                }
            }

            // Stable: equal declared positions keep declaration order.
            let mut arguments: Vec<usize> = pending
                .iter()
                .enumerate()
                .filter(|(_, pending)| !pending.parameter.is_option())
                .map(|(index, _)| index)
                .collect();
            arguments.sort_by_key(|index| pending[*index].declared_position);
            for index in arguments {
                if let ParameterDetail::Argument(argument) = &mut pending[index].parameter.detail {
                    argument.position = argument_position;
                    argument_position += 1;
                }
            }

            result.extend(pending.into_iter().map(|pending| pending.parameter));
        }
        Ok(result)
    }

    fn ancestor_has_option(&self, command: CommandId, property: &PropertyAccessor) -> bool {
        self.model.ancestors(command).any(|ancestor| {
            ancestor
                .options()
                .any(|(parameter, _)| parameter.property.is_same_backing_property(property))
        })
    }

    fn ancestor_has_argument(&self, command: CommandId, property: &PropertyAccessor) -> bool {
        self.model.ancestors(command).any(|ancestor| {
            ancestor
                .arguments()
                .iter()
                .any(|(parameter, _)| parameter.property.is_same_backing_property(property))
        })
    }
}

fn build_option(
    property: &Arc<PropertyAccessor>,
    attribute: &OptionAttribute,
) -> Result<CommandParameter, ModelError> {
    let template = parse_option_template(&attribute.template)?;
    let kind = if template.value_is_optional {
        ParameterKind::FlagWithValue
    } else if property.property_type.is_pair_deconstructable()
        && (property.pair_deconstructor.is_some() || property.converter.is_none())
    {
        ParameterKind::Pair
    } else {
        parameter_kind(&property.property_type)
    };

    Ok(CommandParameter {
        id: ParameterId(0),
        property: property.clone(),
        kind,
        is_required: attribute.is_required,
        is_hidden: attribute.is_hidden,
        default_value: default_value(property),
        detail: ParameterDetail::Option(CommandOption {
            long_names: template.long_names,
            short_names: template.short_names,
            value_name: template.value_name,
            value_is_optional: template.value_is_optional,
            is_shadowed: false,
        }),
    })
}

fn build_argument(
    property: &Arc<PropertyAccessor>,
    attribute: &ArgumentAttribute,
) -> Result<CommandParameter, ModelError> {
    let template = parse_argument_template(&attribute.template)?;
    Ok(CommandParameter {
        id: ParameterId(0),
        property: property.clone(),
        kind: parameter_kind(&property.property_type),
        is_required: template.is_required,
        is_hidden: false,
        default_value: default_value(property),
        detail: ParameterDetail::Argument(CommandArgument {
            value_name: template.value_name,
            position: 0,
        }),
    })
}

fn parameter_kind(property_type: &ParameterType) -> ParameterKind {
    match property_type {
        ty if ty.is_bool() => ParameterKind::Flag,
        ParameterType::Array(_) => ParameterKind::Vector,
        ParameterType::FlagValue(_) => ParameterKind::FlagWithValue,
        _ => ParameterKind::Scalar,
    }
}

/// Plain `bool` properties default to `false`.
fn default_value(property: &PropertyAccessor) -> Option<Value> {
    match (&property.default_value, &property.property_type) {
        (Some(value), _) => Some(value.clone()),
        (None, ParameterType::Scalar(ScalarType::Bool)) => Some(Value::Bool(false)),
        (None, _) => None,
    }
}
