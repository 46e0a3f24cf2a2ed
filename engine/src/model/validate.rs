//! Structural validation of a built command model.
//!
//! Each command is a scope: validation of a scope stops at its first finding
//! and continues with the next command.

use std::collections::HashSet;

use command_bind_core::{EmptySettings, MetadataProvider, ParameterKind, TypeKey};

use super::{CommandId, CommandInfo, CommandModel};
use crate::config::AppSettings;
use crate::error::ModelError;

/// Validates `model`, returning every finding.
///
/// # Examples
///
/// ```
/// use command_bind::{CommandModel, AppSettings, validate_model};
/// use command_bind_core::ReflectionMetadata;
///
/// let errors = validate_model(&CommandModel::default(), &AppSettings::default(), &ReflectionMetadata::new());
/// assert!(errors.is_empty());
/// ```
pub fn validate_model(
    model: &CommandModel,
    settings: &AppSettings,
    provider: &dyn MetadataProvider,
) -> Vec<ModelError> {
    let mut errors = Vec::new();

    errors.extend(validate_names(model, &model.roots, settings));
    for command in model.commands() {
        if let Some(error) = validate_command(model, command, settings, provider) {
            errors.push(error);
        }
    }
    errors
}

fn command_key(name: &str, settings: &AppSettings) -> String {
    if settings.case_sensitivity.commands {
        name.to_string()
    } else {
        name.to_ascii_lowercase()
    }
}

fn validate_names(model: &CommandModel, scope: &[CommandId], settings: &AppSettings) -> Option<ModelError> {
    let mut seen = HashSet::new();
    for id in scope {
        let command = model.command(*id);
        if command.is_default_command {
            continue;
        }
        if command.name.trim().is_empty() {
            return Some(ModelError::EmptyCommandName);
        }
        for name in std::iter::once(&command.name).chain(&command.aliases) {
            if !seen.insert(command_key(name, settings)) {
                return Some(ModelError::DuplicateCommand(name.clone()));
            }
        }
    }
    None
}

fn validate_command(
    model: &CommandModel,
    command: &CommandInfo,
    settings: &AppSettings,
    provider: &dyn MetadataProvider,
) -> Option<ModelError> {
    if command.is_branch() && command.children.is_empty() {
        return Some(ModelError::BranchWithoutChildren(command.name.clone()));
    }

    let defaults = command
        .children
        .iter()
        .filter(|id| model.command(**id).is_default_command)
        .count();
    if defaults > 1 {
        return Some(ModelError::MultipleDefaultCommands(command.name.clone()));
    }

    if let Some(error) = validate_names(model, &command.children, settings) {
        return Some(error);
    }

    // Branches without settings of their own accept any child settings.
    if let Some(parent) = command
        .parent
        .map(|id| model.command(id))
        .filter(|parent| parent.settings_type != TypeKey::of::<EmptySettings>())
    {
        match provider.settings_metadata(&command.settings_type) {
            Ok(metadata) if !metadata.is_assignable_to(&parent.settings_type) => {
                return Some(ModelError::SettingsNotInherited {
                    command: command.name.clone(),
                    parent: parent.name.clone(),
                });
            }
            Ok(_) => {}
            Err(err) => return Some(ModelError::Metadata(err)),
        }
    }

    validate_options(model, command, settings).or_else(|| validate_arguments(command))
}

fn validate_options(model: &CommandModel, command: &CommandInfo, settings: &AppSettings) -> Option<ModelError> {
    let long_key = |name: &str| {
        if settings.case_sensitivity.long_options {
            format!("--{name}")
        } else {
            format!("--{}", name.to_ascii_lowercase())
        }
    };

    let mut seen = HashSet::new();
    for (parameter, option) in command.options() {
        if option.value_is_optional && !parameter.property.property_type.is_flag_value() {
            return Some(ModelError::OptionalValueWithoutFlagValue {
                command: command.name.clone(),
                option: parameter.display_name(),
            });
        }

        let names = option
            .long_names
            .iter()
            .map(|name| long_key(name))
            .chain(option.short_names.iter().map(|name| format!("-{name}")));
        for name in names {
            if !seen.insert(name.clone()) {
                return Some(duplicate_option(command, name));
            }

            // Visible ancestor options may only be re-declared by a shadow of
            // the same property.
            let clash = model.ancestors(command.id).any(|ancestor| {
                ancestor.options().any(|(inherited, inherited_option)| {
                    let same_name = inherited_option
                        .long_names
                        .iter()
                        .map(|long| long_key(long))
                        .chain(inherited_option.short_names.iter().map(|short| format!("-{short}")))
                        .any(|inherited_name| inherited_name == name);
                    same_name
                        && !(option.is_shadowed
                            && inherited.property.is_same_backing_property(&parameter.property))
                })
            });
            if clash {
                return Some(duplicate_option(command, name));
            }
        }
    }
    None
}

fn duplicate_option(command: &CommandInfo, option: String) -> ModelError {
    ModelError::DuplicateOption {
        command: command.name.clone(),
        option,
    }
}

fn validate_arguments(command: &CommandInfo) -> Option<ModelError> {
    let arguments = command.arguments();
    let mut seen = HashSet::new();
    let mut optional_seen = false;
    let mut vector_seen = false;

    for (index, (parameter, argument)) in arguments.iter().enumerate() {
        if parameter.property.property_type.is_pair_deconstructable() {
            return Some(ModelError::PairArgument {
                command: command.name.clone(),
                argument: argument.value_name.clone(),
            });
        }
        if !seen.insert(argument.value_name.as_str()) {
            return Some(ModelError::DuplicateArgument {
                command: command.name.clone(),
                argument: argument.value_name.clone(),
            });
        }
        if parameter.is_required && optional_seen {
            return Some(ModelError::RequiredArgumentAfterOptional {
                command: command.name.clone(),
                argument: argument.value_name.clone(),
            });
        }
        optional_seen |= !parameter.is_required;

        if parameter.kind == ParameterKind::Vector {
            if vector_seen {
                return Some(ModelError::MultipleVectorArguments {
                    command: command.name.clone(),
                });
            }
            vector_seen = true;
            if index + 1 != arguments.len() {
                return Some(ModelError::VectorArgumentNotLast {
                    command: command.name.clone(),
                    argument: argument.value_name.clone(),
                });
            }
        }
    }
    None
}
