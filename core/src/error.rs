//! Error types for parsing and binding.
//!
//! Parse errors come from matching tokens against the command model and from
//! deconstructing raw pair values. Bind errors cover everything that happens
//! once the tokens are known to be well formed: conversion, constructor
//! selection, dependency resolution and validation.

use thiserror::Error;

/// Errors raised while matching tokens or deconstructing raw values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// An option token did not match any option visible to the command.
    #[error("Unknown option '{0}'.")]
    UnknownOption(String),

    /// A branch received a token that is not one of its child commands.
    #[error("Unknown command '{0}'.")]
    UnknownCommand(String),

    /// A positional token arrived when no argument slot was left.
    #[error("Could not match '{0}' with an argument.")]
    UnexpectedArgument(String),

    /// A required positional argument was not supplied.
    #[error("{}", missing_message(command.as_deref(), "argument", argument))]
    MissingRequiredArgument {
        command: Option<String>,
        argument: String,
    },

    /// A required option was not supplied.
    #[error("{}", missing_message(command.as_deref(), "option", option))]
    MissingRequiredOption {
        command: Option<String>,
        option: String,
    },

    /// A value-taking option was given without a value.
    #[error("Option '{0}' is defined but no value has been provided.")]
    OptionHasNoValue(String),

    /// A value-taking short option appeared inside a group of short options.
    #[error("Option '{0}' requires a value and cannot be used inside an option group.")]
    OptionValueInGroup(String),

    /// An option token without a name, such as `--=value`.
    #[error("Expected an option name in '{0}'.")]
    OptionNameMissing(String),

    /// A raw value could not be deconstructed or converted.
    #[error("The value '{0}' is not in a correct format.")]
    ValueNotInValidFormat(String),

    /// A branch command was invoked without one of its children.
    #[error("Command '{0}' requires a subcommand.")]
    MissingSubcommand(String),

    /// No command was given and the application has no default command.
    #[error("No command was specified.")]
    NoCommandSpecified,
}

fn missing_message(command: Option<&str>, what: &str, name: &str) -> String {
    match command {
        Some(command) => format!("Command '{command}' is missing required {what} '{name}'."),
        None => format!("Missing required {what} '{name}'."),
    }
}

/// Errors raised while turning matched values into a settings instance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// Raw text could not be converted to the declared type.
    #[error("Failed to convert '{value}' to {target}.{}", valid_values_hint(valid_values))]
    ConversionFailed {
        value: String,
        target: String,
        valid_values: Vec<String>,
        reason: String,
    },

    /// No converter exists for the declared type.
    #[error("Could not find converter for type '{0}'.")]
    NoConverterFound(String),

    /// Several constructors tie on score and satisfied count.
    #[error("{}", ambiguous_message(settings_type, candidates))]
    AmbiguousConstructors {
        settings_type: String,
        candidates: Vec<String>,
    },

    /// A dependency could not be resolved from the type resolver.
    #[error("Could not resolve type '{0}'.")]
    CouldNotResolveType(String),

    /// The settings type is unknown to the metadata provider.
    #[error("Settings type '{0}' is not known to the metadata provider.")]
    UnknownSettingsType(String),

    /// The settings instance could not be created.
    #[error("Could not create settings of type '{settings_type}': {reason}")]
    SettingsCreationFailed {
        settings_type: String,
        reason: String,
    },

    /// A bound value could not be written to its property.
    #[error("Could not assign a value to property '{property}': {reason}")]
    PropertyAssignment { property: String, reason: String },

    /// A constructor argument had an unexpected shape.
    #[error("Invalid constructor argument '{name}': {reason}")]
    ConstructorArgument { name: String, reason: String },

    /// A pair deconstructor could not be created.
    #[error("Could not create pair deconstructor of type '{0}'.")]
    NoPairDeconstructor(String),

    /// A command type has no known settings type.
    #[error("Could not get settings type for command of type '{0}'.")]
    CouldNotGetSettingsType(String),

    /// A declared validator rejected the settings or one of its values.
    #[error("{0}")]
    ValidationFailed(String),
}

fn valid_values_hint(values: &[String]) -> String {
    if values.is_empty() {
        String::new()
    } else {
        format!(" Valid values are '{}'", values.join("', '"))
    }
}

fn ambiguous_message(settings_type: &str, candidates: &[String]) -> String {
    let listing = candidates
        .iter()
        .map(|candidate| format!("  - {candidate}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Ambiguous constructor selection for settings type '{settings_type}'. \
         Multiple constructors have the same number of satisfiable parameters from command-line values:\n\
         {listing}\n\
         Consider removing one of the constructors or making the parameter names distinct."
    )
}

/// Errors raised when reading bound settings through a
/// [`SettingsProvider`](crate::SettingsProvider).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsAccessError {
    #[error("Settings have not been populated yet. Settings are only available once a command line has been bound.")]
    NotPopulated,

    #[error("Settings are of type '{actual}', not the expected type '{expected}'.")]
    WrongType { actual: String, expected: String },
}

/// Errors raised when a dynamic [`Value`](crate::Value) does not fit a typed
/// field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: String,
        found: &'static str,
    },

    #[error("value {value} is out of range for {target}")]
    OutOfRange { value: String, target: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_argument_message_mentions_command() {
        let err = ParseError::MissingRequiredArgument {
            command: Some("greet".into()),
            argument: "NAME".into(),
        };
        assert_eq!(
            err.to_string(),
            "Command 'greet' is missing required argument 'NAME'."
        );

        let err = ParseError::MissingRequiredArgument {
            command: None,
            argument: "NAME".into(),
        };
        assert_eq!(err.to_string(), "Missing required argument 'NAME'.");
    }

    #[test]
    fn test_conversion_message_lists_valid_values() {
        let err = BindError::ConversionFailed {
            value: "someday".into(),
            target: "Day".into(),
            valid_values: vec!["Monday".into(), "Friday".into()],
            reason: "unknown member".into(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to convert 'someday' to Day. Valid values are 'Monday', 'Friday'"
        );
    }

    #[test]
    fn test_ambiguous_message_lists_every_candidate() {
        let err = BindError::AmbiguousConstructors {
            settings_type: "Settings".into(),
            candidates: vec!["Settings(String name)".into(), "Settings(i32 count)".into()],
        };
        let message = err.to_string();
        assert!(message.contains("  - Settings(String name)"));
        assert!(message.contains("  - Settings(i32 count)"));
    }
}
