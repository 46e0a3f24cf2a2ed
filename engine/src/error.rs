//! Error types for configuring and running a command application.

use command_bind_core::{BindError, ParseError};
use thiserror::Error;

/// Structural problems found while building or validating the command model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// A command or branch has an empty name.
    #[error("command name cannot be empty")]
    EmptyCommandName,

    /// Two commands at the same level share a name or alias.
    #[error("duplicate command name in scope: {0}")]
    DuplicateCommand(String),

    /// A branch was declared without any child commands.
    #[error("branch '{0}' must have at least one child command")]
    BranchWithoutChildren(String),

    /// More than one default child was declared in a branch.
    #[error("branch '{0}' declares more than one default command")]
    MultipleDefaultCommands(String),

    /// Two options visible to one command share a name.
    #[error("command '{command}' has duplicate option '{option}'")]
    DuplicateOption { command: String, option: String },

    /// Two arguments of one command share a value name.
    #[error("command '{command}' has duplicate argument '{argument}'")]
    DuplicateArgument { command: String, argument: String },

    /// An option template could not be parsed.
    #[error("invalid option template '{template}': {reason}")]
    InvalidOptionTemplate { template: String, reason: String },

    /// An argument template could not be parsed.
    #[error("invalid argument template '{template}': {reason}")]
    InvalidArgumentTemplate { template: String, reason: String },

    /// A required argument follows an optional one.
    #[error("command '{command}': required argument '{argument}' follows an optional argument")]
    RequiredArgumentAfterOptional { command: String, argument: String },

    /// A vector argument is not the last argument.
    #[error("command '{command}': vector argument '{argument}' must be the last argument")]
    VectorArgumentNotLast { command: String, argument: String },

    /// More than one vector argument is declared.
    #[error("command '{command}' declares more than one vector argument")]
    MultipleVectorArguments { command: String },

    /// An option with an optional value is not backed by a `FlagValue`.
    #[error("command '{command}': option '{option}' has an optional value but its property is not a FlagValue")]
    OptionalValueWithoutFlagValue { command: String, option: String },

    /// A map-backed property was declared as a positional argument.
    #[error("command '{command}': argument '{argument}' cannot be a key/value pair")]
    PairArgument { command: String, argument: String },

    /// A child command's settings do not extend its parent's settings.
    #[error("settings of command '{command}' must extend the settings of '{parent}'")]
    SettingsNotInherited { command: String, parent: String },

    /// A configured example does not parse.
    #[error("example '{example}' is invalid: {reason}")]
    InvalidExample { example: String, reason: String },

    /// Settings metadata could not be obtained.
    #[error(transparent)]
    Metadata(#[from] BindError),
}

/// Errors loading or saving [`AppSettings`](crate::AppSettings).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// Any failure of a command application run.
#[derive(Debug, Error)]
pub enum CommandAppError {
    /// The configured command model is invalid.
    #[error("{}", join_model_errors(.0))]
    Configuration(Vec<ModelError>),

    /// The tokens did not match the command model.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Settings could not be bound, converted or validated.
    #[error(transparent)]
    Bind(#[from] BindError),

    /// The command could not be created or refused to run.
    #[error("command '{command}' failed: {reason}")]
    Execution { command: String, reason: String },
}

impl From<ModelError> for CommandAppError {
    fn from(error: ModelError) -> Self {
        Self::Configuration(vec![error])
    }
}

fn join_model_errors(errors: &[ModelError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Convenience alias for results with [`CommandAppError`].
pub type Result<T> = std::result::Result<T, CommandAppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_joins_findings() {
        let err = CommandAppError::Configuration(vec![
            ModelError::EmptyCommandName,
            ModelError::BranchWithoutChildren("remote".into()),
        ]);
        assert_eq!(
            err.to_string(),
            "command name cannot be empty; branch 'remote' must have at least one child command"
        );
    }

    #[test]
    fn test_parse_error_is_transparent() {
        let err = CommandAppError::from(ParseError::UnknownOption("--nope".into()));
        assert_eq!(err.to_string(), "Unknown option '--nope'.");
    }
}
