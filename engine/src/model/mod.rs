//! The command model: every configured command with its resolved parameters.
//!
//! Commands live in an arena indexed by [`CommandId`]; parents are referenced
//! by id and never owned. Parameters are numbered across the whole model by
//! [`ParameterId`], which keys mapped values and the value lookup.

mod builder;
mod template;
mod validate;

use std::fmt;
use std::sync::Arc;

use command_bind_core::{Instance, ParameterKind, PropertyAccessor, TypeKey, Value};

pub use builder::build_model;
pub use template::{ArgumentTemplate, OptionTemplate, parse_argument_template, parse_option_template};
pub use validate::validate_model;

use crate::command::CommandFactory;
use crate::config::CaseSensitivity;

/// Index of a command in its [`CommandModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(pub(crate) usize);

/// Model-wide identity of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParameterId(pub(crate) usize);

/// Option-specific parameter data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOption {
    pub long_names: Vec<String>,
    pub short_names: Vec<String>,
    pub value_name: Option<String>,
    pub value_is_optional: bool,
    /// Re-declares an option already exposed by an ancestor command.
    pub is_shadowed: bool,
}

impl CommandOption {
    pub fn has_long_name(&self, name: &str, case: &CaseSensitivity) -> bool {
        self.long_names
            .iter()
            .any(|long| case.long_option_matches(long, name))
    }

    pub fn has_short_name(&self, name: &str) -> bool {
        self.short_names.iter().any(|short| short == name)
    }
}

/// Argument-specific parameter data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandArgument {
    pub value_name: String,
    /// Zero-based and contiguous within the command.
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterDetail {
    Option(CommandOption),
    Argument(CommandArgument),
}

/// An option or argument of a command.
#[derive(Debug, Clone)]
pub struct CommandParameter {
    pub id: ParameterId,
    pub property: Arc<PropertyAccessor>,
    pub kind: ParameterKind,
    pub is_required: bool,
    pub is_hidden: bool,
    pub default_value: Option<Value>,
    pub detail: ParameterDetail,
}

impl CommandParameter {
    /// Name of the backing property.
    pub fn property_name(&self) -> &str {
        &self.property.name
    }

    pub fn as_option(&self) -> Option<&CommandOption> {
        match &self.detail {
            ParameterDetail::Option(option) => Some(option),
            ParameterDetail::Argument(_) => None,
        }
    }

    pub fn as_argument(&self) -> Option<&CommandArgument> {
        match &self.detail {
            ParameterDetail::Argument(argument) => Some(argument),
            ParameterDetail::Option(_) => None,
        }
    }

    pub fn is_option(&self) -> bool {
        self.as_option().is_some()
    }

    /// `--long`, `-s` or the argument's value name.
    pub fn display_name(&self) -> String {
        match &self.detail {
            ParameterDetail::Option(option) => option
                .long_names
                .first()
                .map(|long| format!("--{long}"))
                .or_else(|| option.short_names.first().map(|short| format!("-{short}")))
                .unwrap_or_default(),
            ParameterDetail::Argument(argument) => argument.value_name.clone(),
        }
    }
}

/// A command or branch in the model.
#[derive(Clone)]
pub struct CommandInfo {
    pub id: CommandId,
    pub name: String,
    pub aliases: Vec<String>,
    pub parent: Option<CommandId>,
    pub children: Vec<CommandId>,
    pub settings_type: TypeKey,
    pub command_type: Option<TypeKey>,
    pub description: Option<String>,
    pub parameters: Vec<CommandParameter>,
    pub examples: Vec<Vec<String>>,
    pub is_default_command: bool,
    pub is_hidden: bool,
    pub(crate) data: Option<Instance>,
    pub(crate) factory: Option<CommandFactory>,
}

impl CommandInfo {
    pub fn is_branch(&self) -> bool {
        self.factory.is_none()
    }

    pub fn options(&self) -> impl Iterator<Item = (&CommandParameter, &CommandOption)> {
        self.parameters
            .iter()
            .filter_map(|parameter| parameter.as_option().map(|option| (parameter, option)))
    }

    /// Arguments in position order.
    pub fn arguments(&self) -> Vec<(&CommandParameter, &CommandArgument)> {
        let mut arguments: Vec<_> = self
            .parameters
            .iter()
            .filter_map(|parameter| parameter.as_argument().map(|argument| (parameter, argument)))
            .collect();
        arguments.sort_by_key(|(_, argument)| argument.position);
        arguments
    }

    pub fn matches_name(&self, token: &str, case: &CaseSensitivity) -> bool {
        case.command_matches(&self.name, token)
            || self
                .aliases
                .iter()
                .any(|alias| case.command_matches(alias, token))
    }
}

impl fmt::Debug for CommandInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandInfo")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("settings_type", &self.settings_type)
            .field("parameters", &self.parameters)
            .field("is_default_command", &self.is_default_command)
            .field("is_branch", &self.is_branch())
            .finish_non_exhaustive()
    }
}

/// The immutable command tree of an application.
#[derive(Debug, Clone, Default)]
pub struct CommandModel {
    pub application_name: Option<String>,
    pub examples: Vec<Vec<String>>,
    pub(crate) commands: Vec<CommandInfo>,
    pub(crate) roots: Vec<CommandId>,
    pub(crate) default_command: Option<CommandId>,
    pub(crate) parameters: Vec<(CommandId, usize)>,
}

impl CommandModel {
    pub fn command(&self, id: CommandId) -> &CommandInfo {
        &self.commands[id.0]
    }

    pub fn commands(&self) -> impl Iterator<Item = &CommandInfo> {
        self.commands.iter()
    }

    pub fn roots(&self) -> impl Iterator<Item = &CommandInfo> {
        self.roots.iter().map(|id| self.command(*id))
    }

    pub fn default_command(&self) -> Option<&CommandInfo> {
        self.default_command.map(|id| self.command(id))
    }

    /// The command owning `id` and the parameter itself.
    pub fn parameter(&self, id: ParameterId) -> (&CommandInfo, &CommandParameter) {
        let (command, index) = self.parameters[id.0];
        let command = self.command(command);
        (command, &command.parameters[index])
    }

    /// A root command matching `token` by name or alias.
    pub fn find_root(&self, token: &str, case: &CaseSensitivity) -> Option<CommandId> {
        self.roots
            .iter()
            .copied()
            .find(|id| self.command(*id).matches_name(token, case))
    }

    /// A child of `parent` matching `token`. Default commands never match by name.
    pub fn find_child(&self, parent: CommandId, token: &str, case: &CaseSensitivity) -> Option<CommandId> {
        self.command(parent).children.iter().copied().find(|id| {
            let child = self.command(*id);
            !child.is_default_command && child.matches_name(token, case)
        })
    }

    pub fn default_child(&self, parent: CommandId) -> Option<CommandId> {
        self.command(parent)
            .children
            .iter()
            .copied()
            .find(|id| self.command(*id).is_default_command)
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: CommandId) -> impl Iterator<Item = &CommandInfo> {
        std::iter::successors(self.command(id).parent, |current| self.command(*current).parent)
            .map(|ancestor| self.command(ancestor))
    }

    /// Space-separated names from the root to `id`.
    pub fn path(&self, id: CommandId) -> String {
        let mut names: Vec<&str> = self
            .ancestors(id)
            .map(|command| command.name.as_str())
            .collect();
        names.reverse();
        names.push(&self.command(id).name);
        names.join(" ")
    }
}
