//! Command tree resolution and settings binding for command-line applications.
//!
//! An application declares a tree of commands and branches, each bound to a
//! settings type described through [`command_bind_core::DescribeSettings`].
//! For every invocation the engine:
//!
//! 1. builds a [`CommandModel`] from the declarations, resolving each
//!    command's options and arguments from its settings' inheritance levels,
//! 2. validates the model ([`validate_model`]),
//! 3. matches the argument vector against the model ([`CommandTreeParser`]),
//! 4. resolves and converts the matched values ([`resolve_values`]),
//! 5. binds them into a settings instance through the best constructor or
//!    property assignment ([`CommandBinder`]),
//! 6. executes the leaf [`Command`].
//!
//! # Example
//!
//! ```
//! use command_bind::{CommandApp, ConfigureCommands, Invocation};
//! use command_bind_core::{CommandSettings, DescribeSettings, PropertyAccessor, SettingsDescriptor};
//!
//! #[derive(Debug, Default)]
//! struct AddSettings { name: String, count: Option<i32>, force: bool }
//! impl CommandSettings for AddSettings {}
//!
//! impl DescribeSettings for AddSettings {
//!     fn describe() -> SettingsDescriptor {
//!         SettingsDescriptor::with_default::<Self>()
//!             .property(PropertyAccessor::field("Name", |s: &Self| &s.name, |s| &mut s.name).argument(0, "<NAME>"))
//!             .property(PropertyAccessor::field("Count", |s: &Self| &s.count, |s| &mut s.count).argument(1, "[COUNT]"))
//!             .property(PropertyAccessor::field("Force", |s: &Self| &s.force, |s| &mut s.force).option("-f|--force"))
//!     }
//! }
//!
//! let mut app = CommandApp::new();
//! app.configure(|config| {
//!     config.add_delegate::<AddSettings, _>("add", |_, _| 0);
//! });
//!
//! let args: Vec<String> = ["add", "alice", "5", "-f"].iter().map(|s| s.to_string()).collect();
//! let Ok(Invocation::Command(bound)) = app.bind(&args) else { panic!() };
//! let settings = bound.settings.downcast_ref::<AddSettings>().unwrap();
//! assert_eq!((settings.name.as_str(), settings.count, settings.force), ("alice", Some(5), true));
//! ```

mod app;
mod binder;
mod command;
mod config;
mod configuration;
mod error;
mod model;
mod parser;

pub use app::{BoundCommand, CommandApp, Invocation};
pub use binder::{CommandBinder, LookupEntry, ValueLookup, resolve_values};
pub use command::{Command, CommandContext, RemainingArguments};
pub use config::{AppSettings, CaseSensitivity};
pub use configuration::{ConfigureCommands, ConfiguredCommand, Configurator, DEFAULT_COMMAND_NAME};
pub use error::{CommandAppError, ConfigError, ModelError, Result};
pub use model::{
    ArgumentTemplate, CommandArgument, CommandId, CommandInfo, CommandModel, CommandOption,
    CommandParameter, OptionTemplate, ParameterDetail, ParameterId, build_model,
    parse_argument_template, parse_option_template, validate_model,
};
pub use parser::{
    CommandTree, CommandTreeNode, CommandTreeParser, MappedParameter, ParseOutcome, ParseResult,
    Token, Tokenized, tokenize,
};
