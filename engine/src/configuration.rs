//! Declaring the command tree of an application.

use std::fmt;

use command_bind_core::{
    DescribeSettings, DynamicSettings, Instance, TypeKey, TypeRegistration, TypeResolver,
};

use crate::command::{Command, CommandContext, CommandFactory, command_factory, delegate_factory};
use crate::config::{AppSettings, CaseSensitivity};

/// Name given to default commands. It cannot be typed on the command line.
pub const DEFAULT_COMMAND_NAME: &str = "__default_command";

/// One command or branch as declared by the application.
pub struct ConfiguredCommand {
    pub(crate) name: String,
    pub(crate) aliases: Vec<String>,
    pub(crate) description: Option<String>,
    pub(crate) examples: Vec<Vec<String>>,
    pub(crate) is_hidden: bool,
    pub(crate) is_default: bool,
    pub(crate) data: Option<Instance>,
    pub(crate) settings_type: TypeKey,
    pub(crate) command_type: Option<TypeKey>,
    pub(crate) registration: Option<TypeRegistration>,
    /// `None` for branches.
    pub(crate) factory: Option<CommandFactory>,
    pub(crate) children: Vec<ConfiguredCommand>,
}

impl ConfiguredCommand {
    fn new(name: impl Into<String>, settings_type: TypeKey) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            description: None,
            examples: Vec::new(),
            is_hidden: false,
            is_default: false,
            data: None,
            settings_type,
            command_type: None,
            registration: None,
            factory: None,
            children: Vec::new(),
        }
    }

    fn of_command<C: Command>(name: impl Into<String>, factory: CommandFactory) -> Self {
        let command_type = TypeKey::of::<C>();
        let mut command = Self::new(name, TypeKey::of::<C::Settings>());
        command.registration = Some(TypeRegistration::command::<C::Settings>(
            command_type.clone(),
            None,
        ));
        command.command_type = Some(command_type);
        command.factory = Some(factory);
        command
    }

    fn as_default(mut self) -> Self {
        self.is_default = true;
        self.is_hidden = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_branch(&self) -> bool {
        self.factory.is_none()
    }

    pub fn with_alias(&mut self, alias: impl Into<String>) -> &mut Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_description(&mut self, description: impl Into<String>) -> &mut Self {
        let description = description.into();
        if let Some(TypeRegistration {
            command: Some(metadata),
            ..
        }) = &mut self.registration
        {
            metadata.description = Some(description.clone());
        }
        self.description = Some(description);
        self
    }

    /// Adds an example invocation, validated when `validate_examples` is on.
    pub fn with_example<I, T>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.examples.push(args.into_iter().map(Into::into).collect());
        self
    }

    /// Attaches data handed to the command through its context.
    pub fn with_data(&mut self, data: Instance) -> &mut Self {
        self.data = Some(data);
        self
    }

    pub fn hidden(&mut self) -> &mut Self {
        self.is_hidden = true;
        self
    }
}

impl fmt::Debug for ConfiguredCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfiguredCommand")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("settings_type", &self.settings_type)
            .field("command_type", &self.command_type)
            .field("is_branch", &self.is_branch())
            .field("is_default", &self.is_default)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

/// Adding commands, shared by the application and its branches.
///
/// # Examples
///
/// ```
/// use command_bind::{Command, CommandContext, ConfigureCommands, Configurator};
/// use command_bind_core::EmptySettings;
/// use tokio_util::sync::CancellationToken;
///
/// #[derive(Default)]
/// struct List;
/// impl Command for List {
///     type Settings = EmptySettings;
///     fn execute(&self, _: &CommandContext, _: &EmptySettings, _: &CancellationToken) -> i32 { 0 }
/// }
///
/// let mut config = Configurator::new();
/// config.add_branch::<EmptySettings>("remote", |remote| {
///     remote.add_command::<List>("list").with_alias("ls");
///     remote.set_default_command::<List>();
/// });
/// assert_eq!(config.commands().len(), 1);
/// ```
pub trait ConfigureCommands {
    #[doc(hidden)]
    fn push_command(&mut self, command: ConfiguredCommand) -> &mut ConfiguredCommand;

    #[doc(hidden)]
    fn push_default_command(&mut self, command: ConfiguredCommand) -> &mut ConfiguredCommand;

    /// Adds a command created through `Default` unless the resolver has one.
    fn add_command<C: Command + Default>(&mut self, name: &str) -> &mut ConfiguredCommand {
        self.push_command(ConfiguredCommand::of_command::<C>(
            name,
            command_factory(|_| Some(C::default())),
        ))
    }

    /// Adds a command created by `factory` unless the resolver has one.
    fn add_command_with<C, F>(&mut self, name: &str, factory: F) -> &mut ConfiguredCommand
    where
        C: Command,
        F: Fn(&dyn TypeResolver) -> Option<C> + Send + Sync + 'static,
    {
        self.push_command(ConfiguredCommand::of_command::<C>(name, command_factory(factory)))
    }

    /// Adds a command backed by a closure.
    fn add_delegate<S, F>(&mut self, name: &str, run: F) -> &mut ConfiguredCommand
    where
        S: DescribeSettings,
        F: Fn(&CommandContext, &S) -> i32 + Send + Sync + 'static,
    {
        let mut command = ConfiguredCommand::new(name, TypeKey::of::<S>());
        command.registration = Some(TypeRegistration::settings::<S>());
        command.factory = Some(delegate_factory(run));
        self.push_command(command)
    }

    /// Adds a closure-backed command whose settings were described at runtime.
    fn add_dynamic_delegate<F>(&mut self, name: &str, settings_type: TypeKey, run: F) -> &mut ConfiguredCommand
    where
        F: Fn(&CommandContext, &DynamicSettings) -> i32 + Send + Sync + 'static,
    {
        let mut command = ConfiguredCommand::new(name, settings_type);
        command.factory = Some(delegate_factory(run));
        self.push_command(command)
    }

    /// Adds a branch whose children share settings extending `S`.
    fn add_branch<S: DescribeSettings>(
        &mut self,
        name: &str,
        configure: impl FnOnce(&mut ConfiguredCommand),
    ) -> &mut ConfiguredCommand {
        let mut branch = ConfiguredCommand::new(name, TypeKey::of::<S>());
        branch.registration = Some(TypeRegistration::settings::<S>());
        configure(&mut branch);
        self.push_command(branch)
    }

    /// Adds a branch whose settings were described at runtime.
    fn add_dynamic_branch(
        &mut self,
        name: &str,
        settings_type: TypeKey,
        configure: impl FnOnce(&mut ConfiguredCommand),
    ) -> &mut ConfiguredCommand {
        let mut branch = ConfiguredCommand::new(name, settings_type);
        configure(&mut branch);
        self.push_command(branch)
    }

    /// Sets the command used when no command name is given.
    fn set_default_command<C: Command + Default>(&mut self) -> &mut ConfiguredCommand {
        let command = ConfiguredCommand::of_command::<C>(
            DEFAULT_COMMAND_NAME,
            command_factory(|_| Some(C::default())),
        );
        self.push_default_command(command.as_default())
    }

    fn set_default_command_with<C, F>(&mut self, factory: F) -> &mut ConfiguredCommand
    where
        C: Command,
        F: Fn(&dyn TypeResolver) -> Option<C> + Send + Sync + 'static,
    {
        let command = ConfiguredCommand::of_command::<C>(DEFAULT_COMMAND_NAME, command_factory(factory));
        self.push_default_command(command.as_default())
    }

    /// Sets a closure-backed default command with runtime-described settings.
    fn set_dynamic_default_delegate<F>(&mut self, settings_type: TypeKey, run: F) -> &mut ConfiguredCommand
    where
        F: Fn(&CommandContext, &DynamicSettings) -> i32 + Send + Sync + 'static,
    {
        let mut command = ConfiguredCommand::new(DEFAULT_COMMAND_NAME, settings_type);
        command.factory = Some(delegate_factory(run));
        self.push_default_command(command.as_default())
    }
}

impl ConfigureCommands for ConfiguredCommand {
    fn push_command(&mut self, command: ConfiguredCommand) -> &mut ConfiguredCommand {
        self.children.push(command);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// A branch's default command is a hidden child.
    fn push_default_command(&mut self, command: ConfiguredCommand) -> &mut ConfiguredCommand {
        self.push_command(command)
    }
}

/// Collects the application's settings and command declarations.
#[derive(Debug, Default)]
pub struct Configurator {
    pub(crate) settings: AppSettings,
    pub(crate) commands: Vec<ConfiguredCommand>,
    pub(crate) default_command: Option<ConfiguredCommand>,
    pub(crate) examples: Vec<Vec<String>>,
}

impl Configurator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut AppSettings {
        &mut self.settings
    }

    pub fn commands(&self) -> &[ConfiguredCommand] {
        &self.commands
    }

    pub fn default_command(&self) -> Option<&ConfiguredCommand> {
        self.default_command.as_ref()
    }

    pub fn with_settings(&mut self, settings: AppSettings) -> &mut Self {
        self.settings = settings;
        self
    }

    pub fn set_application_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.settings.application_name = Some(name.into());
        self
    }

    pub fn set_application_version(&mut self, version: impl Into<String>) -> &mut Self {
        self.settings.application_version = Some(version.into());
        self
    }

    pub fn case_sensitivity(&mut self, case_sensitivity: CaseSensitivity) -> &mut Self {
        self.settings.case_sensitivity = case_sensitivity;
        self
    }

    pub fn strict_parsing(&mut self, strict: bool) -> &mut Self {
        self.settings.strict_parsing = strict;
        self
    }

    pub fn validate_examples(&mut self, validate: bool) -> &mut Self {
        self.settings.validate_examples = validate;
        self
    }

    pub fn add_example<I, T>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.examples.push(args.into_iter().map(Into::into).collect());
        self
    }

    /// Every registration reported to the metadata provider, depth first.
    pub(crate) fn registrations(&self) -> Vec<&TypeRegistration> {
        fn collect<'a>(command: &'a ConfiguredCommand, out: &mut Vec<&'a TypeRegistration>) {
            if let Some(registration) = &command.registration {
                out.push(registration);
            }
            for child in &command.children {
                collect(child, out);
            }
        }

        let mut out = Vec::new();
        for command in self.default_command.iter().chain(&self.commands) {
            collect(command, &mut out);
        }
        out
    }
}

impl ConfigureCommands for Configurator {
    fn push_command(&mut self, command: ConfiguredCommand) -> &mut ConfiguredCommand {
        self.commands.push(command);
        let last = self.commands.len() - 1;
        &mut self.commands[last]
    }

    fn push_default_command(&mut self, command: ConfiguredCommand) -> &mut ConfiguredCommand {
        self.default_command.insert(command)
    }
}
