//! The application driver: configure, parse, bind and execute.

use std::fmt;
use std::sync::Arc;

use command_bind_core::{
    BindError, CommandSettings, KnownTypes, MetadataProvider, ReflectionMetadata, ServiceRegistry,
    SettingsProvider, TypeKey, TypeRegistrar, TypeResolver, ValidationResult,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::binder::CommandBinder;
use crate::command::{CommandContext, RemainingArguments};
use crate::configuration::Configurator;
use crate::error::{CommandAppError, ModelError, Result};
use crate::model::{CommandModel, build_model, validate_model};
use crate::parser::{CommandTree, CommandTreeParser, ParseOutcome};

/// What an argument vector resolves to, without executing anything.
#[derive(Debug)]
pub enum Invocation {
    /// Help was requested; carries the command path it was requested for.
    Help(Option<String>),
    /// `--version` was given.
    Version(String),
    Command(BoundCommand),
}

/// A matched command with its bound settings.
#[derive(Debug)]
pub struct BoundCommand {
    /// Command names from the root, default commands included.
    pub path: Vec<String>,
    pub settings: Arc<dyn CommandSettings>,
    pub remaining: RemainingArguments,
}

/// A configured command-line application.
///
/// Each run builds and validates the command model, registers the known
/// settings types with the type registrar, parses the arguments, binds the
/// leaf command's settings and executes the command.
///
/// # Examples
///
/// ```
/// use command_bind::{CommandApp, ConfigureCommands};
/// use command_bind_core::{CommandSettings, DescribeSettings, PropertyAccessor, SettingsDescriptor};
///
/// #[derive(Debug, Default)]
/// struct Greet { name: String }
/// impl CommandSettings for Greet {}
/// impl DescribeSettings for Greet {
///     fn describe() -> SettingsDescriptor {
///         SettingsDescriptor::with_default::<Self>()
///             .property(PropertyAccessor::field("Name", |s: &Self| &s.name, |s| &mut s.name).argument(0, "<NAME>"))
///     }
/// }
///
/// let mut app = CommandApp::new();
/// app.configure(|config| {
///     config.add_delegate::<Greet, _>("greet", |_, settings| settings.name.len() as i32);
/// });
///
/// let args: Vec<String> = ["greet", "alice"].iter().map(|s| s.to_string()).collect();
/// assert_eq!(app.run(&args), 5);
/// assert_eq!(app.run(&["greet".to_string()]), -1);
/// ```
pub struct CommandApp {
    configurator: Configurator,
    provider: Arc<dyn MetadataProvider>,
    registrar: Box<dyn TypeRegistrar>,
}

impl Default for CommandApp {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CommandApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandApp")
            .field("configurator", &self.configurator)
            .finish_non_exhaustive()
    }
}

struct Prepared {
    model: CommandModel,
    resolver: Arc<dyn TypeResolver>,
    settings_provider: Arc<SettingsProvider>,
}

impl CommandApp {
    /// An application using runtime metadata discovery and the built-in
    /// service registry.
    pub fn new() -> Self {
        Self {
            configurator: Configurator::new(),
            provider: Arc::new(ReflectionMetadata::new()),
            registrar: Box::new(ServiceRegistry::new()),
        }
    }

    pub fn with_metadata(mut self, provider: Arc<dyn MetadataProvider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_registrar(mut self, registrar: impl TypeRegistrar + 'static) -> Self {
        self.registrar = Box::new(registrar);
        self
    }

    pub fn configure(&mut self, configure: impl FnOnce(&mut Configurator)) -> &mut Self {
        configure(&mut self.configurator);
        self
    }

    pub fn configurator(&self) -> &Configurator {
        &self.configurator
    }

    /// Runs the application, returning the command's exit code or `-1` on
    /// failure.
    pub fn run(&mut self, args: &[String]) -> i32 {
        self.run_with_cancellation(args, &CancellationToken::new())
    }

    pub fn run_with_cancellation(&mut self, args: &[String], cancellation: &CancellationToken) -> i32 {
        match self.try_run_with_cancellation(args, cancellation) {
            Ok(code) => code,
            Err(err) => {
                error!(error = %err, "command failed");
                -1
            }
        }
    }

    /// Runs the application, surfacing failures as errors.
    pub fn try_run(&mut self, args: &[String]) -> Result<i32> {
        self.try_run_with_cancellation(args, &CancellationToken::new())
    }

    pub fn try_run_with_cancellation(&mut self, args: &[String], cancellation: &CancellationToken) -> Result<i32> {
        let prepared = self.prepare()?;
        let model = &prepared.model;
        let parsed = CommandTreeParser::new(model, &self.configurator.settings).parse(args)?;
        let tree = match parsed.outcome {
            ParseOutcome::Tree(tree) => tree,
            ParseOutcome::Help(command) => {
                info!(command = ?command.map(|id| model.path(id)), "help requested");
                return Ok(0);
            }
            ParseOutcome::Version => {
                info!(
                    version = self.configurator.settings.application_version.as_deref(),
                    "version requested"
                );
                return Ok(0);
            }
        };

        let settings = self.bind_tree(&prepared, &tree)?;
        let leaf = tree.leaf().ok_or(command_bind_core::ParseError::NoCommandSpecified)?;
        let command = model.command(leaf.command);
        let path = model.path(leaf.command);

        let factory = command.factory.as_ref().ok_or_else(|| CommandAppError::Execution {
            command: path.clone(),
            reason: "a branch cannot be executed".to_string(),
        })?;
        let executable = factory(prepared.resolver.as_ref()).ok_or_else(|| CommandAppError::Execution {
            command: path.clone(),
            reason: "the command could not be created".to_string(),
        })?;

        let context = CommandContext {
            name: command.name.clone(),
            arguments: args.to_vec(),
            remaining: parsed.remaining,
            data: command.data.clone(),
        };
        if let ValidationResult::Error(message) = executable.validate(&context, settings.as_ref())? {
            return Err(BindError::ValidationFailed(message).into());
        }

        info!(command = %path, "executing command");
        let code = executable.execute(&context, settings.as_ref(), cancellation)?;
        debug!(command = %path, exit_code = code, "command finished");
        Ok(code)
    }

    /// Builds and validates the command model without parsing anything.
    pub fn model(&mut self) -> Result<CommandModel> {
        Ok(self.prepare()?.model)
    }

    /// Parses and binds `args` without executing the matched command.
    pub fn bind(&mut self, args: &[String]) -> Result<Invocation> {
        let prepared = self.prepare()?;
        let model = &prepared.model;
        let parsed = CommandTreeParser::new(model, &self.configurator.settings).parse(args)?;
        match parsed.outcome {
            ParseOutcome::Help(command) => Ok(Invocation::Help(command.map(|id| model.path(id)))),
            ParseOutcome::Version => Ok(Invocation::Version(
                self.configurator
                    .settings
                    .application_version
                    .clone()
                    .unwrap_or_default(),
            )),
            ParseOutcome::Tree(tree) => {
                let settings = self.bind_tree(&prepared, &tree)?;
                Ok(Invocation::Command(BoundCommand {
                    path: tree.path(model).into_iter().map(str::to_string).collect(),
                    settings,
                    remaining: parsed.remaining,
                }))
            }
        }
    }

    /// Binds the leaf settings and publishes them through the registered
    /// [`SettingsProvider`].
    fn bind_tree(&self, prepared: &Prepared, tree: &CommandTree) -> Result<Arc<dyn CommandSettings>> {
        let leaf = tree.leaf().ok_or(command_bind_core::ParseError::NoCommandSpecified)?;
        let settings_type = prepared.model.command(leaf.command).settings_type.clone();
        let settings: Arc<dyn CommandSettings> =
            CommandBinder::new(&prepared.model, self.provider.as_ref(), prepared.resolver.as_ref())
                .bind_as(tree, &settings_type)?
                .into();
        prepared.settings_provider.populate(settings_type, settings.clone());
        Ok(settings)
    }

    /// Builds and validates the model, then builds the resolver.
    fn prepare(&mut self) -> Result<Prepared> {
        for registration in self.configurator.registrations() {
            self.provider.discover(registration);
        }

        let model = build_model(&self.configurator, self.provider.as_ref())?;
        let settings = &self.configurator.settings;
        let mut errors = validate_model(&model, settings, self.provider.as_ref());
        if errors.is_empty() && settings.validate_examples {
            errors.extend(validate_examples(&model, &self.configurator));
        }
        if !errors.is_empty() {
            return Err(CommandAppError::Configuration(errors));
        }

        let known = known_types(&model);
        self.provider
            .register_known_types(self.registrar.as_mut(), &known);
        let settings_provider = Arc::new(SettingsProvider::new());
        self.registrar
            .register_instance(TypeKey::of::<SettingsProvider>(), settings_provider.clone());
        let resolver = self.registrar.build();
        debug!(
            commands = known.commands.len(),
            settings = known.settings.len(),
            "registered known types"
        );
        Ok(Prepared {
            model,
            resolver,
            settings_provider,
        })
    }
}

fn known_types(model: &CommandModel) -> KnownTypes {
    let mut known = KnownTypes::default();
    for command in model.commands() {
        if let Some(command_type) = &command.command_type {
            if !known.commands.contains(command_type) {
                known.commands.push(command_type.clone());
            }
        }
        if !known.settings.contains(&command.settings_type) {
            known.settings.push(command.settings_type.clone());
        }
    }
    known
}

/// Every example, application-wide and per command, must parse.
fn validate_examples(model: &CommandModel, configurator: &Configurator) -> Vec<ModelError> {
    let parser = CommandTreeParser::new(model, &configurator.settings);
    model
        .examples
        .iter()
        .chain(model.commands().flat_map(|command| command.examples.iter()))
        .filter_map(|example| {
            parser.parse(example).err().map(|err| ModelError::InvalidExample {
                example: example.join(" "),
                reason: err.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI32, Ordering};

    use command_bind_core::{DescribeSettings, EmptySettings, PropertyAccessor, SettingsDescriptor, TypeKey};

    use super::*;
    use crate::command::Command;
    use crate::configuration::ConfigureCommands;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[derive(Debug, Default)]
    struct CountSettings {
        count: i32,
    }
    impl CommandSettings for CountSettings {}
    impl DescribeSettings for CountSettings {
        fn describe() -> SettingsDescriptor {
            SettingsDescriptor::with_default::<Self>().property(
                PropertyAccessor::field("Count", |s: &Self| &s.count, |s| &mut s.count)
                    .option("-c|--count <N>")
                    .default_to(1_i32),
            )
        }
    }

    struct Counter {
        total: Arc<AtomicI32>,
    }
    impl Command for Counter {
        type Settings = CountSettings;

        fn validate(&self, _: &CommandContext, settings: &CountSettings) -> ValidationResult {
            if settings.count > 10 {
                return ValidationResult::error("count is too large");
            }
            ValidationResult::Success
        }

        fn execute(&self, context: &CommandContext, settings: &CountSettings, _: &CancellationToken) -> i32 {
            let step = context.data_as::<i32>().copied().unwrap_or(1);
            self.total.fetch_add(settings.count * step, Ordering::SeqCst);
            0
        }
    }

    #[test]
    fn test_resolver_provides_registered_command() {
        let total = Arc::new(AtomicI32::new(0));
        let mut registry = ServiceRegistry::new();
        registry.register_instance(
            TypeKey::of::<Counter>(),
            Arc::new(Counter { total: total.clone() }),
        );

        let mut app = CommandApp::new().with_registrar(registry);
        app.configure(|config| {
            config
                .add_command_with::<Counter, _>("count", |_| None)
                .with_data(Arc::new(10_i32));
        });

        assert_eq!(app.run(&args(&["count", "-c", "3"])), 0);
        assert_eq!(app.run(&args(&["count"])), 0);
        assert_eq!(total.load(Ordering::SeqCst), 40);
    }

    #[test]
    fn test_missing_command_instance_is_an_execution_error() {
        let mut app = CommandApp::new();
        app.configure(|config| {
            config.add_command_with::<Counter, _>("count", |_| None);
        });
        let err = app.try_run(&args(&["count"])).unwrap_err();
        assert!(matches!(err, CommandAppError::Execution { .. }));
    }

    #[test]
    fn test_command_validation_stops_execution() {
        let total = Arc::new(AtomicI32::new(0));
        let shared = total.clone();
        let mut app = CommandApp::new();
        app.configure(move |config| {
            config.add_command_with::<Counter, _>("count", move |_| {
                Some(Counter {
                    total: shared.clone(),
                })
            });
        });
        let err = app.try_run(&args(&["count", "-c", "11"])).unwrap_err();
        assert_eq!(err.to_string(), "count is too large");
        assert_eq!(total.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalid_examples_are_configuration_errors() {
        let mut app = CommandApp::new();
        app.configure(|config| {
            config.validate_examples(true);
            config
                .add_delegate::<CountSettings, _>("count", |_, _| 0)
                .with_example(["count", "--count", "2"])
                .with_example(["count", "--nope"]);
        });
        let err = app.try_run(&args(&["count"])).unwrap_err();
        match err {
            CommandAppError::Configuration(errors) => {
                assert_eq!(
                    errors,
                    vec![ModelError::InvalidExample {
                        example: "count --nope".into(),
                        reason: "Unknown option '--nope'.".into(),
                    }]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_help_and_version_do_not_execute() {
        let mut app = CommandApp::new();
        app.configure(|config| {
            config.set_application_version("1.2.3");
            config.add_delegate::<EmptySettings, _>("fail", |_, _| 9);
        });
        assert_eq!(app.run(&args(&["--help"])), 0);
        assert_eq!(app.run(&args(&["--version"])), 0);
        assert_eq!(app.run(&args(&["fail", "-h"])), 0);
        assert_eq!(app.run(&args(&["fail"])), 9);

        match app.bind(&args(&["fail", "--help"])).unwrap() {
            Invocation::Help(command) => assert_eq!(command.as_deref(), Some("fail")),
            other => panic!("unexpected invocation: {other:?}"),
        }
    }

    #[test]
    fn test_bind_reports_path_and_settings() {
        let mut app = CommandApp::new();
        app.configure(|config| {
            config.add_branch::<EmptySettings>("tools", |tools| {
                tools.add_delegate::<CountSettings, _>("count", |_, _| 0);
            });
        });
        let Invocation::Command(bound) = app.bind(&args(&["tools", "count", "-c", "4"])).unwrap() else {
            panic!("expected a bound command");
        };
        assert_eq!(bound.path, vec!["tools".to_string(), "count".to_string()]);
        assert_eq!(bound.settings.downcast_ref::<CountSettings>().unwrap().count, 4);
    }
}
