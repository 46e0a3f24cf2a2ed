//! Commands, the context they run in, and their type-erased form.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use command_bind_core::{
    CommandSettings, DescribeSettings, Instance, MultiMap, TypeKey, TypeResolver, ValidationResult,
};
use tokio_util::sync::CancellationToken;

use crate::error::CommandAppError;

/// Tokens that were not matched against the command model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemainingArguments {
    /// Unknown options and their values, collected when parsing is not strict.
    pub parsed: MultiMap<String, Option<String>>,
    /// Every token after `--`, verbatim.
    pub raw: Vec<String>,
}

/// What a command knows about its invocation.
#[derive(Clone)]
pub struct CommandContext {
    /// Name of the executed command.
    pub name: String,
    /// The full argument vector.
    pub arguments: Vec<String>,
    pub remaining: RemainingArguments,
    /// Data attached to the command when it was configured.
    pub data: Option<Instance>,
}

impl CommandContext {
    pub fn data_as<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.data.as_ref()?.downcast_ref::<T>()
    }
}

impl fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandContext")
            .field("name", &self.name)
            .field("arguments", &self.arguments)
            .field("remaining", &self.remaining)
            .field("has_data", &self.data.is_some())
            .finish()
    }
}

/// An executable command bound to a settings type.
///
/// # Examples
///
/// ```
/// use command_bind::{Command, CommandContext};
/// use command_bind_core::EmptySettings;
/// use tokio_util::sync::CancellationToken;
///
/// struct Ping;
///
/// impl Command for Ping {
///     type Settings = EmptySettings;
///
///     fn execute(&self, _: &CommandContext, _: &EmptySettings, _: &CancellationToken) -> i32 {
///         0
///     }
/// }
/// ```
pub trait Command: Send + Sync + 'static {
    type Settings: DescribeSettings;

    /// Runs after binding and before [`execute`](Command::execute).
    fn validate(&self, _context: &CommandContext, _settings: &Self::Settings) -> ValidationResult {
        ValidationResult::Success
    }

    fn execute(
        &self,
        context: &CommandContext,
        settings: &Self::Settings,
        cancellation: &CancellationToken,
    ) -> i32;
}

pub(crate) trait ErasedCommand: Send + Sync {
    fn validate(
        &self,
        context: &CommandContext,
        settings: &dyn CommandSettings,
    ) -> Result<ValidationResult, CommandAppError>;

    fn execute(
        &self,
        context: &CommandContext,
        settings: &dyn CommandSettings,
        cancellation: &CancellationToken,
    ) -> Result<i32, CommandAppError>;
}

/// Creates the command to execute, consulting the resolver first.
pub(crate) type CommandFactory =
    Arc<dyn Fn(&dyn TypeResolver) -> Option<Arc<dyn ErasedCommand>> + Send + Sync>;

fn settings_of<'a, S: CommandSettings>(
    context: &CommandContext,
    settings: &'a dyn CommandSettings,
) -> Result<&'a S, CommandAppError> {
    settings
        .downcast_ref::<S>()
        .ok_or_else(|| CommandAppError::Execution {
            command: context.name.clone(),
            reason: format!(
                "bound settings are not {}",
                TypeKey::of::<S>().short_name()
            ),
        })
}

struct TypedCommand<C>(Arc<C>);

impl<C: Command> ErasedCommand for TypedCommand<C> {
    fn validate(
        &self,
        context: &CommandContext,
        settings: &dyn CommandSettings,
    ) -> Result<ValidationResult, CommandAppError> {
        let settings = settings_of::<C::Settings>(context, settings)?;
        Ok(self.0.validate(context, settings))
    }

    fn execute(
        &self,
        context: &CommandContext,
        settings: &dyn CommandSettings,
        cancellation: &CancellationToken,
    ) -> Result<i32, CommandAppError> {
        let settings = settings_of::<C::Settings>(context, settings)?;
        Ok(self.0.execute(context, settings, cancellation))
    }
}

struct DelegateCommand<S, F> {
    run: F,
    _settings: PhantomData<fn(&S)>,
}

impl<S, F> ErasedCommand for DelegateCommand<S, F>
where
    S: CommandSettings,
    F: Fn(&CommandContext, &S) -> i32 + Send + Sync,
{
    fn validate(
        &self,
        _context: &CommandContext,
        _settings: &dyn CommandSettings,
    ) -> Result<ValidationResult, CommandAppError> {
        Ok(ValidationResult::Success)
    }

    fn execute(
        &self,
        context: &CommandContext,
        settings: &dyn CommandSettings,
        _cancellation: &CancellationToken,
    ) -> Result<i32, CommandAppError> {
        let settings = settings_of::<S>(context, settings)?;
        Ok((self.run)(context, settings))
    }
}

/// A command registered in the resolver under its own type wins over `create`.
pub(crate) fn command_factory<C, F>(create: F) -> CommandFactory
where
    C: Command,
    F: Fn(&dyn TypeResolver) -> Option<C> + Send + Sync + 'static,
{
    Arc::new(move |resolver: &dyn TypeResolver| {
        let command = match resolver.resolve_as::<C>() {
            Some(shared) => shared,
            None => Arc::new(create(resolver)?),
        };
        Some(Arc::new(TypedCommand(command)) as Arc<dyn ErasedCommand>)
    })
}

pub(crate) fn delegate_factory<S, F>(run: F) -> CommandFactory
where
    S: CommandSettings,
    F: Fn(&CommandContext, &S) -> i32 + Send + Sync + 'static,
{
    let command: Arc<dyn ErasedCommand> = Arc::new(DelegateCommand {
        run,
        _settings: PhantomData,
    });
    Arc::new(move |_: &dyn TypeResolver| Some(command.clone()))
}
