//! Constructor metadata with bound invokers.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::BindError;
use crate::resolver::Instance;
use crate::settings::CommandSettings;
use crate::types::TypeKey;
use crate::value::{BindValue, Value};

/// One declared constructor parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorParameter {
    /// Matched against property names, ignoring case.
    pub name: String,
    /// Key used when the parameter is resolved as a service.
    pub parameter_type: TypeKey,
    /// Human readable type, used in signatures.
    pub type_name: String,
    pub default_value: Option<Value>,
}

/// A value supplied for a constructor parameter.
#[derive(Clone)]
pub enum BoundArgument {
    Value(Value),
    Service(Instance),
}

impl fmt::Debug for BoundArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Service(_) => f.write_str("Service"),
        }
    }
}

/// Arguments handed to a constructor invoker, in parameter order.
#[derive(Debug, Default)]
pub struct ConstructorArguments {
    arguments: Vec<(String, BoundArgument)>,
}

impl ConstructorArguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, argument: BoundArgument) {
        self.arguments.push((name.into(), argument));
    }

    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    fn remove(&mut self, name: &str) -> Result<BoundArgument, BindError> {
        let index = self
            .arguments
            .iter()
            .position(|(candidate, _)| candidate == name)
            .ok_or_else(|| BindError::ConstructorArgument {
                name: name.to_string(),
                reason: "no argument was supplied".to_string(),
            })?;
        Ok(self.arguments.remove(index).1)
    }

    /// Takes a bound value and converts it to `T`.
    pub fn take<T: BindValue>(&mut self, name: &str) -> Result<T, BindError> {
        match self.remove(name)? {
            BoundArgument::Value(value) => {
                T::from_value(value).map_err(|err| BindError::ConstructorArgument {
                    name: name.to_string(),
                    reason: err.to_string(),
                })
            }
            BoundArgument::Service(_) => Err(BindError::ConstructorArgument {
                name: name.to_string(),
                reason: "expected a value but a service was supplied".to_string(),
            }),
        }
    }

    /// Takes a resolved service.
    pub fn service<T: Any + Send + Sync>(&mut self, name: &str) -> Result<Arc<T>, BindError> {
        match self.remove(name)? {
            BoundArgument::Service(instance) => {
                instance
                    .downcast::<T>()
                    .map_err(|_| BindError::ConstructorArgument {
                        name: name.to_string(),
                        reason: format!(
                            "service is not a {}",
                            TypeKey::of::<T>().short_name()
                        ),
                    })
            }
            BoundArgument::Value(_) => Err(BindError::ConstructorArgument {
                name: name.to_string(),
                reason: "expected a service but a value was supplied".to_string(),
            }),
        }
    }
}

type Invoker =
    Arc<dyn Fn(&mut ConstructorArguments) -> Result<Box<dyn CommandSettings>, BindError> + Send + Sync>;

/// A settings constructor: its parameters and a closure that invokes it.
///
/// # Examples
///
/// ```
/// use command_bind_core::{CommandSettings, ConstructorMetadata};
///
/// #[derive(Debug)]
/// struct GreetSettings { name: String, count: i32 }
/// impl CommandSettings for GreetSettings {}
///
/// let constructor = ConstructorMetadata::new(|args| {
///     Ok(GreetSettings { name: args.take("name")?, count: args.take("count")? })
/// })
/// .param::<String>("name")
/// .param_with_default("count", 1_i32);
///
/// assert_eq!(constructor.signature("GreetSettings"), "GreetSettings(String name, i32 count)");
/// ```
#[derive(Clone)]
pub struct ConstructorMetadata {
    pub parameters: Vec<ConstructorParameter>,
    invoker: Invoker,
}

impl ConstructorMetadata {
    pub fn new<S, F>(invoke: F) -> Self
    where
        S: CommandSettings,
        F: Fn(&mut ConstructorArguments) -> Result<S, BindError> + Send + Sync + 'static,
    {
        Self {
            parameters: Vec::new(),
            invoker: Arc::new(move |args: &mut ConstructorArguments| {
                invoke(args).map(|settings| Box::new(settings) as Box<dyn CommandSettings>)
            }),
        }
    }

    /// Declares a parameter with no default.
    pub fn param<T: BindValue>(mut self, name: impl Into<String>) -> Self {
        self.parameters.push(ConstructorParameter {
            name: name.into(),
            parameter_type: TypeKey::of::<T>(),
            type_name: T::parameter_type().to_string(),
            default_value: None,
        });
        self
    }

    pub fn param_with_default<T: BindValue>(mut self, name: impl Into<String>, default: T) -> Self {
        self.parameters.push(ConstructorParameter {
            name: name.into(),
            parameter_type: TypeKey::of::<T>(),
            type_name: T::parameter_type().to_string(),
            default_value: Some(default.to_value()),
        });
        self
    }

    /// Declares a parameter that is only ever supplied by the type resolver.
    pub fn service<T: Any + Send + Sync>(mut self, name: impl Into<String>) -> Self {
        let key = TypeKey::of::<T>();
        self.parameters.push(ConstructorParameter {
            name: name.into(),
            type_name: key.short_name().to_string(),
            parameter_type: key,
            default_value: None,
        });
        self
    }

    /// Declares a parameter with an explicit type identity.
    pub fn raw_param(mut self, parameter: ConstructorParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn invoke(&self, mut arguments: ConstructorArguments) -> Result<Box<dyn CommandSettings>, BindError> {
        (self.invoker)(&mut arguments)
    }

    /// `Type(T name, U other)`.
    pub fn signature(&self, type_name: &str) -> String {
        let parameters = self
            .parameters
            .iter()
            .map(|parameter| format!("{} {}", parameter.type_name, parameter.name))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{type_name}({parameters})")
    }
}

impl fmt::Debug for ConstructorMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorMetadata")
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}
