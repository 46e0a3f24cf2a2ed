//! Settings and command metadata, and the provider abstraction over it.
//!
//! A settings type declares itself through [`DescribeSettings`], producing a
//! [`SettingsDescriptor`]: its own properties, its constructors, how to
//! create a blank instance, and the descriptor of the settings type it
//! extends. Providers flatten descriptors into [`SettingsMetadata`], an
//! ordered list of inheritance levels (leaf first), and serve it to the model
//! builder and the binder.
//!
//! Two providers are available:
//!
//! - [`ReflectionMetadata`] discovers settings types as commands are
//!   configured and caches what it flattens. It also accepts descriptors
//!   built at runtime and allows `FromStr` based fallback conversion.
//! - [`GeneratedMetadata`] is an immutable table assembled ahead of time.
//!   Types missing from the table are errors.

mod constructor;
mod generated;
mod property;
mod reflection;

use std::fmt;
use std::sync::Arc;

use tracing::debug;

pub use constructor::{BoundArgument, ConstructorArguments, ConstructorMetadata, ConstructorParameter};
pub use generated::{GeneratedMetadata, GeneratedMetadataBuilder};
pub use property::{
    ArgumentAttribute, Getter, OptionAttribute, ParameterAttribute, ParameterContext,
    ParameterValidator, ParameterValueProvider, PropertyAccessor, Setter,
};
pub use reflection::ReflectionMetadata;

use crate::convert::{TypeConverter, default_instance};
use crate::error::BindError;
use crate::pair::{PairDeconstructor, PairDeconstructorRef};
use crate::resolver::{Instance, TypeRegistrar};
use crate::settings::{CommandSettings, DynamicSettings, EmptySettings, SettingsFactory};
use crate::types::{ScalarType, TypeKey};
use crate::value::Value;

/// Creates a blank settings instance.
pub type CreateSettingsFn = Arc<dyn Fn() -> Box<dyn CommandSettings> + Send + Sync>;

/// Creates an arbitrary instance by type.
pub type InstanceFactory = Arc<dyn Fn() -> Instance + Send + Sync>;

/// Declaration of one settings type.
#[derive(Clone)]
pub struct SettingsDescriptor {
    pub settings_type: TypeKey,
    /// The settings type this one extends.
    pub base: Option<Box<SettingsDescriptor>>,
    /// Abstract settings can be extended and bound into, never created.
    pub is_abstract: bool,
    pub properties: Vec<PropertyAccessor>,
    pub constructors: Vec<ConstructorMetadata>,
    pub create: Option<CreateSettingsFn>,
}

impl SettingsDescriptor {
    /// Describes `S` with no way to create a blank instance.
    pub fn new<S: CommandSettings>() -> Self {
        Self::named(TypeKey::of::<S>())
    }

    /// Describes `S`, creating blank instances through `Default`.
    pub fn with_default<S: CommandSettings + Default>() -> Self {
        Self::new::<S>().creator(|| Box::new(S::default()))
    }

    /// Describes a runtime settings type backed by [`DynamicSettings`].
    pub fn dynamic(settings_type: TypeKey) -> Self {
        let key = settings_type.clone();
        Self::named(settings_type).creator(move || Box::new(DynamicSettings::new(key.clone())))
    }

    fn named(settings_type: TypeKey) -> Self {
        Self {
            settings_type,
            base: None,
            is_abstract: false,
            properties: Vec::new(),
            constructors: Vec::new(),
            create: None,
        }
    }

    pub fn extends<B: DescribeSettings>(self) -> Self {
        self.extends_descriptor(B::describe())
    }

    pub fn extends_descriptor(mut self, base: SettingsDescriptor) -> Self {
        self.base = Some(Box::new(base));
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn property(mut self, property: PropertyAccessor) -> Self {
        self.properties.push(property);
        self
    }

    pub fn constructor(mut self, constructor: ConstructorMetadata) -> Self {
        self.constructors.push(constructor);
        self
    }

    pub fn creator(mut self, create: impl Fn() -> Box<dyn CommandSettings> + Send + Sync + 'static) -> Self {
        self.create = Some(Arc::new(create));
        self
    }
}

impl fmt::Debug for SettingsDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsDescriptor")
            .field("settings_type", &self.settings_type)
            .field("base", &self.base.as_ref().map(|base| &base.settings_type))
            .field("is_abstract", &self.is_abstract)
            .field("properties", &self.properties.len())
            .field("constructors", &self.constructors.len())
            .finish()
    }
}

/// Declaration hook for a settings type.
///
/// # Examples
///
/// ```
/// use command_bind_core::{CommandSettings, DescribeSettings, PropertyAccessor, SettingsDescriptor};
///
/// #[derive(Debug, Default)]
/// struct GreetSettings { name: String, count: Option<i32> }
/// impl CommandSettings for GreetSettings {}
///
/// impl DescribeSettings for GreetSettings {
///     fn describe() -> SettingsDescriptor {
///         SettingsDescriptor::with_default::<Self>()
///             .property(PropertyAccessor::field("Name", |s: &Self| &s.name, |s| &mut s.name).argument(0, "<NAME>"))
///             .property(PropertyAccessor::field("Count", |s: &Self| &s.count, |s| &mut s.count).argument(1, "[COUNT]"))
///     }
/// }
///
/// let descriptor = GreetSettings::describe();
/// assert_eq!(descriptor.properties.len(), 2);
/// ```
pub trait DescribeSettings: CommandSettings + Sized {
    fn describe() -> SettingsDescriptor;
}

impl DescribeSettings for EmptySettings {
    fn describe() -> SettingsDescriptor {
        SettingsDescriptor::with_default::<Self>()
    }
}

/// Properties declared directly on one settings type in an inheritance chain.
#[derive(Debug, Clone)]
pub struct SettingsLevel {
    pub settings_type: TypeKey,
    pub properties: Vec<Arc<PropertyAccessor>>,
}

/// Flattened metadata for a settings type.
#[derive(Clone)]
pub struct SettingsMetadata {
    pub settings_type: TypeKey,
    pub is_abstract: bool,
    /// Inheritance levels, the settings type itself first.
    pub levels: Vec<SettingsLevel>,
    pub constructors: Vec<Arc<ConstructorMetadata>>,
    create: Option<CreateSettingsFn>,
}

impl SettingsMetadata {
    pub fn from_descriptor(descriptor: &SettingsDescriptor) -> Self {
        let mut levels = Vec::new();
        let mut current = Some(descriptor);
        while let Some(level) = current {
            levels.push(SettingsLevel {
                settings_type: level.settings_type.clone(),
                properties: level.properties.iter().cloned().map(Arc::new).collect(),
            });
            current = level.base.as_deref();
        }

        Self {
            settings_type: descriptor.settings_type.clone(),
            is_abstract: descriptor.is_abstract,
            levels,
            constructors: descriptor.constructors.iter().cloned().map(Arc::new).collect(),
            create: descriptor.create.clone(),
        }
    }

    /// Every property, leaf level first.
    pub fn properties(&self) -> impl Iterator<Item = &Arc<PropertyAccessor>> {
        self.levels.iter().flat_map(|level| level.properties.iter())
    }

    /// Finds a property by name, ignoring case.
    pub fn find_property(&self, name: &str) -> Option<&Arc<PropertyAccessor>> {
        self.properties()
            .find(|property| property.name.eq_ignore_ascii_case(name))
    }

    /// Returns `true` when `settings_type` is this type or one of its bases.
    pub fn is_assignable_to(&self, settings_type: &TypeKey) -> bool {
        self.levels
            .iter()
            .any(|level| &level.settings_type == settings_type)
    }

    pub fn can_create(&self) -> bool {
        !self.is_abstract && self.create.is_some()
    }

    /// Creates a blank instance, unless the type is abstract.
    pub fn create(&self) -> Option<Box<dyn CommandSettings>> {
        if self.is_abstract {
            return None;
        }
        self.create.as_ref().map(|create| create())
    }

    fn factory(&self) -> Option<SettingsFactory> {
        if self.is_abstract {
            return None;
        }
        let create = self.create.clone()?;
        Some(SettingsFactory::new(move || create()))
    }
}

impl fmt::Debug for SettingsMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsMetadata")
            .field("settings_type", &self.settings_type)
            .field("is_abstract", &self.is_abstract)
            .field("levels", &self.levels)
            .field("constructors", &self.constructors)
            .finish_non_exhaustive()
    }
}

/// Metadata describing a command type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTypeMetadata {
    pub command_type: TypeKey,
    pub settings_type: TypeKey,
    pub description: Option<String>,
}

/// A settings type (and optionally the command using it) reported to a
/// provider as the application is configured.
#[derive(Debug, Clone)]
pub struct TypeRegistration {
    pub command: Option<CommandTypeMetadata>,
    pub settings_type: TypeKey,
    pub describe: fn() -> SettingsDescriptor,
}

impl TypeRegistration {
    pub fn settings<S: DescribeSettings>() -> Self {
        Self {
            command: None,
            settings_type: TypeKey::of::<S>(),
            describe: S::describe,
        }
    }

    pub fn command<S: DescribeSettings>(command_type: TypeKey, description: Option<String>) -> Self {
        Self {
            command: Some(CommandTypeMetadata {
                command_type,
                settings_type: TypeKey::of::<S>(),
                description,
            }),
            ..Self::settings::<S>()
        }
    }
}

/// Types used by a configured application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownTypes {
    pub commands: Vec<TypeKey>,
    pub settings: Vec<TypeKey>,
}

/// Source of settings and command metadata.
///
/// The binder and the model builder only talk to this trait; whether the
/// metadata was discovered at runtime or assembled ahead of time is invisible
/// to them.
pub trait MetadataProvider: Send + Sync {
    /// Notifies the provider about a type used by the application.
    fn discover(&self, _registration: &TypeRegistration) {}

    fn settings_metadata(&self, settings_type: &TypeKey) -> Result<Arc<SettingsMetadata>, BindError>;

    fn command_type_metadata(&self, command_type: &TypeKey) -> Option<CommandTypeMetadata>;

    fn settings_type_for_command(&self, command_type: &TypeKey) -> Option<TypeKey> {
        self.command_type_metadata(command_type)
            .map(|metadata| metadata.settings_type)
    }

    fn create_settings(&self, settings_type: &TypeKey) -> Result<Box<dyn CommandSettings>, BindError> {
        let metadata = self.settings_metadata(settings_type)?;
        metadata
            .create()
            .ok_or_else(|| BindError::SettingsCreationFailed {
                settings_type: settings_type.short_name().to_string(),
                reason: if metadata.is_abstract {
                    "the settings type is abstract".to_string()
                } else {
                    "the settings type declares no way to create an instance".to_string()
                },
            })
    }

    /// Creates an instance of an arbitrary registered type.
    fn create_instance(&self, type_key: &TypeKey) -> Option<Instance>;

    fn create_pair_deconstructor(&self, reference: &PairDeconstructorRef) -> Arc<dyn PairDeconstructor> {
        reference.create()
    }

    fn create_default_value(&self, value_type: &ScalarType) -> Option<Value> {
        default_instance(value_type)
    }

    fn create_flag_value(&self, _underlying: &ScalarType) -> Value {
        Value::Flag {
            is_set: false,
            value: None,
        }
    }

    fn create_multi_map(&self, _key: &ScalarType, _value: &ScalarType) -> Value {
        Value::Map(Vec::new())
    }

    fn type_converter(&self, ty: &ScalarType) -> Option<Arc<dyn TypeConverter>>;

    /// Last-resort conversion for types without a converter. `None` when the
    /// provider has no fallback for `ty`.
    fn convert_with_constructor_fallback(&self, _ty: &ScalarType, _input: &str) -> Option<Result<Value, String>> {
        None
    }

    /// Registers factories for every creatable known settings type that the
    /// registrar does not already know.
    fn register_known_types(&self, registrar: &mut dyn TypeRegistrar, known: &KnownTypes) {
        let mut settings_types = known.settings.clone();
        for command in &known.commands {
            if let Some(settings_type) = self.settings_type_for_command(command) {
                if !settings_types.contains(&settings_type) {
                    settings_types.push(settings_type);
                }
            }
        }

        for settings_type in settings_types {
            if registrar.is_registered(&settings_type) {
                continue;
            }
            let Ok(metadata) = self.settings_metadata(&settings_type) else {
                continue;
            };
            if let Some(factory) = metadata.factory() {
                debug!(settings = %settings_type, "registered settings factory");
                registrar.register_instance(settings_type, Arc::new(factory));
            }
        }
    }
}
