//! The settings trait and the runtime property-bag settings type.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::SettingsAccessError;
use crate::types::TypeKey;
use crate::value::Value;

/// Outcome of a settings or parameter validation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ValidationResult {
    #[default]
    Success,
    Error(String),
}

impl ValidationResult {
    pub fn success() -> Self {
        Self::Success
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// A typed container for one command's arguments and options.
///
/// Settings types that extend another settings type embed the base value and
/// expose it through [`base`](CommandSettings::base) /
/// [`base_mut`](CommandSettings::base_mut). Downcasting a `dyn
/// CommandSettings` walks that chain, so a property accessor declared on a
/// base type works on every derived instance.
///
/// # Examples
///
/// ```
/// use command_bind_core::{CommandSettings, ValidationResult};
///
/// #[derive(Debug, Default)]
/// struct GlobalSettings { verbose: bool }
/// impl CommandSettings for GlobalSettings {}
///
/// #[derive(Debug, Default)]
/// struct AddSettings { global: GlobalSettings, name: String }
/// impl CommandSettings for AddSettings {
///     fn validate(&self) -> ValidationResult {
///         if self.name.is_empty() {
///             ValidationResult::error("name must not be empty")
///         } else {
///             ValidationResult::success()
///         }
///     }
///     fn base(&self) -> Option<&dyn CommandSettings> { Some(&self.global) }
///     fn base_mut(&mut self) -> Option<&mut dyn CommandSettings> { Some(&mut self.global) }
/// }
///
/// let mut settings: Box<dyn CommandSettings> = Box::new(AddSettings::default());
/// settings.downcast_mut::<GlobalSettings>().unwrap().verbose = true;
/// assert!(settings.downcast_ref::<AddSettings>().unwrap().global.verbose);
/// ```
pub trait CommandSettings: Any + fmt::Debug + Send + Sync + 'static {
    /// Validates the fully bound settings.
    fn validate(&self) -> ValidationResult {
        ValidationResult::Success
    }

    /// The embedded base settings, if this type extends another one.
    fn base(&self) -> Option<&dyn CommandSettings> {
        None
    }

    fn base_mut(&mut self) -> Option<&mut dyn CommandSettings> {
        None
    }
}

impl dyn CommandSettings {
    pub fn is<T: CommandSettings>(&self) -> bool {
        self.downcast_ref::<T>().is_some()
    }

    /// Returns `self` or the first base in the chain whose type is `T`.
    pub fn downcast_ref<T: CommandSettings>(&self) -> Option<&T> {
        let any: &dyn Any = self;
        match any.downcast_ref::<T>() {
            Some(found) => Some(found),
            None => self.base()?.downcast_ref::<T>(),
        }
    }

    pub fn downcast_mut<T: CommandSettings>(&mut self) -> Option<&mut T> {
        let is_self = {
            let any: &dyn Any = self;
            any.is::<T>()
        };
        if is_self {
            let any: &mut dyn Any = self;
            return any.downcast_mut::<T>();
        }
        self.base_mut()?.downcast_mut::<T>()
    }

    /// Converts the box into the concrete outermost type.
    pub fn downcast<T: CommandSettings>(
        self: Box<Self>,
    ) -> Result<Box<T>, Box<dyn CommandSettings>> {
        let is_self = {
            let any: &dyn Any = &*self;
            any.is::<T>()
        };
        if !is_self {
            return Err(self);
        }
        let any: Box<dyn Any> = self;
        any.downcast::<T>()
            .map_err(|_| unreachable!("type checked above"))
    }
}

/// Settings with no parameters, used by commands that take none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmptySettings;

impl CommandSettings for EmptySettings {}

/// Settings whose properties are declared at runtime.
///
/// Every property lives in an ordered bag keyed by name. Several distinct
/// settings types can share this Rust type; each instance carries the
/// [`TypeKey`] it was created for.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicSettings {
    settings_type: TypeKey,
    values: IndexMap<String, Value>,
}

impl DynamicSettings {
    pub fn new(settings_type: TypeKey) -> Self {
        Self {
            settings_type,
            values: IndexMap::new(),
        }
    }

    pub fn settings_type(&self) -> &TypeKey {
        &self.settings_type
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl CommandSettings for DynamicSettings {}

impl Serialize for DynamicSettings {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Creates fresh settings instances for a settings type.
///
/// Registering one of these in the type resolver under a settings type's key
/// makes property-injection binding start from the instance it creates.
#[derive(Clone)]
pub struct SettingsFactory(Arc<dyn Fn() -> Box<dyn CommandSettings> + Send + Sync>);

impl SettingsFactory {
    pub fn new(create: impl Fn() -> Box<dyn CommandSettings> + Send + Sync + 'static) -> Self {
        Self(Arc::new(create))
    }

    pub fn create(&self) -> Box<dyn CommandSettings> {
        (self.0)()
    }
}

impl fmt::Debug for SettingsFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SettingsFactory")
    }
}

/// Hands the settings bound for the current invocation to other services.
///
/// The application registers one provider under its own [`TypeKey`] and
/// fills it after binding, so services created while the command runs can
/// read the settings without being bound themselves.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use command_bind_core::{CommandSettings, SettingsProvider, TypeKey};
///
/// #[derive(Debug, Default)]
/// struct Serve { port: u16 }
/// impl CommandSettings for Serve {}
///
/// let provider = SettingsProvider::new();
/// assert!(!provider.has_settings());
///
/// provider.populate(TypeKey::of::<Serve>(), Arc::new(Serve { port: 8080 }));
/// assert_eq!(provider.with_settings(|serve: &Serve| serve.port), Ok(8080));
/// ```
#[derive(Debug, Default)]
pub struct SettingsProvider {
    current: RwLock<Option<(TypeKey, Arc<dyn CommandSettings>)>>,
}

impl SettingsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the settings bound for `settings_type`, replacing earlier ones.
    pub fn populate(&self, settings_type: TypeKey, settings: Arc<dyn CommandSettings>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some((settings_type, settings));
    }

    pub fn has_settings(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// The bound settings.
    ///
    /// # Errors
    ///
    /// Fails when nothing has been bound yet.
    pub fn settings(&self) -> Result<Arc<dyn CommandSettings>, SettingsAccessError> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|(_, settings)| settings.clone())
            .ok_or(SettingsAccessError::NotPopulated)
    }

    /// Calls `read` with the bound settings as `S`, which may be the bound
    /// type or one of its bases.
    ///
    /// # Errors
    ///
    /// Fails when nothing has been bound yet or the settings are not an `S`.
    pub fn with_settings<S: CommandSettings, R>(&self, read: impl FnOnce(&S) -> R) -> Result<R, SettingsAccessError> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        let (settings_type, settings) = current.as_ref().ok_or(SettingsAccessError::NotPopulated)?;
        match settings.downcast_ref::<S>() {
            Some(typed) => Ok(read(typed)),
            None => Err(SettingsAccessError::WrongType {
                actual: settings_type.short_name().to_string(),
                expected: TypeKey::of::<S>().short_name().to_string(),
            }),
        }
    }
}
