use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use super::{
    CommandTypeMetadata, DescribeSettings, InstanceFactory, MetadataProvider, SettingsDescriptor,
    SettingsMetadata, TypeRegistration,
};
use crate::convert::{FromStrConverter, TypeConverter, intrinsic_converter};
use crate::error::BindError;
use crate::resolver::Instance;
use crate::types::{ScalarType, TypeKey};
use crate::value::Value;

type Describer = Arc<dyn Fn() -> SettingsDescriptor + Send + Sync>;

/// Metadata discovered while the application is configured.
///
/// Settings types are described lazily the first time their metadata is
/// requested and cached afterwards. Descriptors assembled at runtime (for
/// [`DynamicSettings`](crate::DynamicSettings)) can be registered directly.
///
/// # Examples
///
/// ```
/// use command_bind_core::{
///     MetadataProvider, ParameterType, PropertyAccessor, ReflectionMetadata, ScalarType,
///     SettingsDescriptor, TypeKey,
/// };
///
/// let key = TypeKey::named("greet");
/// let provider = ReflectionMetadata::new();
/// provider.register_descriptor(
///     SettingsDescriptor::dynamic(key.clone()).property(
///         PropertyAccessor::dynamic("name", key.clone(), ParameterType::Scalar(ScalarType::String))
///             .argument(0, "<NAME>"),
///     ),
/// );
///
/// let metadata = provider.settings_metadata(&key).unwrap();
/// assert_eq!(metadata.properties().count(), 1);
/// assert!(provider.create_settings(&key).is_ok());
/// ```
#[derive(Default)]
pub struct ReflectionMetadata {
    describers: RwLock<HashMap<TypeKey, Describer>>,
    commands: RwLock<HashMap<TypeKey, CommandTypeMetadata>>,
    cache: RwLock<HashMap<TypeKey, Arc<SettingsMetadata>>>,
    converters: RwLock<HashMap<TypeKey, Arc<dyn TypeConverter>>>,
    fallbacks: RwLock<HashMap<TypeKey, Arc<dyn TypeConverter>>>,
    instances: RwLock<HashMap<TypeKey, InstanceFactory>>,
}

impl ReflectionMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_settings<S: DescribeSettings>(&self) {
        self.register_describer(TypeKey::of::<S>(), Arc::new(S::describe));
    }

    fn register_describer(&self, settings_type: TypeKey, describer: Describer) {
        self.describers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(settings_type)
            .or_insert(describer);
    }

    /// Registers a descriptor built at runtime, along with its bases.
    pub fn register_descriptor(&self, descriptor: SettingsDescriptor) {
        self.cache_descriptor(&descriptor);
    }

    pub fn register_command(&self, metadata: CommandTypeMetadata) {
        self.commands
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(metadata.command_type.clone(), metadata);
    }

    /// Registers the converter for a custom type.
    pub fn register_converter(&self, type_key: TypeKey, converter: impl TypeConverter + 'static) {
        self.converters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(type_key, Arc::new(converter));
    }

    /// Allows values of `T` to be converted through `FromStr` when nothing
    /// else converts them.
    pub fn register_from_str<T>(&self)
    where
        T: FromStr + fmt::Display + Send + Sync + 'static,
        T::Err: fmt::Display,
    {
        self.fallbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(TypeKey::of::<T>(), Arc::new(FromStrConverter::<T>::new()));
    }

    pub fn register_instance_factory(&self, type_key: TypeKey, factory: InstanceFactory) {
        self.instances
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(type_key, factory);
    }

    fn cache_descriptor(&self, descriptor: &SettingsDescriptor) -> Arc<SettingsMetadata> {
        if let Some(base) = descriptor.base.as_deref() {
            let cached = self
                .cache
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .contains_key(&base.settings_type);
            if !cached {
                self.cache_descriptor(base);
            }
        }

        let metadata = Arc::new(SettingsMetadata::from_descriptor(descriptor));
        debug!(
            settings = %metadata.settings_type,
            levels = metadata.levels.len(),
            constructors = metadata.constructors.len(),
            "described settings type"
        );
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(metadata.settings_type.clone(), metadata.clone());
        metadata
    }
}

impl fmt::Debug for ReflectionMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("ReflectionMetadata")
            .field("cached", &cache.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl MetadataProvider for ReflectionMetadata {
    fn discover(&self, registration: &TypeRegistration) {
        let describe = registration.describe;
        self.register_describer(registration.settings_type.clone(), Arc::new(describe));
        if let Some(command) = &registration.command {
            self.register_command(command.clone());
        }
    }

    fn settings_metadata(&self, settings_type: &TypeKey) -> Result<Arc<SettingsMetadata>, BindError> {
        if let Some(metadata) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(settings_type)
        {
            return Ok(metadata.clone());
        }

        let describer = self
            .describers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(settings_type)
            .cloned()
            .ok_or_else(|| BindError::UnknownSettingsType(settings_type.to_string()))?;
        Ok(self.cache_descriptor(&describer()))
    }

    fn command_type_metadata(&self, command_type: &TypeKey) -> Option<CommandTypeMetadata> {
        self.commands
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(command_type)
            .cloned()
    }

    fn create_instance(&self, type_key: &TypeKey) -> Option<Instance> {
        let factory = self
            .instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(type_key)
            .cloned()?;
        Some(factory())
    }

    fn type_converter(&self, ty: &ScalarType) -> Option<Arc<dyn TypeConverter>> {
        match ty {
            ScalarType::Custom(key) => self
                .converters
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(key)
                .cloned(),
            other => intrinsic_converter(other),
        }
    }

    fn convert_with_constructor_fallback(&self, ty: &ScalarType, input: &str) -> Option<Result<Value, String>> {
        let ScalarType::Custom(key) = ty else {
            return None;
        };
        let fallback = self
            .fallbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()?;
        debug!(target_type = %key, "using FromStr fallback conversion");
        Some(fallback.convert_from(input))
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::settings::{CommandSettings, EmptySettings};

    #[test]
    fn test_discovered_settings_are_described_lazily() {
        let provider = ReflectionMetadata::new();
        let key = TypeKey::of::<EmptySettings>();
        assert!(matches!(
            provider.settings_metadata(&key),
            Err(BindError::UnknownSettingsType(_))
        ));

        provider.discover(&TypeRegistration::command::<EmptySettings>(
            TypeKey::named("noop"),
            Some("Does nothing".into()),
        ));
        let metadata = provider.settings_metadata(&key).unwrap();
        assert!(metadata.can_create());
        assert_eq!(
            provider.settings_type_for_command(&TypeKey::named("noop")),
            Some(key.clone())
        );
        let settings: Box<dyn CommandSettings> = provider.create_settings(&key).unwrap();
        assert!(settings.is::<EmptySettings>());
    }

    #[test]
    fn test_from_str_fallback_is_used_for_custom_types() {
        let provider = ReflectionMetadata::new();
        let ty = ScalarType::Custom(TypeKey::of::<Ipv4Addr>());
        assert!(provider.type_converter(&ty).is_none());
        assert!(provider.convert_with_constructor_fallback(&ty, "127.0.0.1").is_none());

        provider.register_from_str::<Ipv4Addr>();
        let value = provider
            .convert_with_constructor_fallback(&ty, "127.0.0.1")
            .unwrap()
            .unwrap();
        match value {
            Value::Custom(custom) => {
                assert_eq!(custom.downcast_ref::<Ipv4Addr>(), Some(&Ipv4Addr::LOCALHOST));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_intrinsic_types_have_converters() {
        let provider = ReflectionMetadata::new();
        assert!(provider.type_converter(&ScalarType::I32).is_some());
        assert!(provider.type_converter(&ScalarType::Url).is_some());
    }
}
