use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{
    CommandTypeMetadata, DescribeSettings, InstanceFactory, MetadataProvider, SettingsDescriptor,
    SettingsMetadata,
};
use crate::convert::{TypeConverter, intrinsic_converter};
use crate::error::BindError;
use crate::resolver::Instance;
use crate::types::{ScalarType, TypeKey};

/// Metadata assembled once, ahead of time.
///
/// Discovery notifications are ignored and no fallback conversion is
/// attempted: every settings type, command and custom converter the
/// application uses must be added to the builder.
///
/// # Examples
///
/// ```
/// use command_bind_core::{BindError, EmptySettings, GeneratedMetadata, MetadataProvider, TypeKey};
///
/// let provider = GeneratedMetadata::builder()
///     .settings::<EmptySettings>()
///     .command(TypeKey::named("noop"), TypeKey::of::<EmptySettings>(), None)
///     .build();
///
/// assert!(provider.settings_metadata(&TypeKey::of::<EmptySettings>()).is_ok());
/// assert!(matches!(
///     provider.settings_metadata(&TypeKey::named("missing")),
///     Err(BindError::UnknownSettingsType(_))
/// ));
/// ```
pub struct GeneratedMetadata {
    settings: HashMap<TypeKey, Arc<SettingsMetadata>>,
    commands: HashMap<TypeKey, CommandTypeMetadata>,
    converters: HashMap<TypeKey, Arc<dyn TypeConverter>>,
    instances: HashMap<TypeKey, InstanceFactory>,
}

impl GeneratedMetadata {
    pub fn builder() -> GeneratedMetadataBuilder {
        GeneratedMetadataBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }
}

impl fmt::Debug for GeneratedMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedMetadata")
            .field("settings", &self.settings.keys().collect::<Vec<_>>())
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl MetadataProvider for GeneratedMetadata {
    fn settings_metadata(&self, settings_type: &TypeKey) -> Result<Arc<SettingsMetadata>, BindError> {
        self.settings
            .get(settings_type)
            .cloned()
            .ok_or_else(|| BindError::UnknownSettingsType(settings_type.to_string()))
    }

    fn command_type_metadata(&self, command_type: &TypeKey) -> Option<CommandTypeMetadata> {
        self.commands.get(command_type).cloned()
    }

    fn create_instance(&self, type_key: &TypeKey) -> Option<Instance> {
        self.instances.get(type_key).map(|factory| factory())
    }

    fn type_converter(&self, ty: &ScalarType) -> Option<Arc<dyn TypeConverter>> {
        match ty {
            ScalarType::Custom(key) => self.converters.get(key).cloned(),
            other => intrinsic_converter(other),
        }
    }
}

/// Collects the tables of a [`GeneratedMetadata`].
#[derive(Default)]
pub struct GeneratedMetadataBuilder {
    descriptors: Vec<SettingsDescriptor>,
    commands: HashMap<TypeKey, CommandTypeMetadata>,
    converters: HashMap<TypeKey, Arc<dyn TypeConverter>>,
    instances: HashMap<TypeKey, InstanceFactory>,
}

impl GeneratedMetadataBuilder {
    pub fn settings<S: DescribeSettings>(self) -> Self {
        self.descriptor(S::describe())
    }

    pub fn descriptor(mut self, descriptor: SettingsDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    pub fn command(
        mut self,
        command_type: TypeKey,
        settings_type: TypeKey,
        description: Option<String>,
    ) -> Self {
        self.commands.insert(
            command_type.clone(),
            CommandTypeMetadata {
                command_type,
                settings_type,
                description,
            },
        );
        self
    }

    pub fn converter(mut self, type_key: TypeKey, converter: impl TypeConverter + 'static) -> Self {
        self.converters.insert(type_key, Arc::new(converter));
        self
    }

    pub fn instance(mut self, type_key: TypeKey, factory: InstanceFactory) -> Self {
        self.instances.insert(type_key, factory);
        self
    }

    /// Flattens every descriptor, including the bases they extend.
    pub fn build(self) -> GeneratedMetadata {
        let mut settings = HashMap::new();
        for descriptor in &self.descriptors {
            let mut current = Some(descriptor);
            while let Some(level) = current {
                settings
                    .entry(level.settings_type.clone())
                    .or_insert_with(|| Arc::new(SettingsMetadata::from_descriptor(level)));
                current = level.base.as_deref();
            }
        }

        tracing::debug!(
            settings = settings.len(),
            commands = self.commands.len(),
            "built generated metadata"
        );
        GeneratedMetadata {
            settings,
            commands: self.commands,
            converters: self.converters,
            instances: self.instances,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::FnConverter;
    use crate::metadata::PropertyAccessor;
    use crate::settings::CommandSettings;
    use crate::value::Value;

    #[derive(Debug, Default)]
    struct Shared {
        debug: bool,
    }
    impl CommandSettings for Shared {}
    impl DescribeSettings for Shared {
        fn describe() -> SettingsDescriptor {
            SettingsDescriptor::new::<Self>().abstract_type().property(
                PropertyAccessor::field("Debug", |s: &Self| &s.debug, |s| &mut s.debug).option("--debug"),
            )
        }
    }

    #[derive(Debug, Default)]
    struct Leaf {
        shared: Shared,
    }
    impl CommandSettings for Leaf {
        fn base(&self) -> Option<&dyn CommandSettings> {
            Some(&self.shared)
        }
        fn base_mut(&mut self) -> Option<&mut dyn CommandSettings> {
            Some(&mut self.shared)
        }
    }
    impl DescribeSettings for Leaf {
        fn describe() -> SettingsDescriptor {
            SettingsDescriptor::with_default::<Self>().extends::<Shared>()
        }
    }

    #[test]
    fn test_bases_are_tabled_with_their_leaves() {
        let provider = GeneratedMetadata::builder().settings::<Leaf>().build();
        assert_eq!(provider.len(), 2);
        assert!(provider.settings_metadata(&TypeKey::of::<Shared>()).unwrap().is_abstract);
        assert!(provider.create_settings(&TypeKey::of::<Shared>()).is_err());
        assert!(provider.create_settings(&TypeKey::of::<Leaf>()).is_ok());
    }

    #[test]
    fn test_no_fallback_conversion() {
        let key = TypeKey::named("Level");
        let provider = GeneratedMetadata::builder()
            .converter(key.clone(), FnConverter::new(|_| Ok(Value::Int(1))))
            .build();
        assert!(provider.type_converter(&ScalarType::Custom(key)).is_some());
        let unknown = ScalarType::Custom(TypeKey::named("Unknown"));
        assert!(provider.type_converter(&unknown).is_none());
        assert!(provider.convert_with_constructor_fallback(&unknown, "x").is_none());
    }
}
