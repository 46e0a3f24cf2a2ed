//! Binding matched values into a settings instance.
//!
//! Values are resolved first ([`resolve_values`]). Then the settings type's
//! constructors are ranked by how many parameters they take from bound
//! values (score) and how many they can satisfy at all, counting defaults
//! and resolvable services. The best constructor is invoked and the values
//! it did not consume are assigned to properties. When no constructor takes
//! a bound value, the settings are created blank and every value is
//! assigned through its property. Ties between the best constructors are
//! errors.

mod constructor;
mod lookup;
mod resolve;

use command_bind_core::{
    BindError, CommandSettings, Instance, MetadataProvider, ParseError, SettingsFactory,
    SettingsMetadata, TypeKey, TypeResolver, ValidationResult,
};
use tracing::debug;

pub use lookup::{LookupEntry, ValueLookup};
pub use resolve::resolve_values;

use self::constructor::{ServiceCache, invoke, rank_constructors, ties};
use crate::error::Result;
use crate::model::CommandModel;
use crate::parser::CommandTree;

/// Binds command trees of one model into settings instances.
pub struct CommandBinder<'a> {
    model: &'a CommandModel,
    provider: &'a dyn MetadataProvider,
    resolver: &'a dyn TypeResolver,
}

impl<'a> CommandBinder<'a> {
    pub fn new(
        model: &'a CommandModel,
        provider: &'a dyn MetadataProvider,
        resolver: &'a dyn TypeResolver,
    ) -> Self {
        Self {
            model,
            provider,
            resolver,
        }
    }

    fn instances(&self) -> InstanceResolver<'_> {
        InstanceResolver {
            resolver: self.resolver,
            provider: self.provider,
        }
    }

    /// Resolves the values of `tree` without binding them.
    pub fn resolve(&self, tree: &CommandTree) -> Result<ValueLookup> {
        resolve_values(self.model, tree, self.provider, &self.instances())
    }

    /// Binds `tree` into the settings type of its leaf command.
    ///
    /// # Errors
    ///
    /// Fails when values cannot be resolved, constructors are ambiguous, a
    /// dependency cannot be resolved, or the settings reject themselves.
    pub fn bind(&self, tree: &CommandTree) -> Result<Box<dyn CommandSettings>> {
        let leaf = tree.leaf().ok_or(ParseError::NoCommandSpecified)?;
        let settings_type = self.model.command(leaf.command).settings_type.clone();
        self.bind_as(tree, &settings_type)
    }

    /// Binds `tree` into `settings_type`.
    pub fn bind_as(&self, tree: &CommandTree, settings_type: &TypeKey) -> Result<Box<dyn CommandSettings>> {
        let resolver = self.instances();
        let lookup = resolve_values(self.model, tree, self.provider, &resolver)?;
        let metadata = self.provider.settings_metadata(settings_type)?;
        let type_name = settings_type.short_name();

        let mut cache = ServiceCache::new();
        let candidates = rank_constructors(&metadata, &lookup, &resolver, &mut cache);
        let settings = match candidates.first() {
            Some(best) if best.score > 0 => {
                let tied = ties(&candidates);
                if tied.len() > 1 {
                    return Err(BindError::AmbiguousConstructors {
                        settings_type: type_name.to_string(),
                        candidates: tied
                            .iter()
                            .map(|candidate| candidate.constructor.signature(type_name))
                            .collect(),
                    }
                    .into());
                }

                let (mut settings, consumed) = invoke(&best.constructor, &lookup, &resolver, &cache)?;
                inject(
                    settings.as_mut(),
                    lookup
                        .iter()
                        .filter(|entry| !consumed.contains(&entry.parameter)),
                )?;
                settings
            }
            _ => {
                debug!(settings = %type_name, "binding through properties");
                let mut settings = create_settings(&metadata, &resolver, self.provider)?;
                inject(settings.as_mut(), lookup.iter())?;
                settings
            }
        };

        if let ValidationResult::Error(message) = settings.validate() {
            return Err(BindError::ValidationFailed(message).into());
        }
        Ok(settings)
    }
}

impl std::fmt::Debug for CommandBinder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBinder")
            .field("commands", &self.model.commands().count())
            .finish_non_exhaustive()
    }
}

/// Falls back to the provider for types the resolver does not know.
struct InstanceResolver<'a> {
    resolver: &'a dyn TypeResolver,
    provider: &'a dyn MetadataProvider,
}

impl TypeResolver for InstanceResolver<'_> {
    fn resolve(&self, service: &TypeKey) -> Option<Instance> {
        self.resolver
            .resolve(service)
            .or_else(|| self.provider.create_instance(service))
    }
}

fn create_settings(
    metadata: &SettingsMetadata,
    resolver: &dyn TypeResolver,
    provider: &dyn MetadataProvider,
) -> std::result::Result<Box<dyn CommandSettings>, BindError> {
    let registered = resolver
        .resolve(&metadata.settings_type)
        .and_then(|instance| instance.downcast::<SettingsFactory>().ok());
    match registered {
        Some(factory) => Ok(factory.create()),
        None => provider.create_settings(&metadata.settings_type),
    }
}

/// Assigns every non-null value to its settable property.
fn inject<'e>(
    settings: &mut dyn CommandSettings,
    entries: impl Iterator<Item = &'e LookupEntry>,
) -> std::result::Result<(), BindError> {
    for entry in entries {
        if entry.value.is_null() || !entry.property.can_set() {
            continue;
        }
        entry.property.set(settings, entry.value.clone())?;
    }
    Ok(())
}
