//! Dependency resolution contract and the default service registry.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::types::TypeKey;

/// A resolved service.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Creates a service once, on first resolution.
pub type LazyFactory = Arc<dyn Fn() -> Instance + Send + Sync>;

/// Creates a service on every resolution.
pub type ServiceFactory = Arc<dyn Fn(&dyn TypeResolver) -> Option<Instance> + Send + Sync>;

/// Resolves services by type identity.
pub trait TypeResolver: Send + Sync {
    fn resolve(&self, service: &TypeKey) -> Option<Instance>;
}

impl dyn TypeResolver + '_ {
    /// Resolves a service registered under `T`'s own key.
    pub fn resolve_as<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.resolve(&TypeKey::of::<T>())?.downcast::<T>().ok()
    }
}

/// Collects service registrations and builds a [`TypeResolver`].
pub trait TypeRegistrar {
    /// Maps `service` onto another registered type.
    fn register(&mut self, service: TypeKey, implementation: TypeKey);

    fn register_instance(&mut self, service: TypeKey, instance: Instance);

    fn register_lazy(&mut self, service: TypeKey, factory: LazyFactory);

    fn register_factory(&mut self, service: TypeKey, factory: ServiceFactory);

    fn is_registered(&self, service: &TypeKey) -> bool;

    fn build(&mut self) -> Arc<dyn TypeResolver>;
}

#[derive(Clone)]
enum Registration {
    Instance(Instance),
    Lazy {
        factory: LazyFactory,
        cell: Arc<OnceLock<Instance>>,
    },
    Factory(ServiceFactory),
    Alias(TypeKey),
}

/// The default registrar and resolver.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use command_bind_core::{ServiceRegistry, TypeKey, TypeRegistrar, TypeResolver};
///
/// struct Greeter(&'static str);
///
/// let mut registry = ServiceRegistry::new();
/// registry.register_instance(TypeKey::of::<Greeter>(), Arc::new(Greeter("hello")));
/// let resolver = registry.build();
///
/// let greeter = resolver.resolve_as::<Greeter>().unwrap();
/// assert_eq!(greeter.0, "hello");
/// ```
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    registrations: HashMap<TypeKey, Registration>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.registrations.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TypeRegistrar for ServiceRegistry {
    fn register(&mut self, service: TypeKey, implementation: TypeKey) {
        if service != implementation {
            self.registrations
                .insert(service, Registration::Alias(implementation));
        }
    }

    fn register_instance(&mut self, service: TypeKey, instance: Instance) {
        self.registrations
            .insert(service, Registration::Instance(instance));
    }

    fn register_lazy(&mut self, service: TypeKey, factory: LazyFactory) {
        self.registrations.insert(
            service,
            Registration::Lazy {
                factory,
                cell: Arc::new(OnceLock::new()),
            },
        );
    }

    fn register_factory(&mut self, service: TypeKey, factory: ServiceFactory) {
        self.registrations
            .insert(service, Registration::Factory(factory));
    }

    fn is_registered(&self, service: &TypeKey) -> bool {
        self.registrations.contains_key(service)
    }

    fn build(&mut self) -> Arc<dyn TypeResolver> {
        debug!(services = self.registrations.len(), "built service resolver");
        Arc::new(ServiceResolver {
            registrations: Arc::new(self.registrations.clone()),
        })
    }
}

/// Resolver produced by [`ServiceRegistry::build`].
#[derive(Clone)]
pub struct ServiceResolver {
    registrations: Arc<HashMap<TypeKey, Registration>>,
}

const MAX_ALIAS_DEPTH: usize = 16;

impl TypeResolver for ServiceResolver {
    fn resolve(&self, service: &TypeKey) -> Option<Instance> {
        let mut key = service;
        for _ in 0..MAX_ALIAS_DEPTH {
            match self.registrations.get(key)? {
                Registration::Instance(instance) => return Some(instance.clone()),
                Registration::Lazy { factory, cell } => {
                    return Some(cell.get_or_init(|| factory()).clone());
                }
                Registration::Factory(factory) => return factory(self),
                Registration::Alias(target) => key = target,
            }
        }
        debug!(service = %service, "alias chain too deep");
        None
    }
}
