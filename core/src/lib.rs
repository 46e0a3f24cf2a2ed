//! Core types for binding command-line values into typed command settings.
//!
//! This crate holds everything the binding engine reasons about that is not
//! tied to a particular command tree:
//!
//! - [`TypeKey`], [`ScalarType`], [`ParameterType`] and [`ParameterKind`]:
//!   the semantic type model of settings properties.
//! - [`Value`]: dynamic values produced from raw tokens, bridged to typed
//!   fields through [`BindValue`] (with [`FlagValue`] and [`MultiMap`] for
//!   optional-value switches and repeated keys).
//! - [`CommandSettings`] and [`DescribeSettings`]: the settings contract and
//!   its declaration hook.
//! - [`MetadataProvider`] with two implementations, [`ReflectionMetadata`]
//!   (runtime discovery) and [`GeneratedMetadata`] (pre-built table).
//! - The type conversion layer ([`TypeConverter`]) and pair deconstruction
//!   ([`PairDeconstructor`]).
//! - The dependency resolution contract ([`TypeResolver`],
//!   [`TypeRegistrar`]) and a default [`ServiceRegistry`].
//!
//! # Example
//!
//! ```
//! use command_bind_core::*;
//!
//! #[derive(Debug, Default)]
//! struct ServeSettings { port: u16, tags: Vec<String> }
//! impl CommandSettings for ServeSettings {}
//!
//! impl DescribeSettings for ServeSettings {
//!     fn describe() -> SettingsDescriptor {
//!         SettingsDescriptor::with_default::<Self>()
//!             .property(
//!                 PropertyAccessor::field("Port", |s: &Self| &s.port, |s| &mut s.port)
//!                     .option("-p|--port <PORT>")
//!                     .default_to(8080_u16),
//!             )
//!             .property(
//!                 PropertyAccessor::field("Tags", |s: &Self| &s.tags, |s| &mut s.tags)
//!                     .option("--tag <TAG>"),
//!             )
//!     }
//! }
//!
//! let provider = ReflectionMetadata::new();
//! provider.register_settings::<ServeSettings>();
//!
//! let metadata = provider.settings_metadata(&TypeKey::of::<ServeSettings>()).unwrap();
//! let port = metadata.find_property("port").unwrap();
//! assert_eq!(port.property_type, ParameterType::Scalar(ScalarType::U16));
//!
//! let mut settings = provider.create_settings(&metadata.settings_type).unwrap();
//! port.set(settings.as_mut(), Value::UInt(3000)).unwrap();
//! assert_eq!(settings.downcast_ref::<ServeSettings>().unwrap().port, 3000);
//! ```

pub mod convert;
mod error;
mod metadata;
mod pair;
mod resolver;
mod settings;
mod types;
mod value;

pub use convert::{EnumConverter, FnConverter, FromStrConverter, IntrinsicConverter, TypeConverter};
pub use error::{BindError, ParseError, SettingsAccessError, ValueError};
pub use metadata::*;
pub use pair::{
    DefaultPairDeconstructor, FnPairDeconstructor, PairContext, PairDeconstructor,
    PairDeconstructorRef,
};
pub use resolver::{
    Instance, LazyFactory, ServiceFactory, ServiceRegistry, ServiceResolver, TypeRegistrar,
    TypeResolver,
};
pub use settings::{
    CommandSettings, DynamicSettings, EmptySettings, SettingsFactory, SettingsProvider, ValidationResult,
};
pub use types::*;
pub use value::{BindValue, CustomValue, EnumValue, FlagValue, MultiMap, ScalarValue, Value};
