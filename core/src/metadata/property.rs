//! Property accessors and the parameter attributes attached to them.

use std::fmt;
use std::sync::Arc;

use crate::convert::TypeConverter;
use crate::error::BindError;
use crate::pair::{PairDeconstructor, PairDeconstructorRef};
use crate::settings::{CommandSettings, DynamicSettings, ValidationResult};
use crate::types::{ParameterType, TypeKey};
use crate::value::{BindValue, Value};

/// Marks a property as a named option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionAttribute {
    /// Option template such as `-n|--name <NAME>` or `--port [PORT]`.
    pub template: String,
    pub is_required: bool,
    pub is_hidden: bool,
    /// Lets this option re-declare an option already exposed by a parent
    /// command.
    pub allow_shadowing: bool,
}

/// Marks a property as a positional argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentAttribute {
    /// Declared position; normalized when the model is built.
    pub position: i32,
    /// `<NAME>` for required arguments, `[NAME]` for optional ones.
    pub template: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterAttribute {
    Option(OptionAttribute),
    Argument(ArgumentAttribute),
}

/// A parameter value handed to validators and value providers.
#[derive(Debug, Clone, Copy)]
pub struct ParameterContext<'a> {
    /// Property name of the parameter.
    pub parameter: &'a str,
    /// The converted value, or [`Value::Null`] when nothing was mapped.
    pub value: &'a Value,
}

/// Validates a single converted parameter value.
pub trait ParameterValidator: Send + Sync {
    fn validate(&self, context: &ParameterContext<'_>) -> ValidationResult;
}

impl<F> ParameterValidator for F
where
    F: Fn(&ParameterContext<'_>) -> ValidationResult + Send + Sync,
{
    fn validate(&self, context: &ParameterContext<'_>) -> ValidationResult {
        self(context)
    }
}

/// Supplies a value for a parameter that was not given on the command line.
pub trait ParameterValueProvider: Send + Sync {
    fn try_get_value(&self, context: &ParameterContext<'_>) -> Option<Value>;
}

impl<F> ParameterValueProvider for F
where
    F: Fn(&ParameterContext<'_>) -> Option<Value> + Send + Sync,
{
    fn try_get_value(&self, context: &ParameterContext<'_>) -> Option<Value> {
        self(context)
    }
}

pub type Getter = Arc<dyn Fn(&dyn CommandSettings) -> Option<Value> + Send + Sync>;
pub type Setter = Arc<dyn Fn(&mut dyn CommandSettings, Value) -> Result<(), BindError> + Send + Sync>;

/// Reads and writes one property of a settings type.
///
/// The getter and setter are captured when the property is declared, so the
/// binder never needs to know the concrete settings type.
///
/// # Examples
///
/// ```
/// use command_bind_core::{CommandSettings, PropertyAccessor, Value};
///
/// #[derive(Debug, Default)]
/// struct GreetSettings { name: String }
/// impl CommandSettings for GreetSettings {}
///
/// let name = PropertyAccessor::field("Name", |s: &GreetSettings| &s.name, |s| &mut s.name)
///     .argument(0, "<NAME>")
///     .describe("Who to greet");
///
/// let mut settings: Box<dyn CommandSettings> = Box::new(GreetSettings::default());
/// name.set(settings.as_mut(), Value::String("Alice".into())).unwrap();
/// assert_eq!(name.get(settings.as_ref()), Some(Value::String("Alice".into())));
/// ```
#[derive(Clone)]
pub struct PropertyAccessor {
    pub name: String,
    pub declaring_type: TypeKey,
    pub property_type: ParameterType,
    pub attribute: Option<ParameterAttribute>,
    pub description: Option<String>,
    pub default_value: Option<Value>,
    pub converter: Option<Arc<dyn TypeConverter>>,
    pub pair_deconstructor: Option<PairDeconstructorRef>,
    pub value_provider: Option<Arc<dyn ParameterValueProvider>>,
    pub validators: Vec<Arc<dyn ParameterValidator>>,
    getter: Getter,
    setter: Option<Setter>,
}

impl PropertyAccessor {
    /// Declares a property backed by a field of `S`.
    pub fn field<S, T>(name: impl Into<String>, get: fn(&S) -> &T, get_mut: fn(&mut S) -> &mut T) -> Self
    where
        S: CommandSettings,
        T: BindValue,
    {
        let name = name.into();
        let property = name.clone();
        let setter: Setter = Arc::new(move |settings: &mut dyn CommandSettings, value: Value| {
            let target = settings
                .downcast_mut::<S>()
                .ok_or_else(|| wrong_settings::<S>(&property))?;
            *get_mut(target) = T::from_value(value).map_err(|err| BindError::PropertyAssignment {
                property: property.clone(),
                reason: err.to_string(),
            })?;
            Ok(())
        });
        Self::read_only(name, get).with_setter(setter)
    }

    /// Declares a property that can be read but not assigned.
    pub fn read_only<S, T>(name: impl Into<String>, get: fn(&S) -> &T) -> Self
    where
        S: CommandSettings,
        T: BindValue,
    {
        let getter: Getter = Arc::new(move |settings: &dyn CommandSettings| {
            settings.downcast_ref::<S>().map(|s| get(s).to_value())
        });
        Self::custom(
            name,
            TypeKey::of::<S>(),
            T::parameter_type(),
            getter,
            None,
        )
    }

    /// Declares a property stored in a [`DynamicSettings`] bag.
    pub fn dynamic(
        name: impl Into<String>,
        declaring_type: TypeKey,
        property_type: ParameterType,
    ) -> Self {
        let name = name.into();
        let key = name.clone();
        let getter: Getter = Arc::new(move |settings: &dyn CommandSettings| {
            settings
                .downcast_ref::<DynamicSettings>()
                .and_then(|bag| bag.get(&key).cloned())
        });
        let key = name.clone();
        let setter: Setter = Arc::new(move |settings: &mut dyn CommandSettings, value: Value| {
            let bag = settings
                .downcast_mut::<DynamicSettings>()
                .ok_or_else(|| wrong_settings::<DynamicSettings>(&key))?;
            bag.set(key.clone(), value);
            Ok(())
        });
        Self::custom(name, declaring_type, property_type, getter, Some(setter))
    }

    /// Declares a property with hand-written accessors.
    pub fn custom(
        name: impl Into<String>,
        declaring_type: TypeKey,
        property_type: ParameterType,
        getter: Getter,
        setter: Option<Setter>,
    ) -> Self {
        Self {
            name: name.into(),
            declaring_type,
            property_type,
            attribute: None,
            description: None,
            default_value: None,
            converter: None,
            pair_deconstructor: None,
            value_provider: None,
            validators: Vec::new(),
            getter,
            setter,
        }
    }

    fn with_setter(mut self, setter: Setter) -> Self {
        self.setter = Some(setter);
        self
    }

    pub fn option(mut self, template: impl Into<String>) -> Self {
        self.attribute = Some(ParameterAttribute::Option(OptionAttribute {
            template: template.into(),
            is_required: false,
            is_hidden: false,
            allow_shadowing: false,
        }));
        self
    }

    pub fn argument(mut self, position: i32, template: impl Into<String>) -> Self {
        self.attribute = Some(ParameterAttribute::Argument(ArgumentAttribute {
            position,
            template: template.into(),
        }));
        self
    }

    /// Marks an option as required.
    pub fn required(mut self) -> Self {
        if let Some(ParameterAttribute::Option(option)) = &mut self.attribute {
            option.is_required = true;
        }
        self
    }

    pub fn hidden(mut self) -> Self {
        if let Some(ParameterAttribute::Option(option)) = &mut self.attribute {
            option.is_hidden = true;
        }
        self
    }

    /// Allows this option to shadow a parent command's option.
    pub fn shadowable(mut self) -> Self {
        if let Some(ParameterAttribute::Option(option)) = &mut self.attribute {
            option.allow_shadowing = true;
        }
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Default used when the parameter is not mapped. Strings are converted
    /// to the property type.
    pub fn default_value(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn default_to<T: BindValue>(self, value: T) -> Self {
        self.default_value(value.to_value())
    }

    pub fn converter(mut self, converter: impl TypeConverter + 'static) -> Self {
        self.converter = Some(Arc::new(converter));
        self
    }

    pub fn pair_deconstructor<D: PairDeconstructor + Default + 'static>(mut self) -> Self {
        self.pair_deconstructor = Some(PairDeconstructorRef::of::<D>());
        self
    }

    pub fn value_provider(mut self, provider: impl ParameterValueProvider + 'static) -> Self {
        self.value_provider = Some(Arc::new(provider));
        self
    }

    pub fn validator(mut self, validator: impl ParameterValidator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    pub fn can_set(&self) -> bool {
        self.setter.is_some()
    }

    pub fn option_attribute(&self) -> Option<&OptionAttribute> {
        match &self.attribute {
            Some(ParameterAttribute::Option(option)) => Some(option),
            _ => None,
        }
    }

    pub fn argument_attribute(&self) -> Option<&ArgumentAttribute> {
        match &self.attribute {
            Some(ParameterAttribute::Argument(argument)) => Some(argument),
            _ => None,
        }
    }

    /// Reads the current value; `None` when `settings` has the wrong type.
    pub fn get(&self, settings: &dyn CommandSettings) -> Option<Value> {
        (self.getter)(settings)
    }

    pub fn set(&self, settings: &mut dyn CommandSettings, value: Value) -> Result<(), BindError> {
        match &self.setter {
            Some(setter) => setter(settings, value),
            None => Err(BindError::PropertyAssignment {
                property: self.name.clone(),
                reason: "property is read-only".to_string(),
            }),
        }
    }

    /// Identity used to detect the same backing property across commands.
    pub fn is_same_backing_property(&self, other: &PropertyAccessor) -> bool {
        self.declaring_type == other.declaring_type
            && self.name == other.name
            && self.property_type == other.property_type
    }
}

fn wrong_settings<S: 'static>(property: &str) -> BindError {
    BindError::PropertyAssignment {
        property: property.to_string(),
        reason: format!(
            "settings instance is not a {}",
            TypeKey::of::<S>().short_name()
        ),
    }
}

impl fmt::Debug for PropertyAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyAccessor")
            .field("name", &self.name)
            .field("declaring_type", &self.declaring_type)
            .field("property_type", &self.property_type)
            .field("attribute", &self.attribute)
            .field("default_value", &self.default_value)
            .field("can_set", &self.can_set())
            .finish_non_exhaustive()
    }
}
