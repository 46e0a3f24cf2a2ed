//! YAML-declared command trees for `bind-inspect`.
//!
//! A schema lists commands with their options and arguments. Every command
//! gets a runtime-described settings type extending its parent's, so options
//! declared on a branch are inherited by its children.

use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use command_bind::{AppSettings, CommandApp, ConfigureCommands, parse_option_template};
use command_bind_core::{
    EnumType, ParameterType, PropertyAccessor, ReflectionMetadata, ScalarType, SettingsDescriptor,
    TypeKey, Value,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors raised while loading or declaring a schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Parameter '{parameter}' of command '{command}' has an unsupported default value")]
    InvalidDefault { command: String, parameter: String },

    #[error("Parameter '{parameter}' of command '{command}' is an enum without values")]
    EmptyEnum { command: String, parameter: String },

    #[error("Command '{command}' declares an invalid option template: {reason}")]
    InvalidTemplate { command: String, reason: String },
}

/// The root of a schema file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSchema {
    pub settings: AppSettings,
    pub examples: Vec<Vec<String>>,
    pub commands: Vec<CommandSchema>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandSchema {
    pub name: String,
    pub aliases: Vec<String>,
    pub description: Option<String>,
    /// Runs when no sibling command is named.
    pub default: bool,
    pub hidden: bool,
    pub examples: Vec<Vec<String>>,
    pub options: Vec<OptionSchema>,
    pub arguments: Vec<ArgumentSchema>,
    pub commands: Vec<CommandSchema>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionSchema {
    /// Property name, used as the key of the bound value.
    pub name: String,
    /// Option template such as `-p|--port <PORT>`.
    pub template: String,
    #[serde(flatten)]
    pub value: ValueSchema,
    pub description: Option<String>,
    pub required: bool,
    pub hidden: bool,
    pub shadowable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArgumentSchema {
    pub name: String,
    pub position: i32,
    /// Argument template such as `<NAME>` or `[FILES]`.
    pub template: String,
    #[serde(flatten)]
    pub value: ValueSchema,
    pub description: Option<String>,
}

/// Type, shape and default of a parameter's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueSchema {
    /// Defaults to `bool` for options without a value, `string` otherwise.
    #[serde(rename = "type")]
    pub value_type: Option<ValueType>,
    pub shape: Shape,
    /// Members of an `enum` type.
    pub values: Vec<String>,
    pub default: Option<serde_yaml::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Bool,
    Char,
    String,
    Int,
    Uint,
    Float,
    Path,
    Url,
    Uuid,
    Date,
    DateTime,
    Time,
    Duration,
    Enum,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    #[default]
    Single,
    /// May be absent.
    Optional,
    /// Every occurrence appends a value.
    List,
    /// `key=value` entries with string keys.
    Map,
    /// A switch that may carry a value.
    FlagValue,
}

impl AppSchema {
    /// A small schema showing a branch, inherited options and a default
    /// command.
    pub fn starter() -> Self {
        let option = |name: &str, template: &str, value_type: Option<ValueType>, shape: Shape| OptionSchema {
            name: name.to_string(),
            template: template.to_string(),
            value: ValueSchema {
                value_type,
                shape,
                ..ValueSchema::default()
            },
            ..OptionSchema::default()
        };

        Self {
            settings: AppSettings {
                application_name: Some("app".to_string()),
                application_version: Some("0.1.0".to_string()),
                ..AppSettings::default()
            },
            examples: vec![vec!["remote".into(), "add".into(), "origin".into(), "https://example.com".into()]],
            commands: vec![
                CommandSchema {
                    name: "remote".to_string(),
                    description: Some("Manage remotes".to_string()),
                    options: vec![option("verbose", "-v|--verbose", None, Shape::Single)],
                    commands: vec![CommandSchema {
                        name: "add".to_string(),
                        aliases: vec!["a".to_string()],
                        options: vec![option("tags", "-t|--tag <TAG>", None, Shape::List)],
                        arguments: vec![
                            ArgumentSchema {
                                name: "name".to_string(),
                                position: 0,
                                template: "<NAME>".to_string(),
                                ..ArgumentSchema::default()
                            },
                            ArgumentSchema {
                                name: "url".to_string(),
                                position: 1,
                                template: "<URL>".to_string(),
                                value: ValueSchema {
                                    value_type: Some(ValueType::Url),
                                    ..ValueSchema::default()
                                },
                                ..ArgumentSchema::default()
                            },
                        ],
                        ..CommandSchema::default()
                    }],
                    ..CommandSchema::default()
                },
                CommandSchema {
                    name: "status".to_string(),
                    default: true,
                    options: vec![option("short", "-s|--short", None, Shape::Single)],
                    ..CommandSchema::default()
                },
            ],
        }
    }

    /// Loads a schema from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::IoError`] if the file cannot be read, or
    /// [`SchemaError::YamlError`] if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let schema = serde_yaml::from_reader(reader)?;
        Ok(schema)
    }

    /// Saves the schema as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::IoError`] if the file cannot be written, or
    /// [`SchemaError::YamlError`] if serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SchemaError> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Describes every command's settings and declares the command tree.
    ///
    /// # Errors
    ///
    /// Fails on enum parameters without values, unsupported default values
    /// and unparsable option templates.
    pub fn build_app(&self) -> Result<CommandApp, SchemaError> {
        let provider = Arc::new(ReflectionMetadata::new());
        let planned = plan(&self.commands, None, &provider)?;

        let mut app = CommandApp::new().with_metadata(provider);
        app.configure(|config| {
            config.with_settings(self.settings.clone());
            for example in &self.examples {
                config.add_example(example.iter().cloned());
            }
            declare(config, &planned);
        });
        Ok(app)
    }
}

/// A command whose settings were registered with the provider.
#[derive(Debug)]
struct PlannedCommand {
    name: String,
    aliases: Vec<String>,
    description: Option<String>,
    is_default: bool,
    is_hidden: bool,
    examples: Vec<Vec<String>>,
    settings_type: TypeKey,
    children: Vec<PlannedCommand>,
}

fn plan(
    commands: &[CommandSchema],
    parent: Option<(&str, &SettingsDescriptor)>,
    provider: &ReflectionMetadata,
) -> Result<Vec<PlannedCommand>, SchemaError> {
    let mut planned = Vec::with_capacity(commands.len());
    for command in commands {
        let path = match parent {
            Some((parent_path, _)) => format!("{parent_path} {}", command.name),
            None => command.name.clone(),
        };
        let descriptor = describe(command, &path, parent.map(|(_, base)| base))?;
        let settings_type = descriptor.settings_type.clone();
        debug!(command = %path, settings = %settings_type, "declared schema command");

        let children = plan(&command.commands, Some((&path, &descriptor)), provider)?;
        provider.register_descriptor(descriptor);
        planned.push(PlannedCommand {
            name: command.name.clone(),
            aliases: command.aliases.clone(),
            description: command.description.clone(),
            is_default: command.default,
            is_hidden: command.hidden,
            examples: command.examples.clone(),
            settings_type,
            children,
        });
    }
    Ok(planned)
}

fn declare<C: ConfigureCommands>(target: &mut C, commands: &[PlannedCommand]) {
    for command in commands {
        let configured = if !command.children.is_empty() {
            target.add_dynamic_branch(&command.name, command.settings_type.clone(), |branch| {
                declare(branch, &command.children);
            })
        } else if command.is_default {
            target.set_dynamic_default_delegate(command.settings_type.clone(), |_, _| 0)
        } else {
            target.add_dynamic_delegate(&command.name, command.settings_type.clone(), |_, _| 0)
        };

        for alias in &command.aliases {
            configured.with_alias(alias.clone());
        }
        if let Some(description) = &command.description {
            configured.with_description(description.clone());
        }
        for example in &command.examples {
            configured.with_example(example.iter().cloned());
        }
        if command.is_hidden {
            configured.hidden();
        }
    }
}

fn describe(
    command: &CommandSchema,
    path: &str,
    base: Option<&SettingsDescriptor>,
) -> Result<SettingsDescriptor, SchemaError> {
    let settings_type = TypeKey::named(format!("{path} settings"));
    let mut descriptor = SettingsDescriptor::dynamic(settings_type.clone());
    if let Some(base) = base {
        descriptor = descriptor.extends_descriptor(base.clone());
    }

    for option in &command.options {
        let takes_value = parse_option_template(&option.template)
            .map_err(|err| SchemaError::InvalidTemplate {
                command: path.to_string(),
                reason: err.to_string(),
            })?
            .value_name
            .is_some();
        let fallback = if takes_value { ValueType::String } else { ValueType::Bool };
        let context = Context::new(path, &option.name);
        let property_type = context.parameter_type(&option.value, fallback, &settings_type)?;

        let mut property = PropertyAccessor::dynamic(&option.name, settings_type.clone(), property_type.clone())
            .option(&option.template);
        property = match context.default_value(&option.value)? {
            Some(value) => property.default_value(value),
            None if property_type == ParameterType::Scalar(ScalarType::Bool) => {
                property.default_value(Value::Bool(false))
            }
            None => property,
        };
        if let Some(description) = &option.description {
            property = property.describe(description);
        }
        if option.required {
            property = property.required();
        }
        if option.hidden {
            property = property.hidden();
        }
        if option.shadowable {
            property = property.shadowable();
        }
        descriptor = descriptor.property(property);
    }

    for argument in &command.arguments {
        let context = Context::new(path, &argument.name);
        let property_type = context.parameter_type(&argument.value, ValueType::String, &settings_type)?;
        let mut property = PropertyAccessor::dynamic(&argument.name, settings_type.clone(), property_type)
            .argument(argument.position, &argument.template);
        if let Some(value) = context.default_value(&argument.value)? {
            property = property.default_value(value);
        }
        if let Some(description) = &argument.description {
            property = property.describe(description);
        }
        descriptor = descriptor.property(property);
    }
    Ok(descriptor)
}

/// Names a parameter in errors.
struct Context<'a> {
    command: &'a str,
    parameter: &'a str,
}

impl<'a> Context<'a> {
    fn new(command: &'a str, parameter: &'a str) -> Self {
        Self { command, parameter }
    }

    fn parameter_type(
        &self,
        value: &ValueSchema,
        fallback: ValueType,
        settings_type: &TypeKey,
    ) -> Result<ParameterType, SchemaError> {
        let scalar = match value.value_type.unwrap_or(fallback) {
            ValueType::Bool => ScalarType::Bool,
            ValueType::Char => ScalarType::Char,
            ValueType::String => ScalarType::String,
            ValueType::Int => ScalarType::I64,
            ValueType::Uint => ScalarType::U64,
            ValueType::Float => ScalarType::F64,
            ValueType::Path => ScalarType::Path,
            ValueType::Url => ScalarType::Url,
            ValueType::Uuid => ScalarType::Uuid,
            ValueType::Date => ScalarType::Date,
            ValueType::DateTime => ScalarType::DateTime,
            ValueType::Time => ScalarType::Time,
            ValueType::Duration => ScalarType::Duration,
            ValueType::Enum => {
                if value.values.is_empty() {
                    return Err(SchemaError::EmptyEnum {
                        command: self.command.to_string(),
                        parameter: self.parameter.to_string(),
                    });
                }
                ScalarType::Enum(EnumType::new(
                    TypeKey::named(format!("{settings_type}.{}", self.parameter)),
                    value.values.iter().cloned(),
                ))
            }
        };
        Ok(match value.shape {
            Shape::Single => ParameterType::Scalar(scalar),
            Shape::Optional => ParameterType::Nullable(scalar),
            Shape::List => ParameterType::Array(scalar),
            Shape::Map => ParameterType::Map {
                key: ScalarType::String,
                value: scalar,
            },
            Shape::FlagValue => ParameterType::FlagValue(scalar),
        })
    }

    /// Defaults are kept as text and converted by the engine.
    fn default_value(&self, value: &ValueSchema) -> Result<Option<Value>, SchemaError> {
        let Some(default) = &value.default else {
            return Ok(None);
        };
        let value = match default {
            serde_yaml::Value::Null => return Ok(None),
            serde_yaml::Value::Sequence(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.scalar_text(item).map(Value::String))
                    .collect::<Result<_, _>>()?,
            ),
            other => Value::String(self.scalar_text(other)?),
        };
        Ok(Some(value))
    }

    fn scalar_text(&self, value: &serde_yaml::Value) -> Result<String, SchemaError> {
        match value {
            serde_yaml::Value::String(text) => Ok(text.clone()),
            serde_yaml::Value::Bool(flag) => Ok(flag.to_string()),
            serde_yaml::Value::Number(number) => Ok(number.to_string()),
            _ => Err(SchemaError::InvalidDefault {
                command: self.command.to_string(),
                parameter: self.parameter.to_string(),
            }),
        }
    }
}
