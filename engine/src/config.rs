//! Application-wide parsing settings.
//!
//! [`AppSettings`] can be built in code through the [`Configurator`](crate::Configurator)
//! or loaded from YAML.
//!
//! # Example YAML
//!
//! ```yaml
//! application_name: deploy
//! application_version: "2.1.0"
//! case_sensitivity:
//!   commands: false
//!   long_options: true
//! strict_parsing: true
//! validate_examples: true
//! help_enabled: true
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which names are matched case-sensitively.
///
/// Short options are always case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseSensitivity {
    pub commands: bool,
    pub long_options: bool,
}

impl Default for CaseSensitivity {
    fn default() -> Self {
        Self {
            commands: true,
            long_options: true,
        }
    }
}

impl CaseSensitivity {
    pub fn command_matches(&self, declared: &str, token: &str) -> bool {
        names_match(self.commands, declared, token)
    }

    pub fn long_option_matches(&self, declared: &str, token: &str) -> bool {
        names_match(self.long_options, declared, token)
    }
}

fn names_match(sensitive: bool, declared: &str, token: &str) -> bool {
    if sensitive {
        declared == token
    } else {
        declared.eq_ignore_ascii_case(token)
    }
}

/// Settings controlling how an application parses and binds.
///
/// # Examples
///
/// ```
/// use command_bind::AppSettings;
///
/// let settings: AppSettings = serde_yaml::from_str("strict_parsing: false").unwrap();
/// assert!(!settings.strict_parsing);
/// assert!(settings.help_enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub application_name: Option<String>,
    /// Reported by `--version`; the option is only recognized when set.
    pub application_version: Option<String>,
    pub case_sensitivity: CaseSensitivity,
    /// Unknown options are errors instead of remaining arguments.
    pub strict_parsing: bool,
    /// Every configured example must parse against the model.
    pub validate_examples: bool,
    /// `-h`, `-?` and `--help` short-circuit parsing.
    pub help_enabled: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            application_name: None,
            application_version: None,
            case_sensitivity: CaseSensitivity::default(),
            strict_parsing: true,
            validate_examples: false,
            help_enabled: true,
        }
    }
}

impl AppSettings {
    /// Loads settings from a YAML file. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::IoError`] if the file cannot be read, or
    /// [`ConfigError::YamlError`] if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let settings = serde_yaml::from_reader(reader)?;
        Ok(settings)
    }

    /// Saves the settings as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::IoError`] if the file cannot be written, or
    /// [`ConfigError::YamlError`] if serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }
}
