//! Parsing of option and argument templates.
//!
//! Option templates list names separated by `|` and an optional value
//! placeholder: `-p|--port <PORT>` takes a required value, `--port [PORT]`
//! an optional one. Argument templates are a single placeholder:
//! `<NAME>` (required) or `[NAME]` (optional).

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ModelError;

/// A parsed option template.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OptionTemplate {
    /// Long names without the leading `--`.
    pub long_names: Vec<String>,
    /// Short names without the leading `-`.
    pub short_names: Vec<String>,
    pub value_name: Option<String>,
    /// The value placeholder was written as `[VALUE]`.
    pub value_is_optional: bool,
}

/// A parsed argument template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentTemplate {
    pub value_name: String,
    pub is_required: bool,
}

fn option_error(template: &str, reason: impl Into<String>) -> ModelError {
    ModelError::InvalidOptionTemplate {
        template: template.to_string(),
        reason: reason.into(),
    }
}

/// Parses an option template.
///
/// # Errors
///
/// Returns [`ModelError::InvalidOptionTemplate`] naming the first problem.
///
/// # Examples
///
/// ```
/// use command_bind::parse_option_template;
///
/// let template = parse_option_template("-p|--port [PORT]").unwrap();
/// assert_eq!(template.short_names, vec!["p"]);
/// assert_eq!(template.long_names, vec!["port"]);
/// assert_eq!(template.value_name.as_deref(), Some("PORT"));
/// assert!(template.value_is_optional);
///
/// assert!(parse_option_template("--p").is_err());
/// ```
pub fn parse_option_template(template: &str) -> Result<OptionTemplate, ModelError> {
    static LONG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9_.-]*$").expect("static regex must compile")
    });
    static SHORT_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^[A-Za-z?]$").expect("static regex must compile"));
    static VALUE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^(?:<([^<>\[\]\s|]+)>|\[([^<>\[\]\s|]+)\])$").expect("static regex must compile")
    });

    let mut result = OptionTemplate::default();
    for part in template.split(|c: char| c == '|' || c.is_whitespace()) {
        if part.is_empty() {
            continue;
        }

        if let Some(captures) = VALUE_RE.captures(part) {
            if result.value_name.is_some() {
                return Err(option_error(template, "multiple values are not supported"));
            }
            match (captures.get(1), captures.get(2)) {
                (Some(required), _) => result.value_name = Some(required.as_str().to_string()),
                (None, Some(optional)) => {
                    result.value_name = Some(optional.as_str().to_string());
                    result.value_is_optional = true;
                }
                (None, None) => return Err(option_error(template, "value must have a name")),
            }
        } else if result.value_name.is_some() {
            return Err(option_error(template, "names must come before the value"));
        } else if let Some(name) = part.strip_prefix("--") {
            if name.is_empty() {
                return Err(option_error(template, "long option name cannot be empty"));
            }
            if name.chars().count() == 1 {
                return Err(option_error(
                    template,
                    format!("long option name '{name}' must be more than one character"),
                ));
            }
            if name.starts_with(|c: char| c.is_ascii_digit()) {
                return Err(option_error(
                    template,
                    format!("long option name '{name}' cannot start with a digit"),
                ));
            }
            if !LONG_RE.is_match(name) {
                return Err(option_error(
                    template,
                    format!("long option name '{name}' contains invalid characters"),
                ));
            }
            result.long_names.push(name.to_string());
        } else if let Some(name) = part.strip_prefix('-') {
            if !SHORT_RE.is_match(name) {
                return Err(option_error(
                    template,
                    format!("short option name '{name}' must be a single letter"),
                ));
            }
            result.short_names.push(name.to_string());
        } else if part.starts_with('<') || part.starts_with('[') {
            return Err(option_error(template, "value must have a name"));
        } else {
            return Err(option_error(template, format!("unexpected '{part}'")));
        }
    }

    if result.long_names.is_empty() && result.short_names.is_empty() {
        return Err(option_error(template, "options must have a name"));
    }
    Ok(result)
}

/// Parses an argument template.
///
/// # Errors
///
/// Returns [`ModelError::InvalidArgumentTemplate`] if the template is not a
/// single `<NAME>` or `[NAME]` placeholder.
///
/// # Examples
///
/// ```
/// use command_bind::parse_argument_template;
///
/// let name = parse_argument_template("<NAME>").unwrap();
/// assert!(name.is_required);
/// assert!(!parse_argument_template("[COUNT]").unwrap().is_required);
/// assert!(parse_argument_template("NAME").is_err());
/// ```
pub fn parse_argument_template(template: &str) -> Result<ArgumentTemplate, ModelError> {
    static ARGUMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^\s*(?:<([^<>\[\]\s]+)>|\[([^<>\[\]\s]+)\])\s*$").expect("static regex must compile")
    });

    let captures = ARGUMENT_RE
        .captures(template)
        .ok_or_else(|| ModelError::InvalidArgumentTemplate {
            template: template.to_string(),
            reason: "expected <NAME> or [NAME]".to_string(),
        })?;

    Ok(match (captures.get(1), captures.get(2)) {
        (Some(required), _) => ArgumentTemplate {
            value_name: required.as_str().to_string(),
            is_required: true,
        },
        (None, optional) => ArgumentTemplate {
            value_name: optional.map(|m| m.as_str().to_string()).unwrap_or_default(),
            is_required: false,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason(template: &str) -> String {
        match parse_option_template(template).unwrap_err() {
            ModelError::InvalidOptionTemplate { reason, .. } => reason,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_flag_template_has_no_value() {
        let template = parse_option_template("-v|--verbose").unwrap();
        assert_eq!(template.short_names, vec!["v"]);
        assert_eq!(template.long_names, vec!["verbose"]);
        assert_eq!(template.value_name, None);
        assert!(!template.value_is_optional);
    }

    #[test]
    fn test_multiple_long_names_and_required_value() {
        let template = parse_option_template("--dry-run|--plan <MODE>").unwrap();
        assert_eq!(template.long_names, vec!["dry-run", "plan"]);
        assert_eq!(template.value_name.as_deref(), Some("MODE"));
        assert!(!template.value_is_optional);
    }

    #[test]
    fn test_invalid_option_templates() {
        assert_eq!(reason("<VALUE>"), "options must have a name");
        assert_eq!(reason("--"), "long option name cannot be empty");
        assert!(reason("--x").contains("more than one character"));
        assert!(reason("--1st").contains("cannot start with a digit"));
        assert!(reason("--na$me").contains("invalid characters"));
        assert!(reason("-ab").contains("single letter"));
        assert_eq!(reason("--a1 <A> <B>"), "multiple values are not supported");
        assert_eq!(reason("--name <> "), "value must have a name");
        assert!(reason("name").contains("unexpected 'name'"));
    }

    #[test]
    fn test_argument_templates() {
        assert_eq!(
            parse_argument_template("[COUNT]").unwrap(),
            ArgumentTemplate {
                value_name: "COUNT".into(),
                is_required: false,
            }
        );
        assert!(parse_argument_template("<A> <B>").is_err());
        assert!(parse_argument_template("<>").is_err());
    }
}
