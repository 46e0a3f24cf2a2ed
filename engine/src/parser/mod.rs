//! Matching tokens against the command model.
//!
//! The matcher walks the tokens once. Command names descend into child
//! commands, options are looked up on the current command and then its
//! ancestors, and plain values fill the current command's arguments in
//! position order.

mod tokenizer;
mod tree;

use command_bind_core::{ParameterKind, ParseError};
use tracing::debug;

pub use tokenizer::{Token, Tokenized, tokenize};
pub use tree::{CommandTree, CommandTreeNode, MappedParameter};

use crate::command::RemainingArguments;
use crate::config::AppSettings;
use crate::model::{CommandId, CommandModel, CommandParameter, ParameterId};

/// How a parse ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// Commands were matched and are ready to bind.
    Tree(CommandTree),
    /// Help was requested, for the given command or the application.
    Help(Option<CommandId>),
    /// `--version` was given at the root.
    Version,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
    pub outcome: ParseOutcome,
    pub remaining: RemainingArguments,
}

/// Matches argument vectors against a [`CommandModel`].
///
/// # Examples
///
/// ```
/// use command_bind::{AppSettings, CommandModel, CommandTreeParser, ParseOutcome};
///
/// let model = CommandModel::default();
/// let settings = AppSettings::default();
/// let parser = CommandTreeParser::new(&model, &settings);
///
/// let result = parser.parse(&["--help".to_string()]).unwrap();
/// assert_eq!(result.outcome, ParseOutcome::Help(None));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CommandTreeParser<'a> {
    model: &'a CommandModel,
    settings: &'a AppSettings,
}

impl<'a> CommandTreeParser<'a> {
    pub fn new(model: &'a CommandModel, settings: &'a AppSettings) -> Self {
        Self { model, settings }
    }

    /// Parses `args`.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] for unknown commands and options, values
    /// without a slot, options missing their value, and missing required
    /// arguments.
    pub fn parse(&self, args: &[String]) -> Result<ParseResult, ParseError> {
        let tokenized = tokenize(args);
        let mut matcher = Matcher {
            model: self.model,
            settings: self.settings,
            tokens: tokenized.tokens,
            position: 0,
            nodes: Vec::new(),
            argument_cursor: 0,
            remaining: RemainingArguments {
                raw: tokenized.remaining,
                ..RemainingArguments::default()
            },
        };

        let outcome = matcher.run()?;
        if let ParseOutcome::Tree(tree) = &outcome {
            debug!(path = ?tree.path(self.model), "matched command tree");
        }
        Ok(ParseResult {
            outcome,
            remaining: matcher.remaining,
        })
    }
}

enum OptionName<'t> {
    Long(&'t str),
    Short(&'t str),
}

struct Matcher<'a> {
    model: &'a CommandModel,
    settings: &'a AppSettings,
    tokens: Vec<Token>,
    position: usize,
    nodes: Vec<CommandTreeNode>,
    /// Next argument slot of the last node.
    argument_cursor: usize,
    remaining: RemainingArguments,
}

impl<'a> Matcher<'a> {
    fn run(&mut self) -> Result<ParseOutcome, ParseError> {
        while let Some(token) = self.tokens.get(self.position).cloned() {
            self.position += 1;

            if self.nodes.is_empty() {
                if let Some(outcome) = self.match_root(&token)? {
                    return Ok(outcome);
                }
                continue;
            }

            let outcome = match token {
                Token::Value(text) => {
                    self.match_value(text)?;
                    None
                }
                Token::LongOption { name, value } => self.match_long(&name, value)?,
                Token::ShortOptions { names, value } => self.match_short(&names, value)?,
            };
            if let Some(outcome) = outcome {
                return Ok(outcome);
            }
        }

        self.finish()
    }

    fn is_help(&self, name: &OptionName<'_>) -> bool {
        self.settings.help_enabled
            && match name {
                OptionName::Long(long) => self.settings.case_sensitivity.long_option_matches("help", long),
                OptionName::Short(short) => *short == "h" || *short == "?",
            }
    }

    fn current(&self) -> Option<CommandId> {
        self.nodes.last().map(|node| node.command)
    }

    /// Handles a token before any command was matched. `None` continues.
    fn match_root(&mut self, token: &Token) -> Result<Option<ParseOutcome>, ParseError> {
        match token {
            Token::Value(text) => {
                if let Some(root) = self.model.find_root(text, &self.settings.case_sensitivity) {
                    self.push(root);
                    return Ok(None);
                }
            }
            Token::LongOption { name, value: None } => {
                if self.is_help(&OptionName::Long(name)) {
                    return Ok(Some(ParseOutcome::Help(None)));
                }
                if self.settings.application_version.is_some()
                    && self.settings.case_sensitivity.long_option_matches("version", name)
                {
                    return Ok(Some(ParseOutcome::Version));
                }
            }
            Token::ShortOptions { names, value: None } if names.len() == 1 => {
                if self.is_help(&OptionName::Short(&names[0].to_string())) {
                    return Ok(Some(ParseOutcome::Help(None)));
                }
            }
            _ => {}
        }

        match self.model.default_command {
            Some(default) => {
                self.push(default);
                // The token belongs to the default command.
                self.position -= 1;
                Ok(None)
            }
            None => Err(match token {
                Token::Value(text) => ParseError::UnknownCommand(text.clone()),
                Token::LongOption { name, .. } => ParseError::UnknownOption(format!("--{name}")),
                Token::ShortOptions { names, .. } => {
                    ParseError::UnknownOption(format!("-{}", names.first().copied().unwrap_or_default()))
                }
            }),
        }
    }

    fn match_value(&mut self, text: String) -> Result<(), ParseError> {
        let model = self.model;
        let Some(current) = self.current() else {
            return Ok(());
        };
        if let Some(child) = model.find_child(current, &text, &self.settings.case_sensitivity) {
            self.leave_node()?;
            self.push(child);
            return Ok(());
        }

        let command = model.command(current);
        let slot = command
            .arguments()
            .get(self.argument_cursor)
            .map(|(parameter, _)| (parameter.id, parameter.kind));
        if let Some((id, kind)) = slot {
            self.map(current, id, Some(text));
            if kind != ParameterKind::Vector {
                self.argument_cursor += 1;
            }
            return Ok(());
        }

        if command.is_branch() {
            return Err(ParseError::UnknownCommand(text));
        }
        if self.settings.strict_parsing {
            return Err(ParseError::UnexpectedArgument(text));
        }
        self.remaining.parsed.insert(text, None);
        Ok(())
    }

    fn match_long(&mut self, name: &str, value: Option<String>) -> Result<Option<ParseOutcome>, ParseError> {
        if name.is_empty() {
            let raw = match &value {
                Some(value) => format!("--={value}"),
                None => "--".to_string(),
            };
            return Err(ParseError::OptionNameMissing(raw));
        }

        let display = format!("--{name}");
        match self.find_option(&OptionName::Long(name)) {
            Some((owner, parameter)) => {
                self.map_option(owner, parameter, value, &display)?;
                Ok(None)
            }
            None if self.is_help(&OptionName::Long(name)) => Ok(Some(ParseOutcome::Help(self.current()))),
            None => {
                self.unknown_option(display, value)?;
                Ok(None)
            }
        }
    }

    fn match_short(&mut self, names: &[char], value: Option<String>) -> Result<Option<ParseOutcome>, ParseError> {
        for (index, short) in names.iter().enumerate() {
            let name = short.to_string();
            let display = format!("-{name}");
            let is_last = index + 1 == names.len();
            let attached = if is_last { value.clone() } else { None };

            let Some((owner, parameter)) = self.find_option(&OptionName::Short(&name)) else {
                if self.is_help(&OptionName::Short(&name)) {
                    return Ok(Some(ParseOutcome::Help(self.current())));
                }
                self.unknown_option(display, attached)?;
                continue;
            };

            if is_last || parameter.kind == ParameterKind::Flag {
                self.map_option(owner, parameter, attached, &display)?;
                continue;
            }

            // `-p8080`: the rest of the group is the value.
            if index == 0 && value.is_none() {
                let rest: String = names[1..].iter().collect();
                self.map_option(owner, parameter, Some(rest), &display)?;
                return Ok(None);
            }
            if parameter.kind == ParameterKind::FlagWithValue {
                self.map(owner, parameter.id, None);
                continue;
            }
            return Err(ParseError::OptionValueInGroup(display));
        }
        Ok(None)
    }

    /// Finds an option on the matched commands, nearest first.
    fn find_option(&self, name: &OptionName<'_>) -> Option<(CommandId, &'a CommandParameter)> {
        let model = self.model;
        let case = &self.settings.case_sensitivity;
        self.nodes.iter().rev().find_map(|node| {
            let command = model.command(node.command);
            command
                .options()
                .find(|(_, option)| match name {
                    OptionName::Long(long) => option.has_long_name(long, case),
                    OptionName::Short(short) => option.has_short_name(short),
                })
                .map(|(parameter, _)| (node.command, parameter))
        })
    }

    fn map_option(
        &mut self,
        owner: CommandId,
        parameter: &CommandParameter,
        attached: Option<String>,
        display: &str,
    ) -> Result<(), ParseError> {
        let id = parameter.id;
        match parameter.kind {
            ParameterKind::Flag => {
                let value = attached.or_else(|| {
                    self.take_value_if(|_, text| {
                        text.eq_ignore_ascii_case("true") || text.eq_ignore_ascii_case("false")
                    })
                });
                self.map(owner, id, value);
            }
            ParameterKind::Scalar => {
                let value = attached
                    .or_else(|| self.take_value_if(|_, _| true))
                    .ok_or_else(|| ParseError::OptionHasNoValue(display.to_string()))?;
                self.map(owner, id, Some(value));
            }
            ParameterKind::Vector | ParameterKind::Pair => {
                let mut values: Vec<String> = attached.into_iter().collect();
                while let Some(value) = self.take_value_if(|matcher, text| !matcher.is_child_command(text)) {
                    values.push(value);
                }
                if values.is_empty() {
                    return Err(ParseError::OptionHasNoValue(display.to_string()));
                }
                for value in values {
                    self.map(owner, id, Some(value));
                }
            }
            ParameterKind::FlagWithValue => {
                let value = attached.or_else(|| {
                    self.take_value_if(|matcher, text| !matcher.is_child_command(text))
                });
                self.map(owner, id, value);
            }
        }
        Ok(())
    }

    fn unknown_option(&mut self, option_name: String, attached: Option<String>) -> Result<(), ParseError> {
        if self.settings.strict_parsing {
            return Err(ParseError::UnknownOption(option_name));
        }
        let value = attached.or_else(|| {
            self.take_value_if(|matcher, text| !matcher.is_child_command(text))
        });
        debug!(option = %option_name, "collected unknown option");
        self.remaining.parsed.insert(option_name, value);
        Ok(())
    }

    fn is_child_command(&self, text: &str) -> bool {
        self.current().is_some_and(|current| {
            self.model
                .find_child(current, text, &self.settings.case_sensitivity)
                .is_some()
        })
    }

    /// Consumes the next token if it is a plain value accepted by `accept`.
    fn take_value_if(&mut self, accept: impl Fn(&Self, &str) -> bool) -> Option<String> {
        let text = match self.tokens.get(self.position) {
            Some(Token::Value(text)) => text.clone(),
            _ => return None,
        };
        if !accept(self, &text) {
            return None;
        }
        self.position += 1;
        Some(text)
    }

    fn push(&mut self, command: CommandId) {
        self.nodes.push(CommandTreeNode::new(command));
        self.argument_cursor = 0;
    }

    fn map(&mut self, owner: CommandId, parameter: ParameterId, value: Option<String>) {
        if let Some(node) = self.nodes.iter_mut().rev().find(|node| node.command == owner) {
            node.mapped.push(MappedParameter { parameter, value });
        }
    }

    /// Fails when the last node still lacks a required argument.
    fn leave_node(&self) -> Result<(), ParseError> {
        let Some(node) = self.nodes.last() else {
            return Ok(());
        };
        let command = self.model.command(node.command);
        for (parameter, argument) in command.arguments() {
            if parameter.is_required && !node.is_mapped(parameter.id) {
                return Err(ParseError::MissingRequiredArgument {
                    command: (!command.is_default_command).then(|| command.name.clone()),
                    argument: argument.value_name.clone(),
                });
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<ParseOutcome, ParseError> {
        let model = self.model;
        if self.nodes.is_empty() {
            match model.default_command {
                Some(default) => self.push(default),
                None if self.settings.help_enabled && model.roots.is_empty() => {
                    return Ok(ParseOutcome::Help(None));
                }
                None => return Err(ParseError::NoCommandSpecified),
            }
        }

        loop {
            self.leave_node()?;
            let Some(current) = self.current() else {
                return Err(ParseError::NoCommandSpecified);
            };
            let command = model.command(current);
            if !command.is_branch() {
                break;
            }
            match model.default_child(current) {
                Some(default) => self.push(default),
                None => return Err(ParseError::MissingSubcommand(command.name.clone())),
            }
        }

        Ok(ParseOutcome::Tree(CommandTree {
            nodes: std::mem::take(&mut self.nodes),
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use command_bind_core::{
        CommandSettings, DescribeSettings, FlagValue, MetadataProvider, PropertyAccessor,
        ReflectionMetadata, SettingsDescriptor,
    };

    use super::*;
    use crate::configuration::{ConfigureCommands, Configurator};
    use crate::model::build_model;

    #[derive(Debug, Default)]
    struct RemoteSettings {
        verbose: bool,
        hosts: Vec<String>,
    }
    impl CommandSettings for RemoteSettings {}
    impl DescribeSettings for RemoteSettings {
        fn describe() -> SettingsDescriptor {
            SettingsDescriptor::with_default::<Self>()
                .property(
                    PropertyAccessor::field("Verbose", |s: &Self| &s.verbose, |s| &mut s.verbose)
                        .option("-v|--verbose"),
                )
                .property(
                    PropertyAccessor::field("Hosts", |s: &Self| &s.hosts, |s| &mut s.hosts)
                        .option("-H|--host <HOST>"),
                )
        }
    }

    #[derive(Debug, Default)]
    struct AddSettings {
        remote: RemoteSettings,
        name: String,
        urls: Vec<String>,
        tags: Vec<String>,
        port: FlagValue<u16>,
        labels: HashMap<String, String>,
        force: bool,
        count: i32,
    }
    impl CommandSettings for AddSettings {
        fn base(&self) -> Option<&dyn CommandSettings> {
            Some(&self.remote)
        }
        fn base_mut(&mut self) -> Option<&mut dyn CommandSettings> {
            Some(&mut self.remote)
        }
    }
    impl DescribeSettings for AddSettings {
        fn describe() -> SettingsDescriptor {
            SettingsDescriptor::with_default::<Self>()
                .extends::<RemoteSettings>()
                .property(PropertyAccessor::field("Name", |s: &Self| &s.name, |s| &mut s.name).argument(0, "<NAME>"))
                .property(PropertyAccessor::field("Urls", |s: &Self| &s.urls, |s| &mut s.urls).argument(1, "[URLS]"))
                .property(PropertyAccessor::field("Tags", |s: &Self| &s.tags, |s| &mut s.tags).option("-t|--tag <TAG>"))
                .property(PropertyAccessor::field("Port", |s: &Self| &s.port, |s| &mut s.port).option("-p|--port [PORT]"))
                .property(
                    PropertyAccessor::field("Labels", |s: &Self| &s.labels, |s| &mut s.labels).option("-l|--label <LABEL>"),
                )
                .property(PropertyAccessor::field("Force", |s: &Self| &s.force, |s| &mut s.force).option("-f|--force"))
                .property(PropertyAccessor::field("Count", |s: &Self| &s.count, |s| &mut s.count).option("-c|--count <N>"))
        }
    }

    fn fixture(settings: AppSettings) -> (CommandModel, AppSettings) {
        let mut config = Configurator::new();
        config.with_settings(settings);
        config.add_branch::<RemoteSettings>("remote", |remote| {
            remote.add_delegate::<AddSettings, _>("add", |_, _| 0).with_alias("a");
        });
        let provider = ReflectionMetadata::new();
        for registration in config.registrations() {
            provider.discover(registration);
        }
        let model = build_model(&config, &provider as &dyn MetadataProvider).unwrap();
        (model, config.settings().clone())
    }

    fn parse(args: &[&str]) -> Result<ParseResult, ParseError> {
        parse_with(AppSettings::default(), args)
    }

    fn parse_with(settings: AppSettings, args: &[&str]) -> Result<ParseResult, ParseError> {
        let (model, settings) = fixture(settings);
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        CommandTreeParser::new(&model, &settings).parse(&args)
    }

    /// `(property, value)` pairs mapped anywhere in the tree.
    fn mapped(args: &[&str]) -> Vec<(String, Option<String>)> {
        let (model, settings) = fixture(AppSettings::default());
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        let result = CommandTreeParser::new(&model, &settings).parse(&args).unwrap();
        let ParseOutcome::Tree(tree) = result.outcome else {
            panic!("expected a tree");
        };
        tree.nodes
            .iter()
            .flat_map(|node| node.mapped.iter())
            .map(|mapped| {
                let (_, parameter) = model.parameter(mapped.parameter);
                (parameter.property_name().to_string(), mapped.value.clone())
            })
            .collect()
    }

    fn pair(name: &str, value: Option<&str>) -> (String, Option<String>) {
        (name.to_string(), value.map(str::to_string))
    }

    #[test]
    fn test_descends_and_maps_parent_option() {
        let values = mapped(&["remote", "-v", "a", "origin"]);
        assert_eq!(values, vec![pair("Verbose", None), pair("Name", Some("origin"))]);
        // Parent options stay usable after descending.
        let values = mapped(&["remote", "add", "origin", "--verbose"]);
        assert_eq!(values, vec![pair("Verbose", None), pair("Name", Some("origin"))]);
    }

    #[test]
    fn test_vector_option_consumes_following_values() {
        let values = mapped(&["remote", "add", "origin", "--tag", "a", "b", "-t", "c"]);
        assert_eq!(
            values,
            vec![
                pair("Name", Some("origin")),
                pair("Tags", Some("a")),
                pair("Tags", Some("b")),
                pair("Tags", Some("c")),
            ]
        );
    }

    #[test]
    fn test_vector_option_stops_at_child_command() {
        let values = mapped(&["remote", "--host", "h1", "h2", "add", "origin"]);
        assert_eq!(
            values,
            vec![
                pair("Hosts", Some("h1")),
                pair("Hosts", Some("h2")),
                pair("Name", Some("origin")),
            ]
        );

        let values = mapped(&["remote", "-H", "h1", "a", "origin"]);
        assert_eq!(values, vec![pair("Hosts", Some("h1")), pair("Name", Some("origin"))]);
    }

    #[test]
    fn test_vector_argument_takes_rest() {
        let values = mapped(&["remote", "add", "origin", "u1", "u2"]);
        assert_eq!(
            values,
            vec![pair("Name", Some("origin")), pair("Urls", Some("u1")), pair("Urls", Some("u2"))]
        );
    }

    #[test]
    fn test_flag_with_value_forms() {
        assert!(mapped(&["remote", "add", "origin", "--port"]).contains(&pair("Port", None)));
        assert!(mapped(&["remote", "add", "origin", "--port", "8080"]).contains(&pair("Port", Some("8080"))));
        assert!(mapped(&["remote", "add", "origin", "-p8080"]).contains(&pair("Port", Some("8080"))));
    }

    #[test]
    fn test_short_group_and_attached_values() {
        let values = mapped(&["remote", "add", "origin", "-vf", "-c=3", "--label:a=b"]);
        assert_eq!(
            values,
            vec![
                pair("Verbose", None),
                pair("Name", Some("origin")),
                pair("Force", None),
                pair("Count", Some("3")),
                pair("Labels", Some("a=b")),
            ]
        );
    }

    #[test]
    fn test_flag_accepts_explicit_boolean() {
        let values = mapped(&["remote", "add", "origin", "--force", "false"]);
        assert!(values.contains(&pair("Force", Some("false"))));
    }

    #[test]
    fn test_value_in_group_is_rejected() {
        let err = parse(&["remote", "add", "origin", "-fcv"]).unwrap_err();
        assert_eq!(err, ParseError::OptionValueInGroup("-c".into()));
    }

    #[test]
    fn test_missing_required_argument() {
        let err = parse(&["remote", "add"]).unwrap_err();
        assert_eq!(
            err,
            ParseError::MissingRequiredArgument {
                command: Some("add".into()),
                argument: "NAME".into(),
            }
        );
    }

    #[test]
    fn test_branch_without_child() {
        assert_eq!(
            parse(&["remote"]).unwrap_err(),
            ParseError::MissingSubcommand("remote".into())
        );
        assert_eq!(
            parse(&["remote", "nope"]).unwrap_err(),
            ParseError::UnknownCommand("nope".into())
        );
        assert_eq!(parse(&[]).unwrap_err(), ParseError::NoCommandSpecified);
    }

    #[test]
    fn test_scalar_option_requires_value() {
        let err = parse(&["remote", "add", "origin", "--count"]).unwrap_err();
        assert_eq!(err, ParseError::OptionHasNoValue("--count".into()));
    }

    #[test]
    fn test_unknown_options_strict_and_relaxed() {
        let err = parse(&["remote", "add", "origin", "--nope"]).unwrap_err();
        assert_eq!(err, ParseError::UnknownOption("--nope".into()));

        let relaxed = AppSettings {
            strict_parsing: false,
            ..AppSettings::default()
        };
        let result = parse_with(relaxed, &["remote", "add", "origin", "--nope", "x", "--", "raw"]).unwrap();
        assert_eq!(result.remaining.parsed.get(&"--nope".to_string()), Some(&Some("x".to_string())));
        assert_eq!(result.remaining.raw, vec!["raw".to_string()]);
    }

    #[test]
    fn test_help_and_version_short_circuit() {
        let result = parse(&["remote", "add", "-h"]).unwrap();
        assert!(matches!(result.outcome, ParseOutcome::Help(Some(_))));

        assert!(matches!(parse(&["--version"]).unwrap_err(), ParseError::UnknownOption(_)));
        let versioned = AppSettings {
            application_version: Some("1.0".into()),
            ..AppSettings::default()
        };
        assert_eq!(parse_with(versioned, &["--version"]).unwrap().outcome, ParseOutcome::Version);
    }

    #[test]
    fn test_case_insensitive_commands() {
        let settings = AppSettings {
            case_sensitivity: crate::config::CaseSensitivity {
                commands: false,
                long_options: false,
            },
            ..AppSettings::default()
        };
        let result = parse_with(settings, &["REMOTE", "A", "origin", "--FORCE"]).unwrap();
        assert!(matches!(result.outcome, ParseOutcome::Tree(_)));
    }
}
