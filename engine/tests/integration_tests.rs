use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use command_bind::{
    AppSettings, BoundCommand, CaseSensitivity, Command, CommandApp, CommandAppError, CommandContext,
    ConfigureCommands, Configurator, Invocation,
};
use command_bind_core::{
    BindError, CommandSettings, ConstructorMetadata, DescribeSettings, EmptySettings, FlagValue,
    GeneratedMetadata, Instance, ParameterContext, ParseError, PropertyAccessor, ServiceRegistry,
    SettingsAccessError, SettingsDescriptor, SettingsProvider, TypeKey, TypeRegistrar, TypeResolver,
    ValidationResult, Value, bind_enum,
};
use chrono::{NaiveDate, TimeDelta};
use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn bind(app: &mut CommandApp, values: &[&str]) -> Result<BoundCommand, CommandAppError> {
    match app.bind(&args(values))? {
        Invocation::Command(bound) => Ok(bound),
        other => panic!("expected a bound command, got {other:?}"),
    }
}

fn settings<S: CommandSettings>(bound: &BoundCommand) -> &S {
    bound
        .settings
        .downcast_ref::<S>()
        .expect("bound settings have the expected type")
}

// Positional arguments with an optional trailing argument.

#[derive(Debug, Default, PartialEq)]
struct GreetSettings {
    name: String,
    count: Option<i32>,
}
impl CommandSettings for GreetSettings {}
impl DescribeSettings for GreetSettings {
    fn describe() -> SettingsDescriptor {
        SettingsDescriptor::with_default::<Self>()
            .property(PropertyAccessor::field("Name", |s: &Self| &s.name, |s| &mut s.name).argument(0, "<NAME>"))
            .property(PropertyAccessor::field("Count", |s: &Self| &s.count, |s| &mut s.count).argument(1, "[COUNT]"))
    }
}

#[derive(Default)]
struct Greet;
impl Command for Greet {
    type Settings = GreetSettings;

    fn execute(&self, _: &CommandContext, settings: &GreetSettings, _: &CancellationToken) -> i32 {
        settings.count.unwrap_or(0)
    }
}

fn greet_app() -> CommandApp {
    let mut app = CommandApp::new();
    app.configure(|config| {
        config.set_default_command::<Greet>();
    });
    app
}

#[test]
fn test_positional_arguments_bind_in_order() {
    let mut app = greet_app();

    let bound = bind(&mut app, &["Alice", "5"]).unwrap();
    assert_eq!(
        settings::<GreetSettings>(&bound),
        &GreetSettings {
            name: "Alice".into(),
            count: Some(5)
        }
    );

    let bound = bind(&mut app, &["Alice"]).unwrap();
    assert_eq!(settings::<GreetSettings>(&bound).count, None);
}

#[test]
fn test_missing_required_argument() {
    let mut app = greet_app();
    let err = bind(&mut app, &[]).unwrap_err();
    assert!(matches!(
        err,
        CommandAppError::Parse(ParseError::MissingRequiredArgument { ref argument, .. }) if argument == "NAME"
    ));
    assert_eq!(app.run(&[]), -1);
}

#[test]
fn test_default_command_executes() {
    let mut app = greet_app();
    assert_eq!(app.run(&args(&["Alice", "7"])), 7);
    assert_eq!(app.try_run(&args(&["Alice"])).unwrap(), 0);
}

#[test]
fn test_too_many_arguments_is_an_error() {
    let mut app = greet_app();
    let err = bind(&mut app, &["Alice", "5", "extra"]).unwrap_err();
    assert_eq!(err.to_string(), "Could not match 'extra' with an argument.");
}

// Three levels of settings inheritance.

#[derive(Debug, Default, PartialEq)]
struct Level1 {
    level1_flag: bool,
}
impl CommandSettings for Level1 {}
impl DescribeSettings for Level1 {
    fn describe() -> SettingsDescriptor {
        SettingsDescriptor::with_default::<Self>().property(
            PropertyAccessor::field("Level1Flag", |s: &Self| &s.level1_flag, |s| &mut s.level1_flag)
                .option("--level1"),
        )
    }
}

#[derive(Debug, Default, PartialEq)]
struct Level2 {
    base: Level1,
    level2_flag: bool,
    count: i32,
}
impl CommandSettings for Level2 {
    fn base(&self) -> Option<&dyn CommandSettings> {
        Some(&self.base)
    }
    fn base_mut(&mut self) -> Option<&mut dyn CommandSettings> {
        Some(&mut self.base)
    }
}
impl DescribeSettings for Level2 {
    fn describe() -> SettingsDescriptor {
        SettingsDescriptor::with_default::<Self>()
            .extends::<Level1>()
            .property(
                PropertyAccessor::field("Level2Flag", |s: &Self| &s.level2_flag, |s| &mut s.level2_flag)
                    .option("--level2"),
            )
            .property(
                PropertyAccessor::field("Count", |s: &Self| &s.count, |s| &mut s.count)
                    .option("-c|--count <N>")
                    .default_to(1_i32),
            )
    }
}

#[derive(Debug, Default, PartialEq)]
struct Level3 {
    base: Level2,
    level3_flag: bool,
    name: String,
}
impl CommandSettings for Level3 {
    fn base(&self) -> Option<&dyn CommandSettings> {
        Some(&self.base)
    }
    fn base_mut(&mut self) -> Option<&mut dyn CommandSettings> {
        Some(&mut self.base)
    }
}
impl DescribeSettings for Level3 {
    fn describe() -> SettingsDescriptor {
        SettingsDescriptor::with_default::<Self>()
            .extends::<Level2>()
            .property(
                PropertyAccessor::field("Level3Flag", |s: &Self| &s.level3_flag, |s| &mut s.level3_flag)
                    .option("--level3"),
            )
            .property(PropertyAccessor::field("Name", |s: &Self| &s.name, |s| &mut s.name).argument(0, "<NAME>"))
    }
}

#[derive(Default)]
struct Leaf;
impl Command for Leaf {
    type Settings = Level3;

    fn execute(&self, _: &CommandContext, _: &Level3, _: &CancellationToken) -> i32 {
        0
    }
}

fn leaf_app() -> CommandApp {
    let mut app = CommandApp::new();
    app.configure(|config| {
        config.set_default_command::<Leaf>();
    });
    app
}

#[test]
fn test_three_level_inheritance() {
    let mut app = leaf_app();
    let bound = bind(&mut app, &["X", "--level1"]).unwrap();
    let level3 = settings::<Level3>(&bound);
    assert!(level3.base.base.level1_flag);
    assert!(!level3.base.level2_flag);
    assert_eq!(level3.base.count, 1);
    assert!(!level3.level3_flag);
    assert_eq!(level3.name, "X");

    // Base levels are reachable through the bound instance.
    assert_eq!(settings::<Level1>(&bound), &Level1 { level1_flag: true });
}

#[test]
fn test_flag_accepts_explicit_boolean() {
    let mut app = leaf_app();
    let bound = bind(&mut app, &["X", "--level2", "false", "--level3", "true", "-c", "4"]).unwrap();
    let level3 = settings::<Level3>(&bound);
    assert!(!level3.base.level2_flag);
    assert!(level3.level3_flag);
    assert_eq!(level3.base.count, 4);
}

#[test]
fn test_binding_is_idempotent() {
    let mut app = leaf_app();
    let tokens = ["Y", "--level2", "--count", "9"];
    let first = bind(&mut app, &tokens).unwrap();
    let second = bind(&mut app, &tokens).unwrap();
    assert_eq!(settings::<Level3>(&first), settings::<Level3>(&second));
}

#[test]
fn test_generated_metadata_matches_reflection() {
    let generated = GeneratedMetadata::builder()
        .settings::<Level3>()
        .command(TypeKey::of::<Leaf>(), TypeKey::of::<Level3>(), None)
        .build();
    let mut generated_app = CommandApp::new().with_metadata(Arc::new(generated));
    generated_app.configure(|config| {
        config.set_default_command::<Leaf>();
    });
    let mut reflection_app = leaf_app();

    let tokens = ["Z", "--level1", "--level3", "-c", "2"];
    let from_generated = bind(&mut generated_app, &tokens).unwrap();
    let from_reflection = bind(&mut reflection_app, &tokens).unwrap();
    assert_eq!(
        settings::<Level3>(&from_generated),
        settings::<Level3>(&from_reflection)
    );
}

// Collections, pairs, optional-value flags and enums.

#[derive(Debug, Clone, Copy, PartialEq)]
enum Day {
    Monday,
    Tuesday,
    Wednesday,
}
bind_enum!(Day { Monday, Tuesday, Wednesday });

#[derive(Debug, Default)]
struct BuildSettings {
    tags: Vec<String>,
    labels: HashMap<String, String>,
    limits: HashMap<String, i32>,
    port: FlagValue<u16>,
    day: Option<Day>,
    files: Vec<String>,
}
impl CommandSettings for BuildSettings {}
impl DescribeSettings for BuildSettings {
    fn describe() -> SettingsDescriptor {
        SettingsDescriptor::with_default::<Self>()
            .property(PropertyAccessor::field("Tags", |s: &Self| &s.tags, |s| &mut s.tags).option("-t|--tags <TAG>"))
            .property(
                PropertyAccessor::field("Labels", |s: &Self| &s.labels, |s| &mut s.labels)
                    .option("-l|--label <LABEL>"),
            )
            .property(
                PropertyAccessor::field("Limits", |s: &Self| &s.limits, |s| &mut s.limits)
                    .option("--limit <LIMIT>"),
            )
            .property(
                PropertyAccessor::field("Port", |s: &Self| &s.port, |s| &mut s.port).option("-p|--port [PORT]"),
            )
            .property(PropertyAccessor::field("Day", |s: &Self| &s.day, |s| &mut s.day).option("-d|--day <DAY>"))
            .property(
                PropertyAccessor::field("Files", |s: &Self| &s.files, |s| &mut s.files).argument(0, "[FILES]"),
            )
    }
}

fn build_app() -> CommandApp {
    let mut app = CommandApp::new();
    app.configure(|config| {
        config.add_delegate::<BuildSettings, _>("build", |_, _| 0);
    });
    app
}

#[test]
fn test_vector_values_keep_input_order() {
    let mut app = build_app();
    let grouped = bind(&mut app, &["build", "--tags", "a", "b", "c"]).unwrap();
    assert_eq!(settings::<BuildSettings>(&grouped).tags, ["a", "b", "c"]);

    let repeated = bind(&mut app, &["build", "--tags", "a", "-t", "b", "--tags=c"]).unwrap();
    assert_eq!(settings::<BuildSettings>(&repeated).tags, ["a", "b", "c"]);
}

#[test]
fn test_vector_argument_takes_remaining_values() {
    let mut app = build_app();
    let bound = bind(&mut app, &["build", "one.rs", "two.rs", "-d", "monday", "three.rs"]).unwrap();
    let build = settings::<BuildSettings>(&bound);
    assert_eq!(build.files, ["one.rs", "two.rs", "three.rs"]);
    assert_eq!(build.day, Some(Day::Monday));
}

#[test]
fn test_pairs_use_default_deconstructor() {
    let mut app = build_app();
    let bound = bind(
        &mut app,
        &["build", "--label", "env=prod", "--label", "bare", "--limit", "cpu=4", "--limit", "mem"],
    )
    .unwrap();
    let build = settings::<BuildSettings>(&bound);
    assert_eq!(build.labels.get("env").map(String::as_str), Some("prod"));
    assert_eq!(build.labels.get("bare").map(String::as_str), Some(""));
    assert_eq!(build.limits.get("cpu"), Some(&4));
    assert_eq!(build.limits.get("mem"), Some(&0));
}

#[test]
fn test_malformed_pair_is_rejected() {
    let mut app = build_app();
    let err = bind(&mut app, &["build", "--label", "a=b=c"]).unwrap_err();
    assert_eq!(err.to_string(), "The value 'a=b=c' is not in a correct format.");
}

#[test]
fn test_flag_with_optional_value() {
    let mut app = build_app();

    let absent = bind(&mut app, &["build"]).unwrap();
    assert!(!settings::<BuildSettings>(&absent).port.is_set);

    let bare = bind(&mut app, &["build", "--port"]).unwrap();
    let port = &settings::<BuildSettings>(&bare).port;
    assert!(port.is_set);
    assert_eq!(port.value, None);

    let valued = bind(&mut app, &["build", "-p", "8080"]).unwrap();
    let port = &settings::<BuildSettings>(&valued).port;
    assert!(port.is_set);
    assert_eq!(port.value, Some(8080));

    let attached = bind(&mut app, &["build", "--port=9090"]).unwrap();
    assert_eq!(settings::<BuildSettings>(&attached).port.value, Some(9090));
}

#[test]
fn test_enum_conversion_ignores_case() {
    let mut app = build_app();
    for spelling in ["tuesday", "TUESDAY", "Tuesday"] {
        let bound = bind(&mut app, &["build", "--day", spelling]).unwrap();
        assert_eq!(settings::<BuildSettings>(&bound).day, Some(Day::Tuesday));
    }

    let err = bind(&mut app, &["build", "--day", "someday"]).unwrap_err();
    match err {
        CommandAppError::Bind(BindError::ConversionFailed { valid_values, .. }) => {
            assert_eq!(valid_values, ["Monday", "Tuesday", "Wednesday"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

// Branches, shadowing and dependency injection.

#[derive(Debug, Default)]
struct Store {
    name: String,
}

#[derive(Debug, Default)]
struct RemoteSettings {
    verbose: bool,
}
impl CommandSettings for RemoteSettings {}
impl DescribeSettings for RemoteSettings {
    fn describe() -> SettingsDescriptor {
        SettingsDescriptor::new::<Self>()
            .abstract_type()
            .property(
                PropertyAccessor::field("Verbose", |s: &Self| &s.verbose, |s| &mut s.verbose)
                    .option("-v|--verbose")
                    .shadowable(),
            )
    }
}

#[derive(Debug)]
struct AddRemote {
    base: RemoteSettings,
    url: String,
    store: Arc<Store>,
    force: bool,
}
impl CommandSettings for AddRemote {
    fn base(&self) -> Option<&dyn CommandSettings> {
        Some(&self.base)
    }
    fn base_mut(&mut self) -> Option<&mut dyn CommandSettings> {
        Some(&mut self.base)
    }
}
impl DescribeSettings for AddRemote {
    fn describe() -> SettingsDescriptor {
        SettingsDescriptor::new::<Self>()
            .extends::<RemoteSettings>()
            .constructor(
                ConstructorMetadata::new(|args| {
                    Ok(AddRemote {
                        base: RemoteSettings::default(),
                        url: args.take("url")?,
                        store: args.service::<Store>("store")?,
                        force: false,
                    })
                })
                .param::<String>("url")
                .service::<Store>("store"),
            )
            .property(PropertyAccessor::read_only("Url", |s: &Self| &s.url).argument(0, "<URL>"))
            .property(PropertyAccessor::field("Force", |s: &Self| &s.force, |s| &mut s.force).option("-f|--force"))
    }
}

#[derive(Debug, Default)]
struct ListRemotes {
    base: RemoteSettings,
}
impl CommandSettings for ListRemotes {
    fn base(&self) -> Option<&dyn CommandSettings> {
        Some(&self.base)
    }
    fn base_mut(&mut self) -> Option<&mut dyn CommandSettings> {
        Some(&mut self.base)
    }
}
impl DescribeSettings for ListRemotes {
    fn describe() -> SettingsDescriptor {
        SettingsDescriptor::with_default::<Self>().extends::<RemoteSettings>()
    }
}

#[derive(Default)]
struct List;
impl Command for List {
    type Settings = ListRemotes;

    fn execute(&self, _: &CommandContext, settings: &ListRemotes, _: &CancellationToken) -> i32 {
        if settings.base.verbose { 2 } else { 1 }
    }
}

fn remote_app(configure: impl FnOnce(&mut Configurator)) -> CommandApp {
    let mut registry = ServiceRegistry::new();
    registry.register_instance(
        TypeKey::of::<Store>(),
        Arc::new(Store {
            name: "local".into(),
        }),
    );
    let mut app = CommandApp::new().with_registrar(registry);
    app.configure(|config| {
        config.add_branch::<RemoteSettings>("remote", |remote| {
            remote.add_delegate::<AddRemote, _>("add", |_, _| 0).with_alias("a");
            remote.add_command::<List>("list");
        });
        configure(config);
    });
    app
}

#[test]
fn test_constructor_receives_bound_value_and_service() {
    let mut app = remote_app(|_| {});
    let bound = bind(&mut app, &["remote", "add", "https://example.com", "-f"]).unwrap();
    assert_eq!(bound.path, ["remote", "add"]);

    let add = settings::<AddRemote>(&bound);
    assert_eq!(add.url, "https://example.com");
    assert_eq!(add.store.name, "local");
    assert!(add.force);
    assert!(!add.base.verbose);
}

#[test]
fn test_parent_option_before_and_after_subcommand() {
    let mut app = remote_app(|_| {});
    let before = bind(&mut app, &["remote", "-v", "a", "https://example.com"]).unwrap();
    assert!(settings::<AddRemote>(&before).base.verbose);

    let after = bind(&mut app, &["remote", "a", "https://example.com", "--verbose"]).unwrap();
    assert!(settings::<AddRemote>(&after).base.verbose);
}

#[test]
fn test_branch_requires_a_subcommand() {
    let mut app = remote_app(|_| {});
    let err = bind(&mut app, &["remote"]).unwrap_err();
    assert_eq!(err.to_string(), "Command 'remote' requires a subcommand.");

    let err = bind(&mut app, &["remote", "rename"]).unwrap_err();
    assert_eq!(err.to_string(), "Unknown command 'rename'.");
}

#[test]
fn test_branch_default_child_runs() {
    let mut app = CommandApp::new();
    app.configure(|config| {
        config.add_branch::<RemoteSettings>("remote", |remote| {
            remote.add_command::<List>("list");
            remote.set_default_command::<List>();
        });
    });
    assert_eq!(app.run(&args(&["remote"])), 1);
    assert_eq!(app.run(&args(&["remote", "-v"])), 2);
    assert_eq!(app.run(&args(&["remote", "list"])), 1);
}

#[test]
fn test_unresolved_service_fails_binding() {
    let mut app = CommandApp::new();
    app.configure(|config| {
        config.add_branch::<RemoteSettings>("remote", |remote| {
            remote.add_delegate::<AddRemote, _>("add", |_, _| 0);
        });
    });
    let err = bind(&mut app, &["remote", "add", "https://example.com"]).unwrap_err();
    assert!(matches!(err, CommandAppError::Bind(_)));
}

#[derive(Debug, Default)]
struct ShadowSettings {
    base: RemoteSettings,
}
impl CommandSettings for ShadowSettings {
    fn base(&self) -> Option<&dyn CommandSettings> {
        Some(&self.base)
    }
    fn base_mut(&mut self) -> Option<&mut dyn CommandSettings> {
        Some(&mut self.base)
    }
}
impl DescribeSettings for ShadowSettings {
    fn describe() -> SettingsDescriptor {
        SettingsDescriptor::with_default::<Self>().extends::<RemoteSettings>()
    }
}

#[test]
fn test_shadowed_option_binds_once() {
    let mut app = CommandApp::new();
    app.configure(|config| {
        config.add_branch::<RemoteSettings>("remote", |remote| {
            remote.add_delegate::<ShadowSettings, _>("prune", |_, settings| i32::from(settings.base.verbose));
        });
    });
    assert_eq!(app.run(&args(&["remote", "prune", "--verbose"])), 1);
    assert_eq!(app.run(&args(&["remote", "-v", "prune"])), 1);
    assert_eq!(app.run(&args(&["remote", "prune"])), 0);
}

#[derive(Debug, Default)]
struct TokenSettings {
    token: String,
}
impl CommandSettings for TokenSettings {}
impl DescribeSettings for TokenSettings {
    fn describe() -> SettingsDescriptor {
        SettingsDescriptor::with_default::<Self>().property(
            PropertyAccessor::field("Token", |s: &Self| &s.token, |s| &mut s.token)
                .option("--token <TOKEN>")
                .required()
                .shadowable(),
        )
    }
}

#[derive(Debug, Default)]
struct PushSettings {
    base: TokenSettings,
    force: bool,
}
impl CommandSettings for PushSettings {
    fn base(&self) -> Option<&dyn CommandSettings> {
        Some(&self.base)
    }
    fn base_mut(&mut self) -> Option<&mut dyn CommandSettings> {
        Some(&mut self.base)
    }
}
impl DescribeSettings for PushSettings {
    fn describe() -> SettingsDescriptor {
        SettingsDescriptor::with_default::<Self>()
            .extends::<TokenSettings>()
            .property(PropertyAccessor::field("Force", |s: &Self| &s.force, |s| &mut s.force).option("-f|--force"))
    }
}

fn auth_app() -> CommandApp {
    let mut app = CommandApp::new();
    app.configure(|config| {
        config.add_branch::<TokenSettings>("auth", |auth| {
            auth.add_delegate::<PushSettings, _>("push", |_, _| 0);
        });
    });
    app
}

#[test]
fn test_required_shadowed_option_on_either_side() {
    let mut app = auth_app();

    let after = bind(&mut app, &["auth", "push", "--token", "abc"]).unwrap();
    assert_eq!(settings::<PushSettings>(&after).base.token, "abc");

    let before = bind(&mut app, &["auth", "--token", "xyz", "push", "-f"]).unwrap();
    let push = settings::<PushSettings>(&before);
    assert_eq!(push.base.token, "xyz");
    assert!(push.force);

    let err = bind(&mut app, &["auth", "push"]).unwrap_err();
    assert!(matches!(
        err,
        CommandAppError::Parse(ParseError::MissingRequiredOption { ref option, .. }) if option == "--token"
    ));
}

#[test]
fn test_configuration_errors_stop_every_run() {
    let mut app = CommandApp::new();
    app.configure(|config| {
        config.add_branch::<RemoteSettings>("remote", |_| {});
    });
    let err = app.try_run(&args(&["remote"])).unwrap_err();
    assert!(matches!(err, CommandAppError::Configuration(_)));
}

// Validators, value providers and application settings.

#[derive(Debug, Default)]
struct ServeSettings {
    port: u16,
    host: String,
}
impl CommandSettings for ServeSettings {
    fn validate(&self) -> ValidationResult {
        if self.host == "0.0.0.0" && self.port < 1024 {
            return ValidationResult::error("privileged ports cannot be exposed");
        }
        ValidationResult::Success
    }
}
impl DescribeSettings for ServeSettings {
    fn describe() -> SettingsDescriptor {
        SettingsDescriptor::with_default::<Self>()
            .property(
                PropertyAccessor::field("Port", |s: &Self| &s.port, |s| &mut s.port)
                    .option("-p|--port <PORT>")
                    .default_value(Value::String("8080".into()))
                    .validator(|context: &ParameterContext<'_>| match context.value {
                        Value::UInt(0) => ValidationResult::error("port must not be zero"),
                        _ => ValidationResult::Success,
                    }),
            )
            .property(
                PropertyAccessor::field("Host", |s: &Self| &s.host, |s| &mut s.host)
                    .option("--host <HOST>")
                    .value_provider(|_: &ParameterContext<'_>| Some(Value::String("localhost".into()))),
            )
    }
}

fn serve_app(settings: AppSettings) -> CommandApp {
    let mut app = CommandApp::new();
    app.configure(|config| {
        config.with_settings(settings);
        config.add_delegate::<ServeSettings, _>("serve", |_, settings| i32::from(settings.port));
    });
    app
}

#[test]
fn test_defaults_and_value_providers() {
    let mut app = serve_app(AppSettings::default());
    let bound = bind(&mut app, &["serve"]).unwrap();
    let serve = settings::<ServeSettings>(&bound);
    assert_eq!(serve.port, 8080);
    assert_eq!(serve.host, "localhost");
}

/// A service that reads the bound settings instead of being bound itself.
struct PortReporter {
    settings: Arc<SettingsProvider>,
}

impl PortReporter {
    fn port(&self) -> Result<u16, SettingsAccessError> {
        self.settings.with_settings(|serve: &ServeSettings| serve.port)
    }
}

struct Report {
    reporter: Arc<PortReporter>,
}
impl Command for Report {
    type Settings = ServeSettings;

    fn execute(&self, _: &CommandContext, _: &ServeSettings, _: &CancellationToken) -> i32 {
        match self.reporter.port() {
            Ok(port) => i32::from(port),
            Err(_) => -2,
        }
    }
}

#[test]
fn test_services_read_bound_settings_through_provider() {
    let mut registry = ServiceRegistry::new();
    registry.register_factory(
        TypeKey::of::<PortReporter>(),
        Arc::new(|resolver: &dyn TypeResolver| {
            let settings = resolver.resolve_as::<SettingsProvider>()?;
            Some(Arc::new(PortReporter { settings }) as Instance)
        }),
    );
    let mut app = CommandApp::new().with_registrar(registry);
    app.configure(|config| {
        config.add_command_with("report", |resolver: &dyn TypeResolver| {
            Some(Report {
                reporter: resolver.resolve_as::<PortReporter>()?,
            })
        });
    });

    assert_eq!(app.run(&args(&["report", "--port", "9090"])), 9090);
    assert_eq!(app.run(&args(&["report"])), 8080);
}

#[test]
fn test_validators_reject_values() {
    let mut app = serve_app(AppSettings::default());
    let err = bind(&mut app, &["serve", "--port", "0"]).unwrap_err();
    assert_eq!(err.to_string(), "port must not be zero");

    let err = bind(&mut app, &["serve", "--port", "80", "--host", "0.0.0.0"]).unwrap_err();
    assert_eq!(err.to_string(), "privileged ports cannot be exposed");
}

#[test]
fn test_lenient_parsing_collects_unknown_options() {
    let mut app = serve_app(AppSettings {
        strict_parsing: false,
        ..AppSettings::default()
    });
    let bound = bind(&mut app, &["serve", "--trace", "full", "-p", "81", "--", "--raw", "x"]).unwrap();
    assert_eq!(settings::<ServeSettings>(&bound).port, 81);
    assert_eq!(
        bound.remaining.parsed.get(&"--trace".to_string()),
        Some(&Some("full".to_string()))
    );
    assert_eq!(bound.remaining.raw, ["--raw", "x"]);

    let mut strict = serve_app(AppSettings::default());
    let err = bind(&mut strict, &["serve", "--trace"]).unwrap_err();
    assert_eq!(err.to_string(), "Unknown option '--trace'.");
}

#[test]
fn test_version_requires_application_version() {
    let mut app = serve_app(AppSettings {
        application_version: Some("2.0.1".into()),
        ..AppSettings::default()
    });
    match app.bind(&args(&["--version"])).unwrap() {
        Invocation::Version(version) => assert_eq!(version, "2.0.1"),
        other => panic!("unexpected invocation: {other:?}"),
    }
    // Running reports the request without executing a command.
    assert_eq!(app.try_run(&args(&["--version"])).unwrap(), 0);

    let mut unversioned = serve_app(AppSettings::default());
    let err = unversioned.bind(&args(&["--version"])).unwrap_err();
    assert_eq!(err.to_string(), "Unknown option '--version'.");
}

#[test]
fn test_case_insensitive_names() {
    let mut sensitive = serve_app(AppSettings::default());
    let err = bind(&mut sensitive, &["SERVE"]).unwrap_err();
    assert_eq!(err.to_string(), "Unknown command 'SERVE'.");

    let mut app = serve_app(AppSettings {
        case_sensitivity: CaseSensitivity {
            commands: false,
            long_options: false,
        },
        ..AppSettings::default()
    });
    let bound = bind(&mut app, &["SERVE", "--PORT", "90"]).unwrap();
    assert_eq!(settings::<ServeSettings>(&bound).port, 90);
}

// Constructor selection through the application.

#[derive(Debug)]
struct Endpoint {
    host: String,
    port: u16,
}
impl CommandSettings for Endpoint {}
impl DescribeSettings for Endpoint {
    fn describe() -> SettingsDescriptor {
        SettingsDescriptor::new::<Self>()
            .constructor(
                ConstructorMetadata::new(|args| {
                    Ok(Endpoint {
                        host: args.take("host")?,
                        port: 0,
                    })
                })
                .param::<String>("host"),
            )
            .constructor(
                ConstructorMetadata::new(|args| {
                    Ok(Endpoint {
                        host: String::new(),
                        port: args.take("port")?,
                    })
                })
                .param::<u16>("port"),
            )
            .property(PropertyAccessor::read_only("Host", |s: &Self| &s.host).option("--host <HOST>"))
            .property(PropertyAccessor::read_only("Port", |s: &Self| &s.port).option("--port <PORT>"))
    }
}

#[test]
fn test_tied_constructors_report_every_candidate() {
    let mut app = CommandApp::new();
    app.configure(|config| {
        config.add_delegate::<Endpoint, _>("connect", |_, _| 0);
    });

    let err = bind(&mut app, &["connect", "--host", "a", "--port", "1"]).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("Ambiguous constructor selection for settings type 'Endpoint'"));
    assert!(message.contains("Endpoint(String host)"));
    assert!(message.contains("Endpoint(u16 port)"));

    let bound = bind(&mut app, &["connect", "--port", "443"]).unwrap();
    let endpoint = settings::<Endpoint>(&bound);
    assert_eq!((endpoint.host.as_str(), endpoint.port), ("", 443));
}

// Typed scalars.

#[derive(Debug, Default)]
struct ScheduleSettings {
    id: Option<Uuid>,
    endpoint: Option<Url>,
    on: Option<NaiveDate>,
    every: Option<TimeDelta>,
    retries: u32,
    root: Option<PathBuf>,
}
impl CommandSettings for ScheduleSettings {}
impl DescribeSettings for ScheduleSettings {
    fn describe() -> SettingsDescriptor {
        SettingsDescriptor::with_default::<Self>()
            .property(PropertyAccessor::field("Id", |s: &Self| &s.id, |s| &mut s.id).option("--id <ID>"))
            .property(
                PropertyAccessor::field("Endpoint", |s: &Self| &s.endpoint, |s| &mut s.endpoint)
                    .option("--endpoint <URL>"),
            )
            .property(PropertyAccessor::field("On", |s: &Self| &s.on, |s| &mut s.on).option("--on <DATE>"))
            .property(
                PropertyAccessor::field("Every", |s: &Self| &s.every, |s| &mut s.every).option("--every <SPAN>"),
            )
            .property(
                PropertyAccessor::field("Retries", |s: &Self| &s.retries, |s| &mut s.retries)
                    .option("--retries <N>"),
            )
            .property(PropertyAccessor::field("Root", |s: &Self| &s.root, |s| &mut s.root).argument(0, "[ROOT]"))
    }
}

#[test]
fn test_typed_scalars_convert_from_text() {
    let mut app = CommandApp::new();
    app.configure(|config| {
        config.add_delegate::<ScheduleSettings, _>("schedule", |_, _| 0);
    });

    let bound = bind(
        &mut app,
        &[
            "schedule",
            "--id",
            "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "--endpoint",
            "https://example.com/hooks",
            "--on",
            "2024-02-29",
            "--every",
            "1.06:30",
            "--retries",
            "0x10",
            "/srv/jobs",
        ],
    )
    .unwrap();
    let schedule = settings::<ScheduleSettings>(&bound);
    assert_eq!(
        schedule.id,
        Some(Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap())
    );
    assert_eq!(schedule.endpoint.as_ref().map(Url::as_str), Some("https://example.com/hooks"));
    assert_eq!(schedule.on, NaiveDate::from_ymd_opt(2024, 2, 29));
    assert_eq!(
        schedule.every,
        Some(TimeDelta::days(1) + TimeDelta::hours(6) + TimeDelta::minutes(30))
    );
    assert_eq!(schedule.retries, 16);
    assert_eq!(schedule.root, Some(PathBuf::from("/srv/jobs")));

    let err = bind(&mut app, &["schedule", "--on", "2023-02-29"]).unwrap_err();
    assert!(matches!(err, CommandAppError::Bind(_)), "unexpected error: {err:?}");
}

// Execution.

#[test]
fn test_delegate_sees_context_and_cancellation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let mut app = CommandApp::new();
    app.configure(move |config| {
        config
            .add_delegate::<EmptySettings, _>("ping", move |context, _| {
                seen.fetch_add(1, Ordering::SeqCst);
                assert_eq!(context.name, "ping");
                assert_eq!(context.data_as::<&str>(), Some(&"payload"));
                0
            })
            .with_data(Arc::new("payload"));
    });

    let token = CancellationToken::new();
    assert_eq!(app.run_with_cancellation(&args(&["ping"]), &token), 0);
    assert_eq!(app.run(&args(&["ping"])), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
