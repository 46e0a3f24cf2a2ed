use std::fs;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use command_bind::{CommandModel, DEFAULT_COMMAND_NAME, Invocation};
use command_bind_core::DynamicSettings;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod schema;

use schema::AppSchema;

/// Output format for bind reports.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Parser)]
#[command(name = "bind-inspect")]
#[command(about = "Inspect how command lines bind against a YAML-declared command tree")]
struct Cli {
    /// Log parsing and binding decisions to stderr (repeat for more detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Bind a command line and print the matched command and its settings.
    Bind(BindArgs),
    /// Build and validate the command tree declared by a schema.
    Check(CheckArgs),
    /// Write a starter schema file.
    Init(InitArgs),
}

#[derive(Debug, Args)]
struct BindArgs {
    /// Schema YAML file declaring the command tree.
    #[arg(long)]
    schema: PathBuf,
    /// Output format.
    #[arg(long, default_value = "json")]
    format: CliOutputFormat,
    /// The command line to bind (put it after `--`).
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[derive(Debug, Args)]
struct CheckArgs {
    /// Schema YAML file declaring the command tree.
    #[arg(long)]
    schema: PathBuf,
    /// Print every command with its parameters.
    #[arg(long)]
    list: bool,
}

#[derive(Debug, Args)]
struct InitArgs {
    /// Output schema path.
    #[arg(long)]
    output: PathBuf,
    /// Overwrite an existing file.
    #[arg(long)]
    force: bool,
}

/// What a command line bound to.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum BindReport<'a> {
    Help {
        command: Option<String>,
    },
    Version {
        version: String,
    },
    Command {
        path: Vec<String>,
        settings: &'a DynamicSettings,
        remaining: Vec<RemainingOption>,
        raw: Vec<String>,
    },
}

#[derive(Debug, Serialize)]
struct RemainingOption {
    name: String,
    value: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Bind(args) => run_bind(args),
        Command::Check(args) => run_check(args),
        Command::Init(args) => run_init(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_bind(args: BindArgs) -> Result<(), String> {
    let schema = AppSchema::load(&args.schema)
        .map_err(|err| format!("Failed to load '{}': {err}", args.schema.display()))?;
    let mut app = schema.build_app().map_err(|err| err.to_string())?;
    let invocation = app.bind(&args.args).map_err(|err| err.to_string())?;

    let report = match &invocation {
        Invocation::Help(command) => BindReport::Help {
            command: command.clone(),
        },
        Invocation::Version(version) => BindReport::Version {
            version: version.clone(),
        },
        Invocation::Command(bound) => BindReport::Command {
            path: bound
                .path
                .iter()
                .filter(|name| name.as_str() != DEFAULT_COMMAND_NAME)
                .cloned()
                .collect(),
            settings: bound
                .settings
                .downcast_ref::<DynamicSettings>()
                .ok_or("Bound settings were not declared by the schema")?,
            remaining: bound
                .remaining
                .parsed
                .iter()
                .map(|(name, value)| RemainingOption {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect(),
            raw: bound.remaining.raw.clone(),
        },
    };

    let rendered = match args.format {
        CliOutputFormat::Json => serde_json::to_string_pretty(&report)
            .map_err(|err| format!("Failed to serialize report: {err}"))?,
        CliOutputFormat::Yaml => serde_yaml::to_string(&report)
            .map_err(|err| format!("Failed to serialize report: {err}"))?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

fn run_check(args: CheckArgs) -> Result<(), String> {
    let schema = AppSchema::load(&args.schema)
        .map_err(|err| format!("Failed to load '{}': {err}", args.schema.display()))?;
    let mut app = schema.build_app().map_err(|err| err.to_string())?;
    let model = app.model().map_err(|err| err.to_string())?;

    println!(
        "Schema '{}' is valid: {} command(s).",
        args.schema.display(),
        model.commands().count()
    );
    if args.list {
        for line in describe_commands(&model) {
            println!("  {line}");
        }
    }
    Ok(())
}

fn run_init(args: InitArgs) -> Result<(), String> {
    if args.output.exists() && !args.force {
        return Err(format!(
            "'{}' already exists (use --force to overwrite)",
            args.output.display()
        ));
    }
    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| {
                format!(
                    "Failed to create output directory '{}': {err}",
                    parent.display()
                )
            })?;
        }
    }
    AppSchema::starter()
        .save(&args.output)
        .map_err(|err| format!("Failed to write '{}': {err}", args.output.display()))?;
    println!("Wrote starter schema to '{}'.", args.output.display());
    Ok(())
}

/// One line per command: its path, then its parameters.
fn describe_commands(model: &CommandModel) -> Vec<String> {
    model
        .commands()
        .map(|command| {
            let path = model.path(command.id).replace(DEFAULT_COMMAND_NAME, "(default)");
            let parameters: Vec<String> = command
                .parameters
                .iter()
                .filter(|parameter| !parameter.is_hidden)
                .map(|parameter| match parameter.as_argument() {
                    Some(argument) if parameter.is_required => format!("<{}>", argument.value_name),
                    Some(argument) => format!("[{}]", argument.value_name),
                    None => parameter.display_name(),
                })
                .collect();
            if parameters.is_empty() {
                path.trim().to_string()
            } else {
                format!("{}  {}", path.trim(), parameters.join(" "))
            }
        })
        .collect()
}
