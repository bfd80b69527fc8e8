//! Storage Capability Core - probe, fold, and inspect cluster capabilities
//!
//! The main entry point for sc-core, handling:
//! - Full capability passes over a topology file
//! - Point queries against a single node snapshot
//! - Rule table, JSON Schema and configuration inspection

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use sc_common::error::{format_error_human, StructuredError};
use sc_common::{Error, NodeName, OutputFormat, SCHEMA_VERSION};
use sc_config::{load_config, LoadedConfig, ValidationError};
use sc_core::aggregate::{describe_rules, CapabilityError};
use sc_core::exit_codes::ExitCode;
use sc_core::logging::{event_names, init_logging, LogConfig, LogFormat, LogLevel, Stage};
use sc_core::report::{render_rules, NodeReport, ProbeReport};
use sc_core::schema::{available_schemas, generate_all_schemas, generate_schema};
use sc_core::transcript::TranscriptTopology;
use sc_core::StorageCapabilityManager;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Storage Capability Core - conservative feature detection for storage clusters
#[derive(Parser)]
#[command(name = "sc-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to capabilities.{toml,json}
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Topology transcript (.toml, .yaml or .json)
    #[arg(long, global = true, env = "SC_TOPOLOGY")]
    topology: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log format on stderr (human or jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full capability pass and print the aggregate
    Probe,

    /// Show the capability snapshot of one node
    Node(NodeArgs),

    /// Print the fold rule table
    Rules,

    /// Print JSON Schemas for output and input types
    Schema(SchemaArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),

    /// Print version information
    Version,
}

// ============================================================================
// Command argument structs
// ============================================================================

#[derive(Args, Debug)]
struct NodeArgs {
    /// Node name as listed in the topology
    name: String,

    /// Re-run the heartbeat probe on this node after the pass
    #[arg(long)]
    recheck_heartbeat: bool,
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Type to print (see --list)
    name: Option<String>,

    /// List available schema types
    #[arg(long, conflicts_with = "all")]
    list: bool,

    /// Print every schema as one JSON object
    #[arg(long)]
    all: bool,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show the resolved configuration and where it came from
    Show,
    /// Validate the configuration and exit
    Validate,
}

#[derive(Args, Debug)]
struct CompletionsArgs {
    /// Target shell
    shell: Shell,
}

// ============================================================================
// Main entry point
// ============================================================================

fn main() {
    let cli = Cli::parse();

    let cli_level = if cli.global.quiet {
        Some(LogLevel::Error)
    } else {
        match cli.global.verbose {
            0 => None,
            1 => Some(LogLevel::Info),
            2 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    };
    init_logging(&LogConfig::from_env(cli_level, cli.global.log_format));

    let exit_code = match &cli.command {
        Commands::Probe => run_probe(&cli.global),
        Commands::Node(args) => run_node(&cli.global, args),
        Commands::Rules => {
            println!("{}", render_rules(&describe_rules(), cli.global.format));
            ExitCode::Clean
        }
        Commands::Schema(args) => run_schema(args),
        Commands::Config(args) => run_config(&cli.global, args),
        Commands::Completions(args) => {
            clap_complete::generate(
                args.shell,
                &mut Cli::command(),
                "sc-core",
                &mut std::io::stdout(),
            );
            ExitCode::Clean
        }
        Commands::Version => {
            print_version(&cli.global);
            ExitCode::Clean
        }
    };

    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Shared helpers
// ============================================================================

fn config_error(err: ValidationError) -> Error {
    match err {
        ValidationError::IoError(message) => Error::Config(message),
        ValidationError::VersionMismatch { .. } => Error::SchemaValidation(err.to_string()),
        ValidationError::ParseError(_) | ValidationError::InvalidValue { .. } => {
            Error::InvalidConfig(err.to_string())
        }
    }
}

/// Print `err` in the requested format and return its exit code.
fn report_error(global: &GlobalOpts, err: &Error) -> ExitCode {
    if global.format.is_machine() {
        println!("{}", StructuredError::from(err).to_json_pretty());
    } else {
        let use_color = !global.no_color && std::io::stderr().is_terminal();
        eprintln!("{}", format_error_human(err, use_color));
    }
    ExitCode::for_error(err)
}

fn load(global: &GlobalOpts) -> Result<LoadedConfig, Error> {
    let loaded = load_config(global.config.as_deref()).map_err(config_error)?;
    info!(
        event = event_names::CONFIG_LOADED,
        stage = %Stage::Init,
        source = %loaded.snapshot.config_source,
        path = loaded.snapshot.config_path.as_deref().unwrap_or("-"),
        "configuration loaded"
    );
    Ok(loaded)
}

fn build_manager(global: &GlobalOpts) -> Result<(StorageCapabilityManager, LoadedConfig), Error> {
    let loaded = load(global)?;
    let path = global.topology.as_deref().ok_or_else(|| {
        Error::Topology("no topology given; pass --topology or set SC_TOPOLOGY".to_string())
    })?;
    let topology = TranscriptTopology::from_path(path).map_err(CapabilityError::from)?;
    let manager = StorageCapabilityManager::new(Arc::new(topology), &loaded.config);
    Ok((manager, loaded))
}

// ============================================================================
// Command implementations
// ============================================================================

fn run_probe(global: &GlobalOpts) -> ExitCode {
    let result = build_manager(global).and_then(|(manager, loaded)| {
        ProbeReport::collect(&manager)
            .map(|report| report.with_config(loaded.snapshot))
            .map_err(Error::from)
    });
    match result {
        Ok(report) => {
            println!("{}", report.render(global.format));
            ExitCode::Clean
        }
        Err(err) => report_error(global, &err),
    }
}

fn run_node(global: &GlobalOpts, args: &NodeArgs) -> ExitCode {
    let name = NodeName::from(args.name.as_str());
    let result = build_manager(global).and_then(|(manager, _)| {
        if args.recheck_heartbeat {
            manager.recheck_heartbeat(&name)?;
        }
        let snapshot = manager.node(&name)?;
        Ok(NodeReport::new(name.clone(), &snapshot))
    });
    match result {
        Ok(report) => {
            println!("{}", report.render(global.format));
            ExitCode::Clean
        }
        Err(err) => report_error(global, &err),
    }
}

fn run_schema(args: &SchemaArgs) -> ExitCode {
    if args.list {
        for (name, description) in available_schemas() {
            println!("{:<22} {}", name, description);
        }
        return ExitCode::Clean;
    }

    let value = if args.all {
        serde_json::to_value(generate_all_schemas()).ok()
    } else if let Some(name) = &args.name {
        generate_schema(name)
    } else {
        eprintln!("sc-core schema: give a type name, --list or --all");
        return ExitCode::ArgsError;
    };

    match value.and_then(|v| serde_json::to_string_pretty(&v).ok()) {
        Some(text) => {
            println!("{}", text);
            ExitCode::Clean
        }
        None => {
            eprintln!(
                "sc-core schema: unknown type '{}'",
                args.name.as_deref().unwrap_or("")
            );
            ExitCode::ArgsError
        }
    }
}

fn run_config(global: &GlobalOpts, args: &ConfigArgs) -> ExitCode {
    let loaded = match load(global) {
        Ok(loaded) => loaded,
        Err(err) => return report_error(global, &err),
    };
    let snapshot = &loaded.snapshot;
    let source = snapshot
        .config_path
        .as_deref()
        .unwrap_or("built-in defaults");

    match args.command {
        ConfigCommands::Validate => match global.format {
            OutputFormat::Json => {
                let response = serde_json::json!({
                    "schema_version": SCHEMA_VERSION,
                    "status": "valid",
                    "path": snapshot.config_path,
                    "hash": snapshot.config_hash,
                });
                print_json(&response);
            }
            _ => println!("config valid: {}", source),
        },
        ConfigCommands::Show => match global.format {
            OutputFormat::Json => {
                let response = serde_json::json!({
                    "schema_version": SCHEMA_VERSION,
                    "source": snapshot,
                    "values": &loaded.config,
                });
                print_json(&response);
            }
            OutputFormat::Summary => {
                println!(
                    "config: {} ({}) mode={} parallelism={}",
                    source,
                    snapshot.config_source,
                    snapshot.summary.deployment_mode,
                    snapshot.summary.parallelism
                );
            }
            OutputFormat::Md => {
                println!("# sc-core config show");
                println!();
                println!("Source: {} ({})", source, snapshot.config_source);
                println!("Hash: {}", snapshot.config_hash.as_deref().unwrap_or("n/a"));
                println!("Schema version: {}", snapshot.schema_version);
                println!();
                println!("| Setting | Value |");
                println!("|---|---|");
                println!("| deployment.mode | {} |", snapshot.summary.deployment_mode);
                println!("| deployment.fast_mock | {} |", snapshot.summary.fast_mock);
                println!(
                    "| protocol.extended_protocol | {} |",
                    snapshot.summary.extended_protocol
                );
                println!(
                    "| protocol.metadata_extended_protocol | {} |",
                    snapshot.summary.metadata_extended_protocol
                );
                println!("| udf.plugin_name | {} |", snapshot.summary.udf_plugin);
                println!("| probe.parallelism | {} |", snapshot.summary.parallelism);
            }
        },
    }
    ExitCode::Clean
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("sc-core: failed to serialize output: {}", e),
    }
}

fn print_version(global: &GlobalOpts) {
    let version = env!("CARGO_PKG_VERSION");
    match global.format {
        OutputFormat::Json => {
            let response = serde_json::json!({
                "name": "sc-core",
                "version": version,
                "schema_version": SCHEMA_VERSION,
            });
            print_json(&response);
        }
        _ => println!("sc-core {} (schema {})", version, SCHEMA_VERSION),
    }
}
