//! Continuator CLI Entry Point
//!
//! Drives workflows stored in a local state file.
//!
//! # Usage
//!
//! ```bash
//! # Start a workflow from a template
//! continuator --templates templates.yaml launch quote '{"customer":"acme"}'
//!
//! # Submit input for a pending activity
//! continuator continue <WORKFLOW_ID> <ACTIVITY_ID> '{"notes":"ok"}'
//!
//! # Skip an activity
//! continuator skip <WORKFLOW_ID> <ACTIVITY_ID>
//!
//! # Inspect a workflow
//! continuator show <WORKFLOW_ID>
//!
//! # Finish a stage move interrupted by a storage failure
//! continuator resume <WORKFLOW_ID>
//! ```

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use serde::Serialize;

use continuator::model::Context;
use continuator::{
    load_catalog, ContinuationEngine, ContinueWorkflowRequest, EngineConfig, ExecutorRegistry,
    FileStore, APP_NAME, VERSION,
};

/// Subcommand selected on the command line.
#[derive(Debug, PartialEq)]
enum Command {
    Launch {
        template_id: String,
        context: Option<String>,
    },
    Continue {
        workflow_id: String,
        activity_id: String,
        payload: Option<String>,
    },
    Skip {
        workflow_id: String,
        activity_id: String,
    },
    Show {
        workflow_id: String,
    },
    Resume {
        workflow_id: String,
    },
}

/// Command-line configuration parsed from arguments.
#[derive(Debug, Default)]
struct Cli {
    command: Option<Command>,
    templates_path: Option<PathBuf>,
    state_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
    executor_timeout_ms: Option<u64>,
    verbose: bool,
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: continuator [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("Commands:");
    println!("  launch <TEMPLATE_ID> [CONTEXT_JSON]              Start a workflow");
    println!("  continue <WORKFLOW_ID> <ACTIVITY_ID> [PAYLOAD]   Submit activity input");
    println!("  skip <WORKFLOW_ID> <ACTIVITY_ID>                 Skip a pending activity");
    println!("  show <WORKFLOW_ID>                               Print a workflow");
    println!("  resume <WORKFLOW_ID>                             Re-run the stage check");
    println!();
    println!("Options:");
    println!("  --templates PATH         Template catalog (YAML)");
    println!("  --state PATH             Instance state file (JSON)");
    println!("  --config PATH            Engine configuration (YAML)");
    println!("  --executor-timeout MS    Executor time limit, 0 disables");
    println!("  --verbose                Enable debug logging");
    println!("  --help                   Show this help message");
    println!("  --version                Show version information");
    println!();
    println!("Defaults live under $CONTINUATOR_HOME (or ./.continuator).");
}

/// Fetches the value following an option.
fn option_value<'a>(args: &'a [String], i: &mut usize, option: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{} requires a value", option))
}

/// Parses command-line arguments into a Cli struct.
fn parse_arguments(args: &[String]) -> Result<Cli, String> {
    let mut cli = Cli::default();
    let mut positional = Vec::new();
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--verbose" | "-v" => {
                cli.verbose = true;
            }
            "--templates" => {
                cli.templates_path = Some(PathBuf::from(option_value(args, &mut i, arg)?));
            }
            "--state" => {
                cli.state_path = Some(PathBuf::from(option_value(args, &mut i, arg)?));
            }
            "--config" => {
                cli.config_path = Some(PathBuf::from(option_value(args, &mut i, arg)?));
            }
            "--executor-timeout" => {
                let value = option_value(args, &mut i, arg)?;
                cli.executor_timeout_ms = Some(
                    value
                        .parse()
                        .map_err(|_| format!("Invalid executor timeout: {}", value))?,
                );
            }
            other if other.starts_with("--") => {
                return Err(format!("Unknown option: {}", other));
            }
            _ => positional.push(arg.clone()),
        }
        i += 1;
    }

    cli.command = Some(parse_command(positional)?);
    Ok(cli)
}

fn parse_command(positional: Vec<String>) -> Result<Command, String> {
    let mut args = positional.into_iter();
    let name = args.next().ok_or("Missing command")?;
    let mut next = |what: &str| {
        args.next()
            .ok_or_else(|| format!("'{}' requires {}", name, what))
    };

    let command = match name.as_str() {
        "launch" => Command::Launch {
            template_id: next("a template id")?,
            context: next("").ok(),
        },
        "continue" => Command::Continue {
            workflow_id: next("a workflow id")?,
            activity_id: next("an activity id")?,
            payload: next("").ok(),
        },
        "skip" => Command::Skip {
            workflow_id: next("a workflow id")?,
            activity_id: next("an activity id")?,
        },
        "show" => Command::Show {
            workflow_id: next("a workflow id")?,
        },
        "resume" => Command::Resume {
            workflow_id: next("a workflow id")?,
        },
        other => return Err(format!("Unknown command: {}", other)),
    };

    if let Some(extra) = args.next() {
        return Err(format!("Unexpected argument: {}", extra));
    }
    Ok(command)
}

/// Layers CLI flags over the configuration file or defaults.
fn engine_config(cli: &Cli) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    if let Some(path) = &cli.templates_path {
        config.templates_path = path.clone();
    }
    if let Some(path) = &cli.state_path {
        config.state_path = path.clone();
    }
    if let Some(ms) = cli.executor_timeout_ms {
        config = config.with_executor_timeout((ms > 0).then(|| Duration::from_millis(ms)));
    }

    Ok(config)
}

fn parse_context(json: Option<&str>) -> Result<Context, Box<dyn std::error::Error>> {
    match json {
        Some(text) if !text.trim().is_empty() => serde_json::from_str(text)
            .map_err(|e| format!("Initial context must be a JSON object: {}", e).into()),
        _ => Ok(Context::new()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Main application entry point.
fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let cli = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    setup_logging(cli.verbose);
    debug!("{} v{}", APP_NAME, VERSION);

    let config = engine_config(&cli)?;
    debug!("Configuration: {:?}", config);

    let catalog = load_catalog(&config.templates_path).map_err(|e| {
        error!("Failed to load templates: {}", e);
        format!(
            "Could not load templates from '{}': {}",
            config.templates_path.display(),
            e
        )
    })?;
    let store = FileStore::open(&config.state_path)?;
    info!("State file: {}", store.path().display());

    let engine = ContinuationEngine::new(
        Arc::new(store),
        Arc::new(catalog),
        ExecutorRegistry::with_builtins(),
    )
    .with_config(config);

    let Some(command) = cli.command else {
        return Err("Missing command".into());
    };

    match command {
        Command::Launch {
            template_id,
            context,
        } => {
            let context = parse_context(context.as_deref())?;
            let outcome = engine.launch_workflow(&template_id, context)?;
            print_json(&outcome)?;
        }
        Command::Continue {
            workflow_id,
            activity_id,
            payload,
        } => {
            let request =
                ContinueWorkflowRequest::new(workflow_id, activity_id, payload.unwrap_or_default());
            let response = engine.handle(&request);
            print_json(&response)?;
            if !response.success {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Skip {
            workflow_id,
            activity_id,
        } => {
            let outcome = engine.skip_activity(&workflow_id, &activity_id)?;
            print_json(&outcome)?;
        }
        Command::Show { workflow_id } => {
            let snapshot = engine.workflow_snapshot(&workflow_id)?;
            print_json(&snapshot)?;
        }
        Command::Resume { workflow_id } => {
            let outcome = engine.reconcile_workflow(&workflow_id)?;
            print_json(&outcome)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
