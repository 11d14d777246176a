#![allow(clippy::uninlined_format_args)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use odoo_scout::analyzer::{self, ChatClient};
use odoo_scout::navigator::landing_marker;
use odoo_scout::pipeline::{self, AuthMode, Choice};
use odoo_scout::webdriver_manager::GLOBAL_WEBDRIVER_MANAGER;
use odoo_scout::{ModuleSelector, ScoutError, Settings};

const EXIT_SUCCESS: i32 = 0;

#[derive(Parser)]
#[command(name = "odoo-scout")]
#[command(about = "Scrape an Odoo module's DOM and analyze its structure with an LLM", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    settings: Settings,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in, navigate, scrape and analyze one module
    Run {
        /// Module number or name (prompts when omitted)
        #[arg(short, long)]
        module: Option<String>,

        /// Authentication strategy
        #[arg(long, value_enum, default_value = "form")]
        auth: AuthMode,
    },

    /// Same as `run`, stopping after the Element Dump
    Scrape {
        /// Module number or name (prompts when omitted)
        #[arg(short, long)]
        module: Option<String>,

        /// Authentication strategy
        #[arg(long, value_enum, default_value = "form")]
        auth: AuthMode,
    },

    /// Analyze an existing Element Dump
    Analyze {
        /// Module the dump belongs to
        #[arg(short, long)]
        module: String,

        /// Dump file (defaults to the module's dump path)
        #[arg(long)]
        dump: Option<PathBuf>,
    },

    /// Walk a module page by page from proposed menu selectors
    Explore {
        /// Module number or name (prompts when omitted)
        #[arg(short, long)]
        module: Option<String>,

        /// Authentication strategy
        #[arg(long, value_enum, default_value = "form")]
        auth: AuthMode,
    },

    /// List supported modules
    Modules,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.settings.debug);

    let result = run(cli).await;

    // Always clean up WebDriver processes before exiting
    GLOBAL_WEBDRIVER_MANAGER.stop_all();

    match result {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(err) => {
            // Output JSON error to stdout for programmatic consumption
            let error_json = json!({
                "error": true,
                "message": err.to_string(),
                "exit_code": err.exit_code()
            });
            println!(
                "{}",
                serde_json::to_string(&error_json).unwrap_or_else(|_| "{}".to_string())
            );

            eprintln!("Error: {}", err);
            std::process::exit(err.exit_code());
        }
    }
}

fn init_tracing(debug: bool) {
    let default_filter = if debug {
        "odoo_scout=debug"
    } else {
        "odoo_scout=info"
    };
    // Logs go to stderr so JSON output on stdout stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

async fn run(cli: Cli) -> Result<(), ScoutError> {
    let settings = cli.settings;

    match cli.command {
        Commands::Run { module, auth } => handle_run(&settings, module, auth, true).await,
        Commands::Scrape { module, auth } => handle_run(&settings, module, auth, false).await,
        Commands::Analyze { module, dump } => handle_analyze(&settings, &module, dump).await,
        Commands::Explore { module, auth } => {
            settings.validate()?;
            let Some(module) = resolve_module(&settings, module)? else {
                return Ok(());
            };
            let summary = pipeline::run_explore(&settings, &module, auth).await?;
            print_json(&json!({
                "module": module.label(),
                "pages": summary.pages,
                "visited": summary.visited,
                "failed": summary.failed,
            }));
            Ok(())
        }
        Commands::Modules => {
            for (idx, module) in settings.modules.iter().enumerate() {
                let note = if landing_marker(module).is_some() {
                    ""
                } else {
                    " (no landing marker)"
                };
                println!("{}. {}{}", idx + 1, module, note);
            }
            Ok(())
        }
    }
}

/// `None` when the operator chose to exit at the prompt
fn resolve_module(
    settings: &Settings,
    requested: Option<String>,
) -> Result<Option<ModuleSelector>, ScoutError> {
    let choice = match requested {
        Some(value) if value.trim().parse::<usize>().is_ok() => {
            pipeline::parse_choice(&value, &settings.modules)?
        }
        Some(value) => Choice::Module(value),
        None => pipeline::prompt_choice(
            &settings.modules,
            std::io::stdin().lock(),
            std::io::stdout(),
        )?,
    };
    match choice {
        Choice::Exit => {
            info!("Exiting the program.");
            Ok(None)
        }
        Choice::Module(label) => ModuleSelector::parse(&label, &settings.modules).map(Some),
    }
}

async fn handle_run(
    settings: &Settings,
    module: Option<String>,
    auth: AuthMode,
    analyze: bool,
) -> Result<(), ScoutError> {
    settings.validate()?;
    let Some(module) = resolve_module(settings, module)? else {
        return Ok(());
    };

    let report = pipeline::run_pipeline(settings, &module, auth, analyze).await?;
    for warning in &report.warnings {
        warn!("Completed with warning: {}", warning);
    }
    print_json(&report);
    Ok(())
}

async fn handle_analyze(
    settings: &Settings,
    module: &str,
    dump: Option<PathBuf>,
) -> Result<(), ScoutError> {
    let module = ModuleSelector::parse(module, &settings.modules)?;
    let label = module.label();
    let dump_path = dump.unwrap_or_else(|| settings.dump_path(label));
    let client = ChatClient::from_settings(settings);

    let outcome = analyzer::analyze(&client, &dump_path, &settings.report_path(label)).await;
    let warning = outcome.warning().map(str::to_string);
    let report = outcome.into_result()?;
    if let Some(warning) = &warning {
        warn!("Completed with warning: {}", warning);
    }
    print_json(&json!({
        "module": label,
        "report_path": report.path,
        "elements_analyzed": report.elements_sent,
        "warnings": warning.into_iter().collect::<Vec<_>>(),
    }));
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => warn!("Could not serialize output: {}", e),
    }
}
