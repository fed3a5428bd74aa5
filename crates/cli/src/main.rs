//! Stepwise CLI - Main Entry Point
//!
//! Exit codes: 0 when every case passed, 1 when a case failed, 2 when the
//! run could not execute (bad configuration, unreadable cases, browser
//! launch or target navigation failure).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use stepwise_common::EngineConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use stepwise_cli::commands::{classify, config, run};
use stepwise_cli::output::{self, OutputFormat};

/// Stepwise - natural-language browser tests
#[derive(Parser)]
#[command(name = "stepwise")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "stepwise.toml", env = "STEPWISE_CONFIG", global = true)]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run test cases against a target URL
    Run(run::RunArgs),

    /// Show how step sentences are classified and resolved
    Classify(classify::ClassifyArgs),

    /// Inspect or create the configuration file
    #[command(subcommand)]
    Config(config::ConfigCommands),

    /// Show version information
    Version,
}

fn init_logging(verbose: bool, json: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    // Logs go to stderr so report output on stdout stays machine-readable
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    let outcome = match cli.command {
        Commands::Run(args) => run::execute(args, &cli.config, cli.format).await,
        Commands::Classify(args) => EngineConfig::load(&cli.config)
            .map_err(anyhow::Error::from)
            .and_then(|config| classify::execute(args, &config, cli.format))
            .map(|_| run::EXIT_PASSED),
        Commands::Config(cmd) => {
            config::execute(cmd, &cli.config, cli.format).map(|_| run::EXIT_PASSED)
        }
        Commands::Version => {
            println!("Stepwise CLI v{}", stepwise_common::VERSION);
            Ok(run::EXIT_PASSED)
        }
    };

    let code = match outcome {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            run::EXIT_ERROR
        }
    };
    std::process::exit(code);
}
