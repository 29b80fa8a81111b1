//! quizbase CLI entry point.

use clap::Parser;
use quizbase::App;
use quizbase::cli::commands;
use quizbase::cli::{Cli, Commands};
use quizbase::config::{AppConfig, load_dotenv};
use quizbase::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    // before parsing, so QB_DIR from .env feeds the clap env fallback
    load_dotenv();

    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let json = cli.json;

    match run(&cli, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info,tower_http=info"),
            2 => EnvFilter::new("debug,rusqlite=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

/// Open the app and bind the snapshot hooks.
fn open_app(cli: &Cli) -> Result<App, Error> {
    let app = App::new(AppConfig::new(&cli.dir, cli.sync_dir.clone()))?;
    app.bind_sync_hooks();
    Ok(app)
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    match &cli.command {
        Commands::Version => commands::version::execute(json),
        Commands::Completions { shell } => commands::completions::execute(shell),

        Commands::Serve { http } => commands::serve::execute(&open_app(cli)?, *http),
        Commands::Migrate { command } => commands::migrate::execute(command, &open_app(cli)?, json),
        Commands::Collection { command } => {
            commands::collection::execute(command, &open_app(cli)?, json)
        }
        Commands::Record { command } => commands::record::execute(command, &open_app(cli)?, json),
        Commands::Sync { command } => commands::sync::execute(command, &open_app(cli)?, json),
    }
}
