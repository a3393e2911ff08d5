//! ljdump entry point.

use clap::Parser;
use ljdump::cli::commands;
use ljdump::cli::{Cli, Commands};
use ljdump::config;
use ljdump::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
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
            0 => EnvFilter::new("ljdump=info,warn"),
            1 => EnvFilter::new("ljdump=debug,info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli) -> Result<(), Error> {
    match cli.command.unwrap_or(Commands::Dump) {
        Commands::Version => commands::version::execute(cli.json),
        Commands::Status => {
            let config = config::load(&cli.overrides())?;
            commands::status::execute(&config, cli.json)
        }
        Commands::Dump => {
            let config = config::load(&cli.overrides())?;
            commands::dump::execute(&config, cli.json, cli.quiet)
        }
    }
}
