mod app;
mod cli;

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use hdmiplay_core::AppConfig;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();

    let default_filter = if cli.verbose { "hdmiplay=debug" } else { "hdmiplay=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(app::EXIT_USAGE);
        }
    };

    let mut stdout = io::stdout().lock();
    match app::run(&cli, &config, &mut stdout) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("failed to write output: {e}");
            ExitCode::FAILURE
        }
    }
}
