use clap::Parser;
use promptline_core::config::{load_settings, Settings};
use tracing_subscriber::{fmt, EnvFilter};

mod cli;

use cli::args::Cli;
use cli::commands::{dispatch, emit_error, exit_codes};

fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_current_span(false)
        .with_span_list(false)
        .with_writer(std::io::stderr)
        .init();
}

fn settings_for(cli: &Cli) -> Result<Settings, promptline_core::errors::ConfigError> {
    let base = match &cli.config {
        Some(path) => load_settings(path, cli.strict)?,
        None => Settings::default(),
    };
    let mut settings = base.with_env();
    if let Some(db) = &cli.db {
        settings.db = db.clone();
    }
    if let Some(level) = &cli.log_level {
        settings.log_level = level.clone();
    }
    Ok(settings)
}

fn main() {
    let cli = Cli::parse();

    let code = match settings_for(&cli) {
        Ok(settings) => {
            init_logging(&settings.log_level);
            tracing::debug!(event = "cli_start", db = %settings.db.display());
            dispatch(cli, &settings)
        }
        Err(e) => emit_error("E_CONFIG", &e.0, false, exit_codes::CONFIG_ERROR),
    };

    let code = match code {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fatal: {e:?}");
            exit_codes::CONFIG_ERROR
        }
    };
    std::process::exit(code);
}
