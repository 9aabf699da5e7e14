use clap::Parser;
use tracing::error;

use nestegg::api::cli::{Cli, Command, run_project};
use nestegg::api::run_http_server;
use nestegg::config::{LogFormat, ServerConfig};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };
    cli.apply_overrides(&mut config);
    init_logging(&config.log_level, config.log_format);

    match cli.command {
        Command::Project(args) => match run_project(&args) {
            Ok(output) => println!("{output}"),
            Err(e) => {
                error!("{e}");
                std::process::exit(1);
            }
        },
        Command::Serve(_) => {
            if let Err(e) = run_http_server(&config).await {
                error!(error = %e, "server error");
                std::process::exit(1);
            }
        }
    }
}

/// Logs go to stderr so `project --format json` output stays parseable.
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}
