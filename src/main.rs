mod cache_store;
mod config;
mod http_server;
mod logging;
mod persistence;
mod ports;
mod services;
mod track;

#[cfg(test)]
mod test_utils;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::{Result, eyre::Context};

use crate::{config::Config, logging::init_tracing};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, env = "TUNEPROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Log level, or a full tracing filter directive
    #[arg(long, default_value = "info", global = true, env = "LOG_LEVEL")]
    log_level: String,

    /// OTLP collector to export spans to, e.g. http://localhost:4317
    #[arg(long, global = true, env = "OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP proxy
    Serve {
        /// The port to listen on, overrides the config file
        #[arg(short, long, env = "TUNEPROXY_PORT")]
        port: Option<u16>,

        /// Cache root, overrides the config file
        #[arg(long, env = "TUNEPROXY_CACHE_DIR")]
        cache_dir: Option<PathBuf>,
    },
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let tracer_provider = init_tracing(
        "tuneproxy",
        args.otlp_endpoint.as_deref(),
        &args.log_level,
    )?;

    let result = run(args).await;

    if let Some(provider) = tracer_provider
        && let Err(e) = provider.shutdown()
    {
        eprintln!("Failed to shut down tracer provider: {e}");
    }
    result
}

async fn run(args: Args) -> Result<()> {
    tracing::debug!("Loading configuration");
    let mut config = {
        if let Some(config) = &args.config {
            Config::from_file(config)
        } else {
            Config::load()
        }
    }
    .wrap_err("Failed to load tuneproxy config")?;

    match args.command {
        Commands::Serve { port, cache_dir } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(cache_dir) = cache_dir {
                config.set_cache_dir(&cache_dir);
            }
            http_server::app::start(config).await?;
        }
        Commands::Config(config_commands) => match config_commands {
            ConfigCommands::CreateDefault => {
                let path = Config::create_default()?;
                println!("Created {}", path.display());
            }
            ConfigCommands::Path => match Config::config_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("No default config path found"),
            },
        },
    }

    Ok(())
}
