use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(
    name = "stockwatch",
    version,
    about = "Product restock monitor with SMS alerts",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the config file
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API and the monitoring engine
    Serve {
        /// TOML config file (environment variables are used when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the listen port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check a product page once and print the inferred status
    Check {
        /// Product page URL
        url: String,

        /// Location filter (postal code or similar)
        #[arg(short, long, default_value = "")]
        location: String,

        /// Query parameter that carries the location filter
        #[arg(long)]
        location_param: Option<String>,

        /// Print the snapshot as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, port } => {
            let config = commands::load_config(config.as_deref(), port)?;
            let format = cli.log_format.as_deref().unwrap_or(&config.logging.format);
            setup_tracing(format, &config.logging.level, cli.verbose)?;

            tracing::info!(port = config.server.port, "Starting serve command");
            commands::serve(config).await?;
        }

        Commands::Check {
            url,
            location,
            location_param,
            json,
        } => {
            setup_tracing(cli.log_format.as_deref().unwrap_or("text"), "info", cli.verbose)?;

            tracing::info!(url = %url, location = %location, "Starting check command");
            commands::check(url, location, location_param, json).await?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("stockwatch=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(format!("stockwatch={level},warn"))
        })
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    Ok(())
}
