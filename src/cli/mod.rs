pub mod commands;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "usage-gateway")]
#[command(about = "Authenticated API gateway with usage tracking")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server")]
    Serve {
        #[arg(long, help = "Port to listen on (overrides PORT)")]
        port: Option<u16>,

        #[arg(long, help = "Do not apply database migrations on startup")]
        skip_migrations: bool,
    },

    #[command(about = "Apply database migrations and exit")]
    Migrate,
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    // Secret and database URL are checked here, before anything listens.
    let config = AppConfig::from_env()?;
    tracing::info!("Starting usage gateway in {:?} mode", config.environment);

    match cli.command {
        Commands::Serve {
            port,
            skip_migrations,
        } => commands::serve::handle(config, port, skip_migrations).await,
        Commands::Migrate => commands::migrate::handle(config).await,
    }
}
