#![cfg_attr(not(test), forbid(unsafe_code))]

//! Main entry point for the Pigeon server CLI.

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use shared::config::{Config, Profile};
use std::error::Error;

/// Pigeon server command line.
#[derive(Parser)]
#[command(name = "pigeon")]
#[command(about = "Direct-messaging server with real-time delivery", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the messaging server
    Serve {
        /// Port to bind to; overrides the profile default
        #[arg(long, short)]
        port: Option<u16>,

        /// Configuration profile: dev, test, or prod
        #[arg(long, default_value = "dev")]
        profile: Profile,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, profile } => {
            let mut config = Config::load(profile);
            if let Some(port) = port {
                config.server.port = port;
            }
            server::server::run(config).await?;
        }
    }

    Ok(())
}
