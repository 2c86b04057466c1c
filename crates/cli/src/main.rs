//! Tienda CLI - Database migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! tienda-cli migrate
//!
//! # Load demo catalog, delivery zone, customer and coupon
//! tienda-cli seed
//!
//! # Quote shipping against the zones stored in the database
//! tienda-cli cotizar --distrito 3 --subtotal 45.00
//! tienda-cli cotizar --lat -12.1211 --lng -77.0297
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Seed an empty database with demo data
//! - `cotizar` - Shipping quote at the current store time

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

mod commands;

#[derive(Parser)]
#[command(name = "tienda-cli")]
#[command(author, version, about = "Tienda CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed an empty database with demo data
    Seed,
    /// Quote shipping for a distrito and/or coordinates
    Cotizar {
        /// Distrito ID
        #[arg(short, long)]
        distrito: Option<i32>,

        /// Latitude of the delivery point
        #[arg(long, requires = "lng", allow_hyphen_values = true)]
        lat: Option<f64>,

        /// Longitude of the delivery point
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lng: Option<f64>,

        /// Cart subtotal in soles
        #[arg(short, long, default_value = "0")]
        subtotal: Decimal,

        /// Quote this zone instead of the best one
        #[arg(short, long)]
        zona: Option<i32>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed => commands::seed::run().await?,
        Commands::Cotizar {
            distrito,
            lat,
            lng,
            subtotal,
            zona,
        } => {
            let consulta = commands::cotizar::Consulta {
                distrito_id: distrito,
                latitud: lat,
                longitud: lng,
                subtotal,
                zona_reparto_id: zona,
            };
            commands::cotizar::run(&consulta).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_negative_coordinates_parse() {
        let cli = Cli::try_parse_from([
            "tienda-cli",
            "cotizar",
            "--lat",
            "-12.1211",
            "--lng",
            "-77.0297",
        ])
        .unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(
            cli.command,
            Commands::Cotizar { lat: Some(_), lng: Some(_), .. }
        ));
    }

    #[test]
    fn test_latitude_requires_longitude() {
        assert!(Cli::try_parse_from(["tienda-cli", "cotizar", "--lat", "-12.1"]).is_err());
    }
}
