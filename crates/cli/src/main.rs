//! BangunRumah CLI - Catalog management against the hosted backend.
//!
//! # Usage
//!
//! ```bash
//! # Import the bundled product list (skips names already in the catalog)
//! br-cli import -e admin@toko.id -p rahasia1
//!
//! # Import a different list
//! br-cli import --source products.json
//!
//! # Create an admin account
//! br-cli register-admin -e admin@toko.id -p rahasia1
//!
//! # List products, optionally filtered by name
//! br-cli products --search semen
//! ```
//!
//! # Environment Variables
//!
//! - `FIREBASE_API_KEY`, `FIREBASE_PROJECT_ID`, `FIREBASE_STORAGE_BUCKET`
//! - `BR_EMAIL`, `BR_PASSWORD` - Credentials when the flags are omitted

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use secrecy::SecretString;

mod commands;

#[derive(Parser)]
#[command(name = "br-cli")]
#[command(author, version, about = "BangunRumah CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Account used to act on the catalog.
#[derive(Args)]
struct Login {
    /// Account email address
    #[arg(short, long, env = "BR_EMAIL")]
    email: String,

    /// Account password
    #[arg(short, long, env = "BR_PASSWORD", hide_env_values = true)]
    password: String,
}

impl Login {
    fn password(&self) -> SecretString {
        SecretString::from(self.password.clone())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Import products that are not yet in the catalog
    Import {
        #[command(flatten)]
        login: Login,

        /// JSON file to import instead of the bundled list
        #[arg(short, long)]
        source: Option<PathBuf>,
    },
    /// Create an account with the admin role
    RegisterAdmin {
        #[command(flatten)]
        login: Login,
    },
    /// List products
    Products {
        #[command(flatten)]
        login: Login,

        /// Only show products whose name contains this text
        #[arg(long)]
        search: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Import { login, source } => {
            commands::import::run(&login.email, &login.password(), source.as_deref()).await?;
        }
        Commands::RegisterAdmin { login } => {
            commands::register::admin(&login.email, &login.password()).await?;
        }
        Commands::Products { login, search } => {
            commands::products::list(&login.email, &login.password(), search.as_deref()).await?;
        }
    }
    Ok(())
}
