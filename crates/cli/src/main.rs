//! Bid Gallery CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run gallery database migrations
//! gallery-cli migrate
//!
//! # Create a user with any role
//! gallery-cli user create -e admin@example.com -r admin -p 's3cret!'
//!
//! # List an artwork
//! gallery-cli product create -t "Harbour at Dusk" --reserve 450.00
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `user create` - Create user accounts
//! - `product create` - List artworks for sale

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

mod commands;

#[derive(Parser)]
#[command(name = "gallery-cli")]
#[command(author, version, about = "Bid Gallery CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Manage the catalogue
    Product {
        #[command(subcommand)]
        action: ProductAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new user
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Role (`customer`, `artist`, `admin`, `federated`)
        #[arg(short, long, default_value = "customer")]
        role: String,

        /// Password; omit for identity-provider-only accounts
        #[arg(short, long)]
        password: Option<String>,
    },
}

#[derive(Subcommand)]
enum ProductAction {
    /// List a new artwork
    Create {
        /// Artwork title
        #[arg(short, long)]
        title: String,

        /// Reserve price, e.g. `450.00`
        #[arg(long)]
        reserve: Decimal,

        /// Owning artist's user ID
        #[arg(long)]
        artist_id: Option<i32>,
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
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                role,
                password,
            } => {
                commands::user::create(&email, &role, password.as_deref()).await?;
            }
        },
        Commands::Product { action } => match action {
            ProductAction::Create {
                title,
                reserve,
                artist_id,
            } => {
                commands::product::create(&title, reserve, artist_id).await?;
            }
        },
    }
    Ok(())
}
