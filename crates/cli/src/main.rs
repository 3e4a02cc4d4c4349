//! Garage Inventory CLI - Database migrations and user management.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! garage-cli migrate
//!
//! # Create a user (add --admin for an administrator)
//! garage-cli user create --username alice --email alice@example.com --password 'correct horse'
//!
//! # Grant administrator rights
//! garage-cli user promote --username alice
//!
//! # Delete a user, their boxes, items and stored photos
//! garage-cli user delete --username alice
//! ```
//!
//! Configuration is read from the same environment variables as the web
//! server (`DATABASE_URL`, `STORAGE_BACKEND`, ...).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "garage-cli")]
#[command(author, version, about = "Garage Inventory CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new user
    Create {
        /// Login name
        #[arg(short, long)]
        username: String,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Initial password
        #[arg(short, long)]
        password: String,

        /// Grant administrator rights
        #[arg(long)]
        admin: bool,
    },
    /// Grant administrator rights to an existing user
    Promote {
        #[arg(short, long)]
        username: String,
    },
    /// Delete a user with all their boxes and items
    Delete {
        #[arg(short, long)]
        username: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User { action } => match action {
            UserAction::Create {
                username,
                email,
                password,
                admin,
            } => {
                commands::user::create(&username, &email, &password, admin).await?;
            }
            UserAction::Promote { username } => commands::user::promote(&username).await?,
            UserAction::Delete { username } => commands::user::delete(&username).await?,
        },
    }
    Ok(())
}
