//! Command-line client for collaborative note sharing.
//!
//! Commands:
//! - share: Mint a share link for a note
//! - revoke: Revoke a share link
//! - collaborators: List or invite collaborators
//! - read: Read a note with a session and/or share token
//! - connections: Show who is live in a note's room
//! - connect: Join a note's room and exchange edits from stdin
//!
//! Configuration via environment:
//! - NOTECOLLAB_URL: Base URL of the server (default: http://localhost:5000)
//! - NOTECOLLAB_SESSION: Session JWT sent as a Bearer token
//! - NOTECOLLAB_USER: Raw user id for servers running with ALLOW_DEV_IDENTITY

mod commands;

use clap::{Parser, Subcommand};

use commands::{
    Credentials, collaborators::CollaboratorsArgs, connect::ConnectArgs,
    connections::ConnectionsArgs, read::ReadArgs, revoke::RevokeArgs, share::ShareArgs,
};

/// Notecollab CLI
///
/// Share notes and collaborate on them from the command line. Prints JSON by
/// default; pass --human for formatted output.
#[derive(Parser)]
#[command(name = "notecollab")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output human-readable formatted text instead of JSON
    #[arg(long, global = true)]
    human: bool,

    /// Server URL
    #[arg(
        long,
        env = "NOTECOLLAB_URL",
        default_value = "http://localhost:5000",
        global = true
    )]
    url: String,

    /// Session JWT
    #[arg(long, env = "NOTECOLLAB_SESSION", global = true)]
    session: Option<String>,

    /// User id sent as X-User-Id (dev servers only)
    #[arg(long, env = "NOTECOLLAB_USER", global = true)]
    user: Option<i64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mint a share link for a note
    Share(ShareArgs),

    /// Revoke a share link
    Revoke(RevokeArgs),

    /// List or invite collaborators
    Collaborators(CollaboratorsArgs),

    /// Read a note
    Read(ReadArgs),

    /// Show live connections in a note's room
    Connections(ConnectionsArgs),

    /// Join a note's room; each stdin line is published as an edit
    Connect(ConnectArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let credentials = Credentials {
        session: cli.session,
        user: cli.user,
    };

    let client = match commands::build_client(&credentials) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Share(args) => commands::share::execute(&client, &cli.url, cli.human, args).await,
        Commands::Revoke(args) => {
            commands::revoke::execute(&client, &cli.url, cli.human, args).await
        }
        Commands::Collaborators(args) => {
            commands::collaborators::execute(&client, &cli.url, cli.human, args).await
        }
        Commands::Read(args) => commands::read::execute(&client, &cli.url, cli.human, args).await,
        Commands::Connections(args) => {
            commands::connections::execute(&client, &cli.url, cli.human, args).await
        }
        Commands::Connect(args) => {
            commands::connect::execute(&credentials, &cli.url, cli.human, args).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
