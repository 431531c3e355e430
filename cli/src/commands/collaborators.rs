//! COLLABORATORS command - List or invite collaborators on a note.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use colored::Colorize;
use notecollab_core::PermissionTier;
use serde::{Deserialize, Serialize};

use super::{HumanReadable, abbreviate, format_timestamp, make_request, output, share::ShareTokenResponse};

/// Arguments for the collaborators command.
#[derive(Args)]
pub struct CollaboratorsArgs {
    /// Note ID
    pub note_id: i64,

    #[command(subcommand)]
    pub action: Option<CollaboratorsAction>,
}

#[derive(Subcommand)]
pub enum CollaboratorsAction {
    /// List every grant on the note (default)
    List,

    /// Invite a user by id
    Add {
        /// User ID to invite
        identity: i64,

        /// Permission to grant
        #[arg(short, long, default_value = "read", value_parser = ["read", "write", "full"])]
        permission: String,
    },
}

#[derive(Serialize)]
struct InviteRequest<'a> {
    identity: i64,
    permission: &'a str,
}

/// One grant on a note.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Collaborator {
    pub identity: Option<i64>,
    pub permission: PermissionTier,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

/// Grants on a note, oldest first.
#[derive(Debug, Deserialize, Serialize)]
#[serde(transparent)]
pub struct CollaboratorList(pub Vec<Collaborator>);

impl HumanReadable for CollaboratorList {
    fn print_human(&self) {
        println!("{}", "Note Collaborators".green().bold());
        println!("{}", "=".repeat(60));
        println!();

        if self.0.is_empty() {
            println!("  {}", "(Not shared)".dimmed());
            return;
        }

        println!(
            "  {:<12} {:<12} {:<12} {}",
            "Identity".cyan(),
            "Permission".cyan(),
            "Token".cyan(),
            "Created".cyan()
        );
        println!("  {}", "-".repeat(58));

        for c in &self.0 {
            let identity = c
                .identity
                .map(|id| id.to_string())
                .unwrap_or_else(|| "link".to_string());
            println!(
                "  {:<12} {:<12} {:<12} {}",
                identity,
                c.permission.to_string(),
                abbreviate(&c.token),
                format_timestamp(&c.created_at)
            );
        }

        println!();
        println!("  {} {}", "Total:".cyan(), self.0.len());
    }
}

/// Execute the collaborators command.
pub async fn execute(
    client: &reqwest::Client,
    base_url: &str,
    human: bool,
    args: CollaboratorsArgs,
) -> Result<()> {
    let url = format!("{}/notes/{}/collaborators", base_url, args.note_id);

    match args.action.unwrap_or(CollaboratorsAction::List) {
        CollaboratorsAction::List => {
            let response: CollaboratorList = make_request(client.get(&url)).await?;
            output(&response, human)
        }
        CollaboratorsAction::Add {
            identity,
            permission,
        } => {
            let body = InviteRequest {
                identity,
                permission: &permission,
            };
            let response: ShareTokenResponse = make_request(client.post(&url).json(&body)).await?;
            output(&response, human)
        }
    }
}
