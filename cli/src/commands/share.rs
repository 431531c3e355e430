//! SHARE command - Mint a share link for a note.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use notecollab_core::PermissionTier;
use serde::{Deserialize, Serialize};

use super::{HumanReadable, make_request, output};

/// Arguments for the share command.
#[derive(Args)]
pub struct ShareArgs {
    /// Note ID to share
    pub note_id: i64,

    /// Permission granted by the link
    #[arg(short, long, default_value = "read", value_parser = ["read", "write", "full"])]
    pub permission: String,
}

#[derive(Serialize)]
struct ShareTokenRequest<'a> {
    permission: &'a str,
}

/// A freshly issued token.
#[derive(Debug, Deserialize, Serialize)]
pub struct ShareTokenResponse {
    pub token: String,
    pub permission: PermissionTier,
}

impl HumanReadable for ShareTokenResponse {
    fn print_human(&self) {
        println!("{}", "Share link created!".green().bold());
        println!();
        println!("  {} {}", "Token:".cyan(), self.token);
        println!("  {} {}", "Permission:".cyan(), self.permission);
    }
}

/// Execute the share command.
pub async fn execute(
    client: &reqwest::Client,
    base_url: &str,
    human: bool,
    args: ShareArgs,
) -> Result<()> {
    let url = format!("{}/notes/{}/share-token", base_url, args.note_id);
    let body = ShareTokenRequest {
        permission: &args.permission,
    };

    let response: ShareTokenResponse = make_request(client.post(&url).json(&body)).await?;
    output(&response, human)
}
