//! REVOKE command - Revoke a share link.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::{Deserialize, Serialize};

use super::{HumanReadable, abbreviate, make_request, output};

/// Arguments for the revoke command.
#[derive(Args)]
pub struct RevokeArgs {
    /// Token to revoke
    pub token: String,
}

/// Response from revoking a token.
#[derive(Debug, Deserialize, Serialize)]
pub struct RevokeResponse {
    pub revoked: bool,
    #[serde(skip_deserializing)]
    pub token: String,
}

impl HumanReadable for RevokeResponse {
    fn print_human(&self) {
        println!("{}", "Share link revoked.".green().bold());
        println!();
        println!("  {} {}", "Token:".cyan(), abbreviate(&self.token));
        println!(
            "  {}",
            "Connections already open with this link stay open.".dimmed()
        );
    }
}

/// Execute the revoke command.
pub async fn execute(
    client: &reqwest::Client,
    base_url: &str,
    human: bool,
    args: RevokeArgs,
) -> Result<()> {
    let url = format!("{}/share-tokens/{}", base_url, args.token);
    let mut response: RevokeResponse = make_request(client.delete(&url)).await?;
    response.token = args.token;
    output(&response, human)
}
