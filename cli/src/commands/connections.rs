//! CONNECTIONS command - Show who is live in a note's room.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use notecollab_core::PermissionTier;
use serde::{Deserialize, Serialize};

use super::{HumanReadable, format_timestamp, make_request, output};

/// Arguments for the connections command.
#[derive(Args)]
pub struct ConnectionsArgs {
    /// Note ID
    pub note_id: i64,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub connection_id: String,
    pub permission: PermissionTier,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(transparent)]
pub struct MemberList(pub Vec<Member>);

impl HumanReadable for MemberList {
    fn print_human(&self) {
        if self.0.is_empty() {
            println!("{}", "(Nobody is connected)".dimmed());
            return;
        }
        for m in &self.0 {
            println!(
                "  {} {:<6} {}",
                m.connection_id.bold(),
                m.permission.to_string(),
                format_timestamp(&m.joined_at).dimmed()
            );
        }
    }
}

/// Execute the connections command.
pub async fn execute(
    client: &reqwest::Client,
    base_url: &str,
    human: bool,
    args: ConnectionsArgs,
) -> Result<()> {
    let url = format!("{}/notes/{}/connections", base_url, args.note_id);
    let response: MemberList = make_request(client.get(&url)).await?;
    output(&response, human)
}
