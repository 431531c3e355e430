//! READ command - Read a note with a session and/or share token.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use notecollab_core::PermissionTier;
use serde::{Deserialize, Serialize};

use super::{HumanReadable, SHARE_TOKEN_HEADER, make_request, output};

/// Arguments for the read command.
#[derive(Args)]
pub struct ReadArgs {
    /// Note ID to read
    pub note_id: i64,

    /// Share token to present
    #[arg(short, long)]
    pub token: Option<String>,
}

/// Response from reading a note.
#[derive(Debug, Deserialize, Serialize)]
pub struct ReadNoteResponse {
    pub note: NoteView,
    pub permission: PermissionTier,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct NoteView {
    pub id: i64,
    pub title: String,
    pub content: String,
}

impl HumanReadable for ReadNoteResponse {
    fn print_human(&self) {
        println!("{}", self.note.title.green().bold());
        println!("{}", "=".repeat(60));
        println!();
        println!("  {} {}", "ID:".cyan(), self.note.id);
        println!("  {} {}", "Permission:".cyan(), self.permission);
        println!();
        println!("{}", "Content:".yellow());
        println!("{}", "-".repeat(60));
        if self.note.content.is_empty() {
            println!("{}", "(empty)".dimmed());
        } else {
            println!("{}", self.note.content);
        }
        println!("{}", "-".repeat(60));
    }
}

/// Execute the read command.
pub async fn execute(
    client: &reqwest::Client,
    base_url: &str,
    human: bool,
    args: ReadArgs,
) -> Result<()> {
    let url = format!("{}/notes/{}", base_url, args.note_id);

    let mut request = client.get(&url);
    if let Some(token) = &args.token {
        request = request.header(SHARE_TOKEN_HEADER, token);
    }

    let response: ReadNoteResponse = make_request(request).await?;
    output(&response, human)
}
