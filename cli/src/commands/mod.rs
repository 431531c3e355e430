//! Command implementations for the notecollab CLI.
//!
//! Each command module provides:
//! - Args struct for clap argument parsing
//! - execute() function that performs the command
//! - Human-readable and JSON output formatting

pub mod collaborators;
pub mod connect;
pub mod connections;
pub mod read;
pub mod revoke;
pub mod share;

use anyhow::Result;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;

/// Header carrying a share token.
pub const SHARE_TOKEN_HEADER: &str = "x-share-token";

/// Header carrying a raw user id on dev servers.
pub const DEV_USER_HEADER: &str = "x-user-id";

/// Common error type for HTTP requests.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },
}

/// Who the CLI acts as.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub session: Option<String>,
    pub user: Option<i64>,
}

impl Credentials {
    /// Headers identifying the caller, for both HTTP and WebSocket requests.
    pub fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        if let Some(session) = &self.session {
            let value = HeaderValue::from_str(&format!("Bearer {}", session))
                .map_err(|e| anyhow::anyhow!("Invalid session value: {}", e))?;
            headers.insert(AUTHORIZATION, value);
        }
        if let Some(user) = self.user {
            headers.insert(
                HeaderName::from_static(DEV_USER_HEADER),
                HeaderValue::from(user),
            );
        }

        Ok(headers)
    }
}

/// Build an HTTP client that sends the caller's credentials.
pub fn build_client(credentials: &Credentials) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .default_headers(credentials.headers()?)
        .build()?)
}

/// Print output in JSON or human-readable format.
pub fn output<T: Serialize + HumanReadable>(value: &T, human: bool) -> Result<()> {
    if human {
        value.print_human();
    } else {
        println!("{}", serde_json::to_string_pretty(value)?);
    }
    Ok(())
}

/// Trait for types that can be printed in human-readable format.
pub trait HumanReadable {
    fn print_human(&self);
}

/// Make an HTTP request and handle common error cases.
pub async fn make_request<T: serde::de::DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, CliError> {
    let response = request.send().await?;
    let status = response.status();

    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let body = response.text().await.unwrap_or_default();
    Err(CliError::Server {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// Pull `error.message` out of a JSON error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            json.pointer("/error/message")
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

/// Format a timestamp for human display.
pub fn format_timestamp(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Shorten a token for display.
pub fn abbreviate(token: &str) -> String {
    match token.char_indices().nth(8) {
        Some((end, _)) => format!("{}…", &token[..end]),
        None => token.to_string(),
    }
}
