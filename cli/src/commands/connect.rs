//! CONNECT command - Join a note's room.
//!
//! Every line read from stdin is published as an edit whose payload is the
//! line's text. The line `/flush` asks the server to persist right away.
//! Frames from the server are printed as they arrive.

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use futures::{SinkExt, StreamExt};
use notecollab_core::{ClientFrame, EditFrame, ServerFrame};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;

use super::{Credentials, SHARE_TOKEN_HEADER};

/// Arguments for the connect command.
#[derive(Args)]
pub struct ConnectArgs {
    /// Note ID whose room to join
    pub note_id: i64,

    /// Share token to present
    #[arg(short, long)]
    pub token: Option<String>,
}

/// Turn the HTTP base URL into the room's WebSocket URL.
fn socket_url(base_url: &str, note_id: i64) -> Result<String> {
    let base = base_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        bail!("Server URL must start with http:// or https://: {}", base_url);
    };
    Ok(format!("{}/collaborate/{}", base, note_id))
}

/// The frame to send for one line of input, if any.
fn frame_for_line(line: &str) -> Option<ClientFrame> {
    let line = line.trim_end_matches(['\r', '\n']);
    match line {
        "" => None,
        "/flush" => Some(ClientFrame::Flush),
        text => Some(ClientFrame::Edit(EditFrame {
            payload: serde_json::Value::String(text.to_string()),
        })),
    }
}

fn print_frame(frame: &ServerFrame, human: bool) -> Result<()> {
    if !human {
        println!("{}", serde_json::to_string(frame)?);
        return Ok(());
    }

    match frame {
        ServerFrame::Joined(joined) => println!(
            "{} note {} as {} ({})",
            "Joined".green().bold(),
            joined.note_id,
            joined.connection_id,
            joined.permission
        ),
        ServerFrame::Edit(edit) => {
            let text = match &edit.payload {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            println!("{} {}", format!("[{}]", edit.sequence).cyan(), text);
        }
        ServerFrame::Error(error) => println!(
            "{} {}: {}",
            "Error".red().bold(),
            error.code,
            error.message
        ),
    }
    Ok(())
}

/// Execute the connect command.
pub async fn execute(
    credentials: &Credentials,
    base_url: &str,
    human: bool,
    args: ConnectArgs,
) -> Result<()> {
    let mut request = socket_url(base_url, args.note_id)?.into_client_request()?;
    let headers = request.headers_mut();
    for (name, value) in credentials.headers()?.iter() {
        headers.insert(name.clone(), value.clone());
    }
    if let Some(token) = &args.token {
        headers.insert(SHARE_TOKEN_HEADER, HeaderValue::from_str(token)?);
    }

    let (socket, _) = connect_async(request).await?;
    let (mut sink, mut stream) = socket.split();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => {
                    if let Some(frame) = frame_for_line(&line) {
                        let text = serde_json::to_string(&frame)?;
                        sink.send(Message::Text(text.into())).await?;
                    }
                }
                None => {
                    stdin_open = false;
                    sink.send(Message::Close(None)).await?;
                }
            },
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let frame: ServerFrame = serde_json::from_str(text.as_str())?;
                    print_frame(&frame, human)?;
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.as_str().to_string()))
                        .unwrap_or((1000, String::new()));
                    return match code {
                        1000 | 1001 => {
                            if human {
                                println!("{} ({} {})", "Disconnected".yellow(), code, reason);
                            }
                            Ok(())
                        }
                        _ => bail!("Connection closed by server ({}): {}", code, reason),
                    };
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_url() {
        assert_eq!(
            socket_url("http://localhost:5000", 7).unwrap(),
            "ws://localhost:5000/collaborate/7"
        );
        assert_eq!(
            socket_url("https://notes.example/", 3).unwrap(),
            "wss://notes.example/collaborate/3"
        );
        assert!(socket_url("ftp://notes.example", 3).is_err());
    }

    #[test]
    fn test_frame_for_line() {
        assert_eq!(frame_for_line("/flush"), Some(ClientFrame::Flush));
        assert_eq!(frame_for_line(""), None);
        assert_eq!(
            frame_for_line("hello\r"),
            Some(ClientFrame::Edit(EditFrame {
                payload: serde_json::json!("hello")
            }))
        );
    }
}
