//! Turns lines typed by the user into commands and requests.
//!
//! ```text
//! msg <n> <user1> .. <userN> <message>
//! file <n> <user1> .. <userN> <file path>
//! list
//! help
//! quit
//! ```

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use chat_protocol::Request;

use crate::types::{Command, InputError};

const HELP_WIDTH: usize = 50;

const HELP: [(&str, &str); 4] = [
    ("msg [num of clients] [clients] [message]", "send message to client(s)"),
    ("file [num of clients] [clients] [file path]", "send file to client(s)"),
    ("list", "get list of connected client(s)"),
    ("quit", "shutdown client"),
];

pub struct InputHandler;

impl InputHandler {
    pub fn parse(line: &str) -> Result<Command, InputError> {
        let mut tokens = line.split(' ');

        match tokens.next().unwrap_or_default() {
            "msg" => {
                let (recipients, rest) = Self::recipients(tokens)?;
                Ok(Command::Message {
                    recipients,
                    text: rest.join(" "),
                })
            },
            "file" => {
                let (recipients, rest) = Self::recipients(tokens)?;
                let path = rest.join(" ");
                if path.is_empty() {
                    return Err(InputError::Format)
                }
                Ok(Command::File {
                    recipients,
                    path: PathBuf::from(path),
                })
            },
            "list" => Ok(Command::List),
            "help" => Ok(Command::Help),
            "quit" => Ok(Command::Quit),
            _ => Err(InputError::Format),
        }
    }

    // <n> <user1> .. <userN>, then whatever follows
    fn recipients<'a, I>(mut tokens: I) -> Result<(Vec<String>, Vec<&'a str>), InputError>
    where
        I: Iterator<Item = &'a str>,
    {
        let count: usize = tokens
            .next()
            .and_then(|n| n.parse().ok())
            .ok_or(InputError::Format)?;

        let recipients: Vec<String> = tokens.by_ref().take(count).map(str::to_owned).collect();
        if recipients.len() < count || recipients.iter().any(String::is_empty) {
            return Err(InputError::Format)
        }

        Ok((recipients, tokens.collect()))
    }

    /// Builds the request for a command that talks to the server.
    ///
    /// `file` reads the whole file here, so a missing or unreadable path is
    /// reported locally and nothing is sent. Local-only commands return None.
    pub async fn to_request(command: Command) -> Result<Option<Request>, InputError> {
        let request = match command {
            Command::Message { recipients, text } => Request::SendMessage { recipients, text },
            Command::File { recipients, path } => {
                let (filename, content) = Self::load_file(&path).await?;
                Request::SendFile { recipients, filename, content }
            },
            Command::List => Request::UsersList,
            Command::Help | Command::Quit => return Ok(None),
        };

        Ok(Some(request))
    }

    pub async fn load_file(path: &Path) -> Result<(String, String), InputError> {
        let unavailable = |source: Option<io::Error>| InputError::FileUnavailable {
            path: path.to_owned(),
            source,
        };

        let metadata = fs::metadata(path).await.map_err(|e| unavailable(Some(e)))?;
        if !metadata.is_file() {
            return Err(unavailable(None))
        }

        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_owned)
            .ok_or_else(|| unavailable(None))?;

        let content = fs::read_to_string(path).await.map_err(|e| unavailable(Some(e)))?;
        debug!("loaded {} ({} bytes)", filename, content.len());

        Ok((filename, content))
    }

    pub fn help() -> Vec<String> {
        let mut lines = vec!["Available commands:".to_owned()];
        lines.extend(HELP.iter().map(|(usage, about)| format!("{:<width$}{}", usage, about, width = HELP_WIDTH)));
        lines
    }
}
