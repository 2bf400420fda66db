use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use chat_protocol::Response;

// What the receive task does with one server message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Show(String),
    // print the notice then shut the client down
    Terminate(String),
}

// Renders server responses for display and stores received files
pub struct Inbox {
    username: String,
    download_dir: PathBuf,
}

impl Inbox {
    pub fn new(username: impl Into<String>, download_dir: impl Into<PathBuf>) -> Self {
        Inbox {
            username: username.into(),
            download_dir: download_dir.into(),
        }
    }

    pub async fn accept(&self, response: Response) -> Inbound {
        match response {
            Response::ServerFull => Inbound::Terminate("disconnected: server full".into()),
            Response::UsernameUnavailable => Inbound::Terminate("disconnected: username not available".into()),
            Response::UnknownMessage => Inbound::Terminate("disconnected: server received an unknown command".into()),
            Response::ForwardMessage { sender, text } => Inbound::Show(format!("msg: {}: {}", sender, text)),
            Response::ForwardFile { sender, filename, content } => {
                // the line is still shown if the file cannot be written
                if let Err(e) = self.save(&filename, &content).await {
                    warn!("unable to save {} from {}: {}", filename, sender, e);
                }
                Inbound::Show(format!("file: {}: {}", sender, filename))
            },
            Response::UsersList(mut names) => {
                names.sort_by_key(|name| name.to_lowercase());
                Inbound::Show(format!("list: {}", names.join(" ")))
            },
        }
    }

    // <download_dir>/<own username>_<base name>, overwritten if present
    pub fn download_path(&self, filename: &str) -> Option<PathBuf> {
        let base = Path::new(filename).file_name()?.to_str()?;
        Some(self.download_dir.join(format!("{}_{}", self.username, base)))
    }

    async fn save(&self, filename: &str, content: &str) -> std::io::Result<()> {
        let path = self.download_path(filename).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "no usable file name")
        })?;

        fs::write(&path, content).await?;
        debug!("saved {}", path.display());
        Ok(())
    }
}
