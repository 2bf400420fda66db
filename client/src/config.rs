use std::path::PathBuf;

use clap::Parser;

use chat_protocol::{DEFAULT_ADDRESS, DEFAULT_PORT};

/// Chat relay client
#[derive(Debug, Clone, Parser)]
#[command(name = "chat-client", version, about)]
pub struct ClientConfig {
    /// Username to join as
    #[arg(short, long)]
    pub user: String,

    /// Server port
    #[arg(short, long, env = "CHAT_SERVER_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Server address or hostname
    #[arg(short, long, env = "CHAT_SERVER_ADDRESS", default_value = DEFAULT_ADDRESS)]
    pub address: String,

    /// Directory received files are written to
    #[arg(long, default_value = ".")]
    pub download_dir: PathBuf,
}

impl ClientConfig {
    pub fn new(user: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        ClientConfig {
            user: user.into(),
            port,
            address: address.into(),
            download_dir: PathBuf::from("."),
        }
    }

    pub fn server_addr(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }
}
