use std::time::Duration;

use clap::Parser;

use chat_protocol::{DEFAULT_ADDRESS, DEFAULT_PORT};

pub const MAX_NUM_CLIENTS: usize = 10;
pub const JOIN_TIMEOUT_SECS: u64 = 10;

/// Chat relay server
#[derive(Debug, Clone, Parser)]
#[command(name = "chat-server", version, about)]
pub struct ServerConfig {
    /// Port to listen on
    #[arg(short, long, env = "CHAT_SERVER_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address or hostname to bind
    #[arg(short, long, env = "CHAT_SERVER_ADDRESS", default_value = DEFAULT_ADDRESS)]
    pub address: String,

    /// Maximum number of concurrently joined users
    #[arg(long, env = "CHAT_MAX_CLIENTS", default_value_t = MAX_NUM_CLIENTS)]
    pub max_clients: usize,

    /// Seconds a new connection has to send its join
    #[arg(long, default_value_t = JOIN_TIMEOUT_SECS)]
    pub join_timeout_secs: u64,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        // bare ipv6 literals need brackets before the port
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: DEFAULT_PORT,
            address: DEFAULT_ADDRESS.to_owned(),
            max_clients: MAX_NUM_CLIENTS,
            join_timeout_secs: JOIN_TIMEOUT_SECS,
        }
    }
}
