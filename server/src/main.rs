use std::error::Error;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use chat_server::config::ServerConfig;
use chat_server::server_listener::ServerListener;

fn init_tracing() {
    // protocol lines (join, msg, disconnected ..) are logged at info
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .compact()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let config = ServerConfig::parse();
    let listener = ServerListener::bind(config).await?;

    listener.run_until_ctrl_c().await;

    Ok(())
}
