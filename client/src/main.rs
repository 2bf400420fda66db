use std::error::Error;

use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, EnvFilter};

use chat_client::client::Client;
use chat_client::config::ClientConfig;
use chat_client::input_reader::InputReader;
use chat_client::ClientError;

const OUTPUT_LINES: usize = 64;

fn init_tracing() {
    // stdout is reserved for chat output
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .compact()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let config = ClientConfig::parse();

    let client = match Client::connect(&config).await {
        Ok(client) => client,
        Err(e) => {
            println!("quitting");
            return Err(e.into())
        },
    };

    let input = InputReader::spawn().map_err(ClientError::Input)?;
    let (output_tx, mut output_rx) = mpsc::channel::<String>(OUTPUT_LINES);

    let printer = tokio::spawn(async move {
        while let Some(line) = output_rx.recv().await {
            println!("{}", line);
        }
    });

    client.run(input, output_tx).await?;
    printer.await?;

    Ok(())
}
