mod types;

// io
pub mod input_handler;
pub mod input_reader;

// server responses
pub mod inbox;

// client
pub mod client;
pub mod config;

pub use client::Client;
pub use config::ClientConfig;
pub use types::{ClientError, Command, InputError};
