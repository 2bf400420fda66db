pub mod client_handler;
pub mod config;
pub mod delivery;
pub mod registry;
pub mod server_listener;
pub mod server_types;

pub use config::ServerConfig;
pub use registry::{JoinRejection, Registry};
pub use server_listener::ServerListener;
