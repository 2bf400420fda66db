use tokio::sync::{broadcast, mpsc};

use chat_protocol::Response;

// server type definitions

// per-session queue drained by that session's writer task
pub type Outbound = mpsc::Sender<Response>;
pub type OutboundRx = mpsc::Receiver<Response>;

pub type ShutdownTx = broadcast::Sender<()>;
pub type ShutdownRx = broadcast::Receiver<()>;

pub const OUTBOUND_QUEUE: usize = 64;

// why an admitted session's read loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Quit,      // client sent disconnect
    Dropped,   // transport closed or failed
    Violation, // unknown command or bad frame
    Shutdown,  // server is going down
}
