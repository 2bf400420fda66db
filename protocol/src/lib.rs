//! Wire protocol shared by the chat server and client.
//!
//! - [`message`] the space-token message layout plus typed requests/responses
//! - [`codec`] length-prefixed framing on top of tokio-util's codec traits
//! - [`session`] a framed connection with send/receive/close

pub mod codec;
pub mod error;
pub mod message;
pub mod session;

pub use codec::{ChatCodec, MAX_FRAME_LEN};
pub use error::{ProtocolError, SessionError};
pub use message::{Frame, Request, Response};
pub use session::{Session, SessionReader, SessionWriter, TcpSession};

pub const DEFAULT_PORT: u16 = 15000;
pub const DEFAULT_ADDRESS: &str = "localhost";
