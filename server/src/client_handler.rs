use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::select;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info};

use chat_protocol::message::JOIN;
use chat_protocol::{ProtocolError, Request, Response, Session, SessionReader, SessionWriter};

use crate::delivery::{Delivery, Payload};
use crate::registry::{ClientEntry, JoinRejection, Registry};
use crate::server_types::{Exit, Outbound, OutboundRx, ShutdownRx, OUTBOUND_QUEUE};

const REPLY_TIMEOUT: Duration = Duration::from_millis(75);

// Handles server communication from one client
// Essentially this models a client actor on the server side
pub struct ClientHandler {
    username: String,
    registry: Registry,
    delivery: Delivery,
    outbound: Outbound,
}

impl ClientHandler {
    /// Runs one connection from handshake to teardown.
    ///
    /// The first frame must be a `join` arriving within `join_timeout`;
    /// anything else closes the connection without a reply. Once admitted the
    /// session's write half moves to its own task and every reply or forward
    /// for this user goes through the outbound queue.
    pub async fn serve<R, W>(session: Session<R, W>, registry: Registry, join_timeout: Duration, mut shutdown: ShutdownRx)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let peer = session.peer_addr();
        let (mut reader, mut writer) = session.into_split();

        let joined = select! {
            joined = timeout(join_timeout, Self::read_join(&mut reader)) => joined,
            _ = shutdown.recv() => {
                writer.close().await;
                return
            },
        };

        let username = match joined {
            Ok(Some(name)) => name,
            Ok(None) => {
                writer.close().await;
                return
            },
            Err(_) => {
                debug!(%peer, "no join within {:?}", join_timeout);
                writer.close().await;
                return
            },
        };

        let (outbound, queue) = mpsc::channel(OUTBOUND_QUEUE);

        if let Err(rejection) = registry.try_join(&username, ClientEntry::new(peer, outbound.clone())).await {
            let reply = match rejection {
                JoinRejection::ServerFull => Response::ServerFull,
                JoinRejection::NameTaken => Response::UsernameUnavailable,
            };
            if let Err(e) = writer.send(reply).await {
                debug!(%peer, error = %e, "unable to send join rejection");
            }
            writer.close().await;
            info!("disconnected: {}", rejection);
            return
        }

        info!("join: {}", username);

        let write_task = tokio::spawn(write_loop(writer, queue));

        let mut handler = ClientHandler {
            username,
            delivery: Delivery::new(&registry),
            registry,
            outbound,
        };

        let exit = handler.handle_read(&mut reader, &mut shutdown).await;
        handler.finish(exit, write_task).await;
    }

    // Wait for the join message, None if the peer sent anything else
    async fn read_join<R: AsyncRead + Unpin>(reader: &mut SessionReader<R>) -> Option<String> {
        let frame = match reader.receive().await {
            Ok(frame) => frame,
            Err(e) => {
                debug!(peer = %reader.peer_addr(), error = %e, "connection ended before join");
                return None
            },
        };

        match Request::try_from(frame) {
            Ok(Request::Join(name)) => Some(name),
            Ok(other) => {
                debug!(peer = %reader.peer_addr(), "expected join, received {}", other.tag());
                None
            },
            Err(e) => {
                debug!(peer = %reader.peer_addr(), error = %e, "expected join");
                None
            },
        }
    }

    // Loop to handle ongoing client msgs to server
    async fn handle_read<R: AsyncRead + Unpin>(&mut self, reader: &mut SessionReader<R>, shutdown: &mut ShutdownRx) -> Exit {
        loop {
            let received = select! {
                received = reader.receive() => received,
                _ = shutdown.recv() => return Exit::Shutdown,
            };

            let frame = match received {
                Ok(frame) => frame,
                Err(e) if e.is_disconnected() => return Exit::Dropped,
                Err(e) => {
                    debug!(user = %self.username, error = %e, "unreadable frame");
                    return Exit::Violation
                },
            };

            match Request::try_from(frame) {
                Ok(Request::SendMessage { recipients, text }) => {
                    info!("msg: {}", self.username);
                    self.relay(&recipients, Payload::Message { text }).await;
                },
                Ok(Request::SendFile { recipients, filename, content }) => {
                    info!("file: {}", self.username);
                    self.relay(&recipients, Payload::File { filename, content }).await;
                },
                Ok(Request::UsersList) => {
                    info!("request_users_list: {}", self.username);
                    let names = self.registry.snapshot_usernames().await.into_iter().collect();
                    if self.outbound.send(Response::UsersList(names)).await.is_err() {
                        return Exit::Dropped
                    }
                },
                Ok(Request::Disconnect(_)) => return Exit::Quit,
                Ok(Request::Join(_)) => return Exit::Violation,
                // a malformed send is dropped, the sender stays joined
                Err(ProtocolError::Malformed { tag, reason }) if tag != JOIN => {
                    debug!(user = %self.username, "ignoring malformed {}: {}", tag, reason);
                },
                Err(e) => {
                    debug!(user = %self.username, error = %e, "rejecting request");
                    return Exit::Violation
                },
            }
        }
    }

    async fn relay(&self, recipients: &[String], payload: Payload) {
        let report = self.delivery.forward(&self.username, recipients, &payload).await;
        debug!(
            user = %self.username,
            delivered = report.delivered.len(),
            missing = report.missing.len(),
            dropped = report.dropped.len(),
            "{} relayed",
            payload.label()
        );
    }

    // process client disconnection event
    async fn finish(self, exit: Exit, write_task: JoinHandle<()>) {
        let ClientHandler { username, registry, outbound, .. } = self;

        if exit == Exit::Violation {
            if let Err(e) = outbound.send_timeout(Response::UnknownMessage, REPLY_TIMEOUT).await {
                debug!(user = %username, error = %e, "unable to queue err_unknown_message");
            }
        }

        // whoever takes the entry out of the registry announces the disconnect
        if registry.remove(&username).await.is_some() {
            match exit {
                Exit::Violation => info!("disconnected: {} sent unknown command", username),
                Exit::Quit | Exit::Dropped | Exit::Shutdown => info!("disconnected: {}", username),
            }
        } else {
            debug!(user = %username, ?exit, "disconnect already announced");
        }

        // writer drains what is queued then closes once every sender is gone
        drop(outbound);
        if let Err(e) = write_task.await {
            debug!(user = %username, error = %e, "writer task failed");
        }
    }
}

async fn write_loop<W: AsyncWrite + Unpin>(mut writer: SessionWriter<W>, mut queue: OutboundRx) {
    while let Some(response) = queue.recv().await {
        if let Err(e) = writer.send(response).await {
            debug!(peer = %writer.peer_addr(), error = %e, "dropping outbound queue");
            break
        }
    }
    writer.close().await;
}
