use std::collections::{BTreeSet, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::Mutex;

use chat_protocol::Response;

use crate::server_types::Outbound;

// Write handle of an admitted session, frames queued here reach its socket in order
#[derive(Debug, Clone)]
pub struct ClientEntry {
    addr: SocketAddr,
    outbound: Outbound,
}

impl ClientEntry {
    pub fn new(addr: SocketAddr, outbound: Outbound) -> Self {
        Self { addr, outbound }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    // Never waits on the recipient, a full queue drops the frame
    pub fn deliver(&self, response: Response) -> Queued {
        match self.outbound.try_send(response) {
            Ok(()) => Queued::Yes,
            Err(TrySendError::Full(_)) => Queued::Full,
            Err(TrySendError::Closed(_)) => Queued::Closed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Queued {
    Yes,
    Full,   // recipient is not keeping up
    Closed, // recipient's writer has gone away
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum JoinRejection {
    #[error("server full")]
    ServerFull,
    #[error("username not available")]
    NameTaken,
}

/// Username -> session map shared by every client handler.
///
/// All operations take the same lock exactly once, so `try_join` is an atomic
/// check-and-insert and `snapshot_usernames` never observes a half-applied
/// join or removal.
#[derive(Clone)]
pub struct Registry {
    clients: Arc<Mutex<HashMap<String, ClientEntry>>>,
    capacity: usize,
}

impl Registry {
    pub fn new(capacity: usize) -> Self {
        Registry {
            clients: Arc::new(Mutex::new(HashMap::new())),
            capacity,
        }
    }

    pub async fn try_join(&self, username: &str, entry: ClientEntry) -> Result<(), JoinRejection> {
        let mut clients = self.clients.lock().await;

        if clients.len() >= self.capacity {
            return Err(JoinRejection::ServerFull)
        }

        if clients.contains_key(username) {
            return Err(JoinRejection::NameTaken)
        }

        clients.insert(username.to_owned(), entry);
        Ok(())
    }

    pub async fn remove(&self, username: &str) -> Option<ClientEntry> {
        self.clients.lock().await.remove(username)
    }

    pub async fn lookup(&self, username: &str) -> Option<ClientEntry> {
        self.clients.lock().await.get(username).cloned()
    }

    pub async fn snapshot_usernames(&self) -> BTreeSet<String> {
        self.clients.lock().await.keys().cloned().collect()
    }

    // Empties the registry in one step, returning the removed names sorted
    pub async fn drain(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clients.lock().await.drain().map(|(name, _)| name).collect();
        names.sort();
        names
    }

    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }
}
