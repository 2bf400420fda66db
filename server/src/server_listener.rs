use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::select;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use chat_protocol::TcpSession;

use crate::client_handler::ClientHandler;
use crate::config::ServerConfig;
use crate::registry::Registry;
use crate::server_types::ShutdownTx;

// how long handlers get to release their sockets once shutdown is signalled
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

pub struct ServerListener {
    listener: TcpListener,
    registry: Registry,
    config: ServerConfig,
}

impl ServerListener {
    pub async fn bind(config: ServerConfig) -> io::Result<Self> {
        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr).await?;
        info!("Server starting.. {}", &addr);

        Ok(ServerListener {
            listener,
            registry: Registry::new(config.max_clients),
            config,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn registry(&self) -> Registry {
        self.registry.clone()
    }

    pub async fn run_until_ctrl_c(self) {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("unable to listen for ctrl-c: {}", e);
                // without a signal handler only the process kill stops the server
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Accepts connections until `shutdown` resolves.
    ///
    /// Each accepted socket gets its own handler task; this loop never waits
    /// on a client.
    pub async fn run_until<F: Future<Output = ()>>(self, shutdown: F) {
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let mut handlers = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((tcp_socket, addr)) => {
                        debug!("Server received new client connection {:?}", &addr);

                        let session = match TcpSession::from_stream(tcp_socket) {
                            Ok(session) => session,
                            Err(e) => {
                                warn!("dropping connection from {}: {}", addr, e);
                                continue
                            },
                        };

                        handlers.spawn(ClientHandler::serve(
                            session,
                            self.registry.clone(),
                            self.config.join_timeout(),
                            shutdown_tx.subscribe(),
                        ));
                    },
                    // transient, e.g. out of file descriptors
                    Err(e) => warn!("accept failed: {}", e),
                },
                Some(finished) = handlers.join_next(), if !handlers.is_empty() => {
                    if let Err(e) = finished {
                        error!("client handler failed: {}", e);
                    }
                },
            }
        }

        self.shutdown(shutdown_tx, handlers).await;
    }

    async fn shutdown(&self, shutdown_tx: ShutdownTx, mut handlers: JoinSet<()>) {
        // handlers that exit after this find nothing to remove and stay quiet
        for username in self.registry.drain().await {
            info!("disconnected: {}", username);
        }

        // no receivers just means no handler is running
        let _ = shutdown_tx.send(());

        let drained = timeout(SHUTDOWN_GRACE, async {
            while handlers.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            debug!("aborting {} client handlers", handlers.len());
            handlers.abort_all();
            while handlers.join_next().await.is_some() {}
        }

        info!("Server stopped");
    }
}
