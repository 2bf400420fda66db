use tokio::net::tcp;
use tokio::select;
use tokio::sync::broadcast::{self, Receiver as BReceiver, Sender as BSender};
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use chat_protocol::{Request, Response, SessionReader, SessionWriter, TcpSession};

use crate::config::ClientConfig;
use crate::inbox::{Inbound, Inbox};
use crate::input_handler::InputHandler;
use crate::types::{ClientError, Command};

const SHUTDOWN: u8 = 1;
const QUITTING: &str = "quitting";
const REQUEST_QUEUE: usize = 64;

pub struct Client {
    username: String,
    session: TcpSession,
    inbox: Inbox,
}

impl Client {
    pub async fn connect(config: &ClientConfig) -> Result<Client, ClientError> {
        let addr = config.server_addr();
        info!("Client starting, connecting to server {:?}", &addr);

        let session = TcpSession::connect(&addr)
            .await
            .map_err(|source| ClientError::Connect { addr, source })?;

        Ok(Client {
            inbox: Inbox::new(config.user.clone(), config.download_dir.clone()),
            username: config.user.clone(),
            session,
        })
    }

    /// Joins, then runs until the user quits or the server ends the session.
    ///
    /// `input` carries raw command lines and closes at end of input. Every
    /// line meant for the user is sent to `output`.
    pub async fn run(self, input: Receiver<String>, output: Sender<String>) -> Result<(), ClientError> {
        let Client { username, session, inbox } = self;
        let (reader, mut writer) = session.into_split();

        writer.send(Request::Join(username.clone())).await?;

        // receivers exist before any task can send shutdown
        let (shutdown_tx, _) = broadcast::channel::<u8>(4);
        let cmd_shutdown_rx = shutdown_tx.subscribe();
        let read_shutdown_rx = shutdown_tx.subscribe();
        let (local_tx, local_rx) = mpsc::channel::<Request>(REQUEST_QUEUE);
        let mut tasks = JoinSet::new();

        tasks.spawn(Self::cmd_line_loop(username, input, local_tx, output.clone(), shutdown_tx.clone(), cmd_shutdown_rx));
        tasks.spawn(Self::read_loop(reader, inbox, output, shutdown_tx.clone(), read_shutdown_rx));
        tasks.spawn(Self::write_loop(writer, local_rx, shutdown_tx));

        while let Some(finished) = tasks.join_next().await {
            if let Err(e) = finished {
                error!("client task failed: {}", e);
            }
        }

        info!("client stopped");
        Ok(())
    }

    // Reads user commands and queues their requests for the write task
    async fn cmd_line_loop(
        username: String,
        mut input: Receiver<String>,
        local_tx: Sender<Request>,
        output: Sender<String>,
        shutdown_tx: BSender<u8>,
        mut shutdown_rx: BReceiver<u8>,
    ) {
        loop {
            let line = select! {
                biased;
                _ = shutdown_rx.recv() => {
                    debug!("cmd line task received shutdown");
                    break
                },
                line = input.recv() => line,
            };

            // end of input quits the same way the quit command does
            let command = match line {
                Some(line) => InputHandler::parse(&line),
                None => Ok(Command::Quit),
            };

            match command {
                Ok(Command::Quit) => {
                    info!("Session terminated by user...");
                    let _ = local_tx.send(Request::Disconnect(username.clone())).await;
                    let _ = output.send(QUITTING.to_owned()).await;
                    let _ = shutdown_tx.send(SHUTDOWN);
                    break
                },
                Ok(Command::Help) => {
                    for line in InputHandler::help() {
                        let _ = output.send(line).await;
                    }
                },
                Ok(command) => match InputHandler::to_request(command).await {
                    Ok(Some(request)) => {
                        if local_tx.send(request).await.is_err() {
                            break
                        }
                    },
                    Ok(None) => {},
                    Err(e) => {
                        debug!("input rejected: {:?}", e);
                        let _ = output.send(e.to_string()).await;
                    },
                },
                Err(e) => {
                    let _ = output.send(e.to_string()).await;
                },
            }
        }
        // dropping local_tx lets the write task drain and close
    }

    // Reads server responses until an error response, disconnect or shutdown
    async fn read_loop(
        mut reader: SessionReader<tcp::OwnedReadHalf>,
        inbox: Inbox,
        output: Sender<String>,
        shutdown_tx: BSender<u8>,
        mut shutdown_rx: BReceiver<u8>,
    ) {
        loop {
            let received = select! {
                received = reader.receive() => received,
                _ = shutdown_rx.recv() => {
                    debug!("read task received shutdown");
                    return
                },
            };

            let frame = match received {
                Ok(frame) => frame,
                Err(e) => {
                    debug!("server connection closing: {}", e);
                    break
                },
            };

            let response = match Response::try_from(frame) {
                Ok(response) => response,
                Err(e) => {
                    debug!("ignoring server message: {}", e);
                    continue
                },
            };

            match inbox.accept(response).await {
                Inbound::Show(line) => {
                    let _ = output.send(line).await;
                },
                Inbound::Terminate(line) => {
                    let _ = output.send(line).await;
                    let _ = output.send(QUITTING.to_owned()).await;
                    break
                },
            }
        }

        // no receivers left just means everyone is already gone
        let _ = shutdown_tx.send(SHUTDOWN);
    }

    // Sole owner of the socket's write half
    async fn write_loop(
        mut writer: SessionWriter<tcp::OwnedWriteHalf>,
        mut local_rx: Receiver<Request>,
        shutdown_tx: BSender<u8>,
    ) {
        while let Some(request) = local_rx.recv().await {
            if let Err(e) = writer.send(request).await {
                debug!("unable to write to server: {}", e);
                let _ = shutdown_tx.send(SHUTDOWN);
                break
            }
        }

        writer.close().await;
    }
}
