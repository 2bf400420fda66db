use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

use chat_client::{Client, ClientConfig, ClientError};
use chat_protocol::{Response, TcpSession};
use chat_server::{Registry, ServerConfig, ServerListener};

const WAIT: Duration = Duration::from_secs(3);

struct TestServer {
    addr: SocketAddr,
    registry: Registry,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

async fn start_server(max_clients: usize) -> TestServer {
    let config = ServerConfig {
        address: "127.0.0.1".into(),
        port: 0,
        max_clients,
        ..ServerConfig::default()
    };

    let listener = ServerListener::bind(config).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let registry = listener.registry();
    let (stop, stopped) = oneshot::channel::<()>();

    let task = tokio::spawn(listener.run_until(async move {
        let _ = stopped.await;
    }));

    TestServer { addr, registry, stop, task }
}

// a running client driven through its input and output channels
struct TestClient {
    input: Option<mpsc::Sender<String>>,
    output: mpsc::Receiver<String>,
    task: JoinHandle<Result<(), ClientError>>,
}

impl TestClient {
    async fn type_line(&self, line: &str) {
        self.input.as_ref().unwrap().send(line.to_owned()).await.unwrap();
    }

    async fn next_line(&mut self) -> String {
        timeout(WAIT, self.output.recv()).await.unwrap().expect("client output closed")
    }

    async fn finished(self) {
        timeout(WAIT, self.task).await.unwrap().unwrap().unwrap();
    }
}

async fn launch(server: &TestServer, user: &str, download_dir: &Path) -> TestClient {
    let mut config = ClientConfig::new(user, "127.0.0.1", server.addr.port());
    config.download_dir = download_dir.to_owned();

    let client = Client::connect(&config).await.unwrap();
    let (input_tx, input_rx) = mpsc::channel(16);
    let (output_tx, output_rx) = mpsc::channel(16);

    TestClient {
        input: Some(input_tx),
        output: output_rx,
        task: tokio::spawn(client.run(input_rx, output_tx)),
    }
}

// launches and waits until the server has admitted the user
async fn launch_joined(server: &TestServer, user: &str, download_dir: &Path) -> TestClient {
    let client = launch(server, user, download_dir).await;
    timeout(WAIT, async {
        while server.registry.lookup(user).await.is_none() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    client
}

#[tokio::test]
async fn message_is_printed_by_recipient() {
    let server = start_server(10).await;
    let dir = tempfile::tempdir().unwrap();
    let a = launch_joined(&server, "A", dir.path()).await;
    let mut b = launch_joined(&server, "B", dir.path()).await;

    a.type_line("msg 1 B hello").await;

    assert_eq!(b.next_line().await, "msg: A: hello");
}

#[tokio::test]
async fn file_is_saved_under_recipient_name() {
    let server = start_server(10).await;
    let outbox = tempfile::tempdir().unwrap();
    let downloads = tempfile::tempdir().unwrap();
    let note = outbox.path().join("note.txt");
    std::fs::write(&note, "hi").unwrap();

    let a = launch_joined(&server, "A", outbox.path()).await;
    let mut b = launch_joined(&server, "B", downloads.path()).await;

    a.type_line(&format!("file 1 B {}", note.display())).await;

    assert_eq!(b.next_line().await, "file: A: note.txt");
    let saved = std::fs::read_to_string(downloads.path().join("B_note.txt")).unwrap();
    assert_eq!(saved, "hi");
}

#[tokio::test]
async fn list_is_sorted_case_insensitively() {
    let server = start_server(10).await;
    let dir = tempfile::tempdir().unwrap();
    let mut cat = launch_joined(&server, "cat", dir.path()).await;
    let _bob = launch_joined(&server, "Bob", dir.path()).await;
    let _ann = launch_joined(&server, "ann", dir.path()).await;

    cat.type_line("list").await;

    assert_eq!(cat.next_line().await, "list: ann Bob cat");
}

#[tokio::test]
async fn taken_username_quits() {
    let server = start_server(10).await;
    let dir = tempfile::tempdir().unwrap();
    let mut first = launch_joined(&server, "bob", dir.path()).await;
    let mut second = launch(&server, "bob", dir.path()).await;

    assert_eq!(second.next_line().await, "disconnected: username not available");
    assert_eq!(second.next_line().await, "quitting");
    second.finished().await;

    // the first bob is still connected
    first.type_line("list").await;
    assert_eq!(first.next_line().await, "list: bob");
}

#[tokio::test]
async fn full_server_quits() {
    let server = start_server(1).await;
    let dir = tempfile::tempdir().unwrap();
    let _ann = launch_joined(&server, "ann", dir.path()).await;
    let mut bob = launch(&server, "bob", dir.path()).await;

    assert_eq!(bob.next_line().await, "disconnected: server full");
    assert_eq!(bob.next_line().await, "quitting");
    bob.finished().await;
}

// The server replies err_server_full and keeps its socket open, so only the
// client's own shutdown can end the run.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rejection_always_stops_the_client() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::spawn(async move {
                let mut session = TcpSession::from_stream(stream).unwrap();
                let _join = session.receive().await;
                session.send(Response::ServerFull).await.unwrap();
                // hold the connection until the client lets go
                let _ = session.receive().await;
            });
        }
    });

    for _ in 0..50 {
        let client = Client::connect(&ClientConfig::new("A", "127.0.0.1", port)).await.unwrap();
        let (input_tx, input_rx) = mpsc::channel(16);
        let (output_tx, mut output_rx) = mpsc::channel(16);

        let run = tokio::spawn(client.run(input_rx, output_tx));

        assert_eq!(timeout(WAIT, output_rx.recv()).await.unwrap().unwrap(), "disconnected: server full");
        assert_eq!(timeout(WAIT, output_rx.recv()).await.unwrap().unwrap(), "quitting");
        timeout(Duration::from_secs(2), run)
            .await
            .expect("client kept running after rejection")
            .unwrap()
            .unwrap();

        drop(input_tx);
    }

    server.abort();
}

#[tokio::test]
async fn bad_input_stays_local() {
    let server = start_server(10).await;
    let dir = tempfile::tempdir().unwrap();
    let mut a = launch_joined(&server, "A", dir.path()).await;
    let mut b = launch_joined(&server, "B", dir.path()).await;

    a.type_line("msg two B hi").await;
    assert_eq!(a.next_line().await, "incorrect userinput format");

    a.type_line("file 1 B /no/such/file.txt").await;
    assert_eq!(a.next_line().await, "Incorrect file path");

    a.type_line("help").await;
    assert_eq!(a.next_line().await, "Available commands:");

    // the session is unaffected
    a.type_line("msg 1 B still here").await;
    assert_eq!(b.next_line().await, "msg: A: still here");
}

#[tokio::test]
async fn quit_sends_disconnect() {
    let server = start_server(10).await;
    let dir = tempfile::tempdir().unwrap();
    let mut a = launch_joined(&server, "A", dir.path()).await;

    a.type_line("quit").await;
    assert_eq!(a.next_line().await, "quitting");
    a.finished().await;

    timeout(WAIT, async {
        while server.registry.lookup("A").await.is_some() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn end_of_input_quits() {
    let server = start_server(10).await;
    let dir = tempfile::tempdir().unwrap();
    let mut a = launch_joined(&server, "A", dir.path()).await;

    a.input.take();

    assert_eq!(a.next_line().await, "quitting");
    a.finished().await;
}

#[tokio::test]
async fn server_shutdown_stops_client() {
    let server = start_server(10).await;
    let dir = tempfile::tempdir().unwrap();
    let a = launch_joined(&server, "A", dir.path()).await;

    server.stop.send(()).unwrap();
    timeout(WAIT, server.task).await.unwrap().unwrap();

    a.finished().await;
}

#[tokio::test]
async fn connect_failure_is_reported() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let config = ClientConfig::new("A", "127.0.0.1", port);
    assert!(matches!(Client::connect(&config).await, Err(ClientError::Connect { .. })));
}
