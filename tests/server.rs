//! End-to-end tests over a real TCP socket

use cash::config::{EngineConfig, ServerConfig};
use cash::engine::Engine;
use cash::metrics::Metrics;
use cash::server::Server;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct TestServer {
    addr: SocketAddr,
    engine: Engine,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    fn server_config() -> ServerConfig {
        ServerConfig {
            listen_addr: "127.0.0.1:0".to_string(),
            max_message_size: 64,
            ..ServerConfig::default()
        }
    }

    async fn start(engine_config: EngineConfig) -> Self {
        Self::start_with(Self::server_config(), engine_config).await
    }

    async fn start_with(server_config: ServerConfig, engine_config: EngineConfig) -> Self {
        let metrics = Arc::new(Metrics::new());
        let cancel = CancellationToken::new();
        let (engine, _) = Engine::start(&engine_config, Arc::clone(&metrics), cancel.clone())
            .expect("engine should start");

        let server = Arc::new(Server::new(
            server_config,
            engine.clone(),
            Arc::clone(&metrics),
            cancel.clone(),
        ));
        let listener = server.bind().await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(Arc::clone(&server).serve(listener));

        Self {
            addr,
            engine,
            metrics,
            cancel,
            handle,
        }
    }

    async fn in_memory() -> Self {
        Self::start(EngineConfig::in_memory()).await
    }

    async fn connect(&self) -> Client {
        let stream = TcpStream::connect(self.addr).await.expect("connect");
        let (reader, writer) = stream.into_split();
        Client {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn stop(self) {
        self.cancel.cancel();
        self.handle.await.expect("join").expect("serve");
        self.engine.shutdown().await;
    }
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn send(&mut self, raw: &str) {
        self.writer.write_all(raw.as_bytes()).await.expect("write");
    }

    async fn read_line(&mut self) -> String {
        let mut line = String::new();
        tokio::time::timeout(Duration::from_secs(5), self.reader.read_line(&mut line))
            .await
            .expect("response in time")
            .expect("read");
        line
    }

    /// Send one message and collect `lines` response lines
    async fn request(&mut self, message: &str, lines: usize) -> Vec<String> {
        self.send(&format!("{message}\n")).await;
        let mut out = Vec::with_capacity(lines);
        for _ in 0..lines {
            out.push(self.read_line().await);
        }
        out
    }
}

#[tokio::test]
async fn test_set_then_get_in_one_message() {
    let server = TestServer::in_memory().await;
    let mut client = server.connect().await;

    assert_eq!(client.request("SET a 1;GET a", 2).await, ["OK\n", "1\n"]);

    server.stop().await;
}

#[tokio::test]
async fn test_missing_key_reports_error_and_continues() {
    let server = TestServer::in_memory().await;
    let mut client = server.connect().await;

    assert_eq!(
        client.request("GET nope;SET k v;GET k", 3).await,
        [
            "ERROR 'key does not exist' MESSAGE 'key 'nope' does not exist'\n",
            "OK\n",
            "v\n"
        ]
    );

    server.stop().await;
}

#[tokio::test]
async fn test_parse_error_rejects_whole_message() {
    let server = TestServer::in_memory().await;
    let mut client = server.connect().await;

    assert_eq!(
        client.request("SET a 1;FLY away", 1).await,
        ["ERROR 'parse error' MESSAGE 'invalid operation 'FLY''\n"]
    );

    // Nothing from the rejected message was applied
    assert_eq!(
        client.request("GET a", 1).await,
        ["ERROR 'key does not exist' MESSAGE 'key 'a' does not exist'\n"]
    );
    assert_eq!(server.metrics.protocol_errors.get(), 1);

    server.stop().await;
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let server = TestServer::in_memory().await;
    let mut client = server.connect().await;

    assert_eq!(
        client.request("SET a 1;DELETE a;DELETE a;DELETE never", 4).await,
        ["OK\n", "OK\n", "OK\n", "OK\n"]
    );

    server.stop().await;
}

#[tokio::test]
async fn test_invalid_requests() {
    let server = TestServer::in_memory().await;
    let mut client = server.connect().await;

    let lines = client.request("EXPIRES a soon;GET;SET a", 3).await;
    for line in &lines {
        assert!(line.starts_with("ERROR 'invalid request' MESSAGE '"), "{line}");
    }

    server.stop().await;
}

#[tokio::test]
async fn test_expired_key() {
    let server = TestServer::in_memory().await;
    let mut client = server.connect().await;

    assert_eq!(
        client.request("SET a 1;EXPIRES a 0;GET a;GET a", 4).await,
        [
            "OK\n",
            "OK\n",
            "ERROR 'expired key' MESSAGE 'key 'a' has expired'\n",
            "ERROR 'key does not exist' MESSAGE 'key 'a' does not exist'\n"
        ]
    );

    server.stop().await;
}

#[tokio::test]
async fn test_compressed_value() {
    let server = TestServer::in_memory().await;
    let mut client = server.connect().await;

    assert_eq!(
        client.request("set big hello-hello-hello compress;get big", 2).await,
        ["OK\n", "hello-hello-hello\n"]
    );

    server.stop().await;
}

#[tokio::test]
async fn test_pipelined_messages_and_crlf() {
    let server = TestServer::in_memory().await;
    let mut client = server.connect().await;

    client.send("SET a 1\r\nSET b 2\nGET a; GET b ;\r\n").await;
    let mut lines = Vec::new();
    for _ in 0..4 {
        lines.push(client.read_line().await);
    }
    assert_eq!(lines, ["OK\n", "OK\n", "1\n", "2\n"]);

    server.stop().await;
}

#[tokio::test]
async fn test_oversized_message() {
    let server = TestServer::in_memory().await;
    let mut client = server.connect().await;

    client.send(&format!("{}\n", "x".repeat(100))).await;
    assert_eq!(
        client.read_line().await,
        "ERROR 'parse error' MESSAGE 'message exceeds 64 bytes'\n"
    );

    // The connection stays usable
    assert_eq!(client.request("SET a 1", 1).await, ["OK\n"]);

    server.stop().await;
}

#[tokio::test]
async fn test_unterminated_message_served_at_eof() {
    let server = TestServer::in_memory().await;
    let mut client = server.connect().await;

    client.send("SET a 1;GET a").await;
    client.writer.shutdown().await.expect("shutdown write");

    assert_eq!(client.read_line().await, "OK\n");
    assert_eq!(client.read_line().await, "1\n");

    server.stop().await;
}

#[tokio::test]
async fn test_clients_share_state() {
    let server = TestServer::in_memory().await;
    let mut first = server.connect().await;
    let mut second = server.connect().await;

    assert_eq!(first.request("SET shared yes", 1).await, ["OK\n"]);
    assert_eq!(second.request("GET shared", 1).await, ["yes\n"]);

    server.stop().await;
}

#[tokio::test]
async fn test_client_over_limit_is_refused() {
    let config = ServerConfig {
        max_connections: 1,
        ..TestServer::server_config()
    };
    let server = TestServer::start_with(config, EngineConfig::in_memory()).await;

    let mut first = server.connect().await;
    assert_eq!(first.request("SET a 1", 1).await, ["OK\n"]);

    let mut second = server.connect().await;
    assert_eq!(
        second.read_line().await,
        "ERROR 'server error' MESSAGE 'too many connections'\n"
    );
    assert_eq!(server.metrics.rejected_connections.get(), 1);

    // The admitted client is unaffected
    assert_eq!(first.request("GET a", 1).await, ["1\n"]);

    server.stop().await;
}

#[tokio::test]
async fn test_listener_closes_when_engine_stops() {
    let server = TestServer::in_memory().await;
    let mut client = server.connect().await;
    assert_eq!(client.request("SET a 1", 1).await, ["OK\n"]);

    server.engine.shutdown().await;

    // Connected clients get a server error instead of a hang
    assert_eq!(
        client.request("GET a", 1).await,
        ["ERROR 'server error' MESSAGE 'Engine is not running'\n"]
    );

    let TestServer { handle, cancel, .. } = server;
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("listener should close")
        .expect("join")
        .expect("serve");
    cancel.cancel();
}

async fn restart_with_log(path: &Path, message: &str, lines: usize) -> Vec<String> {
    let config = EngineConfig {
        log_path: Some(path.to_path_buf()),
        ..EngineConfig::default()
    };
    let server = TestServer::start(config).await;
    let mut client = server.connect().await;
    let response = client.request(message, lines).await;
    server.stop().await;
    response
}

#[tokio::test]
async fn test_data_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.cashlog");

    assert_eq!(
        restart_with_log(&path, "SET a 1;SET b 2;DELETE b;SET c zip COMPRESS", 4).await,
        ["OK\n", "OK\n", "OK\n", "OK\n"]
    );

    assert_eq!(
        restart_with_log(&path, "GET a;GET b;GET c", 3).await,
        [
            "1\n",
            "ERROR 'key does not exist' MESSAGE 'key 'b' does not exist'\n",
            "zip\n"
        ]
    );
}
