//! End-to-end Server Tests
//!
//! Drive a real server over TCP on an ephemeral port.

use std::io::BufReader;
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;

use fuqldb::network::Server;
use fuqldb::protocol::{read_response, write_frame, Response, Status};
use fuqldb::session::SessionId;
use fuqldb::{Config, Dispatcher, Engine};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

struct Harness {
    _temp: TempDir,
    server: Arc<Server>,
    dispatcher: Option<Dispatcher>,
    runner: Option<thread::JoinHandle<()>>,
}

impl Harness {
    fn start() -> Self {
        let temp = TempDir::new().unwrap();
        let config = Config::builder()
            .storage_path(temp.path())
            .bootstrap_admin("admin", "admin")
            .listen_addr("127.0.0.1:0")
            .build();

        let dispatcher = Dispatcher::spawn(Engine::open(config.clone()).unwrap()).unwrap();
        let server = Arc::new(Server::bind(config, dispatcher.handle()).unwrap());
        let running = Arc::clone(&server);
        let runner = thread::spawn(move || running.run().unwrap());

        Self {
            _temp: temp,
            server,
            dispatcher: Some(dispatcher),
            runner: Some(runner),
        }
    }

    fn client(&self) -> Client {
        let stream = TcpStream::connect(self.server.local_addr().unwrap()).unwrap();
        let writer = stream.try_clone().unwrap();
        Client {
            reader: BufReader::new(stream),
            writer,
            session: None,
        }
    }

    fn stop(mut self) {
        self.server.shutdown();
        if let Some(runner) = self.runner.take() {
            runner.join().unwrap();
        }
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.shutdown().unwrap();
        }
    }
}

struct Client {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    session: Option<SessionId>,
}

impl Client {
    fn open_session(&mut self) -> SessionId {
        write_frame(&mut self.writer, None, "").unwrap();
        let response = read_response(&mut self.reader).unwrap();
        assert!(response.is_ok());
        let id: SessionId = response.payload.unwrap().parse().unwrap();
        self.session = Some(id);
        id
    }

    fn send(&mut self, command: &str) -> Response {
        write_frame(&mut self.writer, self.session.as_ref(), command).unwrap();
        read_response(&mut self.reader).unwrap()
    }

    fn raw(&mut self, bytes: &[u8]) -> Response {
        use std::io::Write;
        self.writer.write_all(bytes).unwrap();
        read_response(&mut self.reader).unwrap()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_full_conversation() {
    let harness = Harness::start();
    let mut client = harness.client();
    client.open_session();

    for command in [
        "login admin admin",
        "tell database to create main",
        "use database main",
        "tell table to create people",
        "use table people",
        "tell entry to create alice,30",
    ] {
        let response = client.send(command);
        assert!(response.is_ok(), "{} -> {}", command, response);
    }

    let response = client.send("tell entry to present alice");
    assert_eq!(response.to_string(), "OK 30");

    let response = client.send("tell entry to present nobody");
    assert_eq!(response.status, Status::NotFound);

    let response = client.send("tell database to present");
    assert_eq!(response.to_string(), "OK users, main");

    harness.stop();
}

#[test]
fn test_error_replies_keep_connection_open() {
    let harness = Harness::start();
    let mut client = harness.client();
    client.open_session();

    assert_eq!(client.send("dance").status, Status::ParseError);
    assert_eq!(client.send("tell entry to create nocomma").status, Status::Malformed);
    assert_eq!(client.send("login admin wrong").status, Status::IncorrectPassword);
    assert_eq!(client.send("tell database to present").status, Status::PermissionDenied);
    assert_eq!(client.raw(b"short\n").status, Status::Malformed);

    assert!(client.send("login admin admin").is_ok());

    harness.stop();
}

#[test]
fn test_unknown_session_rejected_before_parsing() {
    let harness = Harness::start();
    let mut client = harness.client();
    client.session = Some(SessionId::generate());

    // Unparseable text, yet the session problem is what gets reported
    assert_eq!(client.send("gibberish").status, Status::InvalidSession);

    harness.stop();
}

#[test]
fn test_sessions_shared_across_connections() {
    let harness = Harness::start();
    let mut first = harness.client();
    let id = first.open_session();
    assert!(first.send("login admin admin").is_ok());
    assert!(first.send("use database users").is_ok());

    // The session lives in the server, not in the connection
    let mut second = harness.client();
    second.session = Some(id);
    assert_eq!(second.send("tell table to present").to_string(), "OK users");

    harness.stop();
}

#[test]
fn test_many_clients() {
    let harness = Harness::start();
    let addr = harness.server.local_addr().unwrap();

    let mut setup = harness.client();
    setup.open_session();
    for command in [
        "login admin admin",
        "tell database to create main",
        "use database main",
        "tell table to create t",
    ] {
        assert!(setup.send(command).is_ok());
    }

    let clients: Vec<_> = (0..4)
        .map(|n| {
            thread::spawn(move || {
                let stream = TcpStream::connect(addr).unwrap();
                let mut client = Client {
                    writer: stream.try_clone().unwrap(),
                    reader: BufReader::new(stream),
                    session: None,
                };
                client.open_session();
                assert!(client.send("login admin admin").is_ok());
                assert!(client.send("use database main").is_ok());
                assert!(client.send("use table t").is_ok());
                for i in 0..10 {
                    let response = client.send(&format!("tell entry to create c{}_{},v", n, i));
                    assert!(response.is_ok());
                }
            })
        })
        .collect();
    for client in clients {
        client.join().unwrap();
    }

    assert!(setup.send("use table t").is_ok());
    let response = setup.send("tell entry to present where key ^c");
    let payload = response.payload.unwrap();
    assert_eq!(payload.split(", ").count(), 40);

    harness.stop();
}
