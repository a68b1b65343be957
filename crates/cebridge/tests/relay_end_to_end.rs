#![cfg(unix)]

use std::net::{SocketAddr, TcpStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use cebridge::frame::{EnvelopeReader, EnvelopeWriter};
use cebridge::relay::{FnConnector, RelayServer, ServerConfig, ShutdownHandle};
use cebridge::transport::{LocalChannel, TransportError, UnixDomainSocket};
use cebridge::{ClientConfig, CommandSurface, RelayClient, RelayError};
use serde_json::{json, Map, Value};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "cebridge-e2e-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

/// Mock instrument on a Unix socket. `respond` gets the handle number
/// (1-based, per accepted channel handle) and the request body.
fn spawn_instrument<F>(path: &PathBuf, respond: F)
where
    F: Fn(usize, &Value) -> Vec<u8> + Send + Sync + 'static,
{
    let socket = UnixDomainSocket::bind(path).expect("instrument socket should bind");
    let respond = Arc::new(respond);
    thread::spawn(move || {
        let mut handles = 0usize;
        while let Ok(mut stream) = socket.accept() {
            handles += 1;
            let handle_no = handles;
            let respond = Arc::clone(&respond);
            thread::spawn(move || loop {
                let Ok(request) = EnvelopeReader::new(&mut stream).read_envelope() else {
                    break;
                };
                let request: Value =
                    serde_json::from_slice(request.body()).expect("request should be JSON");
                let body = respond(handle_no, &request);
                if EnvelopeWriter::new(&mut stream).send(&body).is_err() {
                    break;
                }
            });
        }
    });
}

fn start_server(channel: LocalChannel) -> (SocketAddr, ShutdownHandle) {
    let server = RelayServer::bind_with_connector(&ServerConfig::new("127.0.0.1", 0), channel)
        .expect("relay server should bind");
    let addr = server.local_addr();
    let handle = server.shutdown_handle();
    thread::spawn(move || server.serve());
    (addr, handle)
}

fn client_config(addr: SocketAddr) -> ClientConfig {
    ClientConfig::new("127.0.0.1", addr.port())
        .with_connect_timeout(Duration::from_secs(2))
        .with_io_timeout(Some(Duration::from_secs(5)))
}

fn raw_exchange(stream: &mut TcpStream, body: &[u8]) -> Vec<u8> {
    EnvelopeWriter::new(&mut *stream)
        .send(body)
        .expect("request should send");
    EnvelopeReader::new(&mut *stream)
        .read_envelope()
        .expect("response should arrive")
        .into_body()
        .to_vec()
}

#[test]
fn ping_round_trip_is_success_shaped() {
    let dir = unique_temp_dir("ping");
    let channel_path = dir.join("instrument.sock");
    spawn_instrument(&channel_path, |_, request| {
        let body = match request["method"].as_str() {
            Some("ping") => json!({"result": "pong"}),
            _ => json!({"error": "unexpected"}),
        };
        serde_json::to_vec(&body).expect("body should serialize")
    });
    let (addr, shutdown) = start_server(LocalChannel::from_path(&channel_path));

    let mut surface = CommandSurface::new(RelayClient::new(client_config(addr)));
    let text = surface.ping();
    assert!(text.contains("pong"), "{text}");
    let parsed: Value = serde_json::from_str(&text).expect("output should be JSON");
    assert_eq!(parsed["success"], true);

    shutdown.shutdown();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn read_memory_without_instrument_is_failure_value() {
    let dir = unique_temp_dir("noinst");
    let (addr, shutdown) = start_server(LocalChannel::from_path(dir.join("absent.sock")));

    let mut surface = CommandSurface::new(RelayClient::new(client_config(addr)));
    let text = surface.read_memory("0x1000", 4);
    let parsed: Value = serde_json::from_str(&text).expect("output should be JSON");
    assert_eq!(parsed["success"], false);
    assert!(parsed["error"].is_string());

    shutdown.shutdown();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn instrument_bytes_arrive_unmodified() {
    let dir = unique_temp_dir("verbatim");
    let channel_path = dir.join("instrument.sock");
    let known = format!(r#"{{"result":"{}"}}"#, "x".repeat(37));
    assert_eq!(known.len(), 50);
    let reply = known.clone().into_bytes();
    spawn_instrument(&channel_path, move |_, _| reply.clone());
    let (addr, shutdown) = start_server(LocalChannel::from_path(&channel_path));

    let mut stream = TcpStream::connect(addr).expect("connect should succeed");
    let request = br#"{"jsonrpc":"2.0","method":"read_memory","params":{},"id":1}"#;
    assert_eq!(raw_exchange(&mut stream, request), known.as_bytes());

    shutdown.shutdown();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn concurrent_sessions_see_only_their_own_responses() {
    let dir = unique_temp_dir("concurrent");
    let channel_path = dir.join("instrument.sock");
    spawn_instrument(&channel_path, |handle_no, request| {
        thread::sleep(Duration::from_millis(5));
        serde_json::to_vec(&json!({"result": {"handle": handle_no, "seq": request["id"]}}))
            .expect("body should serialize")
    });
    let (addr, shutdown) = start_server(LocalChannel::from_path(&channel_path));

    let barrier = Arc::new(Barrier::new(2));
    let workers: Vec<_> = (0..2)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut stream = TcpStream::connect(addr).expect("connect should succeed");
                barrier.wait();
                let mut seen_handle = None;
                for seq in 0..10 {
                    let request = serde_json::to_vec(
                        &json!({"jsonrpc": "2.0", "method": "ping", "params": {}, "id": seq}),
                    )
                    .expect("request should serialize");
                    let reply: Value = serde_json::from_slice(&raw_exchange(&mut stream, &request))
                        .expect("reply should be JSON");
                    assert_eq!(reply["result"]["seq"], seq);
                    let handle = reply["result"]["handle"].as_u64().expect("tagged reply");
                    assert_eq!(*seen_handle.get_or_insert(handle), handle);
                }
                seen_handle.expect("at least one reply")
            })
        })
        .collect();

    let handles: Vec<u64> = workers
        .into_iter()
        .map(|w| w.join().expect("worker should finish"))
        .collect();
    assert_ne!(handles[0], handles[1]);

    shutdown.shutdown();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn client_gives_up_after_two_attempts() {
    let opens = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&opens);
    let connector = FnConnector::new("never", move || -> cebridge::transport::Result<TcpStream> {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(TransportError::Io(std::io::Error::from(
            std::io::ErrorKind::NotFound,
        )))
    });
    let server = RelayServer::bind_with_connector(&ServerConfig::new("127.0.0.1", 0), connector)
        .expect("relay server should bind");
    let addr = server.local_addr();
    let shutdown = server.shutdown_handle();
    thread::spawn(move || server.serve());

    let mut client = RelayClient::new(client_config(addr));
    let err = client
        .call("get_version", Map::new())
        .expect_err("call should fail");
    assert!(matches!(err, RelayError::Unreachable { attempts: 2, .. }));
    assert_eq!(opens.load(Ordering::SeqCst), 2);

    shutdown.shutdown();
}
