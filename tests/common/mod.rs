//! Shared utilities for integration testing.
//!
//! Mock backends speak raw HTTP/1.1 over TCP so tests control exactly what
//! the proxy sees on the wire: stalled bodies, trickled bytes, chunked
//! uploads.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use user_proxy::config::{InstanceConfig, ProxyConfig};
use user_proxy::discovery::StaticDiscovery;
use user_proxy::{AppState, HttpServer, Shutdown};

/// One request as the backend saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Body length, also for chunked bodies that are drained, not stored.
    pub body_len: u64,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn header_count(&self, name: &str) -> usize {
        self.headers.iter().filter(|(n, _)| n.eq_ignore_ascii_case(name)).count()
    }
}

/// Handle on a running mock backend.
#[derive(Clone)]
pub struct MockBackend {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockBackend {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.lock().last().cloned()
    }
}

/// Read one request head and its body from the socket.
pub async fn read_request<R: AsyncBufRead + Unpin>(reader: &mut R) -> Option<RecordedRequest> {
    let mut line = String::new();
    if reader.read_line(&mut line).await.ok()? == 0 {
        return None;
    }
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut headers = Vec::new();
    loop {
        line.clear();
        reader.read_line(&mut line).await.ok()?;
        let header = line.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }

    let mut request = RecordedRequest {
        method,
        path,
        headers,
        body: Vec::new(),
        body_len: 0,
    };

    let content_length = request
        .header("content-length")
        .and_then(|v| v.parse::<usize>().ok());
    let chunked = request
        .header("transfer-encoding")
        .map_or(false, |v| v.eq_ignore_ascii_case("chunked"));

    if let Some(len) = content_length {
        let mut body = vec![0u8; len];
        reader.read_exact(&mut body).await.ok()?;
        request.body_len = len as u64;
        request.body = body;
    } else if chunked {
        request.body_len = drain_chunked(reader).await?;
    }

    Some(request)
}

async fn drain_chunked<R: AsyncBufRead + Unpin>(reader: &mut R) -> Option<u64> {
    let mut total = 0u64;
    let mut line = String::new();
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        line.clear();
        reader.read_line(&mut line).await.ok()?;
        let size_field = line.trim().split(';').next()?.trim().to_string();
        let size = u64::from_str_radix(&size_field, 16).ok()?;

        if size == 0 {
            loop {
                line.clear();
                reader.read_line(&mut line).await.ok()?;
                if line.trim_end().is_empty() {
                    return Some(total);
                }
            }
        }

        let mut remaining = size;
        while remaining > 0 {
            let n = remaining.min(buf.len() as u64) as usize;
            reader.read_exact(&mut buf[..n]).await.ok()?;
            remaining -= n as u64;
        }
        total += size;

        line.clear();
        reader.read_line(&mut line).await.ok()?;
    }
}

fn status_line(status: u16) -> String {
    let reason = axum::http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown");
    format!("HTTP/1.1 {} {}", status, reason)
}

/// Write a complete `Connection: close` response.
pub async fn write_response(socket: &mut TcpStream, status: u16, content_type: &str, body: &str) {
    let response = format!(
        "{}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_line(status),
        content_type,
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

async fn bind() -> TcpListener {
    TcpListener::bind("127.0.0.1:0").await.unwrap()
}

/// Start a programmable mock backend. `f` maps each request to `(status, json body)`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> MockBackend
where
    F: Fn(RecordedRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = bind().await;
    let backend = MockBackend {
        addr: listener.local_addr().unwrap(),
        hits: Arc::new(AtomicUsize::new(0)),
        requests: Arc::new(Mutex::new(Vec::new())),
    };
    let f = Arc::new(f);
    let handle = backend.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let f = f.clone();
                    let handle = handle.clone();
                    tokio::spawn(async move {
                        let mut reader = BufReader::new(socket);
                        let Some(request) = read_request(&mut reader).await else {
                            return;
                        };
                        handle.hits.fetch_add(1, Ordering::SeqCst);
                        handle.requests.lock().push(request.clone());

                        let (status, body) = f(request).await;
                        write_response(reader.get_mut(), status, "application/json", &body).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    backend
}

/// Start a mock backend that returns a fixed JSON body with 200.
pub async fn start_mock_backend(body: &'static str) -> MockBackend {
    start_programmable_backend(move |_| async move { (200, body.to_string()) }).await
}

/// Sends headers and part of the body, then goes silent.
pub async fn start_stalling_backend() -> SocketAddr {
    let listener = bind().await;
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);
                if read_request(&mut reader).await.is_none() {
                    return;
                }
                let socket = reader.get_mut();
                let head = "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{\"id\":";
                let _ = socket.write_all(head.as_bytes()).await;
                tokio::time::sleep(Duration::from_secs(30)).await;
            });
        }
    });

    addr
}

/// Streams a chunked body one byte per `interval`, `count` times.
pub async fn start_trickling_backend(interval: Duration, count: usize) -> SocketAddr {
    let listener = bind().await;
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);
                if read_request(&mut reader).await.is_none() {
                    return;
                }
                let socket = reader.get_mut();
                let head = "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nTransfer-Encoding: chunked\r\n\r\n";
                if socket.write_all(head.as_bytes()).await.is_err() {
                    return;
                }
                for _ in 0..count {
                    tokio::time::sleep(interval).await;
                    if socket.write_all(b"1\r\nx\r\n").await.is_err() {
                        return;
                    }
                }
                let _ = socket.write_all(b"0\r\n\r\n").await;
            });
        }
    });

    addr
}

/// Accepts connections and holds them without ever reading.
pub async fn start_deaf_backend() -> SocketAddr {
    let listener = bind().await;
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                drop(socket);
            });
        }
    });

    addr
}

/// A listener whose accept queue is full, so new connects hang in SYN.
pub struct SaturatedListener {
    pub addr: SocketAddr,
    _listener: TcpListener,
    _held: TcpStream,
}

pub async fn start_saturated_listener() -> SaturatedListener {
    let socket = tokio::net::TcpSocket::new_v4().unwrap();
    socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let listener = socket.listen(0).unwrap();
    let addr = listener.local_addr().unwrap();
    // Never accepted; occupies the only backlog slot.
    let held = TcpStream::connect(addr).await.unwrap();

    SaturatedListener {
        addr,
        _listener: listener,
        _held: held,
    }
}

/// Build a config pointing `backend-service` at the given `(addr, zone)` pairs.
pub fn proxy_config(instances: &[(SocketAddr, Option<&str>)]) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.startup.smoke_check = false;
    config.observability.metrics_enabled = false;
    config.auth.token = Some("test-token".to_string());
    config.discovery.instances = instances
        .iter()
        .map(|(addr, zone)| InstanceConfig {
            id: None,
            service_id: "backend-service".to_string(),
            host: addr.ip().to_string(),
            port: addr.port(),
            zone: zone.map(String::from),
            metadata: Default::default(),
        })
        .collect();
    config
}

/// A proxy served on an ephemeral port.
pub struct RunningProxy {
    pub url: String,
    pub shutdown: Shutdown,
}

impl Drop for RunningProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn spawn_proxy(config: ProxyConfig) -> RunningProxy {
    let discovery = Arc::new(StaticDiscovery::new(&config.discovery.instances));
    let state = AppState::from_config(&config, discovery);
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, state);
    let stop = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, stop).await;
    });

    RunningProxy {
        url: format!("http://{}", addr),
        shutdown,
    }
}
