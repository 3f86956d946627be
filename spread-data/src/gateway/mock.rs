use crate::config::ClientConfig;
use reqwest::StatusCode;
use std::net::SocketAddr;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};

/// Canned HTTP response served by [`serve_once`].
pub(crate) struct MockResponse {
    status: u16,
    body: String,
}

impl MockResponse {
    pub(crate) fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

pub(crate) struct MockServer {
    addr: SocketAddr,
    handle: JoinHandle<String>,
}

impl MockServer {
    pub(crate) fn config(&self) -> ClientConfig {
        ClientConfig::new(
            format!("http://{}/api", self.addr),
            format!("ws://{}/ws/market", self.addr),
        )
    }

    /// Raw text of the single request the server received.
    pub(crate) async fn request(self) -> String {
        self.handle.await.unwrap()
    }
}

/// Accept exactly one HTTP/1.1 request and answer it with `response`.
pub(crate) async fn serve_once(response: MockResponse) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request = read_request(&mut stream).await;

        let reason = StatusCode::from_u16(response.status)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or("Unknown");
        let head = format!(
            "HTTP/1.1 {} {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
            response.status,
            reason,
            response.body.len()
        );

        stream.write_all(head.as_bytes()).await.unwrap();
        stream.write_all(response.body.as_bytes()).await.unwrap();
        let _ = stream.shutdown().await;

        request
    });

    MockServer { addr, handle }
}

async fn read_request(stream: &mut TcpStream) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        let read = stream.read(&mut chunk).await.unwrap();
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);

        let Some(head_end) = buffer.windows(4).position(|window| window == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buffer[..head_end]);
        let content_length = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.trim()
                    .eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);

        if buffer.len() >= head_end + 4 + content_length {
            break;
        }
    }

    String::from_utf8_lossy(&buffer).into_owned()
}
