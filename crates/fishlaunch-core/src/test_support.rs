//! Minimal HTTP/1.1 responder for exercising network paths in unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub(crate) enum Route {
    /// 200 with a `Content-Length` header.
    Body(Vec<u8>),
    /// 200 without a length; the body ends when the connection closes.
    UnsizedBody(Vec<u8>),
    /// Bare status line with an empty body.
    Status(u16),
    /// Declares `declared` bytes but hangs up after sending `body`.
    Truncated { declared: usize, body: Vec<u8> },
    /// Sized body sent as `count` copies of `chunk`, pausing after each.
    Trickle {
        chunk: Vec<u8>,
        count: usize,
        pause: Duration,
    },
}

pub(crate) struct TestServer {
    pub base_url: String,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub(crate) async fn serve(routes: Vec<(&str, Route)>) -> TestServer {
    let routes: Arc<HashMap<String, Route>> = Arc::new(
        routes
            .into_iter()
            .map(|(path, route)| (format!("/{}", path.trim_start_matches('/')), route))
            .collect(),
    );
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("test listener should bind");
    let addr = listener.local_addr().expect("listener should have an address");

    let handle = tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let routes = Arc::clone(&routes);
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buffer = [0_u8; 1024];
                while !request.windows(4).any(|window| window == b"\r\n\r\n") {
                    match stream.read(&mut buffer).await {
                        Ok(0) | Err(_) => return,
                        Ok(read) => request.extend_from_slice(&buffer[..read]),
                    }
                }
                let request = String::from_utf8_lossy(&request);
                let path = request
                    .lines()
                    .next()
                    .and_then(|line| line.split_whitespace().nth(1))
                    .unwrap_or("/")
                    .to_string();

                let response = match routes.get(&path) {
                    Some(Route::Body(body)) => framed(200, Some(body.len()), body),
                    Some(Route::UnsizedBody(body)) => framed(200, None, body),
                    Some(Route::Status(status)) => framed(*status, Some(0), &[]),
                    Some(Route::Truncated { declared, body }) => {
                        framed(200, Some(*declared), body)
                    }
                    Some(Route::Trickle {
                        chunk,
                        count,
                        pause,
                    }) => {
                        let head = framed(200, Some(chunk.len() * count), &[]);
                        if stream.write_all(&head).await.is_err() {
                            return;
                        }
                        for _ in 0..*count {
                            // Client hung up.
                            if stream.write_all(chunk).await.is_err() || stream.flush().await.is_err() {
                                return;
                            }
                            tokio::time::sleep(*pause).await;
                        }
                        Vec::new()
                    }
                    None => framed(404, Some(0), &[]),
                };
                let _ = stream.write_all(&response).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    TestServer {
        base_url: format!("http://{addr}"),
        handle,
    }
}

/// Base URL of a port nothing listens on.
pub(crate) async fn unreachable_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("throwaway listener should bind");
    let addr = listener.local_addr().expect("listener should have an address");
    drop(listener);
    format!("http://{addr}")
}

fn framed(status: u16, content_length: Option<usize>, body: &[u8]) -> Vec<u8> {
    let mut head = format!("HTTP/1.1 {status} X\r\nConnection: close\r\n");
    if let Some(length) = content_length {
        head.push_str(&format!("Content-Length: {length}\r\n"));
    }
    head.push_str("\r\n");
    let mut response = head.into_bytes();
    response.extend_from_slice(body);
    response
}

pub(crate) fn test_client() -> reqwest::Client {
    crate::http::build_client(&crate::http::HttpOptions::default())
        .expect("test client should build")
}
