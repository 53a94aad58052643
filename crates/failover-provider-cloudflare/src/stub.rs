//! Minimal HTTP/1.1 responder standing in for the Cloudflare API in tests
//!
//! Every connection carries exactly one request and is closed after the
//! response. Requests are matched on method and exact request target.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// A canned response
pub struct Route {
    method: &'static str,
    target: &'static str,
    status: u16,
    body: String,
}

impl Route {
    /// Successful envelope around `result`
    pub fn ok(method: &'static str, target: &'static str, result: serde_json::Value) -> Self {
        Self::raw(
            method,
            target,
            200,
            serde_json::json!({ "success": true, "errors": [], "result": result }),
        )
    }

    /// Error status with a failed envelope
    pub fn status(method: &'static str, target: &'static str, status: u16) -> Self {
        Self::raw(method, target, status, failed_envelope(status))
    }

    /// Arbitrary status and body
    pub fn raw(
        method: &'static str,
        target: &'static str,
        status: u16,
        body: serde_json::Value,
    ) -> Self {
        Self {
            method,
            target,
            status,
            body: body.to_string(),
        }
    }
}

fn failed_envelope(status: u16) -> serde_json::Value {
    serde_json::json!({
        "success": false,
        "errors": [{ "code": status, "message": "stub error" }],
        "result": null
    })
}

/// A request as received
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub target: String,
    pub head: String,
    pub body: String,
}

pub struct StubServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
    task: JoinHandle<()>,
}

impl StubServer {
    pub async fn start(routes: Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes = Arc::new(routes);
        let requests: Arc<Mutex<Vec<Recorded>>> = Arc::default();

        let task = {
            let requests = Arc::clone(&requests);
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    tokio::spawn(serve(stream, Arc::clone(&routes), Arc::clone(&requests)));
                }
            })
        };

        Self {
            addr,
            requests,
            task,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(mut stream: TcpStream, routes: Arc<Vec<Route>>, requests: Arc<Mutex<Vec<Recorded>>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        let n = match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < head_end + content_length {
        let n = match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[head_end..head_end + content_length]).to_string();

    let mut request_line = head.lines().next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let target = request_line.next().unwrap_or_default().to_string();

    requests.lock().unwrap().push(Recorded {
        method: method.clone(),
        target: target.clone(),
        head,
        body,
    });

    let (status, payload) = routes
        .iter()
        .find(|r| r.method == method && r.target == target)
        .map(|r| (r.status, r.body.clone()))
        .unwrap_or_else(|| (404, failed_envelope(404).to_string()));

    let response = format!(
        "HTTP/1.1 {} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        status,
        payload.len(),
        payload
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}
