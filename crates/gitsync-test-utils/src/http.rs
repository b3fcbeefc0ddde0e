//! A local HTTP endpoint that records every request it receives.
//!
//! Answers each request with a fixed status and closes the connection.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Request line of a received request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
}

pub struct RecordingEndpoint {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl RecordingEndpoint {
    /// Start an endpoint answering `200 OK`.
    pub fn start() -> Self {
        Self::with_status(200)
    }

    /// Start an endpoint answering every request with `status`.
    pub fn with_status(status: u16) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                if let Some(request) = read_request(&mut stream) {
                    let head_only = request.method == "HEAD";
                    recorded.lock().unwrap().push(request);
                    respond(&mut stream, status, head_only);
                }
            }
        });

        Self { addr, requests }
    }

    /// URL of the hook path on this endpoint.
    pub fn url(&self) -> String {
        format!("http://{}/hook", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Wait until at least `count` requests arrived. Returns whether they did.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.requests.lock().unwrap().len() >= count {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        self.requests.lock().unwrap().len() >= count
    }
}

fn read_request(stream: &mut TcpStream) -> Option<RecordedRequest> {
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .ok()?;

    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buffer.windows(4).any(|w| w == b"\r\n\r\n") {
        let read = stream.read(&mut chunk).ok()?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
    }

    let head = String::from_utf8_lossy(&buffer);
    let mut request_line = head.lines().next()?.split_whitespace();
    Some(RecordedRequest {
        method: request_line.next()?.to_string(),
        path: request_line.next()?.to_string(),
    })
}

fn respond(stream: &mut TcpStream, status: u16, head_only: bool) {
    let body = if head_only { "" } else { "OK" };
    let response = format!(
        "HTTP/1.1 {status} STATUS\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{body}"
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}
