//! Mock Telegram Bot API server for testing
//!
//! Implements just enough of the Bot API for the notifier:
//! - POST /bot<token>/sendMessage returns { ok: true, result: { message_id: N } }
//!
//! Every accepted message is recorded so tests can inspect what was sent.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use serde::Deserialize;

/// Mock Bot API server
pub struct MockTelegramServer {
    port: u16,
    running: Arc<AtomicBool>,
    received: Arc<Mutex<Vec<ReceivedMessage>>>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Answer every request with 401
    pub fail_auth: bool,
    /// Answer every request with a 500
    pub fail_server: bool,
}

/// A message the mock accepted
#[derive(Debug, Clone, Deserialize)]
pub struct ReceivedMessage {
    pub chat_id: String,
    pub text: String,
}

struct Shared {
    config: MockConfig,
    received: Arc<Mutex<Vec<ReceivedMessage>>>,
    next_id: AtomicI64,
}

impl MockTelegramServer {
    /// Start on a random free port
    pub fn start(config: MockConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        let running = Arc::new(AtomicBool::new(true));
        let received = Arc::new(Mutex::new(Vec::new()));

        listener.set_nonblocking(true)?;

        let shared = Arc::new(Shared {
            config,
            received: Arc::clone(&received),
            next_id: AtomicI64::new(1),
        });
        let running_clone = Arc::clone(&running);

        let thread_handle = thread::spawn(move || {
            while running_clone.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        let shared = Arc::clone(&shared);
                        thread::spawn(move || handle_connection(stream, &shared));
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(std::time::Duration::from_millis(10));
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            port,
            running,
            received,
            thread_handle: Some(thread_handle),
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Messages accepted so far, in arrival order
    pub fn received(&self) -> Vec<ReceivedMessage> {
        self.received.lock().unwrap().clone()
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockTelegramServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Read one HTTP request: headers, then Content-Length bytes of body
fn read_request(stream: &mut TcpStream) -> Option<(String, String)> {
    stream.set_nonblocking(false).ok()?;
    let mut data = Vec::new();
    let mut buffer = [0u8; 4096];

    loop {
        let n = stream.read(&mut buffer).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buffer[..n]);

        let text = String::from_utf8_lossy(&data).to_string();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let head = &text[..header_end];
            let content_length = head
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            let body_start = header_end + 4;
            if data.len() >= body_start + content_length {
                let body = String::from_utf8_lossy(&data[body_start..body_start + content_length]);
                return Some((head.to_string(), body.to_string()));
            }
        }
    }
}

fn handle_connection(mut stream: TcpStream, shared: &Shared) {
    let Some((head, body)) = read_request(&mut stream) else {
        return;
    };

    let first_line = head.lines().next().unwrap_or("");
    let parts: Vec<&str> = first_line.split_whitespace().collect();
    if parts.len() < 2 {
        send_response(&mut stream, 400, "Bad Request", r#"{"ok":false,"description":"Bad Request"}"#);
        return;
    }

    if shared.config.fail_auth {
        send_response(
            &mut stream,
            401,
            "Unauthorized",
            r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#,
        );
        return;
    }

    if shared.config.fail_server {
        send_response(
            &mut stream,
            500,
            "Internal Server Error",
            r#"{"ok":false,"error_code":500,"description":"Internal Server Error"}"#,
        );
        return;
    }

    let (method, path) = (parts[0], parts[1]);
    if method != "POST" || !path.starts_with("/bot") || !path.ends_with("/sendMessage") {
        send_response(&mut stream, 404, "Not Found", r#"{"ok":false,"description":"Not Found"}"#);
        return;
    }

    match serde_json::from_str::<ReceivedMessage>(&body) {
        Ok(message) => {
            shared.received.lock().unwrap().push(message);
            let id = shared.next_id.fetch_add(1, Ordering::SeqCst);
            let json = format!(r#"{{"ok":true,"result":{{"message_id":{}}}}}"#, id);
            send_response(&mut stream, 200, "OK", &json);
        }
        Err(_) => {
            send_response(
                &mut stream,
                400,
                "Bad Request",
                r#"{"ok":false,"description":"Bad Request: message text is empty"}"#,
            );
        }
    }
}

fn send_response(stream: &mut TcpStream, status: u16, status_text: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        status_text,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}
