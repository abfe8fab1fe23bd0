use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::ai::dispatch;
use crate::config::AppConfig;

const INDEX_HTML: &str = include_str!("../../web/index.html");

const MAX_HEADER_BYTES: usize = 64 * 1024;
const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Deserialize)]
struct AskRequest {
    #[serde(default)]
    question: Option<serde_json::Value>,
}

/// Missing or `null` is empty; other non-string values keep their JSON text.
fn question_text(value: Option<serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(text)) => text,
        Some(other) => other.to_string(),
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

struct Request {
    method: String,
    path: String,
    body: Vec<u8>,
}

enum ReadOutcome {
    Request(Request),
    Closed,
    Reject(u16, &'static str),
}

/// Serves the question page and the `/ask` endpoint on `config.bind_addr`.
pub async fn serve(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("[http] trivia helper listening on http://{}", listener.local_addr()?);
    run_with_listener(listener, config).await?;
    Ok(())
}

pub async fn spawn_server_with_listener(
    listener: TcpListener,
    config: Arc<AppConfig>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = run_with_listener(listener, config).await {
            log::error!("[http] server error: {:?}", e);
        }
    })
}

async fn run_with_listener(listener: TcpListener, config: Arc<AppConfig>) -> std::io::Result<()> {
    loop {
        let (mut socket, peer) = listener.accept().await?;
        let config = config.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_conn(&mut socket, &config).await {
                log::debug!("[http] connection from {} dropped: {}", peer, e);
            }
        });
    }
}

async fn handle_conn(socket: &mut TcpStream, config: &AppConfig) -> std::io::Result<()> {
    let read_timeout = Duration::from_millis(config.request_read_timeout_ms);
    let outcome = match tokio::time::timeout(read_timeout, read_request(socket)).await {
        Ok(outcome) => outcome?,
        Err(_) => ReadOutcome::Reject(408, "Request Timeout"),
    };
    let request = match outcome {
        ReadOutcome::Request(request) => request,
        ReadOutcome::Closed => return Ok(()),
        ReadOutcome::Reject(status, reason) => {
            log_access(status, "-", "-");
            write_json(socket, status, reason, &ErrorResponse { error: reason.to_string() }).await?;
            return socket.shutdown().await;
        }
    };

    let method = request.method.as_str();
    let path = request.path.as_str();

    let status = match (method, path) {
        ("OPTIONS", _) => {
            let headers = [
                ("Access-Control-Allow-Methods", "GET, POST, OPTIONS"),
                ("Access-Control-Allow-Headers", "Content-Type"),
            ];
            write_response(socket, 204, "No Content", "text/plain", &headers, b"").await?;
            204
        }
        ("GET", "/") | ("GET", "/index.html") => {
            write_response(socket, 200, "OK", "text/html; charset=utf-8", &[], INDEX_HTML.as_bytes())
                .await?;
            200
        }
        ("POST", "/ask") => match serde_json::from_slice::<AskRequest>(&request.body) {
            Ok(ask) => {
                let question = question_text(ask.question);
                let results = dispatch::ask_all(config, &question).await;
                write_json(socket, 200, "OK", &results).await?;
                200
            }
            Err(e) => {
                let body = ErrorResponse {
                    error: format!("invalid JSON body: {}", e),
                };
                write_json(socket, 400, "Bad Request", &body).await?;
                400
            }
        },
        (_, "/") | (_, "/index.html") | (_, "/ask") => {
            let body = ErrorResponse {
                error: format!("method {} not allowed on {}", method, path),
            };
            write_json(socket, 405, "Method Not Allowed", &body).await?;
            405
        }
        _ => {
            let body = ErrorResponse {
                error: format!("no route for {}", path),
            };
            write_json(socket, 404, "Not Found", &body).await?;
            404
        }
    };

    log_access(status, method, path);
    Ok(())
}

async fn read_request(socket: &mut TcpStream) -> std::io::Result<ReadOutcome> {
    let mut buf = vec![0u8; 4096];
    let mut read_len = 0usize;
    let header_end = loop {
        let n = socket.read(&mut buf[read_len..]).await?;
        if n == 0 {
            return Ok(ReadOutcome::Closed);
        }
        read_len += n;
        if let Some(pos) = buf[..read_len].windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        if read_len > MAX_HEADER_BYTES {
            return Ok(ReadOutcome::Reject(431, "Request Header Fields Too Large"));
        }
        if read_len == buf.len() {
            buf.resize(buf.len() + 4096, 0);
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let Some(first_line) = lines.next() else {
        return Ok(ReadOutcome::Reject(400, "Bad Request"));
    };
    let mut parts = first_line.split_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        return Ok(ReadOutcome::Reject(400, "Bad Request"));
    };
    let path = target.split('?').next().unwrap_or(target).to_string();
    let method = method.to_ascii_uppercase();

    let mut headers = HashMap::new();
    for line in lines {
        if line.trim().is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let content_length = match headers.get("content-length") {
        Some(value) => match value.parse::<usize>() {
            Ok(len) => len,
            Err(_) => return Ok(ReadOutcome::Reject(400, "Bad Request")),
        },
        None => 0,
    };
    if content_length > MAX_BODY_BYTES {
        return Ok(ReadOutcome::Reject(413, "Payload Too Large"));
    }

    let mut body = buf[header_end..read_len].to_vec();
    while body.len() < content_length {
        let mut chunk = vec![0u8; (content_length - body.len()).min(8192)];
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(ReadOutcome::Reject(400, "Bad Request"));
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);

    Ok(ReadOutcome::Request(Request { method, path, body }))
}

async fn write_json<T: Serialize>(
    socket: &mut TcpStream,
    status: u16,
    reason: &str,
    value: &T,
) -> std::io::Result<()> {
    let body = serde_json::to_vec(value).map_err(std::io::Error::other)?;
    write_response(socket, status, reason, "application/json", &[], &body).await
}

async fn write_response(
    socket: &mut TcpStream,
    status: u16,
    reason: &str,
    content_type: &str,
    headers: &[(&str, &str)],
    body: &[u8],
) -> std::io::Result<()> {
    let mut resp = Vec::with_capacity(body.len() + 256);
    resp.extend_from_slice(format!("HTTP/1.1 {} {}\r\n", status, reason).as_bytes());
    resp.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
    for (name, value) in headers {
        resp.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
    }
    resp.extend_from_slice(b"Access-Control-Allow-Origin: *\r\n");
    resp.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
    resp.extend_from_slice(b"Connection: close\r\n\r\n");
    resp.extend_from_slice(body);
    socket.write_all(&resp).await?;
    socket.flush().await
}

fn log_access(status: u16, method: &str, path: &str) {
    info!("ask_access status={} method={} path={}", status, method, path);
}
