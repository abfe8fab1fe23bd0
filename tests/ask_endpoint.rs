use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use trivia_helper_lib::ai::perplexity::NOT_IMPLEMENTED;
use trivia_helper_lib::config::AppConfig;
use trivia_helper_lib::http;

struct ServerGuard(tokio::task::JoinHandle<()>);

impl Drop for ServerGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Upstream that answers every request with the same JSON body.
async fn spawn_upstream(body: &'static str) -> (String, ServerGuard) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                // Good enough for small JSON requests: wait for headers plus body
                loop {
                    let n = socket.read(&mut chunk).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    let text = String::from_utf8_lossy(&buf).to_string();
                    if let Some((head, rest)) = text.split_once("\r\n\r\n") {
                        let len = head
                            .lines()
                            .filter_map(|l| l.split_once(':'))
                            .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
                            .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                            .unwrap_or(0);
                        if rest.len() >= len {
                            break;
                        }
                    }
                }
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    (format!("http://{}", addr), ServerGuard(handle))
}

async fn start_server(config: AppConfig) -> (String, ServerGuard) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = http::spawn_server_with_listener(listener, Arc::new(config)).await;
    (format!("http://{}", addr), ServerGuard(handle))
}

/// Writes `request` on a raw connection and returns whatever comes back
/// before the server closes it.
async fn raw_exchange(base: &str, request: &[u8]) -> String {
    let addr = base.trim_start_matches("http://");
    let mut stream = TcpStream::connect(addr).await.unwrap();
    // The server may answer before it has read everything we send
    let _ = stream.write_all(request).await;

    let mut response = Vec::new();
    let mut chunk = [0u8; 4096];
    let read_all = async {
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => response.extend_from_slice(&chunk[..n]),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), read_all)
        .await
        .expect("server never closed the connection");
    String::from_utf8_lossy(&response).to_string()
}

async fn closed_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

#[tokio::test]
async fn ask_returns_every_backend_answer() {
    let (openai_url, _openai) =
        spawn_upstream(r#"{"choices":[{"message":{"content":"B) 4"}}]}"#).await;
    let (anthropic_url, _anthropic) =
        spawn_upstream(r#"{"content":[{"type":"text","text":"B - four"}]}"#).await;

    let config = AppConfig {
        openai_api_key: "sk-test".into(),
        openai_base_url: openai_url,
        anthropic_api_key: "ak-test".into(),
        anthropic_base_url: anthropic_url,
        ..AppConfig::default()
    };
    let (base, _server) = start_server(config).await;

    let res = reqwest::Client::new()
        .post(format!("{}/ask", base))
        .json(&serde_json::json!({"question": "What is 2+2? A)3 B)4 C)5 D)6"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(
        body,
        serde_json::json!({
            "openai": "B) 4",
            "anthropic": "B - four",
            "perplexity": NOT_IMPLEMENTED
        })
    );
}

#[tokio::test]
async fn backend_failures_still_return_200_with_error_strings() {
    let config = AppConfig {
        openai_api_key: "sk-test".into(),
        openai_base_url: closed_base_url().await,
        anthropic_api_key: String::new(),
        ..AppConfig::default()
    };
    let (base, _server) = start_server(config).await;

    let res = reqwest::Client::new()
        .post(format!("{}/ask", base))
        .body(r#"{}"#)
        .header("Content-Type", "application/json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: serde_json::Map<String, serde_json::Value> = res.json().await.unwrap();
    assert_eq!(body.len(), 3);
    assert!(body["openai"].as_str().unwrap().starts_with("Error: "));
    assert!(body["anthropic"].as_str().unwrap().starts_with("Error: "));
    assert_eq!(body["perplexity"], NOT_IMPLEMENTED);
}

#[tokio::test]
async fn invalid_json_is_a_bad_request() {
    let (base, _server) = start_server(AppConfig::default()).await;

    let res = reqwest::Client::new()
        .post(format!("{}/ask", base))
        .body("question=hi")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("invalid JSON body"));
}

#[tokio::test]
async fn index_page_and_unknown_routes() {
    let (base, _server) = start_server(AppConfig::default()).await;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/", base)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .starts_with("text/html"));
    assert!(res.text().await.unwrap().contains("Trivia Helper"));

    let res = client.get(format!("{}/ask", base)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);

    let res = client.get(format!("{}/nope", base)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn preflight_is_answered() {
    let (base, _server) = start_server(AppConfig::default()).await;

    let res = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, format!("{}/ask", base))
        .header("Origin", "http://example.test")
        .header("Access-Control-Request-Method", "POST")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        res.headers()
            .get("access-control-allow-methods")
            .and_then(|v| v.to_str().ok()),
        Some("GET, POST, OPTIONS")
    );
}

#[tokio::test]
async fn oversized_headers_are_rejected_with_431() {
    let (base, _server) = start_server(AppConfig::default()).await;

    let mut request = b"GET / HTTP/1.1\r\nHost: localhost\r\nX-Padding: ".to_vec();
    request.extend(std::iter::repeat(b'a').take(70_000));
    let response = raw_exchange(&base, &request).await;

    assert!(
        response.starts_with("HTTP/1.1 431 "),
        "unexpected response: {}",
        response.lines().next().unwrap_or_default()
    );
    assert!(response.contains("Request Header Fields Too Large"));
}

#[tokio::test]
async fn oversized_body_is_rejected_with_413() {
    let (base, _server) = start_server(AppConfig::default()).await;

    let request = b"POST /ask HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: 2000000\r\n\r\n";
    let response = raw_exchange(&base, request).await;

    assert!(
        response.starts_with("HTTP/1.1 413 "),
        "unexpected response: {}",
        response.lines().next().unwrap_or_default()
    );
    assert!(response.contains("Payload Too Large"));
}

#[tokio::test]
async fn stalled_request_times_out_with_408() {
    let config = AppConfig {
        request_read_timeout_ms: 200,
        ..AppConfig::default()
    };
    let (base, _server) = start_server(config).await;

    // Promises ten body bytes but only ever sends four
    let request = b"POST /ask HTTP/1.1\r\nHost: localhost\r\nContent-Length: 10\r\n\r\n{\"qu";
    let response = raw_exchange(&base, request).await;

    assert!(
        response.starts_with("HTTP/1.1 408 "),
        "unexpected response: {}",
        response.lines().next().unwrap_or_default()
    );
}

#[tokio::test]
async fn numeric_question_is_asked_as_text() {
    let (base, _server) = start_server(AppConfig::default()).await;

    let res = reqwest::Client::new()
        .post(format!("{}/ask", base))
        .json(&serde_json::json!({"question": 5}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: serde_json::Map<String, serde_json::Value> = res.json().await.unwrap();
    assert_eq!(body.len(), 3);
    assert_eq!(body["perplexity"], NOT_IMPLEMENTED);
}
