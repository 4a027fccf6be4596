//! Exchange tests against a throwaway local HTTP server.
//!
//! Each test binds a listener on an ephemeral port, answers exactly one
//! request with a canned response, and checks how the client classifies it.

use live_dm::{resolve_endpoint, Error, LiveDm, TurnRequest};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn sample_request() -> TurnRequest {
    TurnRequest {
        action: "You study the floor mosaics".to_string(),
        source: "choice".to_string(),
        stat: "INT".to_string(),
        dc: 10,
        passed: true,
        game_state: serde_json::json!({"scene": "Halls", "turn": 1}),
        history: vec![],
        target_scene: Some("Halls".to_string()),
    }
}

/// Read one HTTP request (headers plus `Content-Length` body).
async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = stream.read(&mut chunk).await.expect("read request");
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    if name.eq_ignore_ascii_case("content-length") {
                        value.trim().parse::<usize>().ok()
                    } else {
                        None
                    }
                })
                .unwrap_or(0);

            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }

    String::from_utf8_lossy(&buf).to_string()
}

/// Serve one canned response and hand back the request that was received.
async fn serve_once(
    status_line: &'static str,
    body: &'static str,
) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let request = read_request(&mut stream).await;
        let response = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream
            .write_all(response.as_bytes())
            .await
            .expect("write response");
        stream.shutdown().await.ok();
        request
    });

    (format!("http://{addr}"), handle)
}

#[tokio::test]
async fn test_successful_turn_posts_payload() {
    let (base, server) = serve_once(
        "200 OK",
        r#"{"story_paragraph": "The mosaics rearrange themselves.", "gold_delta": 2}"#,
    )
    .await;

    let client = LiveDm::new(Duration::from_secs(5)).unwrap();
    let url = resolve_endpoint(&base, "/dm-turn").unwrap();
    let reply = client.turn(url, &sample_request()).await.unwrap();

    assert_eq!(
        reply.story_paragraph.as_deref(),
        Some("The mosaics rearrange themselves.")
    );
    assert_eq!(reply.gold_delta, Some(2));

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /dm-turn"));
    assert!(request.contains("\"source\":\"choice\""));
    assert!(request.contains("\"target_scene\":\"Halls\""));
}

#[tokio::test]
async fn test_server_error_is_api_error() {
    let (base, server) = serve_once("500 Internal Server Error", r#"{"error": "boom"}"#).await;

    let client = LiveDm::new(Duration::from_secs(5)).unwrap();
    let url = resolve_endpoint(&base, "/dm-turn").unwrap();
    let err = client.turn(url, &sample_request()).await.unwrap_err();

    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 500);
            assert!(message.contains("boom"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let (base, server) = serve_once("200 OK", "<html>definitely not json</html>").await;

    let client = LiveDm::new(Duration::from_secs(5)).unwrap();
    let url = resolve_endpoint(&base, "/dm-turn").unwrap();
    let err = client.turn(url, &sample_request()).await.unwrap_err();

    assert!(matches!(err, Error::Parse(_)), "got {err:?}");
    server.await.unwrap();
}

#[tokio::test]
async fn test_unreachable_endpoint_is_network_error() {
    // Bind then drop to get a port nothing is listening on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = LiveDm::new(Duration::from_secs(5)).unwrap();
    let url = resolve_endpoint(&format!("http://{addr}"), "/dm-turn").unwrap();
    let err = client.turn(url, &sample_request()).await.unwrap_err();

    assert!(
        matches!(err, Error::Network(_) | Error::Timeout),
        "got {err:?}"
    );
}
