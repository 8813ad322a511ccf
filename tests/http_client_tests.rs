//! HTTP client tests against a local mock server.

use company_research::llm::openai::OpenAIClient;
use company_research::llm::{LLMClient, ModelSettings};
use company_research::search::{SearchOptions, SearchProvider, TavilySearch};
use company_research::types::AppError;
use futures::StreamExt;
use serde_json::json;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn tavily(server: &MockServer) -> TavilySearch {
    TavilySearch::with_base_url("tvly-test".to_string(), "advanced".to_string(), server.uri())
        .unwrap()
}

fn openai_at(base: String) -> OpenAIClient {
    OpenAIClient::new(
        "sk-test".to_string(),
        base,
        "test-model".to_string(),
        ModelSettings::default(),
    )
}

fn openai(server: &MockServer) -> OpenAIClient {
    openai_at(format!("{}/v1", server.uri()))
}

/// Serve one SSE response, writing each part separately with a pause in
/// between so the client sees them as distinct network reads.
async fn serve_sse_in_parts(parts: Vec<Vec<u8>>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;

        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n",
            )
            .await
            .unwrap();
        for part in parts {
            socket.write_all(&part).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        socket.shutdown().await.ok();
    });

    format!("http://{}/v1", addr)
}

/// Read headers and a `content-length` body.
async fn read_request(socket: &mut tokio::net::TcpStream) {
    let mut request = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
            return;
        }
        request.extend_from_slice(&buf[..n]);

        let text = String::from_utf8_lossy(&request).to_string();
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if request.len() >= end + 4 + length {
                return;
            }
        }
    }
}

// =============================================================================
// Tavily
// =============================================================================

#[tokio::test]
async fn test_tavily_search_sends_options_and_drops_empty_urls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(json!({
            "api_key": "tvly-test",
            "query": "Acme announcements",
            "search_depth": "advanced",
            "max_results": 3,
            "topic": "news",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"url": "https://news.example/acme", "title": "Acme news", "content": "Acme opened an office.", "score": 0.91},
                {"url": "", "title": "No url", "content": "dropped", "score": 0.5},
                {"url": "https://blog.example/acme", "title": "Acme blog"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let options = SearchOptions::new(3).with_topic("news");
    let hits = tavily(&server)
        .search("Acme announcements", &options)
        .await
        .unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].url, "https://news.example/acme");
    assert!((hits[0].score - 0.91).abs() < f32::EPSILON);
    assert_eq!(hits[1].content, "");
    assert_eq!(hits[1].score, 0.0);
}

#[tokio::test]
async fn test_tavily_extract_returns_raw_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/extract"))
        .and(body_partial_json(json!({
            "urls": ["https://acme.example"],
            "extract_depth": "advanced",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"url": "https://acme.example", "raw_content": "Acme builds robots."}]
        })))
        .mount(&server)
        .await;

    let content = tavily(&server).extract("https://acme.example").await.unwrap();
    assert_eq!(content.as_deref(), Some("Acme builds robots."));
}

#[tokio::test]
async fn test_tavily_extract_without_results_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/extract"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [],
            "failed_results": [{"url": "https://acme.example", "error": "blocked"}]
        })))
        .mount(&server)
        .await;

    assert!(tavily(&server)
        .extract("https://acme.example")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_tavily_error_status_is_search_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let err = tavily(&server)
        .search("Acme", &SearchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Search(_)));
    assert!(err.to_string().contains("401"));
    assert!(err.is_recoverable());
}

// =============================================================================
// OpenAI-compatible completions
// =============================================================================

#[tokio::test]
async fn test_openai_generate_with_system() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "temperature": 0.0,
            "messages": [
                {"role": "system", "content": "Be brief."},
                {"role": "user", "content": "Name a robot maker."}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1_700_000_000,
            "model": "test-model",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Acme"}, "finish_reason": "stop"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = openai(&server)
        .generate_with_system("Be brief.", "Name a robot maker.")
        .await
        .unwrap();
    assert_eq!(text, "Acme");
}

fn chunk_event(content: &str) -> String {
    let chunk = json!({
        "id": "chatcmpl-1",
        "object": "chat.completion.chunk",
        "created": 1_700_000_000,
        "model": "test-model",
        "choices": [{"index": 0, "delta": {"content": content}, "finish_reason": null}]
    });
    format!("data: {}\n\n", chunk)
}

#[tokio::test]
async fn test_openai_stream_yields_content_deltas() {
    let server = MockServer::start().await;
    let role_only = json!({
        "id": "chatcmpl-1",
        "object": "chat.completion.chunk",
        "created": 1_700_000_000,
        "model": "test-model",
        "choices": [{"index": 0, "delta": {"role": "assistant"}, "finish_reason": null}]
    });
    let body = format!(
        ": keep-alive\n\ndata: {}\n\n{}{}data: [DONE]\n\n",
        role_only,
        chunk_event("Acme products\n"),
        chunk_event("Acme history"),
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let stream = openai(&server)
        .stream_with_system("system", "prompt")
        .await
        .unwrap();
    let deltas: Vec<String> = stream.map(|d| d.unwrap()).collect().await;

    assert_eq!(deltas, vec!["Acme products\n", "Acme history"]);
}

#[tokio::test]
async fn test_openai_stream_keeps_multibyte_text_split_across_reads() {
    let event = format!("{}data: [DONE]\n\n", chunk_event("Café 数据"));
    let bytes = event.into_bytes();

    // cut inside the two-byte "é"
    let cut = bytes
        .windows(2)
        .position(|w| w == [0xC3, 0xA9])
        .map(|pos| pos + 1)
        .unwrap();
    let base = serve_sse_in_parts(vec![bytes[..cut].to_vec(), bytes[cut..].to_vec()]).await;

    let stream = openai_at(base)
        .stream_with_system("system", "prompt")
        .await
        .unwrap();
    let text: String = stream.map(|d| d.unwrap()).collect::<Vec<_>>().await.concat();

    assert_eq!(text, "Café 数据");
    assert!(!text.contains('\u{FFFD}'));
}

#[tokio::test]
async fn test_openai_error_status_is_llm_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "message": "model not available",
                "type": "invalid_request_error",
                "param": null,
                "code": null
            }
        })))
        .mount(&server)
        .await;

    let client = openai(&server);
    let err = client.generate("prompt").await.unwrap_err();
    assert!(matches!(err, AppError::LLM(_)));
    assert!(err.to_string().contains("model not available"), "{}", err);

    // a failed stream surfaces one error and ends
    let items: Vec<_> = match client.stream_with_system("s", "p").await {
        Ok(stream) => stream.collect().await,
        Err(e) => vec![Err(e)],
    };
    assert_eq!(items.len(), 1);
    assert!(items[0].is_err());
}
