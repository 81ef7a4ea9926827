#![allow(clippy::unwrap_used, clippy::expect_used)]

use retrova_core::RetrovaError;
use retrova_model::{
    CohereReranker, CompletionBackend, CompletionEvent, CompletionRequest, EmbeddingProvider,
    OpenAiCompletion, OpenAiEmbeddings, Reranker, RetryPolicy,
};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn instant_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        backoff_base_ms: 0,
        backoff_max_ms: 0,
    }
}

// ---------------------------------------------------------------------------
// Embeddings
// ---------------------------------------------------------------------------

#[tokio::test]
async fn embeddings_parse_vectors_and_lowercase_input() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"embedding": [0.1, 0.2, 0.3]},
                {"embedding": [0.4, 0.5, 0.6]},
            ],
            "usage": {"prompt_tokens": 8, "total_tokens": 8},
        })))
        .mount(&server)
        .await;

    let client = OpenAiEmbeddings::new(server.uri(), "test-key").unwrap();
    let vectors = client
        .embed(&["Hello World".to_string(), "MIXED Case".to_string()])
        .await
        .unwrap();

    assert_eq!(vectors, vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]]);

    // The request body must carry lower-cased input.
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["input"], json!(["hello world", "mixed case"]));
    assert_eq!(body["model"], json!("text-embedding-ada-002"));
}

#[tokio::test]
async fn embeddings_retry_transient_failures_to_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"embedding": [1.0, 0.0]}],
        })))
        .mount(&server)
        .await;

    let client = OpenAiEmbeddings::new(server.uri(), "test-key")
        .unwrap()
        .with_policy(instant_policy(3));
    let vectors = client.embed(&["retry me".to_string()]).await.unwrap();
    assert_eq!(vectors, vec![vec![1.0, 0.0]]);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn embeddings_fail_terminally_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = OpenAiEmbeddings::new(server.uri(), "test-key")
        .unwrap()
        .with_policy(instant_policy(2));
    let err = client.embed(&["doomed".to_string()]).await.unwrap_err();
    assert!(matches!(err, RetrovaError::Embedding(_)));
    // Initial attempt + two retries.
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

// ---------------------------------------------------------------------------
// Completion stream
// ---------------------------------------------------------------------------

#[tokio::test]
async fn completion_stream_yields_deltas_usage_and_done() {
    let sse_body = concat!(
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
        "data: not-json\n\n",
        "data: {\"choices\":[],\"usage\":{\"total_tokens\":12}}\n\n",
        "data: [DONE]\n\n",
    );
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body, "text/event-stream"),
        )
        .mount(&server)
        .await;

    let client = OpenAiCompletion::new(server.uri(), "test-key").unwrap();
    let request = CompletionRequest {
        message: "question".into(),
        model: "gpt-4o-mini".into(),
        system_prompt: "prompt".into(),
        history: vec![],
    };
    let (mut rx, handle) = client.chat_stream(&request).await.unwrap();

    let mut deltas = String::new();
    let mut saw_done = false;
    let mut saw_usage = false;
    while let Some(event) = rx.recv().await {
        match event {
            CompletionEvent::TextDelta { text } => deltas.push_str(&text),
            CompletionEvent::Usage { usage } => {
                saw_usage = true;
                assert_eq!(usage["total_tokens"], json!(12));
            }
            CompletionEvent::Done => saw_done = true,
            CompletionEvent::Error { message } => panic!("unexpected stream error: {message}"),
        }
    }

    assert_eq!(deltas, "Hello");
    assert!(saw_done, "stream must terminate with Done");
    assert!(saw_usage, "usage-only chunk must be forwarded");
    assert_eq!(handle.await.unwrap().unwrap(), "Hello");
}

#[tokio::test]
async fn completion_connect_failure_is_retried_then_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = OpenAiCompletion::new(server.uri(), "test-key")
        .unwrap()
        .with_policy(instant_policy(1));
    let request = CompletionRequest {
        message: "question".into(),
        model: "gpt-4o-mini".into(),
        system_prompt: "prompt".into(),
        history: vec![],
    };
    let err = client.chat_stream(&request).await.unwrap_err();
    assert!(matches!(err, RetrovaError::Completion(_)));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

// ---------------------------------------------------------------------------
// Re-rank
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rerank_parses_index_score_pairs() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/rerank"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"index": 2, "relevance_score": 0.95},
                {"index": 0, "relevance_score": 0.40},
            ],
        })))
        .mount(&server)
        .await;

    let client = CohereReranker::new(server.uri(), "test-key").unwrap();
    let documents = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let reranked = client.rerank("query", &documents, 2).await.unwrap();

    assert_eq!(reranked.len(), 2);
    assert_eq!(reranked[0].index, 2);
    assert!((reranked[0].relevance_score - 0.95).abs() < 1e-6);

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["model"], json!("rerank-english-v3.0"));
    assert_eq!(body["top_n"], json!(2));
}

#[tokio::test]
async fn rerank_failure_is_a_rerank_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/rerank"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let client = CohereReranker::new(server.uri(), "test-key").unwrap();
    let err = client
        .rerank("query", &["doc".to_string()], 1)
        .await
        .unwrap_err();
    assert!(matches!(err, RetrovaError::Rerank(_)));
}
