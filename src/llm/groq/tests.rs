use super::*;
use crate::llm::Role;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> LlmConfig {
    LlmConfig {
        base_url: format!("{}/openai/v1/", server.uri()),
        ..LlmConfig::default()
    }
}

fn completion(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
    })
}

#[test]
fn debug_redacts_api_key() {
    let client = GroqClient::new(&LlmConfig::default(), "gsk_secret_value".to_string())
        .expect("default config is valid");

    let debug = format!("{client:?}");
    assert!(!debug.contains("gsk_secret_value"));
    assert!(debug.contains("<redacted>"));
    assert!(debug.contains("llama3-8b-8192"));
}

#[test]
fn endpoint_appends_chat_completions() {
    let client = GroqClient::new(&LlmConfig::default(), "key".to_string())
        .expect("default config is valid");
    assert_eq!(
        client.endpoint.as_str(),
        "https://api.groq.com/openai/v1/chat/completions"
    );
    assert_eq!(client.model(), "llama3-8b-8192");
}

#[test]
fn rejects_invalid_config() {
    let config = LlmConfig {
        temperature: 3.5,
        ..LlmConfig::default()
    };
    assert!(GroqClient::new(&config, "key".to_string()).is_err());
}

#[tokio::test]
async fn complete_sends_model_messages_and_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({
            "model": "llama3-8b-8192",
            "temperature": 0.7,
            "stream": false,
            "messages": [{ "role": "user", "content": "What is Rust?" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("A language.")))
        .expect(1)
        .mount(&server)
        .await;

    let client = GroqClient::new(&config_for(&server), "test-key".to_string())
        .expect("config should be valid");
    let answer = client
        .complete(&[ChatMessage::user("What is Rust?")])
        .expect("completion should succeed");

    assert_eq!(answer, "A language.");
}

#[tokio::test]
async fn unauthorized_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": { "message": "Invalid API Key" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = GroqClient::new(&config_for(&server), "bad-key".to_string())
        .expect("config should be valid");
    let err = client
        .complete(&[ChatMessage::user("hello")])
        .expect_err("401 should fail");

    assert!(format!("{err:#}").contains("401"));
}

#[tokio::test]
async fn empty_choices_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
        )
        .mount(&server)
        .await;

    let client = GroqClient::new(&config_for(&server), "key".to_string())
        .expect("config should be valid")
        .with_retry_attempts(1);
    let err = client
        .complete(&[ChatMessage::user("hello")])
        .expect_err("no choices should fail");

    assert!(err.to_string().contains("no choices"));
}

#[test]
fn request_serialization_omits_missing_max_tokens() {
    let messages = [
        ChatMessage {
            role: Role::System,
            content: "Be brief.".to_string(),
        },
        ChatMessage::user("Hi"),
    ];
    let request = ChatRequest {
        model: "m",
        messages: &messages,
        temperature: 0.5,
        max_tokens: None,
        stream: false,
    };

    let json = serde_json::to_value(&request).expect("request should serialize");
    assert_eq!(json["messages"][0]["role"], "system");
    assert_eq!(json["messages"][1]["role"], "user");
    assert!(json.get("max_tokens").is_none());
}
