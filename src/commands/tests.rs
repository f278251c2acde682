use super::*;
use crate::config::OllamaConfig;
use crate::index::ChunkMetadata;
use crate::loader::ContentType;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn result_with(content: &str) -> SearchResult {
    SearchResult {
        chunk: ChunkMetadata {
            chunk_id: "doc:0".to_string(),
            document_id: "doc".to_string(),
            source: "notes.txt".to_string(),
            content_type: ContentType::Text,
            page: None,
            title: None,
            content: content.to_string(),
            chunk_index: 0,
            start_index: 0,
            created_at: "2024-01-01T00:00:00Z".to_string(),
        },
        similarity_score: 0.9,
        distance: 0.1,
    }
}

async fn ollama_with_models(models: &[&str]) -> (MockServer, Config) {
    let server = MockServer::start().await;
    let listed: Vec<serde_json::Value> = models
        .iter()
        .map(|name| serde_json::json!({ "name": name }))
        .collect();
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "models": listed })))
        .mount(&server)
        .await;

    let url = Url::parse(&server.uri()).expect("mock server uri should parse");
    let mut config = Config::with_base_dir("");
    config.ollama = OllamaConfig {
        host: url.host_str().expect("mock server has a host").to_string(),
        port: url.port().expect("mock server has a port"),
        model: "all-minilm".to_string(),
        ..OllamaConfig::default()
    };
    (server, config)
}

#[test]
fn parse_chat_commands() {
    assert_eq!(
        ChatCommand::parse("/file  docs/guide.pdf "),
        ChatCommand::File(PathBuf::from("docs/guide.pdf"))
    );
    assert_eq!(
        ChatCommand::parse("/url https://example.com/page"),
        ChatCommand::Url("https://example.com/page".to_string())
    );
    assert_eq!(ChatCommand::parse("/process"), ChatCommand::Process);
    assert_eq!(ChatCommand::parse("/history"), ChatCommand::History);
    assert_eq!(ChatCommand::parse("/help"), ChatCommand::Help);
    assert_eq!(ChatCommand::parse("/quit"), ChatCommand::Quit);
    assert_eq!(ChatCommand::parse("/exit"), ChatCommand::Quit);
    assert_eq!(ChatCommand::parse("   "), ChatCommand::Empty);
}

#[test]
fn plain_lines_are_questions() {
    assert_eq!(
        ChatCommand::parse("  What is ownership?  "),
        ChatCommand::Question("What is ownership?".to_string())
    );
    assert_eq!(
        ChatCommand::parse("is a/b path a question?"),
        ChatCommand::Question("is a/b path a question?".to_string())
    );
}

#[test]
fn commands_missing_arguments_are_unknown() {
    assert_eq!(ChatCommand::parse("/file"), ChatCommand::Unknown("/file".to_string()));
    assert_eq!(ChatCommand::parse("/url   "), ChatCommand::Unknown("/url".to_string()));
    assert_eq!(
        ChatCommand::parse("/delete everything"),
        ChatCommand::Unknown("/delete everything".to_string())
    );
}

#[test]
fn source_preview_is_truncated() {
    let long = "x".repeat(SOURCE_PREVIEW_CHARS + 50);
    let formatted = format_source(0, &result_with(&long));
    assert_eq!(
        formatted,
        format!("Source 1:\n{}...", "x".repeat(SOURCE_PREVIEW_CHARS))
    );

    let short = format_source(2, &result_with("short chunk"));
    assert_eq!(short, "Source 3:\nshort chunk...");
}

#[test]
fn source_preview_counts_characters() {
    let text = "é".repeat(SOURCE_PREVIEW_CHARS + 1);
    let formatted = format_source(0, &result_with(&text));
    let body = formatted
        .strip_prefix("Source 1:\n")
        .and_then(|rest| rest.strip_suffix("..."))
        .expect("formatted source has heading and ellipsis");
    assert_eq!(body.chars().count(), SOURCE_PREVIEW_CHARS);
}

#[test]
fn queue_file_checks_type_and_existence() {
    let dir = TempDir::new().expect("should create TempDir successfully");
    let notes = dir.path().join("notes.txt");
    fs_write(&notes, b"queued");

    let upload = queue_file(&notes).expect("text file should queue");
    assert_eq!(upload.contents, b"queued");

    let slides = dir.path().join("slides.pptx");
    fs_write(&slides, b"PK");
    assert!(queue_file(&slides).is_err());

    assert!(queue_file(&dir.path().join("missing.txt")).is_err());
}

fn fs_write(file_path: &Path, contents: &[u8]) {
    std::fs::write(file_path, contents).expect("should write test file");
}

#[tokio::test]
async fn connect_embedder_accepts_untagged_model() {
    let (_server, config) = ollama_with_models(&["all-minilm:latest"]).await;
    assert!(connect_embedder(&config).is_ok());
}

#[tokio::test]
async fn connect_embedder_reports_missing_model() {
    let (_server, config) = ollama_with_models(&["llama3:8b"]).await;
    let err = connect_embedder(&config)
        .err()
        .expect("missing model should be reported");
    assert!(format!("{:#}", err).contains("ollama pull all-minilm"));
}

#[test]
fn connect_chat_model_validates_settings() {
    let mut config = Config::with_base_dir("");
    assert!(connect_chat_model(&config, "key".to_string()).is_ok());

    config.llm.temperature = 5.0;
    assert!(connect_chat_model(&config, "key".to_string()).is_err());
}
