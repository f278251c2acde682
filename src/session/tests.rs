use super::*;
use crate::engine::NOT_INITIALIZED_ANSWER;
use crate::llm::Role;
use crate::test_support::{CannedChatModel, FakeEmbedder, UnavailableEmbedder};
use std::sync::atomic::Ordering;

fn session_in(base_dir: &TempDir) -> (Session, Arc<FakeEmbedder>, Arc<CannedChatModel>) {
    let embedder = Arc::new(FakeEmbedder::default());
    let llm = Arc::new(CannedChatModel::new("Rust guarantees memory safety."));
    let session = Session::new(
        Config::with_base_dir(base_dir.path()),
        Arc::clone(&embedder) as Arc<dyn Embedder>,
        Arc::clone(&llm) as Arc<dyn ChatModel>,
    )
    .expect("session should start");
    (session, embedder, llm)
}

fn notes_upload() -> Upload {
    Upload::new(
        "notes.txt",
        b"Rust is a systems programming language.\n\nIt guarantees memory safety without a garbage collector."
            .to_vec(),
    )
}

fn staged_entries(session: &Session) -> usize {
    fs::read_dir(session.ingestor.staging.path())
        .expect("staging directory should exist")
        .count()
}

#[test]
fn parse_urls_skips_blank_lines() {
    let urls = parse_urls("  https://a.example/one \n\n\t\nhttps://b.example/two\r\n   ");
    assert_eq!(urls, vec!["https://a.example/one", "https://b.example/two"]);
    assert!(parse_urls("").is_empty());
    assert!(parse_urls(" \n \n").is_empty());
}

#[test]
fn upload_from_path_reads_contents() {
    let dir = TempDir::new().expect("should create TempDir successfully");
    let file_path = dir.path().join("facts.txt");
    fs::write(&file_path, b"Ferris is a crab.").expect("should write test file");

    let upload = Upload::from_path(&file_path).expect("file should be readable");
    assert_eq!(upload.file_name, file_path.display().to_string());
    assert_eq!(upload.contents, b"Ferris is a crab.");

    let missing = Upload::from_path(&dir.path().join("missing.txt"));
    assert!(matches!(missing, Err(AssistantError::Loader(_))));
}

#[tokio::test]
async fn nothing_to_process_is_an_error() {
    let base_dir = TempDir::new().expect("should create TempDir successfully");
    let (mut session, embedder, _) = session_in(&base_dir);

    let result = session.process_documents(&[], "").await;
    assert!(matches!(result, Err(AssistantError::NoDocumentsLoaded)));

    let result = session.process_documents(&[], " \n\n ").await;
    assert!(matches!(result, Err(AssistantError::NoDocumentsLoaded)));

    assert!(!session.is_ready());
    assert_eq!(embedder.document_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unreachable_urls_only_load_nothing() {
    let base_dir = TempDir::new().expect("should create TempDir successfully");
    let (mut session, _, _) = session_in(&base_dir);
    session.ingestor.config.web.timeout_seconds = 2;

    let result = session
        .process_documents(&[], "http://127.0.0.1:9/\nnot a url")
        .await;
    assert!(matches!(result, Err(AssistantError::NoDocumentsLoaded)));
    assert!(!session.is_ready());
}

#[tokio::test]
async fn ask_before_processing_returns_not_initialized() {
    let base_dir = TempDir::new().expect("should create TempDir successfully");
    let (mut session, _, llm) = session_in(&base_dir);

    let answer = session.ask("What is Rust?").await.expect("ask should succeed");
    assert_eq!(answer.answer, NOT_INITIALIZED_ANSWER);
    assert!(answer.sources.is_empty());
    assert_eq!(llm.request_count(), 0);

    let history = session.chat_history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[1].content, NOT_INITIALIZED_ANSWER);
}

#[tokio::test]
async fn process_then_ask() {
    let base_dir = TempDir::new().expect("should create TempDir successfully");
    let (mut session, _, llm) = session_in(&base_dir);

    let outcome = session
        .process_documents(&[notes_upload()], "")
        .await
        .expect("processing should succeed");
    assert_eq!(outcome.documents, 1);
    assert!(outcome.chunks >= 1);
    assert!(session.is_ready());
    assert_eq!(staged_entries(&session), 0);

    let answer = session
        .ask("Does Rust have a garbage collector?")
        .await
        .expect("ask should succeed");
    assert_eq!(answer.answer, "Rust guarantees memory safety.");
    assert!(!answer.sources.is_empty());
    assert!(answer.sources.len() <= 3);
    assert!(answer.sources.iter().all(|s| s.chunk.source == "notes.txt"));
    assert_eq!(llm.request_count(), 1);
}

#[tokio::test]
async fn chunk_text_is_preprocessed() {
    let base_dir = TempDir::new().expect("should create TempDir successfully");
    let (mut session, _, _) = session_in(&base_dir);

    session
        .process_documents(
            &[Upload::new("odd.txt", b"Hello   @@world##\n\n\tagain!".to_vec())],
            "",
        )
        .await
        .expect("processing should succeed");

    let answer = session.ask("hello").await.expect("ask should succeed");
    assert_eq!(answer.sources[0].chunk.content, "Hello world again!");
}

#[tokio::test]
async fn chat_history_keeps_order() {
    let base_dir = TempDir::new().expect("should create TempDir successfully");
    let (mut session, _, _) = session_in(&base_dir);
    session
        .process_documents(&[notes_upload()], "")
        .await
        .expect("processing should succeed");

    session.ask("first question").await.expect("ask should succeed");
    session.ask("second question").await.expect("ask should succeed");

    let transcript: Vec<(Role, &str)> = session
        .chat_history()
        .iter()
        .map(|m| (m.role, m.content.as_str()))
        .collect();
    assert_eq!(
        transcript,
        vec![
            (Role::User, "first question"),
            (Role::Assistant, "Rust guarantees memory safety."),
            (Role::User, "second question"),
            (Role::Assistant, "Rust guarantees memory safety."),
        ]
    );
}

#[tokio::test]
async fn unsupported_upload_aborts_the_batch() {
    let base_dir = TempDir::new().expect("should create TempDir successfully");
    let (mut session, embedder, _) = session_in(&base_dir);

    let result = session
        .process_documents(
            &[notes_upload(), Upload::new("slides.pptx", b"PK".to_vec())],
            "",
        )
        .await;

    assert!(matches!(result, Err(AssistantError::UnsupportedFileType(name)) if name == "slides.pptx"));
    assert!(!session.is_ready());
    assert_eq!(embedder.document_calls.load(Ordering::SeqCst), 0);
    assert_eq!(staged_entries(&session), 0);
}

#[tokio::test]
async fn uploads_empty_after_cleaning_load_nothing() {
    let base_dir = TempDir::new().expect("should create TempDir successfully");
    let (mut session, embedder, _) = session_in(&base_dir);

    let result = session
        .process_documents(&[Upload::new("x.txt", b"@@@ ##".to_vec())], "")
        .await;

    assert!(matches!(result, Err(AssistantError::NoDocumentsLoaded)));
    assert!(!session.is_ready());
    assert_eq!(embedder.document_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn non_utf8_upload_aborts_the_batch() {
    let base_dir = TempDir::new().expect("should create TempDir successfully");
    let (mut session, embedder, _) = session_in(&base_dir);

    let result = session
        .process_documents(
            &[notes_upload(), Upload::new("latin1.txt", b"caf\xe9".to_vec())],
            "",
        )
        .await;

    assert!(matches!(result, Err(AssistantError::Loader(_))));
    assert!(!session.is_ready());
    assert_eq!(embedder.document_calls.load(Ordering::SeqCst), 0);
    assert_eq!(staged_entries(&session), 0);
}

#[tokio::test]
async fn corrupt_pdf_aborts_and_is_cleaned_up() {
    let base_dir = TempDir::new().expect("should create TempDir successfully");
    let (mut session, _, _) = session_in(&base_dir);

    let result = session
        .process_documents(&[Upload::new("broken.pdf", b"not a pdf".to_vec())], "")
        .await;

    assert!(matches!(result, Err(AssistantError::Loader(_))));
    assert!(!session.is_ready());
    assert_eq!(staged_entries(&session), 0);
}

#[tokio::test]
async fn failed_run_keeps_previous_index() {
    let base_dir = TempDir::new().expect("should create TempDir successfully");
    let (mut session, _, _) = session_in(&base_dir);
    session
        .process_documents(&[notes_upload()], "")
        .await
        .expect("processing should succeed");

    let result = session
        .process_documents(&[Upload::new("broken.pdf", b"not a pdf".to_vec())], "")
        .await;
    assert!(result.is_err());
    assert!(session.is_ready());

    let answer = session.ask("memory safety").await.expect("ask should succeed");
    assert!(!answer.sources.is_empty());
}

#[tokio::test]
async fn embedding_failure_leaves_session_unready() {
    let base_dir = TempDir::new().expect("should create TempDir successfully");
    let mut session = Session::new(
        Config::with_base_dir(base_dir.path()),
        Arc::new(UnavailableEmbedder),
        Arc::new(CannedChatModel::new("unused")),
    )
    .expect("session should start");

    let result = session.process_documents(&[notes_upload()], "").await;
    assert!(matches!(result, Err(AssistantError::Embedding(_))));
    assert!(!session.is_ready());
}

#[tokio::test]
async fn invalid_chunking_config_is_rejected() {
    let base_dir = TempDir::new().expect("should create TempDir successfully");
    let (mut session, _, _) = session_in(&base_dir);
    let chunking = &mut session.ingestor.config.chunking;
    chunking.chunk_overlap = chunking.chunk_size + 1;

    let result = session.process_documents(&[notes_upload()], "").await;
    assert!(matches!(result, Err(AssistantError::Config(_))));
}

#[tokio::test]
async fn load_index_reopens_a_previous_run() {
    let base_dir = TempDir::new().expect("should create TempDir successfully");
    let (mut first, _, _) = session_in(&base_dir);
    let outcome = first
        .process_documents(&[notes_upload()], "")
        .await
        .expect("processing should succeed");

    let (mut second, embedder, _) = session_in(&base_dir);
    assert!(!second.is_ready());
    let count = second.load_index().await.expect("index should load");
    assert_eq!(count, outcome.chunks);
    assert!(second.is_ready());
    assert_eq!(embedder.document_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn load_index_without_previous_run_fails() {
    let base_dir = TempDir::new().expect("should create TempDir successfully");
    let (mut session, _, _) = session_in(&base_dir);

    assert!(matches!(session.load_index().await, Err(AssistantError::Index(_))));
    assert!(!session.is_ready());
}

#[tokio::test]
async fn ingestor_persists_without_a_chat_model() {
    let base_dir = TempDir::new().expect("should create TempDir successfully");
    let config = Config::with_base_dir(base_dir.path());
    let index_directory = config.index_directory();
    let ingestor =
        Ingestor::new(config, Arc::new(FakeEmbedder::default())).expect("ingestor should start");

    let (store, outcome) = ingestor
        .process(&[notes_upload()], "")
        .await
        .expect("processing should succeed");
    assert_eq!(store.directory(), index_directory.as_path());
    assert_eq!(store.count().await.expect("count should succeed"), outcome.chunks);

    let reopened = ingestor.open_index().await.expect("index should reopen");
    assert_eq!(reopened.count().await.expect("count should succeed"), outcome.chunks);
}
