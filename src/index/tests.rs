use super::*;
use crate::loader::DocumentMetadata;

fn sample_chunk() -> Chunk {
    let mut metadata = DocumentMetadata::new("guide.pdf", ContentType::Pdf);
    metadata.page = Some(2);
    metadata.title = Some("Guide".to_string());
    Chunk {
        content: "Borrowing lets code use a value without owning it.".to_string(),
        document_id: "doc-1".to_string(),
        metadata,
        chunk_index: 4,
        start_index: 1200,
    }
}

#[test]
fn embedding_record_from_chunk() {
    let chunk = sample_chunk();
    let record = EmbeddingRecord::new(&chunk, vec![0.1, 0.2, 0.3]);

    assert!(Uuid::parse_str(&record.id).is_ok());
    assert_eq!(record.vector, vec![0.1, 0.2, 0.3]);

    let metadata = &record.metadata;
    assert_eq!(metadata.chunk_id, "doc-1:4");
    assert_eq!(metadata.document_id, "doc-1");
    assert_eq!(metadata.source, "guide.pdf");
    assert_eq!(metadata.content_type, ContentType::Pdf);
    assert_eq!(metadata.page, Some(2));
    assert_eq!(metadata.title.as_deref(), Some("Guide"));
    assert_eq!(metadata.content, chunk.content);
    assert_eq!(metadata.chunk_index, 4);
    assert_eq!(metadata.start_index, 1200);
    assert!(chrono::DateTime::parse_from_rfc3339(&metadata.created_at).is_ok());
}

#[test]
fn record_ids_are_unique_per_embedding() {
    let chunk = sample_chunk();
    let first = EmbeddingRecord::new(&chunk, vec![1.0]);
    let second = EmbeddingRecord::new(&chunk, vec![1.0]);

    assert_ne!(first.id, second.id);
    assert_eq!(first.metadata.chunk_id, second.metadata.chunk_id);
}
