
use std::collections::VecDeque;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ConfigError;
use crate::loader::{Document, DocumentMetadata};

/// Separators tried in order: paragraphs, lines, words, characters
const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// A piece of a document ready for embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// The chunk text
    pub content: String,
    /// ID of the document this chunk was cut from
    pub document_id: String,
    /// Metadata inherited from the source document
    pub metadata: DocumentMetadata,
    /// Position of this chunk within its document
    pub chunk_index: usize,
    /// Character offset of the chunk within the document content
    pub start_index: usize,
}

/// Configuration for content chunking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Recursive character splitter.
///
/// Splits on the coarsest separator present in the text, greedily merges pieces up
/// to `chunk_size` characters, and recurses with finer separators into pieces that
/// are still too large. Consecutive chunks share up to `chunk_overlap` characters.
#[derive(Debug, Clone)]
pub struct TextChunker {
    config: ChunkingConfig,
    separators: Vec<&'static str>,
}

impl TextChunker {
    #[inline]
    pub fn new(config: ChunkingConfig) -> Result<Self, ConfigError> {
        if config.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(config.chunk_size));
        }
        if config.chunk_overlap > config.chunk_size {
            return Err(ConfigError::OverlapExceedsChunkSize(
                config.chunk_overlap,
                config.chunk_size,
            ));
        }

        Ok(Self {
            config,
            separators: DEFAULT_SEPARATORS.to_vec(),
        })
    }

    #[inline]
    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Split every document into chunks, preserving document order
    #[inline]
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let chunks: Vec<Chunk> = documents
            .iter()
            .flat_map(|document| self.split_document(document))
            .collect();

        debug!(
            "Split {} documents into {} chunks (avg {} chars)",
            documents.len(),
            chunks.len(),
            chunks
                .iter()
                .map(|c| c.content.chars().count())
                .sum::<usize>()
                / chunks.len().max(1)
        );

        chunks
    }

    /// Split a single document into chunks that carry its metadata
    #[inline]
    pub fn split_document(&self, document: &Document) -> Vec<Chunk> {
        let text = document.content.as_str();

        self.split_spans(text)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, span)| Chunk {
                content: text[span.clone()].to_string(),
                document_id: document.id.clone(),
                metadata: document.metadata.clone(),
                chunk_index,
                start_index: text[..span.start].chars().count(),
            })
            .collect()
    }

    /// Split raw text into chunk strings
    #[inline]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_spans(text)
            .into_iter()
            .map(|span| text[span].to_string())
            .collect()
    }

    /// Byte ranges of every chunk within `text`
    fn split_spans(&self, text: &str) -> Vec<Range<usize>> {
        let mut spans = Vec::new();
        self.split_range(text, 0..text.len(), &self.separators, &mut spans);
        spans
    }

    fn split_range(
        &self,
        text: &str,
        range: Range<usize>,
        separators: &[&'static str],
        out: &mut Vec<Range<usize>>,
    ) {
        let segment = &text[range.clone()];
        let (separator, remaining) = pick_separator(segment, separators);

        let mut good_pieces = Vec::new();
        for piece in split_keeping_separator(segment, separator) {
            let piece = (piece.start + range.start)..(piece.end + range.start);

            if char_len(text, &piece) < self.config.chunk_size {
                good_pieces.push(piece);
                continue;
            }

            if !good_pieces.is_empty() {
                self.merge_pieces(text, &good_pieces, out);
                good_pieces.clear();
            }

            if remaining.is_empty() {
                push_trimmed(text, piece, out);
            } else {
                self.split_range(text, piece, remaining, out);
            }
        }

        if !good_pieces.is_empty() {
            self.merge_pieces(text, &good_pieces, out);
        }
    }

    /// Greedily combine contiguous pieces into windows of at most `chunk_size` characters
    fn merge_pieces(&self, text: &str, pieces: &[Range<usize>], out: &mut Vec<Range<usize>>) {
        let chunk_size = self.config.chunk_size;
        let chunk_overlap = self.config.chunk_overlap;

        let mut window: VecDeque<(Range<usize>, usize)> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            let len = char_len(text, piece);

            if total + len > chunk_size {
                if total > chunk_size {
                    warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total, chunk_size
                    );
                }

                if !window.is_empty() {
                    push_window(text, &window, out);

                    while total > chunk_overlap || (total + len > chunk_size && total > 0) {
                        let Some((_, dropped)) = window.pop_front() else {
                            break;
                        };
                        total -= dropped;
                    }
                }
            }

            window.push_back((piece.clone(), len));
            total += len;
        }

        push_window(text, &window, out);
    }
}

/// First separator present in `text` plus the finer separators after it
fn pick_separator<'a>(
    text: &str,
    separators: &'a [&'static str],
) -> (&'static str, &'a [&'static str]) {
    for (i, separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            return (separator, &[]);
        }
        if text.contains(separator) {
            return (separator, &separators[i + 1..]);
        }
    }

    (separators.last().copied().unwrap_or(""), &[])
}

/// Split `text` on `separator`, attaching each separator to the start of the piece
/// that follows it. Pieces are contiguous and cover the whole input.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<Range<usize>> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| i..i + c.len_utf8())
            .collect();
    }

    let mut boundaries: Vec<usize> = text.match_indices(separator).map(|(i, _)| i).collect();
    boundaries.push(text.len());

    let mut pieces = Vec::with_capacity(boundaries.len());
    let mut start = 0;
    for end in boundaries {
        if end > start {
            pieces.push(start..end);
        }
        start = end;
    }

    pieces
}

/// Emit the window as one chunk, trimmed of surrounding whitespace
fn push_window(text: &str, window: &VecDeque<(Range<usize>, usize)>, out: &mut Vec<Range<usize>>) {
    let (Some((first, _)), Some((last, _))) = (window.front(), window.back()) else {
        return;
    };

    push_trimmed(text, first.start..last.end, out);
}

fn push_trimmed(text: &str, range: Range<usize>, out: &mut Vec<Range<usize>>) {
    let slice = &text[range.clone()];
    let leading = slice.len() - slice.trim_start().len();
    let trailing = slice.len() - slice.trim_end().len();

    let start = range.start + leading;
    let end = range.end - trailing;
    if start < end {
        out.push(start..end);
    }
}

fn char_len(text: &str, range: &Range<usize>) -> usize {
    text[range.clone()].chars().count()
}
