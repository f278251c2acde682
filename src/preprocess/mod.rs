
use std::sync::LazyLock;

use fancy_regex::Regex;
use tracing::debug;

use crate::loader::Document;

/// Anything that is not a word character, whitespace or basic punctuation
static SPECIAL_CHARS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s.,!?-]").expect("valid regex"));

static WHITESPACE_RUN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Normalize text before chunking.
///
/// Drops characters other than word characters, whitespace and `. , ! ? -`,
/// collapses whitespace runs into one space and trims both ends. Removal runs
/// first so that deleting a symbol between two spaces cannot leave a double space.
#[inline]
pub fn clean_text(text: &str) -> String {
    let without_symbols = SPECIAL_CHARS_REGEX.replace_all(text, "");
    let collapsed = WHITESPACE_RUN_REGEX.replace_all(&without_symbols, " ");
    collapsed.trim().to_string()
}

/// Clean every document's content in place
#[inline]
pub fn preprocess_documents(documents: &mut [Document]) {
    let mut removed = 0;
    for document in documents.iter_mut() {
        let cleaned = clean_text(&document.content);
        removed += document.content.len() - cleaned.len();
        document.content = cleaned;
    }

    debug!(
        "Preprocessed {} documents ({} bytes removed)",
        documents.len(),
        removed
    );
}
