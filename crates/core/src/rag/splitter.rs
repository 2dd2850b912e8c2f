use super::loader::Document;
use regex::Regex;
use uuid::Uuid;

/// Blank-line paragraph boundaries, tolerating CRLF.
pub const PARAGRAPH_SEPARATOR: &str = r"(?:\r?\n){2,}";

/// One paragraph of a document, ready to embed.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Stable across rebuilds so re-indexing overwrites instead of duplicating.
    pub id: Uuid,
    pub doc_id: String,
    pub index: usize,
    pub text: String,
}

/// Splits documents into paragraphs on a separator pattern.
#[derive(Debug, Clone)]
pub struct ParagraphSplitter {
    separator: Regex,
}

impl ParagraphSplitter {
    pub fn new() -> Result<Self, regex::Error> {
        Self::with_separator(PARAGRAPH_SEPARATOR)
    }

    pub fn with_separator(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            separator: Regex::new(pattern)?,
        })
    }

    /// Trimmed, non-empty paragraphs in document order.
    pub fn split_text<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.separator
            .split(text)
            .map(str::trim)
            .filter(|chunk| !chunk.is_empty())
            .collect()
    }

    pub fn split(&self, doc: &Document) -> Vec<Chunk> {
        self.split_text(&doc.text)
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk {
                id: chunk_id(&doc.id, index),
                doc_id: doc.id.clone(),
                index,
                text: text.to_string(),
            })
            .collect()
    }

    pub fn split_all(&self, docs: &[Document]) -> Vec<Chunk> {
        docs.iter().flat_map(|doc| self.split(doc)).collect()
    }
}

fn chunk_id(doc_id: &str, index: usize) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("{doc_id}#{index}").as_bytes())
}
