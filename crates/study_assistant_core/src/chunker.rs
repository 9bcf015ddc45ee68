//! crates/study_assistant_core/src/chunker.rs
//!
//! Splits extracted document text into overlapping word windows.
//!
//! Page numbers are estimated from a chunk's position in the token stream, since
//! extraction does not report page boundaries per word. They are an approximation.

use crate::error::{StudyError, StudyResult};

/// Words per chunk used by document ingestion unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 500;
/// Words shared between consecutive chunks unless configured otherwise.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// A chunk produced by the chunker, before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub content: String,
    pub page_number: u32,
    pub chunk_index: u32,
}

/// Word-window chunker with a validated size/overlap pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Creates a chunker. Fails with `StudyError::Configuration` unless
    /// `0 <= overlap < chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> StudyResult<Self> {
        if chunk_size == 0 {
            return Err(StudyError::Configuration(
                "chunk size must be at least 1 word".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(StudyError::Configuration(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }

    /// Number of chunks produced for `token_count` words.
    pub fn chunk_count(&self, token_count: usize) -> usize {
        token_count.div_ceil(self.step())
    }

    /// Chunks `text` without page information; every chunk is on page 1.
    pub fn chunk<'a>(&self, text: &'a str) -> Chunks<'a> {
        self.chunk_with_pages(text, None)
    }

    /// Chunks `text`, spreading page numbers evenly over `page_count` pages.
    ///
    /// The returned iterator borrows `text`; call again (or clone the iterator)
    /// to walk the chunks a second time.
    pub fn chunk_with_pages<'a>(&self, text: &'a str, page_count: Option<u32>) -> Chunks<'a> {
        let tokens: Vec<&'a str> = text.split_whitespace().collect();

        let page_estimate = match page_count {
            Some(pages) if pages > 0 && !tokens.is_empty() => Some(PageEstimate {
                tokens_per_page: tokens.len().div_ceil(pages as usize),
                page_count: pages,
            }),
            _ => None,
        };

        Chunks {
            tokens,
            chunk_size: self.chunk_size,
            step: self.step(),
            page_estimate,
            next_start: 0,
            next_index: 0,
        }
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PageEstimate {
    tokens_per_page: usize,
    page_count: u32,
}

impl PageEstimate {
    fn page_for(&self, token_position: usize) -> u32 {
        let page = (token_position / self.tokens_per_page) as u32 + 1;
        page.min(self.page_count)
    }
}

/// Iterator over the chunks of one text.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    tokens: Vec<&'a str>,
    chunk_size: usize,
    step: usize,
    page_estimate: Option<PageEstimate>,
    next_start: usize,
    next_index: u32,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = TextChunk;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_start;
        if start >= self.tokens.len() {
            return None;
        }
        let end = (start + self.chunk_size).min(self.tokens.len());

        let chunk = TextChunk {
            content: self.tokens[start..end].join(" "),
            page_number: self
                .page_estimate
                .map(|estimate| estimate.page_for(start))
                .unwrap_or(1),
            chunk_index: self.next_index,
        };

        self.next_start += self.step;
        self.next_index += 1;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .tokens
            .len()
            .saturating_sub(self.next_start)
            .div_ceil(self.step);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Chunks<'_> {}
