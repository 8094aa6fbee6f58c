//! Sentence-boundary text chunker.
//!
//! Splits extracted document text into [`Chunk`]s that respect a
//! configurable `max_size` limit (in characters). Splitting occurs on
//! sentence boundaries — terminal punctuation (`.` `!` `?`) followed by
//! whitespace — so no sentence is ever truncated.

use crate::models::Chunk;

/// Default maximum chunk size in characters.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 1000;

/// Split text into sentence-aligned chunks of at most `max_size` characters.
///
/// Sentences are accumulated into a running chunk; when adding the next
/// sentence would exceed `max_size` and the current chunk is non-empty, the
/// chunk is closed and a new one started. The final open chunk is always
/// flushed. A single sentence longer than `max_size` becomes a chunk on its
/// own rather than being truncated.
///
/// Empty or whitespace-only input yields no chunks.
pub fn split_into_chunks(text: &str, max_size: usize) -> Vec<Chunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let sentences = split_sentences(text);
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;

    for sentence in sentences {
        let sent_len = sentence.chars().count();
        if current_len + sent_len > max_size && !current.is_empty() {
            chunks.push(make_chunk(chunks.len() as i64, &current));
            current.clear();
            current_len = 0;
        }
        current.push(sentence);
        current_len += sent_len;
    }

    if !current.is_empty() {
        chunks.push(make_chunk(chunks.len() as i64, &current));
    }

    chunks
}

fn make_chunk(position: i64, sentences: &[&str]) -> Chunk {
    Chunk {
        position,
        text: sentences.join(" "),
    }
}

/// Split text into sentences at `.` `!` `?` followed by whitespace.
///
/// The terminal punctuation stays with its sentence; the whitespace run
/// separating sentences is consumed.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some(&(_, next)) = chars.peek() {
                if next.is_whitespace() {
                    let end = idx + c.len_utf8();
                    sentences.push(&text[start..end]);
                    // Consume the whitespace run.
                    while let Some(&(_, w)) = chars.peek() {
                        if !w.is_whitespace() {
                            break;
                        }
                        chars.next();
                    }
                    start = chars.peek().map(|&(i, _)| i).unwrap_or(text.len());
                }
            }
        }
    }

    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}
