//! Overlap-aware text chunker.
//!
//! Splits extracted document text into bounded segments for embedding.
//! Each proposed boundary snaps to the strongest nearby separator
//! (paragraph break, line break, sentence end, clause end, word gap), and
//! consecutive chunks share a configurable overlap so content that
//! straddles a boundary stays retrievable from either side.
//!
//! The split is a pure function of its inputs: the same text and
//! parameters always produce the same chunks.

use crate::models::{ChunkSpan, TextChunk};

/// Separators tried at each proposed boundary, strongest first.
const SEPARATORS: [&str; 9] = ["\n\n", "\n", ". ", "! ", "? ", ": ", "; ", ", ", " "];

/// How far back from the proposed boundary the separator search starts.
const SEARCH_BEHIND: usize = 200;
/// How far past the proposed boundary the separator search may reach.
const SEARCH_AHEAD: usize = 100;
/// A separator more than this far behind the proposed boundary is rejected.
const MAX_BACKTRACK: usize = 300;

/// Split `text` into overlapping chunks of at most roughly `chunk_size`
/// bytes (boundary search may overshoot by up to [`SEARCH_AHEAD`]).
///
/// Chunk `content` is trimmed; segments that trim to nothing are dropped
/// and do not consume an index. Span offsets are byte offsets into `text`,
/// not into the trimmed content. Empty or all-whitespace input yields an
/// empty vector.
///
/// # Panics
///
/// Panics if `chunk_size == 0` or `overlap >= chunk_size` — these are
/// programming errors, not recoverable conditions.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<TextChunk> {
    assert!(chunk_size > 0, "chunk_size must be > 0");
    assert!(overlap < chunk_size, "overlap must be < chunk_size");

    if text.trim().is_empty() {
        return Vec::new();
    }

    let len = text.len();
    let mut chunks = Vec::new();
    let mut position = 0usize;
    let mut index = 0usize;

    while position < len {
        let mut proposed = floor_char_boundary(text, (position + chunk_size).min(len));
        if proposed <= position {
            // chunk_size smaller than one multi-byte char; take the char whole
            proposed = ceil_char_boundary(text, position + 1);
        }

        let end = if proposed < len {
            find_break(text, position, proposed).unwrap_or(proposed)
        } else {
            proposed
        };

        let content = text[position..end].trim();
        if !content.is_empty() {
            chunks.push(TextChunk {
                content: content.to_string(),
                index,
                span: ChunkSpan {
                    start_char: position,
                    end_char: end,
                    word_count: content.split_whitespace().count(),
                },
            });
            index += 1;
        }

        if end == len {
            break;
        }

        // Overlap the next chunk into this one; the +1 floor guarantees
        // forward progress even when overlap covers the whole step.
        let next = end.saturating_sub(overlap).max(position + 1);
        position = ceil_char_boundary(text, next);
    }

    chunks
}

/// Find the best separator near `proposed`, preferring stronger separators
/// and positions closest to the proposed boundary. Returns the byte offset
/// just past the separator, or `None` if no separator lands in the window.
fn find_break(text: &str, start: usize, proposed: usize) -> Option<usize> {
    let search_start = proposed.saturating_sub(SEARCH_BEHIND).max(start);
    let search_end = floor_char_boundary(text, (proposed + SEARCH_AHEAD).min(text.len()));
    let window = &text[..search_end];
    let floor = proposed.saturating_sub(MAX_BACKTRACK);

    for sep in SEPARATORS {
        if let Some(at) = window.rfind(sep) {
            if at > search_start && at + sep.len() > floor {
                return Some(at + sep.len());
            }
        }
    }

    None
}

fn floor_char_boundary(text: &str, mut i: usize) -> usize {
    if i >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(text: &str, mut i: usize) -> usize {
    if i >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_text("", 1000, 200).is_empty());
        assert!(chunk_text("   \n\t  ", 1000, 200).is_empty());
    }

    #[test]
    fn short_text_single_chunk() {
        let chunks = chunk_text("Hello, world!", 1000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].content, "Hello, world!");
        assert_eq!(chunks[0].span.start_char, 0);
        assert_eq!(chunks[0].span.end_char, 13);
        assert_eq!(chunks[0].span.word_count, 2);
    }

    #[test]
    #[should_panic(expected = "chunk_size must be > 0")]
    fn zero_chunk_size_panics() {
        chunk_text("text", 0, 0);
    }

    #[test]
    #[should_panic(expected = "overlap must be < chunk_size")]
    fn overlap_at_least_chunk_size_panics() {
        chunk_text("text", 100, 100);
    }

    #[test]
    fn indices_are_contiguous_from_zero() {
        let text = (0..80)
            .map(|i| format!("Sentence number {} in the running example. ", i))
            .collect::<String>();
        let chunks = chunk_text(&text, 300, 60);
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
        }
    }

    #[test]
    fn chunks_respect_size_bound() {
        let text = "word ".repeat(2000);
        let chunks = chunk_text(&text, 400, 80);
        assert!(chunks.len() > 1);
        for c in &chunks[..chunks.len() - 1] {
            assert!(
                c.span.end_char - c.span.start_char <= 400 + SEARCH_AHEAD,
                "chunk spans {} bytes",
                c.span.end_char - c.span.start_char
            );
        }
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let text = "alpha beta gamma delta ".repeat(100);
        let chunks = chunk_text(&text, 300, 100);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            assert!(
                pair[1].span.start_char < pair[0].span.end_char,
                "chunks {} and {} do not overlap",
                pair[0].index,
                pair[1].index
            );
        }
    }

    #[test]
    fn coverage_reaches_end_of_source() {
        let text = "The quick brown fox jumped over the lazy dog and ran into the woods. "
            .repeat(40);
        let chunks = chunk_text(&text, 250, 50);
        let mut covered = 0usize;
        for c in &chunks {
            assert!(c.span.start_char <= covered, "gap before chunk {}", c.index);
            covered = covered.max(c.span.end_char);
        }
        assert_eq!(covered, text.len());
    }

    #[test]
    fn prefers_paragraph_breaks() {
        let first = "a".repeat(880);
        let second = "Second paragraph starts here and continues with enough additional \
                      prose that the document total comfortably exceeds the chunk size, \
                      forcing a boundary decision near the paragraph break."
            .to_string();
        let text = format!("{}\n\n{}", first, second);
        let chunks = chunk_text(&text, 1000, 200);
        assert!(chunks.len() >= 2);
        // the paragraph break just before the 1000-byte mark wins over a hard cut
        assert_eq!(chunks[0].content, first);
        assert_eq!(chunks[0].span.end_char, 882);
    }

    #[test]
    fn hard_cut_when_no_separator() {
        let text = "x".repeat(2500);
        let chunks = chunk_text(&text, 1000, 200);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].span.end_char, 1000);
        assert_eq!(chunks[1].span.start_char, 800);
        assert_eq!(chunks[2].span.end_char, 2500);
    }

    #[test]
    fn three_chunk_scenario() {
        // 2,500 characters of prose with chunk_size=1000, overlap=200
        let sentence = "Study materials benefit from consistent review habits. ";
        let text = sentence.repeat(2500 / sentence.len() + 1);
        let text = &text[..2500];
        let chunks = chunk_text(text, 1000, 200);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].span.start_char, 0);
        assert!(chunks[0].span.end_char <= 1000 + SEARCH_AHEAD);
        assert!(chunks[1].span.start_char <= 1000);
        assert!(chunks[1].span.end_char <= 2000 + SEARCH_AHEAD);
        assert_eq!(chunks[2].span.end_char, text.len());
    }

    #[test]
    fn deterministic() {
        let text = "Alpha beta gamma. Delta epsilon zeta. ".repeat(50);
        let a = chunk_text(&text, 300, 60);
        let b = chunk_text(&text, 300, 60);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.content, y.content);
            assert_eq!(x.span, y.span);
        }
    }

    #[test]
    fn multibyte_text_never_splits_a_char() {
        let text = "héllo wörld çà và bien über alles ".repeat(60);
        let chunks = chunk_text(&text, 100, 20);
        assert!(!chunks.is_empty());
        for c in &chunks {
            // spans must land on valid UTF-8 boundaries
            let _ = &text[c.span.start_char..c.span.end_char];
        }
    }

    #[test]
    fn pathological_overlap_still_terminates() {
        let text = "ab cd ef gh ij kl";
        let chunks = chunk_text(text, 4, 3);
        assert!(!chunks.is_empty());
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
        }
    }

    #[test]
    fn word_count_counts_whitespace_delimited_tokens() {
        let chunks = chunk_text("one  two\tthree\nfour", 1000, 0);
        assert_eq!(chunks[0].span.word_count, 4);
    }
}
