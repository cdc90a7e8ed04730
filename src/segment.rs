//! Sentence-aware text segmentation.
//!
//! Splits document text into bounded, non-empty chunks. The strategy is
//! chosen at construction time: [`SegmenterKind::SentenceAware`] splits at
//! sentence-terminal punctuation (`.`, `!`, `?`) followed by whitespace and
//! packs whole sentences greedily; [`SegmenterKind::Naive`] packs whitespace
//! tokens instead.
//!
//! `max_chars` is a soft bound: a single unit longer than the limit is kept
//! whole rather than split internally. Overlap is an honored, tested
//! contract — when a chunk is flushed, the next buffer is seeded with the
//! trailing units of the flushed chunk totaling at most `overlap`
//! characters. `overlap = 0` disables it.

use anyhow::{bail, Result};

/// Segmentation strategy, selected at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterKind {
    /// Split into sentences, never breaking one internally.
    SentenceAware,
    /// Split into whitespace-delimited tokens.
    Naive,
}

#[derive(Debug, Clone, Copy)]
pub struct Segmenter {
    kind: SegmenterKind,
    max_chars: usize,
    overlap: usize,
}

impl Segmenter {
    pub fn new(kind: SegmenterKind, max_chars: usize, overlap: usize) -> Result<Self> {
        if max_chars == 0 {
            bail!("chunking.max_chars must be > 0");
        }
        if overlap >= max_chars {
            bail!(
                "chunking.overlap ({}) must be smaller than max_chars ({})",
                overlap,
                max_chars
            );
        }
        Ok(Self {
            kind,
            max_chars,
            overlap,
        })
    }

    pub fn kind(&self) -> SegmenterKind {
        self.kind
    }

    /// Split `text` into an ordered list of chunks.
    ///
    /// Never returns an empty list: when no units can be parsed (empty or
    /// punctuation-free input for the sentence splitter), the whole trimmed
    /// input is emitted as one chunk.
    pub fn segment(&self, text: &str) -> Vec<String> {
        let units = match self.kind {
            SegmenterKind::SentenceAware => split_sentences(text),
            SegmenterKind::Naive => text.split_whitespace().collect(),
        };
        if units.is_empty() {
            return vec![text.trim().to_string()];
        }
        pack_units(&units, self.max_chars, self.overlap)
    }
}

/// Split text into sentences at terminal punctuation followed by whitespace.
/// Terminal punctuation stays with its sentence; a trailing fragment with no
/// terminator counts as a sentence of its own.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut iter = text.char_indices().peekable();
    while let Some((i, c)) = iter.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some(&(_, next)) = iter.peek() {
                if next.is_whitespace() {
                    let sentence = text[start..i + c.len_utf8()].trim();
                    if !sentence.is_empty() {
                        sentences.push(sentence);
                    }
                    start = i + c.len_utf8();
                }
            }
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Greedily pack units into chunks. A flush happens when appending the next
/// unit would make the buffer reach or exceed `max_chars`; the new buffer is
/// then seeded with trailing units of the flushed chunk up to `overlap`
/// characters. A chunk always contains at least one fresh unit, so packing
/// makes progress even when the overlap seed is already near the limit.
fn pack_units(units: &[&str], max_chars: usize, overlap: usize) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;
    let mut fresh = 0usize;

    for unit in units {
        let would_be = if current.is_empty() {
            unit.len()
        } else {
            current_len + 1 + unit.len()
        };

        if would_be >= max_chars && fresh > 0 {
            chunks.push(current.join(" "));
            current = trailing_overlap(&current, overlap);
            current_len = joined_len(&current);
            fresh = 0;
        }

        if !current.is_empty() {
            current_len += 1;
        }
        current_len += unit.len();
        current.push(unit);
        fresh += 1;
    }

    if fresh > 0 {
        chunks.push(current.join(" "));
    }
    chunks
}

/// Trailing units of a chunk whose joined length stays within `budget`.
fn trailing_overlap<'a>(units: &[&'a str], budget: usize) -> Vec<&'a str> {
    if budget == 0 {
        return Vec::new();
    }
    let mut seed: Vec<&str> = Vec::new();
    let mut len = 0usize;
    for unit in units.iter().rev() {
        let would_be = if seed.is_empty() {
            unit.len()
        } else {
            len + 1 + unit.len()
        };
        if would_be > budget {
            break;
        }
        len = would_be;
        seed.push(unit);
    }
    seed.reverse();
    seed
}

fn joined_len(units: &[&str]) -> usize {
    if units.is_empty() {
        return 0;
    }
    units.iter().map(|u| u.len()).sum::<usize>() + units.len() - 1
}
