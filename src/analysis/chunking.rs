//! Word-boundary chunking.
//!
//! Text is split on whitespace and words are packed greedily into chunks whose character count
//! stays within the bound. A word is never split; a single word longer than the bound becomes a
//! chunk of its own. Optionally, each chunk after the first starts with the trailing words of
//! its predecessor (the overlap), which the vector context path uses so that clauses straddling
//! a boundary stay retrievable.

use super::types::{Chunk, ChunkingError};

/// Split `text` into word-aligned chunks of at most `max_chars` characters.
///
/// Returns an empty vector for empty or whitespace-only input.
pub fn chunk_text(text: &str, max_chars: usize) -> Result<Vec<Chunk>, ChunkingError> {
    chunk_with_overlap(text, max_chars, 0)
}

/// Split `text` like [`chunk_text`], repeating up to `overlap_chars` characters of trailing
/// words from the previous chunk at the start of the next one.
///
/// The overlap is shrunk whenever carrying it would push the next chunk over `max_chars`.
pub fn chunk_with_overlap(
    text: &str,
    max_chars: usize,
    overlap_chars: usize,
) -> Result<Vec<Chunk>, ChunkingError> {
    if max_chars == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    let overlap = overlap_chars.min(max_chars.saturating_sub(1));

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current.is_empty() || current_len + 1 + word_len <= max_chars {
            current_len = joined_len(current_len, current.is_empty(), word_len);
            current.push(word);
            continue;
        }

        let room = max_chars.saturating_sub(word_len + 1);
        let tail = overlap_tail(&current, overlap.min(room));
        chunks.push(Chunk {
            index: chunks.len(),
            text: current.join(" "),
        });

        current_len = words_len(&tail);
        current = tail;
        current_len = joined_len(current_len, current.is_empty(), word_len);
        current.push(word);
    }

    if !current.is_empty() {
        chunks.push(Chunk {
            index: chunks.len(),
            text: current.join(" "),
        });
    }

    Ok(chunks)
}

fn joined_len(current_len: usize, current_is_empty: bool, word_len: usize) -> usize {
    if current_is_empty {
        word_len
    } else {
        current_len + 1 + word_len
    }
}

fn words_len(words: &[&str]) -> usize {
    words
        .iter()
        .map(|word| word.chars().count())
        .sum::<usize>()
        + words.len().saturating_sub(1)
}

/// Longest suffix of `words` whose space-joined length fits in `budget`.
fn overlap_tail<'a>(words: &[&'a str], budget: usize) -> Vec<&'a str> {
    let mut taken = 0usize;
    let mut start = words.len();
    while start > 0 {
        let word_len = words[start - 1].chars().count();
        let next = joined_len(taken, taken == 0, word_len);
        if next > budget {
            break;
        }
        taken = next;
        start -= 1;
    }
    words[start..].to_vec()
}
