//! Token-budgeted semantic chunking.

use std::sync::{Arc, OnceLock};

use semchunk_rs::Chunker;
use tiktoken_rs::{CoreBPE, cl100k_base};
use tracing::warn;

/// Counts tokens in a text segment.
pub type TokenCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

static ENCODING: OnceLock<Option<Arc<CoreBPE>>> = OnceLock::new();

/// Returns the shared token counter: `cl100k_base` when available, a
/// whitespace count otherwise.
pub fn token_counter() -> TokenCounter {
    let encoding = ENCODING
        .get_or_init(|| match cl100k_base() {
            Ok(encoding) => Some(Arc::new(encoding)),
            Err(e) => {
                warn!(error = %e, "tokenizer unavailable; falling back to whitespace counting");
                None
            }
        })
        .clone();

    match encoding {
        Some(encoding) => Arc::new(move |segment: &str| encoding.encode_ordinary(segment).len()),
        None => Arc::new(|segment: &str| {
            let tokens = segment.split_whitespace().count();
            if tokens == 0 && !segment.is_empty() { 1 } else { tokens }
        }),
    }
}

/// Splits text into chunks of at most `chunk_size` tokens with a sliding
/// `overlap` between neighbors. Returns an empty vector for all-whitespace
/// input.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let counter = token_counter();
    let counter_for_chunker = counter.clone();
    let chunker = Chunker::new(
        chunk_size,
        Box::new(move |segment: &str| counter_for_chunker.as_ref()(segment)),
    );
    let chunks = chunker.chunk(text);
    apply_overlap(chunks, chunk_size, overlap, &counter)
}

/// Prepends a token-limited tail of each chunk to its successor. The tail is
/// trimmed to whatever headroom the successor leaves under the budget, so
/// overlapped chunks never exceed `chunk_size`.
fn apply_overlap(
    chunks: Vec<String>,
    chunk_size: usize,
    overlap: usize,
    counter: &TokenCounter,
) -> Vec<String> {
    if overlap == 0 || chunks.len() < 2 {
        return chunks;
    }

    let mut out = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            out.push(chunk.clone());
            continue;
        }

        let headroom = chunk_size.saturating_sub(counter(chunk));
        let budget = overlap.min(headroom);
        let tail = token_tail(&chunks[i - 1], budget, counter);
        if tail.is_empty() {
            out.push(chunk.clone());
        } else {
            out.push(format!("{tail} {chunk}"));
        }
    }
    out
}

/// The trailing words of `text` worth at most `budget` tokens.
fn token_tail(text: &str, budget: usize, counter: &TokenCounter) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut start = words.len();
    while start > 0 {
        let candidate = words[start - 1..].join(" ");
        if counter(&candidate) > budget {
            break;
        }
        start -= 1;
    }
    words[start..].join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_input_yields_nothing() {
        assert!(chunk_text("   \n\t ", 128, 16).is_empty());
    }

    #[test]
    fn short_input_is_one_chunk() {
        let chunks = chunk_text("a single short paragraph", 128, 16);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn long_input_respects_the_token_budget() {
        let text = "sentence with some words in it. ".repeat(200);
        let counter = token_counter();
        let chunks = chunk_text(&text, 64, 8);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(counter(chunk) <= 64);
        }
    }

    #[test]
    fn token_tail_respects_the_budget() {
        let counter = token_counter();
        let tail = token_tail("alpha bravo charlie delta echo", 3, &counter);
        assert!(!tail.is_empty());
        assert!(counter(&tail) <= 3);
        assert!(tail.ends_with("echo"));

        assert!(token_tail("alpha bravo", 0, &counter).is_empty());
    }

    #[test]
    fn overlapped_chunks_stay_within_the_budget() {
        let text = "alpha bravo charlie delta echo foxtrot golf hotel. ".repeat(50);
        let counter = token_counter();
        let chunks = chunk_text(&text, 32, 8);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(counter(chunk) <= 32);
        }
    }
}
