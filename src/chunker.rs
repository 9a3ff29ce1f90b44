//! Word splitting and fixed-size chunking for sequential narration.
//!
//! A reply is split on whitespace into a [`WordSequence`]; narration walks
//! it in [`Chunk`]s of `chunk_size` words so each utterance stays within
//! what a synthesiser handles comfortably.

use std::sync::Arc;

pub const DEFAULT_CHUNK_SIZE: usize = 20;

/// Words of one reply, in order. Cheap to clone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordSequence {
    words: Arc<[String]>,
}

impl WordSequence {
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.words.get(index).map(String::as_str)
    }

    /// Words joined with single spaces.
    pub fn joined(&self) -> String {
        self.words.join(" ")
    }
}

/// A contiguous run of words spoken as one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Index of the first word in the parent sequence.
    pub start: usize,
    pub words: Vec<String>,
    /// What the engine is asked to say: `words` joined by single spaces.
    pub text: String,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Index just past the last word of this chunk.
    pub fn end(&self) -> usize {
        self.start + self.words.len()
    }
}

/// Split text on whitespace. Punctuation stays attached to its word.
pub fn split(text: &str) -> WordSequence {
    WordSequence {
        words: text.split_whitespace().map(String::from).collect(),
    }
}

/// The chunk of at most `chunk_size` words beginning at `start`, or `None`
/// past the end of the sequence. A zero size is treated as one.
pub fn chunk_at(sequence: &WordSequence, start: usize, chunk_size: usize) -> Option<Chunk> {
    if start >= sequence.len() {
        return None;
    }
    let end = (start + chunk_size.max(1)).min(sequence.len());
    let words = sequence.words()[start..end].to_vec();
    let text = words.join(" ");
    Some(Chunk { start, words, text })
}

/// Number of chunks needed to cover `len` words.
pub fn chunk_count(len: usize, chunk_size: usize) -> usize {
    len.div_ceil(chunk_size.max(1))
}

/// All chunks of a sequence in playback order.
pub fn chunks(sequence: &WordSequence, chunk_size: usize) -> impl Iterator<Item = Chunk> + '_ {
    let size = chunk_size.max(1);
    (0..chunk_count(sequence.len(), size)).filter_map(move |i| chunk_at(sequence, i * size, size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_words_in_pairs() {
        let seq = split("alpha beta gamma");
        let all: Vec<Vec<String>> = chunks(&seq, 2).map(|c| c.words).collect();
        assert_eq!(all, vec![vec!["alpha", "beta"], vec!["gamma"]]);
    }

    #[test]
    fn rejoining_collapses_whitespace_only() {
        let seq = split("  Hello,\tworld!\n\nHow   are you? ");
        assert_eq!(seq.joined(), "Hello, world! How are you?");
        assert_eq!(seq.len(), 5);
    }

    #[test]
    fn empty_text_has_no_chunks() {
        let seq = split(" \n\t ");
        assert!(seq.is_empty());
        assert_eq!(chunks(&seq, DEFAULT_CHUNK_SIZE).count(), 0);
        assert_eq!(chunk_at(&seq, 0, DEFAULT_CHUNK_SIZE), None);
    }

    #[test]
    fn chunk_layout_for_various_lengths() {
        for (n, c) in [(1usize, 20usize), (20, 20), (21, 20), (45, 20), (7, 3), (9, 3)] {
            let text: Vec<String> = (0..n).map(|i| format!("w{i}")).collect();
            let seq = split(&text.join(" "));
            let all: Vec<Chunk> = chunks(&seq, c).collect();

            assert_eq!(all.len(), n.div_ceil(c), "n={n} c={c}");
            for (i, chunk) in all.iter().enumerate() {
                assert_eq!(chunk.start, i * c);
                assert!(chunk.len() <= c);
                assert!(!chunk.is_empty());
            }
            assert_eq!(all.last().unwrap().end(), n);
        }
    }

    #[test]
    fn chunk_text_is_space_joined() {
        let seq = split("one  two\nthree four");
        let chunk = chunk_at(&seq, 1, 2).unwrap();
        assert_eq!(chunk.text, "two three");
        assert_eq!(chunk.end(), 3);
    }

    #[test]
    fn zero_chunk_size_is_clamped() {
        let seq = split("a b");
        assert_eq!(chunk_count(seq.len(), 0), 2);
        assert_eq!(chunk_at(&seq, 0, 0).unwrap().words, vec!["a"]);
    }
}
