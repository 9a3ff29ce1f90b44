//! Tracks which word is being spoken from engine boundary events.

use crate::chunker::Chunk;
use crate::engine::BoundaryKind;

/// Absolute index of the word currently being spoken, if any.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HighlightTracker {
    current: Option<usize>,
}

impl HighlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// Apply a boundary event fired while `chunk` is playing.
    ///
    /// The word index is the chunk start plus the number of spaces in the
    /// chunk text before `char_index` (counted in characters). Offsets past
    /// the end pin to the chunk's last word. Sentence boundaries leave the
    /// state untouched.
    pub fn on_boundary(
        &mut self,
        chunk: &Chunk,
        char_index: usize,
        kind: BoundaryKind,
    ) -> Option<usize> {
        if kind != BoundaryKind::Word || chunk.is_empty() {
            return self.current;
        }
        let spaces = chunk
            .text
            .chars()
            .take(char_index)
            .filter(|c| *c == ' ')
            .count();
        let index = chunk.start + spaces.min(chunk.len() - 1);
        self.current = Some(index);
        self.current
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::{chunk_at, split};

    #[test]
    fn index_counts_spaces_before_offset() {
        let seq = split("w0 w1 w2 alpha beta gamma delta");
        let chunk = chunk_at(&seq, 3, 20).unwrap();
        assert_eq!(chunk.text, "alpha beta gamma delta");

        let mut tracker = HighlightTracker::new();
        assert_eq!(tracker.on_boundary(&chunk, 0, BoundaryKind::Word), Some(3));
        assert_eq!(tracker.on_boundary(&chunk, 6, BoundaryKind::Word), Some(4));
        assert_eq!(tracker.on_boundary(&chunk, 11, BoundaryKind::Word), Some(5));
        assert_eq!(tracker.on_boundary(&chunk, 17, BoundaryKind::Word), Some(6));
    }

    #[test]
    fn repeated_offset_reassigns_same_index() {
        let seq = split("alpha beta");
        let chunk = chunk_at(&seq, 0, 20).unwrap();
        let mut tracker = HighlightTracker::new();
        tracker.on_boundary(&chunk, 6, BoundaryKind::Word);
        tracker.on_boundary(&chunk, 6, BoundaryKind::Word);
        assert_eq!(tracker.current(), Some(1));
    }

    #[test]
    fn sentence_boundaries_are_ignored() {
        let seq = split("One. Two.");
        let chunk = chunk_at(&seq, 0, 20).unwrap();
        let mut tracker = HighlightTracker::new();
        assert_eq!(tracker.on_boundary(&chunk, 5, BoundaryKind::Sentence), None);
        tracker.on_boundary(&chunk, 0, BoundaryKind::Word);
        assert_eq!(tracker.on_boundary(&chunk, 5, BoundaryKind::Sentence), Some(0));
    }

    #[test]
    fn offsets_are_characters_not_bytes() {
        let seq = split("café au lait");
        let chunk = chunk_at(&seq, 0, 20).unwrap();
        let mut tracker = HighlightTracker::new();
        // "café " is five characters but six bytes.
        assert_eq!(tracker.on_boundary(&chunk, 5, BoundaryKind::Word), Some(1));
    }

    #[test]
    fn offset_past_end_pins_to_last_word() {
        let seq = split("a b");
        let chunk = chunk_at(&seq, 0, 20).unwrap();
        let mut tracker = HighlightTracker::new();
        assert_eq!(tracker.on_boundary(&chunk, 99, BoundaryKind::Word), Some(1));
        tracker.clear();
        assert_eq!(tracker.current(), None);
    }
}
