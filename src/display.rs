//! Terminal rendering of the reply with the spoken word highlighted.

use crate::chunker::WordSequence;

/// How the active word is marked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// ANSI reverse video.
    Ansi,
    /// `[word]`, for logs and dumb terminals.
    Brackets,
}

impl Marker {
    fn wrap(self, word: &str) -> String {
        match self {
            Self::Ansi => format!("\x1b[7m{word}\x1b[0m"),
            Self::Brackets => format!("[{word}]"),
        }
    }
}

/// Render the whole sequence with the word at `highlight` marked.
pub fn render(words: &WordSequence, highlight: Option<usize>, marker: Marker) -> String {
    render_range(words, 0, words.len(), highlight, marker)
}

/// Render up to `radius` words either side of the highlight, with
/// ellipses where words were cut. Without a highlight the head is shown.
pub fn render_window(
    words: &WordSequence,
    highlight: Option<usize>,
    radius: usize,
    marker: Marker,
) -> String {
    let centre = highlight.unwrap_or(0).min(words.len().saturating_sub(1));
    let start = centre.saturating_sub(radius);
    let end = (centre + radius + 1).min(words.len());

    let mut out = String::new();
    if start > 0 {
        out.push_str("… ");
    }
    out.push_str(&render_range(words, start, end, highlight, marker));
    if end < words.len() {
        out.push_str(" …");
    }
    out
}

fn render_range(
    words: &WordSequence,
    start: usize,
    end: usize,
    highlight: Option<usize>,
    marker: Marker,
) -> String {
    words.words()[start..end]
        .iter()
        .enumerate()
        .map(|(i, w)| {
            if Some(start + i) == highlight {
                marker.wrap(w)
            } else {
                w.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
