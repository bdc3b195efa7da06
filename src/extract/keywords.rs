//! Frequency-ranked keyword extraction

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default number of keywords kept per document
pub const DEFAULT_MAX_KEYWORDS: usize = 10;

/// Tokens with this many characters or fewer are discarded
const MIN_TOKEN_CHARS: usize = 3;

/// A keyword and how often it occurs in the document text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub word: String,
    pub frequency: u32,
}

/// Ranks the words of `text` by frequency
///
/// Text is lowercased and split on whitespace; tokens of three characters or
/// fewer are dropped. The result is sorted by frequency descending, ties keep
/// first-occurrence order, and at most `max_keywords` entries are returned.
///
/// ```
/// use pdf_harvester::extract::rank_keywords;
///
/// let ranked = rank_keywords("Rust rust and the borrow checker rust", 2);
/// assert_eq!(ranked[0].word, "rust");
/// assert_eq!(ranked[0].frequency, 3);
/// assert_eq!(ranked[1].word, "borrow");
/// ```
pub fn rank_keywords(text: &str, max_keywords: usize) -> Vec<Keyword> {
    let lowered = text.to_lowercase();

    // word -> index into `ranked`, which preserves first-occurrence order
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut ranked: Vec<Keyword> = Vec::new();

    for token in lowered.split_whitespace() {
        if token.chars().count() <= MIN_TOKEN_CHARS {
            continue;
        }
        match positions.get(token) {
            Some(&index) => ranked[index].frequency += 1,
            None => {
                positions.insert(token, ranked.len());
                ranked.push(Keyword {
                    word: token.to_string(),
                    frequency: 1,
                });
            }
        }
    }

    // sort_by is stable
    ranked.sort_by(|a, b| b.frequency.cmp(&a.frequency));
    ranked.truncate(max_keywords);
    ranked
}
