//! Predictive-text lexicon engine: a mutable code-point trie with unigram,
//! bigram and shortcut entries, a typo/gesture tolerant suggestion search,
//! and the learning + compaction protocol for user dictionaries.

pub mod codec;
pub mod dict;
pub mod mutation;
pub mod scoring;
pub mod search;
pub mod settings;

/// Longest word (in code points) the store accepts.
pub const MAX_WORD_LENGTH: usize = 48;
/// Upper bound on the number of suggestions a single search returns.
pub const MAX_RESULTS: usize = 18;
/// Most gesture samples a search accepts; sample indices are stored as `u16`.
pub const MAX_GESTURE_SAMPLES: usize = u16::MAX as usize;
/// Auto-commit confidence above this settles the first word of a gesture.
pub const CONFIDENCE_TO_AUTO_COMMIT: i32 = 1_000_000;
pub const NOT_A_PROBABILITY: i32 = -1;
pub const NOT_A_TIMESTAMP: i32 = -1;
pub const MAX_PROBABILITY: i32 = 255;
pub const MAX_SCORE: i32 = i32::MAX;
