use serde::{Deserialize, Serialize};

use crate::NOT_A_TIMESTAMP;

/// Usage history attached to learned entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalInfo {
    pub timestamp: i32,
    pub level: u8,
    pub count: u16,
}

impl HistoricalInfo {
    pub const EMPTY: HistoricalInfo = HistoricalInfo {
        timestamp: NOT_A_TIMESTAMP,
        level: 0,
        count: 0,
    };

    pub fn is_empty(&self) -> bool {
        self.timestamp == NOT_A_TIMESTAMP && self.count == 0
    }
}

impl Default for HistoricalInfo {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnigramEntry {
    pub probability: u8,
    pub is_not_a_word: bool,
    pub is_blacklisted: bool,
    pub historical: HistoricalInfo,
}

impl UnigramEntry {
    /// Whether the entry may be offered as a standalone word.
    pub fn is_word(&self) -> bool {
        !self.is_not_a_word
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BigramEntry {
    pub probability: u8,
    pub historical: HistoricalInfo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutEntry {
    pub target: Vec<u32>,
    pub probability: u8,
}

/// Full description of a unigram, as reported to inspection callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnigramProperty {
    pub word: String,
    pub probability: i32,
    pub is_not_a_word: bool,
    pub is_blacklisted: bool,
    pub has_bigrams: bool,
    pub has_shortcuts: bool,
    pub timestamp: i32,
    pub level: i32,
    pub count: i32,
    /// `(target, probability)` pairs.
    pub shortcuts: Vec<(String, i32)>,
}
