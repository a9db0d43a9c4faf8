//! Learning writes against an updatable store, and the compaction policy
//! that keeps it dense.
//!
//! All writes go through `&mut DictStore`. The engine holds the live store
//! in an `Arc` and mutates through `Arc::make_mut`, so searches that cloned
//! the previous snapshot keep reading a consistent trie.

mod gc;

pub use gc::compact_to;

use tracing::{debug, debug_span, warn};

use crate::dict::{
    BigramEdge, BigramEntry, DictError, DictStore, HistoricalInfo, NodeId, ShortcutEntry,
    UnigramEntry,
};
use crate::scoring::record_use;
use crate::settings::settings;
use crate::{MAX_PROBABILITY, MAX_WORD_LENGTH, NOT_A_TIMESTAMP};

/// One learning event in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageModelUpdate {
    /// Preceding word; when present, a bigram `word0 → word1` is written too.
    pub word0: Option<Vec<u32>>,
    pub word1: Vec<u32>,
    pub unigram_probability: i32,
    pub bigram_probability: i32,
    pub shortcut_target: Option<Vec<u32>>,
    pub shortcut_probability: i32,
    pub is_not_a_word: bool,
    pub is_blacklisted: bool,
    pub timestamp: i32,
}

fn check_word(word: &[u32], what: &str) -> Result<(), DictError> {
    if word.is_empty() || word.len() > MAX_WORD_LENGTH {
        return Err(DictError::InvalidArgument(format!(
            "{what} must have 1..={MAX_WORD_LENGTH} code points, got {}",
            word.len()
        )));
    }
    Ok(())
}

fn check_probability(probability: i32) -> Result<u8, DictError> {
    if !(0..=MAX_PROBABILITY).contains(&probability) {
        return Err(DictError::InvalidArgument(format!(
            "probability {probability} out of range 0..={MAX_PROBABILITY}"
        )));
    }
    Ok(probability as u8)
}

fn bump(info: &HistoricalInfo, timestamp: i32) -> HistoricalInfo {
    if timestamp == NOT_A_TIMESTAMP {
        *info
    } else {
        record_use(info, timestamp)
    }
}

impl DictStore {
    fn ensure_writable(&self) -> Result<(), DictError> {
        if self.updatable {
            Ok(())
        } else {
            Err(DictError::ReadOnly)
        }
    }

    /// Add or update a unigram. An existing entry takes the new probability
    /// and flags, and its usage history records one more use.
    #[allow(clippy::too_many_arguments)]
    pub fn add_unigram(
        &mut self,
        word: &[u32],
        probability: i32,
        shortcut_target: Option<&[u32]>,
        shortcut_probability: i32,
        is_not_a_word: bool,
        is_blacklisted: bool,
        timestamp: i32,
    ) -> Result<(), DictError> {
        self.ensure_writable()?;
        check_word(word, "word")?;
        let probability = check_probability(probability)?;
        let shortcut = match shortcut_target {
            Some(target) => {
                check_word(target, "shortcut target")?;
                Some((target, check_probability(shortcut_probability)?))
            }
            None => None,
        };

        let id = self.insert_path(word);
        let previous = self.nodes[id as usize].unigram;
        if previous.is_none() {
            self.unigram_count += 1;
        }
        let history = previous.map_or(HistoricalInfo::EMPTY, |u| u.historical);
        self.nodes[id as usize].unigram = Some(UnigramEntry {
            probability,
            is_not_a_word,
            is_blacklisted,
            historical: bump(&history, timestamp),
        });
        if let Some((target, probability)) = shortcut {
            self.put_shortcut(id, target, probability);
        }
        self.touch(timestamp);
        Ok(())
    }

    fn put_shortcut(&mut self, id: NodeId, target: &[u32], probability: u8) {
        let node = &mut self.nodes[id as usize];
        match node.shortcuts.iter_mut().find(|s| s.target == target) {
            Some(shortcut) => shortcut.probability = probability,
            None => node.shortcuts.push(ShortcutEntry {
                target: target.to_vec(),
                probability,
            }),
        }
    }

    /// Node for `word`, creating a not-a-word entry when it has none so a
    /// bigram can hang off it.
    fn ensure_linkage(&mut self, word: &[u32]) -> NodeId {
        let id = self.insert_path(word);
        let node = &mut self.nodes[id as usize];
        if node.unigram.is_none() {
            node.unigram = Some(UnigramEntry {
                probability: 0,
                is_not_a_word: true,
                is_blacklisted: false,
                historical: HistoricalInfo::EMPTY,
            });
            self.unigram_count += 1;
        }
        id
    }

    /// Add or update the directed bigram `word0 → word1`.
    pub fn add_bigram(
        &mut self,
        word0: &[u32],
        word1: &[u32],
        probability: i32,
        timestamp: i32,
    ) -> Result<(), DictError> {
        self.ensure_writable()?;
        check_word(word0, "word0")?;
        check_word(word1, "word1")?;
        let probability = check_probability(probability)?;

        let source = self.ensure_linkage(word0);
        let target = self.ensure_linkage(word1);
        let node = &mut self.nodes[source as usize];
        match node.bigrams.iter_mut().find(|b| b.target == target) {
            Some(edge) if edge.live => {
                edge.entry.probability = probability;
                edge.entry.historical = bump(&edge.entry.historical, timestamp);
            }
            Some(edge) => {
                // Tombstone of an earlier edge to the same slot: revive with fresh history.
                edge.live = true;
                edge.entry.probability = probability;
                edge.entry.historical = bump(&HistoricalInfo::EMPTY, timestamp);
                self.dead_bigrams -= 1;
                self.bigram_count += 1;
            }
            None => {
                node.bigrams.push(BigramEdge {
                    target,
                    entry: BigramEntry {
                        probability,
                        historical: bump(&HistoricalInfo::EMPTY, timestamp),
                    },
                    live: true,
                });
                self.bigram_count += 1;
            }
        }
        self.touch(timestamp);
        Ok(())
    }

    /// Remove the bigram `word0 → word1`. Returns whether an edge existed.
    ///
    /// The edge is tombstoned; linkage-only endpoints left without any edge
    /// go to the free list.
    pub fn remove_bigram(&mut self, word0: &[u32], word1: &[u32]) -> Result<bool, DictError> {
        self.ensure_writable()?;
        check_word(word0, "word0")?;
        check_word(word1, "word1")?;
        let (Some(source), Some(target)) =
            (self.find_unigram_node(word0), self.find_unigram_node(word1))
        else {
            return Ok(false);
        };
        let Some(edge) = self.nodes[source as usize]
            .bigrams
            .iter_mut()
            .find(|b| b.live && b.target == target)
        else {
            return Ok(false);
        };
        edge.live = false;
        self.bigram_count -= 1;
        self.dead_bigrams += 1;
        self.release_linkage(source);
        self.release_linkage(target);
        self.touch(NOT_A_TIMESTAMP);
        Ok(true)
    }

    /// Apply updates in order until the store needs a blocking compaction.
    ///
    /// Returns how many updates were consumed, always at least one for a
    /// non-empty batch. The caller compacts and resumes from that offset.
    /// Updates with invalid words or probabilities are skipped and counted.
    pub fn apply_batch(&mut self, updates: &[LanguageModelUpdate]) -> Result<usize, DictError> {
        let _span = debug_span!("apply_batch", len = updates.len()).entered();
        self.ensure_writable()?;
        let mut consumed = 0;
        let mut skipped = 0;
        for update in updates {
            consumed += 1;
            if let Err(e) = self.apply_update(update) {
                warn!(error = %e, "skipping invalid update");
                skipped += 1;
            }
            if self.needs_compaction(true) {
                break;
            }
        }
        debug!(consumed, skipped, garbage = self.garbage_count());
        Ok(consumed)
    }

    fn apply_update(&mut self, u: &LanguageModelUpdate) -> Result<(), DictError> {
        self.add_unigram(
            &u.word1,
            u.unigram_probability,
            u.shortcut_target.as_deref(),
            u.shortcut_probability,
            u.is_not_a_word,
            u.is_blacklisted,
            u.timestamp,
        )?;
        if let Some(word0) = &u.word0 {
            self.add_bigram(word0, &u.word1, u.bigram_probability, u.timestamp)?;
        }
        Ok(())
    }

    /// Whether compaction should run now.
    ///
    /// With `respect_blocking` only the hard limits count: garbage past the
    /// blocking threshold, or a decaying dictionary over its entry limits.
    /// Without it, the lower idle garbage threshold counts as well.
    pub fn needs_compaction(&self, respect_blocking: bool) -> bool {
        if !self.updatable {
            return false;
        }
        let gc = &settings().gc;
        let garbage = self.garbage_count();
        if garbage >= gc.max_garbage_entries {
            return true;
        }
        if self.uses_forgetting_curve()
            && (self.unigram_count > self.max_unigram_count()
                || self.bigram_count > self.max_bigram_count())
        {
            return true;
        }
        !respect_blocking && garbage >= gc.idle_garbage_entries
    }
}
