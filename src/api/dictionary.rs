use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, debug_span, warn};

use tapword_core::codec::{flush_file, from_code_points, open_file, to_code_points, write_file};
use tapword_core::dict::{DictError, DictStore, UnigramProperty};
use tapword_core::mutation::{compact_to, LanguageModelUpdate};
use tapword_core::scoring;
use tapword_core::search::{self, ProximityModel, SearchInput, SearchOptions, Suggestion};
use tapword_core::{CONFIDENCE_TO_AUTO_COMMIT, MAX_WORD_LENGTH, NOT_A_PROBABILITY};

use super::session_pool::SessionPool;

const UNIGRAM_COUNT: &str = "UNIGRAM_COUNT";
const BIGRAM_COUNT: &str = "BIGRAM_COUNT";
const MAX_UNIGRAM_COUNT: &str = "MAX_UNIGRAM_COUNT";
const MAX_BIGRAM_COUNT: &str = "MAX_BIGRAM_COUNT";

/// Keys understood by [`BinaryDictionary::get_property`].
pub const PROPERTY_KEYS: [&str; 4] = [
    UNIGRAM_COUNT,
    BIGRAM_COUNT,
    MAX_UNIGRAM_COUNT,
    MAX_BIGRAM_COUNT,
];

/// An open dictionary file.
///
/// Queries take a snapshot of the current store and run against it without
/// holding any lock, so a concurrent write or compaction never disturbs a
/// search in flight; the search simply finishes on the version it started
/// with. Writes go through [`Arc::make_mut`], which copies the store only when
/// a reader still holds the old version.
///
/// After [`close`](Self::close) every query returns its empty sentinel and
/// every write is a no-op.
pub struct BinaryDictionary {
    path: PathBuf,
    store: RwLock<Option<Arc<DictStore>>>,
    sessions: SessionPool,
}

impl BinaryDictionary {
    /// Open `length` bytes at `offset` of `path`.
    ///
    /// An updatable dictionary must be a whole dynamic-format file.
    pub fn open(
        path: impl AsRef<Path>,
        offset: u64,
        length: u64,
        updatable: bool,
    ) -> Result<Self, DictError> {
        let path = path.as_ref();
        let _span = debug_span!("open", path = %path.display(), updatable).entered();
        let store = open_file(path, offset, length, updatable)?;
        debug!(
            version = store.version(),
            unigrams = store.unigram_count(),
            bigrams = store.bigram_count()
        );
        Ok(Self {
            path: path.to_path_buf(),
            store: RwLock::new(Some(Arc::new(store))),
            sessions: SessionPool::default(),
        })
    }

    /// Write a new empty dictionary to `path`. Failure is logged, not raised.
    pub fn create_empty(
        path: impl AsRef<Path>,
        version: u8,
        attributes: &BTreeMap<String, String>,
    ) -> bool {
        let path = path.as_ref();
        let result = DictStore::empty(version, attributes.clone())
            .and_then(|store| write_file(&store, path));
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %path.display(), version, error = %e, "create_empty failed");
                false
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, Option<Arc<DictStore>>> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, Option<Arc<DictStore>>> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// The current store version, or `None` once closed.
    fn snapshot(&self) -> Option<Arc<DictStore>> {
        self.read_guard().clone()
    }

    /// Run a write against the store. A closed dictionary ignores it.
    fn mutate<T: Default>(
        &self,
        op: impl FnOnce(&mut DictStore) -> Result<T, DictError>,
    ) -> Result<T, DictError> {
        let mut guard = self.write_guard();
        let Some(store) = guard.as_mut() else {
            return Ok(T::default());
        };
        if !store.is_updatable() {
            return Err(DictError::ReadOnly);
        }
        op(Arc::make_mut(store))
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    /// Ranked suggestions for `input`, searched in the workspace of `session_id`.
    pub fn get_suggestions(
        &self,
        input: &SearchInput,
        previous_word: Option<&str>,
        model: &dyn ProximityModel,
        block_offensive: bool,
        session_id: i32,
        options: &SearchOptions,
    ) -> Vec<Suggestion> {
        let (store, session) = {
            let guard = self.read_guard();
            let Some(store) = guard.clone() else {
                return Vec::new();
            };
            // Under the read guard so `close` cannot clear the pool in between.
            (store, self.sessions.get_or_create(session_id))
        };
        let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = previous_word
            .filter(|w| !w.is_empty())
            .map(to_code_points);
        let options = SearchOptions {
            block_offensive,
            ..options.clone()
        };
        search::search(
            &mut session,
            &store,
            input,
            previous.as_deref(),
            model,
            &options,
        )
    }

    /// Stored probability of a visible word, else [`NOT_A_PROBABILITY`].
    ///
    /// Linkage and blacklisted entries are hidden here but still reported by
    /// [`get_unigram_property`](Self::get_unigram_property).
    pub fn get_unigram_probability(&self, word: &str) -> i32 {
        let Some(word) = checked_word(word) else {
            return NOT_A_PROBABILITY;
        };
        let Some(store) = self.snapshot() else {
            return NOT_A_PROBABILITY;
        };
        store
            .lookup_unigram(&word)
            .filter(|u| u.is_word() && !u.is_blacklisted)
            .map_or(NOT_A_PROBABILITY, |u| u.probability as i32)
    }

    pub fn is_valid_word(&self, word: &str) -> bool {
        self.get_unigram_probability(word) != NOT_A_PROBABILITY
    }

    /// Stored probability of the bigram `word0 → word1`, else [`NOT_A_PROBABILITY`].
    pub fn get_bigram_probability(&self, word0: &str, word1: &str) -> i32 {
        let (Some(word0), Some(word1)) = (checked_word(word0), checked_word(word1)) else {
            return NOT_A_PROBABILITY;
        };
        let Some(store) = self.snapshot() else {
            return NOT_A_PROBABILITY;
        };
        store
            .lookup_bigram(&word0, &word1)
            .map_or(NOT_A_PROBABILITY, |b| b.probability as i32)
    }

    pub fn is_valid_bigram(&self, word0: &str, word1: &str) -> bool {
        self.get_bigram_probability(word0, word1) != NOT_A_PROBABILITY
    }

    /// Everything stored about `word`, linkage entries included.
    pub fn get_unigram_property(&self, word: &str) -> Option<UnigramProperty> {
        let word = checked_word(word)?;
        self.snapshot()?.unigram_property(&word)
    }

    /// Words starting with `prefix`, in code-point order, at most `limit`.
    pub fn words_with_prefix(&self, prefix: &str, limit: usize) -> Vec<String> {
        let Some(store) = self.snapshot() else {
            return Vec::new();
        };
        let prefix_cps = to_code_points(prefix);
        store
            .iter_prefix(&prefix_cps)
            .filter(|(_, node)| node.word_entry().is_some())
            .take(limit)
            .map(|(suffix, _)| {
                let mut word = prefix.to_string();
                word.push_str(&from_code_points(&suffix));
                word
            })
            .collect()
    }

    /// Diagnostic counters by name; unknown keys and a closed dictionary give `""`.
    pub fn get_property(&self, query: &str) -> String {
        let Some(store) = self.snapshot() else {
            return String::new();
        };
        match query {
            UNIGRAM_COUNT => store.unigram_count().to_string(),
            BIGRAM_COUNT => store.bigram_count().to_string(),
            MAX_UNIGRAM_COUNT => store.max_unigram_count().to_string(),
            MAX_BIGRAM_COUNT => store.max_bigram_count().to_string(),
            _ => String::new(),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<String> {
        self.snapshot()?.attribute(key).map(str::to_string)
    }

    pub fn format_version(&self) -> Option<u8> {
        self.snapshot().map(|s| s.version())
    }

    /// Re-run the structural consistency check.
    pub fn has_valid_contents(&self) -> bool {
        self.snapshot().is_some_and(|s| s.validate().is_ok())
    }

    /// Whether the dictionary is still open.
    pub fn is_valid(&self) -> bool {
        self.read_guard().is_some()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn calculate_probability(unigram_probability: i32, bigram_probability: i32) -> i32 {
        scoring::calculate_probability(unigram_probability, bigram_probability)
    }

    pub fn should_auto_commit(suggestion: &Suggestion) -> bool {
        suggestion.auto_commit_confidence > CONFIDENCE_TO_AUTO_COMMIT
    }

    // -----------------------------------------------------------------
    // Learning
    // -----------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn add_unigram(
        &self,
        word: &str,
        probability: i32,
        shortcut_target: Option<&str>,
        shortcut_probability: i32,
        is_not_a_word: bool,
        is_blacklisted: bool,
        timestamp: i32,
    ) -> Result<(), DictError> {
        let word = to_code_points(word);
        let target = shortcut_target.map(to_code_points);
        self.mutate(|store| {
            store.add_unigram(
                &word,
                probability,
                target.as_deref(),
                shortcut_probability,
                is_not_a_word,
                is_blacklisted,
                timestamp,
            )
        })
    }

    pub fn add_bigram(
        &self,
        word0: &str,
        word1: &str,
        probability: i32,
        timestamp: i32,
    ) -> Result<(), DictError> {
        let (word0, word1) = (to_code_points(word0), to_code_points(word1));
        self.mutate(|store| store.add_bigram(&word0, &word1, probability, timestamp))
    }

    /// Returns whether a live bigram was removed.
    pub fn remove_bigram(&self, word0: &str, word1: &str) -> Result<bool, DictError> {
        let (word0, word1) = (to_code_points(word0), to_code_points(word1));
        self.mutate(|store| store.remove_bigram(&word0, &word1))
    }

    /// Apply every update in order, compacting to disk whenever the store
    /// asks for it mid-batch. Returns the number of updates consumed.
    ///
    /// If a mid-batch compaction fails the batch stops there and the count
    /// consumed so far is returned; the host resumes from that offset.
    pub fn add_batch(&self, updates: &[LanguageModelUpdate]) -> Result<usize, DictError> {
        let _span = debug_span!("add_batch", len = updates.len()).entered();
        let mut guard = self.write_guard();
        let Some(store) = guard.as_mut() else {
            return Ok(0);
        };
        if !store.is_updatable() {
            return Err(DictError::ReadOnly);
        }
        let mut consumed = 0;
        let mut compactions = 0;
        while consumed < updates.len() {
            consumed += Arc::make_mut(store).apply_batch(&updates[consumed..])?;
            if store.needs_compaction(true) {
                match compact_to(store, &self.path) {
                    Ok(compacted) => *store = Arc::new(compacted),
                    Err(e) => {
                        warn!(consumed, compactions, error = %e, "compaction failed mid-batch");
                        return Ok(consumed);
                    }
                }
                compactions += 1;
            }
        }
        debug!(consumed, compactions);
        Ok(consumed)
    }

    /// Whether a compaction is due. With `respect_blocking`, only the
    /// thresholds that must not wait are considered.
    pub fn needs_compaction(&self, respect_blocking: bool) -> bool {
        self.snapshot()
            .is_some_and(|s| s.needs_compaction(respect_blocking))
    }

    // -----------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------

    /// Write pending changes. Nothing is written when nothing changed.
    pub fn flush(&self) -> Result<(), DictError> {
        let _span = debug_span!("flush").entered();
        let mut guard = self.write_guard();
        let Some(store) = guard.as_mut() else {
            return Ok(());
        };
        if !store.is_dirty() {
            return Ok(());
        }
        let written = flush_file(Arc::make_mut(store), &self.path)?;
        debug!(written);
        Ok(())
    }

    /// Compact into a fresh file and switch to it. On failure the previous
    /// file and the in-memory store are left as they were.
    pub fn flush_with_compaction(&self) -> Result<(), DictError> {
        let _span = debug_span!("flush_with_compaction").entered();
        let mut guard = self.write_guard();
        let Some(store) = guard.as_mut() else {
            return Ok(());
        };
        if !store.is_updatable() {
            return Err(DictError::ReadOnly);
        }
        let compacted = compact_to(store, &self.path)?;
        debug!(
            unigrams = compacted.unigram_count(),
            bigrams = compacted.bigram_count()
        );
        *store = Arc::new(compacted);
        Ok(())
    }

    /// Release every session, then the store. Later calls see a closed
    /// dictionary; closing twice is harmless.
    pub fn close(&self) {
        let mut guard = self.write_guard();
        self.sessions.clear();
        if guard.take().is_some() {
            debug!(path = %self.path.display(), "closed");
        }
    }
}

impl fmt::Debug for BinaryDictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryDictionary")
            .field("path", &self.path)
            .field("open", &self.is_valid())
            .field("sessions", &self.session_count())
            .finish()
    }
}

impl Drop for BinaryDictionary {
    fn drop(&mut self) {
        self.close();
    }
}

/// Code points of a query word, or `None` when no entry could match it.
fn checked_word(word: &str) -> Option<Vec<u32>> {
    let cps = to_code_points(word);
    (!cps.is_empty() && cps.len() <= MAX_WORD_LENGTH).then_some(cps)
}
