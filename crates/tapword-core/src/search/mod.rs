//! Suggestion search: best-first traversal of the trie guided by typed keys
//! or a gesture trace, scored with the language model and a proximity model.
//!
//! Every query runs inside a [`SearchSession`], the caller's reusable
//! scratch space. The store is only read, so any number of sessions may
//! search the same snapshot concurrently.

mod gesture;
mod proximity;
mod rank;
mod session;
#[cfg(test)]
mod tests;
mod typed;

pub use proximity::{KeyGridProximity, NoProximity, ProximityModel, TouchPoint};
pub use session::SearchSession;

use std::time::Instant;

use tracing::{debug, debug_span};

use crate::codec::from_code_points;
use crate::dict::{DictStore, NodeId, UnigramEntry};
use crate::settings::settings;
use crate::{CONFIDENCE_TO_AUTO_COMMIT, MAX_PROBABILITY, MAX_RESULTS, MAX_WORD_LENGTH};

use rank::{Candidate, SCORE_SCALE};

/// One typed key: the code point the keyboard resolved, and where it was
/// touched when known.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypedKey {
    pub code_point: u32,
    pub point: Option<TouchPoint>,
}

impl TypedKey {
    pub fn new(code_point: u32) -> Self {
        Self {
            code_point,
            point: None,
        }
    }

    pub fn at(code_point: u32, x: f32, y: f32) -> Self {
        Self {
            code_point,
            point: Some(TouchPoint::new(x, y)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureSample {
    pub x: f32,
    pub y: f32,
    pub time: i32,
    pub pointer_id: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchInput {
    Typed(Vec<TypedKey>),
    /// A swipe trace, optionally continuing an already typed prefix.
    Gesture {
        samples: Vec<GestureSample>,
        prefix: Vec<u32>,
    },
}

impl SearchInput {
    /// Typed input from plain code points, without touch positions.
    pub fn typed_word(code_points: &[u32]) -> Self {
        SearchInput::Typed(code_points.iter().map(|&cp| TypedKey::new(cp)).collect())
    }
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Capped at [`MAX_RESULTS`].
    pub max_results: usize,
    pub beam_width: f32,
    pub max_expansions: usize,
    /// Allow as many edits as there are typed keys instead of the configured budget.
    pub full_edit_distance: bool,
    /// Drop possibly offensive words unless they are exactly what was typed.
    pub block_offensive: bool,
    /// Stop expanding at this instant and return what has been found.
    pub deadline: Option<Instant>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        let s = &settings().search;
        Self {
            max_results: s.max_results,
            beam_width: s.beam_width,
            max_expansions: s.max_expansions,
            full_edit_distance: false,
            block_offensive: false,
            deadline: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuggestionKind {
    Correction,
    Completion,
    Prediction,
    Shortcut,
    Whitelist,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub word: String,
    pub score: i32,
    pub kind: SuggestionKind,
    pub exact_match: bool,
    pub possibly_offensive: bool,
    /// Code-point index where the second word of a two-word gesture begins.
    pub index_of_second_word_start: Option<usize>,
    pub auto_commit_confidence: i32,
}

impl Suggestion {
    /// Whether the host may commit the first word without confirmation.
    pub fn should_auto_commit(&self) -> bool {
        self.auto_commit_confidence > CONFIDENCE_TO_AUTO_COMMIT
    }
}

/// Read-only inputs shared by the traversal routines.
pub(crate) struct SearchContext<'a> {
    pub store: &'a DictStore,
    pub previous: Option<(NodeId, &'a UnigramEntry)>,
    pub model: &'a dyn ProximityModel,
    pub options: &'a SearchOptions,
}

/// Run one query. Never fails: bad input or an empty store yield an empty list.
pub fn search(
    session: &mut SearchSession,
    store: &DictStore,
    input: &SearchInput,
    previous_word: Option<&[u32]>,
    model: &dyn ProximityModel,
    options: &SearchOptions,
) -> Vec<Suggestion> {
    let k = options.max_results.min(MAX_RESULTS);
    let _span = debug_span!("search", k, prev = previous_word.is_some()).entered();
    session.reset(options, k);
    if k == 0 {
        return Vec::new();
    }

    let previous = previous_word
        .and_then(|w| store.find_unigram_node(w))
        .and_then(|id| store.node(id).unigram().map(|u| (id, u)));
    let ctx = SearchContext {
        store,
        previous,
        model,
        options,
    };

    let (candidates, is_gesture) = match input {
        SearchInput::Typed(keys) if keys.len() > MAX_WORD_LENGTH - 1 => return Vec::new(),
        SearchInput::Typed(keys) if keys.is_empty() => (typed::predict_next(session, &ctx), false),
        SearchInput::Typed(keys) => (typed::search_typed(session, &ctx, keys), false),
        SearchInput::Gesture { samples, prefix } => {
            if samples.is_empty()
                || samples.len() > settings().gesture.max_samples
                || prefix.len() >= MAX_WORD_LENGTH
            {
                return Vec::new();
            }
            (gesture::search_gesture(session, &ctx, samples, prefix), true)
        }
    };

    let ranked = rank::finalize(candidates, k);
    let confidence = if is_gesture {
        auto_commit_confidence(&ranked)
    } else {
        0
    };
    debug!(
        results = ranked.len(),
        expansions = session.expansions(),
        confidence
    );
    ranked
        .into_iter()
        .enumerate()
        .map(|(i, c)| Suggestion {
            word: from_code_points(&c.word),
            score: c.score,
            kind: c.kind,
            exact_match: c.exact,
            possibly_offensive: c.offensive,
            index_of_second_word_start: c.second_word_start,
            auto_commit_confidence: if i == 0 { confidence } else { 0 },
        })
        .collect()
}

/// Confidence that the first word of the top multi-word result is settled:
/// its score lead over the best result that starts with a different word,
/// scaled so a lead of half the probability range reaches the threshold.
fn auto_commit_confidence(ranked: &[Candidate]) -> i32 {
    let Some(top) = ranked.first() else {
        return 0;
    };
    let Some(split) = top.second_word_start else {
        return 0;
    };
    let first_word = &top.word[..split - 1];
    let rival = ranked[1..]
        .iter()
        .find(|c| {
            let end = c.second_word_start.map_or(c.word.len(), |s| s - 1);
            &c.word[..end] != first_word
        })
        .map_or(0, |c| c.score);
    let lead = (top.score as i64 - rival as i64).max(0);
    let half_range = (MAX_PROBABILITY as f32 * SCORE_SCALE / 2.0) as i64;
    let confidence = lead * CONFIDENCE_TO_AUTO_COMMIT as i64 / half_range;
    confidence.clamp(0, 2 * CONFIDENCE_TO_AUTO_COMMIT as i64) as i32
}
