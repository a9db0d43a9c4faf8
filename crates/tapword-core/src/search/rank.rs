use std::cmp::Ordering;

use super::SuggestionKind;
use crate::{MAX_PROBABILITY, MAX_SCORE};

/// Score points per probability point.
pub(crate) const SCORE_SCALE: f32 = 1000.0;

/// Language-model probability minus weighted traversal cost, in score points.
pub(crate) fn compose_score(probability: i32, cost: f32, cost_weight: f32) -> i32 {
    let score = probability as f32 * SCORE_SCALE - cost * cost_weight * SCORE_SCALE;
    score.round().clamp(i32::MIN as f32, MAX_SCORE as f32) as i32
}

/// Best score any word could still reach at `cost`.
pub(crate) fn score_ceiling(cost: f32, cost_weight: f32) -> i32 {
    compose_score(MAX_PROBABILITY, cost, cost_weight)
}

#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub word: Vec<u32>,
    pub score: i32,
    pub kind: SuggestionKind,
    pub exact: bool,
    pub offensive: bool,
    pub second_word_start: Option<usize>,
}

/// Higher score first; an exact match beats an equal-scoring fuzzy one;
/// code-point order breaks remaining ties so the list is reproducible.
pub(crate) fn rank_order(a: &Candidate, b: &Candidate) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| b.exact.cmp(&a.exact))
        .then_with(|| a.word.cmp(&b.word))
}

/// The best `k` candidates seen so far, kept in rank order.
pub(crate) struct TopK {
    items: Vec<Candidate>,
    k: usize,
}

impl TopK {
    pub fn new(k: usize) -> Self {
        Self {
            items: Vec::with_capacity(k),
            k,
        }
    }

    pub fn reset(&mut self, k: usize) {
        self.items.clear();
        self.k = k;
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.k
    }

    pub fn worst_score(&self) -> Option<i32> {
        self.items.last().map(|c| c.score)
    }

    pub fn insert(&mut self, candidate: Candidate) {
        let pos = self
            .items
            .partition_point(|e| rank_order(e, &candidate) != Ordering::Greater);
        if pos >= self.k {
            return;
        }
        self.items.insert(pos, candidate);
        if self.items.len() > self.k {
            self.items.pop();
        }
    }

    pub fn take(&mut self) -> Vec<Candidate> {
        std::mem::take(&mut self.items)
    }
}

/// Sort, drop repeated words (keeping the best-ranked), and cap at `k`.
pub(crate) fn finalize(mut candidates: Vec<Candidate>, k: usize) -> Vec<Candidate> {
    candidates.sort_by(rank_order);
    let mut out: Vec<Candidate> = Vec::with_capacity(k.min(candidates.len()));
    for c in candidates {
        if out.len() >= k {
            break;
        }
        if out.iter().any(|o| o.word == c.word) {
            continue;
        }
        out.push(c);
    }
    out
}
