use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::hash::Hash;
use std::time::Instant;

use crate::dict::NodeId;

use super::gesture::GestureState;
use super::rank::TopK;
use super::typed::TypedState;
use super::SearchOptions;

/// Heap item: lowest cost first, ties in push order.
struct Open<S> {
    cost: f32,
    seq: u32,
    state: S,
}

impl<S> PartialEq for Open<S> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<S> Eq for Open<S> {}

impl<S> PartialOrd for Open<S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<S> Ord for Open<S> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the cheapest state pops first.
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Best-first frontier with a best-known-cost map, so each state is
/// expanded at most once, at its lowest cost.
pub(crate) struct Frontier<S> {
    open: BinaryHeap<Open<S>>,
    best: HashMap<S, f32>,
    seq: u32,
}

impl<S: Copy + Eq + Hash> Frontier<S> {
    fn new() -> Self {
        Self {
            open: BinaryHeap::new(),
            best: HashMap::new(),
            seq: 0,
        }
    }

    fn clear(&mut self) {
        self.open.clear();
        self.best.clear();
        self.seq = 0;
    }

    pub(crate) fn push(&mut self, state: S, cost: f32) {
        match self.best.entry(state) {
            Entry::Occupied(mut e) => {
                if *e.get() <= cost {
                    return;
                }
                e.insert(cost);
            }
            Entry::Vacant(e) => {
                e.insert(cost);
            }
        }
        self.seq = self.seq.wrapping_add(1);
        self.open.push(Open {
            cost,
            seq: self.seq,
            state,
        });
    }

    /// Cheapest state not superseded by a later, cheaper push.
    pub(crate) fn pop(&mut self) -> Option<(S, f32)> {
        while let Some(Open { cost, state, .. }) = self.open.pop() {
            if self.best.get(&state).is_some_and(|&b| b < cost) {
                continue;
            }
            return Some((state, cost));
        }
        None
    }
}

/// Per-caller traversal workspace. Buffers keep their capacity between
/// queries; contents are cleared at the start of each search.
pub struct SearchSession {
    pub(crate) typed: Frontier<TypedState>,
    pub(crate) gesture: Frontier<GestureState>,
    /// (first word, node) pairs already offered.
    pub(crate) emitted: HashSet<(Option<NodeId>, NodeId)>,
    pub(crate) top: TopK,
    expansions: usize,
    deadline: Option<Instant>,
    max_expansions: usize,
    queries: u64,
}

impl Default for SearchSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchSession {
    pub fn new() -> Self {
        Self {
            typed: Frontier::new(),
            gesture: Frontier::new(),
            emitted: HashSet::new(),
            top: TopK::new(0),
            expansions: 0,
            deadline: None,
            max_expansions: 0,
            queries: 0,
        }
    }

    /// Number of searches run through this session.
    pub fn queries(&self) -> u64 {
        self.queries
    }

    pub(crate) fn reset(&mut self, options: &SearchOptions, k: usize) {
        self.typed.clear();
        self.gesture.clear();
        self.emitted.clear();
        self.top.reset(k);
        self.expansions = 0;
        self.deadline = options.deadline;
        self.max_expansions = options.max_expansions;
        self.queries += 1;
    }

    /// Count one expansion; false once the budget or deadline is spent.
    pub(crate) fn tick(&mut self) -> bool {
        self.expansions += 1;
        if self.expansions > self.max_expansions {
            return false;
        }
        // Sample the clock every 64 expansions.
        if self.expansions % 64 == 0 {
            if let Some(deadline) = self.deadline {
                return Instant::now() < deadline;
            }
        }
        true
    }

    pub(crate) fn expansions(&self) -> usize {
        self.expansions
    }
}
