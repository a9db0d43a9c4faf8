use crate::dict::{NodeId, ROOT};
use crate::scoring::bigram_score;
use crate::settings::settings;

use super::proximity::TouchPoint;
use super::rank::{compose_score, score_ceiling, Candidate};
use super::session::SearchSession;
use super::{GestureSample, SearchContext, SuggestionKind};

const SPACE: u32 = ' ' as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct GestureState {
    node: NodeId,
    /// Sample the last letter was matched at; `None` before the first letter.
    last: Option<u16>,
    /// End node of the first word once a word break was taken.
    first: Option<NodeId>,
}

/// Samples of the pointer that started the gesture, in order.
fn primary_trace(samples: &[GestureSample]) -> Vec<TouchPoint> {
    let Some(pointer) = samples.first().map(|s| s.pointer_id) else {
        return Vec::new();
    };
    samples
        .iter()
        .filter(|s| s.pointer_id == pointer)
        .map(|s| TouchPoint::new(s.x, s.y))
        .collect()
}

/// Match letters along the trace. The first letter sits on the first
/// sample, the word's last letter on the final sample, and every letter in
/// between within `max_skip` samples of its predecessor. One word break is
/// allowed, which yields a two-word suggestion.
pub(crate) fn search_gesture(
    session: &mut SearchSession,
    ctx: &SearchContext,
    samples: &[GestureSample],
    prefix: &[u32],
) -> Vec<Candidate> {
    let g = &settings().gesture;
    let cost_weight = settings().search.cost_weight;
    let trace = primary_trace(samples);
    let end = trace.len() - 1;
    let start = if prefix.is_empty() {
        Some(ROOT)
    } else {
        ctx.store.find_node(prefix)
    };
    let Some(start) = start else {
        return Vec::new();
    };
    let mut best_terminal: Option<f32> = None;

    session.gesture.push(
        GestureState {
            node: start,
            last: None,
            first: None,
        },
        0.0,
    );
    while let Some((state, cost)) = session.gesture.pop() {
        if best_terminal.is_some_and(|best| cost > best + ctx.options.beam_width) {
            break;
        }
        if session.top.is_full()
            && session
                .top
                .worst_score()
                .is_some_and(|worst| score_ceiling(cost, cost_weight) < worst)
        {
            break;
        }
        if !session.tick() {
            break;
        }

        let node = ctx.store.node(state.node);
        let at_end = state.last.map(usize::from) == Some(end);
        if at_end && node.word_entry().is_some() {
            best_terminal.get_or_insert(cost);
            if session.emitted.insert((state.first, state.node)) {
                if let Some(candidate) = candidate(ctx, state, cost) {
                    session.top.insert(candidate);
                }
            }
        }

        let Some(last) = state.last.map(usize::from) else {
            // First letter: anchored on the first sample.
            for &child in node.children() {
                let letter = ctx.store.node(child).code_point();
                if let Some(c) = ctx.model.cost(trace[0], letter) {
                    session.gesture.push(
                        GestureState {
                            node: child,
                            last: Some(0),
                            first: state.first,
                        },
                        cost + c,
                    );
                }
            }
            continue;
        };
        if last == end {
            continue;
        }

        let window = last..=(last + g.max_skip).min(end);
        for &child in node.children() {
            let letter = ctx.store.node(child).code_point();
            for j in window.clone() {
                if let Some(c) = ctx.model.cost(trace[j], letter) {
                    session.gesture.push(
                        GestureState {
                            node: child,
                            last: Some(j as u16),
                            first: state.first,
                        },
                        cost + c + g.skip_cost * (j - last) as f32,
                    );
                }
            }
        }
        if state.first.is_none() && node.word_entry().is_some() {
            session.gesture.push(
                GestureState {
                    node: ROOT,
                    last: state.last,
                    first: Some(state.node),
                },
                cost + g.space_cost,
            );
        }
    }
    session.top.take()
}

fn candidate(ctx: &SearchContext, state: GestureState, cost: f32) -> Option<Candidate> {
    let store = ctx.store;
    let cost_weight = settings().search.cost_weight;
    let entry = store.node(state.node).word_entry()?;
    let context = |id: NodeId| {
        ctx.previous
            .map(|(prev, prev_entry)| (prev_entry, store.bigram_between(prev, id)))
    };

    match state.first {
        None => {
            if ctx.options.block_offensive && entry.is_blacklisted {
                return None;
            }
            let (prev_entry, bigram) = context(state.node).unzip();
            let lm = bigram_score(store, prev_entry, entry, bigram.flatten());
            Some(Candidate {
                word: store.word_of(state.node),
                score: compose_score(lm, cost, cost_weight),
                kind: SuggestionKind::Correction,
                exact: false,
                offensive: entry.is_blacklisted,
                second_word_start: None,
            })
        }
        Some(first) => {
            let first_entry = store.node(first).word_entry()?;
            let offensive = entry.is_blacklisted || first_entry.is_blacklisted;
            if ctx.options.block_offensive && offensive {
                return None;
            }
            let (prev_entry, bigram) = context(first).unzip();
            let first_lm = bigram_score(store, prev_entry, first_entry, bigram.flatten());
            let second_lm = bigram_score(
                store,
                Some(first_entry),
                entry,
                store.bigram_between(first, state.node),
            );
            let mut word = store.word_of(first);
            let split = word.len() + 1;
            word.push(SPACE);
            word.extend(store.word_of(state.node));
            Some(Candidate {
                word,
                score: compose_score((first_lm + second_lm) / 2, cost, cost_weight),
                kind: SuggestionKind::Correction,
                exact: false,
                offensive,
                second_word_start: Some(split),
            })
        }
    }
}
