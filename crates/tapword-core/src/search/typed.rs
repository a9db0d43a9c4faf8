use crate::codec::eq_ignore_case;
use crate::dict::{NodeId, PtNode, UnigramEntry, ROOT};
use crate::scoring::bigram_score;
use crate::settings::settings;
use crate::MAX_SCORE;

use super::rank::{compose_score, score_ceiling, Candidate};
use super::session::SearchSession;
use super::{SearchContext, SuggestionKind, TypedKey};

/// Shortcut probability that marks a whitelist substitution.
const WHITELIST_SHORTCUT_PROBABILITY: u8 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TypedState {
    node: NodeId,
    /// Typed keys consumed.
    pos: u8,
    edits: u8,
    /// Letters were appended past the end of the input.
    completed: bool,
}

/// Probability of the word at `node` in the context of the previous word.
fn language_model(ctx: &SearchContext, node: NodeId, entry: &UnigramEntry) -> i32 {
    let (prev_entry, bigram) = match ctx.previous {
        Some((prev, prev_entry)) => (Some(prev_entry), ctx.store.bigram_between(prev, node)),
        None => (None, None),
    };
    bigram_score(ctx.store, prev_entry, entry, bigram)
}

pub(crate) fn search_typed(
    session: &mut SearchSession,
    ctx: &SearchContext,
    keys: &[TypedKey],
) -> Vec<Candidate> {
    let s = &settings().search;
    let n = keys.len();
    let typed: Vec<u32> = keys.iter().map(|k| k.code_point).collect();
    let max_edits = if ctx.options.full_edit_distance {
        n.min(u8::MAX as usize) as u8
    } else {
        s.max_edits
    };
    let mut shortcuts: Vec<Candidate> = Vec::new();
    let mut best_terminal: Option<f32> = None;

    session.typed.push(
        TypedState {
            node: ROOT,
            pos: 0,
            edits: 0,
            completed: false,
        },
        0.0,
    );
    while let Some((state, cost)) = session.typed.pop() {
        if best_terminal.is_some_and(|best| cost > best + ctx.options.beam_width) {
            break;
        }
        if session.top.is_full()
            && session
                .top
                .worst_score()
                .is_some_and(|worst| score_ceiling(cost, s.cost_weight) < worst)
        {
            break;
        }
        if !session.tick() {
            break;
        }

        let pos = state.pos as usize;
        let node = ctx.store.node(state.node);
        if pos == n && state.node != ROOT {
            if let Some(entry) = node.word_entry() {
                best_terminal.get_or_insert(cost);
                if session.emitted.insert((None, state.node)) {
                    let word = ctx.store.word_of(state.node);
                    let exact = word == typed;
                    let offensive = entry.is_blacklisted;
                    if !(ctx.options.block_offensive && offensive && !exact) {
                        let lm = language_model(ctx, state.node, entry);
                        let score = compose_score(lm, cost, s.cost_weight);
                        if exact {
                            push_shortcuts(&mut shortcuts, node, score);
                        }
                        session.top.insert(Candidate {
                            word,
                            score,
                            kind: if state.completed {
                                SuggestionKind::Completion
                            } else {
                                SuggestionKind::Correction
                            },
                            exact,
                            offensive,
                            second_word_start: None,
                        });
                    }
                }
            }
        }
        expand(session, ctx, keys, state, cost, max_edits);
    }

    let mut out = session.top.take();
    out.extend(shortcuts);
    out
}

fn expand(
    session: &mut SearchSession,
    ctx: &SearchContext,
    keys: &[TypedKey],
    state: TypedState,
    cost: f32,
    max_edits: u8,
) {
    let s = &settings().search;
    let pos = state.pos as usize;
    let node = ctx.store.node(state.node);
    let can_edit = state.edits < max_edits;
    let next = |node: NodeId, pos: usize, edits: u8, completed: bool| TypedState {
        node,
        pos: pos as u8,
        edits,
        completed,
    };

    if pos == keys.len() {
        if state.node != ROOT {
            for &child in node.children() {
                session.typed.push(
                    next(child, pos, state.edits, true),
                    cost + s.completion_cost,
                );
            }
        }
        return;
    }

    let key = keys[pos];
    for &child in node.children() {
        let label = ctx.store.node(child).code_point();
        if eq_ignore_case(label, key.code_point) {
            session
                .typed
                .push(next(child, pos + 1, state.edits, false), cost);
            continue;
        }
        let near = key.point.and_then(|p| ctx.model.cost(p, label));
        if let Some(near) = near {
            session.typed.push(
                next(child, pos + 1, state.edits, false),
                cost + s.proximity_cost * near,
            );
        } else if can_edit {
            session.typed.push(
                next(child, pos + 1, state.edits + 1, false),
                cost + s.substitution_cost,
            );
        }
        if can_edit {
            // The word has a letter the user left out.
            session.typed.push(
                next(child, pos, state.edits + 1, false),
                cost + s.omission_cost,
            );
            // Two adjacent keys typed in swapped order.
            if let Some(&after) = keys.get(pos + 1) {
                if eq_ignore_case(label, after.code_point) {
                    if let Some(grandchild) = ctx.store.child_ignore_case(child, key.code_point) {
                        session.typed.push(
                            next(grandchild, pos + 2, state.edits + 1, false),
                            cost + s.transposition_cost,
                        );
                    }
                }
            }
        }
    }
    if can_edit {
        // A stray key the word does not contain.
        session.typed.push(
            next(state.node, pos + 1, state.edits + 1, false),
            cost + s.insertion_cost,
        );
    }
}

fn push_shortcuts(out: &mut Vec<Candidate>, node: &PtNode, source_score: i32) {
    for shortcut in node.shortcuts() {
        let whitelist = shortcut.probability == WHITELIST_SHORTCUT_PROBABILITY;
        out.push(Candidate {
            word: shortcut.target.clone(),
            score: if whitelist {
                MAX_SCORE
            } else {
                source_score.saturating_sub(1)
            },
            kind: if whitelist {
                SuggestionKind::Whitelist
            } else {
                SuggestionKind::Shortcut
            },
            exact: false,
            offensive: false,
            second_word_start: None,
        });
    }
}

/// Next-word predictions from the previous word's bigrams, for empty input.
pub(crate) fn predict_next(session: &mut SearchSession, ctx: &SearchContext) -> Vec<Candidate> {
    let Some((prev, prev_entry)) = ctx.previous else {
        return Vec::new();
    };
    let store = ctx.store;
    for (target, bigram) in store.node(prev).bigrams() {
        if !session.tick() {
            break;
        }
        let Some(entry) = store.node(target).word_entry() else {
            continue;
        };
        if ctx.options.block_offensive && entry.is_blacklisted {
            continue;
        }
        let lm = bigram_score(store, Some(prev_entry), entry, Some(bigram));
        session.top.insert(Candidate {
            word: store.word_of(target),
            score: compose_score(lm, 0.0, 0.0),
            kind: SuggestionKind::Prediction,
            exact: false,
            offensive: entry.is_blacklisted,
            second_word_start: None,
        });
    }
    session.top.take()
}
