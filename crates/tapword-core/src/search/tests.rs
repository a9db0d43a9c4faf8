use std::collections::BTreeMap;
use std::time::Instant;

use super::*;
use crate::codec::to_code_points;
use crate::dict::FORMAT_VERSION_DYNAMIC;

fn cp(s: &str) -> Vec<u32> {
    to_code_points(s)
}

fn sample_store() -> DictStore {
    let mut store = DictStore::empty(FORMAT_VERSION_DYNAMIC, BTreeMap::new()).unwrap();
    for (word, p) in [
        ("cat", 120),
        ("car", 90),
        ("cart", 60),
        ("cab", 50),
        ("dog", 100),
        ("darn", 80),
    ] {
        store.add_unigram(&cp(word), p, None, 0, false, false, 0).unwrap();
    }
    store.add_unigram(&cp("damn"), 100, None, 0, false, true, 0).unwrap();
    store.add_bigram(&cp("the"), &cp("cat"), 90, 0).unwrap();
    store.add_bigram(&cp("the"), &cp("dog"), 40, 0).unwrap();
    store
}

fn qwerty() -> KeyGridProximity {
    KeyGridProximity::from_rows(&["qwertyuiop", "asdfghjkl", "zxcvbnm"], 10.0, 10.0, 0.5)
}

fn run(
    store: &DictStore,
    input: &SearchInput,
    prev: Option<&str>,
    options: &SearchOptions,
) -> Vec<Suggestion> {
    let mut session = SearchSession::new();
    let prev = prev.map(cp);
    search(&mut session, store, input, prev.as_deref(), &qwerty(), options)
}

fn typed(s: &str) -> SearchInput {
    SearchInput::typed_word(&cp(s))
}

/// Keys touched at their centres.
fn touched(s: &str) -> SearchInput {
    let grid = qwerty();
    SearchInput::Typed(
        s.chars()
            .map(|c| {
                let p = grid.key_center(c as u32).unwrap();
                TypedKey::at(c as u32, p.x, p.y)
            })
            .collect(),
    )
}

/// A swipe through the centres of `keys`, `steps` samples per segment.
fn swipe(keys: &str, steps: usize) -> SearchInput {
    let grid = qwerty();
    let centers: Vec<TouchPoint> = keys
        .chars()
        .map(|c| grid.key_center(c as u32).unwrap())
        .collect();
    let mut samples = vec![centers[0]];
    for pair in centers.windows(2) {
        for i in 1..=steps {
            let t = i as f32 / steps as f32;
            samples.push(TouchPoint::new(
                pair[0].x + (pair[1].x - pair[0].x) * t,
                pair[0].y + (pair[1].y - pair[0].y) * t,
            ));
        }
    }
    SearchInput::Gesture {
        samples: samples
            .iter()
            .enumerate()
            .map(|(i, p)| GestureSample {
                x: p.x,
                y: p.y,
                time: i as i32 * 10,
                pointer_id: 0,
            })
            .collect(),
        prefix: Vec::new(),
    }
}

fn words(results: &[Suggestion]) -> Vec<&str> {
    results.iter().map(|s| s.word.as_str()).collect()
}

#[test]
fn test_exact_word_ranks_first() {
    let store = sample_store();
    let results = run(&store, &typed("cat"), None, &SearchOptions::default());
    assert_eq!(results[0].word, "cat");
    assert!(results[0].exact_match);
    assert_eq!(results[0].kind, SuggestionKind::Correction);
    assert!(results.iter().skip(1).all(|s| !s.exact_match));
}

#[test]
fn test_typo_corrected_by_proximity() {
    let store = sample_store();
    let results = run(&store, &touched("cst"), None, &SearchOptions::default());
    assert_eq!(results[0].word, "cat");
    assert!(!results[0].exact_match);
}

#[test]
fn test_typo_corrected_without_proximity() {
    let store = sample_store();
    let mut session = SearchSession::new();
    let results = search(
        &mut session,
        &store,
        &typed("cst"),
        None,
        &NoProximity,
        &SearchOptions::default(),
    );
    assert_eq!(results[0].word, "cat");
}

#[test]
fn test_transposition() {
    let store = sample_store();
    let results = run(&store, &typed("dgo"), None, &SearchOptions::default());
    assert_eq!(results[0].word, "dog");
}

#[test]
fn test_completion() {
    let store = sample_store();
    let results = run(&store, &typed("ca"), None, &SearchOptions::default());
    assert_eq!(results[0].word, "cat");
    assert_eq!(results[0].kind, SuggestionKind::Completion);
    let found = words(&results);
    for w in ["car", "cart", "cab"] {
        assert!(found.contains(&w), "missing {w} in {found:?}");
    }
}

#[test]
fn test_linkage_entries_are_never_offered() {
    let store = sample_store();
    let results = run(&store, &typed("the"), None, &SearchOptions::default());
    assert!(!words(&results).contains(&"the"));
}

#[test]
fn test_offensive_exact_match_survives_blocking() {
    let store = sample_store();
    let options = SearchOptions {
        block_offensive: true,
        ..SearchOptions::default()
    };
    let results = run(&store, &typed("damn"), None, &options);
    assert_eq!(results[0].word, "damn");
    assert!(results[0].exact_match);
    assert!(results[0].possibly_offensive);

    let results = run(&store, &typed("dann"), None, &options);
    assert!(!words(&results).contains(&"damn"));
    assert!(words(&results).contains(&"darn"));

    // Without blocking the inexact offensive word is offered, flagged.
    let results = run(&store, &typed("dann"), None, &SearchOptions::default());
    let damn = results.iter().find(|s| s.word == "damn").unwrap();
    assert!(damn.possibly_offensive);
}

#[test]
fn test_previous_word_biases_ranking() {
    let mut store = sample_store();
    store.add_bigram(&cp("the"), &cp("car"), 255, 0).unwrap();
    let plain = run(&store, &typed("ca"), None, &SearchOptions::default());
    assert_eq!(plain[0].word, "cat");
    let biased = run(&store, &typed("ca"), Some("the"), &SearchOptions::default());
    assert_eq!(biased[0].word, "car");
}

#[test]
fn test_prediction_from_previous_word() {
    let store = sample_store();
    let results = run(&store, &typed(""), Some("the"), &SearchOptions::default());
    assert_eq!(words(&results), vec!["cat", "dog"]);
    assert!(results.iter().all(|s| s.kind == SuggestionKind::Prediction));
    assert!(run(&store, &typed(""), None, &SearchOptions::default()).is_empty());
}

#[test]
fn test_shortcuts_follow_exact_source() {
    let mut store = sample_store();
    store.add_unigram(&cp("thx"), 100, Some(&cp("thanks")), 100, false, false, 0).unwrap();
    store.add_unigram(&cp("teh"), 40, Some(&cp("the")), 15, false, false, 0).unwrap();

    let results = run(&store, &typed("thx"), None, &SearchOptions::default());
    let source = results.iter().find(|s| s.word == "thx").unwrap();
    let shortcut = results.iter().find(|s| s.word == "thanks").unwrap();
    assert_eq!(shortcut.kind, SuggestionKind::Shortcut);
    assert_eq!(shortcut.score, source.score - 1);

    let results = run(&store, &typed("teh"), None, &SearchOptions::default());
    assert_eq!(results[0].word, "the");
    assert_eq!(results[0].kind, SuggestionKind::Whitelist);
    assert_eq!(results[0].score, crate::MAX_SCORE);
}

#[test]
fn test_overlong_input_yields_nothing() {
    let store = sample_store();
    let long = "a".repeat(crate::MAX_WORD_LENGTH);
    assert!(run(&store, &typed(&long), None, &SearchOptions::default()).is_empty());
}

#[test]
fn test_result_cap() {
    let store = sample_store();
    let options = SearchOptions {
        max_results: 2,
        ..SearchOptions::default()
    };
    assert_eq!(run(&store, &typed("ca"), None, &options).len(), 2);
    let options = SearchOptions {
        max_results: 1000,
        ..SearchOptions::default()
    };
    assert!(run(&store, &typed("c"), None, &options).len() <= crate::MAX_RESULTS);
}

#[test]
fn test_ranking_is_stable() {
    let store = sample_store();
    let mut session = SearchSession::new();
    let grid = qwerty();
    let options = SearchOptions::default();
    let first = search(&mut session, &store, &touched("cst"), None, &grid, &options);
    let second = search(&mut session, &store, &touched("cst"), None, &grid, &options);
    assert_eq!(first, second);
    assert_eq!(session.queries(), 2);
}

#[test]
fn test_expired_deadline_returns_quietly() {
    let store = sample_store();
    let options = SearchOptions {
        deadline: Some(Instant::now()),
        ..SearchOptions::default()
    };
    let results = run(&store, &typed("cst"), None, &options);
    assert!(results.len() <= crate::MAX_RESULTS);
}

#[test]
fn test_gesture_single_word() {
    let store = sample_store();
    let results = run(&store, &swipe("cat", 5), None, &SearchOptions::default());
    assert_eq!(results[0].word, "cat");
    assert_eq!(results[0].index_of_second_word_start, None);
    assert_eq!(results[0].auto_commit_confidence, 0);
}

#[test]
fn test_gesture_with_prefix() {
    let store = sample_store();
    let SearchInput::Gesture { samples, .. } = swipe("at", 5) else {
        unreachable!()
    };
    let input = SearchInput::Gesture {
        samples,
        prefix: cp("c"),
    };
    let results = run(&store, &input, None, &SearchOptions::default());
    assert_eq!(results[0].word, "cat");
}

#[test]
fn test_gesture_two_words() {
    let store = sample_store();
    let results = run(&store, &swipe("catdog", 5), None, &SearchOptions::default());
    let top = &results[0];
    assert_eq!(top.word, "cat dog");
    assert_eq!(top.index_of_second_word_start, Some(4));
    assert!(top.auto_commit_confidence > 0);
    assert!(results[1..].iter().all(|s| s.auto_commit_confidence == 0));
}

#[test]
fn test_gesture_rejects_oversized_trace() {
    let store = sample_store();
    let max = crate::settings::settings().gesture.max_samples;
    let input = SearchInput::Gesture {
        samples: vec![
            GestureSample {
                x: 0.0,
                y: 0.0,
                time: 0,
                pointer_id: 0
            };
            max + 1
        ],
        prefix: Vec::new(),
    };
    assert!(run(&store, &input, None, &SearchOptions::default()).is_empty());
}

#[test]
fn test_should_auto_commit_threshold() {
    let mut s = Suggestion {
        word: "cat dog".into(),
        score: 0,
        kind: SuggestionKind::Correction,
        exact_match: false,
        possibly_offensive: false,
        index_of_second_word_start: Some(4),
        auto_commit_confidence: crate::CONFIDENCE_TO_AUTO_COMMIT,
    };
    assert!(!s.should_auto_commit());
    s.auto_commit_confidence += 1;
    assert!(s.should_auto_commit());
}
