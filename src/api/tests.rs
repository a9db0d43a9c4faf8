use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use tapword_core::codec::to_code_points;
use tapword_core::dict::{
    DictError, ATTR_MAX_UNIGRAM_COUNT, ATTR_USES_FORGETTING_CURVE, FORMAT_VERSION_DYNAMIC,
    FORMAT_VERSION_STATIC,
};
use tapword_core::mutation::LanguageModelUpdate;
use tapword_core::search::{KeyGridProximity, NoProximity, SearchInput, SearchOptions, TypedKey};
use tapword_core::{MAX_WORD_LENGTH, NOT_A_PROBABILITY};

use super::*;

fn create(dir: &Path, name: &str, attrs: &BTreeMap<String, String>) -> PathBuf {
    let path = dir.join(name);
    assert!(BinaryDictionary::create_empty(
        &path,
        FORMAT_VERSION_DYNAMIC,
        attrs
    ));
    path
}

fn open_rw(path: &Path) -> BinaryDictionary {
    let len = fs::metadata(path).unwrap().len();
    BinaryDictionary::open(path, 0, len, true).unwrap()
}

fn open_ro(path: &Path) -> BinaryDictionary {
    let len = fs::metadata(path).unwrap().len();
    BinaryDictionary::open(path, 0, len, false).unwrap()
}

fn typed(s: &str) -> SearchInput {
    SearchInput::typed_word(&to_code_points(s))
}

fn qwerty() -> KeyGridProximity {
    KeyGridProximity::from_rows(&["qwertyuiop", "asdfghjkl", "zxcvbnm"], 10.0, 10.0, 0.5)
}

/// A small learned dictionary, flushed to disk.
fn populated(dir: &Path) -> PathBuf {
    let path = create(dir, "user.dict", &BTreeMap::new());
    let dict = open_rw(&path);
    for (word, p) in [("cat", 120), ("car", 90), ("cart", 60), ("dog", 100)] {
        dict.add_unigram(word, p, None, 0, false, false, 1).unwrap();
    }
    dict.add_bigram("the", "cat", 90, 2).unwrap();
    dict.flush().unwrap();
    path
}

/// Put a non-empty directory where the dictionary file was, so the next
/// rename onto `path` fails.
fn block_path(path: &Path) {
    fs::remove_file(path).unwrap();
    fs::create_dir(path).unwrap();
    fs::write(path.join("keep"), b"x").unwrap();
}

fn update(word0: Option<&str>, word1: &str, probability: i32) -> LanguageModelUpdate {
    LanguageModelUpdate {
        word0: word0.map(to_code_points),
        word1: to_code_points(word1),
        unigram_probability: probability,
        bigram_probability: 50,
        shortcut_target: None,
        shortcut_probability: 0,
        is_not_a_word: false,
        is_blacklisted: false,
        timestamp: 10,
    }
}

#[test]
fn test_add_then_get_unigram() {
    let dir = tempfile::tempdir().unwrap();
    let path = create(dir.path(), "user.dict", &BTreeMap::new());
    let dict = open_rw(&path);
    assert_eq!(dict.get_unigram_probability("cat"), NOT_A_PROBABILITY);
    assert!(!dict.is_valid_word("cat"));

    dict.add_unigram("cat", 120, None, 0, false, false, 0).unwrap();
    assert_eq!(dict.get_unigram_probability("cat"), 120);
    assert!(dict.is_valid_word("cat"));
}

#[test]
fn test_bigram_is_directional() {
    let dir = tempfile::tempdir().unwrap();
    let path = create(dir.path(), "user.dict", &BTreeMap::new());
    let dict = open_rw(&path);
    dict.add_bigram("the", "cat", 90, 0).unwrap();
    assert_eq!(dict.get_bigram_probability("the", "cat"), 90);
    assert!(dict.is_valid_bigram("the", "cat"));
    assert_eq!(dict.get_bigram_probability("cat", "the"), NOT_A_PROBABILITY);

    // Endpoints exist only as linkage.
    assert!(!dict.is_valid_word("the"));
    let prop = dict.get_unigram_property("the").unwrap();
    assert!(prop.is_not_a_word);
    assert!(prop.has_bigrams);
}

#[test]
fn test_hidden_entries_report_no_probability() {
    let dir = tempfile::tempdir().unwrap();
    let path = create(dir.path(), "user.dict", &BTreeMap::new());
    let dict = open_rw(&path);
    dict.add_unigram("damn", 100, None, 0, false, true, 0).unwrap();
    assert_eq!(dict.get_unigram_probability("damn"), NOT_A_PROBABILITY);
    let prop = dict.get_unigram_property("damn").unwrap();
    assert!(prop.is_blacklisted);
    assert_eq!(prop.probability, 100);
}

#[test]
fn test_query_arguments_out_of_range() {
    let dir = tempfile::tempdir().unwrap();
    let dict = open_rw(&populated(dir.path()));
    let long = "a".repeat(MAX_WORD_LENGTH + 1);
    assert_eq!(dict.get_unigram_probability(""), NOT_A_PROBABILITY);
    assert_eq!(dict.get_unigram_probability(&long), NOT_A_PROBABILITY);
    assert_eq!(dict.get_bigram_probability("", "cat"), NOT_A_PROBABILITY);
    assert!(dict.get_unigram_property("").is_none());
    assert!(matches!(
        dict.add_unigram("", 10, None, 0, false, false, 0),
        Err(DictError::InvalidArgument(_))
    ));
}

#[test]
fn test_read_only_rejects_writes() {
    let dir = tempfile::tempdir().unwrap();
    let dict = open_ro(&populated(dir.path()));
    assert_eq!(dict.get_unigram_probability("cat"), 120);
    assert!(matches!(
        dict.add_unigram("cow", 10, None, 0, false, false, 0),
        Err(DictError::ReadOnly)
    ));
    assert!(matches!(
        dict.add_bigram("cat", "dog", 10, 0),
        Err(DictError::ReadOnly)
    ));
    assert!(matches!(
        dict.remove_bigram("the", "cat"),
        Err(DictError::ReadOnly)
    ));
    assert!(matches!(
        dict.add_batch(&[update(None, "cow", 10)]),
        Err(DictError::ReadOnly)
    ));
    assert!(matches!(
        dict.flush_with_compaction(),
        Err(DictError::ReadOnly)
    ));
    assert!(!dict.needs_compaction(false));
    dict.flush().unwrap();
}

#[test]
fn test_open_rejects_bad_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("junk.dict");
    fs::write(&path, b"not a dictionary at all, just text").unwrap();
    let err = BinaryDictionary::open(&path, 0, 34, false).unwrap_err();
    assert!(err.is_format_error());

    let missing = dir.path().join("missing.dict");
    assert!(matches!(
        BinaryDictionary::open(&missing, 0, 0, false),
        Err(DictError::Io(_))
    ));
}

#[test]
fn test_create_empty_rejects_unknown_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("v9.dict");
    assert!(!BinaryDictionary::create_empty(&path, 9, &BTreeMap::new()));
    assert!(!path.exists());
}

#[test]
fn test_static_dictionary_is_read_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("main.dict");
    assert!(BinaryDictionary::create_empty(
        &path,
        FORMAT_VERSION_STATIC,
        &BTreeMap::new()
    ));
    let len = fs::metadata(&path).unwrap().len();
    assert!(BinaryDictionary::open(&path, 0, len, true).is_err());
    let dict = BinaryDictionary::open(&path, 0, len, false).unwrap();
    assert_eq!(dict.format_version(), Some(FORMAT_VERSION_STATIC));
}

#[test]
fn test_header_attributes() {
    let dir = tempfile::tempdir().unwrap();
    let attrs = BTreeMap::from([
        ("locale".to_string(), "en_US".to_string()),
        (ATTR_USES_FORGETTING_CURVE.to_string(), "1".to_string()),
        (ATTR_MAX_UNIGRAM_COUNT.to_string(), "500".to_string()),
    ]);
    let path = create(dir.path(), "user.dict", &attrs);
    let dict = open_rw(&path);
    assert_eq!(dict.attribute("locale").as_deref(), Some("en_US"));
    assert_eq!(dict.attribute("missing"), None);
    assert_eq!(dict.format_version(), Some(FORMAT_VERSION_DYNAMIC));
    assert_eq!(dict.get_property("MAX_UNIGRAM_COUNT"), "500");
}

#[test]
fn test_diagnostic_properties() {
    let dir = tempfile::tempdir().unwrap();
    let dict = open_rw(&populated(dir.path()));
    // Four words plus the "the" linkage entry.
    assert_eq!(dict.get_property("UNIGRAM_COUNT"), "5");
    assert_eq!(dict.get_property("BIGRAM_COUNT"), "1");
    assert!(!dict.get_property("MAX_BIGRAM_COUNT").is_empty());
    assert_eq!(dict.get_property("NO_SUCH_KEY"), "");
    for key in PROPERTY_KEYS {
        assert!(!dict.get_property(key).is_empty(), "{key}");
    }
}

#[test]
fn test_words_with_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let dict = open_rw(&populated(dir.path()));
    assert_eq!(dict.words_with_prefix("car", 10), vec!["car", "cart"]);
    assert_eq!(dict.words_with_prefix("c", 2), vec!["car", "cart"]);
    assert!(dict.words_with_prefix("x", 10).is_empty());
    // Linkage entries are not words.
    assert!(!dict.words_with_prefix("", 100).contains(&"the".to_string()));
}

#[test]
fn test_suggestions_through_engine() {
    let dir = tempfile::tempdir().unwrap();
    let dict = open_ro(&populated(dir.path()));
    let options = SearchOptions::default();
    let results = dict.get_suggestions(&typed("cat"), None, &qwerty(), false, 1, &options);
    assert_eq!(results[0].word, "cat");
    assert!(results[0].exact_match);
    assert!(!BinaryDictionary::should_auto_commit(&results[0]));

    let predicted = dict.get_suggestions(&typed(""), Some("the"), &qwerty(), false, 1, &options);
    assert_eq!(predicted[0].word, "cat");
}

#[test]
fn test_overlong_typed_input_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let dict = open_ro(&populated(dir.path()));
    let keys = vec![TypedKey::new('a' as u32); MAX_WORD_LENGTH];
    let results = dict.get_suggestions(
        &SearchInput::Typed(keys),
        None,
        &NoProximity,
        false,
        0,
        &SearchOptions::default(),
    );
    assert!(results.is_empty());
}

#[test]
fn test_offensive_blocking_flag_is_applied() {
    let dir = tempfile::tempdir().unwrap();
    let path = create(dir.path(), "user.dict", &BTreeMap::new());
    let dict = open_rw(&path);
    dict.add_unigram("darn", 80, None, 0, false, false, 0).unwrap();
    dict.add_unigram("damn", 100, None, 0, false, true, 0).unwrap();
    let options = SearchOptions::default();

    let exact = dict.get_suggestions(&typed("damn"), None, &NoProximity, true, 0, &options);
    assert_eq!(exact[0].word, "damn");
    assert!(exact[0].possibly_offensive);

    let fuzzy = dict.get_suggestions(&typed("dann"), None, &NoProximity, true, 0, &options);
    assert!(fuzzy.iter().all(|s| s.word != "damn"));
}

#[test]
fn test_flush_without_changes_keeps_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = populated(dir.path());
    let before = fs::read(&path).unwrap();
    let dict = open_rw(&path);
    dict.flush().unwrap();
    dict.flush().unwrap();
    assert_eq!(fs::read(&path).unwrap(), before);
    for w in ["cat", "car", "cart", "dog", "cow"] {
        let expected = match w {
            "cat" => 120,
            "car" => 90,
            "cart" => 60,
            "dog" => 100,
            _ => NOT_A_PROBABILITY,
        };
        assert_eq!(dict.get_unigram_probability(w), expected, "{w}");
    }
}

#[test]
fn test_flush_persists_learning() {
    let dir = tempfile::tempdir().unwrap();
    let path = populated(dir.path());
    {
        let dict = open_rw(&path);
        dict.add_unigram("cow", 70, None, 0, false, false, 5).unwrap();
        dict.remove_bigram("the", "cat").unwrap();
        dict.flush().unwrap();
    }
    let dict = open_ro(&path);
    assert_eq!(dict.get_unigram_probability("cow"), 70);
    assert_eq!(dict.get_bigram_probability("the", "cat"), NOT_A_PROBABILITY);
    assert!(dict.has_valid_contents());
}

#[test]
fn test_compaction_preserves_observable_entries() {
    let dir = tempfile::tempdir().unwrap();
    let path = populated(dir.path());
    let dict = open_rw(&path);
    dict.add_bigram("cat", "nap", 30, 3).unwrap();
    dict.remove_bigram("cat", "nap").unwrap();
    dict.add_unigram("thx", 50, Some("thanks"), 100, false, false, 4).unwrap();

    let words = ["cat", "car", "cart", "dog", "the", "thx", "nap"];
    let before: Vec<_> = words
        .iter()
        .map(|w| (dict.get_unigram_probability(w), dict.get_unigram_property(w)))
        .collect();
    let bigram = dict.get_bigram_probability("the", "cat");

    dict.flush_with_compaction().unwrap();
    let after: Vec<_> = words
        .iter()
        .map(|w| (dict.get_unigram_probability(w), dict.get_unigram_property(w)))
        .collect();
    assert_eq!(before, after);
    assert_eq!(dict.get_bigram_probability("the", "cat"), bigram);
    assert!(dict.get_unigram_property("nap").is_none());
    assert!(dict.has_valid_contents());
    assert!(!path.with_extension("tmp").exists());

    let reopened = open_ro(&path);
    assert_eq!(reopened.get_unigram_probability("thx"), 50);
    let prop = reopened.get_unigram_property("thx").unwrap();
    assert_eq!(prop.shortcuts, vec![("thanks".to_string(), 100)]);
}

#[test]
fn test_batch_compacts_and_resumes() {
    let dir = tempfile::tempdir().unwrap();
    let attrs = BTreeMap::from([
        (ATTR_USES_FORGETTING_CURVE.to_string(), "1".to_string()),
        (ATTR_MAX_UNIGRAM_COUNT.to_string(), "3".to_string()),
    ]);
    let path = create(dir.path(), "user.dict", &attrs);
    let dict = open_rw(&path);
    let updates: Vec<_> = (0..8)
        .map(|i| update(None, &format!("w{i}"), 10 + i * 20))
        .collect();

    assert_eq!(dict.add_batch(&updates).unwrap(), updates.len());
    assert!(!dict.needs_compaction(true));
    let count: usize = dict.get_property("UNIGRAM_COUNT").parse().unwrap();
    assert!(count <= 3, "{count}");
    // The file on disk is the compacted store.
    assert!(open_ro(&path).has_valid_contents());
}

#[test]
fn test_batch_reports_progress_when_compaction_fails() {
    let dir = tempfile::tempdir().unwrap();
    let attrs = BTreeMap::from([
        (ATTR_USES_FORGETTING_CURVE.to_string(), "1".to_string()),
        (ATTR_MAX_UNIGRAM_COUNT.to_string(), "2".to_string()),
    ]);
    let path = create(dir.path(), "user.dict", &attrs);
    let dict = open_rw(&path);
    let updates: Vec<_> = (0..5).map(|i| update(None, &format!("w{i}"), 100)).collect();
    block_path(&path);

    // The third word pushes the store over its limit and the compaction fails.
    assert_eq!(dict.add_batch(&updates).unwrap(), 3);
    for w in ["w0", "w1", "w2"] {
        assert!(dict.get_unigram_property(w).is_some(), "{w}");
    }
    for w in ["w3", "w4"] {
        assert!(dict.get_unigram_property(w).is_none(), "{w}");
    }
    assert!(path.is_dir());
    assert!(!path.with_extension("tmp").exists());

    fs::remove_dir_all(&path).unwrap();
    assert_eq!(dict.add_batch(&updates[3..]).unwrap(), 2);
    assert!(open_ro(&path).has_valid_contents());
}

#[test]
fn test_failed_compaction_keeps_previous_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = populated(dir.path());
    let dict = open_rw(&path);
    dict.add_unigram("cow", 70, None, 0, false, false, 5).unwrap();
    dict.remove_bigram("the", "cat").unwrap();
    let words = ["cat", "car", "cart", "dog", "cow", "the"];
    let before: Vec<_> = words.iter().map(|w| dict.get_unigram_property(w)).collect();
    block_path(&path);

    assert!(matches!(dict.flush_with_compaction(), Err(DictError::Io(_))));
    assert!(path.join("keep").exists());
    assert!(!path.with_extension("tmp").exists());
    assert!(dict.is_valid());
    assert!(dict.has_valid_contents());
    let after: Vec<_> = words.iter().map(|w| dict.get_unigram_property(w)).collect();
    assert_eq!(before, after);
    assert_eq!(dict.get_unigram_probability("cow"), 70);
    assert_eq!(dict.get_bigram_probability("the", "cat"), NOT_A_PROBABILITY);

    fs::remove_dir_all(&path).unwrap();
    dict.flush_with_compaction().unwrap();
    assert_eq!(open_ro(&path).get_unigram_probability("cow"), 70);
}

#[test]
fn test_batch_with_bigrams() {
    let dir = tempfile::tempdir().unwrap();
    let path = create(dir.path(), "user.dict", &BTreeMap::new());
    let dict = open_rw(&path);
    let updates = vec![
        update(None, "hello", 100),
        update(Some("hello"), "world", 80),
        update(None, "", 10),
    ];
    assert_eq!(dict.add_batch(&updates).unwrap(), 3);
    assert_eq!(dict.get_unigram_probability("world"), 80);
    assert_eq!(dict.get_bigram_probability("hello", "world"), 50);
}

#[test]
fn test_close_is_safe_and_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let dict = open_rw(&populated(dir.path()));
    dict.get_suggestions(&typed("ca"), None, &NoProximity, false, 7, &SearchOptions::default());
    assert_eq!(dict.session_count(), 1);
    assert!(dict.is_valid());

    dict.close();
    dict.close();
    assert!(!dict.is_valid());
    assert_eq!(dict.session_count(), 0);
    assert_eq!(dict.get_unigram_probability("cat"), NOT_A_PROBABILITY);
    assert_eq!(dict.get_bigram_probability("the", "cat"), NOT_A_PROBABILITY);
    assert!(dict.get_unigram_property("cat").is_none());
    assert!(dict
        .get_suggestions(&typed("ca"), None, &NoProximity, false, 7, &SearchOptions::default())
        .is_empty());
    assert_eq!(dict.get_property("UNIGRAM_COUNT"), "");
    assert_eq!(dict.format_version(), None);
    assert!(!dict.has_valid_contents());
    assert!(!dict.needs_compaction(false));
    dict.add_unigram("cow", 10, None, 0, false, false, 0).unwrap();
    assert!(!dict.remove_bigram("the", "cat").unwrap());
    assert_eq!(dict.add_batch(&[update(None, "cow", 10)]).unwrap(), 0);
    dict.flush().unwrap();
    dict.flush_with_compaction().unwrap();
}

#[test]
fn test_close_during_searches_leaves_no_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let dict = open_ro(&populated(dir.path()));
    let options = SearchOptions::default();
    thread::scope(|s| {
        for id in 0..4 {
            let (dict, options) = (&dict, &options);
            s.spawn(move || {
                for round in 0..200 {
                    let session = id * 1000 + round;
                    dict.get_suggestions(&typed("ca"), None, &NoProximity, false, session, options);
                }
            });
        }
        s.spawn(|| {
            thread::yield_now();
            dict.close();
        });
    });
    assert!(!dict.is_valid());
    assert_eq!(dict.session_count(), 0);
}

#[test]
fn test_sessions_created_once_per_id() {
    let dir = tempfile::tempdir().unwrap();
    let dict = open_ro(&populated(dir.path()));
    let options = SearchOptions::default();
    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for id in 0..3 {
                    dict.get_suggestions(&typed("ca"), None, &NoProximity, false, id, &options);
                }
            });
        }
    });
    assert_eq!(dict.session_count(), 3);
}

#[test]
fn test_concurrent_sessions_match_serial_results() {
    let dir = tempfile::tempdir().unwrap();
    let dict = open_ro(&populated(dir.path()));
    let grid = qwerty();
    let options = SearchOptions::default();
    let inputs = ["cst", "ca", "dgo", "cart", "c"];
    let expected: Vec<_> = inputs
        .iter()
        .map(|w| dict.get_suggestions(&typed(w), None, &grid, false, -1, &options))
        .collect();

    thread::scope(|s| {
        for id in 0..8 {
            let (dict, grid, options, expected) = (&dict, &grid, &options, &expected);
            s.spawn(move || {
                for round in 0..20 {
                    let i = (id as usize + round) % inputs.len();
                    let input = typed(inputs[i]);
                    let got = dict.get_suggestions(&input, None, grid, false, id, options);
                    assert_eq!(got, expected[i], "session {id} input {}", inputs[i]);
                }
            });
        }
    });
}

#[test]
fn test_search_during_writes_sees_consistent_store() {
    let dir = tempfile::tempdir().unwrap();
    let dict = open_rw(&populated(dir.path()));
    let options = SearchOptions::default();
    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..50 {
                dict.add_unigram(&format!("ca{i}"), 30, None, 0, false, false, 10 + i).unwrap();
                if i % 10 == 9 {
                    dict.flush_with_compaction().unwrap();
                }
            }
        });
        for id in 0..3 {
            let (dict, options) = (&dict, &options);
            s.spawn(move || {
                for _ in 0..30 {
                    let got =
                        dict.get_suggestions(&typed("cat"), None, &NoProximity, false, id, options);
                    assert_eq!(got[0].word, "cat");
                }
            });
        }
    });
    assert_eq!(dict.get_unigram_probability("ca49"), 30);
    assert!(dict.has_valid_contents());
}

#[test]
fn test_calculate_probability_is_exposed() {
    assert_eq!(BinaryDictionary::calculate_probability(100, NOT_A_PROBABILITY), 100);
    let combined = BinaryDictionary::calculate_probability(100, 50);
    assert!(combined > 100 && combined <= 255);
}
