use super::{cp, sample_store};
use crate::codec::from_code_points;

fn words(store: &crate::dict::DictStore, prefix: &str) -> Vec<String> {
    store
        .iter_prefix(&cp(prefix))
        .map(|(suffix, _)| format!("{prefix}{}", from_code_points(&suffix)))
        .collect()
}

#[test]
fn test_prefix_walk_in_code_point_order() {
    let store = sample_store();
    assert_eq!(words(&store, "ca"), vec!["ca", "car", "cart", "cat"]);
    assert_eq!(words(&store, "car"), vec!["car", "cart"]);
}

#[test]
fn test_prefix_walk_from_root_includes_linkage() {
    let store = sample_store();
    assert_eq!(
        words(&store, ""),
        vec!["ca", "car", "cart", "cat", "dog", "the"]
    );
}

#[test]
fn test_prefix_walk_unknown_prefix() {
    let store = sample_store();
    assert_eq!(store.iter_prefix(&cp("x")).count(), 0);
}

#[test]
fn test_prefix_walk_is_lazy() {
    let store = sample_store();
    let mut iter = store.iter_prefix(&cp("c"));
    let (suffix, node) = iter.next().unwrap();
    assert_eq!(suffix, cp("a"));
    assert_eq!(node.unigram().unwrap().probability, 20);
}
