mod walk;

use std::collections::BTreeMap;

use crate::codec::to_code_points;
use crate::dict::{DictStore, FORMAT_VERSION_DYNAMIC};

fn cp(s: &str) -> Vec<u32> {
    to_code_points(s)
}

fn sample_store() -> DictStore {
    let mut store = DictStore::empty(FORMAT_VERSION_DYNAMIC, BTreeMap::new()).unwrap();
    for (word, p) in [("cat", 120), ("car", 90), ("cart", 60), ("dog", 100), ("ca", 20)] {
        store.add_unigram(&cp(word), p, None, 0, false, false, 1).unwrap();
    }
    store.add_bigram(&cp("the"), &cp("cat"), 80, 2).unwrap();
    store
}
