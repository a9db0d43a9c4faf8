use super::store::{DictStore, NodeId, PtNode, ROOT};

/// Lazy depth-first walk over the words below a prefix, in code-point order.
///
/// Yields `(suffix, node)` for every node carrying a unigram entry, where
/// `suffix` is the part of the word after the prefix (empty for the prefix
/// node itself).
pub struct PrefixIter<'a> {
    store: &'a DictStore,
    base_depth: usize,
    stack: Vec<NodeId>,
}

impl DictStore {
    pub fn iter_prefix(&self, prefix: &[u32]) -> PrefixIter<'_> {
        let start = if prefix.is_empty() {
            Some(ROOT)
        } else {
            self.find_node(prefix)
        };
        PrefixIter {
            store: self,
            base_depth: prefix.len(),
            stack: start.into_iter().collect(),
        }
    }
}

impl<'a> Iterator for PrefixIter<'a> {
    type Item = (Vec<u32>, &'a PtNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            let node = self.store.node(id);
            // Reverse so the smallest code point is visited first.
            self.stack.extend(node.children().iter().rev());
            if id != ROOT && node.unigram().is_some() {
                let word = self.store.word_of(id);
                return Some((word[self.base_depth..].to_vec(), node));
            }
        }
        None
    }
}
