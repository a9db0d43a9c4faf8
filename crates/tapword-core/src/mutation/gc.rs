use std::path::Path;

use tracing::{debug, debug_span};

use crate::codec::{read_file, write_file};
use crate::dict::{BigramEdge, DictError, DictStore, NodeId, ROOT};
use crate::scoring::{decayed_probability, should_forget, unigram_score};

/// A live bigram edge, addressed as (source node, index into its edge list).
type EdgeRef = (NodeId, usize);

impl DictStore {
    /// Densely renumbered copy without tombstones, free slots or orphaned
    /// linkage entries.
    ///
    /// For a dictionary with the forgetting curve, stale entries whose level
    /// has decayed to zero are forgotten, and what remains is cut down to the
    /// unigram/bigram limits by dropping the lowest effective probabilities.
    pub fn compacted(&self) -> Result<DictStore, DictError> {
        let _span = debug_span!("compact", slots = self.nodes.len()).entered();
        let now = self.clock;
        let forgetting = self.uses_forgetting_curve();

        let mut keep: Vec<bool> = self
            .nodes
            .iter()
            .map(|n| match (n.live, n.unigram) {
                (true, Some(u)) => {
                    !(forgetting && u.is_word() && should_forget(&u.historical, now))
                }
                _ => false,
            })
            .collect();

        let mut edges: Vec<EdgeRef> = Vec::new();
        for (id, node) in self.nodes.iter().enumerate() {
            if !keep[id] {
                continue;
            }
            for (i, edge) in node.bigrams.iter().enumerate() {
                let stale = forgetting && should_forget(&edge.entry.historical, now);
                if edge.live && keep[edge.target as usize] && !stale {
                    edges.push((id as NodeId, i));
                }
            }
        }
        self.drop_orphan_linkage(&mut keep, &edges);

        if forgetting {
            let max_unigrams = self.max_unigram_count();
            let mut words: Vec<(NodeId, i32)> = keep
                .iter()
                .enumerate()
                .filter(|&(_, &k)| k)
                .filter_map(|(id, _)| {
                    let u = self.nodes[id].unigram.as_ref()?;
                    let score = if u.is_word() { unigram_score(self, u) } else { -1 };
                    Some((id as NodeId, score))
                })
                .collect();
            if words.len() > max_unigrams {
                let excess = words.len() - max_unigrams;
                words.select_nth_unstable_by_key(excess - 1, |&(_, score)| score);
                for &(id, _) in &words[..excess] {
                    keep[id as usize] = false;
                }
                edges.retain(|&(s, i)| {
                    keep[s as usize] && keep[self.nodes[s as usize].bigrams[i].target as usize]
                });
            }

            let max_bigrams = self.max_bigram_count();
            if edges.len() > max_bigrams {
                let excess = edges.len() - max_bigrams;
                edges.select_nth_unstable_by_key(excess - 1, |&(s, i)| {
                    let e = &self.nodes[s as usize].bigrams[i].entry;
                    decayed_probability(e.probability, &e.historical, now)
                });
                edges.drain(..excess);
            }
            self.drop_orphan_linkage(&mut keep, &edges);
        }

        let out = self.rebuild(&keep, &edges)?;
        debug!(
            unigrams = out.unigram_count,
            bigrams = out.bigram_count,
            slots = out.nodes.len(),
            reclaimed = self.nodes.len() - out.nodes.len(),
        );
        Ok(out)
    }

    /// Unkeep not-a-word entries that no surviving edge or shortcut needs.
    fn drop_orphan_linkage(&self, keep: &mut [bool], edges: &[EdgeRef]) {
        let mut referenced = vec![false; keep.len()];
        for &(s, i) in edges {
            referenced[s as usize] = true;
            referenced[self.nodes[s as usize].bigrams[i].target as usize] = true;
        }
        for (id, node) in self.nodes.iter().enumerate() {
            let linkage_only = node.unigram.is_some_and(|u| !u.is_word());
            if keep[id] && linkage_only && !referenced[id] && !node.has_shortcuts() {
                keep[id] = false;
            }
        }
    }

    fn rebuild(&self, keep: &[bool], edges: &[EdgeRef]) -> Result<DictStore, DictError> {
        let mut out = DictStore::empty(self.header.version, self.header.attributes.clone())?;
        out.updatable = self.updatable;
        out.clock = self.clock;
        out.dirty = true;

        // Pre-order walk, so new ids follow code-point order.
        let mut remap: Vec<Option<NodeId>> = vec![None; self.nodes.len()];
        let mut stack = vec![ROOT];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id as usize];
            stack.extend(node.children.iter().rev());
            if !keep[id as usize] {
                continue;
            }
            let new_id = out.insert_path(&self.word_of(id));
            let slot = &mut out.nodes[new_id as usize];
            slot.unigram = node.unigram;
            slot.shortcuts = node.shortcuts.clone();
            out.unigram_count += 1;
            remap[id as usize] = Some(new_id);
        }

        for &(source, i) in edges {
            let edge = &self.nodes[source as usize].bigrams[i];
            let (Some(from), Some(to)) = (remap[source as usize], remap[edge.target as usize])
            else {
                continue;
            };
            out.nodes[from as usize].bigrams.push(BigramEdge {
                target: to,
                entry: edge.entry,
                live: true,
            });
            out.bigram_count += 1;
        }
        Ok(out)
    }
}

/// Compact `store` and replace the file at `path` with the result.
///
/// The file is rewritten through a temporary and renamed into place, then
/// reopened, so on any error the previous file is still there and `store`
/// is untouched.
pub fn compact_to(store: &DictStore, path: &Path) -> Result<DictStore, DictError> {
    let _span = debug_span!("compact_to").entered();
    let compacted = store.compacted()?;
    write_file(&compacted, path)?;
    let len = std::fs::metadata(path)?.len();
    let mut reopened = read_file(path, 0, len)?;
    reopened.set_updatable(store.is_updatable());
    Ok(reopened)
}
