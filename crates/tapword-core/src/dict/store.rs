use std::collections::BTreeMap;

use super::entry::{BigramEntry, ShortcutEntry, UnigramEntry, UnigramProperty};
use super::{
    is_supported_version, DictError, ATTR_MAX_BIGRAM_COUNT, ATTR_MAX_UNIGRAM_COUNT,
    ATTR_USES_FORGETTING_CURVE, FORMAT_VERSION_DYNAMIC,
};
use crate::codec::{eq_ignore_case, from_code_points};
use crate::settings::settings;
use crate::{MAX_WORD_LENGTH, NOT_A_TIMESTAMP};

pub type NodeId = u32;

/// The root node; it carries no code point and never holds an entry.
pub const ROOT: NodeId = 0;

#[derive(Debug, Clone)]
pub struct Header {
    pub version: u8,
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct BigramEdge {
    pub target: NodeId,
    pub entry: BigramEntry,
    pub live: bool,
}

/// One trie node. Children are kept sorted by code point.
#[derive(Debug, Clone)]
pub struct PtNode {
    pub(crate) code_point: u32,
    pub(crate) parent: NodeId,
    pub(crate) depth: u8,
    pub(crate) children: Vec<NodeId>,
    pub(crate) unigram: Option<UnigramEntry>,
    pub(crate) bigrams: Vec<BigramEdge>,
    pub(crate) shortcuts: Vec<ShortcutEntry>,
    pub(crate) live: bool,
}

impl PtNode {
    pub(crate) fn new(code_point: u32, parent: NodeId, depth: u8) -> Self {
        Self {
            code_point,
            parent,
            depth,
            children: Vec::new(),
            unigram: None,
            bigrams: Vec::new(),
            shortcuts: Vec::new(),
            live: true,
        }
    }

    fn vacant() -> Self {
        let mut node = Self::new(0, ROOT, 0);
        node.live = false;
        node
    }

    pub fn code_point(&self) -> u32 {
        self.code_point
    }

    pub fn depth(&self) -> usize {
        self.depth as usize
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn unigram(&self) -> Option<&UnigramEntry> {
        self.unigram.as_ref()
    }

    /// The unigram, if it may be offered as a standalone word.
    pub fn word_entry(&self) -> Option<&UnigramEntry> {
        self.unigram.as_ref().filter(|u| u.is_word())
    }

    pub fn has_bigrams(&self) -> bool {
        self.bigrams.iter().any(|b| b.live)
    }

    pub fn has_shortcuts(&self) -> bool {
        !self.shortcuts.is_empty()
    }

    pub fn shortcuts(&self) -> impl Iterator<Item = &ShortcutEntry> {
        self.shortcuts.iter()
    }

    pub fn bigrams(&self) -> impl Iterator<Item = (NodeId, &BigramEntry)> {
        self.bigrams
            .iter()
            .filter(|b| b.live)
            .map(|b| (b.target, &b.entry))
    }

    /// Holds nothing that keeps it reachable on its own.
    fn is_unused(&self) -> bool {
        self.unigram.is_none() && self.children.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct DictStore {
    pub(crate) header: Header,
    pub(crate) nodes: Vec<PtNode>,
    /// Vacant node slots, reused by later inserts.
    pub(crate) free: Vec<NodeId>,
    pub(crate) updatable: bool,
    pub(crate) unigram_count: usize,
    pub(crate) bigram_count: usize,
    pub(crate) dead_bigrams: usize,
    /// Latest timestamp written; aging is measured against it.
    pub(crate) clock: i32,
    pub(crate) dirty: bool,
}

impl DictStore {
    /// An empty dictionary with the given header.
    pub fn empty(version: u8, attributes: BTreeMap<String, String>) -> Result<Self, DictError> {
        if !is_supported_version(version) {
            return Err(DictError::UnsupportedVersion(version));
        }
        Ok(Self {
            header: Header {
                version,
                attributes,
            },
            nodes: vec![PtNode::new(0, ROOT, 0)],
            free: Vec::new(),
            updatable: version == FORMAT_VERSION_DYNAMIC,
            unigram_count: 0,
            bigram_count: 0,
            dead_bigrams: 0,
            clock: NOT_A_TIMESTAMP,
            dirty: false,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn version(&self) -> u8 {
        self.header.version
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.header.attributes.get(key).map(|s| s.as_str())
    }

    pub fn is_updatable(&self) -> bool {
        self.updatable
    }

    pub(crate) fn set_updatable(&mut self, updatable: bool) {
        self.updatable = updatable;
    }

    pub fn uses_forgetting_curve(&self) -> bool {
        self.attribute(ATTR_USES_FORGETTING_CURVE) == Some("1")
    }

    pub fn max_unigram_count(&self) -> usize {
        self.attribute(ATTR_MAX_UNIGRAM_COUNT)
            .and_then(|v| v.parse().ok())
            .unwrap_or(settings().gc.max_unigram_count)
    }

    pub fn max_bigram_count(&self) -> usize {
        self.attribute(ATTR_MAX_BIGRAM_COUNT)
            .and_then(|v| v.parse().ok())
            .unwrap_or(settings().gc.max_bigram_count)
    }

    pub fn unigram_count(&self) -> usize {
        self.unigram_count
    }

    pub fn bigram_count(&self) -> usize {
        self.bigram_count
    }

    /// Reclaimable entries: vacant node slots and tombstoned edges.
    pub fn garbage_count(&self) -> usize {
        self.free.len() + self.dead_bigrams
    }

    pub fn node_slot_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn clock(&self) -> i32 {
        self.clock
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn node(&self, id: NodeId) -> &PtNode {
        &self.nodes[id as usize]
    }

    pub fn root(&self) -> &PtNode {
        &self.nodes[ROOT as usize]
    }

    /// Child of `parent` labelled `code_point`.
    pub fn child(&self, parent: NodeId, code_point: u32) -> Option<NodeId> {
        let children = &self.nodes[parent as usize].children;
        children
            .binary_search_by_key(&code_point, |&c| self.nodes[c as usize].code_point)
            .ok()
            .map(|i| children[i])
    }

    /// Child labelled `code_point`, or failing that one equal to it ignoring case.
    pub fn child_ignore_case(&self, parent: NodeId, code_point: u32) -> Option<NodeId> {
        self.child(parent, code_point).or_else(|| {
            self.nodes[parent as usize]
                .children
                .iter()
                .copied()
                .find(|&c| eq_ignore_case(self.nodes[c as usize].code_point, code_point))
        })
    }

    /// Node reached by walking `word` from the root.
    pub fn find_node(&self, word: &[u32]) -> Option<NodeId> {
        if word.is_empty() || word.len() > MAX_WORD_LENGTH {
            return None;
        }
        word.iter()
            .try_fold(ROOT, |node, &cp| self.child(node, cp))
    }

    /// Code points spelled by the path from the root to `node`.
    pub fn word_of(&self, node: NodeId) -> Vec<u32> {
        let mut word = Vec::with_capacity(self.nodes[node as usize].depth as usize);
        let mut cur = node;
        while cur != ROOT {
            let n = &self.nodes[cur as usize];
            word.push(n.code_point);
            cur = n.parent;
        }
        word.reverse();
        word
    }

    /// Node holding a unigram entry for `word`, if any.
    pub fn find_unigram_node(&self, word: &[u32]) -> Option<NodeId> {
        self.find_node(word)
            .filter(|&id| self.nodes[id as usize].unigram.is_some())
    }

    pub fn lookup_unigram(&self, word: &[u32]) -> Option<&UnigramEntry> {
        self.find_node(word)
            .and_then(|id| self.nodes[id as usize].unigram.as_ref())
    }

    pub fn lookup_bigram(&self, word0: &[u32], word1: &[u32]) -> Option<&BigramEntry> {
        let source = self.find_unigram_node(word0)?;
        let target = self.find_unigram_node(word1)?;
        self.bigram_between(source, target)
    }

    pub(crate) fn bigram_between(&self, source: NodeId, target: NodeId) -> Option<&BigramEntry> {
        self.nodes[source as usize]
            .bigrams
            .iter()
            .find(|b| b.live && b.target == target)
            .map(|b| &b.entry)
    }

    pub fn unigram_property(&self, word: &[u32]) -> Option<UnigramProperty> {
        let id = self.find_unigram_node(word)?;
        let node = &self.nodes[id as usize];
        let unigram = node.unigram.as_ref()?;
        Some(UnigramProperty {
            word: from_code_points(word),
            probability: unigram.probability as i32,
            is_not_a_word: unigram.is_not_a_word,
            is_blacklisted: unigram.is_blacklisted,
            has_bigrams: node.has_bigrams(),
            has_shortcuts: node.has_shortcuts(),
            timestamp: unigram.historical.timestamp,
            level: unigram.historical.level as i32,
            count: unigram.historical.count as i32,
            shortcuts: node
                .shortcuts()
                .map(|s| (from_code_points(&s.target), s.probability as i32))
                .collect(),
        })
    }

    // --- mutation primitives ---

    /// Walk `word`, creating missing nodes (reusing vacant slots first).
    pub(crate) fn insert_path(&mut self, word: &[u32]) -> NodeId {
        let mut node = ROOT;
        for (depth, &cp) in word.iter().enumerate() {
            node = match self.child(node, cp) {
                Some(child) => child,
                None => self.new_child(node, cp, depth as u8 + 1),
            };
        }
        node
    }

    fn new_child(&mut self, parent: NodeId, code_point: u32, depth: u8) -> NodeId {
        let fresh = PtNode::new(code_point, parent, depth);
        let id = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot as usize] = fresh;
                slot
            }
            None => {
                self.nodes.push(fresh);
                (self.nodes.len() - 1) as NodeId
            }
        };
        let nodes = &self.nodes;
        let siblings = &self.nodes[parent as usize].children;
        let pos = siblings.partition_point(|&c| nodes[c as usize].code_point < code_point);
        self.nodes[parent as usize].children.insert(pos, id);
        id
    }

    /// Drop the linkage-only entry at `node` once nothing refers to it, then
    /// free the node and any ancestors left empty.
    pub(crate) fn release_linkage(&mut self, node: NodeId) {
        let n = &self.nodes[node as usize];
        let Some(unigram) = n.unigram else {
            return;
        };
        let referenced = n.has_bigrams() || n.has_shortcuts() || self.is_bigram_target(node);
        if !unigram.is_not_a_word || referenced {
            return;
        }
        self.nodes[node as usize].unigram = None;
        self.unigram_count -= 1;
        self.release_path(node);
    }

    fn is_bigram_target(&self, node: NodeId) -> bool {
        self.nodes
            .iter()
            .any(|n| n.live && n.bigrams.iter().any(|b| b.live && b.target == node))
    }

    fn release_path(&mut self, mut node: NodeId) {
        while node != ROOT && self.nodes[node as usize].is_unused() {
            let parent = self.nodes[node as usize].parent;
            // Dead edges still hold slots; count them out before the node goes.
            let n = &self.nodes[node as usize];
            self.dead_bigrams -= n.bigrams.iter().filter(|b| !b.live).count();
            self.nodes[parent as usize].children.retain(|&c| c != node);
            self.nodes[node as usize] = PtNode::vacant();
            self.free.push(node);
            node = parent;
        }
    }

    pub(crate) fn touch(&mut self, timestamp: i32) {
        if timestamp != NOT_A_TIMESTAMP && timestamp > self.clock {
            self.clock = timestamp;
        }
        self.dirty = true;
    }

    /// Structural consistency check run on open and by `has_valid_contents`.
    pub fn validate(&self) -> Result<(), DictError> {
        let corrupt = |msg: String| -> Result<(), DictError> { Err(DictError::Corrupt(msg)) };
        let Some(root) = self.nodes.first() else {
            return corrupt("missing root node".into());
        };
        if !root.live || root.unigram.is_some() {
            return corrupt("root node must be live and carry no entry".into());
        }
        let mut unigrams = 0usize;
        let mut bigrams = 0usize;
        for (id, node) in self.nodes.iter().enumerate() {
            if !node.live {
                if !node.children.is_empty()
                    || node.unigram.is_some()
                    || !node.bigrams.is_empty()
                    || !node.shortcuts.is_empty()
                {
                    return corrupt(format!("vacant node {id} holds data"));
                }
                continue;
            }
            if node.depth as usize > MAX_WORD_LENGTH {
                return corrupt(format!("node {id} exceeds max word length"));
            }
            for pair in node.children.windows(2) {
                let a = self.nodes.get(pair[0] as usize);
                let b = self.nodes.get(pair[1] as usize);
                match (a, b) {
                    (Some(a), Some(b)) if a.code_point < b.code_point => {}
                    _ => return corrupt(format!("children of node {id} unsorted or duplicated")),
                }
            }
            for &child in &node.children {
                match self.nodes.get(child as usize) {
                    Some(c) if c.live && c.parent as usize == id => {}
                    _ => return corrupt(format!("node {id} has a dangling child {child}")),
                }
            }
            if node.unigram.is_some() {
                unigrams += 1;
            }
            for edge in &node.bigrams {
                if !edge.live {
                    continue;
                }
                bigrams += 1;
                if node.unigram.is_none() {
                    return corrupt(format!("node {id} has bigrams but no unigram"));
                }
                match self.nodes.get(edge.target as usize) {
                    Some(t) if t.live && t.unigram.is_some() => {}
                    _ => return corrupt(format!("bigram from {id} to missing word")),
                }
            }
        }
        let mut listed = vec![false; self.nodes.len()];
        for &slot in &self.free {
            match self.nodes.get(slot as usize) {
                Some(n) if !n.live => {}
                _ => return corrupt(format!("free slot {slot} is in use")),
            }
            if std::mem::replace(&mut listed[slot as usize], true) {
                return corrupt(format!("free slot {slot} listed twice"));
            }
        }
        if unigrams != self.unigram_count || bigrams != self.bigram_count {
            return corrupt("entry counts disagree with contents".into());
        }
        Ok(())
    }
}
