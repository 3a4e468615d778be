use std::collections::{BTreeMap, HashMap};

use crate::models::{normalize_tag, TagPayload};

/// After this many soft deletions the trie rebuilds itself from the path
/// index to reclaim nodes that pruning could not free.
pub const COMPACTION_THRESHOLD: usize = 1000;

/// Key of the auxiliary path index. Removal is keyed by the exact
/// `(tag, payload)` pair that was inserted, because the terminal node's
/// current payload may have been overwritten by a later insert of the
/// same tag.
type PathKey = (String, TagPayload);

#[derive(Debug, Default)]
struct TrieNode {
    /// Owned children, keyed by the next character. BTreeMap keeps the
    /// traversal order lexicographic and deterministic.
    children: BTreeMap<char, usize>,
    /// Arena index of the parent; `None` only for the root. Used for
    /// upward pruning walks, never for ownership.
    parent: Option<usize>,
    /// The character this node sits under in its parent's child map.
    ch: char,
    payload: Option<TagPayload>,
    is_terminal: bool,
    is_deleted: bool,
    reference_count: u32,
}

impl TrieNode {
    fn is_live_terminal(&self) -> bool {
        self.is_terminal && !self.is_deleted
    }
}

/// A reference-counted, soft-deleting prefix trie over lowercase tags.
///
/// Nodes live in an index-based arena: children and parents are plain
/// `usize` indexes, so upward pruning walks need no back-pointers and no
/// interior mutability. Each namespace owns its own `TagTrie`; the trie
/// is a search index, not a source of truth.
#[derive(Debug)]
pub struct TagTrie {
    nodes: Vec<TrieNode>,
    /// Recycled arena slots from pruned nodes.
    free: Vec<usize>,
    /// `(tag, payload)` → (terminal node index, live insert count).
    path_index: HashMap<PathKey, (usize, u32)>,
    /// Soft deletions since the last rebuild.
    soft_deleted: usize,
    compaction_threshold: usize,
}

const ROOT: usize = 0;

impl Default for TagTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl TagTrie {
    pub fn new() -> Self {
        Self::with_compaction_threshold(COMPACTION_THRESHOLD)
    }

    pub fn with_compaction_threshold(threshold: usize) -> Self {
        Self {
            nodes: vec![TrieNode::default()],
            free: Vec::new(),
            path_index: HashMap::new(),
            soft_deleted: 0,
            compaction_threshold: threshold.max(1),
        }
    }

    /// Insert `tag` with `payload`. Re-inserting the same pair bumps the
    /// reference count; inserting a different payload under an existing
    /// tag overwrites the node's payload while both index entries stay
    /// individually removable.
    pub fn insert(&mut self, tag: &str, payload: TagPayload) {
        let tag = normalize_tag(tag);
        if tag.is_empty() {
            return;
        }

        let mut idx = ROOT;
        for ch in tag.chars() {
            idx = match self.nodes[idx].children.get(&ch) {
                Some(&child) => child,
                None => {
                    let child = self.alloc_node(ch, idx);
                    self.nodes[idx].children.insert(ch, child);
                    child
                }
            };
        }

        let node = &mut self.nodes[idx];
        node.is_terminal = true;
        node.is_deleted = false;
        node.payload = Some(payload.clone());
        node.reference_count += 1;

        let entry = self.path_index.entry((tag, payload)).or_insert((idx, 0));
        entry.0 = idx;
        entry.1 += 1;
    }

    /// Remove one reference to the exact `(tag, payload)` pair. Unknown
    /// pairs are a silent no-op. When a node's reference count reaches
    /// zero it is soft-deleted and any now-empty ancestor chain is
    /// pruned eagerly.
    pub fn remove(&mut self, tag: &str, payload: &TagPayload) {
        let key = (normalize_tag(tag), payload.clone());
        let Some(&(idx, count)) = self.path_index.get(&key) else {
            return;
        };

        if count > 1 {
            self.path_index.insert(key, (idx, count - 1));
        } else {
            self.path_index.remove(&key);
        }

        let node = &mut self.nodes[idx];
        node.reference_count = node.reference_count.saturating_sub(1);
        if node.reference_count == 0 {
            node.is_deleted = true;
            node.payload = None;
            self.soft_deleted += 1;
            self.prune(idx);
            self.maybe_compact();
        }
    }

    /// Look up a tag. Absence is indistinguishable between "never
    /// inserted" and "soft-deleted".
    pub fn find(&self, tag: &str) -> Option<TagPayload> {
        let idx = self.walk(&normalize_tag(tag))?;
        let node = &self.nodes[idx];
        if node.is_live_terminal() {
            node.payload.clone()
        } else {
            None
        }
    }

    /// Collect up to `limit` live tags starting with `prefix`, in
    /// lexicographic order. Deterministic for a given trie state.
    pub fn collect_with_prefix(&self, prefix: &str, limit: usize) -> Vec<String> {
        let prefix = normalize_tag(prefix);
        let mut results = Vec::new();
        if limit == 0 {
            return results;
        }

        let Some(start) = self.walk(&prefix) else {
            return results;
        };

        // Depth-first, children visited in child-map (lexicographic)
        // order; a preorder walk yields full tags in sorted order.
        let mut stack = vec![(start, prefix)];
        while let Some((idx, tag)) = stack.pop() {
            let node = &self.nodes[idx];
            if node.is_live_terminal() {
                results.push(tag.clone());
                if results.len() >= limit {
                    break;
                }
            }
            for (&ch, &child) in node.children.iter().rev() {
                let mut child_tag = tag.clone();
                child_tag.push(ch);
                stack.push((child, child_tag));
            }
        }
        results
    }

    /// Discard the current tree and reinsert every pair. Used for cold
    /// load and for compaction.
    pub fn rebuild(&mut self, pairs: &[(String, TagPayload)]) {
        self.reset();
        for (tag, payload) in pairs {
            self.insert(tag, payload.clone());
        }
    }

    /// Number of live `(tag, payload)` entries.
    pub fn len(&self) -> usize {
        self.path_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path_index.is_empty()
    }

    fn reset(&mut self) {
        self.nodes.clear();
        self.nodes.push(TrieNode::default());
        self.free.clear();
        self.path_index.clear();
        self.soft_deleted = 0;
    }

    /// Walk the character path for `tag`; `None` if any edge is missing.
    fn walk(&self, tag: &str) -> Option<usize> {
        let mut idx = ROOT;
        for ch in tag.chars() {
            idx = *self.nodes[idx].children.get(&ch)?;
        }
        Some(idx)
    }

    fn alloc_node(&mut self, ch: char, parent: usize) -> usize {
        let node = TrieNode {
            ch,
            parent: Some(parent),
            ..TrieNode::default()
        };
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    /// Walk upward from a soft-deleted node, detaching every childless
    /// node that no longer carries a live payload. Stops at the first
    /// ancestor that still has children or is a live terminal, and never
    /// removes the root.
    fn prune(&mut self, mut idx: usize) {
        while idx != ROOT {
            let node = &self.nodes[idx];
            if !node.children.is_empty() || node.is_live_terminal() {
                break;
            }
            let ch = node.ch;
            // Root is the only node without a parent and the loop
            // condition excludes it.
            let parent = node.parent.unwrap_or(ROOT);

            self.nodes[parent].children.remove(&ch);
            self.nodes[idx] = TrieNode::default();
            self.free.push(idx);
            idx = parent;
        }
    }

    fn maybe_compact(&mut self) {
        if self.soft_deleted < self.compaction_threshold {
            return;
        }
        // Replay the path index so reference counts survive the rebuild.
        let entries: Vec<(PathKey, u32)> = self
            .path_index
            .iter()
            .map(|(key, &(_, count))| (key.clone(), count))
            .collect();
        self.reset();
        for ((tag, payload), count) in entries {
            for _ in 0..count {
                self.insert(&tag, payload.clone());
            }
        }
    }
}
