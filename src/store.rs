use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::PathBuf;

use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::{get_config_dir, get_map_file_path, get_order_file_path};
use crate::models::{normalize_tag, Namespace, TagPayload, TagRecord};
use crate::trie::TagTrie;

/// Authoritative tag→payload mapping for one namespace.
///
/// The store owns the map, the insertion order and the namespace's
/// `TagTrie`; the trie is kept in sync on every mutation but is only a
/// search index. Persistence is two JSON documents per namespace: the
/// map and the insertion-ordered tag list. A persistence failure is
/// logged and the in-memory state stays authoritative for the rest of
/// the session.
#[derive(Debug)]
pub struct TagStore {
    namespace: Namespace,
    map: BTreeMap<String, TagRecord>,
    order: Vec<String>,
    favorites: HashSet<String>,
    trie: TagTrie,
    map_path: PathBuf,
    order_path: PathBuf,
    favorites_path: PathBuf,
}

impl TagStore {
    /// Open the store for `namespace`, loading whatever documents exist
    /// under the config directory.
    pub fn open(namespace: Namespace) -> Self {
        let favorites_path =
            get_config_dir().join(format!("{}-favorites.json", namespace.as_str()));
        Self::open_at(
            namespace,
            get_map_file_path(namespace.as_str()),
            get_order_file_path(namespace.as_str()),
            favorites_path,
        )
    }

    /// Open the store against explicit document paths.
    pub fn open_at(
        namespace: Namespace,
        map_path: PathBuf,
        order_path: PathBuf,
        favorites_path: PathBuf,
    ) -> Self {
        let map: BTreeMap<String, TagRecord> = read_document(&map_path);
        let order_raw: Vec<String> = read_document(&order_path);
        let favorites: HashSet<String> = read_document(&favorites_path);

        // Reconcile the two documents: the order list is filtered to
        // tags present in the map, and map tags missing from the order
        // list are appended (sorted, for determinism) rather than
        // dropped.
        let mut seen = HashSet::new();
        let mut order: Vec<String> = order_raw
            .into_iter()
            .filter(|tag| map.contains_key(tag) && seen.insert(tag.clone()))
            .collect();
        let mut stragglers: Vec<String> = map
            .keys()
            .filter(|tag| !seen.contains(tag.as_str()))
            .cloned()
            .collect();
        stragglers.sort();
        order.extend(stragglers);

        let mut trie = TagTrie::new();
        for tag in &order {
            if let Some(record) = map.get(tag) {
                trie.insert(tag, record.payload.clone());
            }
        }

        Self {
            namespace,
            map,
            order,
            favorites,
            trie,
            map_path,
            order_path,
            favorites_path,
        }
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Bind `tag` to `payload`. Empty tags and empty payloads are
    /// rejected as a silent no-op. Overwriting an existing tag replaces
    /// its trie entry and keeps its insertion-order position; new tags
    /// are appended. Returns whether the store changed.
    pub fn set(&mut self, tag: &str, payload: TagPayload) -> bool {
        let tag = normalize_tag(tag);
        if tag.is_empty() || payload.is_empty() {
            return false;
        }

        // Drop the previous trie entry first so the path index never
        // holds a stale pair for this tag.
        if let Some(previous) = self.map.get(&tag) {
            self.trie.remove(&tag, &previous.payload);
        } else {
            self.order.push(tag.clone());
        }

        self.trie.insert(&tag, payload.clone());
        self.map.insert(tag.clone(), TagRecord::new(tag, payload));
        self.persist();
        true
    }

    /// Remove `tag` entirely. Unknown tags are a silent no-op.
    pub fn remove(&mut self, tag: &str) -> bool {
        let tag = normalize_tag(tag);
        let Some(record) = self.map.remove(&tag) else {
            return false;
        };
        self.trie.remove(&tag, &record.payload);
        self.order.retain(|t| t != &tag);
        self.favorites.remove(&tag);
        self.persist();
        true
    }

    /// O(1) authoritative lookup; bypasses the trie.
    pub fn get(&self, tag: &str) -> Option<&TagPayload> {
        self.map.get(&normalize_tag(tag)).map(|r| &r.payload)
    }

    pub fn get_record(&self, tag: &str) -> Option<&TagRecord> {
        self.map.get(&normalize_tag(tag))
    }

    /// Live tags starting with `prefix`, lexicographic, at most `limit`.
    pub fn collect_tags(&self, prefix: &str, limit: usize) -> Vec<String> {
        self.trie.collect_with_prefix(prefix, limit)
    }

    /// Records sorted by normalized tag. A derived view; never mutates.
    pub fn records_alphabetical(&self) -> Vec<&TagRecord> {
        self.map.values().collect()
    }

    /// Records in reverse insertion order. A derived view; never mutates.
    pub fn records_newest_first(&self) -> Vec<&TagRecord> {
        self.order
            .iter()
            .rev()
            .filter_map(|tag| self.map.get(tag))
            .collect()
    }

    pub fn is_favorite(&self, tag: &str) -> bool {
        self.favorites.contains(&normalize_tag(tag))
    }

    /// Toggle favorite status; returns the new state. Unknown tags are
    /// a silent no-op reported as `false`.
    pub fn toggle_favorite(&mut self, tag: &str) -> bool {
        let tag = normalize_tag(tag);
        if !self.map.contains_key(&tag) {
            return false;
        }
        let now_favorite = if self.favorites.remove(&tag) {
            false
        } else {
            self.favorites.insert(tag);
            true
        };
        self.persist();
        now_favorite
    }

    /// Rebuild the trie from the authoritative map.
    pub fn rebuild_index(&mut self) {
        let pairs: Vec<(String, TagPayload)> = self
            .order
            .iter()
            .filter_map(|tag| self.map.get(tag).map(|r| (tag.clone(), r.payload.clone())))
            .collect();
        self.trie.rebuild(&pairs);
    }

    fn persist(&self) {
        write_document(&self.map_path, &self.map);
        write_document(&self.order_path, &self.order);
        write_document(&self.favorites_path, &self.favorites);
    }
}

fn read_document<T: DeserializeOwned + Default>(path: &PathBuf) -> T {
    if !path.exists() {
        return T::default();
    }
    match fs::read_to_string(path) {
        Ok(content) if content.trim().is_empty() => T::default(),
        Ok(content) => match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                warn!("ignoring malformed document {}: {}", path.display(), e);
                T::default()
            }
        },
        Err(e) => {
            warn!("could not read {}: {}", path.display(), e);
            T::default()
        }
    }
}

fn write_document<T: Serialize>(path: &PathBuf, value: &T) {
    let serialized = match serde_json::to_string_pretty(value) {
        Ok(s) => s,
        Err(e) => {
            warn!("could not serialize {}: {}", path.display(), e);
            return;
        }
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("could not create {}: {}", parent.display(), e);
                return;
            }
        }
    }
    if let Err(e) = fs::write(path, serialized) {
        // In-memory state stays authoritative for the session.
        warn!("could not persist {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> TagStore {
        TagStore::open_at(
            Namespace::CustomText,
            dir.path().join("text-map.json"),
            dir.path().join("text-order.json"),
            dir.path().join("text-favorites.json"),
        )
    }

    fn text(s: &str) -> TagPayload {
        TagPayload::Text(s.to_string())
    }

    #[test]
    fn set_get_remove_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);

        assert!(store.set("Fire", text("🔥")));
        assert_eq!(store.get("FIRE"), Some(&text("🔥")));
        assert_eq!(store.collect_tags("fi", 10), vec!["fire"]);

        assert!(store.remove("fire"));
        assert_eq!(store.get("fire"), None);
        assert!(store.collect_tags("", 10).is_empty());
        assert!(!store.remove("fire"));
    }

    #[test]
    fn empty_tag_or_payload_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);

        assert!(!store.set("", text("x")));
        assert!(!store.set("   ", text("x")));
        assert!(!store.set("tag", text("")));
        assert!(store.is_empty());
    }

    #[test]
    fn overwrite_keeps_insertion_position_and_single_remove_clears() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);

        store.set("a", text("1"));
        store.set("b", text("2"));
        store.set("a", text("updated"));

        let newest: Vec<&str> = store
            .records_newest_first()
            .iter()
            .map(|r| r.tag.as_str())
            .collect();
        assert_eq!(newest, vec!["b", "a"]);

        // A single remove after a double set leaves no residue in the
        // search index.
        store.remove("a");
        assert_eq!(store.get("a"), None);
        assert!(!store.collect_tags("a", 10).contains(&"a".to_string()));
    }

    #[test]
    fn persists_and_reloads_both_documents() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = store_in(&dir);
            store.set("zeta", text("z"));
            store.set("alpha", text("a"));
            store.toggle_favorite("alpha");
        }

        let store = store_in(&dir);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("zeta"), Some(&text("z")));
        assert!(store.is_favorite("alpha"));

        let newest: Vec<&str> = store
            .records_newest_first()
            .iter()
            .map(|r| r.tag.as_str())
            .collect();
        assert_eq!(newest, vec!["alpha", "zeta"]);
        let alpha: Vec<&str> = store
            .records_alphabetical()
            .iter()
            .map(|r| r.tag.as_str())
            .collect();
        assert_eq!(alpha, vec!["alpha", "zeta"]);
    }

    #[test]
    fn load_reconciles_order_with_map() {
        let dir = TempDir::new().unwrap();
        let map_path = dir.path().join("text-map.json");
        let order_path = dir.path().join("text-order.json");

        let mut map = BTreeMap::new();
        map.insert("kept".to_string(), TagRecord::new("kept".into(), text("k")));
        map.insert(
            "unlisted".to_string(),
            TagRecord::new("unlisted".into(), text("u")),
        );
        fs::write(&map_path, serde_json::to_string(&map).unwrap()).unwrap();
        // "ghost" has no map entry and must be filtered out; "unlisted"
        // is missing here and must be appended, not dropped.
        fs::write(&order_path, r#"["ghost", "kept"]"#).unwrap();

        let store = TagStore::open_at(
            Namespace::CustomText,
            map_path,
            order_path,
            dir.path().join("text-favorites.json"),
        );
        let newest: Vec<&str> = store
            .records_newest_first()
            .iter()
            .map(|r| r.tag.as_str())
            .collect();
        assert_eq!(newest, vec!["unlisted", "kept"]);
        assert_eq!(store.get("ghost"), None);
        assert_eq!(store.collect_tags("", 10), vec!["kept", "unlisted"]);
    }

    #[test]
    fn rebuild_index_matches_authoritative_map() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.set("fire", text("🔥"));
        store.set("fish", text("🐟"));

        store.rebuild_index();
        assert_eq!(store.collect_tags("fi", 10), vec!["fire", "fish"]);
        assert_eq!(store.get("fire"), Some(&text("🔥")));
    }
}
