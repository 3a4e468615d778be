use std::collections::{HashMap, HashSet};

use crate::config::{MIN_SUGGESTION_PREFIX, SUGGESTION_LIMIT};
use crate::emoji::{canonical_emoji, EmojiIndex};
use crate::models::{normalize_tag, Namespace, TagPayload};
use crate::store::TagStore;

/// One candidate in the suggestion popup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub tag: String,
    pub payload: TagPayload,
    pub namespace: Namespace,
    pub is_favorite: bool,
    pub exact: bool,
}

/// Ranking tier within one namespace; lower ranks first.
fn tier(exact: bool, favorite: bool, non_default_alias: bool) -> u8 {
    if exact {
        0
    } else if favorite {
        1
    } else if non_default_alias {
        2
    } else {
        3
    }
}

/// Merges and ranks prefix matches from the tag stores and the emoji
/// alias index into one bounded list. Also keeps the per-tag usage
/// counters that selections feed back.
#[derive(Debug)]
pub struct SuggestionRanker {
    limit: usize,
    usage: HashMap<String, u32>,
}

impl Default for SuggestionRanker {
    fn default() -> Self {
        Self::new()
    }
}

impl SuggestionRanker {
    pub fn new() -> Self {
        Self::with_limit(SUGGESTION_LIMIT)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            usage: HashMap::new(),
        }
    }

    /// Rank candidates for the current capture buffer. Below the
    /// minimum prefix length only exact matches are surfaced.
    ///
    /// Ordering: namespace priority (custom text, then image, then
    /// emoji); within a namespace exact matches, then favorites, then
    /// non-default aliases, then the rest; ties break by tag ascending.
    pub fn suggest(
        &self,
        buffer: &str,
        text: &TagStore,
        image: &TagStore,
        emoji: &EmojiIndex,
    ) -> Vec<Suggestion> {
        let prefix = normalize_tag(buffer);
        if prefix.is_empty() {
            return Vec::new();
        }
        let gated = prefix.chars().count() < MIN_SUGGESTION_PREFIX;

        let mut merged = Vec::new();
        merged.extend(self.store_candidates(&prefix, gated, text));
        merged.extend(self.store_candidates(&prefix, gated, image));
        merged.extend(self.emoji_candidates(&prefix, gated, emoji));
        merged.truncate(self.limit);
        merged
    }

    fn store_candidates(&self, prefix: &str, gated: bool, store: &TagStore) -> Vec<Suggestion> {
        let tags = if gated {
            match store.get(prefix) {
                Some(_) => vec![prefix.to_string()],
                None => Vec::new(),
            }
        } else {
            store.collect_tags(prefix, self.limit)
        };

        let mut candidates: Vec<Suggestion> = tags
            .into_iter()
            .filter_map(|tag| {
                let payload = store.get(&tag)?.clone();
                Some(Suggestion {
                    exact: tag == prefix,
                    is_favorite: store.is_favorite(&tag),
                    namespace: store.namespace(),
                    payload,
                    tag,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            tier(a.exact, a.is_favorite, false)
                .cmp(&tier(b.exact, b.is_favorite, false))
                .then_with(|| a.tag.cmp(&b.tag))
        });
        candidates.truncate(self.limit);
        candidates
    }

    fn emoji_candidates(&self, prefix: &str, gated: bool, emoji: &EmojiIndex) -> Vec<Suggestion> {
        let aliases = if gated {
            match emoji.lookup(prefix) {
                Some(_) => vec![prefix.to_string()],
                None => Vec::new(),
            }
        } else {
            emoji.aliases_with_prefix(prefix, self.limit)
        };

        let mut candidates: Vec<Suggestion> = aliases
            .into_iter()
            .filter_map(|alias| {
                let glyph = emoji.lookup(&alias)?.to_string();
                Some(Suggestion {
                    exact: alias == prefix,
                    is_favorite: false,
                    namespace: Namespace::Emoji,
                    payload: TagPayload::EmojiAlias(glyph),
                    tag: alias,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            let a_tier = tier(a.exact, false, !emoji.is_default_alias(&a.tag));
            let b_tier = tier(b.exact, false, !emoji.is_default_alias(&b.tag));
            a_tier.cmp(&b_tier).then_with(|| a.tag.cmp(&b.tag))
        });

        // One suggestion per emoji: variation selectors do not make a
        // new identity, and the first-ranked alias wins.
        let mut seen = HashSet::new();
        candidates.retain(|s| seen.insert(canonical_emoji(s.payload.as_insert_text())));
        candidates.truncate(self.limit);
        candidates
    }

    /// Record that `tag` was picked; feeds future ranking.
    pub fn record_usage(&mut self, tag: &str) {
        *self.usage.entry(normalize_tag(tag)).or_insert(0) += 1;
    }

    pub fn usage_count(&self, tag: &str) -> u32 {
        self.usage.get(&normalize_tag(tag)).copied().unwrap_or(0)
    }
}

/// Cursor over one ranked suggestion list. The top item starts
/// highlighted; arrow keys move linearly without wrapping.
#[derive(Debug)]
pub struct SuggestionList {
    items: Vec<Suggestion>,
    highlighted: usize,
}

impl SuggestionList {
    pub fn new(items: Vec<Suggestion>) -> Self {
        Self {
            items,
            highlighted: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[Suggestion] {
        &self.items
    }

    pub fn highlighted(&self) -> Option<&Suggestion> {
        self.items.get(self.highlighted)
    }

    pub fn move_down(&mut self) {
        if self.highlighted + 1 < self.items.len() {
            self.highlighted += 1;
        }
    }

    pub fn move_up(&mut self) {
        self.highlighted = self.highlighted.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emoji::EmojiEntry;
    use tempfile::TempDir;

    fn store(dir: &TempDir, namespace: Namespace) -> TagStore {
        let ns = namespace.as_str();
        TagStore::open_at(
            namespace,
            dir.path().join(format!("{ns}-map.json")),
            dir.path().join(format!("{ns}-order.json")),
            dir.path().join(format!("{ns}-favorites.json")),
        )
    }

    fn text(s: &str) -> TagPayload {
        TagPayload::Text(s.to_string())
    }

    #[test]
    fn short_prefix_only_surfaces_exact_matches() {
        let dir = TempDir::new().unwrap();
        let mut texts = store(&dir, Namespace::CustomText);
        texts.set("h", text("short"));
        texts.set("hi", text("hello there"));
        texts.set("hip", text("hip hip"));
        let images = store(&dir, Namespace::Image);
        let emoji = EmojiIndex::with_builtin();

        let ranker = SuggestionRanker::new();
        let one = ranker.suggest("h", &texts, &images, &emoji);
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].tag, "h");

        let full = ranker.suggest("hi", &texts, &images, &emoji);
        let tags: Vec<&str> = full.iter().map(|s| s.tag.as_str()).collect();
        assert_eq!(tags, vec!["hi", "hip"]);
        assert!(full[0].exact);
    }

    #[test]
    fn namespace_priority_custom_then_image_then_emoji() {
        let dir = TempDir::new().unwrap();
        let mut texts = store(&dir, Namespace::CustomText);
        texts.set("fire", text("custom fire"));
        let mut images = store(&dir, Namespace::Image);
        images.set("fireplace", TagPayload::ImageRef("img-1".into()));
        let emoji = EmojiIndex::with_builtin();

        let ranker = SuggestionRanker::new();
        let merged = ranker.suggest("fire", &texts, &images, &emoji);

        let namespaces: Vec<Namespace> = merged.iter().map(|s| s.namespace).collect();
        assert_eq!(
            namespaces,
            vec![Namespace::CustomText, Namespace::Image, Namespace::Emoji]
        );
        // Exact custom-text match outranks everything.
        assert_eq!(merged[0].payload, text("custom fire"));
    }

    #[test]
    fn favorites_outrank_plain_matches() {
        let dir = TempDir::new().unwrap();
        let mut texts = store(&dir, Namespace::CustomText);
        texts.set("brb", text("be right back"));
        texts.set("bro", text("brother"));
        texts.set("brunch", text("brunch time"));
        texts.toggle_favorite("brunch");
        let images = store(&dir, Namespace::Image);
        let emoji = EmojiIndex::from_entries(Vec::new());

        let ranker = SuggestionRanker::new();
        let tags: Vec<String> = ranker
            .suggest("br", &texts, &images, &emoji)
            .into_iter()
            .map(|s| s.tag)
            .collect();
        assert_eq!(tags, vec!["brunch", "brb", "bro"]);
    }

    #[test]
    fn non_default_aliases_outrank_default_tags() {
        let entries = vec![
            EmojiEntry {
                emoji: "🔥".into(),
                aliases: vec!["fire".into(), "flame".into()],
            },
            EmojiEntry {
                emoji: "🎏".into(),
                aliases: vec!["flags".into()],
            },
        ];
        let emoji = EmojiIndex::from_entries(entries);
        let dir = TempDir::new().unwrap();
        let texts = store(&dir, Namespace::CustomText);
        let images = store(&dir, Namespace::Image);

        let ranker = SuggestionRanker::new();
        let tags: Vec<String> = ranker
            .suggest("fl", &texts, &images, &emoji)
            .into_iter()
            .map(|s| s.tag)
            .collect();
        // "flame" is a non-default alias for 🔥; "flags" is 🎏's default.
        assert_eq!(tags, vec!["flame", "flags"]);
    }

    #[test]
    fn emoji_deduplicated_by_canonical_identity() {
        let entries = vec![
            EmojiEntry {
                emoji: "❤️".into(),
                aliases: vec!["heart".into()],
            },
            EmojiEntry {
                emoji: "❤".into(),
                aliases: vec!["heart2".into()],
            },
        ];
        let emoji = EmojiIndex::from_entries(entries);
        let dir = TempDir::new().unwrap();
        let texts = store(&dir, Namespace::CustomText);
        let images = store(&dir, Namespace::Image);

        let ranker = SuggestionRanker::new();
        let merged = ranker.suggest("hear", &texts, &images, &emoji);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].tag, "heart");
    }

    #[test]
    fn result_list_is_capped() {
        let dir = TempDir::new().unwrap();
        let mut texts = store(&dir, Namespace::CustomText);
        for i in 0..40 {
            texts.set(&format!("tag{i:02}"), text("x"));
        }
        let images = store(&dir, Namespace::Image);
        let emoji = EmojiIndex::from_entries(Vec::new());

        let ranker = SuggestionRanker::new();
        assert_eq!(ranker.suggest("ta", &texts, &images, &emoji).len(), 25);
        let small = SuggestionRanker::with_limit(3);
        assert_eq!(small.suggest("ta", &texts, &images, &emoji).len(), 3);
    }

    #[test]
    fn cursor_moves_linearly_without_wrapping() {
        let items = vec![
            Suggestion {
                tag: "a".into(),
                payload: text("a"),
                namespace: Namespace::CustomText,
                is_favorite: false,
                exact: false,
            },
            Suggestion {
                tag: "b".into(),
                payload: text("b"),
                namespace: Namespace::CustomText,
                is_favorite: false,
                exact: false,
            },
        ];
        let mut list = SuggestionList::new(items);
        assert_eq!(list.highlighted().unwrap().tag, "a");
        list.move_up();
        assert_eq!(list.highlighted().unwrap().tag, "a");
        list.move_down();
        assert_eq!(list.highlighted().unwrap().tag, "b");
        list.move_down();
        assert_eq!(list.highlighted().unwrap().tag, "b");
    }

    #[test]
    fn usage_counter_accumulates() {
        let mut ranker = SuggestionRanker::new();
        ranker.record_usage("Fire");
        ranker.record_usage("fire");
        assert_eq!(ranker.usage_count("FIRE"), 2);
        assert_eq!(ranker.usage_count("other"), 0);
    }
}
