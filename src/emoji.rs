use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{normalize_tag, TagPayload};
use crate::trie::TagTrie;

/// One emoji with the set of aliases that resolve to it. The first
/// alias in the list is the emoji's default (display) tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmojiEntry {
    pub emoji: String,
    pub aliases: Vec<String>,
}

/// Built-in catalog. Kept small on purpose; a full catalog can be
/// loaded from a document with the same shape.
const BUILTIN_CATALOG: &[(&str, &[&str])] = &[
    ("🔥", &["fire", "flame", "lit"]),
    ("😂", &["joy", "lol", "laughing"]),
    ("❤️", &["heart", "love"]),
    ("👍", &["thumbsup", "ok", "approve"]),
    ("👎", &["thumbsdown", "no"]),
    ("🎉", &["tada", "party", "celebrate"]),
    ("😀", &["grinning", "smile"]),
    ("😢", &["cry", "sad"]),
    ("🚀", &["rocket", "ship"]),
    ("✨", &["sparkles", "shiny"]),
    ("🙏", &["pray", "thanks", "please"]),
    ("💀", &["skull", "dead"]),
    ("🐟", &["fish"]),
    ("☕", &["coffee", "cafe"]),
    ("🌮", &["taco"]),
    ("🤝", &["handshake", "deal"]),
    ("💡", &["bulb", "idea"]),
    ("⭐", &["star"]),
    ("🍕", &["pizza"]),
    ("🎯", &["dart", "target"]),
];

/// Alias index over the emoji catalog, backed by its own `TagTrie` so
/// emoji prefix search stays independent from the tag namespaces.
#[derive(Debug)]
pub struct EmojiIndex {
    /// alias → emoji
    aliases: HashMap<String, String>,
    /// emoji → default (display) tag
    defaults: HashMap<String, String>,
    trie: TagTrie,
}

impl EmojiIndex {
    pub fn with_builtin() -> Self {
        let entries = BUILTIN_CATALOG
            .iter()
            .map(|(emoji, aliases)| EmojiEntry {
                emoji: emoji.to_string(),
                aliases: aliases.iter().map(|a| a.to_string()).collect(),
            })
            .collect();
        Self::from_entries(entries)
    }

    pub fn from_entries(entries: Vec<EmojiEntry>) -> Self {
        let mut aliases = HashMap::new();
        let mut defaults = HashMap::new();
        let mut trie = TagTrie::new();

        for entry in entries {
            for (i, alias) in entry.aliases.iter().enumerate() {
                let alias = normalize_tag(alias);
                if alias.is_empty() {
                    continue;
                }
                if i == 0 {
                    defaults.insert(entry.emoji.clone(), alias.clone());
                }
                trie.insert(&alias, TagPayload::EmojiAlias(entry.emoji.clone()));
                aliases.insert(alias, entry.emoji.clone());
            }
        }

        Self {
            aliases,
            defaults,
            trie,
        }
    }

    /// Resolve an alias to its emoji.
    pub fn lookup(&self, alias: &str) -> Option<&str> {
        self.aliases.get(&normalize_tag(alias)).map(String::as_str)
    }

    /// Aliases starting with `prefix`, lexicographic, at most `limit`.
    pub fn aliases_with_prefix(&self, prefix: &str, limit: usize) -> Vec<String> {
        self.trie.collect_with_prefix(prefix, limit)
    }

    /// The emoji's default (display) tag, if it is in the catalog.
    pub fn default_tag(&self, emoji: &str) -> Option<&str> {
        self.defaults.get(emoji).map(String::as_str)
    }

    /// Whether `alias` is the canonical default tag of the emoji it
    /// resolves to. Non-default aliases rank above default tags.
    pub fn is_default_alias(&self, alias: &str) -> bool {
        let alias = normalize_tag(alias);
        self.aliases
            .get(&alias)
            .and_then(|emoji| self.defaults.get(emoji))
            .map(|default| default == &alias)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

/// Identity of an emoji with presentation variation selectors stripped,
/// so `❤` and `❤️` deduplicate to one suggestion.
pub fn canonical_emoji(emoji: &str) -> String {
    emoji
        .chars()
        .filter(|&c| c != '\u{FE0E}' && c != '\u{FE0F}')
        .collect()
}
