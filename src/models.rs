use chrono::Local;
use serde::{Deserialize, Serialize};

/// The namespaces a tag can resolve against, in resolution priority
/// order: custom text first, then image references, then emoji.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Namespace {
    CustomText,
    Image,
    Emoji,
}

impl Namespace {
    /// Stable name used for the persisted document filenames.
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::CustomText => "text",
            Namespace::Image => "image",
            Namespace::Emoji => "emoji",
        }
    }
}

/// The replacement content a tag resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum TagPayload {
    /// Literal text typed in place of the tag.
    Text(String),
    /// Opaque identifier of an image known to the UI layer.
    ImageRef(String),
    /// The emoji character itself; resolved through the alias index.
    EmojiAlias(String),
}

impl TagPayload {
    /// The string typed out by the replacement executor.
    pub fn as_insert_text(&self) -> &str {
        match self {
            TagPayload::Text(text) => text,
            TagPayload::ImageRef(id) => id,
            TagPayload::EmojiAlias(emoji) => emoji,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_insert_text().is_empty()
    }
}

/// One tag→payload binding as persisted and listed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagRecord {
    pub tag: String,
    pub payload: TagPayload,
    pub created_at: String,
}

impl TagRecord {
    pub fn new(tag: String, payload: TagPayload) -> Self {
        Self {
            tag,
            payload,
            created_at: Local::now().to_rfc3339(),
        }
    }
}

/// Normalize a tag for every lookup and mutation: tags are
/// case-insensitive and stored lowercased.
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases_and_trims() {
        assert_eq!(normalize_tag("  FiRe "), "fire");
        assert_eq!(normalize_tag("brb"), "brb");
    }

    #[test]
    fn payload_insert_text() {
        assert_eq!(TagPayload::Text("hi".into()).as_insert_text(), "hi");
        assert_eq!(TagPayload::EmojiAlias("🔥".into()).as_insert_text(), "🔥");
        assert!(TagPayload::Text(String::new()).is_empty());
    }
}
