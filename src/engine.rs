use std::sync::{Arc, Mutex, RwLock};

use log::{debug, warn};

use crate::capture::CaptureOutcome;
use crate::emoji::EmojiIndex;
use crate::error::Result;
use crate::models::{normalize_tag, TagPayload};
use crate::replace::{KeystrokeSink, ReplacementExecutor};
use crate::store::TagStore;
use crate::suggest::{Suggestion, SuggestionRanker};

/// Ties the namespaces, the ranker and the replacement executor
/// together. Explicitly constructed and injected at startup; the
/// stores are behind `RwLock` so prefix queries from the suggestion
/// worker never race a mutation or an index rebuild.
pub struct ExpansionService<S: KeystrokeSink> {
    texts: Arc<RwLock<TagStore>>,
    images: Arc<RwLock<TagStore>>,
    emoji: Arc<EmojiIndex>,
    ranker: Mutex<SuggestionRanker>,
    executor: Mutex<ReplacementExecutor<S>>,
}

impl<S: KeystrokeSink> ExpansionService<S> {
    pub fn new(
        texts: Arc<RwLock<TagStore>>,
        images: Arc<RwLock<TagStore>>,
        emoji: Arc<EmojiIndex>,
        sink: S,
    ) -> Self {
        Self {
            texts,
            images,
            emoji,
            ranker: Mutex::new(SuggestionRanker::new()),
            executor: Mutex::new(ReplacementExecutor::new(sink)),
        }
    }

    /// Resolve a tag against the namespaces in priority order: custom
    /// text, then images, then emoji aliases.
    pub fn resolve(&self, tag: &str) -> Option<TagPayload> {
        let tag = normalize_tag(tag);
        if tag.is_empty() {
            return None;
        }

        if let Ok(store) = self.texts.read() {
            if let Some(payload) = store.get(&tag) {
                return Some(payload.clone());
            }
        }
        if let Ok(store) = self.images.read() {
            if let Some(payload) = store.get(&tag) {
                return Some(payload.clone());
            }
        }
        self.emoji
            .lookup(&tag)
            .map(|emoji| TagPayload::EmojiAlias(emoji.to_string()))
    }

    /// Resolve and replace a completed capture. A lookup miss is a
    /// normal outcome: nothing is deleted, nothing is inserted, and the
    /// typed text stays on screen. Returns whether a replacement ran.
    pub fn handle_completion(&self, outcome: &CaptureOutcome) -> Result<bool> {
        let Some(payload) = self.resolve(&outcome.tag) else {
            debug!("no payload for tag {:?}; leaving typed text", outcome.tag);
            return Ok(false);
        };

        let mut executor = match self.executor.lock() {
            Ok(executor) => executor,
            Err(poisoned) => {
                warn!("executor lock poisoned; recovering");
                poisoned.into_inner()
            }
        };
        executor.execute(&payload, outcome.repeat, outcome.chars_to_delete)?;
        Ok(true)
    }

    /// Replace using an explicitly selected suggestion instead of the
    /// typed tag, and record the usage signal for ranking feedback.
    pub fn apply_selection(
        &self,
        suggestion: &Suggestion,
        repeat: u32,
        chars_to_delete: usize,
    ) -> Result<()> {
        if let Ok(mut ranker) = self.ranker.lock() {
            ranker.record_usage(&suggestion.tag);
        }
        let mut executor = match self.executor.lock() {
            Ok(executor) => executor,
            Err(poisoned) => poisoned.into_inner(),
        };
        executor.execute(&suggestion.payload, repeat, chars_to_delete)
    }

    /// Ranked suggestions for the current capture buffer.
    pub fn suggest(&self, buffer: &str) -> Vec<Suggestion> {
        let (Ok(texts), Ok(images)) = (self.texts.read(), self.images.read()) else {
            return Vec::new();
        };
        let ranker = match self.ranker.lock() {
            Ok(ranker) => ranker,
            Err(poisoned) => poisoned.into_inner(),
        };
        ranker.suggest(buffer, &texts, &images, &self.emoji)
    }

    pub fn texts(&self) -> &Arc<RwLock<TagStore>> {
        &self.texts
    }

    pub fn images(&self) -> &Arc<RwLock<TagStore>> {
        &self.images
    }

    pub fn emoji(&self) -> &Arc<EmojiIndex> {
        &self.emoji
    }
}
