//! taglet - a live tag-expansion engine.
//!
//! Type a delimited tag anywhere (`/fire/`, or `3/fire/` to repeat it
//! three times) and taglet replaces it in place with the payload the
//! tag resolves to: a custom text snippet, an image reference, or an
//! emoji alias.

pub mod capture;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod emoji;
pub mod engine;
pub mod error;
pub mod keyboard;
pub mod models;
pub mod replace;
pub mod store;
pub mod suggest;
pub mod trie;

// Re-export common items for convenience
pub use capture::{CaptureEngine, CaptureOutcome, CaptureUpdate, InputEvent};
pub use config::{get_config_dir, is_daemon_running, CaptureConfig};
pub use daemon::{daemon_status, run_daemon_worker, start_daemon, stop_daemon};
pub use emoji::{EmojiEntry, EmojiIndex};
pub use engine::ExpansionService;
pub use error::{Result, TagletError};
pub use models::{Namespace, TagPayload, TagRecord};
pub use replace::{KeystrokeSink, ReplacementExecutor};
pub use store::TagStore;
pub use suggest::{Suggestion, SuggestionList, SuggestionRanker};
pub use trie::TagTrie;
