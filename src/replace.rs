use std::thread;
use std::time::Duration;

use log::debug;

use crate::config::MAX_REPEAT;
use crate::error::Result;
use crate::keyboard::{create_keyboard_controller, send_backspace, type_text};
use crate::models::TagPayload;

/// Where synthetic keystrokes go. The host adapter is enigo; tests use
/// a recording stub. Requests are delivered in the exact order
/// submitted.
pub trait KeystrokeSink {
    fn delete_chars(&mut self, count: usize) -> Result<()>;
    fn insert_text(&mut self, text: &str) -> Result<()>;
}

/// Synthetic input through the OS via enigo. The controller is created
/// per request; enigo handles are not portably sendable across
/// threads.
#[derive(Debug, Default)]
pub struct EnigoSink;

impl KeystrokeSink for EnigoSink {
    fn delete_chars(&mut self, count: usize) -> Result<()> {
        let mut keyboard = create_keyboard_controller()?;
        send_backspace(&mut keyboard, count)
    }

    fn insert_text(&mut self, text: &str) -> Result<()> {
        let mut keyboard = create_keyboard_controller()?;
        // Brief pause so the deletes settle before typing begins.
        thread::sleep(Duration::from_millis(10));
        type_text(&mut keyboard, text)
    }
}

/// Replaces the typed delimiter sequence with the resolved payload:
/// delete exactly what is on screen, then insert the payload repeated
/// `repeat` times.
pub struct ReplacementExecutor<S: KeystrokeSink> {
    sink: S,
}

impl<S: KeystrokeSink> ReplacementExecutor<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    /// Perform one replacement. The deletes and the single insertion
    /// are issued in order and the call does not return until the sink
    /// has accepted all of them. The repeat count is clamped to
    /// `1..=MAX_REPEAT` here as well, so no caller can request an
    /// insertion large enough to abort the process.
    pub fn execute(
        &mut self,
        payload: &TagPayload,
        repeat: u32,
        chars_to_delete: usize,
    ) -> Result<()> {
        let repeat = repeat.clamp(1, MAX_REPEAT) as usize;
        let insert = payload.as_insert_text().repeat(repeat);
        debug!(
            "replacing {} chars with {} byte payload (x{})",
            chars_to_delete,
            insert.len(),
            repeat
        );

        self.sink.delete_chars(chars_to_delete)?;
        self.sink.insert_text(&insert)
    }
}
