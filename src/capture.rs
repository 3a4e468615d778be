use log::trace;

use crate::config::{CaptureConfig, MAX_REPEAT};

/// One keystroke as seen by the capture engine: the translated
/// character if the key produced one, or a distinguished control key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Char(char),
    Backspace,
    Enter,
    Tab,
}

/// What a keystroke did to the capture session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureUpdate {
    /// No session is in progress.
    NotCapturing,
    /// A session is in progress; `buffer` is the typed-so-far tag text
    /// for live suggestion queries.
    Capturing { buffer: String },
    /// The session was abandoned (backspace over the start delimiter,
    /// or an unconfigured terminator key).
    Aborted,
    /// A tag was completed and should be resolved.
    Completed(CaptureOutcome),
}

/// A finished capture, ready for resolution and replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOutcome {
    /// Raw typed tag, not yet normalized.
    pub tag: String,
    /// Parsed multiplier, clamped to `1..=MAX_REPEAT`.
    pub repeat: u32,
    /// Exact number of on-screen characters the replacement must delete:
    /// multiplier digits, start delimiter, typed text, and the end
    /// delimiter when one was typed (a trigger key adds nothing).
    pub chars_to_delete: usize,
    /// Finished by Tab/Enter rather than the end delimiter.
    pub via_trigger: bool,
}

#[derive(Debug)]
struct CaptureSession {
    /// Everything typed since the start delimiter, including any
    /// partial end-delimiter characters.
    buffer: String,
    /// The digit run that preceded the start delimiter, kept verbatim
    /// so a backspace-abort can restore it.
    digits: String,
}

#[derive(Debug)]
enum State {
    Idle,
    CapturingTag(CaptureSession),
}

/// State machine over the keystroke stream. Recognizes
/// `[digits]<start>text<end-or-trigger>` sequences and accounts for
/// every on-screen character so the replacement deletes exactly what
/// was typed.
#[derive(Debug)]
pub struct CaptureEngine {
    config: CaptureConfig,
    state: State,
    /// Digits typed immediately before a (potential) start delimiter.
    digit_run: String,
    /// Consecutive characters matching a proper prefix of a multi-char
    /// start delimiter.
    pending_start: String,
}

impl CaptureEngine {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            state: State::Idle,
            digit_run: String::new(),
            pending_start: String::new(),
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self.state, State::CapturingTag(_))
    }

    /// The typed-so-far tag text, if a session is in progress.
    pub fn buffer(&self) -> Option<&str> {
        match &self.state {
            State::CapturingTag(session) => Some(session.buffer.as_str()),
            State::Idle => None,
        }
    }

    /// Drop any in-progress session without side effects. Used when a
    /// replacement finishes or the host focus changes.
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.digit_run.clear();
        self.pending_start.clear();
    }

    /// Feed one keystroke and advance the state machine.
    pub fn feed(&mut self, event: InputEvent) -> CaptureUpdate {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Idle => self.feed_idle(event),
            State::CapturingTag(session) => self.feed_capturing(session, event),
        }
    }

    fn feed_idle(&mut self, event: InputEvent) -> CaptureUpdate {
        match event {
            InputEvent::Char(c) => {
                let mut candidate = self.pending_start.clone();
                candidate.push(c);

                if self.config.start_delimiter == candidate {
                    trace!("capture started (multiplier digits: {:?})", self.digit_run);
                    self.state = State::CapturingTag(CaptureSession {
                        buffer: String::new(),
                        digits: std::mem::take(&mut self.digit_run),
                    });
                    self.pending_start.clear();
                    return CaptureUpdate::Capturing {
                        buffer: String::new(),
                    };
                }

                if self.config.start_delimiter.starts_with(&candidate) {
                    self.pending_start = candidate;
                } else if self.pending_start.is_empty() && c.is_ascii_digit() {
                    // A digit run stays pending until the next
                    // non-digit decides whether it was a multiplier.
                    self.digit_run.push(c);
                } else {
                    // The partial delimiter match broke, so any digit
                    // run behind it is no longer adjacent. The failed
                    // character may itself open a new partial match or
                    // a new digit run, as in `;3;;` with delimiter
                    // `;;`: the stray `;` is discarded but the `3`
                    // still abuts the real delimiter.
                    self.digit_run.clear();
                    self.pending_start.clear();
                    if self.config.start_delimiter.starts_with(c) {
                        self.pending_start.push(c);
                    } else if c.is_ascii_digit() {
                        self.digit_run.push(c);
                    }
                }
                CaptureUpdate::NotCapturing
            }
            InputEvent::Backspace => {
                if self.pending_start.pop().is_none() {
                    self.digit_run.pop();
                }
                CaptureUpdate::NotCapturing
            }
            InputEvent::Enter | InputEvent::Tab => {
                self.digit_run.clear();
                self.pending_start.clear();
                CaptureUpdate::NotCapturing
            }
        }
    }

    fn feed_capturing(&mut self, mut session: CaptureSession, event: InputEvent) -> CaptureUpdate {
        match event {
            InputEvent::Char(c) => {
                session.buffer.push(c);
                if !self.config.end_delimiter.is_empty()
                    && session.buffer.ends_with(&self.config.end_delimiter)
                {
                    return CaptureUpdate::Completed(self.complete(session, false));
                }
                let buffer = session.buffer.clone();
                self.state = State::CapturingTag(session);
                CaptureUpdate::Capturing { buffer }
            }
            InputEvent::Backspace => {
                if session.buffer.pop().is_none() {
                    // The start delimiter itself is being erased. The
                    // multiplier digits are still on screen, so they go
                    // back to being a pending run.
                    trace!("capture aborted by backspace");
                    self.digit_run = session.digits;
                    return CaptureUpdate::Aborted;
                }
                let buffer = session.buffer.clone();
                self.state = State::CapturingTag(session);
                CaptureUpdate::Capturing { buffer }
            }
            InputEvent::Enter if self.config.trigger_enter => {
                CaptureUpdate::Completed(self.complete(session, true))
            }
            InputEvent::Tab if self.config.trigger_tab => {
                CaptureUpdate::Completed(self.complete(session, true))
            }
            InputEvent::Enter | InputEvent::Tab => {
                trace!("capture aborted by unconfigured terminator");
                CaptureUpdate::Aborted
            }
        }
    }

    fn complete(&mut self, session: CaptureSession, via_trigger: bool) -> CaptureOutcome {
        let typed_chars = session.buffer.chars().count();
        let tag = if via_trigger {
            session.buffer
        } else {
            session
                .buffer
                .strip_suffix(&self.config.end_delimiter)
                .unwrap_or(&session.buffer)
                .to_string()
        };

        let chars_to_delete = session.digits.chars().count()
            + self.config.start_delimiter.chars().count()
            + typed_chars;

        CaptureOutcome {
            tag,
            repeat: parse_multiplier(&session.digits),
            chars_to_delete,
            via_trigger,
        }
    }
}

/// Parse the digit run into a repeat count, clamped to
/// `1..=MAX_REPEAT`. An absent run is 1.
fn parse_multiplier(digits: &str) -> u32 {
    if digits.is_empty() {
        return 1;
    }
    match digits.parse::<u64>() {
        Ok(n) => n.clamp(1, u64::from(MAX_REPEAT)) as u32,
        // A run too long even for u64 is far over the cap.
        Err(_) => MAX_REPEAT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> CaptureEngine {
        CaptureEngine::new(CaptureConfig::default())
    }

    fn type_str(engine: &mut CaptureEngine, text: &str) -> CaptureUpdate {
        let mut last = CaptureUpdate::NotCapturing;
        for c in text.chars() {
            last = engine.feed(InputEvent::Char(c));
        }
        last
    }

    #[test]
    fn round_trip_with_end_delimiter() {
        let mut engine = engine();
        let update = type_str(&mut engine, "/fire/");
        let CaptureUpdate::Completed(outcome) = update else {
            panic!("expected completion, got {:?}", update);
        };
        assert_eq!(outcome.tag, "fire");
        assert_eq!(outcome.repeat, 1);
        // `/fire/` is six on-screen characters.
        assert_eq!(outcome.chars_to_delete, 6);
        assert!(!outcome.via_trigger);
        assert!(!engine.is_capturing());
    }

    #[test]
    fn multiplier_digits_count_toward_deletion() {
        let mut engine = engine();
        let update = type_str(&mut engine, "3/fire/");
        let CaptureUpdate::Completed(outcome) = update else {
            panic!("expected completion");
        };
        assert_eq!(outcome.tag, "fire");
        assert_eq!(outcome.repeat, 3);
        // "3" + "/" + "fire" + "/"
        assert_eq!(outcome.chars_to_delete, 7);
    }

    #[test]
    fn multi_digit_multiplier_and_zero_clamp() {
        let mut engine = engine();
        let CaptureUpdate::Completed(outcome) = type_str(&mut engine, "12/x/") else {
            panic!("expected completion");
        };
        assert_eq!(outcome.repeat, 12);
        assert_eq!(outcome.chars_to_delete, 2 + 1 + 1 + 1);

        let CaptureUpdate::Completed(outcome) = type_str(&mut engine, "0/x/") else {
            panic!("expected completion");
        };
        assert_eq!(outcome.repeat, 1);
        assert_eq!(outcome.chars_to_delete, 4);
    }

    #[test]
    fn oversized_multiplier_clamps_to_cap() {
        let mut engine = engine();
        let CaptureUpdate::Completed(outcome) = type_str(&mut engine, "4294967295/fire/") else {
            panic!("expected completion");
        };
        assert_eq!(outcome.repeat, MAX_REPEAT);
        // Every typed digit still counts toward deletion.
        assert_eq!(outcome.chars_to_delete, 10 + 1 + 4 + 1);

        // A run that overflows even u64 clamps the same way.
        let CaptureUpdate::Completed(outcome) =
            type_str(&mut engine, "99999999999999999999/x/")
        else {
            panic!("expected completion");
        };
        assert_eq!(outcome.repeat, MAX_REPEAT);
        assert_eq!(outcome.chars_to_delete, 20 + 1 + 1 + 1);
    }

    #[test]
    fn digits_must_be_adjacent_to_start_delimiter() {
        let mut engine = engine();
        engine.feed(InputEvent::Char('3'));
        engine.feed(InputEvent::Char('a'));
        let CaptureUpdate::Completed(outcome) = type_str(&mut engine, "/fire/") else {
            panic!("expected completion");
        };
        assert_eq!(outcome.repeat, 1);
        assert_eq!(outcome.chars_to_delete, 6);
    }

    #[test]
    fn trigger_key_completion_excludes_end_delimiter() {
        let mut engine = engine();
        type_str(&mut engine, "/fire");
        let update = engine.feed(InputEvent::Tab);
        let CaptureUpdate::Completed(outcome) = update else {
            panic!("expected completion");
        };
        assert_eq!(outcome.tag, "fire");
        // "/" + "fire", no end delimiter typed.
        assert_eq!(outcome.chars_to_delete, 5);
        assert!(outcome.via_trigger);
    }

    #[test]
    fn unconfigured_trigger_aborts() {
        let config = CaptureConfig {
            trigger_enter: false,
            ..CaptureConfig::default()
        };
        let mut engine = CaptureEngine::new(config);
        type_str(&mut engine, "/fir");
        assert_eq!(engine.feed(InputEvent::Enter), CaptureUpdate::Aborted);
        assert!(!engine.is_capturing());
    }

    #[test]
    fn backspace_edits_buffer() {
        let mut engine = engine();
        type_str(&mut engine, "/fax");
        engine.feed(InputEvent::Backspace);
        let update = engine.feed(InputEvent::Char('r'));
        assert_eq!(
            update,
            CaptureUpdate::Capturing {
                buffer: "far".to_string()
            }
        );
    }

    #[test]
    fn backspace_to_empty_aborts_and_preserves_digits() {
        let mut engine = engine();
        engine.feed(InputEvent::Char('2'));
        engine.feed(InputEvent::Char('/'));
        assert!(engine.is_capturing());

        assert_eq!(engine.feed(InputEvent::Backspace), CaptureUpdate::Aborted);
        assert!(!engine.is_capturing());

        // The digits survived on screen; retyping the delimiter picks
        // them back up.
        let CaptureUpdate::Completed(outcome) = type_str(&mut engine, "/hi/") else {
            panic!("expected completion");
        };
        assert_eq!(outcome.repeat, 2);
        assert_eq!(outcome.chars_to_delete, 1 + 1 + 2 + 1);
    }

    #[test]
    fn backspace_in_idle_eats_digit_run() {
        let mut engine = engine();
        engine.feed(InputEvent::Char('3'));
        engine.feed(InputEvent::Backspace);
        let CaptureUpdate::Completed(outcome) = type_str(&mut engine, "/x/") else {
            panic!("expected completion");
        };
        assert_eq!(outcome.repeat, 1);
        assert_eq!(outcome.chars_to_delete, 3);
    }

    #[test]
    fn empty_tag_completes_with_empty_buffer() {
        let mut engine = engine();
        let CaptureUpdate::Completed(outcome) = type_str(&mut engine, "//") else {
            panic!("expected completion");
        };
        assert_eq!(outcome.tag, "");
        assert_eq!(outcome.chars_to_delete, 2);
    }

    #[test]
    fn multi_char_delimiters() {
        let config = CaptureConfig {
            start_delimiter: ";;".to_string(),
            end_delimiter: ";;".to_string(),
            ..CaptureConfig::default()
        };
        let mut engine = CaptureEngine::new(config);
        let CaptureUpdate::Completed(outcome) = type_str(&mut engine, "2;;fire;;") else {
            panic!("expected completion");
        };
        assert_eq!(outcome.tag, "fire");
        assert_eq!(outcome.repeat, 2);
        // "2" + ";;" + "fire" + ";;"
        assert_eq!(outcome.chars_to_delete, 9);
    }

    #[test]
    fn digit_after_broken_partial_delimiter_starts_a_new_run() {
        let config = CaptureConfig {
            start_delimiter: ";;".to_string(),
            end_delimiter: ";;".to_string(),
            ..CaptureConfig::default()
        };
        let mut engine = CaptureEngine::new(config);

        // On screen: `;3;;fire;;`. The stray `;` never becomes part of
        // the delimiter, but the `3` directly abuts the real one.
        let CaptureUpdate::Completed(outcome) = type_str(&mut engine, ";3;;fire;;") else {
            panic!("expected completion");
        };
        assert_eq!(outcome.tag, "fire");
        assert_eq!(outcome.repeat, 3);
        // "3" + ";;" + "fire" + ";;" — the stray `;` stays on screen.
        assert_eq!(outcome.chars_to_delete, 1 + 2 + 4 + 2);
    }

    #[test]
    fn text_without_delimiters_never_captures() {
        let mut engine = engine();
        for c in "hello world 42".chars() {
            let update = engine.feed(InputEvent::Char(c));
            assert_eq!(update, CaptureUpdate::NotCapturing);
        }
        assert!(!engine.is_capturing());
    }
}
