use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use rdev::{Event, EventType, Key as RdevKey};
use std::thread;
use std::time::Duration;

use crate::capture::InputEvent;
use crate::error::{Result, TagletError};

/// Shifted punctuation arrives with a base key plus the produced glyph
/// in the event name; trust the name for these keys.
const NAMED_PUNCTUATION: &[RdevKey] = &[
    RdevKey::Num0,
    RdevKey::Num1,
    RdevKey::Num2,
    RdevKey::Num3,
    RdevKey::Num4,
    RdevKey::Num5,
    RdevKey::Num6,
    RdevKey::Num7,
    RdevKey::Num8,
    RdevKey::Num9,
    RdevKey::Minus,
    RdevKey::Equal,
    RdevKey::SemiColon,
    RdevKey::Quote,
    RdevKey::Comma,
    RdevKey::Dot,
    RdevKey::Slash,
    RdevKey::BackSlash,
    RdevKey::LeftBracket,
    RdevKey::RightBracket,
    RdevKey::BackQuote,
];

/// Convert an rdev key-down event to the character it produced, if any.
pub fn rdev_key_to_char(key: &RdevKey, event: &Event) -> Option<char> {
    if NAMED_PUNCTUATION.contains(key) {
        if let Some(name) = &event.name {
            if name.chars().count() == 1 {
                return name.chars().next();
            }
        }
    }

    // Regular single character keys carry their glyph in the name.
    if let Some(name) = &event.name {
        if name.chars().count() == 1 {
            let c = name.chars().next()?;
            if !c.is_control() {
                return Some(c);
            }
        }
    }

    None
}

/// Translate a raw rdev event into a capture-engine event. Returns
/// `None` for key releases, modifiers and anything else the engine
/// does not care about.
pub fn translate_event(event: &Event) -> Option<InputEvent> {
    let EventType::KeyPress(key) = event.event_type else {
        return None;
    };

    match key {
        RdevKey::Backspace => Some(InputEvent::Backspace),
        RdevKey::Return | RdevKey::KpReturn => Some(InputEvent::Enter),
        RdevKey::Tab => Some(InputEvent::Tab),
        RdevKey::Space => Some(InputEvent::Char(' ')),
        _ => rdev_key_to_char(&key, event).map(InputEvent::Char),
    }
}

/// Create a keyboard controller for synthetic input
pub fn create_keyboard_controller() -> Result<Enigo> {
    let settings = Settings::default();
    Enigo::new(&settings)
        .map_err(|err| TagletError::Enigo(format!("Failed to create keyboard controller: {}", err)))
}

/// Send backspace key presses
pub fn send_backspace(keyboard: &mut Enigo, count: usize) -> Result<()> {
    for _ in 0..count {
        thread::sleep(Duration::from_millis(2));
        keyboard
            .key(Key::Backspace, Direction::Click)
            .map_err(|err| TagletError::Enigo(format!("Failed to send backspace: {}", err)))?;
    }
    Ok(())
}

/// Type text, preserving newlines and chunking long lines so the host
/// keyboard buffer is not overwhelmed.
pub fn type_text(keyboard: &mut Enigo, text: &str) -> Result<()> {
    const CHUNK_SIZE: usize = 512;

    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            keyboard
                .key(Key::Return, Direction::Click)
                .map_err(|err| TagletError::Enigo(format!("Failed to type newline: {}", err)))?;
            thread::sleep(Duration::from_millis(15));
        }

        if line.is_empty() {
            continue;
        }

        let chars: Vec<char> = line.chars().collect();
        for chunk in chars.chunks(CHUNK_SIZE) {
            let chunk_str: String = chunk.iter().collect();
            keyboard
                .text(&chunk_str)
                .map_err(|err| TagletError::Enigo(format!("Failed to type text: {}", err)))?;
            if chars.len() > CHUNK_SIZE {
                thread::sleep(Duration::from_millis(20));
            }
        }
        thread::sleep(Duration::from_millis(10));
    }

    Ok(())
}
