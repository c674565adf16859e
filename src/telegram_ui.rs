//! Telegram UI Components
//!
//! Inline keyboards and message splitting for the Telegram transport.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::engine::PackageChoice;
use crate::messages::Keyboard;

/// Telegram's per-message text limit, in UTF-16 code units
pub const MESSAGE_LIMIT: usize = 4096;

/// Sent instead of an empty reply (Telegram rejects empty messages)
pub const EMPTY_PLACEHOLDER: &str = "(пустой ответ)";

// ============ Inline Keyboards ============

/// Two-button prompt of the package-lookup workflow
pub fn package_choice_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            "Все пакеты",
            PackageChoice::All.encode(),
        )],
        vec![InlineKeyboardButton::callback(
            "Определённый пакет",
            PackageChoice::Specific.encode(),
        )],
    ])
}

pub fn keyboard_markup(keyboard: Keyboard) -> InlineKeyboardMarkup {
    match keyboard {
        Keyboard::PackageChoice => package_choice_keyboard(),
    }
}

// ============ Message Splitting ============

/// Length as Telegram counts it
pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Split text into chunks of at most `max` UTF-16 code units, never inside a char.
/// Empty or whitespace-only text yields the placeholder.
pub fn split_message(text: &str, max: usize) -> Vec<&str> {
    if text.trim().is_empty() {
        return vec![EMPTY_PLACEHOLDER];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut units = 0;
    for (i, c) in text.char_indices() {
        let width = c.len_utf16();
        if units + width > max && i > start {
            chunks.push(&text[start..i]);
            start = i;
            units = 0;
        }
        units += width;
    }
    chunks.push(&text[start..]);
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn test_short_message_single_chunk() {
        let msg = "Hello, world!";
        assert_eq!(split_message(msg, MESSAGE_LIMIT), vec![msg]);
    }

    #[test]
    fn test_exact_boundary_message() {
        let msg = "a".repeat(MESSAGE_LIMIT);
        let chunks = split_message(&msg, MESSAGE_LIMIT);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), MESSAGE_LIMIT);
    }

    #[test]
    fn test_message_splits_correctly() {
        let msg = "a".repeat(MESSAGE_LIMIT + 100);
        let chunks = split_message(&msg, MESSAGE_LIMIT);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), MESSAGE_LIMIT);
        assert_eq!(chunks[1].len(), 100);
    }

    #[test]
    fn test_cyrillic_counts_chars() {
        let msg = "ж".repeat(MESSAGE_LIMIT + 1);
        let chunks = split_message(&msg, MESSAGE_LIMIT);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), MESSAGE_LIMIT);
        assert_eq!(chunks.concat(), msg);
    }

    #[test]
    fn test_astral_chars_count_double() {
        let msg = "😀".repeat(MESSAGE_LIMIT);
        let chunks = split_message(&msg, MESSAGE_LIMIT);
        assert_eq!(chunks.len(), 2);
        for chunk in &chunks {
            assert_eq!(utf16_len(chunk), MESSAGE_LIMIT);
        }
        assert_eq!(chunks.concat(), msg);
    }

    #[test]
    fn test_surrogate_pair_not_split_at_limit() {
        let msg = format!("{}😀", "a".repeat(MESSAGE_LIMIT - 1));
        let chunks = split_message(&msg, MESSAGE_LIMIT);
        assert_eq!(chunks, vec![&msg[..MESSAGE_LIMIT - 1], "😀"]);
    }

    #[test]
    fn test_empty_message_placeholder() {
        assert_eq!(split_message("", MESSAGE_LIMIT), vec![EMPTY_PLACEHOLDER]);
        assert_eq!(split_message(" \n", MESSAGE_LIMIT), vec![EMPTY_PLACEHOLDER]);
    }

    #[test]
    fn test_package_keyboard_callback_data() {
        let markup = package_choice_keyboard();
        let data: Vec<String> = markup
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|b| match &b.kind {
                InlineKeyboardButtonKind::CallbackData(d) => Some(d.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(data, vec!["all_packages", "specific_package"]);
    }
}
