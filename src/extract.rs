//! Text Extraction
//!
//! Pure helpers that pull phone numbers and email addresses out of free text,
//! plus the password-strength predicate used by `/verify_password`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::store::RecordKind;

/// Russian-format numbers: `+7`/`8` prefix, optional separators and parentheses.
/// Digit boundaries are checked separately since `regex` has no lookaround.
static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+7|8)[ -]?\(?\d{3}\)?[ -]?\d{3}[ -]?\d{2}[ -]?\d{2}").unwrap()
});

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap()
});

static LONG_DIGIT_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{11,}").unwrap());

static DIGIT_BEFORE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d$").unwrap());
static DIGIT_AFTER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d").unwrap());

/// Symbols accepted as the "special character" of a strong password
pub const PASSWORD_SYMBOLS: &str = "!@#$%^&*()";

/// Minimum length of a strong password, in characters
pub const MIN_PASSWORD_LEN: usize = 8;

/// Candidates pulled out of one message, waiting for confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    pub kind: RecordKind,
    pub items: Vec<String>,
}

impl ExtractionResult {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Numbered list, one item per line: `1. item`
    pub fn numbered(&self) -> String {
        self.items
            .iter()
            .enumerate()
            .map(|(i, item)| format!("{}. {}", i + 1, item))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Strip everything but digits and fold a leading `7` into the domestic `8`.
pub fn normalize_phone_number(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.strip_prefix('7') {
        Some(rest) => format!("8{}", rest),
        None => digits,
    }
}

/// Find raw phone-number matches that are not glued to other digits.
///
/// A rejected candidate does not hide a valid one starting inside it: the
/// scan resumes one character after the rejected start.
pub fn find_raw_phone_numbers(text: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut pos = 0;

    while let Some(m) = PHONE_RE.find_at(text, pos) {
        let digit_before = DIGIT_BEFORE_RE.is_match(&text[..m.start()]);
        let digit_after = DIGIT_AFTER_RE.is_match(&text[m.end()..]);

        if !digit_before && !digit_after {
            found.push(m.as_str());
            pos = m.end();
        } else {
            // Advance past the first char of the rejected match
            pos = m.start()
                + text[m.start()..]
                    .chars()
                    .next()
                    .map(char::len_utf8)
                    .unwrap_or(1);
        }

        if pos >= text.len() {
            break;
        }
    }

    found
}

/// Extract phone numbers: normalized, duplicates collapsed (first occurrence wins).
pub fn extract_phone_numbers(text: &str) -> ExtractionResult {
    let mut seen = HashSet::new();
    let items = find_raw_phone_numbers(text)
        .into_iter()
        .map(normalize_phone_number)
        .filter(|n| seen.insert(n.clone()))
        .collect();

    ExtractionResult {
        kind: RecordKind::Phone,
        items,
    }
}

/// Extract email addresses in input order. Repeats are kept, case is untouched.
pub fn extract_emails(text: &str) -> ExtractionResult {
    let items = EMAIL_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();

    ExtractionResult {
        kind: RecordKind::Email,
        items,
    }
}

/// Run extraction for the given record kind
pub fn extract(kind: RecordKind, text: &str) -> ExtractionResult {
    match kind {
        RecordKind::Phone => extract_phone_numbers(text),
        RecordKind::Email => extract_emails(text),
    }
}

/// True if the text holds a run of 11 or more consecutive digits.
pub fn has_long_digit_run(text: &str) -> bool {
    LONG_DIGIT_RUN_RE.is_match(text)
}

/// Binary strength check: length >= 8 with lower, upper, digit and one of `!@#$%^&*()`.
pub fn is_strong_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SYMBOLS.contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_plus_seven() {
        assert_eq!(normalize_phone_number("+7 (999) 123-45-67"), "89991234567");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_phone_number("8 999 123 45 67");
        assert_eq!(once, "89991234567");
        assert_eq!(normalize_phone_number(&once), once);
    }

    #[test]
    fn test_phone_formats() {
        let text = "Звоните: +7 999 123 45 67, 8(999)7654321, 8-999-111-22-33 или 89990001122.";
        let result = extract_phone_numbers(text);
        assert_eq!(
            result.items,
            vec!["89991234567", "89997654321", "89991112233", "89990001122"]
        );
        assert_eq!(result.kind, RecordKind::Phone);
    }

    #[test]
    fn test_phone_duplicates_collapse() {
        let text = "+79991234567 и 8 (999) 123-45-67 и снова 89991234567";
        let result = extract_phone_numbers(text);
        assert_eq!(result.items, vec!["89991234567"]);
    }

    #[test]
    fn test_phone_embedded_in_longer_digits_rejected() {
        assert!(extract_phone_numbers("1289991234567").is_empty());
        assert!(extract_phone_numbers("899912345678").is_empty());
        assert!(extract_phone_numbers("id 389991234567 end").is_empty());
    }

    #[test]
    fn test_phone_boundary_is_decimal_digit() {
        // Superscripts are numeric but not decimal digits
        assert_eq!(extract_phone_numbers("89991234567²").items, vec!["89991234567"]);
        assert_eq!(extract_phone_numbers("½89991234567").items, vec!["89991234567"]);
        // Arabic-Indic digits are
        assert!(extract_phone_numbers("89991234567٣").is_empty());
    }

    #[test]
    fn test_phone_rejected_candidate_skipped() {
        // First candidate runs straight into another digit
        let text = "8 (999) 123-45-671 +7 999 000 11 22";
        let result = extract_phone_numbers(text);
        assert_eq!(result.items, vec!["89990001122"]);
    }

    #[test]
    fn test_phone_none_found() {
        assert!(extract_phone_numbers("no numbers here, just 12345").is_empty());
        assert!(extract_phone_numbers("").is_empty());
    }

    #[test]
    fn test_emails_keep_order_and_repeats() {
        let text = "Write to Ann.Lee@Example.com, bob+tag@mail.co.uk and Ann.Lee@Example.com again";
        let result = extract_emails(text);
        assert_eq!(
            result.items,
            vec!["Ann.Lee@Example.com", "bob+tag@mail.co.uk", "Ann.Lee@Example.com"]
        );
        assert_eq!(result.kind, RecordKind::Email);
    }

    #[test]
    fn test_emails_short_tld_rejected() {
        assert!(extract_emails("user@host.c").is_empty());
        assert!(extract_emails("not-an-email@").is_empty());
    }

    #[test]
    fn test_numbered_list() {
        let result = ExtractionResult {
            kind: RecordKind::Email,
            items: vec!["a@b.cd".into(), "e@f.gh".into()],
        };
        assert_eq!(result.numbered(), "1. a@b.cd\n2. e@f.gh");
    }

    #[test]
    fn test_long_digit_run() {
        assert!(has_long_digit_run("abc 12345678901 def"));
        assert!(!has_long_digit_run("1234567890"));
        assert!(!has_long_digit_run("8 999 123 45 67"));
    }

    #[test]
    fn test_password_strength() {
        assert!(is_strong_password("Abcdef1!"));
        assert!(!is_strong_password("abcdefgh"));
        assert!(!is_strong_password("Ab1!"));
        assert!(!is_strong_password("ABCDEFG1!"));
        assert!(!is_strong_password("Abcdefgh!"));
        assert!(!is_strong_password("Abcdefg12"));
        assert!(is_strong_password("Qwerty(2024)"));
    }
}
