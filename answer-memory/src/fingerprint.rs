//! Question fingerprinting.
//!
//! A fingerprint is the normalized, length-bounded form of a question used as
//! the cache key. Normalization is:
//!
//! 1. lower-case
//! 2. every character that is not a letter, digit or whitespace becomes a
//!    word separator (`"What's"` → `"what s"`)
//! 3. whitespace runs collapse to one space, ends trimmed
//! 4. truncate to [`MAX_FINGERPRINT_CHARS`] characters
//!
//! The function is pure: the same text always yields the same key.

use crate::errors::{MemoryError, Result};

/// Maximum length of a fingerprint, in characters.
pub const MAX_FINGERPRINT_CHARS: usize = 100;

/// Minimum fingerprint length accepted by `learn`, in characters.
pub const MIN_FINGERPRINT_CHARS: usize = 10;

/// Computes the fingerprint of a question.
///
/// # Errors
/// Returns [`MemoryError::InvalidInput`] if nothing is left after
/// normalization.
pub fn fingerprint(question_text: &str) -> Result<String> {
    let normalized = normalize(question_text);
    if normalized.is_empty() {
        return Err(MemoryError::invalid_input(
            "question text is empty after normalization",
        ));
    }
    Ok(normalized)
}

/// Normalizes text without the emptiness check.
pub(crate) fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len().min(MAX_FINGERPRINT_CHARS * 4));
    let mut chars = 0usize;
    let mut pending_space = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                if chars + 1 >= MAX_FINGERPRINT_CHARS {
                    break;
                }
                out.push(' ');
                chars += 1;
            }
            pending_space = false;
            out.push(c);
            chars += 1;
            if chars == MAX_FINGERPRINT_CHARS {
                break;
            }
        } else {
            pending_space = true;
        }
    }

    out
}

/// Splits a fingerprint into its distinct words of at least `min_len` characters.
pub(crate) fn significant_words(fingerprint: &str, min_len: usize) -> Vec<&str> {
    let mut words: Vec<&str> = Vec::new();
    for word in fingerprint.split(' ') {
        if word.chars().count() >= min_len && !words.contains(&word) {
            words.push(word);
        }
    }
    words
}
