//! Text sanitization for snapshot extraction
//!
//! Page text is compared against lowercase phrases, so it is cleaned of
//! invisible characters, whitespace-collapsed and lowercased before it
//! reaches the inference tiers.

use crate::utils::{normalize_whitespace, take_chars};

/// Maximum number of characters kept from section and body text
pub const TEXT_SNIPPET_CHARS: usize = 500;

/// Remove zero-width spaces and similar invisible characters
///
/// # Examples
///
/// ```
/// use stockwatch::parser::sanitize::remove_zero_width;
///
/// let text = "in\u{200B} stock\u{FEFF}";
/// assert_eq!(remove_zero_width(text), "in stock");
/// ```
pub fn remove_zero_width(text: &str) -> String {
    text.chars()
        .filter(|c| {
            !matches!(*c,
                '\u{200B}'..='\u{200F}' |
                '\u{2028}'..='\u{202F}' |
                '\u{FEFF}'
            )
        })
        .collect()
}

/// Clean, collapse and lowercase text
///
/// # Examples
///
/// ```
/// use stockwatch::parser::sanitize::normalize_text;
///
/// assert_eq!(normalize_text("  Sold\n\n  OUT "), "sold out");
/// ```
pub fn normalize_text(text: &str) -> String {
    normalize_whitespace(&remove_zero_width(text).replace('\u{00A0}', " ")).to_lowercase()
}

/// Normalized text cut down to [`TEXT_SNIPPET_CHARS`]
pub fn snippet(text: &str) -> String {
    take_chars(&normalize_text(text), TEXT_SNIPPET_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text_handles_nbsp() {
        assert_eq!(normalize_text("In\u{00A0}Stock"), "in stock");
    }

    #[test]
    fn test_snippet_is_bounded() {
        let long = "a ".repeat(1_000);
        assert_eq!(snippet(&long).chars().count(), TEXT_SNIPPET_CHARS);
    }

    #[test]
    fn test_snippet_keeps_short_text() {
        assert_eq!(snippet("  Add to Cart "), "add to cart");
    }
}
