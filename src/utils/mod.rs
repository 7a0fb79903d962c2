//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;

use anyhow::{Context, Result};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

    let re = WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("Invalid regex pattern"));

    re.replace_all(text.trim(), " ").to_string()
}

/// Keep at most `max_chars` characters, never splitting a code point
pub fn take_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Parse a URL and require an http or https scheme
pub fn parse_http_url(raw: &str) -> Result<Url> {
    let parsed = Url::parse(raw.trim()).with_context(|| format!("Invalid URL: {raw}"))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => anyhow::bail!("Unsupported URL scheme '{other}' in {raw}"),
    }
}

/// Extract domain from URL
pub fn extract_domain(url: &str) -> Result<String> {
    let parsed = Url::parse(url).context("Invalid URL")?;

    parsed
        .host_str()
        .map(|s| s.to_string())
        .context("No host in URL")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  hello   world  "), "hello world");
        assert_eq!(normalize_whitespace("hello\n\n\tworld"), "hello world");
    }

    #[test]
    fn test_take_chars() {
        assert_eq!(take_chars("short", 10), "short");
        assert_eq!(take_chars("abcdef", 3), "abc");
        assert_eq!(take_chars("héllo", 2), "hé");
    }

    #[test]
    fn test_parse_http_url() {
        assert!(parse_http_url("https://shop.example.com/p/1").is_ok());
        assert!(parse_http_url("ftp://shop.example.com/p/1").is_err());
        assert!(parse_http_url("not a url").is_err());
    }

    #[test]
    fn test_extract_domain() {
        let domain = extract_domain("https://shop.example.com/item/123");
        assert_eq!(domain.unwrap(), "shop.example.com");
    }
}
