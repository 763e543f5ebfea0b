//! Escaping and validation primitives shared by every renderer.
//!
//! Nothing untrusted reaches generated HTML without passing through
//! [`escape_text`], [`sanitize_url`] or [`validate_language`].

use std::borrow::Cow;

use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;

static LANGUAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,50}$").expect("language regex"));

static SCHEME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z][a-z0-9+.\-]*):").expect("scheme regex"));

const ALLOWED_SCHEMES: &[&str] = &["http", "https", "mailto"];
const BLOCKED_SCHEMES: &[&str] = &["javascript", "data", "vbscript", "file", "about"];

/// Fallback language class for rejected code-fence tags.
pub const PLAIN_LANGUAGE: &str = "plaintext";

/// Escape `& < > " '` for text and attribute contexts.
///
/// Single pass, so `&` is handled before anything it could be confused with
/// and already-escaped input is escaped again rather than passed through.
pub fn escape_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + input.len() / 8);
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Attribute values use the same escaping as text.
pub fn escape_attr(input: &str) -> String {
    escape_text(input)
}

/// Return `url` unchanged when safe to emit as `href`/`src`, otherwise `""`.
///
/// The scheme is checked on a percent-decoded copy with whitespace and
/// control characters removed, so `java%09script:` and `JaVaScRiPt:` are
/// caught. Scheme-less (relative) URLs are allowed.
pub fn sanitize_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let mut decoded = trimmed.to_string();
    // Nested encodings (`%256A`) are unwrapped a few levels deep.
    for _ in 0..3 {
        let next = percent_decode_str(&decoded).decode_utf8_lossy().into_owned();
        if next == decoded {
            break;
        }
        decoded = next;
    }

    let compact: String = decoded
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();

    if BLOCKED_SCHEMES
        .iter()
        .any(|scheme| compact.starts_with(&format!("{scheme}:")))
    {
        return String::new();
    }

    match SCHEME_RE.captures(&compact) {
        Some(caps) => {
            let scheme = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            if ALLOWED_SCHEMES.contains(&scheme) {
                trimmed.to_string()
            } else {
                String::new()
            }
        }
        None => trimmed.to_string(),
    }
}

/// Restrict a code-fence language to `[A-Za-z0-9_-]{1,50}`.
pub fn validate_language(tag: &str) -> &str {
    let tag = tag.trim();
    if LANGUAGE_RE.is_match(tag) {
        tag
    } else {
        PLAIN_LANGUAGE
    }
}

/// Reduce an artifact filename to a single safe path component.
pub fn sanitize_filename(name: &str) -> String {
    let last = name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();
    let cleaned: String = last
        .chars()
        .filter(|c| !c.is_control() && !matches!(*c, '<' | '>' | ':' | '"' | '|' | '?' | '*'))
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').trim();
    cleaned.chars().take(200).collect()
}

/// Remove characters the inline renderer reserves for placeholders.
pub(crate) fn strip_reserved(input: &str) -> Cow<'_, str> {
    const RESERVED: &[char] = &['\u{E000}', '\u{E001}'];
    if input.contains(RESERVED) {
        Cow::Owned(input.replace(RESERVED, ""))
    } else {
        Cow::Borrowed(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_all_five() {
        assert_eq!(
            escape_text(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_escape_does_not_pass_entities_through() {
        assert_eq!(escape_text("&lt;"), "&amp;lt;");
    }

    #[test]
    fn test_sanitize_url_examples() {
        assert_eq!(sanitize_url("javascript:alert(1)"), "");
        assert_eq!(sanitize_url("https://x.y/z"), "https://x.y/z");
        assert_eq!(sanitize_url("mailto:me@example.com"), "mailto:me@example.com");
    }

    #[test]
    fn test_sanitize_url_blocks_obfuscated_schemes() {
        for url in [
            "JaVaScRiPt:alert(1)",
            " javascript:alert(1)",
            "java\tscript:alert(1)",
            "javascript%3Aalert(1)",
            "%6Aavascript:alert(1)",
            "%256Aavascript:alert(1)",
            "data:text/html;base64,PHNjcmlwdD4=",
            "vbscript:msgbox",
            "file:///etc/passwd",
            "about:blank",
            "ftp://example.com",
        ] {
            assert_eq!(sanitize_url(url), "", "expected {url:?} to be rejected");
        }
    }

    #[test]
    fn test_sanitize_url_allows_relative() {
        assert_eq!(sanitize_url("artifacts/a.png"), "artifacts/a.png");
        assert_eq!(sanitize_url("#section"), "#section");
        assert_eq!(sanitize_url("/docs/page:1"), "/docs/page:1");
        assert_eq!(sanitize_url(""), "");
    }

    #[test]
    fn test_validate_language() {
        assert_eq!(validate_language("rust"), "rust");
        assert_eq!(validate_language("objective-c"), "objective-c");
        assert_eq!(validate_language("c++"), PLAIN_LANGUAGE);
        assert_eq!(validate_language("x\" onmouseover=\"y"), PLAIN_LANGUAGE);
        assert_eq!(validate_language(&"a".repeat(51)), PLAIN_LANGUAGE);
        assert_eq!(validate_language(""), PLAIN_LANGUAGE);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\tmp\\report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename(".hidden"), "hidden");
        assert_eq!(sanitize_filename("a<b>.txt"), "ab.txt");
    }
}
