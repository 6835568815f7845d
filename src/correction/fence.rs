use std::sync::LazyLock;

use regex::Regex;

/// One fenced block spanning the whole (trimmed) text, with an optional
/// language tag after the opening fence.
static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A```[A-Za-z0-9_+.-]*[ \t]*\r?\n(.*?)\r?\n?```\z")
        .expect("fence pattern is valid")
});

/// Remove a markdown code fence wrapping model output.
///
/// Fenced input yields the block body ending in exactly one newline; text
/// that is not a single fenced block is returned unchanged. Nested fences are
/// peeled until none is left, so applying this twice gives the same result
/// as applying it once.
pub fn strip_code_fence(text: &str) -> String {
    let Some(mut current) = fenced_body(text) else {
        return text.to_string();
    };
    while let Some(inner) = fenced_body(&current) {
        current = inner;
    }
    current
}

fn fenced_body(text: &str) -> Option<String> {
    let captures = FENCED_BLOCK.captures(text.trim())?;
    let body = captures
        .get(1)
        .map_or("", |m| m.as_str())
        .trim_end_matches(['\r', '\n']);
    if body.is_empty() {
        Some(String::new())
    } else {
        Some(format!("{body}\n"))
    }
}
