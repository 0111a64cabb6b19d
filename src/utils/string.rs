//! UTF-8 safe text previews for hook output.

/// Preview of `s` limited to `n` characters, with `...` appended when cut.
///
/// Counts chars, never bytes, so multibyte text cannot cause a panic.
pub fn preview(s: &str, n: usize) -> String {
    let mut chars = s.chars();
    let mut out: String = chars.by_ref().take(n).collect();
    if chars.next().is_some() {
        out.push_str("...");
    }
    out
}

/// Collapse all whitespace runs (including newlines) into single spaces.
pub fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
