use std::borrow::Cow;

/// Truncates a string to at most `max_chars` Unicode scalar values.
///
/// Counting is by `char`, not by byte, so multi-byte text (accented
/// Portuguese, emoji) is never split mid-codepoint.
///
/// # Returns
///
/// - `Cow::Borrowed(s)` when the string already fits (no allocation)
/// - `Cow::Borrowed` prefix slice when truncation is needed
///
/// # Examples
///
/// ```
/// use imob_feed::util::truncate_chars;
///
/// assert_eq!(truncate_chars("Casa ampla", 4), "Casa");
/// assert_eq!(truncate_chars("Sacada", 10), "Sacada");
/// assert_eq!(truncate_chars("Área útil", 4), "Área");
/// ```
pub fn truncate_chars(s: &str, max_chars: usize) -> Cow<'_, str> {
    // Fast path: byte length bounds char count from above
    if s.len() <= max_chars {
        return Cow::Borrowed(s);
    }

    match s.char_indices().nth(max_chars) {
        Some((cut, _)) => Cow::Borrowed(&s[..cut]),
        None => Cow::Borrowed(s),
    }
}

/// Returns true for characters XML 1.0 does not allow in a document.
///
/// Tab, newline and carriage return are the only C0 controls permitted.
/// The non-characters U+FFFE and U+FFFF are also excluded.
fn is_xml_forbidden(c: char) -> bool {
    (c < '\u{20}' && c != '\t' && c != '\n' && c != '\r') || c == '\u{FFFE}' || c == '\u{FFFF}'
}

/// Strips characters that would make the generated feed ill-formed.
///
/// Upstream listings are free text typed into a CRM; stray control
/// characters occasionally survive into the export. They are dropped rather
/// than escaped because XML 1.0 has no legal representation for them.
///
/// Preserves: tab (0x09), newline (0x0A), carriage return (0x0D).
///
/// Returns `Cow::Borrowed` when the input contains nothing to strip (common case).
pub fn strip_xml_invalid_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_xml_forbidden) {
        return Cow::Borrowed(s);
    }

    Cow::Owned(s.chars().filter(|&c| !is_xml_forbidden(c)).collect())
}
