//! Escape codec for template sources.
//!
//! | Escape | Encoded as |
//! |--------|------------|
//! | `\\`   | `U+0000`   |
//! | `\{`   | `U+0001`   |
//! | `\}`   | `U+0002`   |
//!
//! After encoding, every `{` and `}` left in the text is a real delimiter, so
//! the splitter can cut on them without looking back for backslashes.

const BACKSLASH: char = '\u{0}';
const OPEN: char = '\u{1}';
const CLOSE: char = '\u{2}';

/// Returns `true` if `source` contains one of the sentinel code points.
pub fn contains_reserved(source: &str) -> bool {
    source.contains([BACKSLASH, OPEN, CLOSE])
}

/// Replace escape sequences with their sentinels.
///
/// A backslash not followed by `\`, `{` or `}` is kept as is.
pub fn encode(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let sentinel = match chars.peek() {
            Some('\\') => BACKSLASH,
            Some('{') => OPEN,
            Some('}') => CLOSE,
            _ => {
                out.push('\\');
                continue;
            }
        };
        chars.next();
        out.push(sentinel);
    }
    out
}

/// Turn sentinels back into the characters they escaped.
pub fn decode(encoded: &str) -> String {
    encoded
        .chars()
        .map(|ch| match ch {
            BACKSLASH => '\\',
            OPEN => '{',
            CLOSE => '}',
            other => other,
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
