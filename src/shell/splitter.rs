//! Split raw command text on shell operators without lexing words.
//!
//! Used when a command line cannot be segmented properly (for example an
//! unterminated quote). The pieces keep their original text so they can be
//! scanned with the text heuristics.

/// Split `input` on `&&`, `||`, `|&`, `|`, `&`, `;` and newlines.
///
/// Respects single quotes, double quotes and backslash escapes. An `&` that
/// belongs to a redirection (`2>&1`, `&>file`) does not split. Pieces are
/// trimmed and empty pieces are dropped.
pub fn split_raw(input: &str) -> Vec<&str> {
    let bytes = input.as_bytes();
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut in_single = false;
    let mut in_double = false;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c == b'\\' && !in_single {
            i += 2;
            continue;
        }
        if c == b'\'' && !in_double {
            in_single = !in_single;
        } else if c == b'"' && !in_single {
            in_double = !in_double;
        } else if !in_single && !in_double {
            let next = bytes.get(i + 1).copied();
            let width = match c {
                b'&' if next == Some(b'&') => 2,
                b'|' if matches!(next, Some(b'|' | b'&')) => 2,
                b'|' | b';' | b'\n' => 1,
                b'&' => {
                    let prev = i.checked_sub(1).map(|p| bytes[p]);
                    if matches!(prev, Some(b'>' | b'<')) || next == Some(b'>') {
                        0
                    } else {
                        1
                    }
                }
                _ => 0,
            };
            if width > 0 {
                push_trimmed(&mut pieces, &input[start..i]);
                i += width;
                start = i;
                continue;
            }
        }
        i += 1;
    }
    push_trimmed(&mut pieces, &input[start..]);
    pieces
}

fn push_trimmed<'a>(pieces: &mut Vec<&'a str>, piece: &'a str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        pieces.push(piece);
    }
}
