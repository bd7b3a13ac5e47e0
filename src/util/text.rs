use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const ELLIPSIS: &str = "...";

/// Terminal columns occupied by `s`.
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Fit `s` into `max_width` columns, ending in "..." when cut.
///
/// Widths of 3 or less leave no room for the ellipsis, so the text is just
/// clipped.
///
/// ```
/// use wikiscroll::util::truncate_to_width;
///
/// assert_eq!(truncate_to_width("Short", 10), "Short");
/// assert_eq!(truncate_to_width("Hello World", 8), "Hello...");
/// assert_eq!(truncate_to_width("Test", 2), "Te");
/// ```
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if display_width(s) <= max_width {
        return Cow::Borrowed(s);
    }
    if max_width <= ELLIPSIS.len() {
        return Cow::Owned(clip(s, max_width).to_string());
    }
    Cow::Owned(format!("{}{}", clip(s, max_width - ELLIPSIS.len()), ELLIPSIS))
}

/// Longest prefix of `s` within `width` columns.
fn clip(s: &str, width: usize) -> &str {
    let mut used = 0;
    for (idx, c) in s.char_indices() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > width {
            return &s[..idx];
        }
        used += w;
    }
    s
}

/// First `chars` characters of `s`, with "..." appended when anything was
/// dropped.
pub fn excerpt(s: &str, chars: usize) -> Cow<'_, str> {
    match s.char_indices().nth(chars) {
        Some((idx, _)) => Cow::Owned(format!("{}{}", &s[..idx], ELLIPSIS)),
        None => Cow::Borrowed(s),
    }
}

/// Greedy word wrap into at most `max_lines` lines of `width` columns. The
/// last line ends in "..." when text was left over.
pub fn wrap_to_width(s: &str, width: usize, max_lines: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    if width == 0 || max_lines == 0 {
        return lines;
    }
    let mut current = String::new();
    let mut words = s.split_whitespace().peekable();
    while let Some(word) = words.peek() {
        let needed = if current.is_empty() {
            display_width(word)
        } else {
            display_width(&current) + 1 + display_width(word)
        };
        if needed <= width {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            words.next();
        } else if current.is_empty() {
            // A single word wider than the line.
            current.push_str(clip(word, width));
            words.next();
        } else {
            lines.push(std::mem::take(&mut current));
            if lines.len() == max_lines {
                break;
            }
        }
    }
    if !current.is_empty() && lines.len() < max_lines {
        lines.push(current);
    }
    if words.peek().is_some() {
        if let Some(last) = lines.last_mut() {
            let cut = format!("{}{}", clip(last, width.saturating_sub(ELLIPSIS.len())), ELLIPSIS);
            *last = cut;
        }
    }
    lines
}

/// Remove terminal control characters and ANSI escape sequences from
/// remote text before it is drawn. Tab and newline survive.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let dirty = s
        .bytes()
        .any(|b| b == 0x1b || b == 0x7f || (b < 0x20 && b != b'\t' && b != b'\n'));
    if !dirty {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\x1b' => match chars.peek() {
                // CSI: parameters up to a final byte in @..~
                Some('[') => {
                    chars.next();
                    for c in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&c) {
                            break;
                        }
                    }
                }
                // OSC: terminated by BEL or ESC \
                Some(']') => {
                    chars.next();
                    while let Some(c) = chars.next() {
                        if c == '\x07' {
                            break;
                        }
                        if c == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => {}
            },
            '\t' | '\n' => out.push(c),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}
