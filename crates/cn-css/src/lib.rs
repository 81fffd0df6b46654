//! Inline CSS declaration parsing.
//!
//! The engine only ever resolves `style` attributes, so the surface here is a
//! single rule body: the attribute text is wrapped as `selector { … }` and
//! scanned into `(property, value)` pairs. Anything malformed is dropped,
//! never surfaced as an error, so a broken declaration can't abort a
//! document walk.

/// One parsed `property: value` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub value: String,
}

/// Parses a style-attribute string against its owning tag name.
///
/// Returns the declarations in source order; malformed pieces are skipped.
pub fn parse_inline_style(tag_name: &str, style_attr: &str) -> Vec<Declaration> {
    let rule = format!("{tag_name}{{{style_attr}}}");
    let sanitized = strip_comments(&rule);

    let Some(open) = find_top_level(&sanitized, 0, b'{') else {
        return Vec::new();
    };
    let Some(close) = find_matching_brace(&sanitized, open) else {
        return Vec::new();
    };

    parse_declarations(&sanitized[open + 1..close])
}

fn parse_declarations(body: &str) -> Vec<Declaration> {
    let mut out = Vec::new();

    for chunk in split_top_level(body, b';') {
        let trimmed = chunk.trim();
        if trimmed.is_empty() {
            continue;
        }

        let Some(colon) = find_top_level(trimmed, 0, b':') else {
            continue;
        };

        let name = normalize_ws(&trimmed[..colon]).to_ascii_lowercase();
        let value = normalize_value(trimmed[colon + 1..].trim());
        if name.is_empty() || value.is_empty() {
            continue;
        }

        out.push(Declaration { name, value });
    }

    out
}

/// Quote/escape/nesting state shared by every top-level scan.
#[derive(Debug, Default)]
struct ScanState {
    in_single: bool,
    in_double: bool,
    escape: bool,
    paren_depth: u32,
    bracket_depth: u32,
}

impl ScanState {
    /// Feeds one byte; returns true when the byte sits at top level.
    fn step(&mut self, byte: u8) -> bool {
        if self.in_single || self.in_double {
            if self.escape {
                self.escape = false;
            } else if byte == b'\\' {
                self.escape = true;
            } else if self.in_single && byte == b'\'' {
                self.in_single = false;
            } else if self.in_double && byte == b'"' {
                self.in_double = false;
            }
            return false;
        }

        match byte {
            b'\'' => self.in_single = true,
            b'"' => self.in_double = true,
            b'(' => self.paren_depth = self.paren_depth.saturating_add(1),
            b')' => self.paren_depth = self.paren_depth.saturating_sub(1),
            b'[' => self.bracket_depth = self.bracket_depth.saturating_add(1),
            b']' => self.bracket_depth = self.bracket_depth.saturating_sub(1),
            _ => {}
        }

        !self.in_single && !self.in_double && self.paren_depth == 0 && self.bracket_depth == 0
    }
}

fn find_top_level(input: &str, from: usize, needle: u8) -> Option<usize> {
    let bytes = input.as_bytes();
    let mut state = ScanState::default();

    for (offset, byte) in bytes.iter().enumerate().skip(from) {
        let top = state.step(*byte);
        if top && *byte == needle {
            return Some(offset);
        }
    }

    None
}

fn find_matching_brace(input: &str, open_brace: usize) -> Option<usize> {
    let bytes = input.as_bytes();
    if bytes.get(open_brace).copied() != Some(b'{') {
        return None;
    }

    let mut state = ScanState::default();
    let mut depth = 0_u32;

    for (offset, byte) in bytes.iter().enumerate().skip(open_brace) {
        if !state.step(*byte) {
            continue;
        }

        match byte {
            b'{' => depth = depth.saturating_add(1),
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(offset);
                }
            }
            _ => {}
        }
    }

    None
}

fn split_top_level(input: &str, delimiter: u8) -> Vec<&str> {
    let bytes = input.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0_usize;
    let mut state = ScanState::default();

    for (offset, byte) in bytes.iter().enumerate() {
        if state.step(*byte) && *byte == delimiter {
            parts.push(&input[start..offset]);
            start = offset + 1;
        }
    }

    parts.push(&input[start..]);
    parts
}

fn strip_comments(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut state = ScanState::default();
    let mut in_comment = false;
    let mut idx = 0_usize;

    while idx < bytes.len() {
        let byte = bytes[idx];
        let next = bytes.get(idx + 1).copied();

        if in_comment {
            if byte == b'*' && next == Some(b'/') {
                in_comment = false;
                idx += 2;
                continue;
            }
            idx += 1;
            continue;
        }

        let in_string = state.in_single || state.in_double;
        if !in_string && byte == b'/' && next == Some(b'*') {
            in_comment = true;
            idx += 2;
            continue;
        }

        state.step(byte);
        out.push(byte);
        idx += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn normalize_ws(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_value(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut state = ScanState::default();
    let mut last_was_space = false;

    for ch in input.chars() {
        let in_string = state.in_single || state.in_double;
        if ch.is_ascii() {
            state.step(ch as u8);
        }

        if !in_string && ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
            continue;
        }

        last_was_space = false;
        out.push(ch);
    }

    out.trim().to_owned()
}
