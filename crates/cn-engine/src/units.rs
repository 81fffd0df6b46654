//! Attribute unit resolution.

/// Resolves a raw attribute value into a pixel integer.
///
/// Percentages resolve against `max`; absolute values pass through without an
/// upper clamp. Empty or unparseable input falls back to `default`, and the
/// result never drops below `min`.
pub fn remove_units(raw: &str, default: i32, min: i32, max: i32) -> i32 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return default.max(min);
    }

    let resolved = if let Some(percent) = trimmed.strip_suffix('%') {
        match percent.trim().parse::<f64>() {
            Ok(ratio) => ((f64::from(max) * ratio) / 100.0) as i32,
            Err(_) => default,
        }
    } else {
        parse_leading_number(trimmed).unwrap_or(default)
    };

    resolved.max(min)
}

/// Parses the leading numeric run, tolerating a trailing unit such as `px`.
fn parse_leading_number(input: &str) -> Option<i32> {
    let mut end = 0_usize;
    for (idx, ch) in input.char_indices() {
        let numeric = ch.is_ascii_digit() || ch == '.' || (idx == 0 && ch == '-');
        if !numeric {
            break;
        }
        end = idx + ch.len_utf8();
    }

    if end == 0 {
        return None;
    }

    input[..end].parse::<f64>().ok().map(|value| value as i32)
}
