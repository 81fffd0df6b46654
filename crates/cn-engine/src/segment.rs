//! Text-run segmentation.
//!
//! Rewrites serialized markup so every bare text run sitting between two tags
//! is wrapped in a synthetic `<browser_text>` element, letting the builder
//! give implicit text the same style and measurement treatment as real
//! elements. Two passes: a span tokenizer over the original bytes, then an
//! emit pass that inserts the wrappers, so no offset arithmetic survives a
//! mutation.

use cn_dom::TEXT_WRAP_TAG;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpanKind {
    Tag,
    Text,
}

/// Half-open byte range of one markup span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MarkupSpan {
    kind: SpanKind,
    start: usize,
    end: usize,
}

/// Idempotence guard: true once markup carries a `browser_text` wrapper.
pub fn already_segmented(markup: &str) -> bool {
    markup.contains("<browser_text")
}

/// Wraps every bare text run between two tags in `<browser_text>…</browser_text>`.
///
/// Text before the first tag or after the last tag is left untouched.
/// Returns `None` when nothing needed wrapping.
pub fn wrap_bare_text_runs(markup: &str) -> Option<String> {
    let spans = scan_spans(markup);

    let first_tag = spans.iter().position(|span| span.kind == SpanKind::Tag)?;
    let last_tag = spans.iter().rposition(|span| span.kind == SpanKind::Tag)?;
    if first_tag == last_tag {
        return None;
    }

    let mut out = String::with_capacity(markup.len() + 64);
    let mut wrapped_any = false;

    for (idx, span) in spans.iter().enumerate() {
        let piece = &markup[span.start..span.end];
        if span.kind == SpanKind::Text && idx > first_tag && idx < last_tag {
            out.push('<');
            out.push_str(TEXT_WRAP_TAG);
            out.push('>');
            out.push_str(piece);
            out.push_str("</");
            out.push_str(TEXT_WRAP_TAG);
            out.push('>');
            wrapped_any = true;
        } else {
            out.push_str(piece);
        }
    }

    wrapped_any.then_some(out)
}

/// Splits markup into alternating tag and text spans.
///
/// Quote-aware inside tags so a `>` in an attribute value does not end the
/// tag span early.
fn scan_spans(markup: &str) -> Vec<MarkupSpan> {
    let bytes = markup.as_bytes();
    let mut spans = Vec::new();
    let mut idx = 0_usize;

    while idx < bytes.len() {
        if bytes[idx] == b'<' {
            let end = tag_span_end(bytes, idx);
            spans.push(MarkupSpan {
                kind: SpanKind::Tag,
                start: idx,
                end,
            });
            idx = end;
            continue;
        }

        let start = idx;
        while idx < bytes.len() && bytes[idx] != b'<' {
            idx += 1;
        }
        spans.push(MarkupSpan {
            kind: SpanKind::Text,
            start,
            end: idx,
        });
    }

    spans
}

fn tag_span_end(bytes: &[u8], start: usize) -> usize {
    let mut idx = start + 1;
    let mut in_single = false;
    let mut in_double = false;

    while idx < bytes.len() {
        let byte = bytes[idx];
        if in_single {
            if byte == b'\'' {
                in_single = false;
            }
        } else if in_double {
            if byte == b'"' {
                in_double = false;
            }
        } else {
            match byte {
                b'\'' => in_single = true,
                b'"' => in_double = true,
                b'>' => return idx + 1,
                _ => {}
            }
        }
        idx += 1;
    }

    bytes.len()
}
