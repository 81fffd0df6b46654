//! Tag classification tables.

use cn_dom::DEFAULT_TAG_SIZE;

/// Tag kinds that receive direct text-measurement treatment.
const TEXT_TAGS: &[&str] = &[
    "a",
    "b",
    "blockquote",
    "button",
    "code",
    "em",
    "figcaption",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "i",
    "label",
    "legend",
    "li",
    "p",
    "pre",
    "s",
    "span",
    "strong",
    "summary",
    "td",
    "th",
    "u",
];

/// Tag kinds rendered as editable text boxes rather than flowed text.
const TEXTBOX_TAGS: &[&str] = &["input", "textarea"];

const TAG_SIZES: &[(&str, u32)] = &[
    ("h1", 32),
    ("h2", 24),
    ("h3", 19),
    ("h4", 16),
    ("h5", 13),
    ("h6", 11),
    ("small", 13),
    ("sub", 13),
    ("sup", 13),
];

/// Externally supplied tag classification set.
///
/// The defaults mirror the engine's built-in tables; embedders can swap the
/// sets wholesale to change which tags are treated as text-bearing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPolicy {
    text_tags: Vec<String>,
    textbox_tags: Vec<String>,
    tag_sizes: Vec<(String, u32)>,
}

impl Default for TagPolicy {
    fn default() -> Self {
        Self {
            text_tags: TEXT_TAGS.iter().map(|tag| (*tag).to_owned()).collect(),
            textbox_tags: TEXTBOX_TAGS.iter().map(|tag| (*tag).to_owned()).collect(),
            tag_sizes: TAG_SIZES
                .iter()
                .map(|(tag, size)| ((*tag).to_owned(), *size))
                .collect(),
        }
    }
}

impl TagPolicy {
    pub fn new(
        text_tags: Vec<String>,
        textbox_tags: Vec<String>,
        tag_sizes: Vec<(String, u32)>,
    ) -> Self {
        Self {
            text_tags,
            textbox_tags,
            tag_sizes,
        }
    }

    pub fn is_text_tag(&self, name: &str) -> bool {
        self.text_tags.iter().any(|tag| tag == name)
    }

    pub fn is_textbox_tag(&self, name: &str) -> bool {
        self.textbox_tags.iter().any(|tag| tag == name)
    }

    /// Default font-size category for a tag, 16 when the table has no entry.
    pub fn font_size_for(&self, name: &str) -> u32 {
        self.tag_sizes
            .iter()
            .find(|(tag, _)| tag == name)
            .map(|(_, size)| *size)
            .unwrap_or(DEFAULT_TAG_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::TagPolicy;

    #[test]
    fn headings_have_scaled_sizes() {
        let policy = TagPolicy::default();
        assert_eq!(policy.font_size_for("h1"), 32);
        assert_eq!(policy.font_size_for("h6"), 11);
        assert_eq!(policy.font_size_for("p"), 16);
        assert_eq!(policy.font_size_for("made-up"), 16);
    }

    #[test]
    fn classification_sets_are_disjoint_by_default() {
        let policy = TagPolicy::default();
        assert!(policy.is_text_tag("p"));
        assert!(!policy.is_text_tag("div"));
        assert!(policy.is_textbox_tag("textarea"));
        assert!(!policy.is_text_tag("textarea"));
    }
}
