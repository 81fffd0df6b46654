//! Element tree data model produced by the engine.

use cn_core::Rect;
use std::collections::BTreeMap;

/// Synthetic tag name wrapped around bare text runs during segmentation.
pub const TEXT_WRAP_TAG: &str = "browser_text";

/// Value of a pass-through style property.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleValue {
    Number(f64),
    Text(String),
    Flag(bool),
}

impl StyleValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(_) | Self::Flag(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            Self::Number(_) | Self::Flag(_) => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(value) => Some(*value),
            Self::Number(_) | Self::Text(_) => None,
        }
    }
}

impl From<&str> for StyleValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<f64> for StyleValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for StyleValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

/// Resolved style set carried by every element.
///
/// Recognized properties are typed fields; anything else declared inline
/// passes through untouched in `extra`. Cloning is the deep copy that keeps
/// sibling and parent style sets from aliasing during the walk.
#[derive(Debug, Clone, PartialEq)]
pub struct Styles {
    /// Default font-size category of this element's tag.
    pub text_tag_size: u32,
    /// `text_tag_size` of the parent element.
    pub parent_tag_size: u32,
    pub italic: bool,
    pub bold: bool,
    pub underline: bool,
    /// First family name of a `font-family` declaration.
    pub font: Option<String>,
    /// Raw `font-size` value, e.g. `"24px"`.
    pub font_size: Option<String>,
    pub view_width: u32,
    pub view_height: u32,
    /// Unrecognized inline declarations, property name -> raw value.
    pub extra: BTreeMap<String, StyleValue>,
}

pub const DEFAULT_TAG_SIZE: u32 = 16;

impl Default for Styles {
    fn default() -> Self {
        Self {
            text_tag_size: DEFAULT_TAG_SIZE,
            parent_tag_size: DEFAULT_TAG_SIZE,
            italic: false,
            bold: false,
            underline: false,
            font: None,
            font_size: None,
            view_width: 0,
            view_height: 0,
            extra: BTreeMap::new(),
        }
    }
}

impl Styles {
    /// Applies one inline declaration, recognized fields first.
    pub fn apply_declaration(&mut self, name: &str, value: &str) {
        match name {
            "font-family" => {
                let family = value.split(',').next().unwrap_or(value).trim();
                if !family.is_empty() {
                    self.font = Some(family.to_owned());
                }
            }
            "font-size" => self.font_size = Some(value.to_owned()),
            _ => {
                self.extra
                    .insert(name.to_owned(), StyleValue::Text(value.to_owned()));
            }
        }
    }
}

/// Styled, provisionally positioned node of the output tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    /// Tag attributes plus the engine-stamped `tag`/`text`/`html` trio.
    pub attributes: BTreeMap<String, String>,
    pub styles: Styles,
    /// Used-space rect; a real measurement only when `measured` is true.
    pub rect: Rect,
    /// Leftover allocated rect from the text-layout call; zero otherwise.
    pub unused_rect: Rect,
    /// Whether `rect`/`unused_rect` came from the measurement collaborator.
    pub measured: bool,
    /// Explicit pixel override from the `width` attribute, 0 = none.
    pub width: i32,
    /// Explicit pixel override from the `height` attribute, 0 = none.
    pub height: i32,
    pub children: Vec<Element>,
}

impl Element {
    /// Root element: defaults everywhere, styles seeded by the assembler.
    pub fn root(tag: impl Into<String>, attributes: BTreeMap<String, String>) -> Self {
        Self {
            tag: tag.into(),
            attributes,
            styles: Styles::default(),
            rect: Rect::zero(),
            unused_rect: Rect::zero(),
            measured: false,
            width: 0,
            height: 0,
            children: Vec::new(),
        }
    }

    /// Text element carrying the two rects reported by measurement.
    pub fn text(
        tag: impl Into<String>,
        attributes: BTreeMap<String, String>,
        rect: Rect,
        unused_rect: Rect,
        styles: Styles,
        width: i32,
        height: i32,
    ) -> Self {
        Self {
            tag: tag.into(),
            attributes,
            styles,
            rect,
            unused_rect,
            measured: true,
            width,
            height,
            children: Vec::new(),
        }
    }

    /// Non-text element with a full-viewport placeholder rect.
    pub fn placeholder(
        tag: impl Into<String>,
        attributes: BTreeMap<String, String>,
        viewport: Rect,
        styles: Styles,
        width: i32,
        height: i32,
    ) -> Self {
        Self {
            tag: tag.into(),
            attributes,
            styles,
            rect: viewport,
            unused_rect: Rect::zero(),
            measured: false,
            width,
            height,
            children: Vec::new(),
        }
    }

    pub fn is_text(&self) -> bool {
        self.tag == TEXT_WRAP_TAG
    }

    /// Stamped concatenated descendant text, if present.
    pub fn text_content(&self) -> &str {
        self.attributes.get("text").map(String::as_str).unwrap_or("")
    }

    /// Number of nodes in this subtree, the element itself included.
    pub fn node_count(&self) -> usize {
        1_usize.saturating_add(self.children.iter().map(Self::node_count).sum::<usize>())
    }
}

/// Holds the root of one parsed element tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub html_element: Element,
}

impl Document {
    pub fn new(html_element: Element) -> Self {
        Self { html_element }
    }
}

#[cfg(test)]
mod tests {
    use super::Element;
    use super::StyleValue;
    use super::Styles;
    use std::collections::BTreeMap;

    #[test]
    fn cloned_styles_do_not_alias() {
        let mut parent = Styles::default();
        parent
            .extra
            .insert("color".to_owned(), StyleValue::Text("red".to_owned()));

        let mut child = parent.clone();
        child
            .extra
            .insert("color".to_owned(), StyleValue::Text("blue".to_owned()));

        assert_eq!(
            parent.extra.get("color").and_then(StyleValue::as_text),
            Some("red")
        );
    }

    #[test]
    fn font_family_keeps_first_family_only() {
        let mut styles = Styles::default();
        styles.apply_declaration("font-family", "Fira Sans, Arial, sans-serif");
        assert_eq!(styles.font.as_deref(), Some("Fira Sans"));
    }

    #[test]
    fn unrecognized_declarations_pass_through() {
        let mut styles = Styles::default();
        styles.apply_declaration("letter-spacing", "2px");
        assert_eq!(
            styles
                .extra
                .get("letter-spacing")
                .and_then(StyleValue::as_text),
            Some("2px")
        );
    }

    #[test]
    fn node_count_covers_whole_subtree() {
        let mut root = Element::root("html", BTreeMap::new());
        let mut body = Element::root("body", BTreeMap::new());
        body.children.push(Element::root("p", BTreeMap::new()));
        root.children.push(body);
        assert_eq!(root.node_count(), 3);
    }
}
