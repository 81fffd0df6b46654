//! Recursive element tree construction.
//!
//! `DomEngine::parse` turns raw HTML into a styled [`Document`]: the markup
//! collaborator produces a tag-node tree, the walk stamps derived attributes,
//! inherits and overrides styles, segments bare text runs, and measures text
//! nodes through the [`TextMeasure`] seam. The walk polls a [`CancelToken`]
//! between siblings so a superseded navigation stops promptly.

use crate::caption::CaptionSink;
use crate::caption::NullCaption;
use crate::measure::LineCursorMeasure;
use crate::measure::TextMeasure;
use crate::segment::already_segmented;
use crate::segment::wrap_bare_text_runs;
use crate::tags::TagPolicy;
use crate::units::remove_units;
use cn_core::BrowserError;
use cn_core::BrowserResult;
use cn_core::CancelToken;
use cn_core::Rect;
use cn_dom::Document;
use cn_dom::Element;
use cn_dom::Styles;
use cn_dom::TEXT_WRAP_TAG;
use cn_html::FRAGMENT_ROOT;
use cn_html::MarkupNode;
use cn_html::TagNode;
use cn_html::parse_fragment;
use std::collections::BTreeMap;

/// Engine-level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Composite translucent overlays over measured text rects.
    pub show_measured_overlays: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            viewport_width: 1280,
            viewport_height: 720,
            show_measured_overlays: false,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> BrowserResult<()> {
        if self.viewport_width == 0 || self.viewport_height == 0 {
            return Err(BrowserError::new(
                "engine.viewport_invalid",
                format!(
                    "viewport must be non-zero, got {}x{}",
                    self.viewport_width, self.viewport_height
                ),
            ));
        }

        Ok(())
    }
}

/// Result of one parse: a finished document, or no result at all.
///
/// Cancellation is not an error; callers must treat a cancelled parse as
/// "discard and move on".
#[derive(Debug, PartialEq)]
pub enum ParseOutcome {
    Finished(Document),
    Cancelled,
}

impl ParseOutcome {
    pub fn into_document(self) -> Option<Document> {
        match self {
            Self::Finished(document) => Some(document),
            Self::Cancelled => None,
        }
    }
}

/// HTML-to-element-tree engine.
pub struct DomEngine {
    config: EngineConfig,
    policy: TagPolicy,
    measure: Box<dyn TextMeasure>,
    caption: Box<dyn CaptionSink>,
}

impl DomEngine {
    pub fn new(
        config: EngineConfig,
        policy: TagPolicy,
        measure: Box<dyn TextMeasure>,
        caption: Box<dyn CaptionSink>,
    ) -> BrowserResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            policy,
            measure,
            caption,
        })
    }

    /// Engine with the built-in tag tables, glyph-grid measurement, and no
    /// caption output.
    pub fn with_defaults(config: EngineConfig) -> BrowserResult<Self> {
        let measure = LineCursorMeasure::new(config.viewport_width);
        Self::new(
            config,
            TagPolicy::default(),
            Box::new(measure),
            Box::new(NullCaption),
        )
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Parses a document and builds its element tree.
    ///
    /// Returns `parse.no_root_element` when the input yields no element at
    /// all, and [`ParseOutcome::Cancelled`] when the token fired at any point
    /// during the walk.
    pub fn parse(&mut self, html: &str, cancel: &CancelToken) -> BrowserResult<ParseOutcome> {
        let fragment = parse_fragment(html);
        let Some(first) = fragment.first_element() else {
            return Err(BrowserError::new(
                "parse.no_root_element",
                "document has no root element",
            ));
        };

        // Build from a staging wrapper holding only the first top-level
        // element, so it goes through the same child treatment (segmentation
        // included) as everything below it. Trailing top-level siblings are
        // discarded and never walked.
        let staging_tag = TagNode {
            name: FRAGMENT_ROOT.to_owned(),
            attrs: BTreeMap::new(),
            children: vec![MarkupNode::Tag(first.clone())],
        };

        let mut staging = Element::root(FRAGMENT_ROOT, BTreeMap::new());
        staging.rect = Rect::viewport(self.config.viewport_width, self.config.viewport_height);
        staging.styles.view_width = self.config.viewport_width;
        staging.styles.view_height = self.config.viewport_height;

        self.build_children(&staging_tag, &mut staging, cancel);
        if cancel.is_cancelled() {
            return Ok(ParseOutcome::Cancelled);
        }

        let Some(root) = staging.children.into_iter().next() else {
            return Err(BrowserError::new(
                "parse.no_root_element",
                "document has no root element",
            ));
        };

        Ok(ParseOutcome::Finished(Document::new(root)))
    }

    fn build_children(&mut self, tag: &TagNode, parent: &mut Element, cancel: &CancelToken) {
        for node in &tag.children {
            if cancel.is_cancelled() {
                return;
            }

            // Bare text at this level is already absorbed into the parent's
            // stamped text/html attributes; only tag nodes become elements.
            let MarkupNode::Tag(child_tag) = node else {
                continue;
            };

            let mut child = child_tag.clone();
            let mut attributes = derived_attributes(&child);

            if child.name == "title" {
                let title = attributes.get("text").map(String::as_str).unwrap_or("");
                self.caption.set_caption(title);
            }

            // Inherit parent styles by deep copy, then size categories.
            let mut styles = parent.styles.clone();
            styles.text_tag_size = self.policy.font_size_for(&child.name);
            styles.parent_tag_size = parent.styles.text_tag_size;

            match child.name.as_str() {
                "i" => styles.italic = true,
                "b" | "strong" => styles.bold = true,
                "u" => styles.underline = true,
                "br" => self.feed_line(&styles, parent),
                _ => {}
            }

            let width = remove_units(
                attributes.get("width").map(String::as_str).unwrap_or(""),
                0,
                0,
                self.config.viewport_width as i32,
            );
            let height = remove_units(
                attributes.get("height").map(String::as_str).unwrap_or(""),
                0,
                0,
                self.config.viewport_height as i32,
            );

            // Segmentation: wrap bare text runs so they can be measured like
            // real elements. A rewrite replaces the node's structural
            // identity, so the attribute trio is stamped again.
            let markup = attributes.get("html").cloned().unwrap_or_default();
            let has_text = attributes
                .get("text")
                .map(|text| !text.is_empty())
                .unwrap_or(false);
            if self.policy.is_text_tag(&child.name) && has_text {
                if already_segmented(&markup) {
                    // Re-entrant visit of an already-wrapped tag: pin its
                    // font size to the tag default instead of inheriting.
                    styles.font_size =
                        Some(format!("{}px", self.policy.font_size_for(&child.name)));
                } else {
                    if let Some(rewritten) = wrap_bare_text_runs(&markup) {
                        let reparsed = parse_fragment(&rewritten);
                        if let Some(first) = reparsed.first_element() {
                            child = first.clone();
                            attributes = derived_attributes(&child);
                        }
                    }
                    // Text-bearing block: feed one line so following content
                    // starts below it.
                    self.feed_line(&styles, parent);
                }
            }

            // Inline declarations override inherited values.
            if let Some(style_attr) = attributes.get("style").cloned() {
                for declaration in cn_css::parse_inline_style(&child.name, &style_attr) {
                    styles.apply_declaration(&declaration.name, &declaration.value);
                }
            }

            let element = if child.name == TEXT_WRAP_TAG {
                let text = attributes.get("text").cloned().unwrap_or_default();
                let (used, unused) = self.measure.measure(&text, &styles);
                if self.config.show_measured_overlays {
                    self.measure.highlight(&used, &unused);
                }
                Element::text(
                    child.name.clone(),
                    attributes,
                    used,
                    unused,
                    styles,
                    width,
                    height,
                )
            } else {
                Element::placeholder(
                    child.name.clone(),
                    attributes,
                    Rect::viewport(self.config.viewport_width, self.config.viewport_height),
                    styles,
                    width,
                    height,
                )
            };

            parent.children.push(element);
            if let Some(appended) = parent.children.last_mut() {
                self.build_children(&child, appended, cancel);
            }
        }
    }

    /// One synthetic line-break measurement; only a parent with a real
    /// measured rect takes the height bump, but the measurement cursor always
    /// advances.
    fn feed_line(&mut self, styles: &Styles, parent: &mut Element) {
        let (line, _) = self.measure.measure("\n", styles);
        if parent.measured {
            parent.rect.height = parent.rect.height.saturating_add(line.height);
        }
    }
}

fn derived_attributes(node: &TagNode) -> BTreeMap<String, String> {
    let mut attrs = node.attrs.clone();
    attrs.insert("tag".to_owned(), node.name.clone());
    attrs.insert("text".to_owned(), node.text().replace('\n', ""));
    attrs.insert("html".to_owned(), node.to_html().replace('\n', ""));
    attrs
}

#[cfg(test)]
mod tests {
    use super::DomEngine;
    use super::EngineConfig;
    use super::ParseOutcome;
    use crate::caption::CaptionSink;
    use crate::caption::NullCaption;
    use crate::measure::LineCursorMeasure;
    use crate::measure::TextMeasure;
    use crate::tags::TagPolicy;
    use cn_core::CancelToken;
    use cn_core::Rect;
    use cn_dom::Document;
    use cn_dom::Element;
    use cn_dom::StyleValue;
    use cn_dom::Styles;
    use std::sync::Arc;
    use std::sync::Mutex;

    fn engine() -> DomEngine {
        DomEngine::with_defaults(EngineConfig::default()).unwrap_or_else(|_| unreachable!())
    }

    fn parse_ok(html: &str) -> Document {
        let mut engine = engine();
        let outcome = engine
            .parse(html, &CancelToken::new())
            .unwrap_or_else(|_| unreachable!());
        match outcome {
            ParseOutcome::Finished(document) => document,
            ParseOutcome::Cancelled => unreachable!(),
        }
    }

    #[test]
    fn hello_world_builds_the_expected_shape() {
        let document = parse_ok("<p>Hello <b>world</b></p>");
        let p = &document.html_element;
        assert_eq!(p.tag, "p");
        assert_eq!(p.children.len(), 2);

        let hello = &p.children[0];
        assert_eq!(hello.tag, "browser_text");
        assert_eq!(hello.text_content(), "Hello ");
        assert!(hello.measured);

        let b = &p.children[1];
        assert_eq!(b.tag, "b");
        assert!(b.styles.bold);
        assert!(!b.measured);
        assert_eq!(b.children.len(), 1);

        let world = &b.children[0];
        assert_eq!(world.tag, "browser_text");
        assert_eq!(world.text_content(), "world");
        assert!(world.styles.bold);
    }

    #[test]
    fn every_bare_run_becomes_exactly_one_text_element() {
        let document = parse_ok("<div><p>one <i>two</i> three</p></div>");
        let mut texts = Vec::new();
        collect_text_elements(&document.html_element, &mut texts);
        assert_eq!(texts, vec!["one ", "two", " three"]);
    }

    fn collect_text_elements(element: &Element, out: &mut Vec<String>) {
        if element.is_text() {
            out.push(element.text_content().to_owned());
        }
        for child in &element.children {
            collect_text_elements(child, out);
        }
    }

    #[test]
    fn inline_styles_override_inherited_ones() {
        let document =
            parse_ok("<div style=\"color: red\"><p>a</p><p style=\"color: blue\">b</p></div>");
        let div = &document.html_element;
        let inherited = &div.children[0];
        let overridden = &div.children[1];

        let color = |element: &Element| {
            element
                .styles
                .extra
                .get("color")
                .and_then(StyleValue::as_text)
                .map(str::to_owned)
        };

        assert_eq!(color(div).as_deref(), Some("red"));
        assert_eq!(color(inherited).as_deref(), Some("red"));
        assert_eq!(color(overridden).as_deref(), Some("blue"));
        // The bare run inside the overridden paragraph inherits the override.
        assert_eq!(color(&overridden.children[0]).as_deref(), Some("blue"));
    }

    #[test]
    fn size_categories_track_tag_and_parent() {
        let document = parse_ok("<div><h1>Big</h1></div>");
        let h1 = &document.html_element.children[0];
        assert_eq!(h1.styles.text_tag_size, 32);
        assert_eq!(h1.styles.parent_tag_size, 16);

        let run = &h1.children[0];
        assert_eq!(run.styles.text_tag_size, 16);
        assert_eq!(run.styles.parent_tag_size, 32);
    }

    #[test]
    fn nested_text_tags_get_pinned_font_size_on_revisit() {
        let document = parse_ok("<p>Hello <b>world</b></p>");
        let b = &document.html_element.children[1];
        // `b` is text-bearing and its markup was already wrapped by the
        // parent rewrite, so its font size is pinned to the tag default.
        assert_eq!(b.styles.font_size.as_deref(), Some("16px"));
    }

    #[test]
    fn view_dimensions_are_seeded_and_inherited() {
        let document = parse_ok("<html><body><p>x</p></body></html>");
        assert_eq!(document.html_element.styles.view_width, 1280);
        let body = &document.html_element.children[0];
        let p = &body.children[0];
        assert_eq!(p.styles.view_width, 1280);
        assert_eq!(p.styles.view_height, 720);
    }

    #[test]
    fn width_and_height_attributes_resolve_to_pixels() {
        let document = parse_ok("<div><img width=\"50%\" height=\"120\"></div>");
        let img = &document.html_element.children[0];
        assert_eq!(img.width, 640);
        assert_eq!(img.height, 120);
        assert!(!img.measured);
        assert_eq!(img.rect, Rect::viewport(1280, 720));
    }

    #[test]
    fn bare_text_under_non_text_tags_is_absorbed_not_visited() {
        let document = parse_ok("<section><div>loose</div></section>");
        let div = &document.html_element.children[0];
        assert!(div.children.is_empty());
        assert_eq!(div.text_content(), "loose");
    }

    #[test]
    fn newlines_are_stripped_from_stamped_attributes() {
        let document = parse_ok("<div><p>one\ntwo</p></div>");
        let p = &document.html_element.children[0];
        assert_eq!(p.text_content(), "onetwo");
        assert!(!p.attributes.get("html").map(String::as_str).unwrap_or("").contains('\n'));
    }

    #[test]
    fn br_feeds_following_text_to_a_new_line() {
        let document = parse_ok("<p>one<br>two</p>");
        let p = &document.html_element;
        let first = &p.children[0];
        let br = &p.children[1];
        let second = &p.children[2];

        assert_eq!(first.tag, "browser_text");
        assert_eq!(br.tag, "br");
        assert!(br.children.is_empty());
        assert_eq!(second.tag, "browser_text");
        assert!(second.rect.y > first.rect.y);
    }

    #[test]
    fn missing_root_element_is_an_explicit_error() {
        let mut engine = engine();
        for input in ["", "   ", "no tags at all", "<!-- only a comment -->"] {
            let result = engine.parse(input, &CancelToken::new());
            let Err(error) = result else {
                unreachable!();
            };
            assert_eq!(error.code, "parse.no_root_element");
        }
    }

    #[test]
    fn malformed_inline_css_does_not_abort_the_walk() {
        let document = parse_ok("<div style=\"}{:::garbage\"><p>still here</p></div>");
        assert_eq!(document.html_element.children.len(), 1);
    }

    #[derive(Debug, Clone, Default)]
    struct SharedCaption(Arc<Mutex<String>>);

    impl CaptionSink for SharedCaption {
        fn set_caption(&mut self, title: &str) {
            if let Ok(mut slot) = self.0.lock() {
                *slot = title.to_owned();
            }
        }
    }

    #[test]
    fn title_text_reaches_the_caption_sink() {
        let caption = SharedCaption::default();
        let seen = caption.0.clone();
        let mut engine = DomEngine::new(
            EngineConfig::default(),
            TagPolicy::default(),
            Box::new(LineCursorMeasure::new(1280)),
            Box::new(caption),
        )
        .unwrap_or_else(|_| unreachable!());

        let outcome = engine.parse(
            "<html><head><title>My Page</title></head><body>x</body></html>",
            &CancelToken::new(),
        );
        assert!(outcome.is_ok());
        assert_eq!(
            seen.lock().unwrap_or_else(|_| unreachable!()).as_str(),
            "My Page"
        );
    }

    #[test]
    fn trailing_top_level_siblings_are_discarded_without_side_effects() {
        let caption = SharedCaption::default();
        let seen = caption.0.clone();
        let mut engine = DomEngine::new(
            EngineConfig::default(),
            TagPolicy::default(),
            Box::new(LineCursorMeasure::new(1280)),
            Box::new(caption),
        )
        .unwrap_or_else(|_| unreachable!());

        let outcome = engine
            .parse("<p>Hello</p><title>Ghost</title>", &CancelToken::new())
            .unwrap_or_else(|_| unreachable!());
        let Some(document) = outcome.into_document() else {
            unreachable!();
        };

        // Only the first element becomes the document root; the sibling
        // title never reaches the caption sink.
        assert_eq!(document.html_element.tag, "p");
        assert!(seen.lock().unwrap_or_else(|_| unreachable!()).is_empty());
    }

    #[test]
    fn cancel_before_parse_yields_no_result() {
        let mut engine = engine();
        let cancel = CancelToken::new();
        cancel.cancel();
        let outcome = engine
            .parse("<p>Hello</p>", &cancel)
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(outcome.into_document(), None);
    }

    struct CancelAfter {
        inner: LineCursorMeasure,
        calls_left: u32,
        calls_total: Arc<Mutex<u32>>,
        token: CancelToken,
    }

    impl TextMeasure for CancelAfter {
        fn measure(&mut self, text: &str, styles: &Styles) -> (Rect, Rect) {
            if let Ok(mut total) = self.calls_total.lock() {
                *total += 1;
            }
            self.calls_left = self.calls_left.saturating_sub(1);
            if self.calls_left == 0 {
                self.token.cancel();
            }
            self.inner.measure(text, styles)
        }
    }

    #[test]
    fn cancel_mid_walk_stops_before_the_next_sibling() {
        let cancel = CancelToken::new();
        let calls_total = Arc::new(Mutex::new(0_u32));
        let measure = CancelAfter {
            inner: LineCursorMeasure::new(1280),
            // Call 1 is the first paragraph's segmentation line feed, call 2
            // measures its text run and fires the token.
            calls_left: 2,
            calls_total: calls_total.clone(),
            token: cancel.clone(),
        };

        let mut engine = DomEngine::new(
            EngineConfig::default(),
            TagPolicy::default(),
            Box::new(measure),
            Box::new(NullCaption),
        )
        .unwrap_or_else(|_| unreachable!());

        let outcome = engine
            .parse("<div><p>a</p><p>b</p><p>c</p></div>", &cancel)
            .unwrap_or_else(|_| unreachable!());

        assert_eq!(outcome, ParseOutcome::Cancelled);
        // Later siblings were never visited, so nothing else was measured.
        assert_eq!(*calls_total.lock().unwrap_or_else(|_| unreachable!()), 2);
    }
}
