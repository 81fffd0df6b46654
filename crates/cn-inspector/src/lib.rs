//! Inspector tree view over published element trees.
//!
//! The view flattens an element tree into one row per node in document
//! order, with a fixed row height and per-depth indent. It owns scrolling,
//! hover/click hit testing, and the channel poll that keeps it on the newest
//! published tree. Drawing is left to the embedding UI.

use cn_core::BrowserError;
use cn_core::BrowserResult;
use cn_core::Rect;
use cn_dom::Element;
use cn_ipc::InspectorEndpoint;

const DEFAULT_ROW_HEIGHT: i32 = 20;
const DEFAULT_DEPTH_INDENT: i32 = 10;

/// Inspector panel configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InspectorConfig {
    pub view_width: i32,
    pub view_height: i32,
    pub row_height: i32,
    pub depth_indent: i32,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            view_width: 320,
            view_height: 720,
            row_height: DEFAULT_ROW_HEIGHT,
            depth_indent: DEFAULT_DEPTH_INDENT,
        }
    }
}

impl InspectorConfig {
    pub fn validate(&self) -> BrowserResult<()> {
        if self.view_width <= 0 || self.view_height <= 0 {
            return Err(BrowserError::new(
                "inspector.view_invalid",
                format!(
                    "inspector view must be positive, got {}x{}",
                    self.view_width, self.view_height
                ),
            ));
        }

        if self.row_height <= 0 || self.depth_indent < 0 {
            return Err(BrowserError::new(
                "inspector.metrics_invalid",
                "row_height must be positive and depth_indent non-negative",
            ));
        }

        Ok(())
    }
}

/// One flattened tree row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowEntry {
    pub tag: String,
    pub depth: usize,
    /// Row rect in canvas coordinates (unscrolled).
    pub rect: Rect,
    pub label: String,
    pub selected: bool,
}

/// Flattened, scrollable tree view.
#[derive(Debug, Clone, PartialEq)]
pub struct InspectorView {
    config: InspectorConfig,
    rows: Vec<RowEntry>,
    scroll: i32,
    canvas_height: i32,
}

impl InspectorView {
    pub fn new(config: InspectorConfig) -> BrowserResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            rows: Vec::new(),
            scroll: 0,
            canvas_height: config.view_height,
        })
    }

    pub fn config(&self) -> InspectorConfig {
        self.config
    }

    pub fn rows(&self) -> &[RowEntry] {
        &self.rows
    }

    /// Rebuilds the row list from a new tree.
    ///
    /// Depth-first, document order, one row per node; selection and scroll
    /// are reset because row indices no longer correspond.
    pub fn replace_tree(&mut self, tree: &Element) {
        self.rows.clear();
        self.scroll = 0;

        let mut stack = vec![(tree, 0_usize)];
        while let Some((element, depth)) = stack.pop() {
            let index = self.rows.len();
            let indent = self
                .config
                .depth_indent
                .saturating_mul(i32::try_from(depth).unwrap_or(i32::MAX));
            let y = self
                .config
                .row_height
                .saturating_mul(i32::try_from(index).unwrap_or(i32::MAX));
            self.rows.push(RowEntry {
                tag: element.tag.clone(),
                depth,
                rect: Rect {
                    x: indent,
                    y,
                    width: self.config.view_width.saturating_sub(indent).max(0),
                    height: self.config.row_height,
                },
                label: format!("<{}>", element.tag),
                selected: false,
            });

            // Children reversed so the leftmost child pops first.
            for child in element.children.iter().rev() {
                stack.push((child, depth.saturating_add(1)));
            }
        }

        let content = self
            .config
            .row_height
            .saturating_mul(i32::try_from(self.rows.len()).unwrap_or(i32::MAX));
        self.canvas_height = content.max(self.config.view_height);
    }

    /// Drains the channel and adopts the newest published tree, if any.
    pub fn poll(&mut self, endpoint: &InspectorEndpoint) -> bool {
        let mut newest = None;
        while let Some(tree) = endpoint.try_recv_tree() {
            newest = Some(tree);
        }

        match newest {
            Some(tree) => {
                self.replace_tree(&tree);
                true
            }
            None => false,
        }
    }

    pub fn scroll(&self) -> i32 {
        self.scroll
    }

    /// Scrolls by a signed delta, clamped to the canvas extent.
    pub fn scroll_by(&mut self, delta: i32) {
        let max_scroll = self
            .canvas_height
            .saturating_sub(self.config.view_height)
            .max(0);
        self.scroll = self.scroll.saturating_add(delta).clamp(0, max_scroll);
    }

    /// Row index under a view-relative point, if any.
    pub fn hover(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || x >= self.config.view_width || y < 0 || y >= self.config.view_height {
            return None;
        }

        let canvas_y = y.saturating_add(self.scroll);
        self.rows
            .iter()
            .position(|row| row.rect.contains(x, canvas_y))
    }

    /// Selects the row under the point; clears selection on a miss.
    pub fn click(&mut self, x: i32, y: i32) -> Option<usize> {
        let hit = self.hover(x, y);
        for (index, row) in self.rows.iter_mut().enumerate() {
            row.selected = hit == Some(index);
        }
        hit
    }

    pub fn selected(&self) -> Option<&RowEntry> {
        self.rows.iter().find(|row| row.selected)
    }

    /// Rows intersecting the current viewport, with the scroll applied.
    pub fn visible_rows(&self) -> impl Iterator<Item = &RowEntry> {
        let top = self.scroll;
        let bottom = self.scroll.saturating_add(self.config.view_height);
        self.rows
            .iter()
            .filter(move |row| row.rect.bottom() > top && row.rect.y < bottom)
    }
}

#[cfg(test)]
mod tests {
    use super::InspectorConfig;
    use super::InspectorView;
    use cn_dom::Element;
    use cn_ipc::ChannelConfig;
    use cn_ipc::EndpointRole;
    use cn_ipc::inspector_channel_pair;
    use std::collections::BTreeMap;

    fn view() -> InspectorView {
        InspectorView::new(InspectorConfig::default()).unwrap_or_else(|_| unreachable!())
    }

    fn node(tag: &str, children: Vec<Element>) -> Element {
        let mut element = Element::root(tag.to_owned(), BTreeMap::new());
        element.children = children;
        element
    }

    fn sample_tree() -> Element {
        node(
            "html",
            vec![
                node("head", vec![node("title", Vec::new())]),
                node("body", vec![node("p", Vec::new())]),
            ],
        )
    }

    #[test]
    fn invalid_metrics_are_rejected() {
        let config = InspectorConfig {
            row_height: 0,
            ..InspectorConfig::default()
        };
        let Err(error) = InspectorView::new(config) else {
            unreachable!();
        };
        assert_eq!(error.code, "inspector.metrics_invalid");
    }

    #[test]
    fn rows_are_flattened_in_document_order() {
        let mut view = view();
        view.replace_tree(&sample_tree());

        let tags: Vec<&str> = view.rows().iter().map(|row| row.tag.as_str()).collect();
        assert_eq!(tags, vec!["html", "head", "title", "body", "p"]);

        let depths: Vec<usize> = view.rows().iter().map(|row| row.depth).collect();
        assert_eq!(depths, vec![0, 1, 2, 1, 2]);
    }

    #[test]
    fn row_geometry_follows_depth_and_index() {
        let mut view = view();
        view.replace_tree(&sample_tree());

        let title = &view.rows()[2];
        assert_eq!(title.rect.x, 20);
        assert_eq!(title.rect.y, 40);
        assert_eq!(title.rect.width, 300);
        assert_eq!(title.rect.height, 20);
        assert_eq!(title.label, "<title>");
    }

    #[test]
    fn scroll_is_clamped_to_the_canvas() {
        let config = InspectorConfig {
            view_height: 60,
            ..InspectorConfig::default()
        };
        let mut view = InspectorView::new(config).unwrap_or_else(|_| unreachable!());
        view.replace_tree(&sample_tree());

        // Five rows at 20px each against a 60px view leaves 40px of travel.
        view.scroll_by(1000);
        assert_eq!(view.scroll(), 40);
        view.scroll_by(-1000);
        assert_eq!(view.scroll(), 0);
    }

    #[test]
    fn hover_and_click_respect_the_scroll_offset() {
        let config = InspectorConfig {
            view_height: 60,
            ..InspectorConfig::default()
        };
        let mut view = InspectorView::new(config).unwrap_or_else(|_| unreachable!());
        view.replace_tree(&sample_tree());
        view.scroll_by(40);

        // Row 2 starts at canvas y 40, which is view y 0 after scrolling.
        assert_eq!(view.hover(25, 5), Some(2));
        assert_eq!(view.click(25, 5), Some(2));
        assert_eq!(view.selected().map(|row| row.tag.as_str()), Some("title"));

        // Indent keeps the far left of a deep row empty.
        assert_eq!(view.hover(5, 5), None);
        assert_eq!(view.click(5, 5), None);
        assert!(view.selected().is_none());
    }

    #[test]
    fn visible_rows_window_tracks_the_scroll() {
        let config = InspectorConfig {
            view_height: 40,
            ..InspectorConfig::default()
        };
        let mut view = InspectorView::new(config).unwrap_or_else(|_| unreachable!());
        view.replace_tree(&sample_tree());
        view.scroll_by(20);

        let tags: Vec<&str> = view.visible_rows().map(|row| row.tag.as_str()).collect();
        assert_eq!(tags, vec!["head", "title"]);
    }

    #[test]
    fn poll_adopts_only_the_newest_tree() {
        let engine_config =
            ChannelConfig::hardened(EndpointRole::Engine).unwrap_or_else(|_| unreachable!());
        let inspector_config =
            ChannelConfig::hardened(EndpointRole::Inspector).unwrap_or_else(|_| unreachable!());
        let (engine, inspector, _patch_rx) = inspector_channel_pair(engine_config, inspector_config)
            .unwrap_or_else(|_| unreachable!());

        let mut view = view();
        assert!(!view.poll(&inspector));

        engine
            .publish_tree(node("html", Vec::new()))
            .unwrap_or_else(|_| unreachable!());
        engine
            .publish_tree(sample_tree())
            .unwrap_or_else(|_| unreachable!());

        assert!(view.poll(&inspector));
        assert_eq!(view.rows().len(), 5);
    }
}
