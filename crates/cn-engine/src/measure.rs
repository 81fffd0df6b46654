//! Text measurement seam.

use crate::units::remove_units;
use cn_core::Rect;
use cn_dom::Styles;

/// Text measurement/render collaborator.
///
/// Stateful by contract: implementations keep a running layout cursor, and a
/// bare `"\n"` input reports a line-height-only rect while feeding that
/// cursor one line.
pub trait TextMeasure {
    /// Measures styled text, returning the used and unused rects.
    fn measure(&mut self, text: &str, styles: &Styles) -> (Rect, Rect);

    /// Debug hook: composites overlays over the measured regions.
    fn highlight(&mut self, _used: &Rect, _unused: &Rect) {}
}

/// Effective font pixel size for a style set.
///
/// An explicit `font-size` wins; percentages resolve against the parent
/// tag's size category.
pub fn effective_font_px(styles: &Styles) -> i32 {
    let fallback = styles.text_tag_size as i32;
    match &styles.font_size {
        Some(raw) => remove_units(raw, fallback, 1, styles.parent_tag_size as i32),
        None => fallback.max(1),
    }
}

/// Deterministic glyph-grid measurement.
///
/// Every glyph advances 3/5 of the font size and lines are 7/5 tall, which
/// is close enough to real metrics for provisional layout and keeps tests
/// exact. Long runs wrap at the viewport edge.
#[derive(Debug, Clone)]
pub struct LineCursorMeasure {
    viewport_width: i32,
    cursor_x: i32,
    cursor_y: i32,
}

impl LineCursorMeasure {
    pub fn new(viewport_width: u32) -> Self {
        Self {
            viewport_width: viewport_width as i32,
            cursor_x: 0,
            cursor_y: 0,
        }
    }

    fn line_height(font_px: i32) -> i32 {
        font_px.saturating_mul(7) / 5
    }

    fn advance(font_px: i32) -> i32 {
        (font_px.saturating_mul(3) / 5).max(1)
    }
}

impl TextMeasure for LineCursorMeasure {
    fn measure(&mut self, text: &str, styles: &Styles) -> (Rect, Rect) {
        let font_px = effective_font_px(styles);
        let line_height = Self::line_height(font_px);

        if text == "\n" {
            let used = Rect::new(0, self.cursor_y, 0, line_height);
            self.cursor_x = 0;
            self.cursor_y = self.cursor_y.saturating_add(line_height);
            return (used, Rect::zero());
        }

        let glyphs = text.chars().count() as i32;
        let mut width = glyphs.saturating_mul(Self::advance(font_px));
        let mut lines = 1_i32;

        let available = (self.viewport_width - self.cursor_x).max(1);
        if width > available && self.viewport_width > 0 {
            // Wrap: first line fills what is left, the rest spans the viewport.
            let overflow = width - available;
            let per_line = self.viewport_width.max(1);
            let extra_lines = overflow.saturating_add(per_line - 1) / per_line;
            lines = 1_i32.saturating_add(extra_lines);
            width = available.max(overflow.min(self.viewport_width));
        }

        let used = Rect::new(
            self.cursor_x,
            self.cursor_y,
            width,
            line_height.saturating_mul(lines),
        );

        let used_right = used.x.saturating_add(used.width);
        let unused = Rect::new(
            used_right,
            used.y,
            (self.viewport_width - used_right).max(0),
            line_height,
        );

        if lines > 1 {
            self.cursor_x = 0;
            self.cursor_y = self.cursor_y.saturating_add(line_height.saturating_mul(lines));
        } else {
            self.cursor_x = used_right;
        }

        (used, unused)
    }
}

#[cfg(test)]
mod tests {
    use super::LineCursorMeasure;
    use super::TextMeasure;
    use super::effective_font_px;
    use cn_dom::Styles;

    #[test]
    fn newline_reports_line_height_only() {
        let mut measure = LineCursorMeasure::new(640);
        let styles = Styles::default();
        let (used, unused) = measure.measure("\n", &styles);
        assert_eq!(used.width, 0);
        assert_eq!(used.height, 22);
        assert_eq!(unused.width, 0);
    }

    #[test]
    fn consecutive_runs_advance_the_cursor() {
        let mut measure = LineCursorMeasure::new(640);
        let styles = Styles::default();
        let (first, _) = measure.measure("abc", &styles);
        let (second, _) = measure.measure("de", &styles);
        assert_eq!(first.x, 0);
        assert_eq!(second.x, first.width);
        assert_eq!(first.y, second.y);
    }

    #[test]
    fn newline_feeds_following_text_to_the_next_line() {
        let mut measure = LineCursorMeasure::new(640);
        let styles = Styles::default();
        let (first, _) = measure.measure("abc", &styles);
        measure.measure("\n", &styles);
        let (second, _) = measure.measure("xyz", &styles);
        assert_eq!(second.x, 0);
        assert!(second.y > first.y);
    }

    #[test]
    fn long_runs_wrap_at_the_viewport_edge() {
        let mut measure = LineCursorMeasure::new(100);
        let styles = Styles::default();
        // 20 glyphs at 9px each overflow a 100px viewport by 80px: two lines.
        let (used, _) = measure.measure(&"a".repeat(20), &styles);
        assert_eq!(used.height, 44);
        let (next, _) = measure.measure("b", &styles);
        assert_eq!(next.x, 0);
        assert_eq!(next.y, used.y + 44);
    }

    #[test]
    fn wrap_rounds_partial_overflow_up_to_a_full_line() {
        let mut measure = LineCursorMeasure::new(100);
        let styles = Styles::default();
        // 23 glyphs span 207px: 100px on the first line, 107px overflow,
        // which still needs two more lines.
        let (used, _) = measure.measure(&"x".repeat(23), &styles);
        assert_eq!(used.height, 66);
    }

    #[test]
    fn explicit_font_size_overrides_tag_size() {
        let mut styles = Styles::default();
        styles.text_tag_size = 32;
        assert_eq!(effective_font_px(&styles), 32);
        styles.font_size = Some("24px".to_owned());
        assert_eq!(effective_font_px(&styles), 24);
    }

    #[test]
    fn percentage_font_size_resolves_against_parent_size() {
        let mut styles = Styles::default();
        styles.parent_tag_size = 20;
        styles.font_size = Some("50%".to_owned());
        assert_eq!(effective_font_px(&styles), 10);
    }
}
