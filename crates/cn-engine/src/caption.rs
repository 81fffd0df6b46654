//! Window-caption seam.

/// Accepts a string to display as the host window's title.
///
/// Fire-and-forget: the engine never reads anything back.
pub trait CaptionSink {
    fn set_caption(&mut self, title: &str);
}

/// Caption sink that discards titles; used headless and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCaption;

impl CaptionSink for NullCaption {
    fn set_caption(&mut self, _title: &str) {}
}
