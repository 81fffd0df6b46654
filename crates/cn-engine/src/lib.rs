//! HTML-to-element-tree engine for the Cinder browser.
//!
//! The engine parses markup through [`cn_html`], resolves inline styles
//! through [`cn_css`], segments bare text runs into measurable wrapper
//! elements, and walks the result into a styled [`cn_dom::Document`]. Text
//! measurement and window captions are collaborator seams so the engine
//! stays UI-toolkit free.

pub mod builder;
pub mod caption;
pub mod measure;
pub mod segment;
pub mod tags;
pub mod units;

pub use builder::DomEngine;
pub use builder::EngineConfig;
pub use builder::ParseOutcome;
pub use caption::CaptionSink;
pub use caption::NullCaption;
pub use measure::LineCursorMeasure;
pub use measure::TextMeasure;
pub use segment::already_segmented;
pub use segment::wrap_bare_text_runs;
pub use tags::TagPolicy;
pub use units::remove_units;
